//! Bounded reads of HTTP response bodies.

use reqwest::Response;

use crate::error::{AdapterError, AdapterResult};

fn too_large(len: u64, limit: u64) -> AdapterError {
    AdapterError::invalid_input(format!("Media is {len} bytes, limit is {limit}"))
}

/// Read a response body chunk by chunk, failing as soon as it grows past
/// `limit` bytes. A declared `Content-Length` over the limit fails before any
/// chunk is read.
pub(crate) async fn read_limited(mut response: Response, limit: u64) -> AdapterResult<Vec<u8>> {
    let declared = response.content_length();
    if let Some(len) = declared.filter(|len| *len > limit) {
        return Err(too_large(len, limit));
    }

    let mut data = Vec::with_capacity(declared.unwrap_or(0).min(limit) as usize);
    while let Some(chunk) = response.chunk().await? {
        let total = (data.len() + chunk.len()) as u64;
        if total > limit {
            return Err(AdapterError::invalid_input(format!(
                "Media exceeds the {limit} byte limit"
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one request with a chunked body and no Content-Length.
    async fn serve_chunked(chunks: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let head = "HTTP/1.1 200 OK\r\ncontent-type: video/mp4\r\n\
                        transfer-encoding: chunked\r\nconnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for chunk in chunks {
                let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                frame.extend_from_slice(&chunk);
                frame.extend_from_slice(b"\r\n");
                if socket.write_all(&frame).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });
        format!("http://{addr}/clip.mp4")
    }

    #[tokio::test]
    async fn test_chunked_body_within_limit() {
        let url = serve_chunked(vec![vec![1u8; 8], vec![2u8; 8]]).await;
        let response = reqwest::get(&url).await.unwrap();
        assert!(response.content_length().is_none());

        let data = read_limited(response, 16).await.unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(&data[8..], &[2u8; 8]);
    }

    #[tokio::test]
    async fn test_chunked_body_over_limit_stops_reading() {
        let url = serve_chunked(vec![vec![0u8; 8], vec![0u8; 8], vec![0u8; 8]]).await;
        let response = reqwest::get(&url).await.unwrap();

        let err = read_limited(response, 12).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidInput(_)));
        assert!(err.to_string().contains("12 byte limit"));
    }
}
