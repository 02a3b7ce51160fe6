//! HTTP adapter tests against mock servers.

use serde_json::json;
use tokio_test::assert_err;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use std::time::Duration;

use scribe_adapters::{
    AdapterError, CdnUploader, ContentAnalyzer, DirectDownloader, Downloader, DownloaderConfig,
    GeminiAnalyzer, GeminiConfig, HttpTranscriber, R2Config, R2Uploader, Transcriber,
    TranscriberConfig,
};
use scribe_models::{DownloadPayload, HealthState, Platform, UploadSource};

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] } }
        ]
    })
}

#[tokio::test]
async fn downloader_streams_ranged_media() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/media/clip.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .insert_header("accept-ranges", "bytes"),
        )
        .mount(&server)
        .await;

    let downloader = DirectDownloader::new(DownloaderConfig::default()).unwrap();
    let url = format!("{}/media/clip.mp4", server.uri());
    let outcome = downloader.download(&url).await.unwrap();

    assert_eq!(outcome.platform, Platform::Other);
    match outcome.payload {
        DownloadPayload::Stream {
            url: stream_url,
            filename,
            ..
        } => {
            assert_eq!(stream_url, url);
            assert_eq!(filename, "clip.mp4");
        }
        other => panic!("expected stream payload, got {other:?}"),
    }
}

#[tokio::test]
async fn downloader_buffers_small_media() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "video/mp4"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clip.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(vec![1u8, 2, 3, 4]),
        )
        .mount(&server)
        .await;

    let downloader = DirectDownloader::new(DownloaderConfig::default()).unwrap();
    let outcome = downloader
        .download(&format!("{}/clip.mp4", server.uri()))
        .await
        .unwrap();

    match outcome.payload {
        DownloadPayload::Bytes { data, .. } => assert_eq!(data, vec![1, 2, 3, 4]),
        other => panic!("expected bytes payload, got {other:?}"),
    }
}

#[tokio::test]
async fn downloader_rejects_non_video_content() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .mount(&server)
        .await;

    let downloader = DirectDownloader::new(DownloaderConfig::default()).unwrap();
    let err = assert_err!(downloader.download(&format!("{}/page", server.uri())).await);

    assert!(matches!(err, AdapterError::InvalidInput(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn downloader_enforces_size_limit() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/big.mp4"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "video/mp4"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/big.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
        .mount(&server)
        .await;

    let config = DownloaderConfig {
        max_bytes: 16,
        ..Default::default()
    };
    let downloader = DirectDownloader::new(config).unwrap();
    let err = assert_err!(downloader.download(&format!("{}/big.mp4", server.uri())).await);

    assert!(matches!(err, AdapterError::InvalidInput(_)));
}

#[tokio::test]
async fn downloader_rejects_oversized_body_without_head_length() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/unsized.mp4"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/unsized.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(vec![7u8; 4096]),
        )
        .mount(&server)
        .await;

    let config = DownloaderConfig {
        max_bytes: 1024,
        ..Default::default()
    };
    let downloader = DirectDownloader::new(config).unwrap();
    let err = assert_err!(downloader.download(&format!("{}/unsized.mp4", server.uri())).await);

    assert!(matches!(err, AdapterError::InvalidInput(_)));
    assert!(err.to_string().contains("limit"));
}

fn r2_config(endpoint: &str, max_source_bytes: u64) -> R2Config {
    R2Config {
        endpoint_url: endpoint.to_string(),
        access_key_id: "key".into(),
        secret_access_key: "secret".into(),
        bucket_name: "media".into(),
        region: "auto".into(),
        public_base_url: "https://media.example.com".into(),
        iframe_base_url: "https://play.example.com/embed".into(),
        key_prefix: "videos".into(),
        fetch_timeout: Duration::from_secs(5),
        max_source_bytes,
    }
}

#[tokio::test]
async fn r2_refuses_url_source_over_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream/clip.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(vec![1u8; 2048]),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uploader = R2Uploader::new(r2_config(&server.uri(), 512)).unwrap();
    let source = UploadSource::Url(format!("{}/stream/clip.mp4", server.uri()));
    let err = assert_err!(uploader.upload(source, "clip.mp4").await);

    assert!(matches!(err, AdapterError::InvalidInput(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn downloader_maps_missing_source_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let downloader = DirectDownloader::new(DownloaderConfig::default()).unwrap();
    let err = assert_err!(downloader.download(&format!("{}/gone.mp4", server.uri())).await);

    assert!(matches!(err, AdapterError::NotFound(_)));
}

#[tokio::test]
async fn transcriber_posts_url_and_platform() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "url": "https://media.example.com/v.mp4",
            "platform": "tiktok"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transcript": "Stop scrolling. Here is the trick.",
            "components": {
                "hook": "Stop scrolling.",
                "bridge": "",
                "nugget": "Here is the trick.",
                "wta": ""
            },
            "method": "whisper"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = TranscriberConfig::new(server.uri());
    config.api_key = Some("secret".to_string());
    let transcriber = HttpTranscriber::new(config).unwrap();

    let transcription = transcriber
        .transcribe("https://media.example.com/v.mp4", Platform::Tiktok)
        .await
        .unwrap();

    assert_eq!(transcription.transcript, "Stop scrolling. Here is the trick.");
    assert_eq!(transcription.method, "whisper");
    assert!(!transcription.is_fallback);
    assert_eq!(
        transcription.components.unwrap().hook,
        "Stop scrolling.".to_string()
    );
}

#[tokio::test]
async fn transcriber_server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let transcriber = HttpTranscriber::new(TranscriberConfig::new(server.uri())).unwrap();
    let err = assert_err!(
        transcriber
            .transcribe("https://media.example.com/v.mp4", Platform::Other)
            .await
    );

    assert!(matches!(err, AdapterError::Provider { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn transcriber_health_reports_provider_availability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "providers": { "available": 1, "total": 2 } })),
        )
        .mount(&server)
        .await;

    let transcriber = HttpTranscriber::new(TranscriberConfig::new(server.uri())).unwrap();
    let health = transcriber.health().await;

    assert_eq!(health.state, HealthState::Degraded);
    let availability = health.availability.unwrap();
    assert_eq!((availability.available, availability.total), (1, 2));
}

#[tokio::test]
async fn transcriber_unreachable_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transcriber = HttpTranscriber::new(TranscriberConfig::new(server.uri())).unwrap();
    assert_eq!(transcriber.health().await.state, HealthState::Unhealthy);
}

#[tokio::test]
async fn gemini_falls_back_to_next_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/primary:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/backup:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            concat!(
                "```json\n",
                r#"{"hook":"Wait.","bridge":"So.","nugget":"Do this.","wta":"Follow."}"#,
                "\n```",
            ),
        )))
        .mount(&server)
        .await;

    let config = GeminiConfig::new("test-key")
        .with_base_url(server.uri())
        .with_models(["primary", "backup"]);
    let analyzer = GeminiAnalyzer::new(config).unwrap();

    let components = analyzer
        .extract_components("Wait. So. Do this. Follow.")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(components.hook, "Wait.");
    assert_eq!(components.wta, "Follow.");
}

#[tokio::test]
async fn gemini_all_models_failing_is_none_and_degrades_availability() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = GeminiConfig::new("test-key")
        .with_base_url(server.uri())
        .with_models(["only"]);
    config.failure_threshold = 1;
    let analyzer = GeminiAnalyzer::new(config).unwrap();

    let components = analyzer.extract_components("Hello there.").await.unwrap();
    assert!(components.is_none());

    let health = analyzer.health().await;
    assert_eq!(health.state, HealthState::Unhealthy);
}

#[tokio::test]
async fn gemini_parses_content_insights() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            concat!(
                r#"{"sentiment":"positive","topics":["cooking"],"#,
                r#""keywords":["pasta"],"content_type":"tutorial"}"#,
            ),
        )))
        .mount(&server)
        .await;

    let analyzer = GeminiAnalyzer::new(
        GeminiConfig::new("test-key")
            .with_base_url(server.uri())
            .with_models(["m"]),
    )
    .unwrap();

    let insights = analyzer
        .analyze_content("Boil the pasta.")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(insights.sentiment.as_deref(), Some("positive"));
    assert_eq!(insights.topics, vec!["cooking".to_string()]);
}
