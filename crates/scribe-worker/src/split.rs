//! Heuristic script component split.
//!
//! Used when neither the transcriber nor the analyzer produced components.

use std::sync::OnceLock;

use regex::Regex;

use scribe_models::ScriptComponents;

static SENTENCE_RE: OnceLock<Regex> = OnceLock::new();

fn sentence_regex() -> &'static Regex {
    SENTENCE_RE.get_or_init(|| Regex::new(r"[^.!?]+[.!?]+").expect("sentence pattern is valid"))
}

/// Split text into trimmed sentences.
///
/// Text without any terminator is returned as a single sentence. Trailing
/// text after the last terminator is not a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let sentences: Vec<String> = sentence_regex()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() && !text.trim().is_empty() {
        return vec![text.trim().to_string()];
    }
    sentences
}

/// Split a transcript into hook / bridge / nugget / wta.
///
/// Sentences are grouped into chunks of `ceil(n / 4)` and assigned in order.
/// With fewer than four chunks the missing middle parts stay empty and `wta`
/// reuses the last chunk.
pub fn heuristic_components(transcript: &str) -> ScriptComponents {
    let sentences = split_sentences(transcript);
    if sentences.is_empty() {
        return ScriptComponents::default();
    }

    let chunk_size = sentences.len().div_ceil(4);
    let chunks: Vec<String> = sentences
        .chunks(chunk_size)
        .map(|chunk| chunk.join(" "))
        .collect();

    let part = |i: usize| chunks.get(i).cloned().unwrap_or_default();
    let wta = chunks
        .get(3)
        .or_else(|| chunks.last())
        .cloned()
        .unwrap_or_default();

    ScriptComponents {
        hook: part(0),
        bridge: part(1),
        nugget: part(2),
        wta,
    }
}
