//! Transcript scanning
//!
//! Reads Claude Code's JSONL conversation files just far enough to find the
//! first thing the user said. Transcripts may be malformed or mid-write, so
//! bad lines are skipped rather than reported.

use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Text of a message's content: either a plain string or the first
/// `{"type": "text"}` block of a content array.
fn content_text(content: &Value) -> Option<&str> {
    match content {
        Value::String(s) => Some(s.as_str()),
        Value::Array(blocks) => blocks
            .iter()
            .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|b| b.get("text"))
            .and_then(Value::as_str),
        _ => None,
    }
}

/// Extract the user text from one raw transcript line, if the line is a user
/// message. Lines that are not valid UTF-8 JSON yield `None`.
pub fn user_text_from_line(line: &[u8]) -> Option<String> {
    let record: Value = serde_json::from_slice(line).ok()?;
    let message = record.get("message")?;
    if message.get("role").and_then(Value::as_str) != Some("user") {
        return None;
    }

    let text = content_text(message.get("content")?)?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// First user prompt in a transcript, cut to `max_chars` characters.
///
/// User records carrying no text (tool results) are passed over.
pub fn first_user_prompt(path: &Path, max_chars: usize) -> Option<String> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Failed to open transcript");
            return None;
        }
    };

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Stopped reading transcript");
                return None;
            }
        }

        if let Some(text) = user_text_from_line(&line) {
            return Some(text.chars().take(max_chars).collect());
        }
    }
}
