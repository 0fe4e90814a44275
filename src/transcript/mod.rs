use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[cfg(test)]
mod tests;

/// Who said a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    #[serde(rename = "AI")]
    Ai,
    Customer,
    Unknown,
}

impl Speaker {
    fn from_label(label: &str) -> Speaker {
        match label.trim().to_ascii_lowercase().as_str() {
            "ai" | "assistant" | "bot" => Speaker::Ai,
            "customer" | "user" | "human" | "caller" => Speaker::Customer,
            _ => Speaker::Unknown,
        }
    }
}

/// One reconstructed line of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub time: String,
    pub speaker: Speaker,
    pub message: String,
}

// Lines like "AI: hello" / "Customer: hi" / "User: hi" (older payloads),
// tag matched case-insensitively.
static SPEAKER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(AI|Customer|User)\s*:\s*(.*)$").unwrap());

// Spacing of synthesized timestamps for entries that carry none.
const SYNTH_STEP_SECS: i64 = 30;

/// Parse a raw transcript value of any of the known upstream encodings
/// into ordered entries. Absent/empty input yields an empty vec; this
/// never fails, it degrades to `Speaker::Unknown` entries instead.
pub fn parse_transcript(raw: &Value) -> Vec<TranscriptEntry> {
    parse_transcript_at(raw, Utc::now())
}

/// Same as [`parse_transcript`] but with an explicit anchor for the
/// synthesized times, so the output is a pure function of its inputs.
pub fn parse_transcript_at(raw: &Value, now: DateTime<Utc>) -> Vec<TranscriptEntry> {
    match raw {
        Value::Null => Vec::new(),
        Value::Array(items) => parse_array(items, now),
        Value::String(text) => parse_text(text, now),
        other => vec![TranscriptEntry {
            time: clock(now),
            speaker: Speaker::Unknown,
            message: other.to_string(),
        }],
    }
}

fn parse_text(text: &str, now: DateTime<Utc>) -> Vec<TranscriptEntry> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => parse_array(&items, now),
        Ok(_) => parse_lines(text, now),
        Err(e) => {
            debug!("transcript is not JSON, falling back to line parsing: {}", e);
            parse_lines(text, now)
        }
    }
}

fn parse_array(items: &[Value], now: DateTime<Utc>) -> Vec<TranscriptEntry> {
    if items.is_empty() {
        return Vec::new();
    }
    // The OpenAI role format opens with the system priming message,
    // which is not part of the conversation.
    let items = if is_role_entry(&items[0]) {
        &items[1..]
    } else {
        items
    };
    let total = items.len();
    items
        .iter()
        .enumerate()
        .map(|(index, item)| entry_from_value(item, synth_clock(now, total, index)))
        .collect()
}

fn is_role_entry(item: &Value) -> bool {
    item.get("role").is_some() && item.get("content").is_some()
}

fn entry_from_value(item: &Value, synth_time: String) -> TranscriptEntry {
    let speaker = match item.get("speaker").and_then(Value::as_str) {
        Some(label) => Speaker::from_label(label),
        None => match item.get("role").and_then(Value::as_str) {
            Some("assistant") => Speaker::Ai,
            Some(_) => Speaker::Customer,
            None => Speaker::Unknown,
        },
    };
    let message = item
        .get("message")
        .or_else(|| item.get("content"))
        .or_else(|| item.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let time = item
        .get("time")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(synth_time);
    TranscriptEntry {
        time,
        speaker,
        message,
    }
}

fn parse_lines(text: &str, now: DateTime<Utc>) -> Vec<TranscriptEntry> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match SPEAKER_LINE.captures(line) {
            Some(caps) => entries.push(TranscriptEntry {
                time: clock(now),
                speaker: Speaker::from_label(&caps[1]),
                message: caps[2].trim().to_string(),
            }),
            None => entries.push(TranscriptEntry {
                time: clock(now),
                speaker: Speaker::Unknown,
                message: line.to_string(),
            }),
        }
    }
    if entries.is_empty() {
        // Unstructured blob without a single usable line.
        return vec![TranscriptEntry {
            time: clock(now),
            speaker: Speaker::Unknown,
            message: text.to_string(),
        }];
    }
    entries
}

fn clock(at: DateTime<Utc>) -> String {
    at.format("%-I:%M %p").to_string()
}

fn synth_clock(now: DateTime<Utc>, total: usize, index: usize) -> String {
    let back = SYNTH_STEP_SECS * (total - index) as i64;
    clock(now - Duration::seconds(back))
}
