use crate::assistant::AssistantCache;
use crate::transcript::{self, TranscriptEntry};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;


pub const UNKNOWN: &str = "Unknown";
pub const UNKNOWN_ASSISTANT: &str = "Unknown Assistant";
pub const NOT_AVAILABLE: &str = "N/A";
pub const ZERO_DURATION: &str = "0:00";

/// Direction of a call. Unrecognized or missing direction tags count as
/// outbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallType {
    #[serde(rename = "inboundPhoneCall")]
    InboundPhoneCall,
    #[serde(rename = "outboundPhoneCall")]
    OutboundPhoneCall,
}

/// Why a call ended, collapsed from the upstream status/end-reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    Completed,
    Missed,
    Busy,
    Failed,
}

/// A call payload as received from the upstream API. The shape drifted
/// across API revisions (camelCase vs snake_case, `type` vs `direction`,
/// the assistant phone number moving between objects, transcript as a
/// string or an array), so every field is optional and unknown fields
/// are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCall {
    pub id: Option<String>,
    #[serde(alias = "assistant_id")]
    pub assistant_id: Option<String>,
    #[serde(rename = "type")]
    pub call_type: Option<String>,
    pub direction: Option<String>,
    #[serde(alias = "started_at")]
    pub started_at: Option<String>,
    #[serde(alias = "ended_at")]
    pub ended_at: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "ended_reason", alias = "endReason", alias = "end_reason")]
    pub ended_reason: Option<String>,
    pub customer: Option<RawCustomer>,
    pub assistant: Option<RawAssistant>,
    #[serde(alias = "phone_number")]
    pub phone_number: Option<RawPhoneNumber>,
    pub transcript: Option<Value>,
    #[serde(alias = "recording_url")]
    pub recording_url: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCustomer {
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAssistant {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "phone_number")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPhoneNumber {
    pub number: Option<String>,
}

/// Canonical, fully-derived call record. Every display field is total:
/// when a source field cannot be resolved the documented sentinel is
/// substituted, so consumers never deal with missing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: String,
    pub call_type: CallType,
    pub customer_phone: String,
    pub assistant_phone: String,
    pub assistant_id: String,
    pub assistant_name: String,
    pub date: String,
    pub time: String,
    pub duration: String,
    pub end_reason: EndReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptEntry>>,
    /// Parsed start timestamp, kept for sorting and machine consumers.
    pub started_at: Option<DateTime<Utc>>,
}

/// Build the canonical record for one raw payload. Returns `None` only
/// when the payload carries no id (malformed entry); every other
/// derivation falls back to a sentinel instead of failing.
pub fn normalize(raw: &RawCall, cache: &AssistantCache) -> Option<CallRecord> {
    normalize_at(raw, cache, Utc::now())
}

/// Same as [`normalize`] but with an explicit anchor for synthesized
/// transcript times; given the same payload, cache state and anchor the
/// output is identical.
pub fn normalize_at(
    raw: &RawCall,
    cache: &AssistantCache,
    now: DateTime<Utc>,
) -> Option<CallRecord> {
    let id = raw.id.as_deref().filter(|id| !id.trim().is_empty())?;

    let started_at = parse_timestamp(raw.started_at.as_deref());
    let ended_at = parse_timestamp(raw.ended_at.as_deref());
    let (date, time) = match started_at {
        Some(ts) => (format_date(ts), format_clock(ts)),
        None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
    };

    let assistant_id = first_nonempty([
        raw.assistant_id.as_deref(),
        raw.assistant.as_ref().and_then(|a| a.id.as_deref()),
    ]);
    let cached = assistant_id.and_then(|id| cache.peek(id));

    let assistant_name = first_nonempty([
        raw.assistant.as_ref().and_then(|a| a.name.as_deref()),
        cached.as_ref().and_then(|info| info.name.as_deref()),
    ])
    .unwrap_or(UNKNOWN_ASSISTANT)
    .to_string();

    let customer_phone = first_nonempty([raw.customer.as_ref().and_then(|c| c.number.as_deref())])
        .unwrap_or(UNKNOWN)
        .to_string();

    let assistant_phone = first_nonempty([
        raw.phone_number.as_ref().and_then(|p| p.number.as_deref()),
        raw.assistant.as_ref().and_then(|a| a.phone_number.as_deref()),
        cached.as_ref().and_then(|info| info.phone_number.as_deref()),
    ])
    .unwrap_or(UNKNOWN)
    .to_string();

    let transcript = raw
        .transcript
        .as_ref()
        .map(|value| transcript::parse_transcript_at(value, now));

    Some(CallRecord {
        id: id.to_string(),
        call_type: classify_call_type(raw.call_type.as_deref(), raw.direction.as_deref()),
        customer_phone,
        assistant_phone,
        assistant_id: assistant_id.unwrap_or(UNKNOWN).to_string(),
        assistant_name,
        date,
        time,
        duration: format_duration(started_at, ended_at),
        end_reason: classify_end_reason(raw.ended_reason.as_deref(), raw.status.as_deref()),
        recording_url: raw.recording_url.clone(),
        summary: raw.summary.clone(),
        transcript,
        started_at,
    })
}

/// Elapsed whole seconds formatted as `M:SS`. Calls still in progress
/// (no end timestamp), invalid timestamps and negative ranges all
/// collapse to "0:00".
pub fn format_duration(
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
) -> String {
    let (start, end) = match (started_at, ended_at) {
        (Some(start), Some(end)) => (start, end),
        _ => return ZERO_DURATION.to_string(),
    };
    let secs = (end - start).num_seconds().max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// End-reason codes win over status codes; anything unrecognized counts
/// as a completed call.
pub fn classify_end_reason(ended_reason: Option<&str>, status: Option<&str>) -> EndReason {
    ended_reason
        .and_then(classify_code)
        .or_else(|| status.and_then(classify_code))
        .unwrap_or(EndReason::Completed)
}

fn classify_code(code: &str) -> Option<EndReason> {
    let code = code.to_ascii_lowercase();
    if code.contains("no-answer") || code.contains("no_answer") {
        Some(EndReason::Missed)
    } else if code.contains("busy") {
        Some(EndReason::Busy)
    } else if code.contains("failed") || code.contains("error") {
        Some(EndReason::Failed)
    } else {
        None
    }
}

fn classify_call_type(type_tag: Option<&str>, direction: Option<&str>) -> CallType {
    let tag = first_nonempty([type_tag, direction])
        .unwrap_or("")
        .to_ascii_lowercase();
    if tag.contains("inbound") {
        CallType::InboundPhoneCall
    } else {
        CallType::OutboundPhoneCall
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}

fn format_date(ts: DateTime<Utc>) -> String {
    format!("{}/{}/{}", ts.month(), ts.day(), ts.year())
}

fn format_clock(ts: DateTime<Utc>) -> String {
    ts.format("%-I:%M %p").to_string()
}

/// First candidate that is present and non-blank. Keeps each fallback
/// priority order in one auditable place.
fn first_nonempty<const N: usize>(candidates: [Option<&str>; N]) -> Option<&str> {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
}
