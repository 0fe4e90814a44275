use super::*;
use chrono::TimeZone;
use serde_json::json;

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap()
}

#[test]
fn test_null_yields_empty() {
    assert!(parse_transcript_at(&Value::Null, fixed_now()).is_empty());
}

#[test]
fn test_empty_string_yields_empty() {
    assert!(parse_transcript_at(&json!(""), fixed_now()).is_empty());
    assert!(parse_transcript_at(&json!("   \n  "), fixed_now()).is_empty());
}

#[test]
fn test_empty_json_array_yields_empty() {
    assert!(parse_transcript_at(&json!("[]"), fixed_now()).is_empty());
    assert!(parse_transcript_at(&json!([]), fixed_now()).is_empty());
}

#[test]
fn test_openai_format_skips_priming_message() {
    let raw = json!(r#"[{"role":"assistant","content":"hi"},{"role":"user","content":"hey"}]"#);
    let entries = parse_transcript_at(&raw, fixed_now());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].speaker, Speaker::Customer);
    assert_eq!(entries[0].message, "hey");
}

#[test]
fn test_openai_format_roles() {
    let raw = json!([
        {"role": "system", "content": "You are a scheduling assistant."},
        {"role": "assistant", "content": "Hello, how can I help?"},
        {"role": "user", "content": "I need to reschedule."}
    ]);
    let entries = parse_transcript_at(&raw, fixed_now());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].speaker, Speaker::Ai);
    assert_eq!(entries[0].message, "Hello, how can I help?");
    assert_eq!(entries[1].speaker, Speaker::Customer);
    assert_eq!(entries[1].message, "I need to reschedule.");
    // Synthesized times count backward from the anchor in 30s steps.
    assert_eq!(entries[0].time, "2:29 PM");
    assert_eq!(entries[1].time, "2:29 PM");
}

#[test]
fn test_speaker_format_passthrough_keeps_all_entries() {
    let raw = json!([
        {"time": "9:01 AM", "speaker": "AI", "message": "Good morning"},
        {"speaker": "Customer", "message": "Morning"}
    ]);
    let entries = parse_transcript_at(&raw, fixed_now());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].time, "9:01 AM");
    assert_eq!(entries[0].speaker, Speaker::Ai);
    // Missing time is synthesized, not left empty.
    assert!(!entries[1].time.is_empty());
    assert_eq!(entries[1].speaker, Speaker::Customer);
    assert_eq!(entries[1].message, "Morning");
}

#[test]
fn test_line_format() {
    let entries = parse_transcript_at(&json!("AI: Hello\nCustomer: Hi there"), fixed_now());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].speaker, Speaker::Ai);
    assert_eq!(entries[0].message, "Hello");
    assert_eq!(entries[1].speaker, Speaker::Customer);
    assert_eq!(entries[1].message, "Hi there");
}

#[test]
fn test_line_format_user_prefix_and_case() {
    let entries = parse_transcript_at(&json!("user: one\nAI: two\nCUSTOMER: three"), fixed_now());
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].speaker, Speaker::Customer);
    assert_eq!(entries[0].message, "one");
    assert_eq!(entries[1].speaker, Speaker::Ai);
    assert_eq!(entries[2].speaker, Speaker::Customer);
}

#[test]
fn test_unmatched_lines_kept_as_unknown() {
    let entries = parse_transcript_at(&json!("AI: Hello\n[ring tone]\nCustomer: Hi"), fixed_now());
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].speaker, Speaker::Unknown);
    assert_eq!(entries[1].message, "[ring tone]");
}

#[test]
fn test_plain_string_becomes_single_unknown_entry() {
    let entries = parse_transcript_at(&json!("call dropped before greeting"), fixed_now());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].speaker, Speaker::Unknown);
    assert_eq!(entries[0].message, "call dropped before greeting");
}

#[test]
fn test_json_object_string_falls_back_to_lines() {
    let entries = parse_transcript_at(&json!(r#"{"summary":"short call"}"#), fixed_now());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].speaker, Speaker::Unknown);
}

#[test]
fn test_unrecognized_array_shape_is_passed_through() {
    let raw = json!([{"payload": 1}, {"payload": 2}]);
    let entries = parse_transcript_at(&raw, fixed_now());
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.speaker == Speaker::Unknown));
    assert!(entries.iter().all(|e| !e.time.is_empty()));
}

#[test]
fn test_deterministic_for_fixed_anchor() {
    let raw = json!("AI: Hello\nCustomer: Hi there");
    let first = parse_transcript_at(&raw, fixed_now());
    let second = parse_transcript_at(&raw, fixed_now());
    assert_eq!(first, second);
}
