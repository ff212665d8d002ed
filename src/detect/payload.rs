//! Transport-boundary parsing of raw detector text.
//!
//! The vision model answers in loosely formatted text: usually a JSON object,
//! sometimes wrapped in a markdown code fence or surrounded by prose. Parsing
//! here never fails; anything unusable becomes [`RawPayload::Malformed`] so the
//! stream can log it and move on.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::result::DetectionDetails;

/// Strongly typed view of one detector message.
#[derive(Clone, Debug, PartialEq)]
pub enum RawPayload {
    Defect(RawDetection),
    Evidence(RawDetection),
    Clear,
    Scanning,
    Malformed(String),
}

/// Unvalidated detection fields, as reported by the model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawDetection {
    pub type_label: Option<String>,
    /// `None` when absent or not interpretable as a number.
    pub confidence: Option<f64>,
    /// `None` when absent or not exactly four numbers.
    pub box_2d: Option<[f64; 4]>,
    pub details: DetectionDetails,
}

fn code_fence() -> &'static Regex {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    FENCE_RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fence pattern is valid")
    })
}

/// Locate the JSON object inside model text.
fn extract_json_object(text: &str) -> Option<&str> {
    let body = code_fence()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_confidence(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|c| c.is_finite())
}

fn parse_box(value: Option<&Value>) -> Option<[f64; 4]> {
    let items = value?.as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64()?;
    }
    Some(out)
}

fn parse_detection(obj: &Map<String, Value>, label_field: &str) -> RawDetection {
    RawDetection {
        type_label: string_field(obj, label_field).or_else(|| string_field(obj, "label")),
        confidence: parse_confidence(obj.get("confidence")),
        box_2d: parse_box(obj.get("box_2d")),
        details: DetectionDetails {
            description: string_field(obj, "description"),
            severity: string_field(obj, "severity"),
            location: string_field(obj, "location"),
            recommendation: string_field(obj, "recommendation"),
        },
    }
}

/// Parse one raw detector message.
pub fn parse_payload(text: &str) -> RawPayload {
    let Some(json) = extract_json_object(text) else {
        return RawPayload::Malformed("no JSON object in detector output".to_string());
    };
    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => return RawPayload::Malformed(format!("invalid JSON: {}", e)),
    };
    let Some(obj) = value.as_object() else {
        return RawPayload::Malformed("payload must be a JSON object".to_string());
    };
    let Some(kind) = obj.get("type").and_then(Value::as_str) else {
        return RawPayload::Malformed("payload type is missing".to_string());
    };

    match kind.trim().to_lowercase().as_str() {
        "defect" => RawPayload::Defect(parse_detection(obj, "defectType")),
        "evidence" => RawPayload::Evidence(parse_detection(obj, "evidenceType")),
        "clear" => RawPayload::Clear,
        "scanning" => RawPayload::Scanning,
        other => RawPayload::Malformed(format!("unknown payload type '{}'", other)),
    }
}
