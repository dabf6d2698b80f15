//! Stage artifact decoding
//!
//! Stage results are persisted as one of two shapes:
//! - canonical: `{ "<stage_key>": { ... } }`
//! - degenerate: `{ "summary": "prose ... ```json { \"<stage_key>\": {...} } ``` ..." }`
//!
//! The generation step is instructed to emit pure JSON but is not trusted to
//! comply, so every consumer goes through this one decode path instead of
//! shape-sniffing per call site. Extraction failures yield `None`, never an
//! error: callers treat `None` as "stage not ready".

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("fenced json regex"));

/// A persisted stage result, decoded into its two possible shapes
#[derive(Debug, Clone, PartialEq)]
pub enum StageArtifact {
    /// The provider returned parseable JSON
    Direct(Map<String, Value>),
    /// The provider returned prose; kept verbatim for human review
    Wrapped(String),
}

impl StageArtifact {
    /// Decode a stored artifact value. Returns `None` for anything that is
    /// not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if let Some(Value::String(summary)) = map.get("summary") {
            if map.len() == 1 {
                return Some(StageArtifact::Wrapped(summary.clone()));
            }
        }
        Some(StageArtifact::Direct(map.clone()))
    }

    /// Parse a raw provider response. Strict JSON when the reply starts with
    /// `{`; anything else (including malformed JSON) is wrapped as a summary
    /// so a non-conforming answer is still stored rather than discarded.
    pub fn parse_response(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
                return StageArtifact::Direct(map);
            }
        }
        StageArtifact::Wrapped(raw.to_string())
    }

    /// The value to persist
    pub fn to_value(&self) -> Value {
        match self {
            StageArtifact::Direct(map) => Value::Object(map.clone()),
            StageArtifact::Wrapped(summary) => {
                serde_json::json!({ "summary": summary })
            }
        }
    }

    /// Cheap existence probe: does this artifact plausibly carry `key`?
    ///
    /// For wrapped artifacts this checks for a fenced-json marker and the
    /// literal key substring without paying for a full parse.
    pub fn contains_key(&self, key: &str) -> bool {
        match self {
            StageArtifact::Direct(map) => map.contains_key(key),
            StageArtifact::Wrapped(summary) => {
                summary.contains("```json") && summary.contains(key)
            }
        }
    }

    /// Extract the named substructure, tolerating the wrapped shape.
    pub fn extract(&self, key: &str) -> Option<Value> {
        match self {
            StageArtifact::Direct(map) => map.get(key).cloned(),
            StageArtifact::Wrapped(summary) => {
                let candidate = fenced_block(summary).or_else(|| brace_span(summary))?;
                let parsed: Value = serde_json::from_str(candidate).ok()?;
                parsed.get(key).cloned()
            }
        }
    }
}

/// `isPresent` over a raw stored value
pub fn is_present(raw: &Value, key: &str) -> bool {
    StageArtifact::from_value(raw).is_some_and(|a| a.contains_key(key))
}

/// `extract` over a raw stored value
pub fn extract_value(raw: &Value, key: &str) -> Option<Value> {
    StageArtifact::from_value(raw)?.extract(key)
}

/// First fenced ```json block, if any
fn fenced_block(text: &str) -> Option<&str> {
    FENCED_JSON
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// First `{` to last `}` span
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "extraction_v1": {
                "strengths": [{"summary": "sustained focus on building blocks", "confidence": "high"}],
                "challenges": []
            }
        })
    }

    #[test]
    fn extracts_direct_shape() {
        let raw = sample();
        let value = extract_value(&raw, "extraction_v1").unwrap();
        assert_eq!(value, raw["extraction_v1"]);
    }

    #[test]
    fn extracts_wrapped_shape_round_trip() {
        let raw = sample();
        let wrapped = json!({
            "summary": format!(
                "Here is the result:\n```json\n{}\n```\nLet me know if anything is unclear.",
                serde_json::to_string(&raw).unwrap()
            )
        });
        assert_eq!(
            extract_value(&wrapped, "extraction_v1").unwrap(),
            raw["extraction_v1"]
        );
    }

    #[test]
    fn extracts_bare_brace_span_without_fence() {
        let raw = sample();
        let wrapped = json!({
            "summary": format!("Result: {}", serde_json::to_string(&raw).unwrap())
        });
        assert_eq!(
            extract_value(&wrapped, "extraction_v1").unwrap(),
            raw["extraction_v1"]
        );
    }

    #[test]
    fn negative_cases_yield_none() {
        assert_eq!(extract_value(&json!({}), "extraction_v1"), None);
        assert_eq!(
            extract_value(&json!({"summary": "no json here"}), "extraction_v1"),
            None
        );
        assert_eq!(
            extract_value(
                &json!({"summary": "```json\n{ broken json, extraction_v1 }\n```"}),
                "extraction_v1"
            ),
            None
        );
        assert_eq!(extract_value(&json!("a string"), "extraction_v1"), None);
    }

    #[test]
    fn presence_probe_avoids_parsing() {
        assert!(is_present(&sample(), "extraction_v1"));
        // Probe is intentionally cheap: a fence plus the key substring is
        // enough, even if the block would not parse.
        assert!(is_present(
            &json!({"summary": "```json\n{ not valid extraction_v1 }\n```"}),
            "extraction_v1"
        ));
        assert!(!is_present(
            &json!({"summary": "mentions extraction_v1 but no fence"}),
            "extraction_v1"
        ));
        assert!(!is_present(&json!({}), "extraction_v1"));
    }

    #[test]
    fn non_json_response_is_wrapped() {
        let artifact = StageArtifact::parse_response("I could not produce JSON today.");
        assert_eq!(
            artifact.to_value(),
            json!({"summary": "I could not produce JSON today."})
        );
    }

    #[test]
    fn malformed_leading_brace_is_wrapped() {
        let artifact = StageArtifact::parse_response("{ not json");
        assert!(matches!(artifact, StageArtifact::Wrapped(_)));
    }

    #[test]
    fn strict_json_response_is_direct() {
        let raw = sample();
        let artifact = StageArtifact::parse_response(&serde_json::to_string(&raw).unwrap());
        assert_eq!(artifact.to_value(), raw);
    }
}
