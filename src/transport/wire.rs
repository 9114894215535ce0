//! Wire bodies exchanged with the inference backend and output validation.
//!
//! ```text
//! POST {base_url}{infer_path}
//!   → {"mode": "parse", "payload": "..."}
//!   ← {"raw_text": "...", "parsed_data": {...}?, "confidence": 0.93, "degraded": false?}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::types::InferenceMode;

#[derive(Debug, Serialize)]
pub struct BackendRequest<'a> {
    pub mode: InferenceMode,
    pub payload: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct BackendResponse {
    pub raw_text: String,
    #[serde(default)]
    pub parsed_data: Option<Map<String, Value>>,
    pub confidence: f64,
    #[serde(default)]
    pub degraded: bool,
}

/// What a transport produced for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub raw_text: String,
    pub parsed_data: Option<Map<String, Value>>,
    pub confidence: f64,
    pub degraded: bool,
}

impl ModelOutput {
    pub fn text(raw_text: impl Into<String>, confidence: f64) -> Self {
        Self {
            raw_text: raw_text.into(),
            parsed_data: None,
            confidence,
            degraded: false,
        }
    }

    pub fn with_parsed(mut self, parsed: Map<String, Value>) -> Self {
        self.parsed_data = Some(parsed);
        self
    }

    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }
}

impl From<BackendResponse> for ModelOutput {
    fn from(resp: BackendResponse) -> Self {
        Self {
            raw_text: resp.raw_text,
            parsed_data: resp.parsed_data,
            confidence: resp.confidence,
            degraded: resp.degraded,
        }
    }
}

/// Decode an HTTP response body.
pub fn decode_response(mode: InferenceMode, body: &str) -> Result<ModelOutput, TransportError> {
    let resp: BackendResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::Malformed(format!("invalid JSON body: {e}")))?;
    validate_output(mode, resp.into())
}

/// Reject outputs no caller could use.
///
/// Parse requests must carry structured data; when the backend only returned
/// text, the first JSON object embedded in it is used.
pub fn validate_output(mode: InferenceMode, mut output: ModelOutput) -> Result<ModelOutput, TransportError> {
    if !output.confidence.is_finite() || !(0.0..=1.0).contains(&output.confidence) {
        return Err(TransportError::Malformed(format!(
            "confidence {} outside [0, 1]",
            output.confidence
        )));
    }

    if mode == InferenceMode::Parse && output.parsed_data.is_none() {
        output.parsed_data = extract_json_object(&output.raw_text);
        if output.parsed_data.is_none() {
            return Err(TransportError::Malformed(
                "parse response carried no structured data".to_string(),
            ));
        }
    }

    Ok(output)
}

/// Find the first `{...}` span in `text` that parses as a JSON object.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(start, _)| {
            let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(Value::Object(map))) => Some(map),
                _ => None,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(BackendRequest {
            mode: InferenceMode::Chat,
            payload: "hi",
        })
        .unwrap();
        assert_eq!(body, json!({"mode": "chat", "payload": "hi"}));
    }

    #[test]
    fn test_decode_full_response() {
        let out = decode_response(
            InferenceMode::Parse,
            r#"{"raw_text":"ok","parsed_data":{"merchant":"Blue Bottle"},"confidence":0.9}"#,
        )
        .unwrap();
        assert_eq!(out.parsed_data.unwrap()["merchant"], "Blue Bottle");
        assert!(!out.degraded);
    }

    #[test]
    fn test_parsed_data_extracted_from_text() {
        let out = decode_response(
            InferenceMode::Parse,
            r#"{"raw_text":"Sure! {\"category\": \"Dining\", \"amount\": 4.5} hope that helps","confidence":0.7}"#,
        )
        .unwrap();
        let parsed = out.parsed_data.unwrap();
        assert_eq!(parsed["category"], "Dining");
        assert_eq!(parsed["amount"], 4.5);
    }

    #[test]
    fn test_parse_without_structure_is_malformed() {
        let err = decode_response(InferenceMode::Parse, r#"{"raw_text":"no idea","confidence":0.2}"#).unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));

        // Chat answers need no structure.
        assert!(decode_response(InferenceMode::Chat, r#"{"raw_text":"no idea","confidence":0.2}"#).is_ok());
    }

    #[test]
    fn test_confidence_out_of_range() {
        let err = decode_response(InferenceMode::Chat, r#"{"raw_text":"x","confidence":1.7}"#).unwrap_err();
        assert!(err.to_string().contains("1.7"));
    }

    #[test]
    fn test_garbage_body() {
        assert!(matches!(
            decode_response(InferenceMode::Chat, "<html>502</html>"),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_extract_skips_unbalanced_braces() {
        let map = extract_json_object("weird { prefix then {\"a\": 1}").unwrap();
        assert_eq!(map["a"], 1);
        assert!(extract_json_object("plain text").is_none());
    }
}
