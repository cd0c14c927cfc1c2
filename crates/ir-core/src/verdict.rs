//! Analysis verdicts.

use serde::{Deserialize, Serialize};

/// Judgment of whether an image matches a prompt.
///
/// Serialized with the wire key `match`, which is a Rust keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(rename = "match")]
    pub matches: bool,
    pub reason: String,
}

impl Verdict {
    pub fn matched(reason: impl Into<String>) -> Self {
        Self {
            matches: true,
            reason: reason.into(),
        }
    }

    pub fn mismatched(reason: impl Into<String>) -> Self {
        Self {
            matches: false,
            reason: reason.into(),
        }
    }

    /// Decode a verdict from a JSON object.
    pub fn from_json(text: &str) -> Result<Self, VerdictDecodeError> {
        serde_json::from_str(text).map_err(|source| VerdictDecodeError {
            raw: text.to_string(),
            source,
        })
    }
}

/// Analysis output that is not a `{ "match": bool, "reason": string }` object.
#[derive(Debug, thiserror::Error)]
#[error("analysis response is not a valid verdict: {source}")]
pub struct VerdictDecodeError {
    /// The text that failed to decode
    pub raw: String,
    #[source]
    pub source: serde_json::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uses_match_key() {
        let verdict = Verdict::from_json(r#"{"match": false, "reason": "image shows a blue square"}"#).unwrap();
        assert_eq!(verdict, Verdict::mismatched("image shows a blue square"));

        let json = serde_json::to_value(Verdict::matched("ok")).unwrap();
        assert_eq!(json["match"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_decode_errors_keep_raw_text() {
        let err = Verdict::from_json("The image matches.").unwrap_err();
        assert_eq!(err.raw, "The image matches.");

        // Wrong types are rejected too
        assert!(Verdict::from_json(r#"{"match": "yes", "reason": "ok"}"#).is_err());
        assert!(Verdict::from_json(r#"{"reason": "no match key"}"#).is_err());
    }
}
