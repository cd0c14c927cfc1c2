//! Map collaborator errors to user-facing messages.
//!
//! Classification is by substring of the error text, checked in a fixed
//! order. The first rule that matches wins, so an error mentioning both a
//! safety block and a quota is reported as a safety block.

use std::error::Error;

use crate::error::{ErrorKind, UserFacingError};
use crate::service::AnalysisFailure;

pub const SAFETY_MESSAGE: &str =
    "Your request was blocked due to safety policies. Please modify your prompt and try again.";
pub const API_KEY_MESSAGE: &str =
    "There is an issue with the API key. Please ensure it is configured correctly.";
pub const INVALID_REQUEST_MESSAGE: &str = "The request was invalid. For image generation/editing, this can happen with an unsupported image format or a malformed prompt. Please check your inputs.";
pub const UNAVAILABLE_MESSAGE: &str =
    "The service is temporarily unavailable. Please wait a few moments and try again.";
pub const QUOTA_MESSAGE: &str =
    "You have exceeded your usage quota. Please check your billing account or try again later.";
pub const INVALID_ANALYSIS_MESSAGE: &str = "The model's analysis response was not valid. This can sometimes happen with complex prompts. Please try generating a new image.";

/// One classification rule: a kind, its message and the markers that select it.
struct Rule {
    kind: ErrorKind,
    message: &'static str,
    matches: fn(&str) -> bool,
}

const RULES: [Rule; 5] = [
    Rule {
        kind: ErrorKind::SafetyBlocked,
        message: SAFETY_MESSAGE,
        matches: mentions_safety,
    },
    Rule {
        kind: ErrorKind::ApiKey,
        message: API_KEY_MESSAGE,
        matches: mentions_api_key,
    },
    Rule {
        kind: ErrorKind::InvalidRequest,
        message: INVALID_REQUEST_MESSAGE,
        matches: mentions_bad_request,
    },
    Rule {
        kind: ErrorKind::Unavailable,
        message: UNAVAILABLE_MESSAGE,
        matches: mentions_unavailable,
    },
    Rule {
        kind: ErrorKind::QuotaExceeded,
        message: QUOTA_MESSAGE,
        matches: mentions_quota,
    },
];

fn mentions_safety(text: &str) -> bool {
    text.contains("SAFETY")
}

fn mentions_api_key(text: &str) -> bool {
    text.contains("API_KEY")
}

fn mentions_bad_request(text: &str) -> bool {
    text.contains("400")
}

fn mentions_unavailable(text: &str) -> bool {
    text.contains("500") || text.contains("503")
}

fn mentions_quota(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("resource exhausted") || lower.contains("resource_exhausted") || lower.contains("quota")
}

/// Classify a collaborator error raised during `context`.
///
/// Total: every error yields exactly one message. Markers are searched in
/// the whole source chain; the pass-through case only uses the outermost
/// message.
pub fn normalize(raw: &(dyn Error + 'static), context: &str) -> UserFacingError {
    let message = raw.to_string();
    let chain = chain_text(raw);

    let user = match RULES.iter().find(|rule| (rule.matches)(&chain)) {
        Some(rule) => UserFacingError::new(rule.kind, rule.message, context),
        None if message.trim().is_empty() => UserFacingError::new(
            ErrorKind::Other,
            unknown_error_message(context),
            context,
        ),
        None => UserFacingError::new(ErrorKind::Other, message, context),
    };

    tracing::error!(
        context,
        kind = user.kind.name(),
        error = %chain,
        "service call failed"
    );
    user
}

/// Classify an analysis failure.
///
/// A response that does not decode gets its own message instead of going
/// through the substring rules.
pub fn normalize_analysis_failure(failure: &AnalysisFailure, context: &str) -> UserFacingError {
    match failure {
        AnalysisFailure::Service(err) => normalize(err.as_ref(), context),
        AnalysisFailure::InvalidResponse(err) => {
            tracing::error!(context, raw = %err.raw, error = %err.source, "analysis response did not decode");
            UserFacingError::new(ErrorKind::InvalidAnalysisResponse, INVALID_ANALYSIS_MESSAGE, context)
        }
    }
}

pub fn unknown_error_message(context: &str) -> String {
    format!("An unknown error occurred during {}. Please try again later.", context)
}

fn chain_text(err: &(dyn Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::BoxError;
    use crate::verdict::Verdict;

    fn classify(message: &str) -> UserFacingError {
        let err: BoxError = message.into();
        normalize(err.as_ref(), "image generation")
    }

    #[derive(Debug, thiserror::Error)]
    #[error("request failed")]
    struct Wrapped {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn test_each_rule() {
        assert_eq!(classify("finishReason: SAFETY").kind, ErrorKind::SafetyBlocked);
        assert_eq!(classify("API_KEY_INVALID").kind, ErrorKind::ApiKey);
        assert_eq!(classify("got status 400 Bad Request").kind, ErrorKind::InvalidRequest);
        assert_eq!(classify("status 500").kind, ErrorKind::Unavailable);
        assert_eq!(classify("503 Service Unavailable").kind, ErrorKind::Unavailable);
        assert_eq!(classify("Resource Exhausted").kind, ErrorKind::QuotaExceeded);
        assert_eq!(classify("RESOURCE_EXHAUSTED").kind, ErrorKind::QuotaExceeded);
        assert_eq!(classify("daily quota reached").kind, ErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_messages() {
        assert_eq!(classify("SAFETY").message, SAFETY_MESSAGE);
        assert_eq!(classify("API_KEY").message, API_KEY_MESSAGE);
        assert_eq!(classify("400").message, INVALID_REQUEST_MESSAGE);
        assert_eq!(classify("503").message, UNAVAILABLE_MESSAGE);
        assert_eq!(classify("resource exhausted").message, QUOTA_MESSAGE);
    }

    #[test]
    fn test_first_rule_wins() {
        let user = classify("SAFETY block; also resource exhausted");
        assert_eq!(user.kind, ErrorKind::SafetyBlocked);

        let user = classify("API_KEY rejected with 400");
        assert_eq!(user.kind, ErrorKind::ApiKey);

        let user = classify("400 after 503 retry");
        assert_eq!(user.kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_markers_are_case_sensitive_except_quota() {
        assert_eq!(classify("safety settings").kind, ErrorKind::Other);
        assert_eq!(classify("api_key").kind, ErrorKind::Other);
    }

    #[test]
    fn test_pass_through_and_unknown() {
        let user = classify("The model did not return an image.");
        assert_eq!(user.kind, ErrorKind::Other);
        assert_eq!(user.message, "The model did not return an image.");
        assert_eq!(user.context, "image generation");

        let user = classify("   ");
        assert_eq!(
            user.message,
            "An unknown error occurred during image generation. Please try again later."
        );
    }

    #[test]
    fn test_markers_found_in_source_chain() {
        let err = Wrapped {
            inner: std::io::Error::new(std::io::ErrorKind::Other, "upstream returned 503"),
        };
        let user = normalize(&err, "image analysis");
        assert_eq!(user.kind, ErrorKind::Unavailable);
    }

    #[test]
    fn test_analysis_failures() {
        let decode = Verdict::from_json("not json").unwrap_err();
        let user = normalize_analysis_failure(&AnalysisFailure::InvalidResponse(decode), "image analysis");
        assert_eq!(user.kind, ErrorKind::InvalidAnalysisResponse);
        assert_eq!(user.message, INVALID_ANALYSIS_MESSAGE);

        let user = normalize_analysis_failure(&AnalysisFailure::service("SAFETY"), "image analysis");
        assert_eq!(user.kind, ErrorKind::SafetyBlocked);
        assert_eq!(user.context, "image analysis");
    }
}
