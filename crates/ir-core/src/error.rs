//! Error taxonomy for refinement runs.

use std::fmt;

use serde::Serialize;

use crate::service::{AnalysisFailure, BoxError};

/// Category of a user-facing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected locally before any service call
    InvalidInput,
    /// Blocked by the provider's safety policy
    SafetyBlocked,
    /// Missing or misconfigured API key
    ApiKey,
    /// Malformed request or unsupported input (HTTP 400)
    InvalidRequest,
    /// Service unavailable (HTTP 500/503)
    Unavailable,
    /// Usage quota or resources exhausted
    QuotaExceeded,
    /// Analysis answered with something that is not a verdict
    InvalidAnalysisResponse,
    /// Another run is still in flight on the same orchestrator
    RunInProgress,
    /// Anything else; the service's own message is passed through
    Other,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::SafetyBlocked => "safety_blocked",
            ErrorKind::ApiKey => "api_key",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::InvalidAnalysisResponse => "invalid_analysis_response",
            ErrorKind::RunInProgress => "run_in_progress",
            ErrorKind::Other => "other",
        }
    }
}

/// A message safe to show to the user, plus the operation it came from.
///
/// Carries no transport detail; the raw error stays in the `source` chain of
/// the surrounding [`RunError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFacingError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: String,
}

impl UserFacingError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, context: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(!message.trim().is_empty(), "user-facing message must not be empty");
        Self {
            kind,
            message,
            context: context.into(),
        }
    }
}

impl fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UserFacingError {}

/// Why a refinement run ended without a result.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{0}")]
    InvalidInput(UserFacingError),

    #[error("{user}")]
    Generation {
        user: UserFacingError,
        #[source]
        source: BoxError,
    },

    #[error("{user}")]
    Analysis {
        user: UserFacingError,
        #[source]
        source: AnalysisFailure,
    },

    #[error("{0}")]
    RunInProgress(UserFacingError),
}

impl RunError {
    pub fn user_facing(&self) -> &UserFacingError {
        match self {
            RunError::InvalidInput(user) | RunError::RunInProgress(user) => user,
            RunError::Generation { user, .. } | RunError::Analysis { user, .. } => user,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.user_facing().kind
    }

    pub fn message(&self) -> &str {
        &self.user_facing().message
    }

    pub fn context(&self) -> &str {
        &self.user_facing().context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_user_message() {
        let err = RunError::Generation {
            user: UserFacingError::new(ErrorKind::Unavailable, "try later", "image generation"),
            source: "HTTP 503 from upstream".into(),
        };
        assert_eq!(err.to_string(), "try later");
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.context(), "image generation");

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("HTTP 503 from upstream"));
    }

    #[test]
    fn test_kind_names_are_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidAnalysisResponse).unwrap();
        assert_eq!(json, format!("\"{}\"", ErrorKind::InvalidAnalysisResponse.name()));
    }
}
