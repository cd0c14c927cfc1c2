//! Errors raised by the studio operations.

use ir_core::{BoxError, ErrorKind, UserFacingError};

/// A service reported success but returned no image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("service returned an empty image")]
pub struct EmptyImage;

/// Why a standalone generation or edit produced no image.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("{0}")]
    InvalidInput(UserFacingError),

    #[error("{user}")]
    Service {
        user: UserFacingError,
        #[source]
        source: BoxError,
    },
}

impl StudioError {
    pub(crate) fn invalid_input(message: impl Into<String>, context: &str) -> Self {
        StudioError::InvalidInput(UserFacingError::new(ErrorKind::InvalidInput, message, context))
    }

    pub fn user_facing(&self) -> &UserFacingError {
        match self {
            StudioError::InvalidInput(user) => user,
            StudioError::Service { user, .. } => user,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.user_facing().kind
    }

    pub fn message(&self) -> &str {
        &self.user_facing().message
    }
}
