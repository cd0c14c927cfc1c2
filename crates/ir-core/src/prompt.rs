//! Validated user prompt.

use std::fmt;
use std::ops::Deref;

/// Message shown when a caller submits nothing to work with.
pub const EMPTY_PROMPT_MESSAGE: &str = "Please enter a prompt.";

/// An immutable, non-empty prompt supplied by the caller.
///
/// The text is kept exactly as given (no trimming), so the analysis step
/// always judges against what the user actually typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prompt(String);

/// Rejected prompt text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("{}", EMPTY_PROMPT_MESSAGE)]
    Empty,
}

impl Prompt {
    /// Validate and wrap prompt text.
    ///
    /// Only empty text is rejected; whitespace is the caller's to send.
    pub fn new(text: impl Into<String>) -> Result<Self, PromptError> {
        let text = text.into();
        if text.is_empty() {
            return Err(PromptError::Empty);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for Prompt {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Prompt {
    type Error = PromptError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for Prompt {
    type Error = PromptError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
