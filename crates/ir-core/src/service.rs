//! Contracts for the external image services.
//!
//! The services are opaque collaborators: any transport, model or vendor can
//! sit behind them. Errors are boxed so an implementation can surface whatever
//! its client raises; the orchestrator classifies them by message text.

use async_trait::async_trait;

use crate::image::{GenerateOptions, ImageData};
use crate::verdict::{Verdict, VerdictDecodeError};

/// Error raised by a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Turns a prompt into an image.
#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<ImageData, BoxError>;
}

/// Judges whether an image matches a prompt.
#[async_trait]
pub trait ImageAnalysisService: Send + Sync {
    async fn analyze(&self, image: &ImageData, prompt: &str) -> Result<Verdict, AnalysisFailure>;
}

/// Applies a natural-language edit to an existing image.
#[async_trait]
pub trait ImageEditService: Send + Sync {
    async fn edit(&self, image: &ImageData, instruction: &str) -> Result<ImageData, BoxError>;
}

/// Multimodal text backend: sends an image plus an instruction and returns
/// whatever text the model produced.
///
/// Pair with a decoder to obtain an [`ImageAnalysisService`].
#[async_trait]
pub trait TextAnalysisBackend: Send + Sync {
    async fn analyze_text(&self, image: &ImageData, instruction: &str) -> Result<String, BoxError>;
}

/// Why an analysis call produced no verdict.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisFailure {
    /// The service call itself failed.
    #[error(transparent)]
    Service(BoxError),

    /// The service answered, but not with a decodable verdict.
    #[error(transparent)]
    InvalidResponse(#[from] VerdictDecodeError),
}

impl AnalysisFailure {
    pub fn service(err: impl Into<BoxError>) -> Self {
        AnalysisFailure::Service(err.into())
    }
}

#[async_trait]
impl<T: ImageGenerationService + ?Sized> ImageGenerationService for std::sync::Arc<T> {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<ImageData, BoxError> {
        (**self).generate(prompt, options).await
    }
}

#[async_trait]
impl<T: ImageAnalysisService + ?Sized> ImageAnalysisService for std::sync::Arc<T> {
    async fn analyze(&self, image: &ImageData, prompt: &str) -> Result<Verdict, AnalysisFailure> {
        (**self).analyze(image, prompt).await
    }
}

#[async_trait]
impl<T: ImageEditService + ?Sized> ImageEditService for std::sync::Arc<T> {
    async fn edit(&self, image: &ImageData, instruction: &str) -> Result<ImageData, BoxError> {
        (**self).edit(image, instruction).await
    }
}

#[async_trait]
impl<T: TextAnalysisBackend + ?Sized> TextAnalysisBackend for std::sync::Arc<T> {
    async fn analyze_text(&self, image: &ImageData, instruction: &str) -> Result<String, BoxError> {
        (**self).analyze_text(image, instruction).await
    }
}
