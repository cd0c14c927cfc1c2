//! # ir-core
//!
//! Core types for generate-verify-retry image refinement.
//!
//! A run takes a user prompt, asks an image generation service for an image,
//! asks an image analysis service whether the image matches the prompt, and
//! retries once with a refined prompt when it does not.
//!
//! ```text
//!  Idle ──> GeneratingImage ──> AnalyzingImage ──(match or attempt 2)──> Completed
//!               ^     │                │
//!               │     │ (error)        │ (mismatch on attempt 1)
//!               │     v                v
//!               │   Failed     RetryingWithRefinedPrompt
//!               └──────────────────────┘
//! ```
//!
//! This crate holds everything the orchestrator, the simulation harness and
//! the model checker share:
//!
//! - the domain types ([`Prompt`], [`ImageData`], [`Verdict`], [`RunResult`])
//! - the run state machine ([`RunMachine`]) with its two-attempt bound
//! - the collaborator contracts ([`ImageGenerationService`], [`ImageAnalysisService`],
//!   [`ImageEditService`], [`TextAnalysisBackend`])
//! - the error taxonomy and the [`normalize`] classifier
//! - trace properties for checking recorded runs ([`property`])

pub mod error;
pub mod image;
pub mod normalize;
pub mod prompt;
pub mod property;
pub mod run;
pub mod service;
pub mod verdict;

pub use error::{ErrorKind, RunError, UserFacingError};
pub use image::{AspectRatio, GenerateOptions, ImageData, ParseAspectRatioError};
pub use normalize::{normalize, normalize_analysis_failure};
pub use prompt::{Prompt, PromptError};
pub use property::{
    PropertyChecker, PropertyResult, PropertySummary, RunTrace, ServiceCall, TraceOutcome,
};
pub use run::{
    AnalysisRun, AttemptNumber, Decision, RunEvent, RunMachine, RunResult, RunSnapshot, RunState,
    TransitionError,
};
pub use service::{
    AnalysisFailure, BoxError, ImageAnalysisService, ImageEditService, ImageGenerationService,
    TextAnalysisBackend,
};
pub use verdict::{Verdict, VerdictDecodeError};
