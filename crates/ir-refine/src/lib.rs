//! # ir-refine
//!
//! Generate an image, check it against the prompt, and retry once with a
//! refined prompt when the check fails.
//!
//! # Usage
//!
//! ```bash
//! # Run the loop on the offline dry-run backend
//! cargo run -p ir-refine -- refine "a red circle on a white background" --out circle.png
//!
//! # Standalone generation and editing
//! cargo run -p ir-refine -- generate "a lighthouse at dusk" --aspect-ratio 16:9
//! cargo run -p ir-refine -- edit circle.png "make the circle blue"
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Prompt    │ ──> │  Generation │ ──> │  Analysis   │
//! │             │     │   Service   │     │  Service    │
//! └─────────────┘     └──────^──────┘     └──────┬──────┘
//!                            │                   │
//!                            │          (mismatch, attempt 1)
//!                            │                   │
//!                     ┌──────┴──────┐            │
//!                     │   Refined   │ <──────────┘
//!                     │   Prompt    │
//!                     └─────────────┘
//! ```
//!
//! Services are the traits in [`ir_core::service`]; any backend can sit behind
//! them. [`dryrun`] wires deterministic offline ones for the CLI.

pub mod config;
pub mod dryrun;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod prompt;
pub mod studio;

pub use config::{ConfigError, DryRunConfig, GenerateConfig, RefineConfig};
pub use dryrun::{DryRunBackend, PngRenderer};
pub use error::{EmptyImage, StudioError};
pub use logging::init_logging;
pub use orchestrator::Orchestrator;
pub use prompt::{decode_verdict, strip_code_fence, PromptBuilder, TextAnalyzer};
pub use studio::Studio;
