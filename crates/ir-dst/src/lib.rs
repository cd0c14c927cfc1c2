//! # ir-dst
//!
//! Deterministic simulation of the image services a refinement run talks to.
//!
//! Everything is driven by a seed: verdicts, mismatch reasons, markdown fences
//! around analysis JSON, and injected faults. A failing simulation replays
//! from its seed alone.
//!
//! ## Usage
//!
//! ```rust
//! use ir_dst::{SimConfig, SimEnv};
//!
//! let mut env = SimEnv::new(12345, SimConfig::default());
//! let generator = env.image_service();
//! let analysis = env.analysis_backend();
//! # let _ = (generator, analysis);
//! ```
//!
//! [`script`] holds queue-driven services for tests that need an exact
//! sequence of outcomes, and [`record`] wraps services to capture a
//! [`ir_core::RunTrace`] for property checks.
//!
//! ## Reproducibility
//!
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

pub mod fault;
pub mod random;
pub mod record;
pub mod script;
pub mod sim;

pub use fault::{FaultConfig, FaultInjector, FaultStats, InjectedFault, ServiceFault};
pub use random::DeterministicRng;
pub use record::{Recorded, TraceRecorder};
pub use script::{ScriptedAnalysis, ScriptedAnalyzer, ScriptedEditor, ScriptedError, ScriptedGenerator};
pub use sim::{
    ImageRenderer, SimAnalysisBackend, SimConfig, SimEnv, SimImageService, StubRenderer,
};

/// Seed from `DST_SEED`, or a fresh random one.
///
/// The seed is logged either way. A `DST_SEED` that is not a `u64` is ignored
/// with a warning.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    let from_env = std::env::var("DST_SEED").ok().and_then(|s| match s.parse::<u64>() {
        Ok(seed) if seed != 0 => Some(seed),
        _ => {
            tracing::warn!(value = %s, "ignoring DST_SEED, expected a non-zero u64");
            None
        }
    });

    match from_env {
        Some(seed) => {
            tracing::info!(seed, "DST_SEED from environment");
            seed
        }
        None => {
            let seed = rand::random::<u64>().max(1);
            tracing::info!(seed, "DST_SEED randomly generated");
            seed
        }
    }
}
