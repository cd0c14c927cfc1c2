//! Simulated image services.
//!
//! [`SimEnv`] derives one RNG stream per service from a single seed. Services
//! draw verdicts, reasons and faults from their stream, so a whole run replays
//! from the seed alone.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;
use ir_core::{
    AspectRatio, BoxError, GenerateOptions, ImageData, ImageEditService, ImageGenerationService,
    TextAnalysisBackend, Verdict,
};
use serde::{Deserialize, Serialize};

use crate::fault::{FaultConfig, FaultInjector, InjectedFault};
use crate::random::DeterministicRng;

/// Behaviour of the simulated services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Probability that analysis reports a mismatch
    pub mismatch_probability: f64,
    /// Probability that analysis wraps its JSON in a markdown fence
    pub fence_probability: f64,
    #[serde(flatten)]
    pub faults: FaultConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mismatch_probability: 0.3,
            fence_probability: 0.2,
            faults: FaultConfig::default(),
        }
    }
}

impl SimConfig {
    /// Services that always succeed and always match.
    #[must_use]
    pub fn happy_path() -> Self {
        Self {
            mismatch_probability: 0.0,
            fence_probability: 0.0,
            faults: FaultConfig::none(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("mismatch_probability", self.mismatch_probability),
            ("fence_probability", self.fence_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be in [0, 1], got {}", name, value));
            }
        }
        self.faults.validate()
    }
}

/// Produces image bytes for simulated generation.
pub trait ImageRenderer: Send + Sync {
    fn render(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<ImageData, BoxError>;
}

/// Renders a short deterministic byte string instead of a real image.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubRenderer;

impl ImageRenderer for StubRenderer {
    fn render(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<ImageData, BoxError> {
        let mut hasher = DefaultHasher::new();
        prompt.hash(&mut hasher);
        aspect_ratio.hash(&mut hasher);
        let mut bytes = b"SIMIMG".to_vec();
        bytes.extend_from_slice(&hasher.finish().to_be_bytes());
        Ok(ImageData::png(bytes))
    }
}

/// Seed-derived source of simulated services.
#[derive(Debug)]
pub struct SimEnv {
    seed: u64,
    rng: DeterministicRng,
    config: SimConfig,
}

impl SimEnv {
    pub fn new(seed: u64, config: SimConfig) -> Self {
        debug_assert!(seed != 0, "Seed should not be zero");
        debug_assert!(config.validate().is_ok(), "invalid sim config: {:?}", config);

        Self {
            seed,
            rng: DeterministicRng::new(seed),
            config,
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    fn fork_state(&mut self) -> SimState {
        let rng = self.rng.fork();
        let fault_rng = self.rng.fork();
        SimState {
            rng,
            faults: FaultInjector::new(fault_rng, self.config.faults.clone()),
        }
    }

    /// Generation and editing backed by [`StubRenderer`].
    pub fn image_service(&mut self) -> SimImageService<StubRenderer> {
        self.image_service_with(StubRenderer)
    }

    pub fn image_service_with<R: ImageRenderer>(&mut self, renderer: R) -> SimImageService<R> {
        SimImageService {
            state: Mutex::new(self.fork_state()),
            renderer,
        }
    }

    pub fn analysis_backend(&mut self) -> SimAnalysisBackend {
        SimAnalysisBackend {
            state: Mutex::new(self.fork_state()),
            mismatch_probability: self.config.mismatch_probability,
            fence_probability: self.config.fence_probability,
        }
    }

    /// Format seed for failure messages.
    #[must_use]
    pub fn format_seed(&self) -> String {
        format!("DST_SEED={}", self.seed)
    }
}

#[derive(Debug)]
struct SimState {
    rng: DeterministicRng,
    faults: FaultInjector,
}

fn lock_state(state: &Mutex<SimState>) -> Result<std::sync::MutexGuard<'_, SimState>, BoxError> {
    state
        .lock()
        .map_err(|_| BoxError::from("simulation state lock poisoned"))
}

/// Simulated generation and editing.
#[derive(Debug)]
pub struct SimImageService<R> {
    state: Mutex<SimState>,
    renderer: R,
}

impl<R: ImageRenderer> SimImageService<R> {
    fn produce(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<ImageData, BoxError> {
        {
            let mut state = lock_state(&self.state)?;
            if let Some(fault) = state.faults.next_failure() {
                tracing::debug!(?fault, "injecting generation fault");
                return Err(Box::new(InjectedFault(fault)));
            }
            if state.faults.should_return_empty() {
                tracing::debug!("injecting empty image");
                return Ok(ImageData::png(Vec::new()));
            }
        }
        self.renderer.render(prompt, aspect_ratio)
    }

    pub fn stats(&self) -> Option<crate::fault::FaultStats> {
        self.state.lock().ok().map(|state| state.faults.stats())
    }
}

#[async_trait]
impl<R: ImageRenderer> ImageGenerationService for SimImageService<R> {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<ImageData, BoxError> {
        self.produce(prompt, options.aspect_ratio.unwrap_or_default())
    }
}

#[async_trait]
impl<R: ImageRenderer> ImageEditService for SimImageService<R> {
    async fn edit(&self, image: &ImageData, instruction: &str) -> Result<ImageData, BoxError> {
        let seed_text = format!("{}|{}", image.to_base64(), instruction);
        self.produce(&seed_text, AspectRatio::default())
    }
}

const MISMATCH_REASONS: [&str; 4] = [
    "the main subject is missing from the image",
    "the colors do not match the description",
    "the composition ignores the requested setting",
    "an extra object not in the prompt dominates the scene",
];

const GARBLED_RESPONSES: [&str; 3] = [
    "The image mostly matches the prompt.",
    "{\"match\": true, \"reason\": ",
    "```json\n{\"verdict\": \"yes\"}\n```",
];

/// Simulated multimodal analysis model that answers in text.
#[derive(Debug)]
pub struct SimAnalysisBackend {
    state: Mutex<SimState>,
    mismatch_probability: f64,
    fence_probability: f64,
}

#[async_trait]
impl TextAnalysisBackend for SimAnalysisBackend {
    async fn analyze_text(&self, image: &ImageData, _instruction: &str) -> Result<String, BoxError> {
        let mut state = lock_state(&self.state)?;
        if let Some(fault) = state.faults.next_failure() {
            tracing::debug!(?fault, "injecting analysis fault");
            return Err(Box::new(InjectedFault(fault)));
        }
        if state.faults.should_garble() {
            let garbled = *state.rng.choose(&GARBLED_RESPONSES).unwrap_or(&GARBLED_RESPONSES[0]);
            return Ok(garbled.to_string());
        }

        let verdict = if state.rng.gen_bool(self.mismatch_probability) {
            let reason = *state.rng.choose(&MISMATCH_REASONS).unwrap_or(&MISMATCH_REASONS[0]);
            Verdict::mismatched(reason)
        } else {
            Verdict::matched(format!(
                "the {}-byte image depicts every element of the prompt",
                image.len()
            ))
        };

        let json = serde_json::to_string(&verdict)?;
        if state.rng.gen_bool(self.fence_probability) {
            Ok(format!("```json\n{}\n```", json))
        } else {
            Ok(json)
        }
    }
}
