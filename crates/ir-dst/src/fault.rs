//! Deterministic fault injection for simulated services.
//!
//! Faults are the errors a hosted image model actually raises: safety blocks,
//! key problems, bad requests, outages, quota exhaustion and plain transport
//! failures. Each fault carries a raw message shaped like the provider's, so
//! injected faults go through the same classification as real ones.

use ir_core::ErrorKind;
use serde::{Deserialize, Serialize};

use crate::random::DeterministicRng;

/// Probabilities of each failure mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Probability that a call fails with an error
    pub failure_probability: f64,
    /// Probability that an analysis response is not a verdict
    pub malformed_probability: f64,
    /// Probability that generation succeeds but returns no bytes
    pub empty_image_probability: f64,
    /// Whether fault injection is enabled
    pub enabled: bool,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            failure_probability: 0.05,
            malformed_probability: 0.02,
            empty_image_probability: 0.01,
            enabled: true,
        }
    }
}

impl FaultConfig {
    /// No faults - useful for baseline runs.
    #[must_use]
    pub fn none() -> Self {
        Self {
            failure_probability: 0.0,
            malformed_probability: 0.0,
            empty_image_probability: 0.0,
            enabled: false,
        }
    }

    /// Aggressive faults for stress runs.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            failure_probability: 0.25,
            malformed_probability: 0.1,
            empty_image_probability: 0.05,
            enabled: true,
        }
    }

    /// Check every probability lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("failure_probability", self.failure_probability),
            ("malformed_probability", self.malformed_probability),
            ("empty_image_probability", self.empty_image_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be in [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }
}

/// A simulated service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceFault {
    SafetyBlock,
    InvalidApiKey,
    BadRequest,
    Unavailable,
    QuotaExhausted,
    Transport,
}

impl ServiceFault {
    pub const ALL: [ServiceFault; 6] = [
        ServiceFault::SafetyBlock,
        ServiceFault::InvalidApiKey,
        ServiceFault::BadRequest,
        ServiceFault::Unavailable,
        ServiceFault::QuotaExhausted,
        ServiceFault::Transport,
    ];

    /// Raw provider message for this fault.
    pub fn message(&self) -> &'static str {
        match self {
            ServiceFault::SafetyBlock => "Candidate was blocked due to SAFETY",
            ServiceFault::InvalidApiKey => "API_KEY_INVALID: API key not valid. Please pass a valid API key.",
            ServiceFault::BadRequest => "[400 Bad Request] Unsupported MIME type for inline data",
            ServiceFault::Unavailable => "[503 Service Unavailable] The model is overloaded. Please try again later.",
            ServiceFault::QuotaExhausted => "Resource exhausted: too many requests for this project",
            ServiceFault::Transport => "connection reset by peer",
        }
    }

    /// How the normalizer should classify this fault.
    pub fn expected_kind(&self) -> ErrorKind {
        match self {
            ServiceFault::SafetyBlock => ErrorKind::SafetyBlocked,
            ServiceFault::InvalidApiKey => ErrorKind::ApiKey,
            ServiceFault::BadRequest => ErrorKind::InvalidRequest,
            ServiceFault::Unavailable => ErrorKind::Unavailable,
            ServiceFault::QuotaExhausted => ErrorKind::QuotaExceeded,
            ServiceFault::Transport => ErrorKind::Other,
        }
    }
}

/// Error value returned by simulated services.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .0.message())]
pub struct InjectedFault(pub ServiceFault);

/// Seeded fault injector; the same seed produces the same fault sequence.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    stats: FaultStats,
}

impl FaultInjector {
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "invalid fault config: {:?}", config);

        Self {
            rng,
            config,
            stats: FaultStats::default(),
        }
    }

    /// Draw a service error, if one should occur on this call.
    pub fn next_failure(&mut self) -> Option<ServiceFault> {
        if !self.config.enabled || !self.rng.gen_bool(self.config.failure_probability) {
            return None;
        }
        let fault = *self.rng.choose(&ServiceFault::ALL)?;
        self.stats.failures_count += 1;
        Some(fault)
    }

    /// Whether this analysis response should be garbled.
    pub fn should_garble(&mut self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let garble = self.rng.gen_bool(self.config.malformed_probability);
        if garble {
            self.stats.malformed_count += 1;
        }
        garble
    }

    /// Whether this generation should come back empty.
    pub fn should_return_empty(&mut self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let empty = self.rng.gen_bool(self.config.empty_image_probability);
        if empty {
            self.stats.empty_images_count += 1;
        }
        empty
    }

    #[must_use]
    pub fn stats(&self) -> FaultStats {
        self.stats
    }

    #[must_use]
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }
}

/// Counts of injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub failures_count: u64,
    pub malformed_count: u64,
    pub empty_images_count: u64,
}
