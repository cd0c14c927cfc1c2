//! TOML configuration for the `ir-refine` CLI.
//!
//! ```toml
//! log_filter = "info,ir_refine=debug"
//!
//! [dryrun]
//! seed = 42
//! mismatch_probability = 0.3
//! failure_probability = 0.05
//! malformed_probability = 0.02
//! fence_probability = 0.2
//!
//! [generate]
//! aspect_ratio = "16:9"
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::{Path, PathBuf};

use ir_core::AspectRatio;
use ir_dst::{FaultConfig, SimConfig};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOG_FILTER: &str = "info,ir_refine=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Dry-run backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DryRunConfig {
    /// Seed for verdicts, faults and rendered colours; must be non-zero
    pub seed: u64,
    pub mismatch_probability: f64,
    pub fence_probability: f64,
    pub failure_probability: f64,
    pub malformed_probability: f64,
    pub empty_image_probability: f64,
}

impl Default for DryRunConfig {
    fn default() -> Self {
        let sim = SimConfig::default();
        Self {
            seed: 42,
            mismatch_probability: sim.mismatch_probability,
            fence_probability: sim.fence_probability,
            failure_probability: 0.0,
            malformed_probability: 0.0,
            empty_image_probability: 0.0,
        }
    }
}

impl DryRunConfig {
    /// Simulation settings for these probabilities.
    pub fn sim_config(&self) -> SimConfig {
        let faults = FaultConfig {
            failure_probability: self.failure_probability,
            malformed_probability: self.malformed_probability,
            empty_image_probability: self.empty_image_probability,
            enabled: true,
        };
        SimConfig {
            mismatch_probability: self.mismatch_probability,
            fence_probability: self.fence_probability,
            faults,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    pub aspect_ratio: AspectRatio,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub log_filter: String,
    pub dryrun: DryRunConfig,
    pub generate: GenerateConfig,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            dryrun: DryRunConfig::default(),
            generate: GenerateConfig::default(),
        }
    }
}

impl RefineConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RefineConfig = toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dryrun.seed == 0 {
            return Err(ConfigError::Invalid("dryrun.seed must be non-zero".to_string()));
        }
        self.dryrun
            .sim_config()
            .validate()
            .map_err(|msg| ConfigError::Invalid(format!("dryrun.{}", msg)))
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RefineConfig::default();
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.dryrun.seed, 42);
        assert_eq!(config.dryrun.failure_probability, 0.0);
        assert_eq!(config.generate.aspect_ratio, AspectRatio::Square);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[dryrun]\nseed = 7\nmismatch_probability = 1.0\nfailure_probability = 0.5\n\n[generate]\naspect_ratio = \"9:16\""
        )
        .unwrap();

        let config = RefineConfig::load(file.path()).unwrap();
        assert_eq!(config.dryrun.seed, 7);
        assert_eq!(config.dryrun.mismatch_probability, 1.0);
        assert_eq!(config.dryrun.fence_probability, DryRunConfig::default().fence_probability);
        let sim = config.dryrun.sim_config();
        assert_eq!(sim.faults.failure_probability, 0.5);
        assert_eq!(sim.faults.malformed_probability, 0.0);
        assert_eq!(config.generate.aspect_ratio, AspectRatio::Portrait9x16);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_rejects_out_of_range_probability() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dryrun]\nfence_probability = 2.0").unwrap();

        let err = RefineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("fence_probability"));
    }

    #[test]
    fn test_parse_and_read_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[generate]\naspect_ratio = \"2:1\"").unwrap();
        assert!(matches!(RefineConfig::load(file.path()), Err(ConfigError::Parse { .. })));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(RefineConfig::load(&missing), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = RefineConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: RefineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
