//! Configuration for the screening pipeline.
//!
//! Loaded from an optional file plus `SCREENING_`-prefixed environment
//! variables (`__` separates nested keys, e.g. `SCREENING_LOGGING__LEVEL`).
//! `max_correction_cycles` has no default and must be supplied.

use std::num::NonZeroU32;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),
}

/// Routing of a "likely irrelevant" triage label that the Reviewer nonetheless
/// marked `include = true`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikelyIrrelevantPolicy {
    /// The tier never proceeds to detailed screening.
    #[default]
    Discard,
    /// The Reviewer's include flag takes precedence over the tier.
    ForwardWhenIncluded,
}

/// Main screening configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Maximum Improver amendments per gate before the gate is exhausted
    pub max_correction_cycles: NonZeroU32,

    #[serde(default)]
    pub likely_irrelevant_policy: LikelyIrrelevantPolicy,

    /// Citations screened in parallel
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Per-citation deadline; unset means no deadline
    #[serde(default)]
    pub citation_timeout_secs: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub markers: MarkerConfig,
}

impl ScreeningConfig {
    /// Configuration with the given cycle cap and defaults elsewhere.
    pub fn new(max_correction_cycles: NonZeroU32) -> Self {
        Self {
            max_correction_cycles,
            likely_irrelevant_policy: LikelyIrrelevantPolicy::default(),
            worker_concurrency: default_worker_concurrency(),
            citation_timeout_secs: None,
            logging: LoggingConfig::default(),
            markers: MarkerConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: LikelyIrrelevantPolicy) -> Self {
        self.likely_irrelevant_policy = policy;
        self
    }

    pub fn with_worker_concurrency(mut self, workers: usize) -> Self {
        self.worker_concurrency = workers;
        self
    }

    pub fn with_citation_timeout(mut self, secs: u64) -> Self {
        self.citation_timeout_secs = Some(secs);
        self
    }

    /// Load configuration from an optional file and the environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SCREENING")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "worker_concurrency must be greater than zero".into(),
            ));
        }
        if self.citation_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "citation_timeout_secs must be greater than zero when set".into(),
            ));
        }
        self.markers.validate()
    }

    pub fn citation_timeout(&self) -> Option<Duration> {
        self.citation_timeout_secs.map(Duration::from_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Text markers the marker-parsed stages search for (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub potentially_relevant: String,
    pub uncertain: String,
    pub likely_irrelevant: String,
    pub include: String,
    pub exclude: String,
    pub agree: String,
    pub disagree: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            potentially_relevant: "[[POTENTIALLY RELEVANT]]".into(),
            uncertain: "[[UNCERTAIN]]".into(),
            likely_irrelevant: "[[LIKELY IRRELEVANT]]".into(),
            include: "[[INCLUDE]]".into(),
            exclude: "[[EXCLUDE]]".into(),
            agree: "[[AGREE]]".into(),
            disagree: "[[DISAGREE]]".into(),
        }
    }
}

impl MarkerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let markers = [
            ("potentially_relevant", &self.potentially_relevant),
            ("uncertain", &self.uncertain),
            ("likely_irrelevant", &self.likely_irrelevant),
            ("include", &self.include),
            ("exclude", &self.exclude),
            ("agree", &self.agree),
            ("disagree", &self.disagree),
        ];
        for (name, marker) in markers {
            if marker.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("marker `{name}` must not be empty")));
            }
        }
        Ok(())
    }
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}
