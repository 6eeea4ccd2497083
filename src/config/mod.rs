use std::env;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::workflows::hiring::matching::{MatchingConfig, ScoreWeights};
use crate::workflows::hiring::{FairnessConfig, ShortlistConfig};

/// Distinguishes runtime behavior for different stages of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub weights: ScoreWeights,
    pub fairness: FairnessConfig,
    pub shortlist: ShortlistConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = ScoreWeights::default();
        let weights = ScoreWeights {
            skills: read_var("TALENT_WEIGHT_SKILLS", defaults.skills)?,
            text: read_var("TALENT_WEIGHT_TEXT", defaults.text)?,
            career: read_var("TALENT_WEIGHT_CAREER", defaults.career)?,
        };
        if [weights.skills, weights.text, weights.career]
            .iter()
            .any(|weight| *weight < 0.0)
            || (weights.sum() - 1.0).abs() > 1e-6
        {
            return Err(ConfigError::InvalidWeights { sum: weights.sum() });
        }

        let fairness_defaults = FairnessConfig::default();
        let fairness = FairnessConfig {
            min_group_size: read_var("TALENT_MIN_GROUP_SIZE", fairness_defaults.min_group_size)?,
            parity_target: read_var("TALENT_FAIRNESS_TARGET", fairness_defaults.parity_target)?,
            disparate_impact_threshold: read_var(
                "TALENT_DISPARATE_IMPACT_THRESHOLD",
                fairness_defaults.disparate_impact_threshold,
            )?,
        };
        if fairness.min_group_size == 0 {
            return Err(ConfigError::OutOfRange {
                var: "TALENT_MIN_GROUP_SIZE",
            });
        }
        if !(fairness.parity_target > 0.0 && fairness.parity_target < 1.0) {
            return Err(ConfigError::OutOfRange {
                var: "TALENT_FAIRNESS_TARGET",
            });
        }
        if !(fairness.disparate_impact_threshold > 0.0 && fairness.disparate_impact_threshold <= 1.0)
        {
            return Err(ConfigError::OutOfRange {
                var: "TALENT_DISPARATE_IMPACT_THRESHOLD",
            });
        }

        let shortlist_defaults = ShortlistConfig::default();
        let shortlist = ShortlistConfig {
            disparate_impact_threshold: fairness.disparate_impact_threshold,
            threshold_tolerance: read_var(
                "TALENT_THRESHOLD_TOLERANCE",
                shortlist_defaults.threshold_tolerance,
            )?,
            max_threshold_iterations: read_var(
                "TALENT_THRESHOLD_MAX_ITERATIONS",
                shortlist_defaults.max_threshold_iterations,
            )?,
            ..shortlist_defaults
        };
        if shortlist.validate().is_err() {
            return Err(ConfigError::OutOfRange {
                var: "TALENT_THRESHOLD_TOLERANCE",
            });
        }

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            weights,
            fairness,
            shortlist,
        })
    }

    /// Scoring configuration anchored at `reference_date`, the date open-ended
    /// roles are measured up to.
    pub fn matching(&self, reference_date: NaiveDate) -> MatchingConfig {
        MatchingConfig::new(reference_date).with_weights(self.weights)
    }
}

fn read_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        _ => Ok(default),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { var: &'static str, value: String },
    InvalidWeights { sum: f64 },
    OutOfRange { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a number (found '{value}')")
            }
            ConfigError::InvalidWeights { sum } => write!(
                f,
                "TALENT_WEIGHT_* values must be non-negative and sum to 1 (sum is {sum})"
            ),
            ConfigError::OutOfRange { var } => write!(f, "{var} is outside its allowed range"),
        }
    }
}

impl std::error::Error for ConfigError {}
