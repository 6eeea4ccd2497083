use serde::{Deserialize, Serialize};

const MEDIUM_BAND: f64 = 1.5;
const HIGH_BAND: f64 = 2.0;
const RATIO_EPSILON: f64 = 1e-9;

/// Deviation class of a fairness metric. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Pass,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Bands a deviation against the amount the target allows:
    /// below the allowance passes, below 1.5x is medium, below 2x is high.
    pub fn from_deviation(deviation: f64, allowance: f64) -> Self {
        if deviation < allowance {
            Self::Pass
        } else if deviation < allowance * MEDIUM_BAND {
            Self::Medium
        } else if deviation < allowance * HIGH_BAND {
            Self::High
        } else {
            Self::Critical
        }
    }

    /// Bands a ratio metric where parity is 1 and `threshold` is the lowest
    /// passing value (the four-fifths rule uses 0.80).
    pub fn from_ratio(ratio: f64, threshold: f64) -> Self {
        if ratio + RATIO_EPSILON >= threshold {
            Self::Pass
        } else {
            Self::from_deviation(1.0 - ratio, 1.0 - threshold).max(Self::Medium)
        }
    }
}
