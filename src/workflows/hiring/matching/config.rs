use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Weights of the three components of the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub skills: f64,
    pub text: f64,
    pub career: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.skills + self.text + self.career
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            skills: 0.5,
            text: 0.3,
            career: 0.2,
        }
    }
}

/// Weights of the four Career Consistency Index sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CareerWeights {
    pub tenure: f64,
    pub frequency: f64,
    pub progression: f64,
    pub gaps: f64,
}

impl CareerWeights {
    pub fn sum(&self) -> f64 {
        self.tenure + self.frequency + self.progression + self.gaps
    }
}

impl Default for CareerWeights {
    fn default() -> Self {
        Self {
            tenure: 0.4,
            frequency: 0.3,
            progression: 0.2,
            gaps: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerConfig {
    pub weights: CareerWeights,
    /// Open-ended roles are measured up to this date.
    pub reference_date: NaiveDate,
    pub tenure_saturation_months: f64,
    pub stable_jobs_per_year: f64,
    pub change_penalty_per_job: f64,
    pub gap_threshold_months: f64,
    pub gap_penalty_per_month: f64,
}

impl CareerConfig {
    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self {
            weights: CareerWeights::default(),
            reference_date,
            tenure_saturation_months: 24.0,
            stable_jobs_per_year: 0.5,
            change_penalty_per_job: 50.0,
            gap_threshold_months: 3.0,
            gap_penalty_per_month: 5.0,
        }
    }
}

/// Immutable scoring configuration handed to every [`super::MatchingEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub weights: ScoreWeights,
    pub career: CareerConfig,
}

impl MatchingConfig {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            weights: ScoreWeights::default(),
            career: CareerConfig::with_reference_date(reference_date),
        }
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }
}
