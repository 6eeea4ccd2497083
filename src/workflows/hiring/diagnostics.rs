use serde::{Deserialize, Serialize};

use super::domain::JobId;

/// Malformed or missing input data. Recovered locally with a conservative
/// default and attached to the result as a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputDataError {
    #[error("job {job_id} lists no required skills; skill match defaults to 0")]
    NoRequiredSkills { job_id: JobId },
    #[error("job {job_id} has no description text; text similarity defaults to 0")]
    EmptyJobDescription { job_id: JobId },
    #[error("candidate lists no skills; {extracted} skill(s) taken from the resume text")]
    SkillsFromResume { extracted: usize },
    #[error("resume text is empty; text similarity defaults to 0")]
    EmptyResumeText,
    #[error("work history entry {index} ({role} at {employer}) skipped: {reason}")]
    InvalidWorkHistory {
        index: usize,
        employer: String,
        role: String,
        reason: String,
    },
    #[error("no usable work history; career consistency defaults to 0")]
    NoWorkHistory,
}

/// Programmer errors surfaced immediately to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unknown shortlisting method '{0}' (expected post_processing, reweighting or threshold_optimization)")]
    UnknownMethod(String),
    #[error("target count must not be negative (found {0})")]
    NegativeTargetCount(i64),
    #[error("group field must not be empty")]
    EmptyGroupField,
    #[error("target distribution for group '{group}' must be a positive finite number (found {value})")]
    InvalidTargetShare { group: String, value: f64 },
    #[error("target distribution has no share for observed group '{group}'")]
    MissingTargetShare { group: String },
    #[error("tolerance must lie in (0, 1) (found {0})")]
    InvalidTolerance(f64),
}
