use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::matching::ScoreResult;

/// Identifier wrapper for candidate records supplied by the resume parser.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub String);

/// Identifier wrapper for job postings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

/// Identifier wrapper for a (candidate, job) application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resume text as handed over by the parsing collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeText {
    pub original: String,
    #[serde(default)]
    pub anonymized: Option<String>,
}

impl ResumeText {
    /// Text used for scoring. The anonymized form wins whenever it is present.
    pub fn scoring_text(&self) -> &str {
        match self.anonymized.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.original,
        }
    }
}

/// One position in a candidate's work history. `end = None` marks the current role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkHistoryEntry {
    pub employer: String,
    pub role: String,
    pub start: NaiveDate,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

/// Read-only candidate snapshot. Group attributes are only ever read by auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub resume: ResumeText,
    #[serde(default)]
    pub work_history: Vec<WorkHistoryEntry>,
    #[serde(default)]
    pub group_attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: u32,
    pub max: u32,
}

/// Read-only job posting snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub required_skills: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub salary_range: Option<SalaryRange>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Lifecycle status stored on an application.
///
/// `Scored` is the entry state; `Shortlisted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Scored,
    Shortlisted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scored => "scored",
            Self::Shortlisted => "shortlisted",
            Self::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Shortlisted | Self::Rejected)
    }
}

/// Outcome fields every application answers without explicit labels.
pub const SHORTLISTED_FIELD: &str = "shortlisted";
pub const SELECTED_FIELD: &str = "selected";

/// A scored (candidate, job) pairing. Records are append-only: status changes
/// produce a new value through [`Application::with_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    pub score: ScoreResult,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub group_snapshot: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, bool>,
}

impl Application {
    /// Create a freshly scored application, copying the candidate's group
    /// attributes so later profile edits cannot rewrite a historical audit.
    pub fn new(id: ApplicationId, candidate: &Candidate, score: ScoreResult) -> Self {
        Self {
            id,
            candidate_id: candidate.id.clone(),
            job_id: score.job_id.clone(),
            score,
            status: ApplicationStatus::Scored,
            group_snapshot: candidate.group_attributes.clone(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, field: impl Into<String>, value: bool) -> Self {
        self.labels.insert(field.into(), value);
        self
    }

    pub fn with_status(&self, status: ApplicationStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn overall(&self) -> f64 {
        self.score.overall
    }

    pub fn group(&self, field: &str) -> Option<&str> {
        self.group_snapshot
            .get(field)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}
