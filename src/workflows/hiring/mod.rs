//! Candidate scoring, bias auditing and fairness-aware shortlisting for one
//! job at a time.
//!
//! Scoring is pure and runs in parallel, audits are batch reductions over
//! stored applications, and shortlisting is single-flight per job through
//! [`ScreeningService`].

pub mod diagnostics;
pub mod domain;
pub mod fairness;
pub mod import;
pub mod matching;
pub mod service;
pub mod shortlist;

#[cfg(test)]
mod tests;

pub use diagnostics::{ConfigurationError, InputDataError};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, Candidate, CandidateId, Job, JobId,
    ResumeText, SalaryRange, WorkHistoryEntry,
};
pub use fairness::{
    AuditFields, AuditRecord, AuditSubject, AuditWarning, FairnessAuditor, FairnessConfig,
    FairnessMetric, FairnessReport, GroupStatistics, MetricResult, MetricStatus, Severity,
};
pub use import::{load_candidates, load_job, parse_audit_rows, ImportError};
pub use matching::{MatchingConfig, MatchingEngine, ScoreResult, ScoreWeights};
pub use service::{
    InMemoryScreeningRepository, RepositoryError, ScreeningRepository, ScreeningService,
    ScreeningServiceError,
};
pub use shortlist::{
    Adjustment, AdjustmentDirection, ShortlistConfig, ShortlistDecision, ShortlistEngine,
    ShortlistMethod, ShortlistRequest, ShortlistResult, ShortlistWarning,
};
