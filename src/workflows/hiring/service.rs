use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use super::diagnostics::ConfigurationError;
use super::domain::{Application, ApplicationId, Candidate, Job, JobId};
use super::fairness::{AuditFields, FairnessAuditor, FairnessReport};
use super::matching::MatchingEngine;
use super::shortlist::{ShortlistEngine, ShortlistRequest, ShortlistResult};

/// Append-only storage for everything the pipeline produces. Status changes
/// arrive as new application records; the latest record per id wins.
pub trait ScreeningRepository: Send + Sync {
    fn append_application(&self, application: Application) -> Result<(), RepositoryError>;
    fn applications_for(&self, job_id: &JobId) -> Result<Vec<Application>, RepositoryError>;
    fn append_report(&self, report: FairnessReport) -> Result<(), RepositoryError>;
    fn reports_for(&self, job_id: &JobId) -> Result<Vec<FairnessReport>, RepositoryError>;
    fn append_shortlist(&self, result: ShortlistResult) -> Result<(), RepositoryError>;
    fn shortlists_for(&self, job_id: &JobId) -> Result<Vec<ShortlistResult>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record is not scoped to a job")]
    Unscoped,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default)]
struct JobHistory {
    applications: Vec<Application>,
    reports: Vec<FairnessReport>,
    shortlists: Vec<ShortlistResult>,
}

/// Process-local repository keyed by job.
#[derive(Debug, Default)]
pub struct InMemoryScreeningRepository {
    jobs: Mutex<HashMap<JobId, JobHistory>>,
}

impl InMemoryScreeningRepository {
    fn jobs(&self) -> Result<MutexGuard<'_, HashMap<JobId, JobHistory>>, RepositoryError> {
        self.jobs
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    fn read<T, F>(&self, job_id: &JobId, pick: F) -> Result<Vec<T>, RepositoryError>
    where
        T: Clone,
        F: FnOnce(&JobHistory) -> &Vec<T>,
    {
        let jobs = self.jobs()?;
        Ok(jobs.get(job_id).map(|history| pick(history).clone()).unwrap_or_default())
    }
}

impl ScreeningRepository for InMemoryScreeningRepository {
    fn append_application(&self, application: Application) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs()?;
        jobs.entry(application.job_id.clone())
            .or_default()
            .applications
            .push(application);
        Ok(())
    }

    fn applications_for(&self, job_id: &JobId) -> Result<Vec<Application>, RepositoryError> {
        self.read(job_id, |history| &history.applications)
    }

    fn append_report(&self, report: FairnessReport) -> Result<(), RepositoryError> {
        let job_id = report.job_id.clone().ok_or(RepositoryError::Unscoped)?;
        self.jobs()?.entry(job_id).or_default().reports.push(report);
        Ok(())
    }

    fn reports_for(&self, job_id: &JobId) -> Result<Vec<FairnessReport>, RepositoryError> {
        self.read(job_id, |history| &history.reports)
    }

    fn append_shortlist(&self, result: ShortlistResult) -> Result<(), RepositoryError> {
        let job_id = result.job_id.clone().ok_or(RepositoryError::Unscoped)?;
        self.jobs()?.entry(job_id).or_default().shortlists.push(result);
        Ok(())
    }

    fn shortlists_for(&self, job_id: &JobId) -> Result<Vec<ShortlistResult>, RepositoryError> {
        self.read(job_id, |history| &history.shortlists)
    }
}

/// Error raised by the screening service.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningServiceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("a shortlist for job {0} is already running")]
    ShortlistInProgress(JobId),
}

/// Scores, audits and shortlists one job at a time on top of a repository.
pub struct ScreeningService<R> {
    repository: Arc<R>,
    matching: MatchingEngine,
    auditor: FairnessAuditor,
    shortlister: ShortlistEngine,
    in_flight: Mutex<HashSet<JobId>>,
}

impl<R> ScreeningService<R>
where
    R: ScreeningRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        matching: MatchingEngine,
        auditor: FairnessAuditor,
        shortlister: ShortlistEngine,
    ) -> Self {
        Self {
            repository,
            matching,
            auditor,
            shortlister,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Scores every candidate for `job` and stores one application each.
    /// Re-scoring a candidate appends a newer record under the same id.
    pub fn score_applicants(
        &self,
        job: &Job,
        candidates: &[Candidate],
    ) -> Result<Vec<Application>, ScreeningServiceError> {
        let scores = self.matching.score_batch(candidates, job);
        let mut applications = Vec::with_capacity(scores.len());

        for (candidate, score) in candidates.iter().zip(scores) {
            let id = ApplicationId(format!("{}/{}", job.id, candidate.id));
            let application = Application::new(id, candidate, score);
            self.repository.append_application(application.clone())?;
            applications.push(application);
        }

        let flagged = applications
            .iter()
            .filter(|application| application.score.has_warnings())
            .count();
        info!(job = %job.id, scored = applications.len(), flagged, "applicants scored");
        Ok(applications)
    }

    /// Latest record of every application stored for the job, in id order.
    pub fn current_applications(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<Application>, ScreeningServiceError> {
        let mut latest: BTreeMap<ApplicationId, Application> = BTreeMap::new();
        for application in self.repository.applications_for(job_id)? {
            latest.insert(application.id.clone(), application);
        }
        Ok(latest.into_values().collect())
    }

    pub fn audit_job(
        &self,
        job_id: &JobId,
        fields: &AuditFields,
    ) -> Result<FairnessReport, ScreeningServiceError> {
        let applications = self.current_applications(job_id)?;
        let report = self.auditor.audit_job(job_id, &applications, fields);
        self.repository.append_report(report.clone())?;
        Ok(report)
    }

    /// Shortlists the job's current applications. Only one shortlist per job
    /// may run at a time; the baseline and final audits travel with the result.
    pub fn shortlist_job(
        &self,
        job_id: &JobId,
        request: &ShortlistRequest,
    ) -> Result<ShortlistResult, ScreeningServiceError> {
        let _guard = self.begin_shortlist(job_id)?;

        let applications = self.current_applications(job_id)?;
        let mut result = self.shortlister.shortlist(&applications, request)?;
        result.job_id = Some(job_id.clone());

        for application in result.apply(&applications) {
            self.repository.append_application(application)?;
        }
        if let Some(report) = &result.final_audit {
            self.repository.append_report(report.clone())?;
        }
        self.repository.append_shortlist(result.clone())?;

        if !result.fully_compliant && !result.is_empty() {
            warn!(job = %job_id, method = %result.method, "stored shortlist is not fully compliant");
        }
        Ok(result)
    }

    /// Claims the per-job shortlist slot until the returned guard drops.
    pub(crate) fn begin_shortlist(
        &self,
        job_id: &JobId,
    ) -> Result<ShortlistGuard<'_>, ScreeningServiceError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(job_id.clone()) {
            return Err(ScreeningServiceError::ShortlistInProgress(job_id.clone()));
        }
        Ok(ShortlistGuard {
            in_flight: &self.in_flight,
            job_id: job_id.clone(),
        })
    }
}

pub(crate) struct ShortlistGuard<'a> {
    in_flight: &'a Mutex<HashSet<JobId>>,
    job_id: JobId,
}

impl Drop for ShortlistGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}
