use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::workflows::hiring::domain::{
    Application, ApplicationId, ApplicationStatus, Candidate, CandidateId, Job, JobId, ResumeText,
    WorkHistoryEntry,
};
use crate::workflows::hiring::matching::{CareerConsistency, MatchingConfig, ScoreResult};

pub(super) const GROUP_FIELD: &str = "gender";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn matching_config() -> MatchingConfig {
    MatchingConfig::new(date(2025, 1, 1))
}

pub(super) fn job_id() -> JobId {
    JobId("job-1".to_string())
}

pub(super) fn job(required_skills: &[&str], description: &str) -> Job {
    Job {
        id: job_id(),
        title: "Data Engineer".to_string(),
        required_skills: required_skills.iter().map(|skill| skill.to_string()).collect(),
        description: description.to_string(),
        salary_range: None,
        location: None,
    }
}

pub(super) fn candidate(id: &str, skills: &[&str], group: Option<&str>) -> Candidate {
    let mut group_attributes = BTreeMap::new();
    if let Some(group) = group {
        group_attributes.insert(GROUP_FIELD.to_string(), group.to_string());
    }

    Candidate {
        id: CandidateId(id.to_string()),
        skills: skills
            .iter()
            .map(|skill| skill.to_string())
            .collect::<BTreeSet<_>>(),
        resume: ResumeText {
            original: "Data engineer building Python and SQL pipelines on cloud warehouses."
                .to_string(),
            anonymized: None,
        },
        work_history: vec![
            WorkHistoryEntry {
                employer: "Initech".to_string(),
                role: "Junior Data Engineer".to_string(),
                start: date(2018, 1, 1),
                end: Some(date(2020, 12, 31)),
            },
            WorkHistoryEntry {
                employer: "Globex".to_string(),
                role: "Data Engineer".to_string(),
                start: date(2021, 1, 1),
                end: None,
            },
        ],
        group_attributes,
    }
}

/// Score with a fixed overall value, for ranking tests that bypass matching.
pub(super) fn fixed_score(candidate_id: &CandidateId, overall: f64) -> ScoreResult {
    ScoreResult {
        candidate_id: candidate_id.clone(),
        job_id: job_id(),
        skill_match: overall / 100.0,
        text_similarity: overall / 100.0,
        cci: overall,
        overall,
        matched_skills: Vec::new(),
        missing_skills: Vec::new(),
        career: CareerConsistency {
            index: overall,
            tenure_stability: overall,
            change_frequency: overall,
            progression: overall,
            gap_penalty: overall,
            entries_used: 1,
            average_tenure_months: 24.0,
            jobs_per_year: 0.5,
        },
        warnings: Vec::new(),
    }
}

pub(super) fn application(id: &str, group: Option<&str>, overall: f64) -> Application {
    let candidate = candidate(id, &[], group);
    let score = fixed_score(&candidate.id, overall);
    Application::new(ApplicationId(format!("app-{id}")), &candidate, score)
}

/// `count` applications for `group` whose scores centre on `mean`, one point apart.
pub(super) fn cohort(group: &str, count: usize, mean: f64) -> Vec<Application> {
    let middle = (count as f64 - 1.0) / 2.0;
    (0..count)
        .map(|index| {
            let overall = mean + (middle - index as f64);
            application(&format!("{group}-{index:02}"), Some(group), overall)
        })
        .collect()
}

/// Two groups of ten; group A averages 80 and group B averages 60.
pub(super) fn skewed_pool() -> Vec<Application> {
    let mut pool = cohort("A", 10, 80.0);
    pool.extend(cohort("B", 10, 60.0));
    pool
}

/// Two groups of ten with interleaved scores.
pub(super) fn balanced_pool() -> Vec<Application> {
    (0..20)
        .map(|index| {
            let group = if index % 2 == 0 { "A" } else { "B" };
            application(&format!("mix-{index:02}"), Some(group), 90.0 - index as f64)
        })
        .collect()
}

pub(super) fn decided(applications: Vec<Application>, shortlisted: usize) -> Vec<Application> {
    applications
        .into_iter()
        .enumerate()
        .map(|(index, application)| {
            let status = if index < shortlisted {
                ApplicationStatus::Shortlisted
            } else {
                ApplicationStatus::Rejected
            };
            application.with_status(status)
        })
        .collect()
}
