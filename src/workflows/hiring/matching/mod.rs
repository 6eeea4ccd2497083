//! Candidate/job scoring: skill overlap, resume text similarity and career consistency.

mod career;
mod config;
pub mod lexicon;
pub mod similarity;

pub use career::{score_career, seniority_level, CareerConsistency};
pub use config::{CareerConfig, CareerWeights, MatchingConfig, ScoreWeights};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::diagnostics::InputDataError;
use super::domain::{Candidate, CandidateId, Job, JobId};
use lexicon::{extract_skills, normalize_skill_set};
use similarity::text_similarity;

/// Score of one candidate against one job. Re-scoring produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    /// Share of required skills covered, in `[0, 1]`.
    pub skill_match: f64,
    /// TF-IDF cosine between resume and job description, in `[0, 1]`.
    pub text_similarity: f64,
    /// Career Consistency Index, in `[0, 100]`.
    pub cci: f64,
    /// Weighted composite, in `[0, 100]`.
    pub overall: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub career: CareerConsistency,
    #[serde(default)]
    pub warnings: Vec<InputDataError>,
}

impl ScoreResult {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Stateless scorer. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    config: MatchingConfig,
}

impl MatchingEngine {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn score(&self, candidate: &Candidate, job: &Job) -> ScoreResult {
        let mut warnings = Vec::new();

        let required = normalize_skill_set(&job.required_skills);
        let offered = if candidate.skills.is_empty() {
            let extracted = extract_skills(candidate.resume.scoring_text());
            warnings.push(InputDataError::SkillsFromResume {
                extracted: extracted.len(),
            });
            extracted
        } else {
            normalize_skill_set(&candidate.skills)
        };
        let matched_skills: Vec<String> = required.intersection(&offered).cloned().collect();
        let missing_skills: Vec<String> = required.difference(&offered).cloned().collect();

        let skill_match = if required.is_empty() {
            warnings.push(InputDataError::NoRequiredSkills {
                job_id: job.id.clone(),
            });
            0.0
        } else {
            matched_skills.len() as f64 / required.len() as f64
        };

        let resume_text = candidate.resume.scoring_text();
        let text_similarity = if job.description.trim().is_empty() {
            warnings.push(InputDataError::EmptyJobDescription {
                job_id: job.id.clone(),
            });
            0.0
        } else if resume_text.trim().is_empty() {
            warnings.push(InputDataError::EmptyResumeText);
            0.0
        } else {
            text_similarity(&job.description, resume_text)
        };

        let career = score_career(&candidate.work_history, &self.config.career, &mut warnings);
        let cci = career.index;

        let weights = self.config.weights;
        let overall = (weights.skills * skill_match * 100.0
            + weights.text * text_similarity * 100.0
            + weights.career * cci)
            .clamp(0.0, 100.0);

        for warning in &warnings {
            warn!(candidate = %candidate.id, job = %job.id, %warning, "input data issue while scoring");
        }
        debug!(
            candidate = %candidate.id,
            job = %job.id,
            skill_match,
            text_similarity,
            cci,
            overall,
            "scored candidate"
        );

        ScoreResult {
            candidate_id: candidate.id.clone(),
            job_id: job.id.clone(),
            skill_match: skill_match.clamp(0.0, 1.0),
            text_similarity: text_similarity.clamp(0.0, 1.0),
            cci,
            overall,
            matched_skills,
            missing_skills,
            career,
            warnings,
        }
    }

    /// Scores every candidate against one job on scoped worker threads.
    /// Results keep the input order.
    pub fn score_batch(&self, candidates: &[Candidate], job: &Job) -> Vec<ScoreResult> {
        let workers = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1)
            .min(candidates.len().max(1));
        if workers <= 1 || candidates.len() < 2 {
            return candidates
                .iter()
                .map(|candidate| self.score(candidate, job))
                .collect();
        }

        let chunk_size = candidates.len().div_ceil(workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|candidate| self.score(candidate, job))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(results) => results,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}
