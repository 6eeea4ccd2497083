use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::diagnostics::InputDataError;
use super::super::domain::WorkHistoryEntry;
use super::config::CareerConfig;

const DAYS_PER_MONTH: f64 = 30.44;

/// Career Consistency Index with its four sub-scores, each in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerConsistency {
    pub index: f64,
    pub tenure_stability: f64,
    pub change_frequency: f64,
    pub progression: f64,
    pub gap_penalty: f64,
    pub entries_used: usize,
    pub average_tenure_months: f64,
    pub jobs_per_year: f64,
}

impl CareerConsistency {
    fn empty() -> Self {
        Self {
            index: 0.0,
            tenure_stability: 0.0,
            change_frequency: 0.0,
            progression: 0.0,
            gap_penalty: 0.0,
            entries_used: 0,
            average_tenure_months: 0.0,
            jobs_per_year: 0.0,
        }
    }
}

struct Stint<'a> {
    role: &'a str,
    start: NaiveDate,
    end: NaiveDate,
}

impl Stint<'_> {
    fn months(&self) -> f64 {
        months_between(self.start, self.end)
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / DAYS_PER_MONTH
}

/// Scores a work history. Entries ending before they start are skipped.
pub fn score_career(
    history: &[WorkHistoryEntry],
    config: &CareerConfig,
    warnings: &mut Vec<InputDataError>,
) -> CareerConsistency {
    let mut stints = Vec::with_capacity(history.len());

    for (index, entry) in history.iter().enumerate() {
        let end = entry.end.unwrap_or(config.reference_date);
        if end < entry.start {
            let reason = if entry.end.is_some() {
                format!("end date {} precedes start date {}", end, entry.start)
            } else {
                format!(
                    "start date {} lies after the reference date {}",
                    entry.start, config.reference_date
                )
            };
            warnings.push(InputDataError::InvalidWorkHistory {
                index,
                employer: entry.employer.clone(),
                role: entry.role.clone(),
                reason,
            });
            continue;
        }

        stints.push(Stint {
            role: &entry.role,
            start: entry.start,
            end,
        });
    }

    if stints.is_empty() {
        warnings.push(InputDataError::NoWorkHistory);
        return CareerConsistency::empty();
    }

    stints.sort_by_key(|stint| (stint.start, stint.end));

    let average_tenure_months =
        stints.iter().map(Stint::months).sum::<f64>() / stints.len() as f64;
    let tenure_stability = (average_tenure_months / config.tenure_saturation_months).min(1.0) * 100.0;

    let first_start = stints[0].start;
    let last_end = stints
        .iter()
        .map(|stint| stint.end)
        .max()
        .unwrap_or(first_start);
    // The span never drops below the stable horizon (two years at the default
    // rate), so one job scores the maximum however recently it started.
    let span_floor_years = if config.stable_jobs_per_year > 0.0 {
        1.0 / config.stable_jobs_per_year
    } else {
        1.0
    };
    let span_years = (months_between(first_start, last_end) / 12.0).max(span_floor_years);
    let jobs_per_year = stints.len() as f64 / span_years;
    let change_frequency = 100.0
        - (jobs_per_year - config.stable_jobs_per_year).max(0.0) * config.change_penalty_per_job;

    let progression = progression_score(&stints);

    let gap_months = uncovered_gap_months(&stints, config.gap_threshold_months);
    let gap_penalty = 100.0 - gap_months * config.gap_penalty_per_month;

    let tenure_stability = tenure_stability.clamp(0.0, 100.0);
    let change_frequency = change_frequency.clamp(0.0, 100.0);
    let progression = progression.clamp(0.0, 100.0);
    let gap_penalty = gap_penalty.clamp(0.0, 100.0);

    let weights = &config.weights;
    let index = tenure_stability * weights.tenure
        + change_frequency * weights.frequency
        + progression * weights.progression
        + gap_penalty * weights.gaps;

    CareerConsistency {
        index: index.clamp(0.0, 100.0),
        tenure_stability,
        change_frequency,
        progression,
        gap_penalty,
        entries_used: stints.len(),
        average_tenure_months,
        jobs_per_year,
    }
}

/// Sums the stretches no earlier stint covers. `stints` must be sorted by start.
fn uncovered_gap_months(stints: &[Stint<'_>], threshold_months: f64) -> f64 {
    let mut covered_until = stints[0].end;
    let mut gap_months = 0.0;
    for stint in &stints[1..] {
        if stint.start > covered_until {
            let gap = months_between(covered_until, stint.start);
            if gap > threshold_months {
                gap_months += gap;
            }
        }
        covered_until = covered_until.max(stint.end);
    }
    gap_months
}

fn progression_score(stints: &[Stint<'_>]) -> f64 {
    const BASELINE: f64 = 50.0;

    let transitions = stints.len().saturating_sub(1);
    if transitions == 0 {
        return BASELINE;
    }

    let mut increases = 0usize;
    let mut decreases = 0usize;
    for pair in stints.windows(2) {
        let before = seniority_level(pair[0].role);
        let after = seniority_level(pair[1].role);
        if after > before {
            increases += 1;
        } else if after < before {
            decreases += 1;
        }
    }

    let transitions = transitions as f64;
    BASELINE + 50.0 * (increases as f64 / transitions) - 25.0 * (decreases as f64 / transitions)
}

/// Rough seniority ladder inferred from title keywords.
pub fn seniority_level(title: &str) -> u8 {
    let title = title.to_lowercase();
    let has = |keywords: &[&str]| {
        title
            .split(|ch: char| !ch.is_alphanumeric())
            .any(|word| keywords.contains(&word))
    };

    if has(&["chief", "cto", "ceo", "cfo", "coo", "cio"]) {
        7
    } else if has(&["vp", "vice"]) {
        6
    } else if has(&["director", "head"]) {
        5
    } else if has(&["lead", "principal", "staff", "manager"]) {
        4
    } else if has(&["senior", "sr"]) {
        3
    } else if has(&["junior", "jr", "associate", "assistant"]) {
        1
    } else if has(&["intern", "trainee", "apprentice"]) {
        0
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn entry(role: &str, start: NaiveDate, end: Option<NaiveDate>) -> WorkHistoryEntry {
        WorkHistoryEntry {
            employer: "Acme".to_string(),
            role: role.to_string(),
            start,
            end,
        }
    }

    fn config() -> CareerConfig {
        CareerConfig::with_reference_date(date(2025, 1, 1))
    }

    #[test]
    fn seniority_ladder_orders_titles() {
        assert!(seniority_level("Software Engineering Intern") < seniority_level("Junior Developer"));
        assert!(seniority_level("Junior Developer") < seniority_level("Software Engineer"));
        assert!(seniority_level("Software Engineer") < seniority_level("Senior Engineer"));
        assert!(seniority_level("Senior Engineer") < seniority_level("Engineering Manager"));
        assert!(seniority_level("Engineering Manager") < seniority_level("Director of Data"));
        assert_eq!(seniority_level("CTO"), 7);
    }

    #[test]
    fn tenure_saturates_at_twenty_four_months() {
        let mut warnings = Vec::new();
        let history = vec![entry("Engineer", date(2015, 1, 1), Some(date(2020, 1, 1)))];
        let result = score_career(&history, &config(), &mut warnings);
        assert_eq!(result.tenure_stability, 100.0);
        assert_eq!(result.progression, 50.0);
        assert_eq!(result.gap_penalty, 100.0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn steady_progression_scores_high() {
        let mut warnings = Vec::new();
        let history = vec![
            entry("Junior Analyst", date(2016, 1, 1), Some(date(2018, 6, 1))),
            entry("Analyst", date(2018, 6, 1), Some(date(2021, 1, 1))),
            entry("Senior Analyst", date(2021, 1, 1), None),
        ];
        let result = score_career(&history, &config(), &mut warnings);
        assert_eq!(result.entries_used, 3);
        assert_eq!(result.progression, 100.0);
        assert_eq!(result.gap_penalty, 100.0);
        assert_eq!(result.change_frequency, 100.0);
        assert!(result.index > 95.0);
    }

    #[test]
    fn long_gaps_reduce_the_gap_component() {
        let mut warnings = Vec::new();
        let history = vec![
            entry("Engineer", date(2018, 1, 1), Some(date(2020, 1, 1))),
            entry("Engineer", date(2021, 1, 1), Some(date(2023, 1, 1))),
        ];
        let result = score_career(&history, &config(), &mut warnings);
        assert!(result.gap_penalty < 45.0 && result.gap_penalty > 35.0);
    }

    #[test]
    fn short_gaps_are_ignored() {
        let mut warnings = Vec::new();
        let history = vec![
            entry("Engineer", date(2018, 1, 1), Some(date(2020, 1, 1))),
            entry("Engineer", date(2020, 3, 1), Some(date(2023, 1, 1))),
        ];
        let result = score_career(&history, &config(), &mut warnings);
        assert_eq!(result.gap_penalty, 100.0);
    }

    #[test]
    fn frequent_job_changes_are_penalised() {
        let mut warnings = Vec::new();
        let history: Vec<_> = (0..6)
            .map(|i| {
                let start = date(2022, 1 + i * 2, 1);
                let end = date(2022, 2 + i * 2, 28);
                entry("Engineer", start, Some(end))
            })
            .collect();
        let result = score_career(&history, &config(), &mut warnings);
        assert!(result.jobs_per_year >= 3.0);
        assert_eq!(result.change_frequency, 0.0);
        assert!(result.tenure_stability < 10.0);
    }

    #[test]
    fn overlapping_roles_cover_the_gap() {
        let mut warnings = Vec::new();
        let history = vec![
            entry("Engineer", date(2010, 1, 1), Some(date(2020, 1, 1))),
            entry("Contractor", date(2011, 1, 1), Some(date(2012, 1, 1))),
            entry("Senior Engineer", date(2015, 1, 1), Some(date(2016, 1, 1))),
        ];
        let result = score_career(&history, &config(), &mut warnings);
        assert_eq!(result.gap_penalty, 100.0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn gap_after_overlapping_roles_counts_from_latest_end() {
        let mut warnings = Vec::new();
        let history = vec![
            entry("Engineer", date(2010, 1, 1), Some(date(2015, 1, 1))),
            entry("Contractor", date(2011, 1, 1), Some(date(2012, 1, 1))),
            entry("Engineer", date(2016, 1, 1), Some(date(2020, 1, 1))),
        ];
        let result = score_career(&history, &config(), &mut warnings);
        // Twelve months uncovered between 2015-01 and 2016-01.
        assert!(result.gap_penalty > 35.0 && result.gap_penalty < 45.0);
    }

    #[test]
    fn single_recent_job_is_not_a_job_change() {
        let mut warnings = Vec::new();
        let history = vec![entry("Engineer", date(2024, 11, 1), None)];
        let result = score_career(&history, &config(), &mut warnings);
        assert!(result.jobs_per_year <= 0.5);
        assert_eq!(result.change_frequency, 100.0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn two_jobs_in_one_year_are_penalised_less_than_churn() {
        let mut warnings = Vec::new();
        let history = vec![
            entry("Engineer", date(2024, 1, 1), Some(date(2024, 6, 1))),
            entry("Engineer", date(2024, 6, 1), None),
        ];
        let result = score_career(&history, &config(), &mut warnings);
        assert!((result.jobs_per_year - 1.0).abs() < 1e-9);
        assert!((result.change_frequency - 75.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_entries_are_skipped_with_warning() {
        let mut warnings = Vec::new();
        let history = vec![
            entry("Engineer", date(2020, 1, 1), Some(date(2019, 1, 1))),
            entry("Engineer", date(2019, 1, 1), Some(date(2023, 1, 1))),
        ];
        let result = score_career(&history, &config(), &mut warnings);
        assert_eq!(result.entries_used, 1);
        assert!(matches!(
            warnings.as_slice(),
            [InputDataError::InvalidWorkHistory { index: 0, .. }]
        ));
    }

    #[test]
    fn empty_history_defaults_to_zero() {
        let mut warnings = Vec::new();
        let result = score_career(&[], &config(), &mut warnings);
        assert_eq!(result.index, 0.0);
        assert_eq!(warnings, vec![InputDataError::NoWorkHistory]);
    }
}
