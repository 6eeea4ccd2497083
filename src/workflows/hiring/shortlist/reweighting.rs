use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::super::diagnostics::ConfigurationError;
use super::{diff_adjustments, AdjustmentDirection, MethodOutcome, RankedEntry};

const NORMALIZATION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupWeight {
    pub group: String,
    pub applicants: usize,
    pub observed_proportion: f64,
    pub expected_proportion: f64,
    pub weight: f64,
}

/// Group weights and the normalisation check `Σ weight × observed = 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReweightingSummary {
    pub weights: Vec<GroupWeight>,
    pub normalization: f64,
}

impl ReweightingSummary {
    pub fn is_normalized(&self) -> bool {
        (self.normalization - 1.0).abs() < NORMALIZATION_TOLERANCE
    }

    pub fn weight(&self, group: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|weight| weight.group == group)
            .map(|weight| weight.weight)
    }
}

/// Kamiran & Calders style reweighting: scores are scaled by
/// `expected(g) / observed(g)` and re-ranked.
pub(crate) fn compute_weights(
    entries: &[RankedEntry<'_>],
    target_distribution: Option<&BTreeMap<String, f64>>,
) -> Result<ReweightingSummary, ConfigurationError> {
    let mut applicants: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        if let Some(group) = entry.group.as_deref() {
            *applicants.entry(group).or_insert(0) += 1;
        }
    }

    let grouped_total: usize = applicants.values().sum();
    if grouped_total == 0 {
        return Ok(ReweightingSummary {
            weights: Vec::new(),
            normalization: 1.0,
        });
    }

    let expected: BTreeMap<&str, f64> = match target_distribution {
        None => {
            let share = 1.0 / applicants.len() as f64;
            applicants.keys().map(|group| (*group, share)).collect()
        }
        Some(distribution) => {
            let mut shares = BTreeMap::new();
            for group in applicants.keys() {
                let share = distribution.get(*group).copied().ok_or_else(|| {
                    ConfigurationError::MissingTargetShare {
                        group: (*group).to_string(),
                    }
                })?;
                shares.insert(*group, share);
            }
            let sum: f64 = shares.values().sum();
            shares
                .into_iter()
                .map(|(group, share)| (group, share / sum))
                .collect()
        }
    };

    let weights: Vec<GroupWeight> = applicants
        .iter()
        .map(|(group, count)| {
            let observed = *count as f64 / grouped_total as f64;
            let expected_share = expected.get(group).copied().unwrap_or(0.0);
            GroupWeight {
                group: (*group).to_string(),
                applicants: *count,
                observed_proportion: observed,
                expected_proportion: expected_share,
                weight: expected_share / observed,
            }
        })
        .collect();

    let normalization = weights
        .iter()
        .map(|weight| weight.weight * weight.observed_proportion)
        .sum();

    Ok(ReweightingSummary {
        weights,
        normalization,
    })
}

pub(crate) fn run(
    entries: &[RankedEntry<'_>],
    naive: &[bool],
    target: usize,
    target_distribution: Option<&BTreeMap<String, f64>>,
) -> Result<MethodOutcome, ConfigurationError> {
    let summary = compute_weights(entries, target_distribution)?;
    if !summary.is_normalized() {
        warn!(
            normalization = summary.normalization,
            "reweighting weights failed the normalisation check"
        );
    }

    let weight_of = |entry: &RankedEntry<'_>| {
        entry
            .group
            .as_deref()
            .and_then(|group| summary.weight(group))
            .unwrap_or(1.0)
    };

    let mut order: Vec<(usize, f64)> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| (index, entry.overall() * weight_of(entry)))
        .collect();
    // Merit rank breaks ties so equal adjusted scores keep their original order.
    order.sort_by(|(a_index, a), (b_index, b)| b.total_cmp(a).then_with(|| a_index.cmp(b_index)));

    let mut selected = vec![false; entries.len()];
    for (index, _) in order.iter().take(target) {
        selected[*index] = true;
    }
    let cutoff = order
        .get(target.saturating_sub(1))
        .map(|(_, adjusted)| *adjusted)
        .unwrap_or(0.0);

    let adjustments = diff_adjustments(entries, naive, &selected, |entry, direction| {
        let weight = weight_of(entry);
        let adjusted = entry.overall() * weight;
        let group = entry.group.as_deref().unwrap_or("unspecified");
        match direction {
            AdjustmentDirection::MovedIn => format!(
                "group '{group}' weight {weight:.3} lifts score {:.2} to {adjusted:.2}, inside the reweighted top {target}",
                entry.overall()
            ),
            AdjustmentDirection::MovedOut => format!(
                "group '{group}' weight {weight:.3} lowers score {:.2} to {adjusted:.2}, below the reweighted cutoff {cutoff:.2}",
                entry.overall()
            ),
        }
    });

    debug!(
        groups = summary.weights.len(),
        moves = adjustments.len(),
        "reweighting applied"
    );

    Ok(MethodOutcome {
        selected,
        adjustments,
        iterations: 1,
        converged: true,
        reweighting: Some(summary),
        ..MethodOutcome::default()
    })
}
