use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{diff_adjustments, AdjustmentDirection, MethodOutcome, RankedEntry, ShortlistConfig};
use super::ShortlistWarning;

/// Bucket name for applications without a value in the group field.
pub const UNSPECIFIED_GROUP: &str = "unspecified";

const SCORE_CEILING: f64 = 100.0;
/// Cutoff no score can reach.
const CLOSED_THRESHOLD: f64 = SCORE_CEILING + 1.0;

/// Outcome of the per-group threshold search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupThreshold {
    pub group: String,
    pub applicants: usize,
    pub threshold: f64,
    /// Share of the group above its threshold once the shortlist is settled.
    pub achieved_rate: f64,
    pub target_rate: f64,
    pub tolerance: f64,
    pub iterations: usize,
    pub converged: bool,
}

struct Bucket {
    members: Vec<usize>,
    threshold: f64,
    iterations: usize,
    converged: bool,
    tolerance: f64,
}

impl Bucket {
    fn selected(&self, selected: &[bool]) -> usize {
        self.members.iter().filter(|index| selected[**index]).count()
    }

    fn rate(&self, selected: &[bool]) -> f64 {
        self.selected(selected) as f64 / self.members.len() as f64
    }
}

/// Finds, per group, the score cutoff whose selection rate sits closest to
/// the overall target rate, then trims or fills to land on exactly `target`.
pub(crate) fn run(
    entries: &[RankedEntry<'_>],
    naive: &[bool],
    target: usize,
    config: &ShortlistConfig,
) -> MethodOutcome {
    let target_rate = target as f64 / entries.len() as f64;

    let mut members: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, entry) in entries.iter().enumerate() {
        let group = entry.group.as_deref().unwrap_or(UNSPECIFIED_GROUP);
        members.entry(group.to_string()).or_default().push(index);
    }

    let mut buckets: BTreeMap<String, Bucket> = members
        .into_iter()
        .map(|(group, members)| {
            let bucket = search(entries, members, target_rate, config);
            (group, bucket)
        })
        .collect();

    let mut selected = vec![false; entries.len()];
    for bucket in buckets.values() {
        for index in &bucket.members {
            if entries[*index].overall() >= bucket.threshold {
                selected[*index] = true;
            }
        }
    }

    rebalance(entries, &mut buckets, &mut selected, target, target_rate);

    let mut warnings = Vec::new();
    let mut group_thresholds = Vec::with_capacity(buckets.len());
    let mut iterations = 0usize;
    for (group, bucket) in &buckets {
        let achieved_rate = bucket.rate(&selected);
        iterations = iterations.max(bucket.iterations);
        if !bucket.converged {
            warn!(
                group = %group,
                achieved_rate,
                target_rate,
                iterations = bucket.iterations,
                "threshold search did not converge"
            );
            warnings.push(ShortlistWarning::ThresholdNotConverged {
                group: group.clone(),
                achieved_rate,
                target_rate,
            });
        }
        group_thresholds.push(GroupThreshold {
            group: group.clone(),
            applicants: bucket.members.len(),
            threshold: bucket.threshold,
            achieved_rate,
            target_rate,
            tolerance: bucket.tolerance,
            iterations: bucket.iterations,
            converged: bucket.converged,
        });
    }
    let converged = buckets.values().all(|bucket| bucket.converged);

    let adjustments = diff_adjustments(entries, naive, &selected, |entry, direction| {
        let group = entry.group.as_deref().unwrap_or(UNSPECIFIED_GROUP);
        let cutoff = buckets
            .get(group)
            .map(|bucket| bucket.threshold)
            .unwrap_or(0.0);
        match direction {
            AdjustmentDirection::MovedIn => format!(
                "score {:.2} clears the group '{group}' threshold {cutoff:.2} aimed at selection rate {target_rate:.3}",
                entry.overall()
            ),
            AdjustmentDirection::MovedOut => format!(
                "group '{group}' threshold {cutoff:.2} aimed at selection rate {target_rate:.3} leaves score {:.2} out",
                entry.overall()
            ),
        }
    });

    debug!(
        groups = group_thresholds.len(),
        moves = adjustments.len(),
        converged,
        "threshold optimisation applied"
    );

    MethodOutcome {
        selected,
        adjustments,
        iterations,
        converged,
        warnings,
        group_thresholds,
        ..MethodOutcome::default()
    }
}

/// Bisection over the score scale. A group of `n` can only hit rates in
/// steps of `1/n`, so the tolerance widens to half a step for small groups.
fn search(
    entries: &[RankedEntry<'_>],
    members: Vec<usize>,
    target_rate: f64,
    config: &ShortlistConfig,
) -> Bucket {
    let size = members.len() as f64;
    let tolerance = config.threshold_tolerance.max(0.5 / size);
    let rate_at = |threshold: f64| {
        members
            .iter()
            .filter(|index| entries[**index].overall() >= threshold)
            .count() as f64
            / size
    };

    let mut low = 0.0;
    let mut high = CLOSED_THRESHOLD;
    let mut best = (f64::INFINITY, low);
    let mut iterations = 0usize;
    let mut converged = false;

    while iterations < config.max_threshold_iterations {
        iterations += 1;
        let mid = (low + high) / 2.0;
        let rate = rate_at(mid);
        let gap = (rate - target_rate).abs();
        // Equal gaps keep the lower cutoff.
        if gap < best.0 || (gap == best.0 && mid < best.1) {
            best = (gap, mid);
        }
        if gap <= tolerance {
            converged = true;
            break;
        }
        // Raising the cutoff lowers the rate.
        if rate > target_rate {
            low = mid;
        } else {
            high = mid;
        }
    }

    Bucket {
        members,
        threshold: best.1,
        iterations,
        converged,
        tolerance,
    }
}

/// Drops the weakest selection from the group furthest above the target rate
/// or adds the strongest rejection from the group furthest below it until the
/// shortlist holds exactly `target` applications.
fn rebalance(
    entries: &[RankedEntry<'_>],
    buckets: &mut BTreeMap<String, Bucket>,
    selected: &mut [bool],
    target: usize,
    target_rate: f64,
) {
    let mut count = selected.iter().filter(|chosen| **chosen).count();

    while count > target {
        let Some(bucket) = buckets
            .values()
            .filter(|bucket| bucket.selected(selected) > 0)
            .max_by(|a, b| {
                (a.rate(selected) - target_rate).total_cmp(&(b.rate(selected) - target_rate))
            })
        else {
            break;
        };
        let Some(index) = bucket
            .members
            .iter()
            .rev()
            .copied()
            .find(|index| selected[*index])
        else {
            break;
        };
        selected[index] = false;
        count -= 1;
    }

    while count < target {
        let Some(bucket) = buckets
            .values()
            .filter(|bucket| bucket.selected(selected) < bucket.members.len())
            .min_by(|a, b| {
                (a.rate(selected) - target_rate).total_cmp(&(b.rate(selected) - target_rate))
            })
        else {
            break;
        };
        let Some(index) = bucket
            .members
            .iter()
            .copied()
            .find(|index| !selected[*index])
        else {
            break;
        };
        selected[index] = true;
        count += 1;
    }

    // The cutoff reported per group follows the final selection.
    for bucket in buckets.values_mut() {
        let lowest_selected = bucket
            .members
            .iter()
            .filter(|index| selected[**index])
            .map(|index| entries[*index].overall())
            .fold(f64::INFINITY, f64::min);
        bucket.threshold = if lowest_selected.is_finite() {
            lowest_selected
        } else {
            CLOSED_THRESHOLD
        };
    }
}
