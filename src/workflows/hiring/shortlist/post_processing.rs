use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::super::fairness::metrics::{disparate_impact, GroupTally};
use super::{tallies, AdjustmentDirection, MethodOutcome, RankedEntry, ShortlistConfig};
use super::{ShortlistMethod, ShortlistWarning};

/// Four-fifths rule repair by swapping the weakest selection of the most
/// selected group for the strongest rejection of the least selected group.
pub(crate) fn run(
    entries: &[RankedEntry<'_>],
    naive: &[bool],
    target: usize,
    config: &ShortlistConfig,
) -> MethodOutcome {
    let threshold = config.disparate_impact_threshold;
    let bound = config.swap_bound_factor.saturating_mul(target);

    let mut selected = naive.to_vec();
    let mut counts = tallies(entries, &selected);
    let mut adjustments = Vec::new();
    let mut iterations = 0usize;

    let mut ratio = disparate_impact(&counts);
    let mut best = (score_of(ratio), selected.clone(), 0usize);

    while !meets(ratio, threshold) && iterations < bound {
        let Some((over, under)) = swap_groups(entries, &selected, &counts) else {
            debug!("no swap candidates left for post-processing");
            break;
        };
        let Some(out_index) = lowest_selected(entries, &selected, &over) else {
            break;
        };
        let Some(in_index) = highest_unselected(entries, &selected, &under) else {
            break;
        };

        iterations += 1;
        let before = ratio;
        let over_rate = rate(&counts, &over);
        let under_rate = rate(&counts, &under);

        selected[out_index] = false;
        selected[in_index] = true;
        if let Some(tally) = counts.get_mut(&over) {
            tally.selected -= 1;
        }
        if let Some(tally) = counts.get_mut(&under) {
            tally.selected += 1;
        }
        ratio = disparate_impact(&counts);

        let before_label = label(before);
        adjustments.push(entries[out_index].adjustment(
            AdjustmentDirection::MovedOut,
            format!(
                "swap {iterations}: lowest-scoring selection in over-selected group '{over}' (rate {over_rate:.2}); disparate impact {before_label} -> {}",
                label(ratio)
            ),
        ));
        adjustments.push(entries[in_index].adjustment(
            AdjustmentDirection::MovedIn,
            format!(
                "swap {iterations}: highest-scoring rejection in under-selected group '{under}' (rate {under_rate:.2}); disparate impact {before_label} -> {}",
                label(ratio)
            ),
        ));

        if score_of(ratio) > best.0 {
            best = (score_of(ratio), selected.clone(), adjustments.len());
        }
    }

    let converged = meets(ratio, threshold);
    let mut warnings = Vec::new();
    if !converged {
        let (best_score, best_selection, kept) = best;
        selected = best_selection;
        adjustments.truncate(kept);
        let best_ratio = (best_score >= 0.0).then_some(best_score);
        warn!(iterations, ?best_ratio, "post-processing hit its swap bound");
        warnings.push(ShortlistWarning::NonConvergence {
            method: ShortlistMethod::PostProcessing,
            iterations,
            best_ratio,
        });
    }

    MethodOutcome {
        selected,
        adjustments,
        iterations,
        converged,
        warnings,
        ..MethodOutcome::default()
    }
}

/// Undefined ratios mean no grouped application is selected, which the
/// four-fifths rule cannot fault.
fn meets(ratio: Option<f64>, threshold: f64) -> bool {
    ratio.map(|ratio| ratio + 1e-9 >= threshold).unwrap_or(true)
}

fn score_of(ratio: Option<f64>) -> f64 {
    ratio.unwrap_or(-1.0)
}

fn label(ratio: Option<f64>) -> String {
    match ratio {
        Some(ratio) => format!("{ratio:.3}"),
        None => "N/A".to_string(),
    }
}

fn rate(counts: &BTreeMap<String, GroupTally>, group: &str) -> f64 {
    counts
        .get(group)
        .map(GroupTally::selection_rate)
        .unwrap_or(0.0)
}

/// Picks the most selected group that still has a selection to give up and
/// the least selected group that still has someone to promote.
fn swap_groups(
    entries: &[RankedEntry<'_>],
    selected: &[bool],
    counts: &BTreeMap<String, GroupTally>,
) -> Option<(String, String)> {
    let over = counts
        .iter()
        .filter(|(_, tally)| tally.selected > 0)
        .max_by(|(a_group, a), (b_group, b)| {
            a.selection_rate()
                .total_cmp(&b.selection_rate())
                .then_with(|| b_group.cmp(a_group))
        })
        .map(|(group, _)| group.clone())?;

    let under = counts
        .iter()
        .filter(|(group, tally)| *group != &over && tally.selected < tally.total)
        .min_by(|(a_group, a), (b_group, b)| {
            a.selection_rate()
                .total_cmp(&b.selection_rate())
                .then_with(|| a_group.cmp(b_group))
        })
        .map(|(group, _)| group.clone())?;

    if rate(counts, &under) >= rate(counts, &over) {
        return None;
    }

    debug_assert!(highest_unselected(entries, selected, &under).is_some());
    Some((over, under))
}

fn lowest_selected(entries: &[RankedEntry<'_>], selected: &[bool], group: &str) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .rev()
        .find(|(index, entry)| selected[*index] && entry.group.as_deref() == Some(group))
        .map(|(index, _)| index)
}

fn highest_unselected(
    entries: &[RankedEntry<'_>],
    selected: &[bool],
    group: &str,
) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .find(|(index, entry)| !selected[*index] && entry.group.as_deref() == Some(group))
        .map(|(index, _)| index)
}
