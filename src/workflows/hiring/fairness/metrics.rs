use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-group decision counts gathered from audit records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GroupTally {
    pub total: usize,
    pub selected: usize,
    pub qualified: usize,
    pub qualified_selected: usize,
    pub unqualified: usize,
    pub unqualified_selected: usize,
}

impl GroupTally {
    pub fn record(&mut self, selected: bool, qualified: Option<bool>) {
        self.total += 1;
        if selected {
            self.selected += 1;
        }
        match qualified {
            Some(true) => {
                self.qualified += 1;
                if selected {
                    self.qualified_selected += 1;
                }
            }
            Some(false) => {
                self.unqualified += 1;
                if selected {
                    self.unqualified_selected += 1;
                }
            }
            None => {}
        }
    }

    pub fn selection_rate(&self) -> f64 {
        ratio(self.selected, self.total).unwrap_or(0.0)
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

/// Group-disaggregated statistics reported in a [`super::FairnessReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStatistics {
    pub group: String,
    pub total: usize,
    pub selected: usize,
    pub selection_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualified: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_positive_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub false_positive_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    pub sufficient_sample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GroupStatistics {
    pub(crate) fn from_tally(
        group: &str,
        tally: &GroupTally,
        with_qualified: bool,
        min_group_size: usize,
    ) -> Self {
        let sufficient_sample = tally.total >= min_group_size;
        let note = (!sufficient_sample).then(|| {
            format!(
                "insufficient data ({} < {}); metric not statistically meaningful",
                tally.total, min_group_size
            )
        });

        Self {
            group: group.to_string(),
            total: tally.total,
            selected: tally.selected,
            selection_rate: tally.selection_rate(),
            qualified: with_qualified.then_some(tally.qualified),
            true_positive_rate: with_qualified
                .then(|| ratio(tally.qualified_selected, tally.qualified))
                .flatten(),
            false_positive_rate: with_qualified
                .then(|| ratio(tally.unqualified_selected, tally.unqualified))
                .flatten(),
            precision: with_qualified
                .then(|| ratio(tally.qualified_selected, tally.selected))
                .flatten(),
            sufficient_sample,
            note,
        }
    }
}

/// Rate observed for one group together with the size of the population it
/// was measured over.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RateSample {
    pub group: String,
    pub population: usize,
    pub rate: f64,
}

/// Outcome of comparing one rate across groups.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RateComparison {
    pub min: f64,
    pub max: f64,
    pub lowest_group: String,
    pub highest_group: String,
    pub groups: Vec<String>,
    pub significant: bool,
}

impl RateComparison {
    pub fn difference(&self) -> f64 {
        (self.max - self.min).clamp(0.0, 1.0)
    }

    /// `min / max`, undefined when no group has a positive rate.
    pub fn ratio(&self) -> Option<f64> {
        if self.max <= 0.0 {
            None
        } else {
            Some((self.min / self.max).clamp(0.0, 1.0))
        }
    }
}

pub(crate) fn compare_rates(samples: &[RateSample], min_population: usize) -> Option<RateComparison> {
    let lowest = samples
        .iter()
        .min_by(|a, b| a.rate.total_cmp(&b.rate).then_with(|| a.group.cmp(&b.group)))?;
    let highest = samples
        .iter()
        .max_by(|a, b| a.rate.total_cmp(&b.rate).then_with(|| b.group.cmp(&a.group)))?;

    let significant =
        samples.len() >= 2 && samples.iter().all(|sample| sample.population >= min_population);

    Some(RateComparison {
        min: lowest.rate,
        max: highest.rate,
        lowest_group: lowest.group.clone(),
        highest_group: highest.group.clone(),
        groups: samples.iter().map(|sample| sample.group.clone()).collect(),
        significant,
    })
}

pub(crate) fn selection_samples(tallies: &BTreeMap<String, GroupTally>) -> Vec<RateSample> {
    tallies
        .iter()
        .filter(|(_, tally)| tally.total > 0)
        .map(|(group, tally)| RateSample {
            group: group.clone(),
            population: tally.total,
            rate: tally.selection_rate(),
        })
        .collect()
}

pub(crate) fn true_positive_samples(tallies: &BTreeMap<String, GroupTally>) -> Vec<RateSample> {
    tallies
        .iter()
        .filter_map(|(group, tally)| {
            ratio(tally.qualified_selected, tally.qualified).map(|rate| RateSample {
                group: group.clone(),
                population: tally.qualified,
                rate,
            })
        })
        .collect()
}

pub(crate) fn false_positive_samples(tallies: &BTreeMap<String, GroupTally>) -> Vec<RateSample> {
    tallies
        .iter()
        .filter_map(|(group, tally)| {
            ratio(tally.unqualified_selected, tally.unqualified).map(|rate| RateSample {
                group: group.clone(),
                population: tally.unqualified,
                rate,
            })
        })
        .collect()
}

pub(crate) fn precision_samples(tallies: &BTreeMap<String, GroupTally>) -> Vec<RateSample> {
    tallies
        .iter()
        .filter_map(|(group, tally)| {
            ratio(tally.qualified_selected, tally.selected).map(|rate| RateSample {
                group: group.clone(),
                population: tally.selected,
                rate,
            })
        })
        .collect()
}

/// Disparate impact ratio of a set of tallies: `min(rate) / max(rate)`.
pub(crate) fn disparate_impact(tallies: &BTreeMap<String, GroupTally>) -> Option<f64> {
    compare_rates(&selection_samples(tallies), 0).and_then(|comparison| comparison.ratio())
}
