//! Group-disaggregated bias auditing over batches of hiring decisions.
//!
//! The auditor is a read-only batch reduction: it never mutates the records
//! it inspects and every call yields a new point-in-time [`FairnessReport`].

pub(crate) mod metrics;
mod severity;

pub use metrics::GroupStatistics;
pub use severity::Severity;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Application, ApplicationStatus, JobId, SELECTED_FIELD, SHORTLISTED_FIELD};
use metrics::{
    compare_rates, false_positive_samples, precision_samples, selection_samples,
    true_positive_samples, GroupTally, RateComparison,
};

/// Thresholds used by the auditor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessConfig {
    pub min_group_size: usize,
    /// Upper bound for the difference metrics.
    pub parity_target: f64,
    /// Lowest passing disparate impact ratio.
    pub disparate_impact_threshold: f64,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            min_group_size: 5,
            parity_target: 0.10,
            disparate_impact_threshold: 0.80,
        }
    }
}

/// Names of the fields an audit reads from each record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub outcome: String,
    pub group: String,
    #[serde(default)]
    pub qualified: Option<String>,
}

impl AuditFields {
    pub fn new(outcome: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            group: group.into(),
            qualified: None,
        }
    }

    pub fn with_qualified(mut self, qualified: impl Into<String>) -> Self {
        self.qualified = Some(qualified.into());
        self
    }
}

/// Field lookup used by the auditor, so any record shape can be audited
/// without reflection.
pub trait AuditSubject {
    fn group_value(&self, field: &str) -> Option<&str>;
    fn flag(&self, field: &str) -> Option<bool>;
}

impl<T: AuditSubject + ?Sized> AuditSubject for &T {
    fn group_value(&self, field: &str) -> Option<&str> {
        (**self).group_value(field)
    }

    fn flag(&self, field: &str) -> Option<bool> {
        (**self).flag(field)
    }
}

impl AuditSubject for Application {
    fn group_value(&self, field: &str) -> Option<&str> {
        self.group(field)
    }

    fn flag(&self, field: &str) -> Option<bool> {
        if let Some(value) = self.labels.get(field) {
            return Some(*value);
        }

        if field == SHORTLISTED_FIELD || field == SELECTED_FIELD {
            return match self.status {
                ApplicationStatus::Shortlisted => Some(true),
                ApplicationStatus::Rejected => Some(false),
                ApplicationStatus::Scored => None,
            };
        }

        None
    }
}

/// Flat audit row, used for imported decision logs and for what-if audits of
/// a proposed selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub groups: BTreeMap<String, String>,
    pub flags: BTreeMap<String, bool>,
}

impl AuditRecord {
    pub fn with_group(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.groups.insert(field.into(), value.into());
        self
    }

    pub fn with_flag(mut self, field: impl Into<String>, value: bool) -> Self {
        self.flags.insert(field.into(), value);
        self
    }
}

impl AuditSubject for AuditRecord {
    fn group_value(&self, field: &str) -> Option<&str> {
        self.groups
            .get(field)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    fn flag(&self, field: &str) -> Option<bool> {
        self.flags.get(field).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairnessMetric {
    DemographicParityDifference,
    DisparateImpactRatio,
    EqualOpportunityDifference,
    EqualizedOddsDifference,
    PredictiveParityDifference,
}

impl FairnessMetric {
    pub const fn label(self) -> &'static str {
        match self {
            Self::DemographicParityDifference => "Demographic parity difference",
            Self::DisparateImpactRatio => "Disparate impact ratio",
            Self::EqualOpportunityDifference => "Equal opportunity difference",
            Self::EqualizedOddsDifference => "Equalized odds difference",
            Self::PredictiveParityDifference => "Predictive parity difference",
        }
    }
}

/// Whether a metric could be judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Evaluated,
    /// Fewer than two groups, or a group below the minimum sample size.
    InsufficientSample,
    /// The metric has no defined value (e.g. disparate impact with no selections).
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub metric: FairnessMetric,
    pub value: Option<f64>,
    pub threshold: f64,
    pub status: MetricStatus,
    pub severity: Option<Severity>,
    pub groups_compared: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowest_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MetricResult {
    pub fn passed(&self) -> Option<bool> {
        self.severity.map(|severity| severity == Severity::Pass)
    }

    pub fn is_significant(&self) -> bool {
        self.status == MetricStatus::Evaluated
    }

    pub fn display_value(&self) -> String {
        match self.value {
            Some(value) => format!("{value:.3}"),
            None => "N/A".to_string(),
        }
    }
}

/// Non-fatal audit findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditWarning {
    #[error("{count} record(s) excluded: {reason}")]
    ExcludedRecords { count: usize, reason: String },
    #[error("group '{group}' has {size} record(s), below the minimum of {minimum}; insufficient data, metric not statistically meaningful")]
    InsufficientSample {
        group: String,
        size: usize,
        minimum: usize,
    },
    #[error("{count} record(s) lack the '{field}' label and are left out of qualification metrics")]
    MissingQualifiedLabel { count: usize, field: String },
    #[error("only one group ('{group}') present; comparisons are trivially equal")]
    SingleGroup { group: String },
}

/// Immutable audit snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub generated_at: DateTime<Utc>,
    pub fields: AuditFields,
    pub records_audited: usize,
    pub groups: Vec<GroupStatistics>,
    pub metrics: Vec<MetricResult>,
    /// Worst severity among significant metrics; `None` when nothing could be judged.
    pub overall_severity: Option<Severity>,
    pub recommendations: Vec<String>,
    pub warnings: Vec<AuditWarning>,
}

impl FairnessReport {
    pub fn metric(&self, metric: FairnessMetric) -> Option<&MetricResult> {
        self.metrics.iter().find(|result| result.metric == metric)
    }

    pub fn metric_value(&self, metric: FairnessMetric) -> Option<f64> {
        self.metric(metric).and_then(|result| result.value)
    }

    pub fn disparate_impact(&self) -> Option<f64> {
        self.metric_value(FairnessMetric::DisparateImpactRatio)
    }

    pub fn is_compliant(&self) -> bool {
        self.overall_severity == Some(Severity::Pass)
    }

    pub fn group(&self, name: &str) -> Option<&GroupStatistics> {
        self.groups.iter().find(|group| group.group == name)
    }
}

/// Stateless auditor configured with fixed thresholds.
#[derive(Debug, Clone, Default)]
pub struct FairnessAuditor {
    config: FairnessConfig,
}

impl FairnessAuditor {
    pub fn new(config: FairnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FairnessConfig {
        &self.config
    }

    /// Audits the applications of one job. Applications for other jobs are ignored.
    pub fn audit_job(
        &self,
        job_id: &JobId,
        applications: &[Application],
        fields: &AuditFields,
    ) -> FairnessReport {
        let scoped: Vec<&Application> = applications
            .iter()
            .filter(|application| &application.job_id == job_id)
            .collect();
        let mut report = self.audit(&scoped, fields);
        report.job_id = Some(job_id.clone());
        report
    }

    pub fn audit<S: AuditSubject>(&self, records: &[S], fields: &AuditFields) -> FairnessReport {
        let mut warnings = Vec::new();
        let mut tallies: BTreeMap<String, GroupTally> = BTreeMap::new();
        let mut missing_group = 0usize;
        let mut missing_outcome = 0usize;
        let mut missing_qualified = 0usize;

        for record in records {
            let Some(group) = record.group_value(&fields.group) else {
                missing_group += 1;
                continue;
            };
            let Some(selected) = record.flag(&fields.outcome) else {
                missing_outcome += 1;
                continue;
            };
            let qualified = match &fields.qualified {
                Some(field) => {
                    let value = record.flag(field);
                    if value.is_none() {
                        missing_qualified += 1;
                    }
                    value
                }
                None => None,
            };

            tallies
                .entry(group.to_string())
                .or_default()
                .record(selected, qualified);
        }

        if missing_group > 0 {
            warnings.push(AuditWarning::ExcludedRecords {
                count: missing_group,
                reason: format!("missing group field '{}'", fields.group),
            });
        }
        if missing_outcome > 0 {
            warnings.push(AuditWarning::ExcludedRecords {
                count: missing_outcome,
                reason: format!("missing outcome field '{}'", fields.outcome),
            });
        }
        if let (Some(field), true) = (&fields.qualified, missing_qualified > 0) {
            warnings.push(AuditWarning::MissingQualifiedLabel {
                count: missing_qualified,
                field: field.clone(),
            });
        }

        let min_group_size = self.config.min_group_size;
        let with_qualified = fields.qualified.is_some();
        let groups: Vec<GroupStatistics> = tallies
            .iter()
            .map(|(group, tally)| {
                GroupStatistics::from_tally(group, tally, with_qualified, min_group_size)
            })
            .collect();

        for group in groups.iter().filter(|group| !group.sufficient_sample) {
            warnings.push(AuditWarning::InsufficientSample {
                group: group.group.clone(),
                size: group.total,
                minimum: min_group_size,
            });
        }
        if let [only] = groups.as_slice() {
            warnings.push(AuditWarning::SingleGroup {
                group: only.group.clone(),
            });
        }

        let mut metrics = vec![
            self.demographic_parity(&tallies),
            self.disparate_impact(&tallies),
        ];
        if with_qualified {
            metrics.push(self.equal_opportunity(&tallies));
            metrics.push(self.equalized_odds(&tallies));
            metrics.push(self.predictive_parity(&tallies));
        }

        let overall_severity = metrics
            .iter()
            .filter(|result| result.is_significant())
            .filter_map(|result| result.severity)
            .max();

        let recommendations = recommendations(&metrics, &groups, &fields.group);
        let records_audited = tallies.values().map(|tally| tally.total).sum();

        let report = FairnessReport {
            job_id: None,
            generated_at: Utc::now(),
            fields: fields.clone(),
            records_audited,
            groups,
            metrics,
            overall_severity,
            recommendations,
            warnings,
        };

        match report.overall_severity {
            Some(Severity::Pass) => info!(
                group_field = %fields.group,
                records = report.records_audited,
                "fairness audit passed"
            ),
            Some(severity) => warn!(
                group_field = %fields.group,
                records = report.records_audited,
                severity = severity.label(),
                "fairness audit found disparities"
            ),
            None => warn!(
                group_field = %fields.group,
                records = report.records_audited,
                "fairness audit inconclusive; no metric had sufficient data"
            ),
        }

        report
    }

    fn demographic_parity(&self, tallies: &BTreeMap<String, GroupTally>) -> MetricResult {
        let comparison = compare_rates(&selection_samples(tallies), self.config.min_group_size);
        self.difference_result(
            FairnessMetric::DemographicParityDifference,
            comparison,
            "no group has any records",
        )
    }

    fn disparate_impact(&self, tallies: &BTreeMap<String, GroupTally>) -> MetricResult {
        let threshold = self.config.disparate_impact_threshold;
        let Some(comparison) =
            compare_rates(&selection_samples(tallies), self.config.min_group_size)
        else {
            return undefined(
                FairnessMetric::DisparateImpactRatio,
                threshold,
                "no group has any records",
            );
        };

        let Some(ratio) = comparison.ratio() else {
            let mut result = undefined(
                FairnessMetric::DisparateImpactRatio,
                threshold,
                "undefined: no group has any selections",
            );
            result.groups_compared = comparison.groups;
            return result;
        };

        let (status, severity, note) = if comparison.significant {
            (
                MetricStatus::Evaluated,
                Some(Severity::from_ratio(ratio, threshold)),
                None,
            )
        } else {
            insufficient_note()
        };

        MetricResult {
            metric: FairnessMetric::DisparateImpactRatio,
            value: Some(ratio),
            threshold,
            status,
            severity,
            groups_compared: comparison.groups,
            lowest_group: Some(comparison.lowest_group),
            highest_group: Some(comparison.highest_group),
            note,
        }
    }

    fn equal_opportunity(&self, tallies: &BTreeMap<String, GroupTally>) -> MetricResult {
        let comparison = compare_rates(&true_positive_samples(tallies), self.config.min_group_size);
        self.difference_result(
            FairnessMetric::EqualOpportunityDifference,
            comparison,
            "no group has qualified records",
        )
    }

    fn equalized_odds(&self, tallies: &BTreeMap<String, GroupTally>) -> MetricResult {
        let min = self.config.min_group_size;
        let tpr = compare_rates(&true_positive_samples(tallies), min);
        let fpr = compare_rates(&false_positive_samples(tallies), min);

        let combined = match (tpr, fpr) {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => Some(only),
            (Some(tpr), Some(fpr)) => {
                let significant = tpr.significant && fpr.significant;
                let mut wider = if fpr.difference() > tpr.difference() {
                    fpr
                } else {
                    tpr
                };
                wider.significant = significant;
                Some(wider)
            }
        };

        self.difference_result(
            FairnessMetric::EqualizedOddsDifference,
            combined,
            "no group has labelled records",
        )
    }

    fn predictive_parity(&self, tallies: &BTreeMap<String, GroupTally>) -> MetricResult {
        let comparison = compare_rates(&precision_samples(tallies), self.config.min_group_size);
        self.difference_result(
            FairnessMetric::PredictiveParityDifference,
            comparison,
            "no group has selected records",
        )
    }

    fn difference_result(
        &self,
        metric: FairnessMetric,
        comparison: Option<RateComparison>,
        empty_note: &str,
    ) -> MetricResult {
        let threshold = self.config.parity_target;
        let Some(comparison) = comparison else {
            return undefined(metric, threshold, empty_note);
        };

        let value = comparison.difference();
        let (status, severity, note) = if comparison.significant {
            (
                MetricStatus::Evaluated,
                Some(Severity::from_deviation(value, threshold)),
                None,
            )
        } else {
            insufficient_note()
        };

        MetricResult {
            metric,
            value: Some(value),
            threshold,
            status,
            severity,
            groups_compared: comparison.groups,
            lowest_group: Some(comparison.lowest_group),
            highest_group: Some(comparison.highest_group),
            note,
        }
    }
}

fn insufficient_note() -> (MetricStatus, Option<Severity>, Option<String>) {
    (
        MetricStatus::InsufficientSample,
        None,
        Some("insufficient data: metric not statistically meaningful".to_string()),
    )
}

fn undefined(metric: FairnessMetric, threshold: f64, note: &str) -> MetricResult {
    MetricResult {
        metric,
        value: None,
        threshold,
        status: MetricStatus::Undefined,
        severity: None,
        groups_compared: Vec::new(),
        lowest_group: None,
        highest_group: None,
        note: Some(note.to_string()),
    }
}

fn recommendations(
    metrics: &[MetricResult],
    groups: &[GroupStatistics],
    group_field: &str,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    for result in metrics.iter().filter(|result| result.is_significant()) {
        let Some(severity) = result.severity.filter(|severity| *severity > Severity::Pass) else {
            continue;
        };
        let lowest = result.lowest_group.as_deref().unwrap_or("unknown");
        let highest = result.highest_group.as_deref().unwrap_or("unknown");
        let value = result.display_value();

        let advice = match result.metric {
            FairnessMetric::DemographicParityDifference => format!(
                "Selection rates by {group_field} differ by {value} ('{highest}' vs '{lowest}'); review screening criteria for features that proxy group membership."
            ),
            FairnessMetric::DisparateImpactRatio => format!(
                "Disparate impact ratio {value} is below the four-fifths threshold for '{lowest}'; apply a fairness-aware shortlisting method such as post_processing before advancing candidates."
            ),
            FairnessMetric::EqualOpportunityDifference => format!(
                "Qualified '{lowest}' candidates advance less often than qualified '{highest}' candidates ({value}); audit scoring weights for qualified applicants."
            ),
            FairnessMetric::EqualizedOddsDifference => format!(
                "Error rates differ across {group_field} groups ({value}); compare false positives and false negatives between '{highest}' and '{lowest}' and consider threshold_optimization."
            ),
            FairnessMetric::PredictiveParityDifference => format!(
                "Selected '{lowest}' and '{highest}' candidates are not equally likely to be qualified ({value}); recalibrate score thresholds per group."
            ),
        };
        recommendations.push(format!("[{}] {}", severity.label(), advice));
    }

    let undersized: Vec<&str> = groups
        .iter()
        .filter(|group| !group.sufficient_sample)
        .map(|group| group.group.as_str())
        .collect();
    if !undersized.is_empty() {
        recommendations.push(format!(
            "Collect more decisions for {group_field} group(s) {} before relying on these metrics.",
            undersized.join(", ")
        ));
    }

    let any_significant = metrics.iter().any(MetricResult::is_significant);
    if recommendations.is_empty() && any_significant {
        recommendations
            .push("No fairness metric exceeded its target; continue periodic audits.".to_string());
    }

    recommendations
}
