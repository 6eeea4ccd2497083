//! Fairness-aware shortlisting on top of the merit ranking.
//!
//! Every method starts from the same merit order (overall score descending,
//! ties broken by application id) and reports each departure from the naive
//! top-`target_count` selection as an [`Adjustment`].

mod post_processing;
mod reweighting;
mod threshold;

pub use reweighting::{GroupWeight, ReweightingSummary};
pub use threshold::GroupThreshold;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::diagnostics::ConfigurationError;
use super::domain::{Application, ApplicationId, ApplicationStatus, CandidateId, JobId};
use super::fairness::metrics::{disparate_impact, GroupTally};
use super::fairness::{AuditFields, AuditRecord, FairnessAuditor, FairnessReport};

/// Outcome field name used for what-if audits of a proposed selection.
const PROPOSED_OUTCOME: &str = "selected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortlistMethod {
    PostProcessing,
    Reweighting,
    ThresholdOptimization,
}

impl ShortlistMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostProcessing => "post_processing",
            Self::Reweighting => "reweighting",
            Self::ThresholdOptimization => "threshold_optimization",
        }
    }
}

impl fmt::Display for ShortlistMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShortlistMethod {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "post_processing" => Ok(Self::PostProcessing),
            "reweighting" => Ok(Self::Reweighting),
            "threshold_optimization" => Ok(Self::ThresholdOptimization),
            _ => Err(ConfigurationError::UnknownMethod(value.to_string())),
        }
    }
}

/// Validated shortlisting request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistRequest {
    pub target_count: usize,
    pub method: ShortlistMethod,
    pub group_field: String,
    /// Desired group shares for reweighting. Uniform when absent.
    #[serde(default)]
    pub target_distribution: Option<BTreeMap<String, f64>>,
}

impl ShortlistRequest {
    pub fn new(target_count: usize, method: ShortlistMethod, group_field: impl Into<String>) -> Self {
        Self {
            target_count,
            method,
            group_field: group_field.into(),
            target_distribution: None,
        }
    }

    /// Builds a request from caller-supplied raw values.
    pub fn parse(
        target_count: i64,
        method: &str,
        group_field: &str,
    ) -> Result<Self, ConfigurationError> {
        if target_count < 0 {
            return Err(ConfigurationError::NegativeTargetCount(target_count));
        }
        if group_field.trim().is_empty() {
            return Err(ConfigurationError::EmptyGroupField);
        }
        let method = method.parse::<ShortlistMethod>()?;
        let target_count = usize::try_from(target_count)
            .map_err(|_| ConfigurationError::NegativeTargetCount(target_count))?;
        Ok(Self::new(target_count, method, group_field.trim()))
    }

    pub fn with_target_distribution(
        mut self,
        distribution: BTreeMap<String, f64>,
    ) -> Result<Self, ConfigurationError> {
        check_shares(&distribution)?;
        self.target_distribution = Some(distribution);
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.group_field.trim().is_empty() {
            return Err(ConfigurationError::EmptyGroupField);
        }
        if let Some(distribution) = &self.target_distribution {
            check_shares(distribution)?;
        }
        Ok(())
    }
}

/// Every share must be a positive finite number.
fn check_shares(distribution: &BTreeMap<String, f64>) -> Result<(), ConfigurationError> {
    match distribution
        .iter()
        .find(|(_, share)| !share.is_finite() || **share <= 0.0)
    {
        Some((group, share)) => Err(ConfigurationError::InvalidTargetShare {
            group: group.clone(),
            value: *share,
        }),
        None => Ok(()),
    }
}

/// Tunables for the correction loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistConfig {
    pub disparate_impact_threshold: f64,
    /// Post-processing may swap at most `swap_bound_factor × target_count` times.
    pub swap_bound_factor: usize,
    pub threshold_tolerance: f64,
    pub max_threshold_iterations: usize,
}

impl Default for ShortlistConfig {
    fn default() -> Self {
        Self {
            disparate_impact_threshold: 0.80,
            swap_bound_factor: 2,
            threshold_tolerance: 0.01,
            max_threshold_iterations: 50,
        }
    }
}

impl ShortlistConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.threshold_tolerance > 0.0 && self.threshold_tolerance < 1.0) {
            return Err(ConfigurationError::InvalidTolerance(self.threshold_tolerance));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    MovedIn,
    MovedOut,
}

impl AdjustmentDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::MovedIn => "moved in",
            Self::MovedOut => "moved out",
        }
    }
}

/// One departure from the naive merit selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub application_id: ApplicationId,
    pub candidate_id: CandidateId,
    pub direction: AdjustmentDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub overall: f64,
    pub merit_rank: usize,
    pub reason: String,
}

/// Final placement of one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistDecision {
    pub application_id: ApplicationId,
    pub merit_rank: usize,
    pub overall: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub status: ApplicationStatus,
    /// Fairness correction changed the naive merit outcome for this application.
    pub adjusted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShortlistWarning {
    #[error("{method} stopped after {iterations} iteration(s) without reaching the target; best disparate impact {}", display_ratio(.best_ratio))]
    NonConvergence {
        method: ShortlistMethod,
        iterations: usize,
        best_ratio: Option<f64>,
    },
    #[error("group '{group}' threshold search ended at rate {achieved_rate:.3} against target {target_rate:.3}")]
    ThresholdNotConverged {
        group: String,
        achieved_rate: f64,
        target_rate: f64,
    },
    #[error("{method} left disparate impact at {ratio:.3}, below the {threshold:.2} threshold")]
    BelowThreshold {
        method: ShortlistMethod,
        ratio: f64,
        threshold: f64,
    },
    #[error("{count} application(s) lack the '{field}' group field and are ranked on merit only")]
    MissingGroup { count: usize, field: String },
    #[error("requested {requested} shortlisted but only {available} application(s) available")]
    Undersized { requested: usize, available: usize },
}

fn display_ratio(ratio: &Option<f64>) -> String {
    match ratio {
        Some(ratio) => format!("{ratio:.3}"),
        None => "N/A".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub method: ShortlistMethod,
    pub target_count: usize,
    pub shortlisted: Vec<ApplicationId>,
    pub rejected: Vec<ApplicationId>,
    pub decisions: Vec<ShortlistDecision>,
    pub adjustments: Vec<Adjustment>,
    pub disparate_impact_before: Option<f64>,
    pub disparate_impact_after: Option<f64>,
    pub fully_compliant: bool,
    pub undersized: bool,
    pub iterations: usize,
    pub warnings: Vec<ShortlistWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reweighting: Option<ReweightingSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_thresholds: Vec<GroupThreshold>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_audit: Option<FairnessReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_audit: Option<FairnessReport>,
}

impl ShortlistResult {
    pub fn is_empty(&self) -> bool {
        self.shortlisted.is_empty()
    }

    pub fn is_shortlisted(&self, id: &ApplicationId) -> bool {
        self.shortlisted.contains(id)
    }

    /// New application records carrying their terminal status. Inputs are untouched.
    pub fn apply(&self, applications: &[Application]) -> Vec<Application> {
        let shortlisted: BTreeSet<&ApplicationId> = self.shortlisted.iter().collect();
        let decided: BTreeSet<&ApplicationId> = self
            .decisions
            .iter()
            .map(|decision| &decision.application_id)
            .collect();

        applications
            .iter()
            .filter(|application| decided.contains(&application.id))
            .map(|application| {
                let status = if shortlisted.contains(&application.id) {
                    ApplicationStatus::Shortlisted
                } else {
                    ApplicationStatus::Rejected
                };
                application.with_status(status)
            })
            .collect()
    }
}

/// Application in merit order.
#[derive(Debug, Clone)]
pub(crate) struct RankedEntry<'a> {
    pub application: &'a Application,
    /// 1-based position in the merit ranking.
    pub merit_rank: usize,
    pub group: Option<String>,
}

impl RankedEntry<'_> {
    pub fn overall(&self) -> f64 {
        self.application.overall()
    }

    pub fn adjustment(&self, direction: AdjustmentDirection, reason: String) -> Adjustment {
        Adjustment {
            application_id: self.application.id.clone(),
            candidate_id: self.application.candidate_id.clone(),
            direction,
            group: self.group.clone(),
            overall: self.overall(),
            merit_rank: self.merit_rank,
            reason,
        }
    }
}

/// What a correction method hands back to the engine.
#[derive(Debug, Default)]
pub(crate) struct MethodOutcome {
    pub selected: Vec<bool>,
    pub adjustments: Vec<Adjustment>,
    pub iterations: usize,
    pub converged: bool,
    pub warnings: Vec<ShortlistWarning>,
    pub reweighting: Option<ReweightingSummary>,
    pub group_thresholds: Vec<GroupThreshold>,
}

pub(crate) fn rank<'a>(applications: &'a [Application], group_field: &str) -> Vec<RankedEntry<'a>> {
    let mut ordered: Vec<&Application> = applications.iter().collect();
    ordered.sort_by(|a, b| {
        b.overall()
            .total_cmp(&a.overall())
            .then_with(|| a.id.cmp(&b.id))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, application)| RankedEntry {
            application,
            merit_rank: index + 1,
            group: application.group(group_field).map(str::to_string),
        })
        .collect()
}

pub(crate) fn tallies(entries: &[RankedEntry<'_>], selected: &[bool]) -> BTreeMap<String, GroupTally> {
    let mut tallies: BTreeMap<String, GroupTally> = BTreeMap::new();
    for (entry, chosen) in entries.iter().zip(selected) {
        if let Some(group) = &entry.group {
            tallies.entry(group.clone()).or_default().record(*chosen, None);
        }
    }
    tallies
}

/// Records describing moves between the naive and final selections.
pub(crate) fn diff_adjustments<F>(
    entries: &[RankedEntry<'_>],
    naive: &[bool],
    selected: &[bool],
    mut reason: F,
) -> Vec<Adjustment>
where
    F: FnMut(&RankedEntry<'_>, AdjustmentDirection) -> String,
{
    let mut adjustments = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let direction = match (naive[index], selected[index]) {
            (false, true) => AdjustmentDirection::MovedIn,
            (true, false) => AdjustmentDirection::MovedOut,
            _ => continue,
        };
        adjustments.push(entry.adjustment(direction, reason(entry, direction)));
    }
    adjustments
}

/// Runs the merit ranking, then the requested fairness correction.
#[derive(Debug, Clone, Default)]
pub struct ShortlistEngine {
    config: ShortlistConfig,
    auditor: FairnessAuditor,
}

impl ShortlistEngine {
    pub fn new(config: ShortlistConfig, auditor: FairnessAuditor) -> Self {
        Self { config, auditor }
    }

    pub fn config(&self) -> &ShortlistConfig {
        &self.config
    }

    /// Convenience entry point accepting raw caller values.
    pub fn shortlist_raw(
        &self,
        applications: &[Application],
        target_count: i64,
        method: &str,
        group_field: &str,
    ) -> Result<ShortlistResult, ConfigurationError> {
        let request = ShortlistRequest::parse(target_count, method, group_field)?;
        self.shortlist(applications, &request)
    }

    pub fn shortlist(
        &self,
        applications: &[Application],
        request: &ShortlistRequest,
    ) -> Result<ShortlistResult, ConfigurationError> {
        self.config.validate()?;
        request.validate()?;

        let entries = rank(applications, &request.group_field);
        let job_id = common_job(applications);
        let available = entries.len();

        if request.target_count == 0 || available == 0 {
            let undersized = request.target_count > available;
            let mut warnings = Vec::new();
            if undersized {
                warnings.push(ShortlistWarning::Undersized {
                    requested: request.target_count,
                    available,
                });
            }
            return Ok(self.assemble(
                job_id,
                request,
                &entries,
                &vec![false; available],
                MethodOutcome {
                    selected: vec![false; available],
                    converged: true,
                    warnings,
                    ..MethodOutcome::default()
                },
                undersized,
                false,
            ));
        }

        let undersized = request.target_count > available;
        let target = request.target_count.min(available);
        let naive: Vec<bool> = (0..available).map(|index| index < target).collect();

        let mut warnings = Vec::new();
        let missing = entries.iter().filter(|entry| entry.group.is_none()).count();
        if missing > 0 {
            warnings.push(ShortlistWarning::MissingGroup {
                count: missing,
                field: request.group_field.clone(),
            });
        }

        let mut outcome = if undersized {
            warnings.push(ShortlistWarning::Undersized {
                requested: request.target_count,
                available,
            });
            MethodOutcome {
                selected: naive.clone(),
                converged: true,
                ..MethodOutcome::default()
            }
        } else {
            match request.method {
                ShortlistMethod::PostProcessing => {
                    post_processing::run(&entries, &naive, target, &self.config)
                }
                ShortlistMethod::Reweighting => reweighting::run(
                    &entries,
                    &naive,
                    target,
                    request.target_distribution.as_ref(),
                )?,
                ShortlistMethod::ThresholdOptimization => {
                    threshold::run(&entries, &naive, target, &self.config)
                }
            }
        };

        warnings.append(&mut outcome.warnings);
        outcome.warnings = warnings;

        Ok(self.assemble(job_id, request, &entries, &naive, outcome, undersized, true))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        job_id: Option<JobId>,
        request: &ShortlistRequest,
        entries: &[RankedEntry<'_>],
        naive: &[bool],
        outcome: MethodOutcome,
        undersized: bool,
        with_audits: bool,
    ) -> ShortlistResult {
        let MethodOutcome {
            selected,
            adjustments,
            iterations,
            converged,
            mut warnings,
            reweighting,
            group_thresholds,
        } = outcome;

        let threshold = self.config.disparate_impact_threshold;
        let before = disparate_impact(&tallies(entries, naive));
        let after = disparate_impact(&tallies(entries, &selected));
        let meets_rule = after
            .map(|ratio| ratio + 1e-9 >= threshold)
            .unwrap_or(true);
        let fully_compliant = converged && meets_rule;

        // Post-processing already names its best ratio when it gives up.
        let reported = warnings
            .iter()
            .any(|warning| matches!(warning, ShortlistWarning::NonConvergence { .. }));
        if let (false, Some(ratio)) = (meets_rule || reported, after) {
            warnings.push(ShortlistWarning::BelowThreshold {
                method: request.method,
                ratio,
                threshold,
            });
        }

        let mut shortlisted = Vec::new();
        let mut rejected = Vec::new();
        let mut decisions = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let status = if selected[index] {
                shortlisted.push(entry.application.id.clone());
                ApplicationStatus::Shortlisted
            } else {
                rejected.push(entry.application.id.clone());
                ApplicationStatus::Rejected
            };
            decisions.push(ShortlistDecision {
                application_id: entry.application.id.clone(),
                merit_rank: entry.merit_rank,
                overall: entry.overall(),
                group: entry.group.clone(),
                status,
                adjusted: selected[index] != naive[index],
            });
        }

        let (baseline_audit, final_audit) = if with_audits {
            let fields = AuditFields::new(PROPOSED_OUTCOME, request.group_field.clone());
            (
                Some(self.audit_selection(entries, naive, &fields, job_id.as_ref())),
                Some(self.audit_selection(entries, &selected, &fields, job_id.as_ref())),
            )
        } else {
            (None, None)
        };

        if fully_compliant {
            info!(
                method = %request.method,
                shortlisted = shortlisted.len(),
                adjustments = adjustments.len(),
                disparate_impact = ?after,
                "shortlist produced"
            );
        } else {
            warn!(
                method = %request.method,
                shortlisted = shortlisted.len(),
                adjustments = adjustments.len(),
                disparate_impact = ?after,
                "shortlist produced without full compliance"
            );
        }

        ShortlistResult {
            job_id,
            method: request.method,
            target_count: request.target_count,
            shortlisted,
            rejected,
            decisions,
            adjustments,
            disparate_impact_before: before,
            disparate_impact_after: after,
            fully_compliant,
            undersized,
            iterations,
            warnings,
            reweighting,
            group_thresholds,
            baseline_audit,
            final_audit,
        }
    }

    fn audit_selection(
        &self,
        entries: &[RankedEntry<'_>],
        selected: &[bool],
        fields: &AuditFields,
        job_id: Option<&JobId>,
    ) -> FairnessReport {
        let records: Vec<AuditRecord> = entries
            .iter()
            .zip(selected)
            .map(|(entry, chosen)| {
                let record = AuditRecord::default().with_flag(fields.outcome.clone(), *chosen);
                match &entry.group {
                    Some(group) => record.with_group(fields.group.clone(), group.clone()),
                    None => record,
                }
            })
            .collect();

        let mut report = self.auditor.audit(&records, fields);
        report.job_id = job_id.cloned();
        report
    }
}

fn common_job(applications: &[Application]) -> Option<JobId> {
    let first = applications.first()?;
    applications
        .iter()
        .all(|application| application.job_id == first.job_id)
        .then(|| first.job_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip_through_display() {
        for method in [
            ShortlistMethod::PostProcessing,
            ShortlistMethod::Reweighting,
            ShortlistMethod::ThresholdOptimization,
        ] {
            assert_eq!(method.to_string().parse::<ShortlistMethod>(), Ok(method));
        }
        assert_eq!(
            " Post-Processing ".parse::<ShortlistMethod>(),
            Ok(ShortlistMethod::PostProcessing)
        );
    }

    #[test]
    fn parse_trims_the_group_field() {
        let request = ShortlistRequest::parse(3, "reweighting", " gender ").expect("valid");
        assert_eq!(request.group_field, "gender");
        assert_eq!(request.target_count, 3);
        assert!(request.target_distribution.is_none());
    }

    #[test]
    fn tolerance_outside_unit_interval_is_rejected() {
        let config = ShortlistConfig {
            threshold_tolerance: 0.0,
            ..ShortlistConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigurationError::InvalidTolerance(0.0)));
        assert!(ShortlistConfig::default().validate().is_ok());
    }

    #[test]
    fn undefined_ratios_display_as_not_applicable() {
        let warning = ShortlistWarning::NonConvergence {
            method: ShortlistMethod::PostProcessing,
            iterations: 8,
            best_ratio: None,
        };
        assert!(warning.to_string().ends_with("best disparate impact N/A"));
    }
}
