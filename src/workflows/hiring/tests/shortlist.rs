use std::collections::BTreeMap;

use super::common::*;
use crate::workflows::hiring::diagnostics::ConfigurationError;
use crate::workflows::hiring::domain::{Application, ApplicationId, ApplicationStatus};
use crate::workflows::hiring::shortlist::{
    AdjustmentDirection, ShortlistConfig, ShortlistEngine, ShortlistMethod, ShortlistRequest,
    ShortlistResult, ShortlistWarning,
};

const METHODS: [ShortlistMethod; 3] = [
    ShortlistMethod::PostProcessing,
    ShortlistMethod::Reweighting,
    ShortlistMethod::ThresholdOptimization,
];

fn run(applications: &[Application], target: usize, method: ShortlistMethod) -> ShortlistResult {
    ShortlistEngine::default()
        .shortlist(applications, &ShortlistRequest::new(target, method, GROUP_FIELD))
        .expect("valid request")
}

fn id(raw: &str) -> ApplicationId {
    ApplicationId(raw.to_string())
}

fn shortlisted_in(result: &ShortlistResult, group: &str) -> usize {
    result
        .decisions
        .iter()
        .filter(|decision| {
            decision.status == ApplicationStatus::Shortlisted && decision.group.as_deref() == Some(group)
        })
        .count()
}

#[test]
fn post_processing_repairs_one_sided_selection() {
    let pool = skewed_pool();
    let result = run(&pool, 4, ShortlistMethod::PostProcessing);

    assert_eq!(result.disparate_impact_before, Some(0.0));
    let after = result.disparate_impact_after.expect("defined");
    assert!(after >= 0.8, "disparate impact {after} below four-fifths");
    assert!(result.fully_compliant);
    assert_eq!(result.shortlisted.len(), 4);
    assert_eq!(shortlisted_in(&result, "B"), 2);
    assert_eq!(result.iterations, 2);
    assert!(result.warnings.is_empty());

    let moved_in = result
        .adjustments
        .iter()
        .filter(|adjustment| adjustment.direction == AdjustmentDirection::MovedIn)
        .count();
    assert_eq!(moved_in, 2);
    assert_eq!(result.adjustments.len(), 4);
    assert!(result
        .adjustments
        .iter()
        .all(|adjustment| !adjustment.reason.is_empty()));

    let final_audit = result.final_audit.as_ref().expect("final audit attached");
    assert!(final_audit.disparate_impact().expect("defined") >= 0.8);
    let baseline = result.baseline_audit.as_ref().expect("baseline audit attached");
    assert_eq!(baseline.disparate_impact(), Some(0.0));
}

#[test]
fn post_processing_swaps_weakest_for_strongest() {
    let result = run(&skewed_pool(), 4, ShortlistMethod::PostProcessing);

    // Naive picks A-00..A-03; the two weakest picks give way to B's two best.
    assert!(result.is_shortlisted(&id("app-A-00")));
    assert!(result.is_shortlisted(&id("app-A-01")));
    assert!(!result.is_shortlisted(&id("app-A-03")));
    assert!(result.is_shortlisted(&id("app-B-00")));
    assert!(result.is_shortlisted(&id("app-B-01")));
}

#[test]
fn zero_target_returns_an_empty_result() {
    for method in METHODS {
        let result = run(&skewed_pool(), 0, method);
        assert!(result.is_empty());
        assert!(result.warnings.is_empty());
        assert!(result.adjustments.is_empty());
        assert!(!result.undersized);
    }
}

#[test]
fn compliant_selection_is_a_fixed_point() {
    let pool = balanced_pool();
    let first = run(&pool, 4, ShortlistMethod::PostProcessing);

    assert!(first.adjustments.is_empty());
    assert_eq!(first.iterations, 0);
    assert_eq!(first.disparate_impact_before, first.disparate_impact_after);

    let settled = first.apply(&pool);
    let second = run(&settled, 4, ShortlistMethod::PostProcessing);
    assert_eq!(first.shortlisted, second.shortlisted);
    assert!(second.adjustments.is_empty());
}

#[test]
fn repeated_runs_are_deterministic() {
    let pool = skewed_pool();
    for method in METHODS {
        let first = run(&pool, 5, method);
        let second = run(&pool, 5, method);
        assert_eq!(first.shortlisted, second.shortlisted);
        assert_eq!(first.adjustments, second.adjustments);
    }
}

#[test]
fn larger_targets_never_shrink_the_shortlist() {
    let pool = skewed_pool();
    for method in METHODS {
        let mut previous = 0;
        for target in 0..=22 {
            let count = run(&pool, target, method).shortlisted.len();
            assert!(count >= previous, "{method} shrank at target {target}");
            previous = count;
        }
    }
}

#[test]
fn oversized_target_shortlists_everyone() {
    let pool = skewed_pool();
    let result = run(&pool, 25, ShortlistMethod::PostProcessing);

    assert!(result.undersized);
    assert_eq!(result.shortlisted.len(), pool.len());
    assert!(result.warnings.contains(&ShortlistWarning::Undersized {
        requested: 25,
        available: 20,
    }));
}

#[test]
fn swap_bound_reports_non_convergence() {
    let engine = ShortlistEngine::new(
        ShortlistConfig {
            swap_bound_factor: 0,
            ..ShortlistConfig::default()
        },
        Default::default(),
    );
    let result = engine
        .shortlist(
            &skewed_pool(),
            &ShortlistRequest::new(4, ShortlistMethod::PostProcessing, GROUP_FIELD),
        )
        .expect("valid request");

    assert!(!result.fully_compliant);
    assert_eq!(result.shortlisted.len(), 4);
    assert!(result.warnings.contains(&ShortlistWarning::NonConvergence {
        method: ShortlistMethod::PostProcessing,
        iterations: 0,
        best_ratio: Some(0.0),
    }));
}

#[test]
fn ungrouped_applications_are_never_swapped() {
    let mut pool = skewed_pool();
    pool.push(application("X", None, 99.0));
    let result = run(&pool, 4, ShortlistMethod::PostProcessing);

    assert!(result.is_shortlisted(&id("app-X")));
    assert_eq!(
        result.warnings.first(),
        Some(&ShortlistWarning::MissingGroup {
            count: 1,
            field: GROUP_FIELD.to_string(),
        })
    );
    assert!(result
        .adjustments
        .iter()
        .all(|adjustment| adjustment.group.is_some()));
}

#[test]
fn reweighting_weights_are_normalised() {
    let mut pool = cohort("A", 15, 80.0);
    pool.extend(cohort("B", 5, 52.0));
    let result = run(&pool, 4, ShortlistMethod::Reweighting);

    let summary = result.reweighting.as_ref().expect("summary present");
    assert!(summary.is_normalized());
    assert!((summary.weight("A").expect("A weight") - 2.0 / 3.0).abs() < 1e-9);
    assert!((summary.weight("B").expect("B weight") - 2.0).abs() < 1e-9);
    assert_eq!(shortlisted_in(&result, "B"), 4);
    assert_eq!(result.adjustments.len(), 8);
}

#[test]
fn reweighting_below_four_fifths_is_reported() {
    let mut pool = cohort("A", 15, 80.0);
    pool.extend(cohort("B", 5, 52.0));
    let result = run(&pool, 4, ShortlistMethod::Reweighting);

    // Group B takes every seat, so A's rate of zero sets the ratio.
    assert_eq!(result.disparate_impact_after, Some(0.0));
    assert!(!result.fully_compliant);
    assert_eq!(
        result.warnings,
        vec![ShortlistWarning::BelowThreshold {
            method: ShortlistMethod::Reweighting,
            ratio: 0.0,
            threshold: 0.8,
        }]
    );
}

#[test]
fn compliant_methods_add_no_threshold_warning() {
    for method in METHODS {
        let result = run(&balanced_pool(), 4, method);
        assert!(result.fully_compliant, "{method}");
        assert!(!result
            .warnings
            .iter()
            .any(|warning| matches!(warning, ShortlistWarning::BelowThreshold { .. })));
    }
}

#[test]
fn reweighting_honours_an_explicit_target_distribution() {
    let mut pool = cohort("A", 15, 80.0);
    pool.extend(cohort("B", 5, 52.0));
    let distribution = BTreeMap::from([("A".to_string(), 3.0), ("B".to_string(), 1.0)]);
    let request = ShortlistRequest::new(4, ShortlistMethod::Reweighting, GROUP_FIELD)
        .with_target_distribution(distribution)
        .expect("positive shares");

    let result = ShortlistEngine::default()
        .shortlist(&pool, &request)
        .expect("valid request");

    let summary = result.reweighting.as_ref().expect("summary present");
    assert!(summary.is_normalized());
    assert!((summary.weight("A").expect("A weight") - 1.0).abs() < 1e-9);
    assert!(result.adjustments.is_empty());
}

#[test]
fn reweighting_rejects_incomplete_or_invalid_distributions() {
    let pool = skewed_pool();
    let request = ShortlistRequest::new(4, ShortlistMethod::Reweighting, GROUP_FIELD)
        .with_target_distribution(BTreeMap::from([("A".to_string(), 1.0)]))
        .expect("positive shares");
    match ShortlistEngine::default().shortlist(&pool, &request) {
        Err(ConfigurationError::MissingTargetShare { group }) => assert_eq!(group, "B"),
        other => panic!("expected missing share, got {other:?}"),
    }

    let invalid = ShortlistRequest::new(4, ShortlistMethod::Reweighting, GROUP_FIELD)
        .with_target_distribution(BTreeMap::from([("A".to_string(), -1.0)]));
    assert!(matches!(
        invalid,
        Err(ConfigurationError::InvalidTargetShare { .. })
    ));

    // Shares set directly on the request are checked when shortlisting.
    let mut direct = ShortlistRequest::new(4, ShortlistMethod::Reweighting, GROUP_FIELD);
    direct.target_distribution = Some(BTreeMap::from([
        ("A".to_string(), 1.0),
        ("B".to_string(), f64::NAN),
    ]));
    match ShortlistEngine::default().shortlist(&pool, &direct) {
        Err(ConfigurationError::InvalidTargetShare { group, value }) => {
            assert_eq!(group, "B");
            assert!(value.is_nan());
        }
        other => panic!("expected invalid share, got {other:?}"),
    }
}

#[test]
fn threshold_optimisation_equalises_group_rates() {
    let result = run(&skewed_pool(), 4, ShortlistMethod::ThresholdOptimization);

    assert_eq!(result.shortlisted.len(), 4);
    assert!(result.fully_compliant);
    assert_eq!(shortlisted_in(&result, "A"), 2);
    assert_eq!(shortlisted_in(&result, "B"), 2);
    assert_eq!(result.group_thresholds.len(), 2);
    for threshold in &result.group_thresholds {
        assert!(threshold.converged);
        assert!((threshold.achieved_rate - 0.2).abs() < 1e-9);
        assert!((threshold.target_rate - 0.2).abs() < 1e-9);
    }
}

#[test]
fn threshold_optimisation_hits_the_exact_count() {
    let mut pool = skewed_pool();
    pool.extend(cohort("C", 3, 70.0));
    for target in 1..=pool.len() {
        let result = run(&pool, target, ShortlistMethod::ThresholdOptimization);
        assert_eq!(result.shortlisted.len(), target, "target {target}");
        assert_eq!(result.shortlisted.len() + result.rejected.len(), pool.len());
    }
}

#[test]
fn invalid_requests_are_rejected() {
    let engine = ShortlistEngine::default();
    let pool = skewed_pool();

    assert_eq!(
        engine.shortlist_raw(&pool, 4, "magic", GROUP_FIELD).err(),
        Some(ConfigurationError::UnknownMethod("magic".to_string()))
    );
    assert_eq!(
        engine.shortlist_raw(&pool, -1, "post_processing", GROUP_FIELD).err(),
        Some(ConfigurationError::NegativeTargetCount(-1))
    );
    assert_eq!(
        engine.shortlist_raw(&pool, 4, "reweighting", "  ").err(),
        Some(ConfigurationError::EmptyGroupField)
    );
    assert!(engine.shortlist_raw(&pool, 4, "Threshold-Optimization", GROUP_FIELD).is_ok());
}

#[test]
fn apply_returns_new_records_with_terminal_statuses() {
    let pool = skewed_pool();
    let result = run(&pool, 4, ShortlistMethod::PostProcessing);
    let settled = result.apply(&pool);

    assert_eq!(settled.len(), pool.len());
    assert!(pool
        .iter()
        .all(|application| application.status == ApplicationStatus::Scored));
    assert!(settled.iter().all(|application| application.status.is_terminal()));
    assert_eq!(
        settled
            .iter()
            .filter(|application| application.status == ApplicationStatus::Shortlisted)
            .count(),
        4
    );
}

#[test]
fn decisions_keep_the_original_merit_rank() {
    let result = run(&skewed_pool(), 4, ShortlistMethod::PostProcessing);
    let ranks: Vec<usize> = result.decisions.iter().map(|decision| decision.merit_rank).collect();

    assert_eq!(ranks, (1..=20).collect::<Vec<_>>());
    assert_eq!(
        result.decisions.iter().filter(|decision| decision.adjusted).count(),
        4
    );
}
