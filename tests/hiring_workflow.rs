use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use chrono::NaiveDate;
use talent_ai::workflows::hiring::{
    parse_audit_rows, ApplicationStatus, AuditFields, Candidate, CandidateId, FairnessAuditor,
    FairnessMetric, InMemoryScreeningRepository, Job, JobId, MatchingConfig, MatchingEngine,
    ResumeText, ScreeningService, Severity, ShortlistEngine, ShortlistMethod, ShortlistRequest,
    ScreeningRepository, WorkHistoryEntry,
};

const GROUP_FIELD: &str = "ethnicity";

fn date(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).expect("valid date")
}

fn analyst_job() -> Job {
    Job {
        id: JobId("job-analyst".to_string()),
        title: "Analytics Engineer".to_string(),
        required_skills: ["SQL", "dbt", "Looker"].into_iter().map(str::to_string).collect(),
        description: "Model warehouse data with SQL and dbt, publish Looker dashboards.".to_string(),
        salary_range: None,
        location: Some("Berlin".to_string()),
    }
}

fn applicant(id: &str, group: &str, skills: &[&str]) -> Candidate {
    Candidate {
        id: CandidateId(id.to_string()),
        skills: skills.iter().map(|skill| skill.to_string()).collect(),
        resume: ResumeText {
            original: format!("Analyst working with {} on warehouse reporting.", skills.join(" and ")),
            anonymized: None,
        },
        work_history: vec![
            WorkHistoryEntry {
                employer: "Umbrella".to_string(),
                role: "Data Analyst".to_string(),
                start: date(2017, 3),
                end: Some(date(2021, 2)),
            },
            WorkHistoryEntry {
                employer: "Hooli".to_string(),
                role: "Senior Data Analyst".to_string(),
                start: date(2021, 3),
                end: None,
            },
        ],
        group_attributes: BTreeMap::from([(GROUP_FIELD.to_string(), group.to_string())]),
    }
}

fn applicant_pool() -> Vec<Candidate> {
    let mut pool = Vec::new();
    for index in 0..6 {
        pool.push(applicant(&format!("x-{index}"), "X", &["SQL", "dbt", "Looker"]));
        pool.push(applicant(&format!("y-{index}"), "Y", &["SQL"]));
    }
    pool
}

fn screening_service() -> ScreeningService<InMemoryScreeningRepository> {
    let auditor = FairnessAuditor::default();
    ScreeningService::new(
        Arc::new(InMemoryScreeningRepository::default()),
        MatchingEngine::new(MatchingConfig::new(date(2025, 1))),
        auditor.clone(),
        ShortlistEngine::new(Default::default(), auditor),
    )
}

#[test]
fn scoring_ranks_full_stack_applicants_first() {
    let service = screening_service();
    let applications = service
        .score_applicants(&analyst_job(), &applicant_pool())
        .expect("applicants scored");

    let x = applications
        .iter()
        .find(|application| application.candidate_id.0 == "x-0")
        .expect("x-0 scored");
    let y = applications
        .iter()
        .find(|application| application.candidate_id.0 == "y-0")
        .expect("y-0 scored");

    assert!((x.score.skill_match - 1.0).abs() < 1e-9);
    assert!(y.score.skill_match < x.score.skill_match);
    assert!(x.overall() > y.overall(), "full stack should outrank partial stack");
    assert!((0.0..=100.0).contains(&x.overall()));
    assert_eq!(y.score.missing_skills.len(), 2);
}

#[test]
fn post_processing_shortlists_both_groups() {
    let service = screening_service();
    let job = analyst_job();
    service
        .score_applicants(&job, &applicant_pool())
        .expect("applicants scored");

    let result = service
        .shortlist_job(
            &job.id,
            &ShortlistRequest::new(4, ShortlistMethod::PostProcessing, GROUP_FIELD),
        )
        .expect("shortlist produced");

    assert_eq!(result.shortlisted.len(), 4);
    assert_eq!(result.disparate_impact_before, Some(0.0));
    assert_eq!(result.disparate_impact_after, Some(1.0));
    assert!(result.fully_compliant, "swaps should satisfy the four-fifths rule");
    assert_eq!(result.iterations, 2);
    assert!(result
        .shortlisted
        .iter()
        .any(|id| id.0 == "job-analyst/y-0"));
    assert_eq!(
        service
            .repository()
            .shortlists_for(&job.id)
            .expect("stored shortlists")
            .len(),
        1
    );
}

#[test]
fn shortlist_statuses_feed_the_next_audit() {
    let service = screening_service();
    let job = analyst_job();
    service
        .score_applicants(&job, &applicant_pool())
        .expect("applicants scored");
    service
        .shortlist_job(
            &job.id,
            &ShortlistRequest::parse(4, "post-processing", GROUP_FIELD).expect("valid request"),
        )
        .expect("shortlist produced");

    let current = service.current_applications(&job.id).expect("current records");
    assert!(current
        .iter()
        .all(|application| application.status != ApplicationStatus::Scored));

    let report = service
        .audit_job(&job.id, &AuditFields::new("shortlisted", GROUP_FIELD))
        .expect("audit stored");
    assert_eq!(report.records_audited, 12);
    assert_eq!(report.disparate_impact(), Some(1.0));
    assert_eq!(
        report
            .metric(FairnessMetric::DisparateImpactRatio)
            .and_then(|metric| metric.severity),
        Some(Severity::Pass)
    );
}

#[test]
fn imported_decision_log_is_audited() {
    let mut csv = String::from("applicant,region,hired,qualified\n");
    for index in 0..10 {
        let hired = if index < 5 { "yes" } else { "no" };
        csv.push_str(&format!("n-{index},north,{hired},yes\n"));
    }
    for index in 0..10 {
        let hired = if index < 2 { "yes" } else { "no" };
        csv.push_str(&format!("s-{index},south,{hired},yes\n"));
    }
    csv.push_str("u-0,,yes,yes\n");

    let fields = AuditFields::new("hired", "region").with_qualified("qualified");
    let records = parse_audit_rows(Cursor::new(csv), &fields).expect("csv parsed");
    assert_eq!(records.len(), 21);

    let report = FairnessAuditor::default().audit(&records, &fields);
    assert_eq!(report.records_audited, 20);
    assert_eq!(report.warnings.len(), 1);

    let ratio = report.disparate_impact().expect("defined ratio");
    assert!((ratio - 0.4).abs() < 1e-9);
    let opportunity = report
        .metric_value(FairnessMetric::EqualOpportunityDifference)
        .expect("qualification labels supplied");
    assert!((opportunity - 0.3).abs() < 1e-9);
    assert_eq!(report.overall_severity, Some(Severity::Critical));
}
