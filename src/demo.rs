use chrono::NaiveDate;
use clap::Args;
use std::collections::{BTreeMap, BTreeSet};
use talent_ai::config::AppConfig;
use talent_ai::error::AppError;
use talent_ai::workflows::hiring::{
    AuditFields, Candidate, CandidateId, Job, JobId, ResumeText, ShortlistRequest,
    WorkHistoryEntry,
};

use crate::{build_service, parse_date, print_json, render_report, render_scores, render_shortlist};

const GROUP_FIELD: &str = "gender";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of candidates to shortlist
    #[arg(long, default_value_t = 4)]
    pub(crate) target: i64,
    /// post_processing, reweighting or threshold_optimization
    #[arg(long, default_value = "post_processing")]
    pub(crate) method: String,
    /// Reference date for open-ended roles (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Print the shortlist as JSON instead of a text summary
    #[arg(long)]
    pub(crate) json: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            target: 4,
            method: "post_processing".to_string(),
            as_of: None,
            json: false,
        }
    }
}

pub(crate) fn run(config: &AppConfig, args: DemoArgs) -> Result<(), AppError> {
    let request = ShortlistRequest::parse(args.target, &args.method, GROUP_FIELD)?;
    let as_of = args.as_of.unwrap_or_else(reference_date);

    let job = demo_job();
    let candidates = demo_candidates();
    let service = build_service(config, as_of);

    let applications = service.score_applicants(&job, &candidates)?;
    let result = service.shortlist_job(&job.id, &request)?;

    if args.json {
        return print_json(&result);
    }

    println!("Candidate screening demo");
    println!("Job: {} ({} applicants)\n", job.title, applications.len());
    render_scores(&job.title, &applications);
    println!();
    render_shortlist(&result);

    // Audits the stored statuses the shortlist wrote back.
    let settled = service.audit_job(&job.id, &AuditFields::new("shortlisted", GROUP_FIELD))?;
    println!();
    render_report(&settled);
    Ok(())
}

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn date(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn demo_job() -> Job {
    Job {
        id: JobId("job-backend-01".to_string()),
        title: "Senior Backend Engineer".to_string(),
        required_skills: ["Rust", "PostgreSQL", "Kubernetes", "gRPC"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        description: "Build and operate Rust services backed by PostgreSQL, \
                      deployed on Kubernetes and exposed over gRPC."
            .to_string(),
        salary_range: None,
        location: Some("Remote".to_string()),
    }
}

/// Ten applicants per group; group A skews towards the required stack so the
/// naive top four comes entirely from one group.
fn demo_candidates() -> Vec<Candidate> {
    let strong: &[&str] = &["Rust", "PostgreSQL", "Kubernetes", "gRPC"];
    let partial: &[&str] = &["Rust", "PostgreSQL"];
    let weak: &[&str] = &["Python"];

    (0..20)
        .map(|index| {
            let (group, skills) = match index {
                0..=5 => ("A", strong),
                6..=9 => ("A", partial),
                10..=13 => ("B", partial),
                _ => ("B", weak),
            };
            let years = 1 + (index % 5) as i32;
            let mut group_attributes = BTreeMap::new();
            group_attributes.insert(GROUP_FIELD.to_string(), group.to_string());

            Candidate {
                id: CandidateId(format!("cand-{index:02}")),
                skills: skills.iter().map(|skill| skill.to_string()).collect::<BTreeSet<_>>(),
                resume: ResumeText {
                    original: format!(
                        "Engineer with {years} years building services using {}.",
                        skills.join(", ")
                    ),
                    anonymized: None,
                },
                work_history: vec![
                    WorkHistoryEntry {
                        employer: "Northwind".to_string(),
                        role: "Software Engineer".to_string(),
                        start: date(2024 - years - 2, 1),
                        end: Some(date(2024 - years, 1)),
                    },
                    WorkHistoryEntry {
                        employer: "Contoso".to_string(),
                        role: "Senior Software Engineer".to_string(),
                        start: date(2024 - years, 2),
                        end: None,
                    },
                ],
                group_attributes,
            }
        })
        .collect()
}
