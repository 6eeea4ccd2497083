mod demo;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use talent_ai::config::AppConfig;
use talent_ai::error::AppError;
use talent_ai::telemetry;
use talent_ai::workflows::hiring::{
    load_candidates, load_job, parse_audit_rows, Application, AuditFields, FairnessAuditor,
    FairnessReport, InMemoryScreeningRepository, MatchingEngine, ScreeningService,
    ShortlistEngine, ShortlistRequest, ShortlistResult,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "talent-ai",
    about = "Score candidates, audit hiring decisions for bias and build fair shortlists",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score every candidate in a file against one job
    Score(ScoreArgs),
    /// Audit a CSV decision log for group disparities
    Audit(AuditArgs),
    /// Score candidates and build a fairness-aware shortlist
    Shortlist(ShortlistArgs),
    /// Run the built-in screening scenario (default command)
    Demo(demo::DemoArgs),
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Job posting JSON file
    #[arg(long)]
    job: PathBuf,
    /// Candidate JSON file (array or {"candidates": [...]})
    #[arg(long)]
    candidates: PathBuf,
    /// Reference date for open-ended roles (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date)]
    as_of: Option<NaiveDate>,
    /// Print JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct AuditArgs {
    /// Decision log with one row per applicant
    #[arg(long)]
    csv: PathBuf,
    /// Column holding the yes/no outcome
    #[arg(long, default_value = "selected")]
    outcome: String,
    /// Column holding the demographic group
    #[arg(long)]
    group: String,
    /// Optional column holding the yes/no qualification label
    #[arg(long)]
    qualified: Option<String>,
    /// Print JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ShortlistArgs {
    /// Job posting JSON file
    #[arg(long)]
    job: PathBuf,
    /// Candidate JSON file (array or {"candidates": [...]})
    #[arg(long)]
    candidates: PathBuf,
    /// Number of candidates to shortlist
    #[arg(long, allow_negative_numbers = true)]
    target: i64,
    /// post_processing, reweighting or threshold_optimization
    #[arg(long, default_value = "post_processing")]
    method: String,
    /// Group attribute the fairness correction balances
    #[arg(long)]
    group: String,
    /// Reference date for open-ended roles (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date)]
    as_of: Option<NaiveDate>,
    /// Print JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    info!(environment = ?config.environment, "talent-ai starting");

    let command = cli
        .command
        .unwrap_or_else(|| Command::Demo(demo::DemoArgs::default()));

    match command {
        Command::Score(args) => run_score(&config, args),
        Command::Audit(args) => run_audit(&config, args),
        Command::Shortlist(args) => run_shortlist(&config, args),
        Command::Demo(args) => demo::run(&config, args),
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn build_service(
    config: &AppConfig,
    as_of: NaiveDate,
) -> ScreeningService<InMemoryScreeningRepository> {
    let auditor = FairnessAuditor::new(config.fairness.clone());
    ScreeningService::new(
        Arc::new(InMemoryScreeningRepository::default()),
        MatchingEngine::new(config.matching(as_of)),
        auditor.clone(),
        ShortlistEngine::new(config.shortlist.clone(), auditor),
    )
}

fn run_score(config: &AppConfig, args: ScoreArgs) -> Result<(), AppError> {
    let job = load_job(&args.job)?;
    let candidates = load_candidates(&args.candidates)?;
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());

    let service = build_service(config, as_of);
    let applications = service.score_applicants(&job, &candidates)?;

    if args.json {
        let scores: Vec<_> = applications.iter().map(|application| &application.score).collect();
        return print_json(&scores);
    }
    render_scores(&job.title, &applications);
    Ok(())
}

fn run_audit(config: &AppConfig, args: AuditArgs) -> Result<(), AppError> {
    let mut fields = AuditFields::new(args.outcome, args.group);
    if let Some(qualified) = args.qualified {
        fields = fields.with_qualified(qualified);
    }

    let records = parse_audit_rows(File::open(&args.csv)?, &fields)?;
    let report = FairnessAuditor::new(config.fairness.clone()).audit(&records, &fields);

    if args.json {
        return print_json(&report);
    }
    render_report(&report);
    Ok(())
}

fn run_shortlist(config: &AppConfig, args: ShortlistArgs) -> Result<(), AppError> {
    let request = ShortlistRequest::parse(args.target, &args.method, &args.group)?;
    let job = load_job(&args.job)?;
    let candidates = load_candidates(&args.candidates)?;
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());

    let service = build_service(config, as_of);
    service.score_applicants(&job, &candidates)?;
    let result = service.shortlist_job(&job.id, &request)?;

    if args.json {
        return print_json(&result);
    }
    render_shortlist(&result);
    Ok(())
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn render_scores(title: &str, applications: &[Application]) {
    println!("Scores for {title}");

    let mut ranked: Vec<&Application> = applications.iter().collect();
    ranked.sort_by(|a, b| {
        b.overall()
            .total_cmp(&a.overall())
            .then_with(|| a.id.cmp(&b.id))
    });

    for application in ranked {
        let score = &application.score;
        println!(
            "- {}: overall {:.1} (skills {:.0}%, text {:.2}, CCI {:.1})",
            score.candidate_id,
            score.overall,
            score.skill_match * 100.0,
            score.text_similarity,
            score.cci
        );
        if !score.missing_skills.is_empty() {
            println!("    missing: {}", score.missing_skills.join(", "));
        }
        for warning in &score.warnings {
            println!("    warning: {warning}");
        }
    }
}

pub(crate) fn render_report(report: &FairnessReport) {
    println!(
        "Fairness audit of '{}' by '{}' ({} records)",
        report.fields.outcome, report.fields.group, report.records_audited
    );

    println!("\nGroups");
    for group in &report.groups {
        let sample_note = if group.sufficient_sample {
            ""
        } else {
            " [insufficient sample]"
        };
        println!(
            "- {}: {}/{} selected (rate {:.3}){}",
            group.group, group.selected, group.total, group.selection_rate, sample_note
        );
    }

    println!("\nMetrics");
    for metric in &report.metrics {
        let verdict = match (metric.is_significant(), metric.severity) {
            (true, Some(severity)) => severity.label().to_string(),
            _ => "not significant".to_string(),
        };
        println!(
            "- {}: {} (threshold {:.2}) {}",
            metric.metric.label(),
            metric.display_value(),
            metric.threshold,
            verdict
        );
    }

    match report.overall_severity {
        Some(severity) => println!("\nOverall: {}", severity.label()),
        None => println!("\nOverall: inconclusive"),
    }

    if !report.recommendations.is_empty() {
        println!("\nRecommendations");
        for recommendation in &report.recommendations {
            println!("- {recommendation}");
        }
    }
    if !report.warnings.is_empty() {
        println!("\nWarnings");
        for warning in &report.warnings {
            println!("- {warning}");
        }
    }
}

pub(crate) fn render_shortlist(result: &ShortlistResult) {
    println!(
        "Shortlist via {} ({} of {} requested)",
        result.method,
        result.shortlisted.len(),
        result.target_count
    );
    println!(
        "Disparate impact: {} -> {} ({})",
        ratio_label(result.disparate_impact_before),
        ratio_label(result.disparate_impact_after),
        if result.fully_compliant {
            "compliant"
        } else {
            "not fully compliant"
        }
    );

    println!("\nDecisions");
    for decision in &result.decisions {
        let marker = if decision.adjusted { " *" } else { "" };
        println!(
            "- #{} {} [{}] {:.1} {}{}",
            decision.merit_rank,
            decision.application_id,
            decision.group.as_deref().unwrap_or("-"),
            decision.overall,
            decision.status.label(),
            marker
        );
    }

    if result.adjustments.is_empty() {
        println!("\nAdjustments: none");
    } else {
        println!("\nAdjustments");
        for adjustment in &result.adjustments {
            println!(
                "- {} {}: {}",
                adjustment.application_id,
                adjustment.direction.label(),
                adjustment.reason
            );
        }
    }

    if !result.warnings.is_empty() {
        println!("\nWarnings");
        for warning in &result.warnings {
            println!("- {warning}");
        }
    }
}

fn ratio_label(ratio: Option<f64>) -> String {
    match ratio {
        Some(ratio) => format!("{ratio:.3}"),
        None => "N/A".to_string(),
    }
}
