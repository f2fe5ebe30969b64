// src/cli.rs

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use auditly::{AuditConfig, AuditReport, CategoryResult};
use auditly::core::knowledge_base::get_finding_detail;
use auditly::core::models::{CategoryScore, ReportFinding};

/// On-demand SEO, technical and security audit of a single web page
#[derive(Parser, Debug)]
#[command(name = "auditly")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Absolute http(s) URL of the page to audit
    #[arg(required_unless_present = "from_snapshot")]
    pub url: Option<String>,

    /// JSON configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Overall timeout of the primary fetch, in milliseconds
    #[arg(long)]
    pub primary_timeout_ms: Option<u64>,

    /// Timeout of robots.txt and the compression probe, in milliseconds
    #[arg(long)]
    pub aux_timeout_ms: Option<u64>,

    /// Timeout of each sampled link check, in milliseconds
    #[arg(long)]
    pub link_timeout_ms: Option<u64>,

    /// Maximum number of redirects followed
    #[arg(long)]
    pub max_redirects: Option<usize>,

    /// Number of page links checked for reachability
    #[arg(long)]
    pub link_sample_size: Option<usize>,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Save the fetched snapshot as JSON before analysing it
    #[arg(long, conflicts_with = "from_snapshot")]
    pub save_snapshot: Option<PathBuf>,

    /// Audit a previously saved snapshot instead of fetching
    #[arg(long)]
    pub from_snapshot: Option<PathBuf>,

    /// Also log to stderr
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// The configuration file (or defaults) with command-line overrides applied.
    pub fn audit_config(&self) -> Result<AuditConfig, auditly::ConfigError> {
        let mut config = match &self.config {
            Some(path) => AuditConfig::from_file(path)?,
            None => AuditConfig::default(),
        };
        if let Some(ms) = self.primary_timeout_ms {
            config.primary_fetch_timeout_ms = ms;
        }
        if let Some(ms) = self.aux_timeout_ms {
            config.aux_fetch_timeout_ms = ms;
        }
        if let Some(ms) = self.link_timeout_ms {
            config.link_check_timeout_ms = ms;
        }
        if let Some(n) = self.max_redirects {
            config.max_redirects = n;
        }
        if let Some(n) = self.link_sample_size {
            config.link_sample_size = n;
        }
        config.validate()?;
        Ok(config)
    }
}

fn score_label(result: &CategoryResult) -> String {
    match result.score() {
        CategoryScore::Scored { value, confidence } if confidence < 1.0 => {
            format!("{:>5.1}  (confidence {:.0}%)", value, confidence * 100.0)
        }
        CategoryScore::Scored { value, .. } => format!("{:>5.1}", value),
        CategoryScore::Unavailable => "unavailable".to_string(),
    }
}

/// One finding as a report line. Catalogued codes show their title.
fn finding_line(item: &ReportFinding) -> String {
    let finding = &item.finding;
    let label = match get_finding_detail(&finding.code) {
        Some(detail) => format!("{} ({})", detail.title, finding.code),
        None => finding.code.clone(),
    };
    format!(
        "  [{}] {} / {}: {}",
        finding.severity.to_string().to_uppercase(),
        item.category,
        label,
        finding.message
    )
}

pub fn render_text(report: &AuditReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Audit of {}", report.request().url());
    if report.resolved_url() != report.request().url() {
        let _ = writeln!(out, "Resolved to {}", report.resolved_url());
    }
    match report.composite_score() {
        Some(score) => {
            let _ = writeln!(out, "Composite score: {:.1} / 100", score);
        }
        None => {
            let _ = writeln!(out, "Composite score: unavailable");
        }
    }
    let _ = writeln!(out, "Generated at {}", report.generated_at().to_rfc3339());

    let _ = writeln!(out, "\nCategories");
    for (category, result) in report.categories() {
        let _ = writeln!(out, "  {:<16} {}", category.to_string(), score_label(result));
    }

    let _ = writeln!(out, "\nFindings");
    for item in report.findings() {
        let _ = writeln!(out, "{}", finding_line(item));
        if let Some(remediation) = &item.finding.remediation {
            let _ = writeln!(out, "      -> {}", remediation);
        }
    }
    out
}
