// src/main.rs

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing::info;

use auditly::{AuditError, AuditReport, AuditRequest, AuditSnapshot, Auditor};

mod cli;

use cli::{Cli, OutputFormat};

/// Exit status of an audit that failed (invalid URL or primary fetch).
const AUDIT_FAILED: u8 = 2;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    // Before the runtime starts, so the local UTC offset can be read.
    auditly::logging::initialize_logging(cli.verbose)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.audit_config()?;
    let auditor = Auditor::new(config)?;

    let outcome = match (&cli.from_snapshot, &cli.url) {
        (Some(path), _) => Ok(replay(&auditor, path).await?),
        (None, Some(url)) => audit(&auditor, url, cli.save_snapshot.as_deref()).await?,
        (None, None) => return Err(eyre!("a URL is required unless --from-snapshot is given")),
    };

    match outcome {
        Ok(report) => {
            match cli.format {
                OutputFormat::Text => print!("{}", cli::render_text(&report)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            match cli.format {
                OutputFormat::Text => eprintln!("Audit failed ({}): {}", e.reason(), e),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "status": "failed",
                        "reason": e.reason(),
                        "message": e.to_string(),
                    }))?
                ),
            }
            Ok(ExitCode::from(AUDIT_FAILED))
        }
    }
}

/// Runs a live audit. The outer `Result` carries I/O trouble with the
/// snapshot file; the inner one the audit's own outcome.
async fn audit(auditor: &Auditor, url: &str, save_to: Option<&Path>) -> Result<Result<AuditReport, AuditError>> {
    let Some(path) = save_to else {
        return Ok(auditor.run_audit(url).await);
    };

    let request = match AuditRequest::parse(url) {
        Ok(request) => request,
        Err(e) => return Ok(Err(e)),
    };
    let snapshot = match auditor.fetch_snapshot(&request).await {
        Ok(snapshot) => snapshot,
        Err(e) => return Ok(Err(e)),
    };
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, json).wrap_err_with(|| format!("could not write snapshot to {}", path.display()))?;
    info!(path = %path.display(), "Snapshot saved.");

    Ok(Ok(auditor.audit_snapshot(&request, snapshot).await))
}

async fn replay(auditor: &Auditor, path: &Path) -> Result<AuditReport> {
    let raw = std::fs::read_to_string(path).wrap_err_with(|| format!("could not read snapshot {}", path.display()))?;
    let snapshot: AuditSnapshot = serde_json::from_str(&raw).wrap_err("snapshot is not valid JSON")?;
    let request = AuditRequest::parse(snapshot.resource.requested_url.as_str())?;
    info!(path = %path.display(), url = %request.url(), "Replaying snapshot.");
    Ok(auditor.audit_snapshot(&request, snapshot).await)
}
