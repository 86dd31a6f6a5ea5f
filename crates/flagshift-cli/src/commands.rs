//! Subcommand runners

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use flagshift_client::RateLimitedClient;
use flagshift_core::{
    BatchSummary, FetchSummary, FsSnapshotStore, MigrationOrchestrator, ProjectOutcome,
    ProjectPlan, RunStatus, SnapshotStore, SourceError, SourceFetcher,
};
use serde_json::{json, Value};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::settings::{FileConfig, MigrateSettings, ProjectSelection, SourceSettings};

/// Process exit code for a clean run
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code for a fatal error
pub const EXIT_FAILURE: i32 = 1;
/// Process exit code when something needs review
pub const EXIT_WARNINGS: i32 = 2;
/// Process exit code after Ctrl-C
pub const EXIT_CANCELLED: i32 = 130;

/// Exit code for a finished run
#[must_use]
pub fn exit_code(status: RunStatus) -> i32 {
    match status {
        RunStatus::Success => EXIT_SUCCESS,
        RunStatus::Warnings => EXIT_WARNINGS,
        RunStatus::Failed => EXIT_FAILURE,
        RunStatus::Cancelled => EXIT_CANCELLED,
    }
}

/// Run the selected subcommand
///
/// # Errors
/// Configuration problems and failures that stop the whole command.
pub async fn run(matches: &ArgMatches, cancel: CancellationToken) -> Result<RunStatus> {
    let file = FileConfig::from_matches(matches)?;
    let mut out = io::stdout().lock();
    match matches.subcommand() {
        Some(("source", args)) => {
            run_source(SourceSettings::resolve(args, &file)?, cancel, &mut out).await
        }
        Some(("migrate", args)) => {
            run_migrate(MigrateSettings::resolve(args, &file)?, cancel, &mut out).await
        }
        Some((other, _)) => bail!("unknown command {other}"),
        None => bail!("no command given"),
    }
}

/// Cancel `token` on the first Ctrl-C
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current request");
            token.cancel();
        }
    });
}

/// Download source projects into the snapshot directory
///
/// # Errors
/// Client construction or a project that cannot be fetched.
pub async fn run_source(
    settings: SourceSettings,
    cancel: CancellationToken,
    out: &mut impl Write,
) -> Result<RunStatus> {
    let client = Arc::new(RateLimitedClient::new(settings.client)?.with_cancellation(cancel.clone()));
    let sink = Arc::new(FsSnapshotStore::new(&settings.source_dir));
    let fetcher = SourceFetcher::new(client, sink).with_page_size(settings.page_size);

    let summaries = match fetch_selected(&fetcher, settings.selection).await {
        Ok(summaries) => summaries,
        Err(_) if cancel.is_cancelled() => {
            writeln!(out, "Source download cancelled")?;
            return Ok(RunStatus::Cancelled);
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("downloading into {}", settings.source_dir.display())
            })
        }
    };

    print_fetch_summaries(&summaries, out)?;
    if summaries.iter().any(|s| !s.failed_flags.is_empty()) {
        Ok(RunStatus::Warnings)
    } else {
        Ok(RunStatus::Success)
    }
}

/// Migrate cached projects into the destination account
///
/// # Errors
/// Client construction, an unreadable project list, or an invalid plan.
pub async fn run_migrate(
    settings: MigrateSettings,
    cancel: CancellationToken,
    out: &mut impl Write,
) -> Result<RunStatus> {
    let store = Arc::new(FsSnapshotStore::new(&settings.source_dir));
    let keys = match settings.selection {
        ProjectSelection::All => store
            .list_projects()
            .await
            .with_context(|| format!("listing projects in {}", settings.source_dir.display()))?,
        ProjectSelection::Keys(keys) => keys,
    };
    let plans = ProjectPlan::for_projects(keys, &settings.naming)?;

    let client = Arc::new(RateLimitedClient::new(settings.client)?.with_cancellation(cancel));
    let orchestrator = MigrationOrchestrator::new(Arc::clone(&client), store, settings.migration);
    let summary = orchestrator.run(plans).await;

    print_batch_summary(&summary, out)?;
    let stats = client.stats();
    tracing::info!(
        requests = stats.attempts,
        rate_limited = stats.rate_limited,
        "client totals"
    );

    if let Some(path) = &settings.report_file {
        write_report(path, &summary).await?;
    }
    Ok(summary.status())
}

async fn fetch_selected(
    fetcher: &SourceFetcher,
    selection: ProjectSelection,
) -> Result<Vec<FetchSummary>, SourceError> {
    let keys = match selection {
        ProjectSelection::All => fetcher.list_projects().await?,
        ProjectSelection::Keys(keys) => keys,
    };
    fetcher.fetch_projects(&keys).await
}

fn print_fetch_summaries(summaries: &[FetchSummary], out: &mut impl Write) -> io::Result<()> {
    for s in summaries {
        writeln!(
            out,
            "Sourced {}: {} environments, {} flags",
            s.project, s.environments, s.flags
        )?;
        if !s.failed_flags.is_empty() {
            writeln!(out, "  failed to fetch: {}", s.failed_flags.join(", "))?;
        }
    }
    Ok(())
}

/// Human-readable end-of-run summary
///
/// # Errors
/// When `out` cannot be written.
pub fn print_batch_summary(summary: &BatchSummary, out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "Migration completed in {:.1}s (run {})",
        summary.elapsed.as_secs_f64(),
        summary.run_id
    )?;
    writeln!(
        out,
        "Projects migrated: {} of {}",
        summary.completed(),
        summary.projects.len()
    )?;

    for project in &summary.projects {
        let report = match &project.result {
            Ok(report) => report,
            Err(e) => {
                writeln!(out, "  {}: failed: {e}", project.source_key)?;
                continue;
            }
        };
        let outcome = match report.outcome() {
            Some(ProjectOutcome::Completed) => "completed",
            Some(ProjectOutcome::CompletedWithWarnings) => "completed with warnings",
            Some(ProjectOutcome::Cancelled) => "cancelled",
            None => "incomplete",
        };
        writeln!(
            out,
            "  {} -> {}: {outcome}, {} segments, {} flags, {} patches",
            report.source_key,
            report.destination_key,
            report.segments_created,
            report.flags_created,
            report.patches_applied
        )?;
        let flags: Vec<&str> = report.flags_to_check().collect();
        if !flags.is_empty() {
            writeln!(out, "    flags to double-check: {}", flags.join(", "))?;
        }
        for failure in report.failures() {
            writeln!(out, "    {}: {}", failure.resource, failure.kind)?;
        }
    }
    Ok(())
}

/// JSON document written by `--report-file`
#[must_use]
pub fn report_json(summary: &BatchSummary) -> Value {
    let status = match summary.status() {
        RunStatus::Success => "success",
        RunStatus::Warnings => "warnings",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
    };
    let projects: Vec<Value> = summary
        .projects
        .iter()
        .map(|p| match &p.result {
            Ok(report) => json!({ "source_key": p.source_key, "report": report }),
            Err(e) => json!({ "source_key": p.source_key, "error": e.to_string() }),
        })
        .collect();
    json!({
        "run_id": summary.run_id,
        "started_at": summary.started_at,
        "elapsed_ms": u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
        "status": status,
        "completed": summary.completed(),
        "projects": projects,
    })
}

async fn write_report(path: &Path, summary: &BatchSummary) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(&report_json(summary))?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing report to {}", path.display()))
}
