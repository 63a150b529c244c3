//! Offline maintenance for onboarding answer snapshots.
//!
//! `backfill` replays newline-delimited completion payloads through the
//! aggregation path; `export` streams every snapshot as NDJSON; `list` prints
//! one filtered page and the cursor for the next.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use ortho_config::OrthoConfig;
use tenant_scope::ScopeSettings;
use pagination::Page;
use tenant_scope::domain::onboarding::{
    OnboardingAnswerAggregator, OnboardingAnswerSnapshot, SnapshotOrder, SnapshotQuery,
};
use tenant_scope::outbound::persistence::{DbPool, DieselOnboardingSnapshotRepository, PoolConfig};
use tenant_scope::telemetry;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::runtime::Builder;

/// `onboarding-tools` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "onboarding-tools",
    about = "Backfill and export onboarding answer snapshots",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `TENANT_SCOPE_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Replay completion payloads, one JSON object per line.
    Backfill {
        /// NDJSON file of completion payloads.
        #[arg(long, value_name = "path")]
        input: PathBuf,
    },
    /// Write every snapshot as NDJSON.
    Export {
        /// Output file; stdout when omitted.
        #[arg(long, value_name = "path")]
        output: Option<PathBuf>,
        /// Snapshots fetched per batch.
        #[arg(long = "batch-size", value_name = "count")]
        batch_size: Option<u32>,
    },
    /// Print one page of snapshots as NDJSON.
    List {
        /// Token printed by a previous `list` run.
        #[arg(long, value_name = "token")]
        cursor: Option<String>,
        /// Page size, capped by the configured maximum.
        #[arg(long, value_name = "count")]
        limit: Option<u32>,
        /// Only snapshots from this workspace.
        #[arg(long, value_name = "id")]
        workspace: Option<String>,
        /// Only snapshots answering this role.
        #[arg(long, value_name = "role")]
        role: Option<String>,
        /// Newest first.
        #[arg(long)]
        descending: bool,
    },
}

fn main() -> io::Result<()> {
    telemetry::init_tracing();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = ScopeSettings::load_from_iter([OsString::from("onboarding-tools")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;

    let database_url = resolve_database_url(args.database_url, settings.database_url.clone())?;
    let pool = DbPool::new(PoolConfig::new(&database_url))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
    let aggregator = OnboardingAnswerAggregator::new(
        Arc::new(DieselOnboardingSnapshotRepository::new(pool)),
        settings.max_page_size(),
    );

    match args.command {
        Command::Backfill { input } => {
            let records = read_backlog(&input).await?;
            let total = records.len();
            let stored = aggregator
                .drain_backlog(&records)
                .await
                .map_err(|error| io::Error::other(format!("backfill failed: {error}")))?;
            println!("records={total}");
            println!("stored={stored}");
            println!("skipped={}", total.saturating_sub(stored));
        }
        Command::Export { output, batch_size } => {
            let batch_size = batch_size.unwrap_or_else(|| settings.export_batch_size());
            let exported = match output {
                Some(path) => {
                    let file = tokio::fs::File::create(&path).await.map_err(|error| {
                        io::Error::other(format!("create '{}': {error}", path.display()))
                    })?;
                    export(&aggregator, batch_size, file).await?
                }
                None => export(&aggregator, batch_size, tokio::io::stdout()).await?,
            };
            eprintln!("exported={exported}");
        }
        Command::List {
            cursor,
            limit,
            workspace,
            role,
            descending,
        } => {
            let query = snapshot_query(workspace, role, descending);
            let page = aggregator
                .resume_snapshots(&query, cursor.as_deref(), limit)
                .await
                .map_err(|error| io::Error::other(format!("list failed: {error}")))?;
            print!("{}", encode_batch(&page.items)?);
            eprint!("{}", page_summary(&page));
        }
    }
    Ok(())
}

async fn export<W>(
    aggregator: &OnboardingAnswerAggregator,
    batch_size: u32,
    sink: W,
) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(sink);
    let mut batches = aggregator.iter_all_snapshots(batch_size);
    let mut exported = 0_usize;
    while let Some(batch) = batches.next().await {
        let batch = batch.map_err(|error| io::Error::other(format!("export failed: {error}")))?;
        writer.write_all(encode_batch(&batch)?.as_bytes()).await?;
        exported += batch.len();
    }
    writer.flush().await?;
    Ok(exported)
}

fn encode_batch(batch: &[OnboardingAnswerSnapshot]) -> io::Result<String> {
    let mut encoded = String::new();
    for snapshot in batch {
        encoded.push_str(&serde_json::to_string(snapshot).map_err(io::Error::other)?);
        encoded.push('\n');
    }
    Ok(encoded)
}

fn snapshot_query(workspace: Option<String>, role: Option<String>, descending: bool) -> SnapshotQuery {
    SnapshotQuery {
        workspace_id: workspace,
        role,
        order: if descending {
            SnapshotOrder::Descending
        } else {
            SnapshotOrder::Ascending
        },
        ..SnapshotQuery::default()
    }
}

fn page_summary<T>(page: &Page<T>) -> String {
    match page.next_cursor() {
        Some(cursor) => format!("total={}\nnext_cursor={}\n", page.total, cursor.encode()),
        None => format!("total={}\n", page.total),
    }
}

async fn read_backlog(path: &Path) -> io::Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|error| io::Error::other(format!("read '{}': {error}", path.display())))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

fn resolve_database_url(explicit: Option<String>, configured: Option<String>) -> io::Result<String> {
    let url = explicit.or(configured).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "database URL missing: set --database-url or TENANT_SCOPE_DATABASE_URL",
        )
    })?;
    if url.trim().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "database URL must not be empty",
        ));
    }
    Ok(url)
}
