// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
pub mod config;
mod error;
mod events;
mod kubernetes;
mod output;
pub mod progress;
mod versions;

use anyhow::{Result, anyhow};
use clap::Parser;
use console::Term;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use cli::{Args, Command};
use error::WatchError;
use events::watch::WATCH_TIMEOUT;
use events::{EventWatcher, FilterSpec, MessageMode, Pipeline, RowFormatter, SeenSet, severity_from_flags};
use kubernetes::{ContextMatcher, KubeContexts};
use output::{LogView, OutputFormat, TableView};
use progress::PollProgress;
use versions::{VersionReport, poll_versions};

/// Component label carried by every watch-loop log line
const WATCHER_COMPONENT: &str = "event-watcher";

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool, to_stderr: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // 10MB per file, 5 files, also rotated daily
    let log_path = log_dir.join("k8sevents.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(guard);

    let filter = if verbose { "k8sevents=debug" } else { "k8sevents=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if to_stderr {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();

    // Always log to file (~/.k8sevents/log/k8sevents.log). With -v, also to
    // stderr unless the table view owns the screen.
    let owns_screen = args.command.is_none() && args.output == OutputFormat::Table;
    init_logging(args.verbose, args.verbose && !owns_screen);

    match &args.command {
        Some(Command::Versions {
            environments,
            timeout,
        }) => run_versions(&args, environments.as_deref(), *timeout).await,
        None => run_watch(&args).await,
    }
}

async fn run_watch(args: &Args) -> Result<()> {
    let severity = severity_from_flags(args.warnings, args.normal)?;
    let filter = FilterSpec::new(args.filter.as_deref(), severity)?;

    let contexts = KubeContexts::discover()?;
    let Some(context) = select_context(args, &contexts)? else {
        return Ok(());
    };

    let source = contexts.event_session(&context, WATCH_TIMEOUT).await?;

    let mode = if args.single_line {
        MessageMode::SingleLine
    } else {
        MessageMode::MultiLine
    };
    let highlight = filter.pattern().cloned();
    let mut pipeline = Pipeline::new(
        filter,
        RowFormatter::new(&context, mode),
        SeenSet::new(args.max_seen),
        args.dedup_by,
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    let watcher = EventWatcher::new(source, WATCHER_COMPONENT);
    let summary = match args.output {
        OutputFormat::Table => {
            let mut view = TableView::new(Term::stdout());
            watcher.run(&mut pipeline, &mut view, &shutdown).await?
        }
        OutputFormat::Log => {
            let mut view = LogView::new(std::io::stdout(), highlight);
            watcher.run(&mut pipeline, &mut view, &shutdown).await?
        }
    };

    info!(
        context = %context,
        received = summary.received,
        malformed = summary.malformed,
        filtered = summary.filtered,
        duplicates = summary.duplicates,
        rendered = summary.rendered,
        reconnects = summary.reconnects,
        failed_reopens = summary.failed_reopens,
        seen = pipeline.seen_count(),
        "Watch finished"
    );
    Ok(())
}

/// `-c` wins; otherwise ask, or fall back to current-context when nobody is
/// at the terminal. `None` means the picker was dismissed.
fn select_context(args: &Args, contexts: &KubeContexts) -> Result<Option<String>> {
    let names = contexts.names();
    if names.is_empty() {
        return Err(WatchError::config("no contexts found in kubeconfig").into());
    }

    if let Some(spec) = &args.context {
        if contexts.full_name(spec).is_some() {
            return Ok(Some(spec.clone()));
        }
        return Ok(Some(ContextMatcher::new(names).resolve_one(spec)?));
    }

    if !console::user_attended() {
        let current = contexts.current().ok_or_else(|| {
            WatchError::config("no --context given and kubeconfig has no current-context")
        })?;
        info!(context = %current, "No terminal attached, using current-context");
        return Ok(Some(current));
    }

    let mut config = config::Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable config");
        config::Config::default()
    });
    let default = config.last_context.clone().or_else(|| contexts.current());

    let picked = cli::pick_context(names, default.as_deref())?;
    if let Some(ctx) = &picked
        && let Err(e) = config.set_last_context(ctx)
    {
        warn!(error = %e, "Could not save selected context");
    }
    Ok(picked)
}

async fn run_versions(args: &Args, environments: Option<&Path>, timeout_secs: u64) -> Result<()> {
    // Mapping problems are reported before any cluster is contacted
    let path = match environments {
        Some(p) => p.to_path_buf(),
        None => config::EnvironmentMap::default_path()?,
    };
    let envs = config::EnvironmentMap::load(&path)?;

    let contexts = KubeContexts::discover()?;
    let selected = match &args.context {
        Some(spec) => ContextMatcher::new(contexts.names()).resolve(spec)?,
        None => contexts.names().to_vec(),
    };

    let progress = if console::user_attended_stderr() {
        PollProgress::new(selected.len())
    } else {
        PollProgress::hidden(selected.len())
    };
    let timeout = Duration::from_secs(timeout_secs.max(1));
    let results = poll_versions(&contexts, &selected, timeout, &progress).await;
    progress.finish();

    let report = VersionReport::build(results, &envs);
    print!("{}", report.render());

    info!(
        contexts = selected.len(),
        unreachable = report.unreachable_count(),
        "Version poll finished"
    );
    Ok(())
}
