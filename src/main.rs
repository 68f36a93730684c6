//! sftp-walker - Parallel SFTP Directory Walker
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use sftp_walker::config::{CliArgs, Mode, WalkConfig};
use sftp_walker::download::{download_entries, LocalDirSink};
use sftp_walker::progress::{print_header, print_summary, ProgressReporter, Summary};
use sftp_walker::remote::{DirectoryEntry, EntryType, SftpSession, SftpSessionBuilder};
use sftp_walker::report::{preview, write_json_records, write_listing, RecordStatus};
use sftp_walker::walker::{traverse, CancelProbe, FlagProbe, TraversalOptions, TraversalOutcome};
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = WalkConfig::from_args(args).context("Invalid configuration")?;

    // Ctrl-C flips the flag; the walker polls it
    let cancel = FlagProbe::default();
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        interrupt.cancel();
    })
    .context("Failed to set signal handler")?;

    if config.show_progress {
        print_header(
            &config.target.to_string(),
            &config.root,
            config.options.pattern(),
            config.options.workers(),
        );
    }

    let progress = config.show_progress.then(|| Arc::new(ProgressReporter::new()));
    if let Some(p) = &progress {
        p.set_status("Connecting to SFTP server...");
    }

    let session = SftpSessionBuilder::new(config.target.clone(), config.credentials.clone())
        .timeout(config.timeout)
        .retries(config.retries)
        .connect()
        .with_context(|| format!("Failed to connect to {}", config.target))?;
    info!(target_host = %session.target(), user = %config.credentials.username, "Connected");

    let mut options = config.options.clone().with_cancel_probe(cancel.clone());
    if let Some(p) = &progress {
        options = options.with_progress_sink(p.clone());
    }

    let result = match &config.mode {
        Mode::List => run_list(&session, &config, options, progress.as_deref()),
        Mode::Preview => run_preview(&session, &config, &options, progress.as_deref()),
        Mode::Download { dir } => {
            run_download(&session, &config, options, dir, progress.as_deref())
        }
        Mode::DownloadList { dir, paths } => {
            run_download_list(&session, &config, &cancel, dir, paths, progress.as_deref())
        }
    };

    if let Some(p) = &progress {
        p.finish_and_clear();
    }
    session.close();

    result
}

fn run_list(
    session: &SftpSession,
    config: &WalkConfig,
    options: TraversalOptions,
    progress: Option<&ProgressReporter>,
) -> Result<()> {
    let outcome = traverse(session, &config.root, &options).context("Walk failed")?;
    clear(progress);
    print_entries(config, &outcome.matches, &outcome.denied, RecordStatus::Matched)?;
    let bytes = outcome.matches.iter().map(|e| e.size).sum();
    finish(config, "Walk Complete", &outcome, &outcome.matches, bytes, None);
    Ok(())
}

fn run_preview(
    session: &SftpSession,
    config: &WalkConfig,
    options: &TraversalOptions,
    progress: Option<&ProgressReporter>,
) -> Result<()> {
    let result = preview(session, &config.root, options).context("Preview failed")?;
    clear(progress);
    if config.json {
        let mut out = io::stdout().lock();
        write_json_records(&mut out, &result.found, RecordStatus::Matched)?;
        write_json_records(&mut out, &result.denied, RecordStatus::Denied)?;
    } else {
        println!("{}", result);
    }
    Ok(())
}

fn run_download(
    session: &SftpSession,
    config: &WalkConfig,
    options: TraversalOptions,
    dir: &Path,
    progress: Option<&ProgressReporter>,
) -> Result<()> {
    let sink = LocalDirSink::new(dir).context("Invalid download directory")?;
    let local_dir = sink.dir().display().to_string();
    let options = options.with_download_sink(sink);
    let outcome = traverse(session, &config.root, &options).context("Download failed")?;
    clear(progress);
    print_entries(config, &outcome.downloaded, &outcome.denied, RecordStatus::Downloaded)?;
    finish(
        config,
        "Download Complete",
        &outcome,
        &outcome.downloaded,
        outcome.stats.bytes_downloaded,
        Some(local_dir),
    );
    Ok(())
}

fn run_download_list(
    session: &SftpSession,
    config: &WalkConfig,
    cancel: &FlagProbe,
    dir: &Path,
    paths: &[String],
    progress: Option<&ProgressReporter>,
) -> Result<()> {
    let sink = LocalDirSink::new(dir).context("Invalid download directory")?;
    let entries: Vec<DirectoryEntry> = paths
        .iter()
        .map(|p| DirectoryEntry::from_path(p, EntryType::File))
        .collect();

    let outcome = download_entries(
        session,
        &entries,
        &sink,
        config.options.error_policy(),
        Some(cancel as &dyn CancelProbe),
    )
    .context("Download failed")?;
    clear(progress);

    print_entries(config, &outcome.downloaded, &outcome.denied, RecordStatus::Downloaded)?;
    if config.show_progress {
        print_summary(&Summary {
            title: "Download Complete",
            dirs: 0,
            matches: outcome.downloaded.len(),
            denied: outcome.denied.len(),
            bytes: outcome.bytes,
            duration: outcome.duration,
            completed: outcome.completed,
            download_dir: Some(sink.dir().display().to_string()),
        });
    }
    Ok(())
}

fn clear(progress: Option<&ProgressReporter>) {
    if let Some(p) = progress {
        p.finish_and_clear();
    }
}

fn print_entries(
    config: &WalkConfig,
    entries: &[DirectoryEntry],
    denied: &[DirectoryEntry],
    status: RecordStatus,
) -> Result<()> {
    let mut out = io::stdout().lock();
    if config.json {
        write_json_records(&mut out, entries, status)?;
        write_json_records(&mut out, denied, RecordStatus::Denied)?;
        return Ok(());
    }

    write_listing(&mut out, entries)?;
    if !denied.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", style("No access:").yellow().bold())?;
        write_listing(&mut out, denied)?;
    }
    Ok(())
}

fn finish(
    config: &WalkConfig,
    title: &'static str,
    outcome: &TraversalOutcome,
    entries: &[DirectoryEntry],
    bytes: u64,
    dir: Option<String>,
) {
    if !outcome.stats.completed {
        info!("Walk was interrupted before completion");
    }
    if !config.show_progress {
        return;
    }
    print_summary(&Summary {
        title,
        dirs: outcome.stats.dirs_listed,
        matches: entries.len(),
        denied: outcome.denied.len(),
        bytes,
        duration: outcome.stats.duration,
        completed: outcome.stats.completed,
        download_dir: dir,
    });
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("sftp_walker=debug,warn")
    } else {
        EnvFilter::new("sftp_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
