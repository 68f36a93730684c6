//! Parallel remote traversal
//!
//! Architecture:
//! ```text
//! Directory queue (crossbeam deque - work stealing)
//! │
//! ├── Worker 0: pop dir → list → offer matches → push subdirs
//! ├── Worker 1: pop dir → list → offer matches → push subdirs
//! └── Worker N: pop dir → list → offer matches → push subdirs
//! │
//! └── Coordinator: match set, denied set, stop flag, first failure
//! ```
//!
//! Each worker opens its own channel on its first task and keeps it until
//! the walk ends. The walk ends when the pending counter drains or the
//! stop flag is set (cap reached, cancelled, or a fatal failure).

use crate::download::{transfer_entry, Transfer};
use crate::error::{RemoteError, RemoteResult, Result, WalkError, WorkerError};
use crate::remote::{DirectoryEntry, RemoteChannel, RemoteSession};
use crate::walker::coordinator::Coordinator;
use crate::walker::options::{ErrorPolicy, TraversalOptions};
use crate::walker::queue::{DirTask, LocalQueue, WorkQueue};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Busy polls before an idle worker sleeps
const MAX_IDLE_SPINS: u32 = 1000;

/// Idle sleep between polls once spinning gave up
const IDLE_SLEEP: Duration = Duration::from_micros(100);

/// Statistics for one walk
#[derive(Debug, Clone, Default)]
pub struct TraversalStats {
    /// Directories successfully listed
    pub dirs_listed: u64,

    /// Worker threads used
    pub workers: usize,

    /// Whether the match cap stopped the walk
    pub cap_reached: bool,

    /// Bytes written to the download sink
    pub bytes_downloaded: u64,

    /// False when the walk was cancelled before it finished
    pub completed: bool,

    pub duration: Duration,
}

/// Matches and denials collected by a walk
#[derive(Debug, Clone, Default)]
pub struct TraversalOutcome {
    /// Non-directory entries whose name fully matched the pattern
    pub matches: Vec<DirectoryEntry>,

    /// Entries whose listing or transfer was denied (Warn policy only)
    pub denied: Vec<DirectoryEntry>,

    /// Matches actually copied to the download sink
    pub downloaded: Vec<DirectoryEntry>,

    pub stats: TraversalStats,
}

/// Walk the tree under `root`, collecting matching entries
///
/// Returns a partial outcome if cancelled. Permission failures follow the
/// configured [`ErrorPolicy`]; under `Abort` the first one is returned as
/// the error and no entries are returned.
pub fn traverse<S: RemoteSession>(
    session: &S,
    root: &str,
    options: &TraversalOptions,
) -> Result<TraversalOutcome> {
    let start = Instant::now();
    let coordinator = Coordinator::new(options.max_matches());

    info!(
        root = %root,
        pattern = %options.pattern(),
        recurse = options.recurse(),
        max_matches = ?options.max_matches(),
        workers = options.workers(),
        policy = %options.error_policy(),
        download = options.downloads(),
        "Starting traversal"
    );

    if options.is_cancelled() {
        coordinator.cancel();
    } else {
        run_workers(session, root, options, &coordinator);
    }

    let collected = coordinator.into_outcome()?;
    let stats = TraversalStats {
        dirs_listed: collected.dirs_listed,
        workers: options.workers(),
        cap_reached: collected.cap_reached,
        bytes_downloaded: collected.bytes_downloaded,
        completed: !collected.cancelled,
        duration: start.elapsed(),
    };

    info!(
        matches = collected.matches.len(),
        denied = collected.denied.len(),
        downloaded = collected.downloaded.len(),
        dirs = stats.dirs_listed,
        completed = stats.completed,
        elapsed_ms = stats.duration.as_millis() as u64,
        "Traversal finished"
    );

    Ok(TraversalOutcome {
        matches: collected.matches,
        denied: collected.denied,
        downloaded: collected.downloaded,
        stats,
    })
}

/// Run the worker pool until the queue drains or the walk stops
fn run_workers<S: RemoteSession>(
    session: &S,
    root: &str,
    options: &TraversalOptions,
    coordinator: &Coordinator,
) {
    let (queue, locals) = WorkQueue::new(options.workers());
    queue.submit(DirTask::root(root));

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(locals.len());

        for (id, deque) in locals.into_iter().enumerate() {
            let local = queue.local(id, deque);
            let spawned = thread::Builder::new()
                .name(format!("walker-{}", id))
                .spawn_scoped(scope, move || {
                    worker_loop(id, session, local, coordinator, options)
                });

            match spawned {
                Ok(handle) => handles.push((id, handle)),
                Err(e) => {
                    coordinator.fail(
                        WorkerError::InitFailed {
                            id,
                            reason: e.to_string(),
                        }
                        .into(),
                    );
                    break;
                }
            }
        }

        for (id, handle) in handles {
            if let Err(panic) = handle.join() {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                coordinator.fail(WorkerError::Panicked { id, message }.into());
            }
        }
    });

    if !queue.is_drained() {
        debug!(pending = queue.pending(), "Walk stopped with work remaining");
    }
}

/// Sets the stop flag if the worker unwinds, so siblings do not wait forever
struct StopOnPanic<'a>(&'a Coordinator);

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.try_set_stop();
        }
    }
}

fn worker_loop<S: RemoteSession>(
    id: usize,
    session: &S,
    queue: LocalQueue<'_, DirTask>,
    coordinator: &Coordinator,
    options: &TraversalOptions,
) {
    let _guard = StopOnPanic(coordinator);
    let mut channel: Option<S::Channel> = None;
    let mut idle_spins = 0;

    debug!(worker = id, "Worker started");

    loop {
        if coordinator.is_stopped() {
            break;
        }
        if options.is_cancelled() {
            coordinator.cancel();
            break;
        }

        let task = match queue.next() {
            Some(task) => {
                idle_spins = 0;
                task
            }
            None => {
                if queue.is_drained() {
                    break;
                }
                idle_spins += 1;
                if idle_spins > MAX_IDLE_SPINS {
                    thread::sleep(IDLE_SLEEP);
                    idle_spins = 0;
                }
                continue;
            }
        };

        let result = match worker_channel(&mut channel, session, id) {
            Ok(ch) => visit_directory(id, ch, &task, &queue, coordinator, options),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            if coordinator.fail(e) {
                debug!(worker = id, path = %task.path(), "Walk aborted");
            }
        }

        queue.finish();
        report_progress(coordinator, options);
    }

    if let Some(ch) = channel.take() {
        ch.close();
    }
    debug!(worker = id, "Worker finished");
}

/// Get this worker's channel, opening it on first use
fn worker_channel<'c, S: RemoteSession>(
    slot: &'c mut Option<S::Channel>,
    session: &S,
    id: usize,
) -> RemoteResult<&'c mut S::Channel> {
    let channel = match slot.take() {
        Some(channel) => channel,
        None => {
            let channel = session.open_channel()?;
            debug!(worker = id, "Channel opened");
            channel
        }
    };
    Ok(slot.insert(channel))
}

/// List one directory and act on its children
fn visit_directory<C: RemoteChannel>(
    id: usize,
    channel: &mut C,
    task: &DirTask,
    queue: &LocalQueue<'_, DirTask>,
    coordinator: &Coordinator,
    options: &TraversalOptions,
) -> Result<()> {
    debug!(worker = id, path = %task.path(), "Listing directory");

    let entries = match channel.list(task.path()) {
        Ok(entries) => entries,
        Err(e) if e.is_permission_denied() => {
            return on_denied(coordinator, options.error_policy(), &task.entry, e);
        }
        Err(e) if e.is_not_found() && !task.is_root() => {
            debug!(worker = id, path = %task.path(), "Directory vanished, skipping");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    coordinator.record_dir_listed();

    let mut subdirs = Vec::new();
    for entry in entries {
        if coordinator.is_stopped() {
            return Ok(());
        }
        if options.is_cancelled() {
            coordinator.cancel();
            return Ok(());
        }

        if entry.is_dir() {
            if options.recurse() {
                subdirs.push(entry);
            }
            continue;
        }
        if !options.matches_name(&entry.name) {
            continue;
        }

        match options.download.as_deref() {
            Some(sink) => {
                if let Some(accepted) = coordinator.accept(entry) {
                    let policy = options.error_policy();
                    match transfer_entry(channel, sink, accepted.entry(), policy)? {
                        Transfer::Copied(bytes) => {
                            coordinator.record_downloaded(accepted, bytes)
                        }
                        Transfer::Denied => coordinator.record_transfer_denied(accepted),
                        Transfer::Skipped => {}
                    }
                }
            }
            None => {
                coordinator.append(entry);
            }
        }
        report_progress(coordinator, options);
    }

    for subdir in subdirs {
        if coordinator.is_stopped() || coordinator.is_full() {
            break;
        }
        if options.is_cancelled() {
            coordinator.cancel();
            break;
        }
        queue.push(task.child(subdir));
    }

    Ok(())
}

/// Apply the error policy to a denied directory
fn on_denied(
    coordinator: &Coordinator,
    policy: ErrorPolicy,
    entry: &DirectoryEntry,
    error: RemoteError,
) -> Result<()> {
    match policy {
        ErrorPolicy::Abort => Err(WalkError::Remote(error)),
        ErrorPolicy::Warn => {
            warn!(path = %entry.path, "No access to directory, skipping");
            coordinator.append_denied(entry.clone());
            Ok(())
        }
        ErrorPolicy::Ignore => {
            debug!(path = %entry.path, "No access to directory, ignored");
            Ok(())
        }
    }
}

fn report_progress(coordinator: &Coordinator, options: &TraversalOptions) {
    if let Some(sink) = &options.progress {
        sink.on_progress(coordinator.snapshot());
    }
}
