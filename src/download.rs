//! Downloading matched entries to local storage
//!
//! A [`DownloadSink`] decides where each remote entry's bytes go. The walker
//! uses it for inline downloads; [`download_entries`] drives it for an
//! explicit list of entries.

use crate::error::{ConfigError, RemoteError, Result};
use crate::remote::{DirectoryEntry, RemoteChannel, RemoteSession};
use crate::walker::{CancelProbe, ErrorPolicy};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Destination for downloaded entries
pub trait DownloadSink: Send + Sync {
    /// Open a writer for `entry`
    fn create(&self, entry: &DirectoryEntry) -> io::Result<Box<dyn Write + Send>>;

    /// Remove whatever `create` left behind after a failed transfer
    fn discard(&self, _entry: &DirectoryEntry) -> io::Result<()> {
        Ok(())
    }
}

/// Writes each entry to `<dir>/<entry name>`
///
/// Entries with the same name from different directories overwrite each
/// other; the last transfer wins.
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    dir: PathBuf,
}

impl LocalDirSink {
    /// Create the sink, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>) -> std::result::Result<Self, ConfigError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ConfigError::InvalidDownloadDir {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        if !dir.is_dir() {
            return Err(ConfigError::InvalidDownloadDir {
                path: dir.display().to_string(),
                reason: "not a directory".into(),
            });
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path an entry is written to
    pub fn local_path(&self, entry: &DirectoryEntry) -> PathBuf {
        // Only the final component, so remote names cannot climb out of dir
        let name = Path::new(&entry.name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| entry.name.clone().into());
        self.dir.join(name)
    }
}

impl DownloadSink for LocalDirSink {
    fn create(&self, entry: &DirectoryEntry) -> io::Result<Box<dyn Write + Send>> {
        let file = File::create(self.local_path(entry))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn discard(&self, entry: &DirectoryEntry) -> io::Result<()> {
        match fs::remove_file(self.local_path(entry)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// What happened to one transfer that did not fail the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transfer {
    Copied(u64),
    Denied,
    Skipped,
}

/// Transfer one entry through `channel` into `sink`
///
/// Permission failures follow `policy`; vanished files are skipped; any
/// other failure is returned.
pub(crate) fn transfer_entry<C: RemoteChannel + ?Sized>(
    channel: &mut C,
    sink: &dyn DownloadSink,
    entry: &DirectoryEntry,
    policy: ErrorPolicy,
) -> Result<Transfer> {
    let mut writer = sink.create(entry)?;
    let result = channel.get(&entry.path, &mut writer);
    drop(writer);

    match result {
        Ok(bytes) => {
            debug!(path = %entry.path, bytes, "Downloaded");
            Ok(Transfer::Copied(bytes))
        }
        Err(e) => {
            sink.discard(entry)?;
            match e {
                RemoteError::PermissionDenied { .. } => match policy {
                    ErrorPolicy::Abort => Err(e.into()),
                    ErrorPolicy::Warn => {
                        warn!(path = %entry.path, "No access to file, skipping download");
                        Ok(Transfer::Denied)
                    }
                    ErrorPolicy::Ignore => {
                        debug!(path = %entry.path, "No access to file, ignored");
                        Ok(Transfer::Skipped)
                    }
                },
                RemoteError::NotFound { .. } => {
                    debug!(path = %entry.path, "File vanished before download");
                    Ok(Transfer::Skipped)
                }
                other => Err(other.into()),
            }
        }
    }
}

/// Result of downloading an explicit list of entries
#[derive(Debug, Default)]
pub struct DownloadOutcome {
    /// Entries written to the sink
    pub downloaded: Vec<DirectoryEntry>,

    /// Entries whose transfer was denied (Warn policy only)
    pub denied: Vec<DirectoryEntry>,

    /// Total bytes copied
    pub bytes: u64,

    /// False when the caller cancelled before the list was exhausted
    pub completed: bool,

    pub duration: Duration,
}

/// Download `entries` one after another on a single channel
///
/// Directories in the list are skipped. Permission failures follow
/// `policy`; the cancel probe is checked before each entry.
pub fn download_entries<S: RemoteSession>(
    session: &S,
    entries: &[DirectoryEntry],
    sink: &dyn DownloadSink,
    policy: ErrorPolicy,
    cancel: Option<&dyn CancelProbe>,
) -> Result<DownloadOutcome> {
    let start = Instant::now();
    let mut outcome = DownloadOutcome {
        completed: true,
        ..Default::default()
    };

    if entries.is_empty() {
        return Ok(outcome);
    }

    let mut channel = session.open_channel()?;
    info!(entries = entries.len(), policy = %policy, "Starting download");

    let result = (|| -> Result<()> {
        for entry in entries {
            if cancel.is_some_and(|probe| probe.is_cancelled()) {
                info!("Download cancelled");
                outcome.completed = false;
                break;
            }
            if entry.is_dir() {
                debug!(path = %entry.path, "Skipping directory");
                continue;
            }

            match transfer_entry(&mut channel, sink, entry, policy)? {
                Transfer::Copied(bytes) => {
                    outcome.bytes += bytes;
                    outcome.downloaded.push(entry.clone());
                }
                Transfer::Denied => outcome.denied.push(entry.clone()),
                Transfer::Skipped => {}
            }
        }
        Ok(())
    })();

    channel.close();
    result?;

    outcome.duration = start.elapsed();
    info!(
        downloaded = outcome.downloaded.len(),
        denied = outcome.denied.len(),
        bytes = outcome.bytes,
        "Download finished"
    );
    Ok(outcome)
}
