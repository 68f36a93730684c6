//! Shared walk state
//!
//! One [`Coordinator`] is created per [`traverse`](crate::walker::traverse)
//! call and borrowed by every worker. It owns:
//! - the match, denied and downloaded sets
//! - the stop flag (monotonic false -> true)
//! - the first fatal failure
//!
//! The stop flag lives under the same lock as the result sets so that
//! "check cap, append, maybe stop" is a single step. An `AtomicBool`
//! mirrors it for lock-free polling in worker loops.

use crate::error::WalkError;
use crate::remote::DirectoryEntry;
use crate::walker::hooks::TraversalProgress;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
struct SharedState {
    matches: Vec<DirectoryEntry>,
    denied: Vec<DirectoryEntry>,
    downloaded: Vec<DirectoryEntry>,
    bytes_downloaded: u64,
    failure: Option<WalkError>,
    stopped: bool,
}

/// A match taken by [`Coordinator::accept`]
///
/// Its transfer result is recorded even after the walk stops, since the
/// entry was accepted before the stop.
#[derive(Debug)]
pub struct Accepted(DirectoryEntry);

impl Accepted {
    pub fn entry(&self) -> &DirectoryEntry {
        &self.0
    }
}

/// Sets shared by the workers of one walk
#[derive(Debug)]
pub struct Coordinator {
    state: Mutex<SharedState>,
    stopped: AtomicBool,
    cancelled: AtomicBool,
    dirs_listed: AtomicU64,
    max_matches: Option<usize>,
}

/// Final contents of a coordinator
#[derive(Debug, Default)]
pub struct CollectedEntries {
    pub matches: Vec<DirectoryEntry>,
    pub denied: Vec<DirectoryEntry>,
    pub downloaded: Vec<DirectoryEntry>,
    pub bytes_downloaded: u64,
    pub cancelled: bool,
    pub cap_reached: bool,
    pub dirs_listed: u64,
}

impl Coordinator {
    /// Create a coordinator with an optional match cap
    pub fn new(max_matches: Option<usize>) -> Self {
        Self {
            state: Mutex::new(SharedState::default()),
            stopped: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            dirs_listed: AtomicU64::new(0),
            max_matches,
        }
    }

    /// Offer a matching entry
    ///
    /// Rejected if the walk is stopped or the cap is already reached.
    /// Accepting the entry that fills the cap sets the stop flag.
    pub fn append(&self, entry: DirectoryEntry) -> bool {
        self.push_match(entry)
    }

    /// Like [`append`](Self::append), keeping a handle for the entry's transfer
    pub fn accept(&self, entry: DirectoryEntry) -> Option<Accepted> {
        let copy = entry.clone();
        self.push_match(entry).then(|| Accepted(copy))
    }

    /// Record a completed transfer of an accepted entry
    pub fn record_downloaded(&self, accepted: Accepted, bytes: u64) {
        let mut state = self.state.lock();
        state.bytes_downloaded += bytes;
        state.downloaded.push(accepted.0);
    }

    /// Record a denied transfer of an accepted entry
    pub fn record_transfer_denied(&self, accepted: Accepted) {
        self.state.lock().denied.push(accepted.0);
    }

    /// Record a denied entry, unless the walk has stopped
    pub fn append_denied(&self, entry: DirectoryEntry) -> bool {
        let mut state = self.state.lock();
        if state.stopped {
            return false;
        }
        state.denied.push(entry);
        true
    }

    /// Set the stop flag, returning whether it was already set
    pub fn try_set_stop(&self) -> bool {
        let mut state = self.state.lock();
        let was_set = state.stopped;
        self.stop_locked(&mut state);
        was_set
    }

    /// Check the stop flag without taking the lock
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Check whether the match cap has been reached
    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        self.is_full_locked(&state)
    }

    /// Stop because the caller cancelled
    ///
    /// A walk that already stopped for another reason is not marked cancelled.
    pub fn cancel(&self) {
        if !self.try_set_stop() {
            self.cancelled.store(true, Ordering::Release);
            debug!("Walk cancelled");
        }
    }

    /// Record a fatal failure and stop
    ///
    /// Only the first failure is kept; returns whether this one was it.
    pub fn fail(&self, error: WalkError) -> bool {
        let mut state = self.state.lock();
        self.stop_locked(&mut state);
        if state.failure.is_some() {
            debug!(error = %error, "Dropping secondary failure");
            return false;
        }
        state.failure = Some(error);
        true
    }

    /// Count one listed directory
    pub fn record_dir_listed(&self) {
        self.dirs_listed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counts for progress reporting
    pub fn snapshot(&self) -> TraversalProgress {
        let state = self.state.lock();
        TraversalProgress {
            matched: state.matches.len(),
            denied: state.denied.len(),
            dirs_listed: self.dirs_listed.load(Ordering::Relaxed),
        }
    }

    /// Consume the coordinator, re-raising the first failure if any
    pub fn into_outcome(self) -> Result<CollectedEntries, WalkError> {
        let state = self.state.into_inner();
        if let Some(error) = state.failure {
            return Err(error);
        }
        let cap_reached = self
            .max_matches
            .is_some_and(|max| state.matches.len() >= max);
        Ok(CollectedEntries {
            matches: state.matches,
            denied: state.denied,
            downloaded: state.downloaded,
            bytes_downloaded: state.bytes_downloaded,
            cancelled: self.cancelled.load(Ordering::Acquire),
            cap_reached,
            dirs_listed: self.dirs_listed.load(Ordering::Relaxed),
        })
    }

    fn push_match(&self, entry: DirectoryEntry) -> bool {
        let mut state = self.state.lock();
        if state.stopped {
            return false;
        }
        if self.is_full_locked(&state) {
            self.stop_locked(&mut state);
            return false;
        }

        state.matches.push(entry);
        if self.is_full_locked(&state) {
            debug!(matches = state.matches.len(), "Match cap reached");
            self.stop_locked(&mut state);
        }
        true
    }

    fn is_full_locked(&self, state: &SharedState) -> bool {
        self.max_matches
            .is_some_and(|max| state.matches.len() >= max)
    }

    fn stop_locked(&self, state: &mut SharedState) {
        state.stopped = true;
        self.stopped.store(true, Ordering::Release);
    }
}
