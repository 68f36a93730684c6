//! Cancellation and progress hooks
//!
//! Both hooks are owned by the caller. The walker polls [`CancelProbe`]
//! and pushes counts into [`ProgressSink`]; neither is ever called while
//! the coordinator lock is held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Polled by workers to learn whether the caller wants to stop
pub trait CancelProbe: Send + Sync {
    /// Return true once the walk should wind down
    fn is_cancelled(&self) -> bool;
}

impl<F> CancelProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Probe backed by a shared flag (e.g. set from a Ctrl-C handler)
#[derive(Debug, Clone, Default)]
pub struct FlagProbe(Arc<AtomicBool>);

impl FlagProbe {
    /// Raise the flag
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl CancelProbe for FlagProbe {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Running counts reported while walking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalProgress {
    /// Entries accepted into the match set
    pub matched: usize,

    /// Entries recorded as denied
    pub denied: usize,

    /// Directories listed so far
    pub dirs_listed: u64,
}

/// Receives progress updates after each entry decision and each directory
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: TraversalProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(TraversalProgress) + Send + Sync,
{
    fn on_progress(&self, progress: TraversalProgress) {
        self(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_closure_probe() {
        let probe = || true;
        assert!(probe.is_cancelled());
    }

    #[test]
    fn test_flag_probe() {
        let probe = FlagProbe::default();
        assert!(!probe.is_cancelled());
        probe.cancel();
        assert!(probe.is_cancelled());
        assert!(probe.clone().is_cancelled());
    }

    #[test]
    fn test_closure_progress_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: TraversalProgress| seen.lock().push(p.matched);
        sink.on_progress(TraversalProgress { matched: 2, ..Default::default() });
        sink.on_progress(TraversalProgress { matched: 5, ..Default::default() });
        assert_eq!(*seen.lock(), vec![2, 5]);
    }
}
