//! Traversal options and validation

use crate::download::DownloadSink;
use crate::error::ConfigError;
use crate::walker::hooks::{CancelProbe, ProgressSink};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Maximum number of worker threads
pub const MAX_WORKERS: usize = 32;

/// Default number of worker threads
pub const DEFAULT_WORKERS: usize = 32;

/// Pattern that matches every name
pub const MATCH_ALL: &str = "^.*$";

/// What to do when a directory listing or a transfer is denied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Skip silently
    Ignore,
    /// Skip, log a warning and record the entry as denied
    Warn,
    /// Fail the whole walk
    #[default]
    Abort,
}

impl FromStr for ErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(ErrorPolicy::Ignore),
            "warning" | "warn" => Ok(ErrorPolicy::Warn),
            "error" | "abort" => Ok(ErrorPolicy::Abort),
            other => Err(ConfigError::InvalidErrorPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorPolicy::Ignore => "ignore",
            ErrorPolicy::Warn => "warning",
            ErrorPolicy::Abort => "error",
        })
    }
}

/// Validated options for one walk
///
/// Build with [`TraversalOptions::builder`].
#[derive(Clone)]
pub struct TraversalOptions {
    pub(crate) pattern: Regex,
    pub(crate) pattern_source: String,
    pub(crate) recurse: bool,
    pub(crate) max_matches: Option<usize>,
    pub(crate) workers: usize,
    pub(crate) error_policy: ErrorPolicy,
    pub(crate) download: Option<Arc<dyn DownloadSink>>,
    pub(crate) cancel: Option<Arc<dyn CancelProbe>>,
    pub(crate) progress: Option<Arc<dyn ProgressSink>>,
}

impl fmt::Debug for TraversalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraversalOptions")
            .field("pattern", &self.pattern_source)
            .field("recurse", &self.recurse)
            .field("max_matches", &self.max_matches)
            .field("workers", &self.workers)
            .field("error_policy", &self.error_policy)
            .field("download", &self.download.is_some())
            .field("cancel", &self.cancel.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl TraversalOptions {
    /// Start building options for `pattern`
    pub fn builder(pattern: impl Into<String>) -> TraversalOptionsBuilder {
        TraversalOptionsBuilder::new(pattern)
    }

    /// Check whether `name` fully matches the pattern
    pub fn matches_name(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    /// The pattern as given by the caller
    pub fn pattern(&self) -> &str {
        &self.pattern_source
    }

    pub fn recurse(&self) -> bool {
        self.recurse
    }

    /// Match cap, `None` when unlimited
    pub fn max_matches(&self) -> Option<usize> {
        self.max_matches
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Whether matched entries are downloaded inline
    pub fn downloads(&self) -> bool {
        self.download.is_some()
    }

    /// Attach a download sink to already validated options
    pub fn with_download_sink(mut self, sink: impl DownloadSink + 'static) -> Self {
        self.download = Some(Arc::new(sink));
        self
    }

    pub fn with_cancel_probe(mut self, probe: impl CancelProbe + 'static) -> Self {
        self.cancel = Some(Arc::new(probe));
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|probe| probe.is_cancelled())
    }
}

/// Builder for [`TraversalOptions`]
pub struct TraversalOptionsBuilder {
    pattern: String,
    recurse: bool,
    max_matches: i64,
    workers: usize,
    error_policy: ErrorPolicy,
    download: Option<Arc<dyn DownloadSink>>,
    cancel: Option<Arc<dyn CancelProbe>>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl TraversalOptionsBuilder {
    /// Create a builder with defaults: recursive, unlimited, 32 workers, abort on denial
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            recurse: true,
            max_matches: -1,
            workers: DEFAULT_WORKERS,
            error_policy: ErrorPolicy::default(),
            download: None,
            cancel: None,
            progress: None,
        }
    }

    /// Descend into subdirectories
    pub fn recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    /// Cap the number of matches (-1 for unlimited)
    pub fn max_matches(mut self, max: i64) -> Self {
        self.max_matches = max;
        self
    }

    /// Set the number of worker threads
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Download every accepted entry into `sink`
    pub fn download_sink(mut self, sink: impl DownloadSink + 'static) -> Self {
        self.download = Some(Arc::new(sink));
        self
    }

    pub fn cancel_probe(mut self, probe: impl CancelProbe + 'static) -> Self {
        self.cancel = Some(Arc::new(probe));
        self
    }

    pub fn progress_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<TraversalOptions, ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.workers,
                max: MAX_WORKERS,
            });
        }

        let max_matches = match self.max_matches {
            -1 => None,
            n if n >= 0 => Some(n as usize),
            n => return Err(ConfigError::InvalidMaxMatches(n)),
        };

        let pattern = compile_full_match(&self.pattern)?;

        Ok(TraversalOptions {
            pattern,
            pattern_source: self.pattern,
            recurse: self.recurse,
            max_matches,
            workers: self.workers,
            error_policy: self.error_policy,
            download: self.download,
            cancel: self.cancel,
            progress: self.progress,
        })
    }
}

/// Compile `pattern` so it only matches whole names
pub fn compile_full_match(pattern: &str) -> Result<Regex, ConfigError> {
    // Validate the pattern on its own first so errors point at the user's text
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = TraversalOptions::builder(MATCH_ALL).build().unwrap();
        assert!(opts.recurse());
        assert_eq!(opts.max_matches(), None);
        assert_eq!(opts.workers(), DEFAULT_WORKERS);
        assert_eq!(opts.error_policy(), ErrorPolicy::Abort);
        assert!(!opts.downloads());
        assert!(!opts.is_cancelled());
    }

    #[test]
    fn test_worker_bounds() {
        assert!(TraversalOptions::builder(MATCH_ALL).workers(1).build().is_ok());
        assert!(TraversalOptions::builder(MATCH_ALL).workers(32).build().is_ok());
        assert!(matches!(
            TraversalOptions::builder(MATCH_ALL).workers(0).build(),
            Err(ConfigError::InvalidWorkerCount { count: 0, .. })
        ));
        assert!(matches!(
            TraversalOptions::builder(MATCH_ALL).workers(33).build(),
            Err(ConfigError::InvalidWorkerCount { count: 33, max: 32 })
        ));
    }

    #[test]
    fn test_max_matches() {
        let opts = TraversalOptions::builder(MATCH_ALL).max_matches(0).build().unwrap();
        assert_eq!(opts.max_matches(), Some(0));
        assert!(matches!(
            TraversalOptions::builder(MATCH_ALL).max_matches(-2).build(),
            Err(ConfigError::InvalidMaxMatches(-2))
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            TraversalOptions::builder("[unclosed").build(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_full_match_only() {
        let opts = TraversalOptions::builder(r"\w+\.txt").build().unwrap();
        assert!(opts.matches_name("notes.txt"));
        assert!(!opts.matches_name("notes.txt.bak"));
        assert!(!opts.matches_name("old notes.txt"));

        // Alternation must not escape the anchors
        let opts = TraversalOptions::builder("a|b").build().unwrap();
        assert!(opts.matches_name("a"));
        assert!(!opts.matches_name("ab"));
    }

    #[test]
    fn test_error_policy_parsing() {
        assert_eq!("ignore".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Ignore);
        assert_eq!("warning".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Warn);
        assert_eq!("WARN".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Warn);
        assert_eq!("error".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Abort);
        assert!("explode".parse::<ErrorPolicy>().is_err());
        assert_eq!(ErrorPolicy::Warn.to_string(), "warning");
    }

    #[test]
    fn test_cancel_probe_is_consulted() {
        let opts = TraversalOptions::builder(MATCH_ALL)
            .cancel_probe(|| true)
            .build()
            .unwrap();
        assert!(opts.is_cancelled());
    }
}
