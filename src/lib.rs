//! sftp-walker - Parallel SFTP Directory Walker
//!
//! Enumerates the entries under a remote directory over SFTP, keeps the
//! files whose names fully match a pattern, and optionally streams them to
//! local storage.
//!
//! # Features
//!
//! - **Parallel Listing**: A pool of up to 32 worker threads, each with its
//!   own SFTP channel on one shared SSH session.
//!
//! - **Work Stealing**: Subdirectories are pushed onto per-worker deques and
//!   stolen by idle workers, so deep or wide trees never block the pool.
//!
//! - **Result Cap**: Matching stops everywhere as soon as the cap is hit.
//!
//! - **Error Policies**: Permission failures are ignored, recorded as
//!   denied, or abort the walk.
//!
//! - **Cooperative Cancellation**: Workers poll a caller-owned probe.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SFTP Server                               │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               │ READDIR / OPEN+READ
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Worker Threads                              │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │Worker 1 │  │Worker 2 │  │Worker 3 │  ...    │Worker N │     │
//! │  │ channel │  │ channel │  │ channel │         │ channel │     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       │            │            │                    │          │
//! │       └────────────┼────────────┼────────────────────┘          │
//! │                    ▼            ▼                               │
//! │            ┌──────────────────────────┐                         │
//! │            │      Coordinator         │                         │
//! │            │  - matches / denied      │                         │
//! │            │  - stop flag, cap        │                         │
//! │            └──────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                 listing / JSON lines / local files
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sftp_walker::remote::{Credentials, SftpSessionBuilder, SftpTarget};
//! use sftp_walker::walker::{traverse, ErrorPolicy, TraversalOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SftpSessionBuilder::new(
//!     SftpTarget::new("server", 22),
//!     Credentials::password("me", "secret"),
//! )
//! .connect()?;
//!
//! let options = TraversalOptions::builder(r".*\.csv")
//!     .max_matches(100)
//!     .error_policy(ErrorPolicy::Warn)
//!     .build()?;
//!
//! let outcome = traverse(&session, "/data", &options)?;
//! for entry in &outcome.matches {
//!     println!("{}", entry.path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod progress;
pub mod remote;
pub mod report;
pub mod walker;

pub use config::{CliArgs, Mode, WalkConfig};
pub use download::{download_entries, DownloadOutcome, DownloadSink, LocalDirSink};
pub use error::{ConfigError, RemoteError, Result, WalkError};
pub use remote::{DirectoryEntry, EntryType, RemoteChannel, RemoteSession};
pub use report::{preview, Preview, PREVIEW_LIMIT};
pub use walker::{
    traverse, CancelProbe, ErrorPolicy, ProgressSink, TraversalOptions, TraversalOutcome,
    TraversalStats,
};
