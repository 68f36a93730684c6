//! Remote access module
//!
//! The walker talks to the remote side through two traits:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   RemoteSession                      │
//! │  - Authenticated, shared read-only by all workers   │
//! │  - Opens one channel per worker                     │
//! └──────────────────────────┬──────────────────────────┘
//!                            │ open_channel()
//!                            ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                   RemoteChannel                      │
//! │  - One per worker thread (not thread-safe)          │
//! │  - list() a directory, get() a file                 │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! [`sftp::SftpSession`] implements them over SSH. With the `test-support`
//! feature, `memory::MemoryTree` implements them over an in-memory tree.

pub mod auth;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod sftp;
pub mod types;

use crate::error::RemoteResult;
use std::io::Write;

pub use auth::{AuthMethod, Credentials};
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryTree;
pub use sftp::{SftpChannel, SftpSession, SftpSessionBuilder, SftpTarget};
pub use types::{join_remote_path, DirectoryEntry, EntryType, Permissions};

/// An authenticated session that hands out per-worker channels
pub trait RemoteSession: Sync {
    /// Channel type handed to a single worker
    type Channel: RemoteChannel;

    /// Open a new channel on this session
    fn open_channel(&self) -> RemoteResult<Self::Channel>;
}

/// A single-owner handle for listing and transferring files
pub trait RemoteChannel {
    /// List the children of `path`, excluding `.` and `..`
    fn list(&mut self, path: &str) -> RemoteResult<Vec<DirectoryEntry>>;

    /// Stream the file at `remote_path` into `sink`, returning bytes copied
    fn get(&mut self, remote_path: &str, sink: &mut dyn Write) -> RemoteResult<u64>;

    /// Close the channel
    fn close(self)
    where
        Self: Sized,
    {
    }
}
