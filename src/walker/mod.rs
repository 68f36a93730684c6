//! Parallel remote walker
//!
//! This module implements the traversal engine: a pool of worker threads
//! that list remote directories, offer matching entries to a shared
//! coordinator, and hand subdirectories to each other through a
//! work-stealing queue.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │       Coordinator       │
//!                     │  - match / denied sets  │
//!                     │  - stop flag + failure  │
//!                     └───────────┬─────────────┘
//!                                 │
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │  channel  │             │  channel  │             │  channel  │
//! │  deque    │◄── steal ──►│  deque    │◄── steal ──►│  deque    │
//! └───────────┘             └───────────┘             └───────────┘
//! ```

pub mod coordinator;
pub mod hooks;
pub mod options;
pub mod queue;
pub mod traversal;

pub use coordinator::{Accepted, Coordinator};
pub use hooks::{CancelProbe, FlagProbe, ProgressSink, TraversalProgress};
pub use options::{
    ErrorPolicy, TraversalOptions, TraversalOptionsBuilder, DEFAULT_WORKERS, MATCH_ALL,
    MAX_WORKERS,
};
pub use traversal::{traverse, TraversalOutcome, TraversalStats};
