//! # badiff
//!
//! Byte-level diff and patch engine. A diff is a stream of [`Op`]s (copy,
//! delete and insert runs) that turns one byte sequence into another when
//! replayed against it.
//!
//! Diffs are produced lazily by stacking queue transformers: the inputs are
//! compared as one big replacement, chunked into bounded pairs, each pair is
//! graphed into a minimal script (on a worker pool when configured) and the
//! result is coalesced.
//!
//! ## Core Components
//!
//! - [`Op`] - One edit run
//! - [`graph`] - Dynamic-programming edit graphs
//! - [`queue`] - Lazy op streams and their transformers
//! - [`pipeline`] - Queue stacks assembled from stage codes
//! - [`codec`] - Reference binary encoding
//! - [`Differ`] / [`DiffEngine`] - Configured front end over encoded diffs
//! - [`DiffConfig`] - Configuration options
//!
//! ## Example Usage
//!
//! ```rust
//! let orig = b"Hello world!";
//! let target = b"Hellish cruel world!";
//!
//! let mut queue = badiff::diff(&orig[..], &target[..]).unwrap();
//! let mut out = Vec::new();
//! badiff::apply(&mut queue, &mut &orig[..], &mut out).unwrap();
//! assert_eq!(out, target);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

pub mod codec;
pub mod engine;
pub mod graph;
pub mod op;
pub mod pipeline;
pub mod queue;

pub use engine::{DiffEngine, Differ, DifferBuilder};
pub use graph::{Graph, GraphKind};
pub use op::{Op, OpKind};
pub use pipeline::{Pipeline, Stage};
pub use queue::{OpQueue, UndoQueue};

/// Configuration for diffing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Largest run, per side, graphed as one pair
    pub chunk_size: usize,
    /// Worker threads for parallel graphing
    pub workers: usize,
    /// Graph implementation
    pub graph: GraphKind,
    /// Graph pairs on a worker pool
    pub parallel: bool,
    /// Keep delete payloads so diffs can be undone
    pub keep_undo: bool,
    /// Cancel out delete/insert pairs that restore the same bytes
    pub compact: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            chunk_size: queue::DEFAULT_CHUNK,
            workers: num_cpus::get(),
            graph: GraphKind::Inertial,
            parallel: true,
            keep_undo: true,
            compact: false,
        }
    }
}

impl DiffConfig {
    /// Parse from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings can build a pipeline
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Main badiff errors
#[derive(Debug, Error)]
pub enum Error {
    /// Comparison too large for a graph
    #[error("Graph capacity exceeded: {required} cells (capacity: {capacity})")]
    CapacityExceeded {
        /// Cells the comparison needs
        required: usize,
        /// Cells the graph holds
        capacity: usize,
    },

    /// Operation called in the wrong state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Operation not supported by this queue
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Undo reached a delete that did not keep its bytes
    #[error("Cannot undo a DELETE of {run} bytes without payload")]
    MissingDeletePayload {
        /// Run of the offending delete
        run: usize,
    },

    /// Op construction invariant violated
    #[error("Invalid op: {0}")]
    InvalidOp(String),

    /// Character that is not a pipeline stage code
    #[error("Unknown pipeline stage: {0:?}")]
    UnknownStage(char),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Graph worker failed or panicked
    #[error("Graph worker failed: {0}")]
    Worker(String),

    /// Work was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// Malformed encoded diff
    #[error("Invalid diff format: {0}")]
    InvalidFormat(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for badiff operations
pub type Result<T> = std::result::Result<T, Error>;

/// Op stream turning `orig` into `target`, with [`DiffConfig::default`]
///
/// # Errors
/// Fails if the worker pool cannot be started.
pub fn diff(orig: impl Into<Bytes>, target: impl Into<Bytes>) -> Result<Box<dyn OpQueue>> {
    Differ::new(DiffConfig::default())?.diff(orig, target)
}

/// Replay `queue`, reading `orig` and writing `target`
pub fn apply(queue: &mut dyn OpQueue, orig: &mut dyn Read, target: &mut dyn Write) -> Result<()> {
    queue.apply(orig, target)
}

/// Replay `queue` backwards, reading `target` and writing `orig`
///
/// # Errors
/// [`Error::MissingDeletePayload`] if `queue` was computed one-way.
pub fn undo(queue: impl OpQueue, target: &mut dyn Read, orig: &mut dyn Write) -> Result<()> {
    UndoQueue::new(queue).apply(target, orig)
}
