//! Operation queues
//!
//! An [`OpQueue`] is a lazy, double-buffered stream of [`Op`]s. Each queue
//! keeps two deques:
//!
//! - `ready`: finalized ops, handed out by [`OpQueue::poll`] as-is
//! - `pending`: buffered ops a transformer may still inspect or merge
//!
//! `poll` drains `ready` and, only once it is empty, calls
//! [`OpQueue::shift`] a single time to refill it. The default shift moves one
//! op from `pending` to `ready`; transformers override it to pull from the
//! queue they wrap instead. Every transformer is itself an `OpQueue`, so
//! pipelines are built by wrapping:
//!
//! ```
//! use badiff::queue::{CoalescingQueue, ListQueue, OpQueue};
//! use badiff::{Op, OpKind};
//!
//! let op = |kind, run| Op::new(kind, run, None).unwrap();
//! let source = ListQueue::new(vec![op(OpKind::Copy, 2), op(OpKind::Copy, 3), op(OpKind::Delete, 1)]);
//! let mut q = CoalescingQueue::new(source);
//! assert_eq!(q.drain_vec().unwrap(), vec![op(OpKind::Copy, 5), op(OpKind::Delete, 1)]);
//! ```

use crate::{Op, Result};
use std::collections::VecDeque;
use std::io::{Read, Write};

pub mod chunk;
pub mod graph;
pub mod invert;
pub mod merge;
pub mod parallel;
pub mod pump;
pub mod source;

pub use chunk::{ChunkingQueue, UnchunkingQueue};
pub use graph::GraphQueue;
pub use invert::{OneWayQueue, RewindingQueue, UndoQueue};
pub use merge::{CoalescingQueue, CompactingQueue};
pub use parallel::{CancelToken, ParallelGraphQueue};
pub use pump::PumpingQueue;
pub use source::{BufferQueue, ListQueue, ReplaceQueue, StreamChunkingQueue};

/// Default bound on the bytes per side of one chunked comparison
pub const DEFAULT_CHUNK: usize = 1024;

/// Ready and pending buffers owned by every queue
#[derive(Debug, Default)]
pub struct Buffers {
    /// Finalized ops, in emission order
    pub ready: VecDeque<Op>,
    /// Ops still open to local transformation
    pub pending: VecDeque<Op>,
}

impl Buffers {
    /// Create empty buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the first pending op to ready, returning whether one moved
    pub fn shift_ready(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(op) => {
                self.ready.push_back(op);
                true
            }
            None => false,
        }
    }

    /// Move every pending op to ready
    pub fn flush_pending(&mut self) {
        self.ready.append(&mut self.pending);
    }

    /// `true` when both buffers are empty
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.pending.is_empty()
    }
}

/// Trait for lazy streams of edit operations
pub trait OpQueue: Send {
    /// Buffers backing this queue
    fn buffers(&mut self) -> &mut Buffers;

    /// Refill `ready`, pulling from `pending` or from a wrapped queue
    ///
    /// Leaving `ready` empty signals exhaustion.
    fn shift(&mut self) -> Result<()> {
        self.buffers().shift_ready();
        Ok(())
    }

    /// Next op in emission order, or `None` once exhausted
    fn poll(&mut self) -> Result<Option<Op>> {
        if let Some(op) = self.buffers().ready.pop_front() {
            return Ok(Some(op));
        }
        self.shift()?;
        Ok(self.buffers().ready.pop_front())
    }

    /// Append `op` to the pending buffer
    ///
    /// # Errors
    /// Read-only queues return [`Error::Unsupported`](crate::Error::Unsupported).
    fn offer(&mut self, op: Op) -> Result<()> {
        self.buffers().pending.push_back(op);
        Ok(())
    }

    /// Poll until exhausted, appending to `into`; returns the number drained
    fn drain_all(&mut self, into: &mut Vec<Op>) -> Result<usize> {
        let start = into.len();
        while let Some(op) = self.poll()? {
            into.push(op);
        }
        Ok(into.len() - start)
    }

    /// Poll until exhausted, collecting into a new vector
    fn drain_vec(&mut self) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        self.drain_all(&mut ops)?;
        Ok(ops)
    }

    /// Replay every remaining op, reading `orig` and writing `target`
    fn apply(&mut self, orig: &mut dyn Read, target: &mut dyn Write) -> Result<()> {
        while let Some(op) = self.poll()? {
            op.apply(orig, target)?;
        }
        Ok(())
    }
}

impl<Q: OpQueue + ?Sized> OpQueue for Box<Q> {
    fn buffers(&mut self) -> &mut Buffers {
        (**self).buffers()
    }

    fn shift(&mut self) -> Result<()> {
        (**self).shift()
    }

    fn poll(&mut self) -> Result<Option<Op>> {
        (**self).poll()
    }

    fn offer(&mut self, op: Op) -> Result<()> {
        (**self).offer(op)
    }

    fn drain_all(&mut self, into: &mut Vec<Op>) -> Result<usize> {
        (**self).drain_all(into)
    }

    fn apply(&mut self, orig: &mut dyn Read, target: &mut dyn Write) -> Result<()> {
        (**self).apply(orig, target)
    }
}

/// Poll `source` once and append the result to `buffers.pending`
pub(crate) fn pull_pending<Q: OpQueue + ?Sized>(
    source: &mut Q,
    buffers: &mut Buffers,
) -> Result<bool> {
    match source.poll()? {
        Some(op) => {
            buffers.pending.push_back(op);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Ensure at least `count` ops are pending, pulling from `source` as needed
pub(crate) fn require_pending<Q: OpQueue + ?Sized>(
    source: &mut Q,
    buffers: &mut Buffers,
    count: usize,
) -> Result<bool> {
    while buffers.pending.len() < count {
        if !pull_pending(source, buffers)? {
            return Ok(false);
        }
    }
    Ok(true)
}
