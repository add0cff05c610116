//! Edit graphs
//!
//! A [`Graph`] computes an edit script between two byte buffers by finding a
//! cheapest path across the `(len(orig)+1) x (len(target)+1)` lattice, where
//! a horizontal step deletes a byte, a vertical step inserts one and a
//! diagonal step copies a matching byte. Implementations differ only in how
//! a path is priced.
//!
//! Graphs own fixed-size buffers chosen at construction and are meant to be
//! reused across many comparisons.

use crate::{Error, Op, OpKind, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub mod edit;
pub mod inertial;
pub mod similar;

pub use edit::EditGraph;
pub use inertial::InertialGraph;
pub use self::similar::MyersGraph;

/// Trait for diff graphs that compute an edit script between two buffers
pub trait Graph: Send {
    /// Compute the graph for `orig` and `target`
    ///
    /// # Errors
    /// Returns [`Error::CapacityExceeded`] if `(len(orig)+1) * (len(target)+1)`
    /// exceeds [`Graph::capacity`]. State from any previous call is left
    /// untouched in that case.
    fn compute(&mut self, orig: &[u8], target: &[u8]) -> Result<()>;

    /// Ops of the most recently computed script, last op first
    ///
    /// # Errors
    /// Returns [`Error::IllegalState`] if [`Graph::compute`] has never succeeded.
    fn script_reversed(&self) -> Result<Vec<Op>>;

    /// Number of lattice cells this graph can hold
    fn capacity(&self) -> usize;

    /// Ops of the most recently computed script in forward order
    fn script(&self) -> Result<Vec<Op>> {
        let mut ops = self.script_reversed()?;
        ops.reverse();
        Ok(ops)
    }
}

/// Available graph implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraphKind {
    /// Naive edit distance, minimizing the number of steps
    Edit,
    /// Cost-aware graph, minimizing serialized bytes
    #[default]
    Inertial,
    /// Myers diff from the `similar` crate
    Myers,
}

impl GraphKind {
    /// Allocate a graph of this kind able to hold `capacity` cells
    pub fn new_graph(self, capacity: usize) -> Box<dyn Graph> {
        match self {
            Self::Edit => Box::new(EditGraph::new(capacity)),
            Self::Inertial => Box::new(InertialGraph::new(capacity)),
            Self::Myers => Box::new(MyersGraph::new(capacity)),
        }
    }

    /// Allocate a graph sized for chunks of at most `chunk` bytes per side
    pub fn for_chunk(self, chunk: usize) -> Box<dyn Graph> {
        self.new_graph(capacity_for_chunk(chunk))
    }

    /// Parse from a configuration string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "edit" => Some(Self::Edit),
            "inertial" => Some(Self::Inertial),
            "myers" => Some(Self::Myers),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Inertial => "inertial",
            Self::Myers => "myers",
        }
    }
}

/// Cells needed to compare two buffers of up to `chunk` bytes each
pub fn capacity_for_chunk(chunk: usize) -> usize {
    (chunk + 1) * (chunk + 1)
}

/// Fail unless a `(orig, target)` comparison fits in `capacity` cells
pub(crate) fn check_capacity(orig: usize, target: usize, capacity: usize) -> Result<usize> {
    let required = (orig + 1)
        .checked_mul(target + 1)
        .ok_or(Error::CapacityExceeded {
            required: usize::MAX,
            capacity,
        })?;
    if required > capacity {
        return Err(Error::CapacityExceeded { required, capacity });
    }
    Ok(required)
}

/// Accumulates single-step moves from a backward walk into maximal runs
pub(crate) struct RunBuilder {
    ops: Vec<Op>,
    kind: OpKind,
    run: usize,
    data: Vec<u8>,
}

impl RunBuilder {
    pub(crate) fn new() -> Self {
        Self {
            ops: Vec::new(),
            kind: OpKind::Stop,
            run: 0,
            data: Vec::new(),
        }
    }

    /// Record one step of `kind`; `byte` is the deleted or inserted byte
    pub(crate) fn step(&mut self, kind: OpKind, byte: Option<u8>) {
        if kind != self.kind {
            self.flush();
            self.kind = kind;
        }
        self.run += 1;
        if let Some(b) = byte {
            self.data.push(b);
        }
    }

    /// Record `run` copied bytes at once
    pub(crate) fn copy_run(&mut self, run: usize) {
        if self.kind != OpKind::Copy {
            self.flush();
            self.kind = OpKind::Copy;
        }
        self.run += run;
    }

    fn flush(&mut self) {
        if self.run == 0 {
            return;
        }
        // walked backward, so payload bytes are reversed
        self.data.reverse();
        let data = Bytes::from(std::mem::take(&mut self.data));
        let op = match self.kind {
            OpKind::Delete => Op::delete_with(data),
            OpKind::Insert => Op::insert(data),
            _ => Op::copy(self.run),
        };
        self.ops.push(op);
        self.run = 0;
    }

    /// Finish and return the ops in walk (reversed) order
    pub(crate) fn finish(mut self) -> Vec<Op> {
        self.flush();
        self.ops
    }
}
