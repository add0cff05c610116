//! Cost-aware ("inertial") graph
//!
//! Prices a path by the bytes its ops take once serialized rather than by
//! its step count. Every op costs an opcode byte plus a run-length byte, and
//! an INSERT additionally carries one byte per inserted byte:
//!
//! ```text
//!            to: STOP DELETE INSERT COPY
//! from STOP        0     2      3     2
//! from DELETE      0     0      3     2
//! from INSERT      0     2      1     2
//! from COPY        0     2      3     0
//! ```
//!
//! Continuing a run is cheap and switching kinds is not, so the resulting
//! scripts may cover more bytes than an [`EditGraph`](super::EditGraph)
//! script while encoding smaller. For `"Hello world!"` to
//! `"Hellish cruel world!"` this graph yields a four-op script such as
//! `>4-1+9>7`, where the edit graph fragments the change into short runs.
//!
//! Three arrival costs are kept per cell: the cheapest path reaching the
//! cell whose last op is a DELETE, an INSERT or a COPY. Ties prefer DELETE,
//! then INSERT, then COPY, both when filling the table and when walking it.

use super::{Graph, RunBuilder, check_capacity};
use crate::{Error, Op, OpKind, Result};

/// Transition costs indexed by `[from.index()][to.index()]`
pub type TransitionCosts = [[u32; 4]; 4];

/// Costs derived from the reference encoding
pub const DEFAULT_TRANSITION_COSTS: TransitionCosts = [
    [0, 2, 3, 2], // from STOP
    [0, 0, 3, 2], // from DELETE
    [0, 2, 1, 2], // from INSERT
    [0, 2, 3, 0], // from COPY
];

const UNREACHABLE: u32 = u32::MAX;

/// Arriving kinds in tie-break order
const ARRIVALS: [OpKind; 3] = [OpKind::Delete, OpKind::Insert, OpKind::Copy];

fn slot(kind: OpKind) -> usize {
    kind.index() - 1
}

/// Graph minimizing the serialized size of the script
pub struct InertialGraph {
    transitions: TransitionCosts,
    /// Arrival costs per cell, indexed by [`slot`]
    costs: Vec<[u32; 3]>,
    xval: Vec<u8>,
    yval: Vec<u8>,
    computed: bool,
}

impl InertialGraph {
    /// Create a graph able to hold `capacity` lattice cells
    pub fn new(capacity: usize) -> Self {
        Self::with_transition_costs(capacity, DEFAULT_TRANSITION_COSTS)
    }

    /// Create a graph with a custom transition cost table
    pub fn with_transition_costs(capacity: usize, transitions: TransitionCosts) -> Self {
        Self {
            transitions,
            costs: vec![[UNREACHABLE; 3]; capacity],
            xval: Vec::new(),
            yval: Vec::new(),
            computed: false,
        }
    }

    /// Transition table in use
    pub fn transition_costs(&self) -> &TransitionCosts {
        &self.transitions
    }

    /// Cheapest way to leave `pos` with an op of kind `next`
    ///
    /// Returns the total cost and the kind of the op that arrived at `pos`.
    fn leave(&self, pos: usize, next: OpKind) -> (u32, OpKind) {
        if pos == 0 {
            return (self.transitions[OpKind::Stop.index()][next.index()], OpKind::Stop);
        }
        let mut best = (UNREACHABLE, OpKind::Stop);
        for kind in ARRIVALS {
            let cost = self.costs[pos][slot(kind)]
                .saturating_add(self.transitions[kind.index()][next.index()]);
            if cost < best.0 {
                best = (cost, kind);
            }
        }
        best
    }

    /// Total serialized cost of the computed script
    pub fn cost(&self) -> Result<u32> {
        if !self.computed {
            return Err(Error::IllegalState("cost requested before compute".to_string()));
        }
        let end = self.xval.len() * self.yval.len() - 1;
        Ok(self.leave(end, OpKind::Stop).0)
    }
}

impl Graph for InertialGraph {
    fn compute(&mut self, orig: &[u8], target: &[u8]) -> Result<()> {
        check_capacity(orig.len(), target.len(), self.capacity())?;

        self.xval.clear();
        self.xval.push(0);
        self.xval.extend_from_slice(orig);
        self.yval.clear();
        self.yval.push(0);
        self.yval.extend_from_slice(target);

        let width = self.xval.len();
        self.costs[0] = [UNREACHABLE; 3];
        for y in 0..self.yval.len() {
            for x in 0..width {
                let pos = x + y * width;
                if pos == 0 {
                    continue;
                }

                let mut arrive = [UNREACHABLE; 3];
                if x > 0 {
                    arrive[slot(OpKind::Delete)] = self.leave(pos - 1, OpKind::Delete).0;
                }
                if y > 0 {
                    arrive[slot(OpKind::Insert)] = self.leave(pos - width, OpKind::Insert).0;
                }
                if x > 0 && y > 0 && self.xval[x] == self.yval[y] {
                    arrive[slot(OpKind::Copy)] = self.leave(pos - width - 1, OpKind::Copy).0;
                }
                self.costs[pos] = arrive;
            }
        }

        self.computed = true;
        Ok(())
    }

    fn script_reversed(&self) -> Result<Vec<Op>> {
        if !self.computed {
            return Err(Error::IllegalState("script requested before compute".to_string()));
        }

        let width = self.xval.len();
        let mut runs = RunBuilder::new();
        let mut pos = width * self.yval.len() - 1;
        if pos == 0 {
            return Ok(runs.finish());
        }

        let mut kind = self.leave(pos, OpKind::Stop).1;
        loop {
            let prev = match kind {
                OpKind::Delete => {
                    runs.step(OpKind::Delete, Some(self.xval[pos % width]));
                    pos - 1
                }
                OpKind::Insert => {
                    runs.step(OpKind::Insert, Some(self.yval[pos / width]));
                    pos - width
                }
                OpKind::Copy => {
                    runs.copy_run(1);
                    pos - width - 1
                }
                OpKind::Stop => break,
            };
            if prev == 0 {
                break;
            }
            kind = self.leave(prev, kind).1;
            pos = prev;
        }
        Ok(runs.finish())
    }

    fn capacity(&self) -> usize {
        self.costs.len()
    }
}
