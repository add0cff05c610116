//! Eager buffering

use super::{Buffers, OpQueue};
use crate::{Op, Result};

/// Drains its source completely on first use and can replay the result
///
/// Useful in front of a stage that must see the whole script, or to apply
/// the same script more than once without recomputing it.
pub struct PumpingQueue<Q> {
    buffers: Buffers,
    source: Q,
    ops: Vec<Op>,
    cursor: usize,
    pumped: bool,
}

impl<Q: OpQueue> PumpingQueue<Q> {
    /// Buffer `source`
    pub fn new(source: Q) -> Self {
        Self {
            buffers: Buffers::new(),
            source,
            ops: Vec::new(),
            cursor: 0,
            pumped: false,
        }
    }

    fn pump(&mut self) -> Result<()> {
        if !self.pumped {
            self.source.drain_all(&mut self.ops)?;
            self.pumped = true;
        }
        Ok(())
    }

    /// Every op drained from the source, pumping it first if needed
    pub fn ops(&mut self) -> Result<&[Op]> {
        self.pump()?;
        Ok(&self.ops)
    }

    /// Restart emission from the first buffered op
    pub fn replay(&mut self) {
        self.buffers.ready.clear();
        self.cursor = 0;
    }
}

impl<Q: OpQueue> OpQueue for PumpingQueue<Q> {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, op: Op) -> Result<()> {
        // the source is never drained again once pumped
        if self.pumped {
            self.ops.push(op);
            return Ok(());
        }
        self.source.offer(op)
    }

    fn shift(&mut self) -> Result<()> {
        self.pump()?;
        if let Some(op) = self.ops.get(self.cursor) {
            self.buffers.ready.push_back(op.clone());
            self.cursor += 1;
        }
        Ok(())
    }
}
