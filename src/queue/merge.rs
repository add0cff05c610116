//! Coalescing and compacting

use super::{Buffers, OpQueue, pull_pending, require_pending};
use crate::{Op, OpKind, Result};

/// Merges adjacent ops of the same kind
///
/// Only the two most recently pending ops are ever compared.
pub struct CoalescingQueue<Q> {
    buffers: Buffers,
    source: Q,
}

impl<Q: OpQueue> CoalescingQueue<Q> {
    /// Coalesce `source`
    pub fn new(source: Q) -> Self {
        Self {
            buffers: Buffers::new(),
            source,
        }
    }
}

impl<Q: OpQueue> OpQueue for CoalescingQueue<Q> {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, op: Op) -> Result<()> {
        self.source.offer(op)
    }

    fn shift(&mut self) -> Result<()> {
        if !require_pending(&mut self.source, &mut self.buffers, 1)? {
            return Ok(());
        }
        while require_pending(&mut self.source, &mut self.buffers, 2)? {
            let (Some(next), Some(prev)) =
                (self.buffers.pending.pop_back(), self.buffers.pending.pop_back())
            else {
                break;
            };
            match prev.merge(next) {
                Ok(merged) => self.buffers.pending.push_back(merged),
                Err((prev, next)) => {
                    self.buffers.ready.push_back(prev);
                    self.buffers.pending.push_back(next);
                    return Ok(());
                }
            }
        }
        self.buffers.flush_pending();
        Ok(())
    }
}

/// Ops held back before the oldest can no longer change
const COMPACT_WINDOW: usize = 4;

/// Reduce two adjacent ops to one if they can be expressed as a single op
fn combine(a: Op, b: Op) -> std::result::Result<Op, (Op, Op)> {
    if a.kind() == b.kind() {
        return a.merge(b);
    }
    let cancels = matches!(
        (a.kind(), b.kind()),
        (OpKind::Delete, OpKind::Insert) | (OpKind::Insert, OpKind::Delete)
    ) && a.payload().is_some()
        && a.payload() == b.payload();
    if cancels {
        return Ok(Op::copy(a.run()));
    }
    Err((a, b))
}

/// Coalesces, and replaces no-op delete/insert pairs with copies
///
/// Deleting bytes and inserting those same bytes back has no effect, so
/// such pairs become a `COPY` that may in turn merge with its neighbours.
/// Compacting an already compacted stream returns it unchanged.
pub struct CompactingQueue<Q> {
    buffers: Buffers,
    source: Q,
}

impl<Q: OpQueue> CompactingQueue<Q> {
    /// Compact `source`
    pub fn new(source: Q) -> Self {
        Self {
            buffers: Buffers::new(),
            source,
        }
    }

    fn reduce(&mut self) {
        let pending = &mut self.buffers.pending;
        while pending.len() >= 2 {
            let (Some(b), Some(a)) = (pending.pop_back(), pending.pop_back()) else {
                break;
            };
            match combine(a, b) {
                Ok(op) => pending.push_back(op),
                Err((a, b)) => {
                    pending.push_back(a);
                    pending.push_back(b);
                    break;
                }
            }
        }
    }
}

impl<Q: OpQueue> OpQueue for CompactingQueue<Q> {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, op: Op) -> Result<()> {
        self.source.offer(op)
    }

    fn shift(&mut self) -> Result<()> {
        loop {
            if self.buffers.pending.len() > COMPACT_WINDOW {
                self.buffers.shift_ready();
                return Ok(());
            }
            if !pull_pending(&mut self.source, &mut self.buffers)? {
                self.buffers.flush_pending();
                return Ok(());
            }
            self.reduce();
        }
    }
}
