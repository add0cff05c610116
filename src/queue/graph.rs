//! Serial graphing of delete/insert pairs

use super::{Buffers, DEFAULT_CHUNK, OpQueue, require_pending};
use crate::graph::{Graph, GraphKind};
use crate::{Op, OpKind, Result};
use bytes::Bytes;
use tracing::trace;

/// Delete and insert payloads of a graphable pair, in `(orig, target)` order
///
/// A pair is graphable when it is a `DELETE` carrying its payload next to an
/// `INSERT`, in either order.
pub(crate) fn graphable<'a>(a: &'a Op, b: &'a Op) -> Option<(&'a Bytes, &'a Bytes)> {
    let (delete, insert) = match (a.kind(), b.kind()) {
        (OpKind::Delete, OpKind::Insert) => (a, b),
        (OpKind::Insert, OpKind::Delete) => (b, a),
        _ => return None,
    };
    Some((delete.payload()?, insert.payload()?))
}

/// Run one pair through `graph`, returning the script in forward order
pub(crate) fn graph_pair(graph: &mut dyn Graph, orig: &[u8], target: &[u8]) -> Result<Vec<Op>> {
    graph.compute(orig, target)?;
    let mut script = graph.script_reversed()?;
    script.reverse();
    metrics::counter!("badiff_graph_computations_total").increment(1);
    metrics::counter!("badiff_graph_cells_total")
        .increment(((orig.len() + 1) * (target.len() + 1)) as u64);
    trace!(
        orig = orig.len(),
        target = target.len(),
        ops = script.len(),
        "graphed pair"
    );
    Ok(script)
}

/// Replaces each delete/insert pair with a minimal edit script
///
/// Pairs must fit the graph's capacity; put a [`ChunkingQueue`](super::ChunkingQueue)
/// upstream when they might not. Ops outside a graphable pair pass through.
pub struct GraphQueue<Q> {
    buffers: Buffers,
    source: Q,
    graph: Box<dyn Graph>,
}

impl<Q: OpQueue> GraphQueue<Q> {
    /// Graph `source` with an already allocated graph
    pub fn new(source: Q, graph: Box<dyn Graph>) -> Self {
        Self {
            buffers: Buffers::new(),
            source,
            graph,
        }
    }

    /// Graph `source` with a new graph of `kind` sized for `chunk` bytes per side
    pub fn with_chunk(source: Q, chunk: usize, kind: GraphKind) -> Self {
        Self::new(source, kind.for_chunk(chunk))
    }

    /// Graph `source` with the default graph and chunk size
    pub fn with_defaults(source: Q) -> Self {
        Self::with_chunk(source, DEFAULT_CHUNK, GraphKind::default())
    }
}

impl<Q: OpQueue> OpQueue for GraphQueue<Q> {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, op: Op) -> Result<()> {
        self.source.offer(op)
    }

    fn shift(&mut self) -> Result<()> {
        if !require_pending(&mut self.source, &mut self.buffers, 2)? {
            self.buffers.flush_pending();
            return Ok(());
        }
        let pending = &self.buffers.pending;
        let script = match graphable(&pending[0], &pending[1]) {
            Some((orig, target)) => graph_pair(self.graph.as_mut(), orig, target)?,
            None => {
                self.buffers.shift_ready();
                return Ok(());
            }
        };
        self.buffers.pending.drain(..2);
        self.buffers.ready.extend(script);
        Ok(())
    }
}
