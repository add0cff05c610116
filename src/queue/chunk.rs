//! Chunking and unchunking
//!
//! Graphing a `DELETE`/`INSERT` pair costs `O(n * m)` memory, so large pairs
//! are first cut into bounded pairs:
//!
//! ```text
//! -10 +8   --chunk(4)-->   -4 +4 -4 +4 -2
//! ```
//!
//! [`UnchunkingQueue`] undoes this by gathering every run of interleaved
//! deletes and inserts back into at most one of each.

use super::{Buffers, DEFAULT_CHUNK, OpQueue, require_pending};
use crate::{Op, OpKind, Result};

/// Cut `op` into pieces of at most `chunk` bytes
fn split(op: Op, chunk: usize) -> Vec<Op> {
    if op.run() <= chunk || op.kind() == OpKind::Copy {
        return vec![op];
    }
    let kind = op.kind();
    let run = op.run();
    match op.into_payload() {
        Some(data) => (0..run)
            .step_by(chunk)
            .map(|start| {
                let piece = data.slice(start..(start + chunk).min(run));
                match kind {
                    OpKind::Insert => Op::insert(piece),
                    _ => Op::delete_with(piece),
                }
            })
            .collect(),
        None => (0..run)
            .step_by(chunk)
            .map(|start| Op::delete((run - start).min(chunk)))
            .collect(),
    }
}

fn is_replacement(a: &Op, b: &Op) -> bool {
    matches!(
        (a.kind(), b.kind()),
        (OpKind::Delete, OpKind::Insert) | (OpKind::Insert, OpKind::Delete)
    )
}

/// Splits delete/insert runs into bounded, interleaved pairs
pub struct ChunkingQueue<Q> {
    buffers: Buffers,
    source: Q,
    chunk: usize,
}

impl<Q: OpQueue> ChunkingQueue<Q> {
    /// Chunk `source` with [`DEFAULT_CHUNK`]
    pub fn new(source: Q) -> Self {
        Self::with_chunk(source, DEFAULT_CHUNK)
    }

    /// Chunk `source` into pieces of at most `chunk` bytes
    pub fn with_chunk(source: Q, chunk: usize) -> Self {
        Self {
            buffers: Buffers::new(),
            source,
            chunk: chunk.max(1),
        }
    }

    /// Chunk size in bytes
    pub fn chunk(&self) -> usize {
        self.chunk
    }
}

impl<Q: OpQueue> OpQueue for ChunkingQueue<Q> {
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
        let first = match self.buffers.pending.pop_front() {
            Some(op) => op,
            None => return Ok(()),
        };
        if first.kind() == OpKind::Copy {
            self.buffers.ready.push_back(first);
            return Ok(());
        }

        require_pending(&mut self.source, &mut self.buffers, 1)?;
        let paired = self
            .buffers
            .pending
            .front()
            .is_some_and(|next| is_replacement(&first, next));
        if !paired {
            self.buffers.ready.extend(split(first, self.chunk));
            return Ok(());
        }

        let second = self.buffers.pending.pop_front();
        let mut lead = split(first, self.chunk).into_iter();
        let mut follow = second
            .map(|op| split(op, self.chunk))
            .unwrap_or_default()
            .into_iter();
        loop {
            match (lead.next(), follow.next()) {
                (None, None) => break,
                (a, b) => self.buffers.ready.extend(a.into_iter().chain(b)),
            }
        }
        Ok(())
    }
}

/// Merges interleaved delete/insert regions and adjacent copies
pub struct UnchunkingQueue<Q> {
    buffers: Buffers,
    source: Q,
}

impl<Q: OpQueue> UnchunkingQueue<Q> {
    /// Unchunk `source`
    pub fn new(source: Q) -> Self {
        Self {
            buffers: Buffers::new(),
            source,
        }
    }

    fn next_is(&mut self, accept: impl Fn(OpKind) -> bool) -> Result<bool> {
        Ok(require_pending(&mut self.source, &mut self.buffers, 1)?
            && self.buffers.pending.front().is_some_and(|op| accept(op.kind())))
    }
}

fn absorb(slot: &mut Option<Op>, op: Op) {
    *slot = Some(match slot.take() {
        Some(acc) => match acc.merge(op) {
            Ok(merged) => merged,
            Err((acc, _)) => acc,
        },
        None => op,
    });
}

impl<Q: OpQueue> OpQueue for UnchunkingQueue<Q> {
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
        let first = match self.buffers.pending.pop_front() {
            Some(op) => op,
            None => return Ok(()),
        };

        if first.kind() == OpKind::Copy {
            let mut run = first;
            while self.next_is(|kind| kind == OpKind::Copy)? {
                if let Some(next) = self.buffers.pending.pop_front() {
                    run = run.merge(next).unwrap_or_else(|(run, _)| run);
                }
            }
            self.buffers.ready.push_back(run);
            return Ok(());
        }

        let lead = first.kind();
        let (mut deletes, mut inserts) = (None, None);
        let mut take = |op: Op| match op.kind() {
            OpKind::Delete => absorb(&mut deletes, op),
            _ => absorb(&mut inserts, op),
        };
        take(first);
        while self.next_is(|kind| matches!(kind, OpKind::Delete | OpKind::Insert))? {
            if let Some(next) = self.buffers.pending.pop_front() {
                take(next);
            }
        }

        let (a, b) = if lead == OpKind::Delete {
            (deletes, inserts)
        } else {
            (inserts, deletes)
        };
        self.buffers.ready.extend(a.into_iter().chain(b));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{CoalescingQueue, ListQueue};

    #[test]
    fn test_chunking_interleaves_pairs() {
        let source = ListQueue::new(vec![
            Op::delete_with(&b"0123456789"[..]),
            Op::insert(&b"abcdefgh"[..]),
        ]);
        let ops = ChunkingQueue::with_chunk(source, 4).drain_vec().unwrap();
        assert_eq!(
            ops,
            vec![
                Op::delete_with(&b"0123"[..]),
                Op::insert(&b"abcd"[..]),
                Op::delete_with(&b"4567"[..]),
                Op::insert(&b"efgh"[..]),
                Op::delete_with(&b"89"[..]),
            ]
        );
    }

    #[test]
    fn test_chunking_keeps_pair_order() {
        let source = ListQueue::new(vec![Op::insert(&b"abcde"[..]), Op::delete(3)]);
        let ops = ChunkingQueue::with_chunk(source, 2).drain_vec().unwrap();
        assert_eq!(
            ops,
            vec![
                Op::insert(&b"ab"[..]),
                Op::delete(2),
                Op::insert(&b"cd"[..]),
                Op::delete(1),
                Op::insert(&b"e"[..]),
            ]
        );
    }

    #[test]
    fn test_chunking_passes_copies_through() {
        let source = ListQueue::new(vec![Op::copy(100), Op::insert(&b"xyz"[..])]);
        let ops = ChunkingQueue::with_chunk(source, 2).drain_vec().unwrap();
        assert_eq!(
            ops,
            vec![Op::copy(100), Op::insert(&b"xy"[..]), Op::insert(&b"z"[..])]
        );
    }

    #[test]
    fn test_unchunk_restores_chunked_stream() {
        let original = vec![
            Op::copy(3),
            Op::delete_with(&b"0123456789"[..]),
            Op::insert(&b"abcdefgh"[..]),
            Op::copy(2),
            Op::insert(&b"tail"[..]),
        ];
        let chunked = ChunkingQueue::with_chunk(ListQueue::new(original.clone()), 3);
        let unchunked = UnchunkingQueue::new(chunked).drain_vec().unwrap();
        let coalesced = CoalescingQueue::new(ListQueue::new(original))
            .drain_vec()
            .unwrap();
        assert_eq!(unchunked, coalesced);
    }

    #[test]
    fn test_unchunk_follows_first_seen_kind() {
        let source = ListQueue::new(vec![
            Op::insert(&b"ab"[..]),
            Op::delete(1),
            Op::insert(&b"c"[..]),
            Op::delete(2),
            Op::copy(1),
            Op::copy(1),
        ]);
        let ops = UnchunkingQueue::new(source).drain_vec().unwrap();
        assert_eq!(
            ops,
            vec![Op::insert(&b"abc"[..]), Op::delete(3), Op::copy(2)]
        );
    }
}
