//! Per-op rewrites: undo, rewind and one-way

use super::{Buffers, OpQueue};
use crate::{Error, Op, OpKind, Result};
use std::io::{self, Read};

/// Turns a forward script into one that maps target back to original
///
/// Every `DELETE` must carry its payload; a payload-less delete fails with
/// [`Error::MissingDeletePayload`] when it is reached.
pub struct UndoQueue<Q> {
    buffers: Buffers,
    source: Q,
}

impl<Q: OpQueue> UndoQueue<Q> {
    /// Invert `source`
    pub fn new(source: Q) -> Self {
        Self {
            buffers: Buffers::new(),
            source,
        }
    }
}

/// Inverse of a single op
pub(crate) fn undo_op(op: Op) -> Result<Op> {
    match op.kind() {
        OpKind::Delete => {
            let run = op.run();
            op.into_payload()
                .map(Op::insert)
                .ok_or(Error::MissingDeletePayload { run })
        }
        OpKind::Insert => match op.into_payload() {
            Some(data) => Ok(Op::delete_with(data)),
            None => Err(Error::InvalidOp("INSERT without payload".to_string())),
        },
        _ => Ok(op),
    }
}

impl<Q: OpQueue> OpQueue for UndoQueue<Q> {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, op: Op) -> Result<()> {
        self.source.offer(op)
    }

    fn shift(&mut self) -> Result<()> {
        if let Some(op) = self.source.poll()? {
            self.buffers.ready.push_back(undo_op(op)?);
        }
        Ok(())
    }
}

/// Inverts a script by replaying it against the original bytes
///
/// Deleted bytes are read back from `orig`, so unlike [`UndoQueue`] this
/// works on one-way scripts. `orig` must be positioned at the start of the
/// bytes the script was computed against.
pub struct RewindingQueue<Q, R> {
    buffers: Buffers,
    source: Q,
    orig: R,
}

impl<Q: OpQueue, R: Read + Send> RewindingQueue<Q, R> {
    /// Rewind `source` using `orig` to recover deleted bytes
    pub fn new(source: Q, orig: R) -> Self {
        Self {
            buffers: Buffers::new(),
            source,
            orig,
        }
    }

    fn rewind(&mut self, op: Op) -> Result<Op> {
        match op.kind() {
            OpKind::Copy => {
                let skipped = io::copy(&mut (&mut self.orig).take(op.run() as u64), &mut io::sink())?;
                if skipped != op.run() as u64 {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("original ended after {skipped} of {} bytes", op.run()),
                    )));
                }
                Ok(op)
            }
            OpKind::Delete => {
                let mut data = vec![0; op.run()];
                self.orig.read_exact(&mut data)?;
                Ok(Op::insert(data))
            }
            _ => undo_op(op),
        }
    }
}

impl<Q: OpQueue, R: Read + Send> OpQueue for RewindingQueue<Q, R> {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, op: Op) -> Result<()> {
        self.source.offer(op)
    }

    fn shift(&mut self) -> Result<()> {
        if let Some(op) = self.source.poll()? {
            let op = self.rewind(op)?;
            self.buffers.ready.push_back(op);
        }
        Ok(())
    }
}

/// Drops `DELETE` payloads, leaving a smaller script that cannot be undone
pub struct OneWayQueue<Q> {
    buffers: Buffers,
    source: Q,
}

impl<Q: OpQueue> OneWayQueue<Q> {
    /// Strip delete payloads from `source`
    pub fn new(source: Q) -> Self {
        Self {
            buffers: Buffers::new(),
            source,
        }
    }
}

impl<Q: OpQueue> OpQueue for OneWayQueue<Q> {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, op: Op) -> Result<()> {
        self.source.offer(op)
    }

    fn shift(&mut self) -> Result<()> {
        if let Some(op) = self.source.poll()? {
            let op = match op.kind() {
                OpKind::Delete => op.without_payload(),
                _ => op,
            };
            self.buffers.ready.push_back(op);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::replay;
    use crate::queue::ListQueue;

    fn forward() -> Vec<Op> {
        vec![
            Op::copy(4),
            Op::delete_with(&b"o"[..]),
            Op::insert(&b"ish cruel"[..]),
            Op::copy(7),
        ]
    }

    #[test]
    fn test_undo_swaps_deletes_and_inserts() {
        let undone = UndoQueue::new(ListQueue::new(forward())).drain_vec().unwrap();
        assert_eq!(
            undone,
            vec![
                Op::copy(4),
                Op::insert(&b"o"[..]),
                Op::delete_with(&b"ish cruel"[..]),
                Op::copy(7),
            ]
        );
        assert_eq!(replay(&undone, b"Hellish cruel world!").unwrap(), b"Hello world!");
    }

    #[test]
    fn test_undo_requires_delete_payload() {
        let mut q = UndoQueue::new(ListQueue::new(vec![Op::copy(1), Op::delete(3)]));
        assert_eq!(q.poll().unwrap(), Some(Op::copy(1)));
        assert!(matches!(q.poll(), Err(Error::MissingDeletePayload { run: 3 })));
    }

    #[test]
    fn test_undo_twice_is_identity() {
        let twice = UndoQueue::new(UndoQueue::new(ListQueue::new(forward())))
            .drain_vec()
            .unwrap();
        assert_eq!(twice, forward());
    }

    #[test]
    fn test_rewind_recovers_deleted_bytes() {
        let one_way = OneWayQueue::new(ListQueue::new(forward()));
        let orig: &[u8] = b"Hello world!";
        let rewound = RewindingQueue::new(one_way, orig).drain_vec().unwrap();
        assert_eq!(rewound[1], Op::insert(&b"o"[..]));
        assert_eq!(replay(&rewound, b"Hellish cruel world!").unwrap(), b"Hello world!");
    }

    #[test]
    fn test_rewind_short_original() {
        let orig: &[u8] = b"Hel";
        let mut q = RewindingQueue::new(ListQueue::new(forward()), orig);
        assert!(matches!(q.poll(), Err(Error::Io(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_one_way_strips_delete_payloads() {
        let ops = OneWayQueue::new(ListQueue::new(forward())).drain_vec().unwrap();
        assert_eq!(ops[1], Op::delete(1));
        assert!(ops[2].has_payload());
        assert_eq!(replay(&ops, b"Hello world!").unwrap(), b"Hellish cruel world!");
    }
}
