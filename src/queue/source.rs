//! Queues that originate ops rather than transform them

use super::{Buffers, DEFAULT_CHUNK, OpQueue};
use crate::{Error, Op, Result};
use bytes::Bytes;
use std::collections::VecDeque;
use std::io::{self, Read};

/// Plain queue: whatever is offered comes back out in order
#[derive(Debug, Default)]
pub struct BufferQueue {
    buffers: Buffers,
}

impl BufferQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }
}

impl OpQueue for BufferQueue {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }
}

/// Read-only queue over a fixed list of ops
#[derive(Debug, Default)]
pub struct ListQueue {
    buffers: Buffers,
}

impl ListQueue {
    /// Create a queue that yields `ops` in order
    pub fn new(ops: impl IntoIterator<Item = Op>) -> Self {
        Self {
            buffers: Buffers {
                ready: VecDeque::new(),
                pending: ops.into_iter().collect(),
            },
        }
    }
}

impl OpQueue for ListQueue {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, _op: Op) -> Result<()> {
        Err(Error::Unsupported("offer on a list-backed queue".to_string()))
    }
}

/// Read-only queue replacing all of `orig` with all of `target`
///
/// Yields `DELETE(orig)` then `INSERT(target)`, omitting an empty side. This
/// is the starting point that chunking and graphing improve on.
#[derive(Debug)]
pub struct ReplaceQueue {
    buffers: Buffers,
}

impl ReplaceQueue {
    /// Create the naive two-op comparison of `orig` and `target`
    pub fn new(orig: impl Into<Bytes>, target: impl Into<Bytes>) -> Self {
        let (orig, target) = (orig.into(), target.into());
        let mut buffers = Buffers::new();
        if !orig.is_empty() {
            buffers.pending.push_back(Op::delete_with(orig));
        }
        if !target.is_empty() {
            buffers.pending.push_back(Op::insert(target));
        }
        Self { buffers }
    }
}

impl OpQueue for ReplaceQueue {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, _op: Op) -> Result<()> {
        Err(Error::Unsupported("offer on a byte comparison queue".to_string()))
    }
}

/// Read-only queue comparing two byte streams one chunk at a time
///
/// Each shift reads up to `chunk` bytes from each stream and yields a
/// `DELETE`/`INSERT` pair for them, so arbitrarily large inputs never have to
/// be held in memory at once.
pub struct StreamChunkingQueue<O, T> {
    buffers: Buffers,
    orig: O,
    target: T,
    chunk: usize,
    exhausted: bool,
}

impl<O: Read + Send, T: Read + Send> StreamChunkingQueue<O, T> {
    /// Compare `orig` and `target` in chunks of [`DEFAULT_CHUNK`] bytes
    pub fn new(orig: O, target: T) -> Self {
        Self::with_chunk(orig, target, DEFAULT_CHUNK)
    }

    /// Compare `orig` and `target` in chunks of `chunk` bytes
    pub fn with_chunk(orig: O, target: T, chunk: usize) -> Self {
        Self {
            buffers: Buffers::new(),
            orig,
            target,
            chunk: chunk.max(1),
            exhausted: false,
        }
    }
}

/// Read until `buf` is full or the stream ends
fn read_chunk(input: &mut dyn Read, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len);
    input.take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

impl<O: Read + Send, T: Read + Send> OpQueue for StreamChunkingQueue<O, T> {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, _op: Op) -> Result<()> {
        Err(Error::Unsupported("offer on a stream comparison queue".to_string()))
    }

    fn shift(&mut self) -> Result<()> {
        while self.buffers.pending.is_empty() && !self.exhausted {
            let orig = read_chunk(&mut self.orig, self.chunk)?;
            let target = read_chunk(&mut self.target, self.chunk)?;
            if orig.is_empty() && target.is_empty() {
                self.exhausted = true;
                break;
            }
            if !orig.is_empty() {
                self.buffers.pending.push_back(Op::delete_with(orig));
            }
            if !target.is_empty() {
                self.buffers.pending.push_back(Op::insert(target));
            }
        }
        self.buffers.shift_ready();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_queue_round_trip() {
        let mut q = BufferQueue::new();
        q.offer(Op::insert(&b"x"[..])).unwrap();
        assert_eq!(q.poll().unwrap(), Some(Op::insert(&b"x"[..])));
        assert_eq!(q.poll().unwrap(), None);
    }

    #[test]
    fn test_list_queue_is_read_only() {
        let mut q = ListQueue::new(vec![Op::copy(1)]);
        assert!(matches!(q.offer(Op::copy(2)), Err(Error::Unsupported(_))));
        assert_eq!(q.drain_vec().unwrap(), vec![Op::copy(1)]);
    }

    #[test]
    fn test_replace_queue() {
        let mut q = ReplaceQueue::new(&b"old"[..], &b"new!"[..]);
        assert_eq!(
            q.drain_vec().unwrap(),
            vec![Op::delete_with(&b"old"[..]), Op::insert(&b"new!"[..])]
        );
        assert!(matches!(q.offer(Op::copy(1)), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_replace_queue_omits_empty_sides() {
        assert_eq!(
            ReplaceQueue::new(Bytes::new(), &b"abc"[..]).drain_vec().unwrap(),
            vec![Op::insert(&b"abc"[..])]
        );
        assert_eq!(
            ReplaceQueue::new(&b"abc"[..], Bytes::new()).drain_vec().unwrap(),
            vec![Op::delete_with(&b"abc"[..])]
        );
        assert!(ReplaceQueue::new(Bytes::new(), Bytes::new()).drain_vec().unwrap().is_empty());
    }

    #[test]
    fn test_stream_chunking_uneven_streams() {
        let orig: &[u8] = b"abcdefg";
        let target: &[u8] = b"xyz";
        let mut q = StreamChunkingQueue::with_chunk(orig, target, 3);
        assert_eq!(
            q.drain_vec().unwrap(),
            vec![
                Op::delete_with(&b"abc"[..]),
                Op::insert(&b"xyz"[..]),
                Op::delete_with(&b"def"[..]),
                Op::delete_with(&b"g"[..]),
            ]
        );
    }

    #[test]
    fn test_stream_chunking_surfaces_io_errors() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk on fire"))
            }
        }

        let mut q = StreamChunkingQueue::new(Failing, &b"abc"[..]);
        assert!(matches!(q.poll(), Err(Error::Io(_))));
    }
}
