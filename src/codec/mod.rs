//! Reference binary encoding of op scripts
//!
//! Wire Format:
//! ```text
//! +-----------+-----------------+-----------------+
//! | Opcode(1B)| Run(LEB128)     | Payload(run B)? |
//! +-----------+-----------------+-----------------+
//! ...
//! +-----------+
//! | 0x00      |   end of script
//! +-----------+
//! ```
//!
//! Runs below 128 take a single byte, so an op costs 2 bytes plus its
//! payload. This is the size model the inertial graph prices paths with.
//!
//! # Example
//! ```
//! use badiff::codec::{decode, encode};
//! use badiff::{Op, OpKind};
//! use bytes::Bytes;
//!
//! let ops = vec![
//!     Op::new(OpKind::Copy, 4, None).unwrap(),
//!     Op::new(OpKind::Delete, 1, None).unwrap(),
//!     Op::new(OpKind::Insert, 9, Some(Bytes::from_static(b"ish cruel"))).unwrap(),
//!     Op::new(OpKind::Copy, 7, None).unwrap(),
//! ];
//! let encoded = encode(&ops);
//! assert_eq!(encoded.len(), 2 + 2 + (2 + 9) + 2 + 1);
//! assert_eq!(decode(&encoded).unwrap(), ops);
//! ```

use crate::queue::{Buffers, OpQueue};
use crate::{Error, Op, OpKind, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub mod wire;

pub use wire::Opcode;

/// Longest LEB128 encoding of a `u64`
const MAX_VARINT_LEN: usize = 10;

fn opcode_of(op: &Op) -> Opcode {
    match (op.kind(), op.has_payload()) {
        (OpKind::Copy, _) => Opcode::Copy,
        (OpKind::Insert, _) => Opcode::Insert,
        (OpKind::Delete, true) => Opcode::DeleteWithPayload,
        (OpKind::Delete, false) => Opcode::Delete,
        (OpKind::Stop, _) => Opcode::Stop,
    }
}

fn put_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

fn get_varint(cursor: &mut Bytes) -> Result<u64> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        if !cursor.has_remaining() {
            return Err(Error::InvalidFormat("truncated run length".to_string()));
        }
        let byte = cursor.get_u8();
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Error::InvalidFormat("run length overflows 64 bits".to_string()))
}

/// Append the encoding of one op, without the end marker
pub fn encode_op(op: &Op, buf: &mut BytesMut) {
    buf.put_u8(opcode_of(op).as_u8());
    put_varint(buf, op.run() as u64);
    if let Some(data) = op.payload() {
        buf.put_slice(data);
    }
}

/// Encoded size of one op
pub fn op_len(op: &Op) -> usize {
    1 + varint_len(op.run() as u64) + op.payload().map_or(0, Bytes::len)
}

/// Encode a complete script, end marker included
pub fn encode(ops: &[Op]) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(ops));
    for op in ops {
        encode_op(op, &mut buf);
    }
    buf.put_u8(Opcode::Stop.as_u8());
    buf.freeze()
}

/// Drain `queue` and encode everything it yields
pub fn encode_queue(queue: &mut dyn OpQueue) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(op) = queue.poll()? {
        encode_op(&op, &mut buf);
    }
    buf.put_u8(Opcode::Stop.as_u8());
    Ok(buf.freeze())
}

/// Size of [`encode`]'s output for `ops`
pub fn encoded_len(ops: &[Op]) -> usize {
    ops.iter().map(op_len).sum::<usize>() + 1
}

/// Decode the next op, or `None` at the end marker
fn decode_next(cursor: &mut Bytes) -> Result<Option<Op>> {
    if !cursor.has_remaining() {
        return Err(Error::InvalidFormat("missing end marker".to_string()));
    }
    let byte = cursor.get_u8();
    let opcode = Opcode::from_u8(byte)
        .ok_or_else(|| Error::InvalidFormat(format!("Unknown opcode: 0x{byte:02x}")))?;
    if !opcode.requires_run() {
        return Ok(None);
    }

    let run = usize::try_from(get_varint(cursor)?)
        .map_err(|_| Error::InvalidFormat("run length too large".to_string()))?;
    if run == 0 {
        return Err(Error::InvalidFormat(format!("{opcode:?} with zero run")));
    }
    let payload = if opcode.requires_data() {
        if cursor.remaining() < run {
            return Err(Error::InvalidFormat(format!(
                "{opcode:?} needs {run} payload bytes, {} left",
                cursor.remaining()
            )));
        }
        Some(cursor.split_to(run))
    } else {
        None
    };

    let op = match opcode {
        Opcode::Copy => Op::copy(run),
        Opcode::Delete => Op::delete(run),
        Opcode::Insert | Opcode::DeleteWithPayload => {
            let kind = if opcode == Opcode::Insert {
                OpKind::Insert
            } else {
                OpKind::Delete
            };
            Op::new(kind, run, payload)?
        }
        Opcode::Stop => return Ok(None),
    };
    Ok(Some(op))
}

/// Decode a complete script
///
/// # Errors
/// [`Error::InvalidFormat`] for unknown opcodes, truncated input, zero runs,
/// a missing end marker or bytes after it.
pub fn decode(data: &[u8]) -> Result<Vec<Op>> {
    DecodingQueue::new(Bytes::copy_from_slice(data)).drain_vec()
}

/// Read-only queue decoding an encoded script one op at a time
///
/// Payloads are zero-copy slices of the encoded buffer.
pub struct DecodingQueue {
    buffers: Buffers,
    cursor: Bytes,
    finished: bool,
    failed: bool,
}

impl DecodingQueue {
    /// Decode `data` lazily
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            buffers: Buffers::new(),
            cursor: data.into(),
            finished: false,
            failed: false,
        }
    }
}

impl OpQueue for DecodingQueue {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, _op: Op) -> Result<()> {
        Err(Error::Unsupported("offer on an encoded script".to_string()))
    }

    fn shift(&mut self) -> Result<()> {
        if self.failed {
            return Err(Error::IllegalState(
                "encoded script already failed to decode".to_string(),
            ));
        }
        if self.finished {
            return Ok(());
        }
        let next = decode_next(&mut self.cursor).and_then(|op| match op {
            None if self.cursor.has_remaining() => Err(Error::InvalidFormat(format!(
                "{} bytes after end marker",
                self.cursor.remaining()
            ))),
            op => Ok(op),
        });
        match next {
            Ok(Some(op)) => self.buffers.ready.push_back(op),
            Ok(None) => self.finished = true,
            Err(err) => {
                // the cursor may stop inside an op
                self.failed = true;
                return Err(err);
            }
        }
        Ok(())
    }
}
