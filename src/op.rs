//! Edit operations
//!
//! An [`Op`] is one run of a single edit kind. Replaying a script of ops
//! against an original byte stream produces the target:
//!
//! ```text
//! COPY(n)      read n bytes from orig, write them to target
//! DELETE(n)    read n bytes from orig, discard them
//! INSERT(n, p) write p to target, orig untouched
//! ```

use crate::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

/// Kind of edit an [`Op`] performs
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    /// Sentinel marking the start or end of a script
    Stop = 0,
    /// Skip bytes of the original
    Delete = 1,
    /// Emit new bytes
    Insert = 2,
    /// Retain bytes of the original
    Copy = 3,
}

impl OpKind {
    /// Index of this kind into transition tables
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The kind with the opposite effect under undo
    pub fn inverse(self) -> Self {
        match self {
            Self::Delete => Self::Insert,
            Self::Insert => Self::Delete,
            other => other,
        }
    }

    /// Single character used by [`Op`]'s `Display`
    pub fn symbol(self) -> char {
        match self {
            Self::Stop => ';',
            Self::Delete => '-',
            Self::Insert => '+',
            Self::Copy => '>',
        }
    }
}

/// One edit action with its run length and optional payload
///
/// Built with [`Op::new`], which enforces a positive run and a payload
/// matching the kind. Deserialization goes through the same checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "OpFields")]
pub struct Op {
    kind: OpKind,
    run: usize,
    payload: Option<Bytes>,
}

#[derive(Deserialize)]
struct OpFields {
    kind: OpKind,
    run: usize,
    payload: Option<Bytes>,
}

impl TryFrom<OpFields> for Op {
    type Error = Error;

    fn try_from(fields: OpFields) -> Result<Self> {
        Op::new(fields.kind, fields.run, fields.payload)
    }
}

impl Op {
    /// Validating constructor
    ///
    /// # Errors
    /// Returns [`Error::InvalidOp`] for `Stop`, a zero run, a payload whose
    /// length differs from `run`, an insert without payload or a copy with one.
    pub fn new(kind: OpKind, run: usize, payload: Option<Bytes>) -> Result<Self> {
        if kind == OpKind::Stop {
            return Err(Error::InvalidOp("STOP is a sentinel".to_string()));
        }
        if run == 0 {
            return Err(Error::InvalidOp(format!("{kind:?} with zero run")));
        }
        match (&payload, kind) {
            (None, OpKind::Insert) => {
                return Err(Error::InvalidOp("INSERT requires a payload".to_string()));
            }
            (Some(_), OpKind::Copy) => {
                return Err(Error::InvalidOp("COPY cannot carry a payload".to_string()));
            }
            (Some(data), _) if data.len() != run => {
                return Err(Error::InvalidOp(format!(
                    "{kind:?} payload of {} bytes for run {run}",
                    data.len()
                )));
            }
            _ => {}
        }
        Ok(Self { kind, run, payload })
    }

    /// Retain `run` bytes
    pub(crate) fn copy(run: usize) -> Self {
        debug_assert!(run > 0);
        Self {
            kind: OpKind::Copy,
            run,
            payload: None,
        }
    }

    /// Skip `run` bytes without remembering them
    pub(crate) fn delete(run: usize) -> Self {
        debug_assert!(run > 0);
        Self {
            kind: OpKind::Delete,
            run,
            payload: None,
        }
    }

    /// Skip the bytes in `data`, remembering them for undo
    pub(crate) fn delete_with(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        debug_assert!(!data.is_empty());
        Self {
            kind: OpKind::Delete,
            run: data.len(),
            payload: Some(data),
        }
    }

    /// Emit the bytes in `data`
    pub(crate) fn insert(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        debug_assert!(!data.is_empty());
        Self {
            kind: OpKind::Insert,
            run: data.len(),
            payload: Some(data),
        }
    }

    /// Edit kind
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Number of bytes covered
    pub fn run(&self) -> usize {
        self.run
    }

    /// Payload bytes, if any
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Consume the op, returning its payload
    pub fn into_payload(self) -> Option<Bytes> {
        self.payload
    }

    /// `true` for a delete that remembers its bytes or any insert
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Copy of this op with any payload dropped, used for one-way deletes
    pub fn without_payload(&self) -> Self {
        match self.kind {
            OpKind::Delete => Self::delete(self.run),
            _ => self.clone(),
        }
    }

    /// Merge `next` into this op if both have the same kind
    ///
    /// Payloads are concatenated. A merged delete keeps its payload only if
    /// both halves carried one. Returns `next` back when kinds differ.
    pub fn merge(self, next: Op) -> std::result::Result<Op, (Op, Op)> {
        if self.kind != next.kind {
            return Err((self, next));
        }
        let run = self.run + next.run;
        let payload = match (self.payload, next.payload) {
            (Some(a), Some(b)) => {
                let mut joined = Vec::with_capacity(run);
                joined.extend_from_slice(&a);
                joined.extend_from_slice(&b);
                Some(Bytes::from(joined))
            }
            _ => None,
        };
        Ok(Op {
            kind: self.kind,
            run,
            payload,
        })
    }

    /// Replay this op, reading from `orig` and writing to `target`
    pub fn apply(&self, orig: &mut dyn Read, target: &mut dyn Write) -> Result<()> {
        match self.kind {
            OpKind::Copy => {
                let copied = io::copy(&mut (&mut *orig).take(self.run as u64), target)?;
                expect_run(copied, self.run)
            }
            OpKind::Delete => {
                let skipped = io::copy(&mut (&mut *orig).take(self.run as u64), &mut io::sink())?;
                expect_run(skipped, self.run)
            }
            OpKind::Insert => {
                let data = self
                    .payload
                    .as_ref()
                    .ok_or_else(|| Error::InvalidOp("INSERT without payload".to_string()))?;
                target.write_all(data)?;
                Ok(())
            }
            OpKind::Stop => Ok(()),
        }
    }
}

fn expect_run(actual: u64, run: usize) -> Result<()> {
    if actual != run as u64 {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("original ended after {actual} of {run} bytes"),
        )));
    }
    Ok(())
}

impl std::fmt::Display for Op {
    /// Compact notation, e.g. `>4-1+9>7`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.kind.symbol(), self.run)
    }
}

/// Sum of runs, handy when comparing scripts
pub fn total_run(ops: &[Op]) -> usize {
    ops.iter().map(Op::run).sum()
}

/// Replay `ops` against an in-memory original
pub fn replay(ops: &[Op], orig: &[u8]) -> Result<Vec<u8>> {
    let mut input = orig;
    let mut out = Vec::with_capacity(orig.len());
    for op in ops {
        op.apply(&mut input, &mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_ops() {
        assert!(matches!(
            Op::new(OpKind::Stop, 1, None),
            Err(Error::InvalidOp(_))
        ));
        assert!(matches!(
            Op::new(OpKind::Copy, 0, None),
            Err(Error::InvalidOp(_))
        ));
        assert!(matches!(
            Op::new(OpKind::Insert, 3, None),
            Err(Error::InvalidOp(_))
        ));
        assert!(matches!(
            Op::new(OpKind::Insert, 3, Some(Bytes::from_static(b"ab"))),
            Err(Error::InvalidOp(_))
        ));
        assert!(matches!(
            Op::new(OpKind::Copy, 2, Some(Bytes::from_static(b"ab"))),
            Err(Error::InvalidOp(_))
        ));
    }

    #[test]
    fn test_zero_runs_rejected() {
        for kind in [OpKind::Copy, OpKind::Delete] {
            assert!(matches!(Op::new(kind, 0, None), Err(Error::InvalidOp(_))));
        }
        for kind in [OpKind::Delete, OpKind::Insert] {
            assert!(matches!(
                Op::new(kind, 0, Some(Bytes::new())),
                Err(Error::InvalidOp(_))
            ));
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let json = serde_json::to_string(&Op::insert(&b"ab"[..])).unwrap();
        assert_eq!(serde_json::from_str::<Op>(&json).unwrap(), Op::insert(&b"ab"[..]));

        let zero = r#"{"kind":"Copy","run":0,"payload":null}"#;
        assert!(serde_json::from_str::<Op>(zero).is_err());
        let stop = r#"{"kind":"Stop","run":1,"payload":null}"#;
        assert!(serde_json::from_str::<Op>(stop).is_err());
    }

    #[test]
    fn test_new_accepts_valid_ops() {
        assert_eq!(Op::new(OpKind::Copy, 4, None).unwrap(), Op::copy(4));
        assert_eq!(Op::new(OpKind::Delete, 2, None).unwrap(), Op::delete(2));
        assert_eq!(
            Op::new(OpKind::Delete, 2, Some(Bytes::from_static(b"xy"))).unwrap(),
            Op::delete_with(&b"xy"[..])
        );
        assert_eq!(
            Op::new(OpKind::Insert, 1, Some(Bytes::from_static(b"z"))).unwrap(),
            Op::insert(&b"z"[..])
        );
    }

    #[test]
    fn test_apply_each_kind() {
        let ops = vec![
            Op::copy(4),
            Op::delete(1),
            Op::insert(&b"ish cruel"[..]),
            Op::copy(7),
        ];
        let out = replay(&ops, b"Hello world!").unwrap();
        assert_eq!(out, b"Hellish cruel world!");
    }

    #[test]
    fn test_apply_past_end_of_original() {
        let err = replay(&[Op::copy(10)], b"short").unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));

        let err = replay(&[Op::delete(6)], b"short").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_merge_same_kind() {
        let merged = Op::insert(&b"ab"[..]).merge(Op::insert(&b"cd"[..])).unwrap();
        assert_eq!(merged, Op::insert(&b"abcd"[..]));

        let merged = Op::delete_with(&b"ab"[..]).merge(Op::delete(2)).unwrap();
        assert_eq!(merged, Op::delete(4));

        let merged = Op::copy(3).merge(Op::copy(5)).unwrap();
        assert_eq!(merged, Op::copy(8));
    }

    #[test]
    fn test_merge_different_kinds_returns_both() {
        let (a, b) = Op::copy(3).merge(Op::delete(1)).unwrap_err();
        assert_eq!(a, Op::copy(3));
        assert_eq!(b, Op::delete(1));
    }

    #[test]
    fn test_display_notation() {
        let ops = [
            Op::copy(4),
            Op::delete(1),
            Op::insert(&b"ish cruel"[..]),
            Op::copy(7),
        ];
        let text: String = ops.iter().map(ToString::to_string).collect();
        assert_eq!(text, ">4-1+9>7");
        assert_eq!(total_run(&ops), 21);
    }

    #[test]
    fn test_kind_inverse() {
        assert_eq!(OpKind::Delete.inverse(), OpKind::Insert);
        assert_eq!(OpKind::Insert.inverse(), OpKind::Delete);
        assert_eq!(OpKind::Copy.inverse(), OpKind::Copy);
    }
}
