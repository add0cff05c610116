//! Graph backend using the `similar` crate's Myers diff over raw bytes
//!
//! Myers finds a shortest insert/delete script in `O((N+M)D)` time without
//! filling the whole lattice, so it is a drop-in alternative when inputs
//! are mostly similar. It does not consider serialized size.

use super::{Graph, check_capacity};
use crate::{Error, Op, Result};
use similar::{Algorithm, DiffTag, capture_diff_slices};

/// Graph backed by [`similar::capture_diff_slices`]
pub struct MyersGraph {
    capacity: usize,
    script: Option<Vec<Op>>,
}

impl MyersGraph {
    /// Create a graph accepting comparisons of up to `capacity` lattice cells
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            script: None,
        }
    }
}

fn push_merged(ops: &mut Vec<Op>, op: Op) {
    match ops.pop() {
        Some(last) => match last.merge(op) {
            Ok(merged) => ops.push(merged),
            Err((last, op)) => {
                ops.push(last);
                ops.push(op);
            }
        },
        None => ops.push(op),
    }
}

impl Graph for MyersGraph {
    fn compute(&mut self, orig: &[u8], target: &[u8]) -> Result<()> {
        check_capacity(orig.len(), target.len(), self.capacity)?;

        let mut ops = Vec::new();
        for change in capture_diff_slices(Algorithm::Myers, orig, target) {
            let (tag, old, new) = change.as_tag_tuple();
            match tag {
                DiffTag::Equal => push_merged(&mut ops, Op::copy(old.len())),
                DiffTag::Delete => push_merged(&mut ops, Op::delete_with(orig[old].to_vec())),
                DiffTag::Insert => push_merged(&mut ops, Op::insert(target[new].to_vec())),
                DiffTag::Replace => {
                    push_merged(&mut ops, Op::delete_with(orig[old].to_vec()));
                    push_merged(&mut ops, Op::insert(target[new].to_vec()));
                }
            }
        }

        self.script = Some(ops);
        Ok(())
    }

    fn script_reversed(&self) -> Result<Vec<Op>> {
        let script = self
            .script
            .as_ref()
            .ok_or_else(|| Error::IllegalState("script requested before compute".to_string()))?;
        Ok(script.iter().rev().cloned().collect())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::capacity_for_chunk;
    use crate::op::replay;

    #[test]
    fn test_simple_change() {
        let mut graph = MyersGraph::new(capacity_for_chunk(16));
        graph.compute(b"hello world", b"hello universe").unwrap();
        let script = graph.script().unwrap();
        assert_eq!(replay(&script, b"hello world").unwrap(), b"hello universe");
        assert_eq!(script.first(), Some(&Op::copy(6)));
    }

    #[test]
    fn test_no_changes() {
        let mut graph = MyersGraph::new(capacity_for_chunk(16));
        graph.compute(b"hello world", b"hello world").unwrap();
        assert_eq!(graph.script_reversed().unwrap(), vec![Op::copy(11)]);
    }

    #[test]
    fn test_adjacent_runs_are_merged() {
        let mut graph = MyersGraph::new(capacity_for_chunk(16));
        graph.compute(b"abc", b"xyz").unwrap();
        let script = graph.script().unwrap();
        for pair in script.windows(2) {
            assert_ne!(pair[0].kind(), pair[1].kind());
        }
        assert_eq!(replay(&script, b"abc").unwrap(), b"xyz");
    }
}
