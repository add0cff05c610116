//! Naive edit-distance graph
//!
//! Every step across the lattice costs one, so the cheapest path is the one
//! with the fewest ops: a classical insert/delete/copy alignment without a
//! substitution edge. Ties prefer DELETE, then INSERT, then COPY.

use super::{Graph, RunBuilder, check_capacity};
use crate::{Error, Op, OpKind, Result};

/// Graph minimizing the number of single-byte steps
pub struct EditGraph {
    /// Kind of the cheapest step arriving at each cell
    flags: Vec<OpKind>,
    /// Path length to each cell
    lengths: Vec<u32>,
    xval: Vec<u8>,
    yval: Vec<u8>,
    computed: bool,
}

impl EditGraph {
    /// Create a graph able to hold `capacity` lattice cells
    pub fn new(capacity: usize) -> Self {
        Self {
            flags: vec![OpKind::Stop; capacity],
            lengths: vec![0; capacity],
            xval: Vec::new(),
            yval: Vec::new(),
            computed: false,
        }
    }
}

impl Graph for EditGraph {
    fn compute(&mut self, orig: &[u8], target: &[u8]) -> Result<()> {
        check_capacity(orig.len(), target.len(), self.capacity())?;

        self.xval.clear();
        self.xval.push(0);
        self.xval.extend_from_slice(orig);
        self.yval.clear();
        self.yval.push(0);
        self.yval.extend_from_slice(target);

        let width = self.xval.len();
        for y in 0..self.yval.len() {
            for x in 0..width {
                let pos = x + y * width;
                if x == 0 && y == 0 {
                    self.flags[pos] = OpKind::Stop;
                    self.lengths[pos] = 0;
                    continue;
                }

                let mut flag = OpKind::Stop;
                let mut len = u32::MAX;
                if x > 0 {
                    flag = OpKind::Delete;
                    len = self.lengths[pos - 1] + 1;
                }
                if y > 0 && self.lengths[pos - width] + 1 < len {
                    flag = OpKind::Insert;
                    len = self.lengths[pos - width] + 1;
                }
                if x > 0
                    && y > 0
                    && self.xval[x] == self.yval[y]
                    && self.lengths[pos - width - 1] + 1 < len
                {
                    flag = OpKind::Copy;
                    len = self.lengths[pos - width - 1] + 1;
                }
                self.flags[pos] = flag;
                self.lengths[pos] = len;
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
        while pos > 0 {
            match self.flags[pos] {
                OpKind::Delete => {
                    runs.step(OpKind::Delete, Some(self.xval[pos % width]));
                    pos -= 1;
                }
                OpKind::Insert => {
                    runs.step(OpKind::Insert, Some(self.yval[pos / width]));
                    pos -= width;
                }
                OpKind::Copy => {
                    runs.copy_run(1);
                    pos -= width + 1;
                }
                OpKind::Stop => break,
            }
        }
        Ok(runs.finish())
    }

    fn capacity(&self) -> usize {
        self.flags.len()
    }
}
