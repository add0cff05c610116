//! Configured diffing front end

use crate::codec::{DecodingQueue, encode_queue};
use crate::graph::GraphKind;
use crate::pipeline::{Pipeline, Stage};
use crate::queue::{OpQueue, ReplaceQueue, StreamChunkingQueue, UndoQueue};
use crate::{DiffConfig, Result};
use bytes::Bytes;
use std::io::Read;
use tracing::debug;

/// Trait for engines that compute and apply encoded diffs
pub trait DiffEngine: Send + Sync {
    /// Compute an encoded diff turning `old` into `new`
    ///
    /// # Errors
    /// Returns [`Error`](crate::Error) if any pipeline stage fails
    fn compute_diff(&self, old: &[u8], new: &[u8]) -> Result<Bytes>;

    /// Apply an encoded diff to `base`
    ///
    /// # Errors
    /// [`Error::InvalidFormat`](crate::Error::InvalidFormat) for a malformed
    /// diff, [`Error::Io`](crate::Error::Io) if `base` is too short
    fn apply_diff(&self, base: &[u8], diff: &[u8]) -> Result<Bytes>;

    /// Reverse an encoded diff, turning its output back into its input
    ///
    /// # Errors
    /// [`Error::MissingDeletePayload`](crate::Error::MissingDeletePayload) if
    /// the diff was computed one-way
    fn undo_diff(&self, current: &[u8], diff: &[u8]) -> Result<Bytes>;
}

fn replay_encoded(queue: &mut dyn OpQueue, mut base: &[u8]) -> Result<Bytes> {
    let mut out = Vec::with_capacity(base.len());
    queue.apply(&mut base, &mut out)?;
    Ok(Bytes::from(out))
}

/// Diff engine running the standard pipeline under a [`DiffConfig`]
#[derive(Debug, Clone, Default)]
pub struct Differ {
    config: DiffConfig,
}

impl Differ {
    /// Create a differ with a validated configuration
    pub fn new(config: DiffConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a new differ builder
    pub fn builder() -> DifferBuilder {
        DifferBuilder::new()
    }

    /// Get configuration
    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Stages applied after the raw comparison
    ///
    /// Chunk, graph (parallel when configured), coalesce, then optionally
    /// compact and strip delete payloads.
    pub fn pipeline(&self) -> Pipeline {
        let mut stages = vec![
            Stage::Chunk,
            if self.config.parallel {
                Stage::ParallelGraph
            } else {
                Stage::Graph
            },
            Stage::Coalesce,
        ];
        if self.config.compact {
            stages.push(Stage::Compact);
        }
        if !self.config.keep_undo {
            stages.push(Stage::OneWay);
        }
        Pipeline::new(stages)
            .with_chunk(self.config.chunk_size)
            .with_graph(self.config.graph)
            .with_workers(self.config.workers)
    }

    /// Op stream turning `orig` into `target`
    pub fn diff(&self, orig: impl Into<Bytes>, target: impl Into<Bytes>) -> Result<Box<dyn OpQueue>> {
        let (orig, target) = (orig.into(), target.into());
        debug!(orig = orig.len(), target = target.len(), "diffing buffers");
        self.pipeline()
            .build(Box::new(ReplaceQueue::new(orig, target)))
    }

    /// Op stream turning the bytes of `orig` into those of `target`
    ///
    /// Inputs are read one chunk at a time. Bytes are compared at the same
    /// offsets, so insertions early in a stream cost more than with
    /// [`Differ::diff`].
    pub fn diff_streams<O, T>(&self, orig: O, target: T) -> Result<Box<dyn OpQueue>>
    where
        O: Read + Send + 'static,
        T: Read + Send + 'static,
    {
        let source = StreamChunkingQueue::with_chunk(orig, target, self.config.chunk_size);
        self.pipeline().build(Box::new(source))
    }
}

impl DiffEngine for Differ {
    fn compute_diff(&self, old: &[u8], new: &[u8]) -> Result<Bytes> {
        let mut queue = self.diff(Bytes::copy_from_slice(old), Bytes::copy_from_slice(new))?;
        let encoded = encode_queue(&mut queue)?;
        metrics::counter!("badiff_encoded_bytes_total").increment(encoded.len() as u64);
        Ok(encoded)
    }

    fn apply_diff(&self, base: &[u8], diff: &[u8]) -> Result<Bytes> {
        let mut queue = DecodingQueue::new(Bytes::copy_from_slice(diff));
        replay_encoded(&mut queue, base)
    }

    fn undo_diff(&self, current: &[u8], diff: &[u8]) -> Result<Bytes> {
        let mut queue = UndoQueue::new(DecodingQueue::new(Bytes::copy_from_slice(diff)));
        replay_encoded(&mut queue, current)
    }
}

/// Builder for configuring a [`Differ`]
#[derive(Debug, Default)]
pub struct DifferBuilder {
    config: DiffConfig,
}

impl DifferBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DiffConfig) -> Self {
        self.config = config;
        self
    }

    /// Set chunk size
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Set worker count for parallel graphing
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set graph implementation
    pub fn graph(mut self, graph: GraphKind) -> Self {
        self.config.graph = graph;
        self
    }

    /// Enable or disable parallel graphing
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Keep delete payloads so diffs can be undone
    pub fn keep_undo(mut self, keep_undo: bool) -> Self {
        self.config.keep_undo = keep_undo;
        self
    }

    /// Enable or disable compaction
    pub fn compact(mut self, compact: bool) -> Self {
        self.config.compact = compact;
        self
    }

    /// Build the differ
    pub fn build(self) -> Result<Differ> {
        Differ::new(self.config)
    }
}
