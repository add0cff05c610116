//! Pipelines assembled from single-character stage codes
//!
//! ```
//! use badiff::pipeline::Pipeline;
//! use badiff::queue::{OpQueue, ReplaceQueue};
//!
//! let pipeline = Pipeline::parse("kgc").unwrap().with_chunk(64);
//! let source = ReplaceQueue::new(&b"Hello world!"[..], &b"Hellish cruel world!"[..]);
//! let mut q = pipeline.build(Box::new(source)).unwrap();
//!
//! let mut out = Vec::new();
//! q.apply(&mut &b"Hello world!"[..], &mut out).unwrap();
//! assert_eq!(out, b"Hellish cruel world!");
//! ```

use crate::graph::GraphKind;
use crate::queue::{
    ChunkingQueue, CoalescingQueue, CompactingQueue, DEFAULT_CHUNK, GraphQueue, OneWayQueue,
    OpQueue, ParallelGraphQueue, PumpingQueue, RewindingQueue, UnchunkingQueue, UndoQueue,
};
use crate::{Error, Result};
use std::io::Read;
use tracing::debug;

/// One transformation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `q`: leave the queue as it is
    Raw,
    /// `c`: [`CoalescingQueue`]
    Coalesce,
    /// `C`: [`CompactingQueue`]
    Compact,
    /// `g`: [`GraphQueue`]
    Graph,
    /// `o`: [`OneWayQueue`]
    OneWay,
    /// `G`: [`ParallelGraphQueue`]
    ParallelGraph,
    /// `p`: [`PumpingQueue`]
    Pump,
    /// `r`: [`RewindingQueue`], needs [`Pipeline::with_original`]
    Rewind,
    /// `u`: [`UnchunkingQueue`]
    Unchunk,
    /// `U`: [`UndoQueue`]
    Undo,
    /// `k`: [`ChunkingQueue`]
    Chunk,
}

impl Stage {
    /// Every stage, in code order
    pub const ALL: [Stage; 11] = [
        Self::Raw,
        Self::Coalesce,
        Self::Compact,
        Self::Graph,
        Self::OneWay,
        Self::ParallelGraph,
        Self::Pump,
        Self::Rewind,
        Self::Unchunk,
        Self::Undo,
        Self::Chunk,
    ];

    /// Parse from a stage code
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.code() == code)
    }

    /// Stage code
    pub fn code(self) -> char {
        match self {
            Self::Raw => 'q',
            Self::Coalesce => 'c',
            Self::Compact => 'C',
            Self::Graph => 'g',
            Self::OneWay => 'o',
            Self::ParallelGraph => 'G',
            Self::Pump => 'p',
            Self::Rewind => 'r',
            Self::Unchunk => 'u',
            Self::Undo => 'U',
            Self::Chunk => 'k',
        }
    }
}

/// Ordered list of stages plus the settings the graph stages need
pub struct Pipeline {
    stages: Vec<Stage>,
    chunk: usize,
    graph: GraphKind,
    workers: usize,
    original: Option<Box<dyn Read + Send>>,
}

impl Pipeline {
    /// Pipeline running `stages` in order
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            chunk: DEFAULT_CHUNK,
            graph: GraphKind::default(),
            workers: num_cpus::get(),
            original: None,
        }
    }

    /// Parse a string of stage codes, e.g. `"kGc"`
    ///
    /// # Errors
    /// [`Error::UnknownStage`] for the first character that is not a stage code.
    pub fn parse(codes: &str) -> Result<Self> {
        let stages = codes
            .chars()
            .map(|code| Stage::from_code(code).ok_or(Error::UnknownStage(code)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(stages))
    }

    /// Stages in application order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Chunk size for `k` and graph capacity for `g`/`G`
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Graph used by `g` and `G`
    pub fn with_graph(mut self, graph: GraphKind) -> Self {
        self.graph = graph;
        self
    }

    /// Pool size for `G`
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Original bytes for the `r` stage
    pub fn with_original(mut self, original: impl Read + Send + 'static) -> Self {
        self.original = Some(Box::new(original));
        self
    }

    /// Wrap `queue` in every stage, left to right
    ///
    /// # Errors
    /// [`Error::Config`] for a zero chunk size or a rewind stage without an
    /// original (each original serves a single rewind), or whatever starting
    /// a graph pool fails with.
    pub fn build(mut self, queue: Box<dyn OpQueue>) -> Result<Box<dyn OpQueue>> {
        if self.chunk == 0 {
            return Err(Error::Config("chunk size must be at least 1".to_string()));
        }
        let codes: String = self.stages.iter().map(|stage| stage.code()).collect();
        debug!(stages = %codes, chunk = self.chunk, graph = self.graph.as_str(), "building pipeline");

        let mut queue = queue;
        for stage in std::mem::take(&mut self.stages) {
            queue = match stage {
                Stage::Raw => queue,
                Stage::Coalesce => Box::new(CoalescingQueue::new(queue)),
                Stage::Compact => Box::new(CompactingQueue::new(queue)),
                Stage::Graph => Box::new(GraphQueue::with_chunk(queue, self.chunk, self.graph)),
                Stage::OneWay => Box::new(OneWayQueue::new(queue)),
                Stage::ParallelGraph => Box::new(ParallelGraphQueue::with_workers(
                    queue,
                    self.workers,
                    self.chunk,
                    self.graph,
                )?),
                Stage::Pump => Box::new(PumpingQueue::new(queue)),
                Stage::Rewind => {
                    let original = self.original.take().ok_or_else(|| {
                        Error::Config("rewind stage needs an original byte source".to_string())
                    })?;
                    Box::new(RewindingQueue::new(queue, original))
                }
                Stage::Unchunk => Box::new(UnchunkingQueue::new(queue)),
                Stage::Undo => Box::new(UndoQueue::new(queue)),
                Stage::Chunk => Box::new(ChunkingQueue::with_chunk(queue, self.chunk)),
            };
        }
        Ok(queue)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .field("chunk", &self.chunk)
            .field("graph", &self.graph)
            .field("workers", &self.workers)
            .field("original", &self.original.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Op;
    use crate::op::replay;
    use crate::queue::{ListQueue, ReplaceQueue};

    const ORIG: &[u8] = b"Hello world!";
    const TARGET: &[u8] = b"Hellish cruel world!";

    #[test]
    fn test_parse_codes() {
        let pipeline = Pipeline::parse("qcCgoGpruUk").unwrap();
        assert_eq!(pipeline.stages(), &Stage::ALL);
        for stage in Stage::ALL {
            assert_eq!(Stage::from_code(stage.code()), Some(stage));
        }
    }

    #[test]
    fn test_parse_fails_fast() {
        assert!(matches!(Pipeline::parse("cgx"), Err(Error::UnknownStage('x'))));
        assert!(Pipeline::parse("").unwrap().stages().is_empty());
    }

    #[test]
    fn test_serial_and_parallel_pipelines_agree() {
        let serial = Pipeline::parse("kgc")
            .unwrap()
            .with_chunk(4)
            .build(Box::new(ReplaceQueue::new(ORIG, TARGET)))
            .unwrap()
            .drain_vec()
            .unwrap();
        let parallel = Pipeline::parse("kGc")
            .unwrap()
            .with_chunk(4)
            .with_workers(3)
            .build(Box::new(ReplaceQueue::new(ORIG, TARGET)))
            .unwrap()
            .drain_vec()
            .unwrap();
        assert_eq!(serial, parallel);
        assert_eq!(replay(&serial, ORIG).unwrap(), TARGET);
    }

    #[test]
    fn test_undo_stage_inverts() {
        let forward = Pipeline::parse("gc")
            .unwrap()
            .with_chunk(32)
            .build(Box::new(ReplaceQueue::new(ORIG, TARGET)))
            .unwrap()
            .drain_vec()
            .unwrap();
        let backward = Pipeline::parse("U")
            .unwrap()
            .build(Box::new(ListQueue::new(forward)))
            .unwrap()
            .drain_vec()
            .unwrap();
        assert_eq!(replay(&backward, TARGET).unwrap(), ORIG);
    }

    #[test]
    fn test_rewind_needs_original() {
        let result = Pipeline::parse("r")
            .unwrap()
            .build(Box::new(ListQueue::new(vec![Op::copy(1)])));
        assert!(matches!(result, Err(Error::Config(_))));

        let backward = Pipeline::parse("gor")
            .unwrap()
            .with_chunk(32)
            .with_original(ORIG)
            .build(Box::new(ReplaceQueue::new(ORIG, TARGET)))
            .unwrap()
            .drain_vec()
            .unwrap();
        assert_eq!(replay(&backward, TARGET).unwrap(), ORIG);
    }

    #[test]
    fn test_zero_chunk_rejected() {
        for codes in ["k", "g", "G", "q"] {
            let result = Pipeline::parse(codes)
                .unwrap()
                .with_chunk(0)
                .build(Box::new(ReplaceQueue::new(ORIG, TARGET)));
            assert!(matches!(result, Err(Error::Config(_))), "stages {codes}");
        }
    }

    #[test]
    fn test_raw_and_pump_preserve_ops() {
        let ops = vec![Op::copy(1), Op::delete(2), Op::insert(&b"x"[..])];
        let out = Pipeline::parse("qpq")
            .unwrap()
            .build(Box::new(ListQueue::new(ops.clone())))
            .unwrap()
            .drain_vec()
            .unwrap();
        assert_eq!(out, ops);
    }
}
