//! Parallel graphing on a fixed pool of worker threads
//!
//! [`ParallelGraphQueue`] produces exactly what a serial
//! [`GraphQueue`](super::GraphQueue) would, but hands each graphable pair to
//! an idle worker. Results are kept in a chain of entries in stream order:
//!
//! ```text
//! upstream -> local buffer -> chain: [op | pending | pending | op ...] -> ready
//!                               ^          |
//!                               +-- worker results, one bounded(1) reply each
//! ```
//!
//! Dispatch only happens while a worker is idle, so at most `workers` pairs
//! are in flight. Polling blocks on the chain head until its result arrives.

use super::graph::{graph_pair, graphable};
use super::{Buffers, DEFAULT_CHUNK, OpQueue, require_pending};
use crate::graph::{Graph, GraphKind};
use crate::{Error, Op, Result};
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Cooperative cancellation flag shared with a pool's workers
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; queued and future work resolves to [`Error::Cancelled`]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`CancelToken::cancel`] has been called
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type Reply = Result<Vec<Op>>;

struct Job {
    orig: Bytes,
    target: Bytes,
    reply: Sender<Reply>,
}

enum ChainEntry {
    Op(Op),
    Pending(Receiver<Reply>),
}

/// Decrements the busy count when a job is finished, panicking or not
struct BusyGuard<'a>(&'a AtomicUsize);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

struct WorkerPool {
    jobs: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    busy: Arc<AtomicUsize>,
    workers: usize,
}

impl WorkerPool {
    fn spawn(workers: usize, chunk: usize, kind: GraphKind, cancel: &CancelToken) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let busy = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(workers);
        for slot in 0..workers {
            let rx = rx.clone();
            let busy = Arc::clone(&busy);
            let cancel = cancel.clone();
            let handle = thread::Builder::new()
                .name(format!("badiff-graph-{slot}"))
                .spawn(move || run_worker(&rx, &busy, &cancel, chunk, kind))?;
            handles.push(handle);
        }
        debug!(workers, chunk, graph = kind.as_str(), "graph pool started");
        Ok(Self {
            jobs: Some(tx),
            handles,
            busy,
            workers,
        })
    }

    fn idle(&self) -> bool {
        self.busy.load(Ordering::Acquire) < self.workers
    }

    fn submit(&self, orig: Bytes, target: Bytes) -> Result<Receiver<Reply>> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| Error::IllegalState("graph pool is shut down".to_string()))?;
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.busy.fetch_add(1, Ordering::AcqRel);
        if jobs.send(Job { orig, target, reply }).is_err() {
            self.busy.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::Worker("graph workers have exited".to_string()));
        }
        metrics::counter!("badiff_parallel_tasks_total").increment(1);
        Ok(rx)
    }

    fn shutdown(&mut self) {
        if self.jobs.take().is_none() {
            return;
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("graph worker panicked outside a task");
            }
        }
        debug!(workers = self.workers, "graph pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    jobs: &Receiver<Job>,
    busy: &AtomicUsize,
    cancel: &CancelToken,
    chunk: usize,
    kind: GraphKind,
) {
    let mut graph: Option<Box<dyn Graph>> = None;
    for job in jobs.iter() {
        let guard = BusyGuard(busy);
        let result = if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            let graph = graph.get_or_insert_with(|| kind.for_chunk(chunk));
            catch_unwind(AssertUnwindSafe(|| {
                graph_pair(graph.as_mut(), &job.orig, &job.target)
            }))
            .unwrap_or_else(|_| Err(Error::Worker("graph task panicked".to_string())))
        };
        if matches!(result, Err(Error::Worker(_))) {
            // storage may be half written
            graph = None;
        }
        drop(guard);
        // the queue may have been dropped; nobody is left to tell
        let _ = job.reply.send(result);
    }
}

/// [`GraphQueue`](super::GraphQueue) with pairs graphed concurrently
///
/// Output is identical to the serial queue. Once upstream is exhausted the
/// pool is shut down and further offers fail with [`Error::IllegalState`].
pub struct ParallelGraphQueue<Q> {
    buffers: Buffers,
    source: Q,
    chain: VecDeque<ChainEntry>,
    pool: Option<WorkerPool>,
    cancel: CancelToken,
}

impl<Q: OpQueue> ParallelGraphQueue<Q> {
    /// Graph `source` on one worker per CPU with default graph and chunk size
    pub fn new(source: Q) -> Result<Self> {
        Self::with_workers(source, num_cpus::get(), DEFAULT_CHUNK, GraphKind::default())
    }

    /// Graph `source` on `workers` threads, each owning a graph of `kind`
    /// sized for `chunk` bytes per side
    ///
    /// # Errors
    /// [`Error::Config`] for zero workers, [`Error::Io`] if a thread cannot
    /// be spawned.
    pub fn with_workers(source: Q, workers: usize, chunk: usize, kind: GraphKind) -> Result<Self> {
        if workers == 0 {
            return Err(Error::Config("graph pool needs at least one worker".to_string()));
        }
        let cancel = CancelToken::new();
        let pool = WorkerPool::spawn(workers, chunk, kind, &cancel)?;
        Ok(Self {
            buffers: Buffers::new(),
            source,
            chain: VecDeque::new(),
            pool: Some(pool),
            cancel,
        })
    }

    /// Token that cancels this queue's outstanding and future work
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn shutdown(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }
    }

    /// Dispatch pairs while workers are idle
    fn pump(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.shutdown();
            return Err(Error::Cancelled);
        }
        while self.pool.as_ref().is_some_and(WorkerPool::idle) {
            if !require_pending(&mut self.source, &mut self.buffers, 2)? {
                self.chain
                    .extend(self.buffers.pending.drain(..).map(ChainEntry::Op));
                self.shutdown();
                return Ok(());
            }
            let pending = &self.buffers.pending;
            let pair = graphable(&pending[0], &pending[1])
                .map(|(orig, target)| (orig.clone(), target.clone()));
            match (pair, self.pool.as_ref()) {
                (Some((orig, target)), Some(pool)) => {
                    let rx = pool.submit(orig, target)?;
                    self.buffers.pending.drain(..2);
                    self.chain.push_back(ChainEntry::Pending(rx));
                }
                _ => {
                    if let Some(op) = self.buffers.pending.pop_front() {
                        self.chain.push_back(ChainEntry::Op(op));
                    }
                }
            }
        }
        Ok(())
    }
}

impl<Q: OpQueue> OpQueue for ParallelGraphQueue<Q> {
    fn buffers(&mut self) -> &mut Buffers {
        &mut self.buffers
    }

    fn offer(&mut self, op: Op) -> Result<()> {
        if self.pool.is_none() {
            return Err(Error::IllegalState(
                "offer after the graph pool shut down".to_string(),
            ));
        }
        self.source.offer(op)
    }

    fn shift(&mut self) -> Result<()> {
        loop {
            self.pump()?;
            match self.chain.pop_front() {
                None => return Ok(()),
                Some(ChainEntry::Op(op)) => {
                    self.buffers.ready.push_back(op);
                    return Ok(());
                }
                Some(ChainEntry::Pending(rx)) => {
                    let ops = rx.recv().map_err(|_| {
                        Error::Worker("graph worker exited without replying".to_string())
                    })??;
                    self.buffers.ready.extend(ops);
                    if !self.buffers.ready.is_empty() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::replay;
    use crate::queue::{BufferQueue, ChunkingQueue, GraphQueue, ListQueue, ReplaceQueue};

    fn sample() -> (Vec<u8>, Vec<u8>) {
        let orig: Vec<u8> = (0..600u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut target = orig.clone();
        target[3] = 0;
        target.splice(100..140, b"replacement text".iter().copied());
        target.extend_from_slice(b"appended");
        target.drain(400..420);
        (orig, target)
    }

    fn serial(orig: &[u8], target: &[u8], chunk: usize) -> Vec<Op> {
        let chunked = ChunkingQueue::with_chunk(ReplaceQueue::new(orig.to_vec(), target.to_vec()), chunk);
        GraphQueue::with_chunk(chunked, chunk, GraphKind::Inertial)
            .drain_vec()
            .unwrap()
    }

    #[test]
    fn test_matches_serial_for_every_pool_size() {
        let (orig, target) = sample();
        let expected = serial(&orig, &target, 32);
        for workers in 1..=4 {
            let chunked =
                ChunkingQueue::with_chunk(ReplaceQueue::new(orig.clone(), target.clone()), 32);
            let ops = ParallelGraphQueue::with_workers(chunked, workers, 32, GraphKind::Inertial)
                .unwrap()
                .drain_vec()
                .unwrap();
            assert_eq!(ops, expected, "workers = {workers}");
            assert_eq!(replay(&ops, &orig).unwrap(), target);
        }
    }

    #[test]
    fn test_non_graphable_ops_keep_their_place() {
        let ops = vec![
            Op::copy(2),
            Op::delete(1),
            Op::insert(&b"x"[..]),
            Op::delete_with(&b"ab"[..]),
            Op::insert(&b"ac"[..]),
            Op::copy(1),
        ];
        let out = ParallelGraphQueue::with_workers(ListQueue::new(ops.clone()), 2, 8, GraphKind::Edit)
            .unwrap()
            .drain_vec()
            .unwrap();
        let expected = GraphQueue::with_chunk(ListQueue::new(ops), 8, GraphKind::Edit)
            .drain_vec()
            .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_empty_source() {
        let mut q =
            ParallelGraphQueue::with_workers(ListQueue::new(Vec::new()), 2, 8, GraphKind::Inertial)
                .unwrap();
        assert!(q.poll().unwrap().is_none());
    }

    #[test]
    fn test_offer_after_shutdown_is_illegal() {
        let mut q =
            ParallelGraphQueue::with_workers(BufferQueue::new(), 1, 8, GraphKind::Inertial).unwrap();
        q.offer(Op::delete_with(&b"abc"[..])).unwrap();
        q.offer(Op::insert(&b"abd"[..])).unwrap();
        let ops = q.drain_vec().unwrap();
        assert_eq!(replay(&ops, b"abc").unwrap(), b"abd");
        assert!(matches!(q.offer(Op::copy(1)), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_cancelled_queue_reports_cancellation() {
        let (orig, target) = sample();
        let chunked = ChunkingQueue::with_chunk(ReplaceQueue::new(orig, target), 16);
        let mut q = ParallelGraphQueue::with_workers(chunked, 2, 16, GraphKind::Inertial).unwrap();
        q.cancel_token().cancel();
        assert!(matches!(q.poll(), Err(Error::Cancelled)));
        assert!(matches!(q.poll(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_capacity_errors_surface_at_their_entry() {
        let source = ListQueue::new(vec![
            Op::copy(1),
            Op::delete_with(vec![b'a'; 10]),
            Op::insert(vec![b'b'; 10]),
        ]);
        let mut q = ParallelGraphQueue::with_workers(source, 2, 4, GraphKind::Inertial).unwrap();
        assert_eq!(q.poll().unwrap(), Some(Op::copy(1)));
        assert!(matches!(q.poll(), Err(Error::CapacityExceeded { .. })));
    }

    fn poll_until_error(q: &mut dyn OpQueue) -> (Vec<Op>, Error) {
        let mut ops = Vec::new();
        loop {
            match q.poll() {
                Ok(Some(op)) => ops.push(op),
                Ok(None) => panic!("queue ended without an error"),
                Err(err) => return (ops, err),
            }
        }
    }

    #[test]
    fn test_failed_entry_leaves_siblings_intact() {
        let script = || {
            vec![
                Op::delete_with(&b"abcd"[..]),
                Op::insert(&b"abed"[..]),
                Op::delete_with(vec![b'a'; 10]),
                Op::insert(vec![b'b'; 10]),
                Op::delete_with(&b"wxyz"[..]),
                Op::insert(&b"wxy!"[..]),
            ]
        };
        let mut serial_q = GraphQueue::with_chunk(ListQueue::new(script()), 4, GraphKind::Inertial);
        let (serial_head, _) = poll_until_error(&mut serial_q);
        let last_pair = ListQueue::new(script().split_off(4));
        let serial_tail = GraphQueue::with_chunk(last_pair, 4, GraphKind::Inertial)
            .drain_vec()
            .unwrap();

        for workers in 1..=2 {
            let source = ListQueue::new(script());
            let mut q =
                ParallelGraphQueue::with_workers(source, workers, 4, GraphKind::Inertial).unwrap();
            let (head, err) = poll_until_error(&mut q);
            assert!(matches!(err, Error::CapacityExceeded { .. }));
            assert_eq!(head, serial_head);
            assert_eq!(replay(&head, b"abcd").unwrap(), b"abed");

            let tail = q.drain_vec().unwrap();
            assert_eq!(tail, serial_tail);
            assert_eq!(replay(&tail, b"wxyz").unwrap(), b"wxy!");
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = ParallelGraphQueue::with_workers(BufferQueue::new(), 0, 8, GraphKind::Edit);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
