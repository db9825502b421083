use std::collections::HashMap;
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::item::{mutation_worker, ItemOutcome, WorkerPackage};
use crate::config::FailurePolicy;
use crate::error::{Result, UpsertError};
use crate::node::{DupleNode, Uid};
use crate::store::TxnFactory;

/// Start `count` named worker threads sharing one input queue.
///
/// Zero workers is valid and spawns nothing. Each worker runs until the
/// queue's sender side is dropped.
pub fn launch_workers<F>(
    count: usize,
    package: &WorkerPackage<F>,
    queue: Arc<Mutex<Receiver<DupleNode>>>,
    results: &Sender<ItemOutcome>,
) -> Result<Vec<JoinHandle<()>>>
where
    F: TxnFactory + Clone + 'static,
{
    let mut handles = Vec::with_capacity(count);

    for index in 0..count {
        let package = package.clone();
        let queue = Arc::clone(&queue);
        let results = results.clone();

        let handle = thread::Builder::new()
            .name(format!("upsert-worker-{}", index))
            .spawn(move || mutation_worker(package, queue, results))
            .map_err(|e| UpsertError::Worker(e.to_string()))?;
        handles.push(handle);
    }

    Ok(handles)
}

/// Aggregated outcome of one run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Resolved UID per identifier.
    pub uids: HashMap<String, Uid>,
    /// Items that ended with a UID, repeated identifiers counted each time.
    pub upserted: usize,
    /// Terminal failures, in the order workers reported them.
    pub failures: Vec<(String, UpsertError)>,
    /// Identifiers dropped after cancellation.
    pub skipped: Vec<String>,
    /// Items answered from the cache.
    pub cached: usize,
    /// Conflicting attempts across all items.
    pub conflicts: usize,
    /// The run's cache once every worker finished.
    pub cache: HashMap<String, Uid>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    /// Items that reached a terminal outcome, skipped ones included.
    pub fn processed(&self) -> usize {
        self.upserted + self.failures.len() + self.skipped.len()
    }

    fn record(&mut self, outcome: ItemOutcome) {
        self.conflicts += outcome.conflicts();
        match outcome {
            ItemOutcome::Upserted {
                identifier,
                uid,
                cached,
                ..
            } => {
                self.upserted += 1;
                if cached {
                    self.cached += 1;
                }
                self.uids.insert(identifier, uid);
            }
            ItemOutcome::Failed {
                identifier, error, ..
            } => self.failures.push((identifier, error)),
            ItemOutcome::Skipped { identifier } => self.skipped.push(identifier),
        }
    }

    /// Index of the error a fail-fast run returns: the first failure that is
    /// not a consequence of the cancellation it triggered.
    fn first_cause(&self) -> Option<usize> {
        self.failures
            .iter()
            .position(|(_, error)| !matches!(error, UpsertError::Cancelled))
            .or_else(|| (!self.failures.is_empty()).then_some(0))
    }
}

/// Runs batches of nodes through a fixed set of worker threads.
///
/// ## Example
///
/// ```
/// use graph_upsert::{Duple, DupleNode, InMemoryGraph, WorkerPackage, WorkerPool};
///
/// let graph = InMemoryGraph::new();
/// let pool = WorkerPool::new(WorkerPackage::new(graph.clone())).with_workers(2);
///
/// let report = pool
///     .run(vec![DupleNode::new("alice").with(Duple::unique("email", "a@example.com"))])
///     .unwrap();
///
/// assert!(report.uids["alice"].is_new());
/// assert_eq!(graph.node_count(), 1);
/// ```
pub struct WorkerPool<F> {
    package: WorkerPackage<F>,
    workers: usize,
    queue_capacity: usize,
}

impl<F> WorkerPool<F>
where
    F: TxnFactory + Clone + 'static,
{
    pub fn new(package: WorkerPackage<F>) -> Self {
        WorkerPool {
            package,
            workers: 16,
            queue_capacity: 64,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn package(&self) -> &WorkerPackage<F> {
        &self.package
    }

    /// Run a sized batch with at most one worker per node.
    pub fn run(&self, nodes: Vec<DupleNode>) -> Result<BatchReport> {
        let total = nodes.len();
        self.package.progress().set_total(total as u64);
        let count = self.workers.max(1).min(total);
        self.execute(count, nodes)
    }

    /// Run nodes from an iterator of unknown length.
    pub fn run_stream<I>(&self, nodes: I) -> Result<BatchReport>
    where
        I: IntoIterator<Item = DupleNode>,
    {
        self.execute(self.workers.max(1), nodes)
    }

    fn execute<I>(&self, count: usize, nodes: I) -> Result<BatchReport>
    where
        I: IntoIterator<Item = DupleNode>,
    {
        let (queue_tx, queue_rx) = sync_channel(self.queue_capacity.max(1));
        let (results_tx, results_rx) = channel();

        let mut report = BatchReport::default();
        let mut handles = Vec::new();
        let mut feed = nodes.into_iter();

        if count > 0 {
            handles = launch_workers(
                count,
                &self.package,
                Arc::new(Mutex::new(queue_rx)),
                &results_tx,
            )?;

            tracing::debug!(workers = count, "upsert run started");

            for node in feed.by_ref() {
                // Fails only once every worker is gone.
                if let Err(rejected) = queue_tx.send(node) {
                    report.skipped.push(rejected.0.identifier);
                    break;
                }
            }
        }
        drop(queue_tx);
        drop(results_tx);

        // Anything left over never reached a worker.
        report
            .skipped
            .extend(feed.map(|node| node.identifier));

        let mut panicked = None;
        for handle in handles {
            let name = handle.thread().name().unwrap_or("upsert-worker").to_string();
            if handle.join().is_err() && panicked.is_none() {
                panicked = Some(name);
            }
        }

        for outcome in results_rx {
            report.record(outcome);
        }
        report.cache = self.package.cache().snapshot()?;

        tracing::debug!(
            upserted = report.upserted,
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            conflicts = report.conflicts,
            "upsert run finished"
        );

        if let Some(name) = panicked {
            return Err(UpsertError::Worker(format!("{} panicked", name)));
        }

        if self.package.failure_policy() == FailurePolicy::FailFast {
            if let Some(index) = report.first_cause() {
                let (_, error) = report.failures.swap_remove(index);
                return Err(error);
            }
        }

        Ok(report)
    }
}
