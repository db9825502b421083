//! Client entry point.
//!
//! A [`Client`] holds the configuration and reporting collaborators and
//! starts one run per call. Every call gets a fresh cache unless the caller
//! hands one in through [`Client::batch`].
//!
//! ## Example
//!
//! ```
//! use std::collections::HashMap;
//! use graph_upsert::{Client, InMemoryGraph, Operation};
//!
//! let graph = InMemoryGraph::new();
//! let client = Client::new().with_predicate_key("email");
//!
//! let mut row = HashMap::new();
//! row.insert("email".to_string(), "alice@example.com".to_string());
//! row.insert("name".to_string(), "Alice".to_string());
//!
//! let report = client.mutate(&graph, Operation::StringMap(row)).unwrap();
//! assert!(report.uids["alice@example.com"].is_new());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::UidCache;
use crate::config::UpsertConfig;
use crate::error::{Result, UpsertError};
use crate::node::{DupleNode, Uid};
use crate::report::{CounterProgress, Logger, Progress, TracingLogger};
use crate::store::TxnFactory;
use crate::worker::{BatchReport, CancelToken, WorkerPackage, WorkerPool};

/// What to write in one call.
#[derive(Debug, Clone)]
pub enum Operation {
    SingleNode(DupleNode),
    MultiNode(Vec<DupleNode>),
    /// One node from string pairs keyed by the configured predicate key.
    StringMap(HashMap<String, String>),
    /// One node from JSON scalars keyed by the configured predicate key.
    DynamicMap(HashMap<String, serde_json::Value>),
}

impl Operation {
    fn into_nodes(self, predicate_key: &str) -> Result<Vec<DupleNode>> {
        match self {
            Operation::SingleNode(node) => Ok(vec![node]),
            Operation::MultiNode(nodes) => Ok(nodes),
            Operation::StringMap(map) => Ok(vec![DupleNode::from_string_map(&map, predicate_key)?]),
            Operation::DynamicMap(map) => {
                Ok(vec![DupleNode::from_dynamic_map(&map, predicate_key)?])
            }
        }
    }
}

impl From<DupleNode> for Operation {
    fn from(node: DupleNode) -> Self {
        Operation::SingleNode(node)
    }
}

impl From<Vec<DupleNode>> for Operation {
    fn from(nodes: Vec<DupleNode>) -> Self {
        Operation::MultiNode(nodes)
    }
}

#[derive(Clone)]
pub struct Client {
    config: UpsertConfig,
    logger: Arc<dyn Logger>,
    progress: Option<Arc<dyn Progress>>,
}

impl Default for Client {
    fn default() -> Self {
        Client {
            config: UpsertConfig::default(),
            logger: Arc::new(TracingLogger),
            progress: None,
        }
    }
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client configured from `UPSERT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new().with_config(UpsertConfig::from_env()?))
    }

    pub fn with_config(mut self, config: UpsertConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Shared across runs. Without one each run counts on its own.
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn with_predicate_key(mut self, key: impl Into<String>) -> Self {
        self.config.predicate_key = key.into();
        self
    }

    pub fn config(&self) -> &UpsertConfig {
        &self.config
    }

    /// Upsert every node the operation describes.
    pub fn mutate<F>(&self, store: &F, operation: Operation) -> Result<BatchReport>
    where
        F: TxnFactory + Clone + 'static,
    {
        self.config.validate()?;
        let nodes = operation.into_nodes(&self.config.predicate_key)?;
        self.batch(store).run(nodes)
    }

    /// Upsert one node and return its UID.
    pub fn upsert_one<F>(&self, store: &F, node: DupleNode) -> Result<Uid>
    where
        F: TxnFactory + Clone + 'static,
    {
        let identifier = node.identifier.clone();
        let mut report = self.batch(store).run(vec![node])?;

        if let Some(uid) = report.uids.remove(&identifier) {
            return Ok(uid);
        }
        match report.failures.pop() {
            Some((_, error)) => Err(error),
            None => Err(UpsertError::Cancelled),
        }
    }

    /// Start configuring a run against `store`.
    pub fn batch<F>(&self, store: &F) -> BatchRun<'_, F>
    where
        F: TxnFactory + Clone + 'static,
    {
        BatchRun {
            client: self,
            store: store.clone(),
            cache: UidCache::new(),
            cancel: CancelToken::new(),
        }
    }
}

/// One run with an optional pre-seeded cache and caller-held cancel token.
pub struct BatchRun<'c, F> {
    client: &'c Client,
    store: F,
    cache: UidCache,
    cancel: CancelToken,
}

impl<'c, F> BatchRun<'c, F>
where
    F: TxnFactory + Clone + 'static,
{
    pub fn with_cache(mut self, cache: UidCache) -> Self {
        self.cache = cache;
        self
    }

    /// Cancelling `cancel` from any thread stops the run cooperatively. The
    /// run works on a child of `cancel`, so a fail-fast stop does not leave
    /// the caller's token cancelled.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run(self, nodes: Vec<DupleNode>) -> Result<BatchReport> {
        self.pool()?.run(nodes)
    }

    pub fn run_stream<I>(self, nodes: I) -> Result<BatchReport>
    where
        I: IntoIterator<Item = DupleNode>,
    {
        self.pool()?.run_stream(nodes)
    }

    fn pool(self) -> Result<WorkerPool<F>> {
        let config = &self.client.config;
        config.validate()?;

        let progress = self
            .client
            .progress
            .clone()
            .unwrap_or_else(|| Arc::new(CounterProgress::new()));

        let package = WorkerPackage::new(self.store)
            .with_cache(self.cache)
            .with_cancel(self.cancel.child())
            .with_logger(Arc::clone(&self.client.logger))
            .with_progress(progress)
            .with_max_conflict_retries(config.max_conflict_retries)
            .with_failure_policy(config.failure_policy);

        Ok(WorkerPool::new(package)
            .with_workers(config.workers)
            .with_queue_capacity(config.queue_capacity))
    }
}
