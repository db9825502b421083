use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use super::CancelToken;
use crate::cache::UidCache;
use crate::config::FailurePolicy;
use crate::error::{QueryError, Result, UpsertError};
use crate::mutation::{encode, Subject};
use crate::node::{DupleNode, Uid};
use crate::query::query_uid;
use crate::report::{CounterProgress, Logger, Progress, TracingLogger, UpsertEvent};
use crate::store::{StoreError, Transaction, TxnFactory};

/// Everything a worker needs, built once per run and cloned into each
/// worker. Only the cache and the progress counter are mutated.
#[derive(Clone)]
pub struct WorkerPackage<F> {
    factory: F,
    cache: UidCache,
    logger: Arc<dyn Logger>,
    progress: Arc<dyn Progress>,
    cancel: CancelToken,
    max_conflict_retries: Option<usize>,
    failure_policy: FailurePolicy,
}

impl<F> WorkerPackage<F> {
    pub fn new(factory: F) -> Self {
        WorkerPackage {
            factory,
            cache: UidCache::new(),
            logger: Arc::new(TracingLogger),
            progress: Arc::new(CounterProgress::new()),
            cancel: CancelToken::new(),
            max_conflict_retries: None,
            failure_policy: FailurePolicy::BestEffort,
        }
    }

    pub fn with_cache(mut self, cache: UidCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: Option<usize>) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn cache(&self) -> &UidCache {
        &self.cache
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn progress(&self) -> &Arc<dyn Progress> {
        &self.progress
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }
}

/// Terminal result of one item, sent on the results channel.
#[derive(Debug)]
pub enum ItemOutcome {
    Upserted {
        identifier: String,
        uid: Uid,
        /// Taken from the cache without touching the store.
        cached: bool,
        /// Conflicting attempts before the one that committed.
        conflicts: usize,
    },
    Failed {
        identifier: String,
        error: UpsertError,
        conflicts: usize,
    },
    /// Dequeued after cancellation and never processed.
    Skipped { identifier: String },
}

impl ItemOutcome {
    pub fn identifier(&self) -> &str {
        match self {
            ItemOutcome::Upserted { identifier, .. }
            | ItemOutcome::Failed { identifier, .. }
            | ItemOutcome::Skipped { identifier } => identifier,
        }
    }

    pub fn conflicts(&self) -> usize {
        match self {
            ItemOutcome::Upserted { conflicts, .. } | ItemOutcome::Failed { conflicts, .. } => {
                *conflicts
            }
            ItemOutcome::Skipped { .. } => 0,
        }
    }
}

/// Result of one attempt with one transaction.
enum Attempt {
    Cached(Uid),
    Committed(Uid),
    /// The store aborted on a conflict; retry with a fresh transaction.
    Conflict,
    /// Cancellation was observed before the mutation went out.
    Cancelled,
}

/// Drive one node through cache, lookup, encode and commit, retrying on
/// conflict until it commits, fails, or the run is cancelled.
pub fn upsert_item<F: TxnFactory>(
    package: &WorkerPackage<F>,
    node: &DupleNode,
    sink: &mut String,
) -> ItemOutcome {
    let identifier = node.identifier.as_str();
    let mut conflicts = 0;

    if package.cancel.is_cancelled() {
        return skipped(package, identifier);
    }
    package.logger.log(&UpsertEvent::Started { identifier });

    loop {
        let result = if conflicts > 0 && package.cancel.is_cancelled() {
            Err(UpsertError::Cancelled)
        } else {
            attempt(package, node, sink)
        };

        let error = match result {
            Ok(Attempt::Cached(uid)) => {
                package.logger.log(&UpsertEvent::Cached {
                    identifier,
                    uid: &uid,
                });
                return ItemOutcome::Upserted {
                    identifier: identifier.to_string(),
                    uid,
                    cached: true,
                    conflicts,
                };
            }
            Ok(Attempt::Committed(uid)) => {
                package.logger.log(&UpsertEvent::Committed {
                    identifier,
                    uid: &uid,
                });
                return ItemOutcome::Upserted {
                    identifier: identifier.to_string(),
                    uid,
                    cached: false,
                    conflicts,
                };
            }
            Ok(Attempt::Cancelled) if conflicts == 0 => return skipped(package, identifier),
            Ok(Attempt::Cancelled) => UpsertError::Cancelled,
            Ok(Attempt::Conflict) => {
                conflicts += 1;
                package.logger.log(&UpsertEvent::Conflict {
                    identifier,
                    attempt: conflicts,
                });
                match package.max_conflict_retries {
                    Some(max) if conflicts > max => UpsertError::RetriesExhausted {
                        identifier: identifier.to_string(),
                        attempts: conflicts,
                    },
                    _ => continue,
                }
            }
            Err(error) => error,
        };

        package.logger.log(&UpsertEvent::Failed {
            identifier,
            error: &error,
        });
        return ItemOutcome::Failed {
            identifier: identifier.to_string(),
            error,
            conflicts,
        };
    }
}

fn skipped<F>(package: &WorkerPackage<F>, identifier: &str) -> ItemOutcome {
    package.logger.log(&UpsertEvent::Skipped { identifier });
    ItemOutcome::Skipped {
        identifier: identifier.to_string(),
    }
}

fn attempt<F: TxnFactory>(
    package: &WorkerPackage<F>,
    node: &DupleNode,
    sink: &mut String,
) -> Result<Attempt> {
    let identifier = node.identifier.as_str();

    if let Some(uid) = package.cache.get(identifier)? {
        return Ok(Attempt::Cached(uid));
    }

    let mut txn = package.factory.new_txn();

    let existing = match query_uid(&mut txn, sink, node) {
        Ok(existing) => existing,
        Err(QueryError::Store {
            source: StoreError::Aborted,
            ..
        }) => {
            txn.discard();
            return Ok(Attempt::Conflict);
        }
        Err(err) => {
            txn.discard();
            return Err(err.into());
        }
    };

    let subject = match &existing {
        Some(uid) => Subject::Existing(uid.clone()),
        None => Subject::blank_for(identifier),
    };
    let mutation = match encode(node, &subject) {
        Ok(mutation) => mutation,
        Err(err) => {
            txn.discard();
            return Err(err);
        }
    };

    if package.cancel.is_cancelled() {
        txn.discard();
        return Ok(Attempt::Cancelled);
    }

    let assigned = match txn.mutate(&mutation) {
        Ok(assigned) => assigned,
        Err(err) if err.is_conflict() => {
            txn.discard();
            return Ok(Attempt::Conflict);
        }
        Err(source) => {
            txn.discard();
            return Err(UpsertError::Mutate {
                identifier: identifier.to_string(),
                source,
            });
        }
    };

    let uid = match existing {
        Some(uid) => Uid::existing(uid),
        None => {
            let label = subject.blank_label().unwrap_or_default();
            match assigned.uids.get(label) {
                Some(uid) => Uid::created(uid.clone()),
                None => {
                    txn.discard();
                    return Err(UpsertError::MissingAssignedUid {
                        identifier: identifier.to_string(),
                    });
                }
            }
        }
    };

    match txn.commit() {
        Ok(()) => {}
        Err(err) if err.is_conflict() => return Ok(Attempt::Conflict),
        Err(source) => {
            return Err(UpsertError::Commit {
                identifier: identifier.to_string(),
                source,
            })
        }
    }

    package.cache.insert(identifier, uid.clone())?;
    Ok(Attempt::Committed(uid))
}

/// Worker loop: pull nodes until the queue closes, one outcome per node.
///
/// After cancellation the worker keeps draining the queue and reports every
/// node as skipped, so a producer blocked on a full queue always gets
/// through.
pub(crate) fn mutation_worker<F: TxnFactory>(
    package: WorkerPackage<F>,
    queue: Arc<Mutex<Receiver<DupleNode>>>,
    results: Sender<ItemOutcome>,
) {
    let mut sink = String::new();

    loop {
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(node) = next else {
            break;
        };

        let outcome = upsert_item(&package, &node, &mut sink);
        if matches!(outcome, ItemOutcome::Failed { .. })
            && package.failure_policy == FailurePolicy::FailFast
        {
            package.cancel.cancel();
        }

        package.progress.increment();
        // The receiver only goes away once the run is over.
        let _ = results.send(outcome);
    }
}
