#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use graph_upsert::{
    Assigned, CancelToken, Duple, DupleNode, InMemoryGraph, InMemoryTxn, Logger, Mutation,
    Response, StoreError, Transaction, TxnFactory, UpsertEvent,
};

pub fn person(name: &str) -> DupleNode {
    DupleNode::new(name)
        .with(Duple::unique("email", format!("{}@example.com", name)))
        .with(Duple::new("name", name))
}

pub fn people(count: usize) -> Vec<DupleNode> {
    (0..count).map(|i| person(&format!("person-{}", i))).collect()
}

/// Cancels the run on the first commit it sees.
pub struct CancelOnCommit {
    pub cancel: CancelToken,
}

impl Logger for CancelOnCommit {
    fn log(&self, event: &UpsertEvent<'_>) {
        if matches!(event, UpsertEvent::Committed { .. }) {
            self.cancel.cancel();
        }
    }
}

pub fn cancel_on_commit(cancel: &CancelToken) -> Arc<dyn Logger> {
    Arc::new(CancelOnCommit {
        cancel: cancel.clone(),
    })
}

/// Store whose mutations report no assigned UIDs.
#[derive(Clone, Default)]
pub struct ForgetfulGraph {
    pub inner: InMemoryGraph,
}

pub struct ForgetfulTxn(InMemoryTxn);

impl TxnFactory for ForgetfulGraph {
    type Txn = ForgetfulTxn;

    fn new_txn(&self) -> ForgetfulTxn {
        ForgetfulTxn(self.inner.new_txn())
    }
}

impl Transaction for ForgetfulTxn {
    fn query(&mut self, query: &str) -> Result<Response, StoreError> {
        self.0.query(query)
    }

    fn mutate(&mut self, mutation: &Mutation) -> Result<Assigned, StoreError> {
        self.0.mutate(mutation)?;
        Ok(Assigned::default())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.0.commit()
    }

    fn discard(self) {
        self.0.discard()
    }
}

/// Store that rejects every mutation with a non-conflict error.
#[derive(Clone, Default)]
pub struct ReadOnlyGraph {
    pub inner: InMemoryGraph,
}

pub struct ReadOnlyTxn(InMemoryTxn);

impl TxnFactory for ReadOnlyGraph {
    type Txn = ReadOnlyTxn;

    fn new_txn(&self) -> ReadOnlyTxn {
        ReadOnlyTxn(self.inner.new_txn())
    }
}

impl Transaction for ReadOnlyTxn {
    fn query(&mut self, query: &str) -> Result<Response, StoreError> {
        self.0.query(query)
    }

    fn mutate(&mut self, _mutation: &Mutation) -> Result<Assigned, StoreError> {
        Err(StoreError::Mutate("read-only".into()))
    }

    fn commit(self) -> Result<(), StoreError> {
        self.0.commit()
    }

    fn discard(self) {
        self.0.discard()
    }
}

/// Store that aborts the next `n` queries or mutations with a conflict
/// before the wrapped graph sees them.
#[derive(Clone, Default)]
pub struct ContendedGraph {
    pub inner: InMemoryGraph,
    query_aborts: Arc<AtomicUsize>,
    mutate_aborts: Arc<AtomicUsize>,
}

impl ContendedGraph {
    pub fn abort_next_queries(self, n: usize) -> Self {
        self.query_aborts.store(n, Ordering::SeqCst);
        self
    }

    pub fn abort_next_mutations(self, n: usize) -> Self {
        self.mutate_aborts.store(n, Ordering::SeqCst);
        self
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

pub struct ContendedTxn {
    inner: InMemoryTxn,
    query_aborts: Arc<AtomicUsize>,
    mutate_aborts: Arc<AtomicUsize>,
}

impl TxnFactory for ContendedGraph {
    type Txn = ContendedTxn;

    fn new_txn(&self) -> ContendedTxn {
        ContendedTxn {
            inner: self.inner.new_txn(),
            query_aborts: Arc::clone(&self.query_aborts),
            mutate_aborts: Arc::clone(&self.mutate_aborts),
        }
    }
}

impl Transaction for ContendedTxn {
    fn query(&mut self, query: &str) -> Result<Response, StoreError> {
        if take_one(&self.query_aborts) {
            return Err(StoreError::Aborted);
        }
        self.inner.query(query)
    }

    fn mutate(&mut self, mutation: &Mutation) -> Result<Assigned, StoreError> {
        if take_one(&self.mutate_aborts) {
            return Err(StoreError::Aborted);
        }
        self.inner.mutate(mutation)
    }

    fn commit(self) -> Result<(), StoreError> {
        self.inner.commit()
    }

    fn discard(self) {
        self.inner.discard()
    }
}
