//! Store - the transactional graph store the pipeline writes into.
//!
//! The pipeline depends only on the four-operation [`Transaction`] contract
//! and a [`TxnFactory`] handing out fresh transactions. How a transaction
//! talks to a real store is up to the implementation; [`InMemoryGraph`] is a
//! local implementation with optimistic concurrency for tests and
//! development.
//!
//! ## Conflicts
//!
//! Optimistic stores abort a transaction whose reads or writes were
//! overtaken by another commit. That outcome is [`StoreError::Aborted`]; the
//! worker pool treats it as a signal to retry with a fresh transaction, not
//! as a failure.

mod in_memory;

use std::collections::HashMap;

use thiserror::Error;

use crate::mutation::Mutation;

pub use in_memory::{GraphStats, InMemoryGraph, InMemoryTxn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Optimistic-concurrency conflict with another writer.
    #[error("transaction aborted by a conflicting write")]
    Aborted,

    #[error("query failed: {0}")]
    Query(String),

    #[error("mutation failed: {0}")]
    Mutate(String),

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl StoreError {
    /// True for the retry signal, false for terminal failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Aborted)
    }
}

/// Raw response to a lookup query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub json: Vec<u8>,
}

/// UIDs minted for blank subjects, keyed by label without the `_:` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assigned {
    pub uids: HashMap<String, String>,
}

/// A single store transaction. Not shared across threads.
pub trait Transaction: Sized {
    fn query(&mut self, query: &str) -> Result<Response, StoreError>;

    fn mutate(&mut self, mutation: &Mutation) -> Result<Assigned, StoreError>;

    fn commit(self) -> Result<(), StoreError>;

    fn discard(self);
}

/// Hands out fresh transactions. Cloning yields another handle to the same
/// store, one per worker.
pub trait TxnFactory: Send + Sync {
    type Txn: Transaction;

    fn new_txn(&self) -> Self::Txn;
}
