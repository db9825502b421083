//! Client-side upsert pipeline for transactional graph stores.
//!
//! Entities are [`DupleNode`]s: an identifier plus predicate/value pairs,
//! some of them marked unique. A run looks every node up by its unique
//! duples, reuses the matched node or creates a new one, writes the
//! duples as triples and commits, across a pool of worker threads with
//! conflict retry and cooperative cancellation.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod mutation;
pub mod node;
pub mod query;
pub mod report;
pub mod store;
pub mod worker;

pub use cache::UidCache;
pub use client::{BatchRun, Client, Operation};
pub use config::{ConfigError, FailurePolicy, UpsertConfig};
pub use error::{QueryError, Result, UpsertError};
pub use mutation::{encode, Mutation, Object, Subject, Triple};
pub use node::{DataType, Duple, DupleNode, Uid, Value};
pub use query::{create_query, query_uid, QuerySink, EMPTY_QUERY};
pub use report::{
    BufferLogger, CounterProgress, Logger, NilLogger, Progress, ProgressUpdate, TracingLogger,
    UpsertEvent,
};
#[cfg(feature = "emitter")]
pub use report::EmitterProgress;
pub use store::{
    Assigned, GraphStats, InMemoryGraph, InMemoryTxn, Response, StoreError, Transaction, TxnFactory,
};
pub use worker::{BatchReport, CancelToken, ItemOutcome, WorkerPackage, WorkerPool};

// Re-export the EventEmitter that EmitterProgress publishes on
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
