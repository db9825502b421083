//! Error types for the upsert pipeline.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Alias for Results returning [`UpsertError`].
pub type Result<T> = std::result::Result<T, UpsertError>;

/// Failures while building, running or decoding a lookup query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The sink failed outside of a predicate/value pair (header or footer).
    #[error("failed writing query: {0}")]
    Write(#[source] io::Error),

    #[error("failed writing predicate {predicate} with value {value}: {source}")]
    WritePair {
        predicate: String,
        value: String,
        #[source]
        source: io::Error,
    },

    #[error("{function}: store rejected query {query:?}: {source}")]
    Store {
        function: &'static str,
        query: String,
        #[source]
        source: StoreError,
    },

    #[error("{function}: cannot decode response to {query:?}: {source}")]
    Decode {
        function: &'static str,
        query: String,
        #[source]
        source: serde_json::Error,
    },

    /// A unique predicate cannot be written into the query text.
    #[error("invalid predicate {predicate:?} in lookup query")]
    InvalidPredicate { predicate: String },

    /// More than one node matched the unique predicates.
    #[error("{function}: too many nodes matched the unique predicates")]
    TooManyResponses { function: &'static str },

    /// A node matched but the response carried no uid for it.
    #[error("{function}: matched node has no uid")]
    NilUid { function: &'static str },
}

/// Top-level error for a single item or a whole run.
#[derive(Debug, Error)]
pub enum UpsertError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("mutation for {identifier} failed: {source}")]
    Mutate {
        identifier: String,
        #[source]
        source: StoreError,
    },

    #[error("commit for {identifier} failed: {source}")]
    Commit {
        identifier: String,
        #[source]
        source: StoreError,
    },

    #[error("store assigned no uid to new node {identifier}")]
    MissingAssignedUid { identifier: String },

    #[error("gave up on {identifier} after {attempts} conflicting attempts")]
    RetriesExhausted { identifier: String, attempts: usize },

    #[error("uid cache lock poisoned")]
    CachePoisoned,

    #[error("map is missing predicate key {key:?}")]
    MissingPredicateKey { key: String },

    #[error("predicate {predicate} holds a value with no triple form")]
    UnsupportedValue { predicate: String },

    #[error("invalid predicate {predicate:?} in mutation")]
    InvalidPredicate { predicate: String },

    #[error("upsert run cancelled")]
    Cancelled,

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl UpsertError {
    /// Ambiguous or malformed matches need the caller to fix the data.
    pub fn is_match_error(&self) -> bool {
        matches!(
            self,
            UpsertError::Query(QueryError::TooManyResponses { .. })
                | UpsertError::Query(QueryError::NilUid { .. })
        )
    }
}
