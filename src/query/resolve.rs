use std::collections::HashMap;

use serde::Deserialize;

use super::builder::{create_query, QuerySink, EMPTY_QUERY};
use crate::error::QueryError;
use crate::node::DupleNode;
use crate::store::Transaction;

/// One matched record of a lookup response. A missing `uid` field decodes
/// to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DecodedRecord {
    #[serde(default)]
    pub uid: Option<String>,
}

/// Lookup response: block name to matched records.
pub type QueryDecode = HashMap<String, Vec<DecodedRecord>>;

/// Build the lookup for `node` in `sink` and run it through `txn`,
/// replacing the contents of `decoded` with the response.
///
/// The empty query is never sent; `decoded` is left empty and the node
/// counts as not found.
pub fn execute_query<T, S>(
    txn: &mut T,
    sink: &mut S,
    node: &DupleNode,
    decoded: &mut QueryDecode,
) -> Result<(), QueryError>
where
    T: Transaction,
    S: QuerySink + ?Sized,
{
    decoded.clear();
    sink.reset();
    create_query(sink, node)?;

    let query = sink.as_str();
    if query == EMPTY_QUERY {
        return Ok(());
    }

    let response = txn.query(query).map_err(|source| QueryError::Store {
        function: "execute_query",
        query: query.to_string(),
        source,
    })?;

    *decoded = serde_json::from_slice(&response.json).map_err(|source| QueryError::Decode {
        function: "execute_query",
        query: query.to_string(),
        source,
    })?;

    Ok(())
}

/// Decide between not found, one existing UID, or an error, over all blocks
/// of `decoded` combined.
pub fn find_decoded_uid(decoded: &QueryDecode) -> Result<Option<String>, QueryError> {
    let mut records = decoded.values().flatten();

    let Some(first) = records.next() else {
        return Ok(None);
    };

    if records.next().is_some() {
        return Err(QueryError::TooManyResponses {
            function: "find_decoded_uid",
        });
    }

    match first.uid.as_deref() {
        Some(uid) if !uid.is_empty() => Ok(Some(uid.to_string())),
        _ => Err(QueryError::NilUid {
            function: "find_decoded_uid",
        }),
    }
}

/// UID of the existing node matching `node`'s unique duples, or `None`.
pub fn query_uid<T, S>(txn: &mut T, sink: &mut S, node: &DupleNode) -> Result<Option<String>, QueryError>
where
    T: Transaction,
    S: QuerySink + ?Sized,
{
    let mut decoded = QueryDecode::new();
    execute_query(txn, sink, node, &mut decoded)?;
    find_decoded_uid(&decoded)
}
