//! Lookup queries and UID resolution.
//!
//! Before a node is written the pipeline asks the store whether a node with
//! the same unique duples already exists:
//!
//! 1. [`create_query`] writes an equality lookup over the unique duples.
//! 2. [`execute_query`] sends it through a transaction and decodes the
//!    response, skipping the store for the empty query.
//! 3. [`find_decoded_uid`] turns the response into "not found", one UID, or
//!    an ambiguous/malformed match error.
//!
//! [`query_uid`] runs all three.

mod builder;
mod resolve;

pub use builder::{create_query, QuerySink, EMPTY_QUERY, QUERY_BLOCK};
pub use resolve::{execute_query, find_decoded_uid, query_uid, DecodedRecord, QueryDecode};
