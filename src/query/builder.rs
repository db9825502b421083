use std::io;

use crate::error::QueryError;
use crate::node::{is_valid_predicate, DupleNode};

/// Query text of a node with no unique duples. Never sent to the store.
pub const EMPTY_QUERY: &str = "";

/// Name of the single block in every lookup query.
pub const QUERY_BLOCK: &str = "node";

const HEADER: &str = "{\n\tnode(";
const FOOTER: &str = ") {\n\t\tuid\n\t}\n}";

/// Writer-like sink the lookup query is assembled in.
///
/// Writes may fail (a bounded or remote buffer); the builder stops at the
/// first failure.
pub trait QuerySink {
    fn write_str(&mut self, s: &str) -> io::Result<()>;

    /// Everything written since the last reset.
    fn as_str(&self) -> &str;

    fn reset(&mut self);
}

impl QuerySink for String {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.push_str(s);
        Ok(())
    }

    fn as_str(&self) -> &str {
        self
    }

    fn reset(&mut self) {
        self.clear();
    }
}

/// Write the lookup query for `node` into `sink`.
///
/// The root function tests the first unique duple and a filter ANDs the
/// rest, so a match must satisfy every unique predicate:
///
/// ```text
/// {
///     node(func: eq(<email>, "a@b.c")) @filter(eq(<name>, "a") AND eq(<age>, "3")) {
///         uid
///     }
/// }
/// ```
///
/// A node without unique duples leaves the sink untouched, which reads back
/// as [`EMPTY_QUERY`].
pub fn create_query<S: QuerySink + ?Sized>(sink: &mut S, node: &DupleNode) -> Result<(), QueryError> {
    let unique = node.unique();
    if unique.is_empty() {
        return Ok(());
    }
    if let Some(bad) = unique.iter().find(|d| !is_valid_predicate(&d.predicate)) {
        return Err(QueryError::InvalidPredicate {
            predicate: bad.predicate.clone(),
        });
    }

    sink.write_str(HEADER).map_err(QueryError::Write)?;

    for (i, duple) in unique.iter().enumerate() {
        let joiner = match i {
            0 => "func: ",
            1 => ") @filter(",
            _ => " AND ",
        };
        let test = format!(
            "{}eq(<{}>, {})",
            joiner,
            duple.predicate,
            duple.object.quoted()
        );
        sink.write_str(&test).map_err(|source| QueryError::WritePair {
            predicate: duple.predicate.clone(),
            value: duple.object.lexical(),
            source,
        })?;
    }

    sink.write_str(FOOTER).map_err(QueryError::Write)
}
