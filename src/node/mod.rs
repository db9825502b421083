//! Entity model: duples, duple nodes and store UIDs.
//!
//! A [`DupleNode`] is one entity to write. Each [`Duple`] is one
//! predicate/value pair; the duples marked unique form the identity key used
//! to find an existing node before creating a new one.
//!
//! ## Example
//!
//! ```
//! use graph_upsert::{Duple, DupleNode};
//!
//! let node = DupleNode::new("alice")
//!     .with(Duple::unique("email", "alice@example.com"))
//!     .with(Duple::new("age", 30));
//!
//! assert_eq!(node.unique().len(), 1);
//! ```

mod duple;
mod uid;
mod value;

pub use duple::{is_valid_predicate, Duple, DupleNode};
pub use uid::Uid;
pub use value::{DataType, Value};

pub(crate) use value::quote;
