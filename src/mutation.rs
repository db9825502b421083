//! Mutation encoding: one triple per duple of a node.

use std::fmt;

use crate::error::{Result, UpsertError};
use crate::node::{is_valid_predicate, quote, DataType, DupleNode, Value};

/// Subject of every triple in a node's mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// A node the lookup matched.
    Existing(String),
    /// Placeholder the store binds to a freshly minted UID on commit.
    Blank(String),
}

impl Subject {
    /// Blank subject labelled after a node identifier.
    pub fn blank_for(identifier: &str) -> Self {
        let label: String = identifier
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if label.is_empty() {
            Subject::Blank("node".to_string())
        } else {
            Subject::Blank(label)
        }
    }

    pub fn blank_label(&self) -> Option<&str> {
        match self {
            Subject::Blank(label) => Some(label),
            Subject::Existing(_) => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Existing(uid) => write!(f, "<{}>", uid),
            Subject::Blank(label) => write!(f, "_:{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Object {
    Literal { lexical: String, data_type: DataType },
    /// Edge to another node.
    Uid(String),
}

impl Object {
    /// Text compared by equality lookups.
    pub fn lexical(&self) -> &str {
        match self {
            Object::Literal { lexical, .. } => lexical,
            Object::Uid(uid) => uid,
        }
    }
}

impl From<&Value> for Object {
    fn from(value: &Value) -> Self {
        match value {
            Value::Uid(uid) => Object::Uid(uid.value().to_string()),
            other => Object::Literal {
                lexical: other.lexical(),
                data_type: other.data_type(),
            },
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Literal { lexical, data_type } => {
                write!(f, "{}^^<{}>", quote(lexical), data_type.as_xsd())
            }
            Object::Uid(uid) => write!(f, "<{}>", uid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: Subject,
    pub predicate: String,
    pub object: Object,
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {} .", self.subject, self.predicate, self.object)
    }
}

/// Triple set applied to a transaction in one `mutate` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mutation {
    pub triples: Vec<Triple>,
}

impl Mutation {
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// N-Quad text, one line per triple.
    pub fn to_nquads(&self) -> String {
        self.triples
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Encode every duple of `node` under `subject`. Fails on the first
/// predicate that cannot be written as `<predicate>`.
pub fn encode(node: &DupleNode, subject: &Subject) -> Result<Mutation> {
    let triples = node
        .duples
        .iter()
        .map(|duple| {
            if !is_valid_predicate(&duple.predicate) {
                return Err(UpsertError::InvalidPredicate {
                    predicate: duple.predicate.clone(),
                });
            }
            Ok(Triple {
                subject: subject.clone(),
                predicate: duple.predicate.clone(),
                object: Object::from(&duple.object),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Mutation { triples })
}
