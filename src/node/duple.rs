use std::collections::HashMap;

use super::value::{self, DataType, Value};
use crate::error::{Result, UpsertError};

/// One attribute of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Duple {
    pub predicate: String,
    pub object: Value,
    /// Part of the entity's identity key for find-or-create matching.
    pub is_unique: bool,
    data_type: DataType,
}

impl Duple {
    pub fn new(predicate: impl Into<String>, object: impl Into<Value>) -> Self {
        let object = object.into();
        Duple {
            predicate: predicate.into(),
            data_type: object.data_type(),
            object,
            is_unique: false,
        }
    }

    /// Same as [`Duple::new`] with `is_unique` set.
    pub fn unique(predicate: impl Into<String>, object: impl Into<Value>) -> Self {
        Duple {
            is_unique: true,
            ..Duple::new(predicate, object)
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Replace the object and re-derive the type tag.
    pub fn set_object(&mut self, object: impl Into<Value>) {
        self.object = object.into();
        self.data_type = self.object.data_type();
    }
}

/// The full set of duples describing one entity.
///
/// `identifier` is a caller-chosen correlation key used for cache lookups
/// within a run; it is never sent to the store as an identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DupleNode {
    pub identifier: String,
    pub duples: Vec<Duple>,
}

impl DupleNode {
    pub fn new(identifier: impl Into<String>) -> Self {
        DupleNode {
            identifier: identifier.into(),
            duples: Vec::new(),
        }
    }

    /// Duples marked unique, in insertion order.
    pub fn unique(&self) -> Vec<&Duple> {
        self.duples.iter().filter(|d| d.is_unique).collect()
    }

    pub fn find(&self, predicate: &str) -> Option<&Duple> {
        self.duples.iter().find(|d| d.predicate == predicate)
    }

    pub fn find_mut(&mut self, predicate: &str) -> Option<&mut Duple> {
        self.duples.iter_mut().find(|d| d.predicate == predicate)
    }

    /// Overwrite the duple with the same predicate, or append it.
    pub fn set_or_add(&mut self, duple: Duple) -> &mut Self {
        if let Some(existing) = self.find_mut(&duple.predicate) {
            existing.set_object(duple.object);
            existing.is_unique = duple.is_unique;
            return self;
        }
        self.add_duples([duple])
    }

    /// Append duples without checking for existing predicates.
    pub fn add_duples(&mut self, duples: impl IntoIterator<Item = Duple>) -> &mut Self {
        self.duples.extend(duples);
        self
    }

    /// Chainable form of [`DupleNode::set_or_add`] for building nodes inline.
    pub fn with(mut self, duple: Duple) -> Self {
        self.set_or_add(duple);
        self
    }

    /// Build a node from string pairs. `predicate_key` is marked unique and
    /// its value becomes the identifier.
    pub fn from_string_map(map: &HashMap<String, String>, predicate_key: &str) -> Result<Self> {
        let identifier = map
            .get(predicate_key)
            .ok_or_else(|| UpsertError::MissingPredicateKey {
                key: predicate_key.to_string(),
            })?;

        let mut node = DupleNode::new(identifier.clone());
        for (predicate, object) in sorted(map) {
            node.add_duples([Duple {
                is_unique: predicate == predicate_key,
                ..Duple::new(predicate.clone(), object.clone())
            }]);
        }
        Ok(node)
    }

    /// Build a node from JSON scalars. Nested values have no triple form and
    /// are rejected.
    pub fn from_dynamic_map(
        map: &HashMap<String, serde_json::Value>,
        predicate_key: &str,
    ) -> Result<Self> {
        let key_value = map
            .get(predicate_key)
            .and_then(value::from_json)
            .ok_or_else(|| UpsertError::MissingPredicateKey {
                key: predicate_key.to_string(),
            })?;

        let mut node = DupleNode::new(key_value.lexical());
        for (predicate, raw) in sorted(map) {
            let object = value::from_json(raw).ok_or_else(|| UpsertError::UnsupportedValue {
                predicate: predicate.clone(),
            })?;
            node.add_duples([Duple {
                is_unique: predicate == predicate_key,
                ..Duple::new(predicate.clone(), object)
            }]);
        }
        Ok(node)
    }
}

/// Whether `predicate` can be written between `<` and `>` in query and
/// mutation text. Empty names, angle brackets, quotes, whitespace and control
/// characters are rejected.
pub fn is_valid_predicate(predicate: &str) -> bool {
    !predicate.is_empty()
        && !predicate
            .chars()
            .any(|c| matches!(c, '<' | '>' | '"') || c.is_whitespace() || c.is_control())
}

// HashMap order is random; sorting keeps query and mutation text stable.
fn sorted<V>(map: &HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut pairs: Vec<_> = map.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
}
