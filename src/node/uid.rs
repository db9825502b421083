use std::fmt;

/// Store-assigned identifier for a node.
///
/// `is_new` distinguishes a node created by this run from one that was
/// matched through its unique predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uid {
    value: String,
    is_new: bool,
}

impl Uid {
    /// A UID that already existed in the store.
    pub fn existing(value: impl Into<String>) -> Self {
        Uid {
            value: value.into(),
            is_new: false,
        }
    }

    /// A UID minted by the store for a node created in this run.
    pub fn created(value: impl Into<String>) -> Self {
        Uid {
            value: value.into(),
            is_new: true,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_and_created_flags() {
        let old = Uid::existing("0x1");
        let new = Uid::created("0x2");

        assert_eq!(old.value(), "0x1");
        assert!(!old.is_new());
        assert_eq!(new.value(), "0x2");
        assert!(new.is_new());
        assert_eq!(new.to_string(), "0x2");
    }
}
