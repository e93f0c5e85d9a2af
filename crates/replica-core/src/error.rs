//! Error types for the Replica cloning engine.
//!
//! Only recoverable, caller-facing conditions live here: building types
//! and accessing values through the checked API. Internal invariant
//! violations and allocation failure are not errors; they panic.

use std::error::Error;
use std::fmt;

use crate::kind::Kind;

/// Errors from building entries in the type table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeError {
    /// `define_struct` was called twice for the same declaration.
    AlreadyDefined {
        /// Name of the struct.
        name: String,
    },
    /// `define_struct` was called on a type that is not a struct declaration.
    NotAStruct {
        /// Name of the offending type.
        name: String,
        /// Its actual kind.
        kind: Kind,
    },
    /// The struct would contain itself by value.
    InfiniteSize {
        /// Name of the struct.
        name: String,
        /// Member through which the struct reaches itself.
        via: String,
    },
    /// Two members share a name.
    DuplicateField {
        /// Name of the struct.
        name: String,
        /// The repeated member name.
        field: String,
    },
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyDefined { name } => write!(f, "struct '{name}' is already defined"),
            Self::NotAStruct { name, kind } => {
                write!(f, "type '{name}' is a {kind}, not a struct declaration")
            }
            Self::InfiniteSize { name, via } => {
                write!(f, "struct '{name}' contains itself by value through '{via}'")
            }
            Self::DuplicateField { name, field } => {
                write!(f, "struct '{name}' declares member '{field}' twice")
            }
        }
    }
}

impl Error for TypeError {}

/// Errors from the checked value accessors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueError {
    /// A value of one type was supplied where another was required.
    TypeMismatch {
        /// Name of the expected type.
        expected: String,
        /// Name of the supplied type.
        found: String,
    },
    /// The struct has no member with this name.
    UnknownField {
        /// Name of the struct.
        ty: String,
        /// The requested member.
        field: String,
    },
    /// The member exists but is private and cannot be set.
    FieldNotExported {
        /// Name of the struct.
        ty: String,
        /// The private member.
        field: String,
    },
    /// Index past the end of a sequence or array.
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The length of the container.
        len: usize,
    },
    /// The key is not comparable and cannot be used in a map.
    UnhashableKey {
        /// Kind of the rejected key.
        kind: Kind,
    },
    /// The operation needs a referent but the handle is absent.
    NilDereference {
        /// Kind of the absent handle.
        kind: Kind,
    },
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Self::UnknownField { ty, field } => write!(f, "{ty} has no member '{field}'"),
            Self::FieldNotExported { ty, field } => {
                write!(f, "member '{field}' of {ty} is not exported")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::UnhashableKey { kind } => write!(f, "{kind} values cannot be map keys"),
            Self::NilDereference { kind } => write!(f, "nil {kind} has no referent"),
        }
    }
}

impl Error for ValueError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_member() {
        let err = ValueError::FieldNotExported {
            ty: "Timestamp".into(),
            field: "zone".into(),
        };
        assert_eq!(err.to_string(), "member 'zone' of Timestamp is not exported");
    }

    #[test]
    fn infinite_size_mentions_path() {
        let err = TypeError::InfiniteSize {
            name: "Loop".into(),
            via: "inner".into(),
        };
        assert!(err.to_string().contains("through 'inner'"));
    }
}
