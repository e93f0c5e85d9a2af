//! The flat [`Kind`] classification of types.

use std::fmt;

/// Flat classification of a [`Type`](crate::Type), without its parameters.
///
/// This is what scalar predicates look at: an allocator decides per
/// `Kind` whether values are bit-copied or recursed into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// `true` / `false`.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// Unsigned 64-bit integer.
    Uint,
    /// 64-bit float.
    Float,
    /// Immutable text.
    Str,
    /// An indivisible callable.
    Func,
    /// A raw machine address, never dereferenced.
    RawAddr,
    /// A handle to a type descriptor.
    TypeHandle,
    /// Owns or aliases exactly one referent.
    Pointer,
    /// Growable, ordered, possibly with spare capacity.
    Sequence,
    /// Fixed-length sequence embedded by value.
    Array,
    /// Unordered key to value mapping.
    Map,
    /// Handle to a bounded communication buffer.
    Channel,
    /// Fixed set of named members.
    Struct,
    /// Carries its own dynamic type plus payload.
    Variant,
}

impl Kind {
    /// Whether values of this kind are copied by bit pattern unless an
    /// allocator says otherwise.
    pub fn is_scalar_by_default(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Int
                | Self::Uint
                | Self::Float
                | Self::Str
                | Self::Func
                | Self::RawAddr
                | Self::TypeHandle
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Str => "str",
            Self::Func => "func",
            Self::RawAddr => "raw_addr",
            Self::TypeHandle => "type",
            Self::Pointer => "pointer",
            Self::Sequence => "sequence",
            Self::Array => "array",
            Self::Map => "map",
            Self::Channel => "channel",
            Self::Struct => "struct",
            Self::Variant => "variant",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_leaf_kinds_are_scalar() {
        assert!(Kind::Str.is_scalar_by_default());
        assert!(Kind::Func.is_scalar_by_default());
        assert!(!Kind::Pointer.is_scalar_by_default());
        assert!(!Kind::Struct.is_scalar_by_default());
        assert!(!Kind::Variant.is_scalar_by_default());
    }
}
