//! Type handles, structural type kinds and struct member descriptors.
//!
//! A [`Type`] is a `Copy` handle into the process-wide type table. It is
//! the self-describing type facility every value points back to: the
//! classifier reads member lists from it, the clone engine dispatches on
//! its [`TypeKind`], allocators receive it to know what to create.
//!
//! ```
//! use replica_core::{FieldDesc, Type};
//!
//! // A linked-list node that points to itself.
//! let node = Type::declare_struct("Node");
//! node.define_struct(vec![
//!     FieldDesc::new("id", Type::INT),
//!     FieldDesc::new("next", Type::pointer_to(node)),
//! ])
//! .unwrap();
//! assert_eq!(node.fields().unwrap().len(), 2);
//! assert_eq!(Type::pointer_to(node), Type::pointer_to(node));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::TypeError;
use crate::kind::Kind;
use crate::table::{table, Shape};

/// Handle to an entry of the process-wide type table.
///
/// Handles are only produced by the table, so every handle is valid for
/// the lifetime of the process. Struct handles may be declared but not yet
/// defined; see [`Type::declare_struct`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(u32);

impl Type {
    /// `bool`.
    pub const BOOL: Type = Type(0);
    /// Signed 64-bit integer.
    pub const INT: Type = Type(1);
    /// Unsigned 64-bit integer.
    pub const UINT: Type = Type(2);
    /// 64-bit float.
    pub const FLOAT: Type = Type(3);
    /// Immutable text.
    pub const STR: Type = Type(4);
    /// Callable.
    pub const FUNC: Type = Type(5);
    /// Raw machine address.
    pub const RAW_ADDR: Type = Type(6);
    /// Handle to a type descriptor.
    pub const TYPE_HANDLE: Type = Type(7);
    /// The universal variant type.
    pub const ANY: Type = Type(8);
    /// Time zone record referenced by [`Type::TIMESTAMP`].
    pub const ZONE: Type = Type(9);
    /// `*Zone`.
    pub const ZONE_PTR: Type = Type(10);
    /// Instant with a time zone. Its `zone` member is an implementation
    /// detail, so default allocators treat the whole struct as scalar.
    pub const TIMESTAMP: Type = Type(11);
    /// The record an allocator allocates for itself.
    pub const ALLOCATOR: Type = Type(12);

    pub(crate) fn from_index(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(i) => Self(i),
            Err(_) => panic!("replica: type table exhausted"),
        }
    }

    /// Position in the type table.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Human-readable name, e.g. `Node`, `*Node`, `map[str]int`.
    pub fn name(self) -> Arc<str> {
        table().entry(self).name.clone()
    }

    /// Flat kind, available even for a declared-but-undefined struct.
    pub fn flat_kind(self) -> Kind {
        table().entry(self).tag
    }

    /// Structural kind, or `None` for a struct declared but not yet defined.
    pub fn try_kind(self) -> Option<TypeKind> {
        table().entry(self).kind.get().cloned()
    }

    /// Structural kind.
    ///
    /// # Panics
    ///
    /// Panics if this is a struct declaration that was never defined.
    /// Reaching that state from the clone engine is an internal
    /// invariant violation.
    pub fn kind(self) -> TypeKind {
        match self.try_kind() {
            Some(kind) => kind,
            None => panic!("replica: <bug> struct '{}' used before definition", self.name()),
        }
    }

    /// Whether the structural kind is known.
    pub fn is_defined(self) -> bool {
        table().entry(self).kind.get().is_some()
    }

    /// `*elem`.
    pub fn pointer_to(elem: Type) -> Type {
        table().intern(Shape::Pointer(elem))
    }

    /// `[]elem`.
    pub fn sequence_of(elem: Type) -> Type {
        table().intern(Shape::Sequence(elem))
    }

    /// `[len]elem`.
    pub fn array_of(elem: Type, len: usize) -> Type {
        table().intern(Shape::Array(elem, len))
    }

    /// `map[key]value`.
    pub fn map_of(key: Type, value: Type) -> Type {
        table().intern(Shape::Map(key, value))
    }

    /// `chan elem`.
    pub fn channel_of(elem: Type) -> Type {
        table().intern(Shape::Channel(elem))
    }

    /// Declare a new nominal struct whose members are supplied later by
    /// [`define_struct`](Self::define_struct).
    ///
    /// Two declarations with the same name are distinct types.
    pub fn declare_struct(name: &str) -> Type {
        table().push(name, Kind::Struct, None)
    }

    /// Declare and define a struct in one step.
    pub fn new_struct(name: &str, fields: Vec<FieldDesc>) -> Result<Type, TypeError> {
        let ty = Self::declare_struct(name);
        ty.define_struct(fields)?;
        Ok(ty)
    }

    /// Declare a new named variant type (an interface-like slot).
    pub fn declare_variant(name: &str) -> Type {
        table().push(name, Kind::Variant, Some(TypeKind::Variant))
    }

    /// Supply the members of a struct declaration. Can be called once.
    pub fn define_struct(self, fields: Vec<FieldDesc>) -> Result<(), TypeError> {
        let entry = table().entry(self);
        if entry.tag != Kind::Struct {
            return Err(TypeError::NotAStruct {
                name: entry.name.to_string(),
                kind: entry.tag,
            });
        }
        if entry.kind.get().is_some() {
            return Err(TypeError::AlreadyDefined {
                name: entry.name.to_string(),
            });
        }

        let mut names = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !names.insert(field.name.as_str()) {
                return Err(TypeError::DuplicateField {
                    name: entry.name.to_string(),
                    field: field.name.clone(),
                });
            }
        }
        if let Some(via) = reaches_by_value(self, &fields) {
            return Err(TypeError::InfiniteSize {
                name: entry.name.to_string(),
                via,
            });
        }

        entry
            .kind
            .set(TypeKind::Struct {
                fields: fields.into(),
            })
            .map_err(|_| TypeError::AlreadyDefined {
                name: entry.name.to_string(),
            })
    }

    /// Element type of a pointer, sequence, array or channel.
    pub fn elem(self) -> Option<Type> {
        match self.try_kind()? {
            TypeKind::Pointer { elem }
            | TypeKind::Sequence { elem }
            | TypeKind::Array { elem, .. }
            | TypeKind::Channel { elem } => Some(elem),
            _ => None,
        }
    }

    /// Members of a defined struct.
    pub fn fields(self) -> Option<Arc<[FieldDesc]>> {
        match self.try_kind()? {
            TypeKind::Struct { fields } => Some(fields),
            _ => None,
        }
    }

    /// Slot index of the named member.
    pub fn field_index(self, name: &str) -> Option<usize> {
        self.fields()?.iter().position(|f| f.name == name)
    }

    /// Follow pointer types down to the first non-pointer type.
    pub fn strip_pointers(self) -> Type {
        let mut ty = self;
        while let Some(TypeKind::Pointer { elem }) = ty.try_kind() {
            ty = elem;
        }
        ty
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Walk the by-value containment graph of `fields` looking for `target`.
/// Returns the top-level member name through which it was reached.
fn reaches_by_value(target: Type, fields: &[FieldDesc]) -> Option<String> {
    for field in fields {
        let mut seen = HashSet::new();
        let mut stack = vec![field.ty];
        while let Some(ty) = stack.pop() {
            if ty == target {
                return Some(field.name.clone());
            }
            if !seen.insert(ty) {
                continue;
            }
            match ty.try_kind() {
                Some(TypeKind::Struct { fields }) => stack.extend(fields.iter().map(|f| f.ty)),
                Some(TypeKind::Array { elem, .. }) => stack.push(elem),
                _ => {}
            }
        }
    }
    None
}

/// Structural description of a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    /// `bool`.
    Bool,
    /// Signed integer.
    Int,
    /// Unsigned integer.
    Uint,
    /// Float.
    Float,
    /// Text.
    Str,
    /// Callable.
    Func,
    /// Raw address.
    RawAddr,
    /// Type descriptor handle.
    TypeHandle,
    /// Pointer to `elem`.
    Pointer {
        /// Referent type.
        elem: Type,
    },
    /// Sequence of `elem`.
    Sequence {
        /// Element type.
        elem: Type,
    },
    /// `len` values of `elem`, stored inline.
    Array {
        /// Element type.
        elem: Type,
        /// Fixed length.
        len: usize,
    },
    /// Associative container.
    Map {
        /// Key type.
        key: Type,
        /// Value type.
        value: Type,
    },
    /// Bounded channel of `elem`.
    Channel {
        /// Element type.
        elem: Type,
    },
    /// Fixed set of members; slot `i` holds `fields[i]`.
    Struct {
        /// Members in slot order.
        fields: Arc<[FieldDesc]>,
    },
    /// Dynamically typed slot.
    Variant,
}

impl TypeKind {
    /// The flat [`Kind`] of this description.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Bool => Kind::Bool,
            Self::Int => Kind::Int,
            Self::Uint => Kind::Uint,
            Self::Float => Kind::Float,
            Self::Str => Kind::Str,
            Self::Func => Kind::Func,
            Self::RawAddr => Kind::RawAddr,
            Self::TypeHandle => Kind::TypeHandle,
            Self::Pointer { .. } => Kind::Pointer,
            Self::Sequence { .. } => Kind::Sequence,
            Self::Array { .. } => Kind::Array,
            Self::Map { .. } => Kind::Map,
            Self::Channel { .. } => Kind::Channel,
            Self::Struct { .. } => Kind::Struct,
            Self::Variant => Kind::Variant,
        }
    }
}

/// Per-member override of the default clone behaviour.
///
/// This is out-of-band metadata attached to a [`FieldDesc`]; values never
/// carry it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CloneDirective {
    /// Clone according to the member's type.
    #[default]
    Default,
    /// Leave the destination member at its zero value; the source member
    /// is never read.
    Omit,
    /// Copy the member by identity regardless of its type.
    Shallow,
}

impl CloneDirective {
    /// Parse a struct-tag style directive: `""` is [`Default`](Self::Default),
    /// `"-"` or `"skip"` is [`Omit`](Self::Omit), `"shadowcopy"` or
    /// `"shallow"` is [`Shallow`](Self::Shallow).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim() {
            "" => Some(Self::Default),
            "-" | "skip" => Some(Self::Omit),
            "shadowcopy" | "shallow" => Some(Self::Shallow),
            _ => None,
        }
    }
}

/// Declaration of one struct member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDesc {
    /// Member name, unique within the struct.
    pub name: String,
    /// Declared type.
    pub ty: Type,
    /// Whether code outside the engine may set this member.
    pub exported: bool,
    /// Clone behaviour for this member.
    pub directive: CloneDirective,
}

impl FieldDesc {
    /// An exported member with the default directive.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            exported: true,
            directive: CloneDirective::Default,
        }
    }

    /// A private member with the default directive.
    pub fn private(name: impl Into<String>, ty: Type) -> Self {
        Self {
            exported: false,
            ..Self::new(name, ty)
        }
    }

    /// Replace the clone directive.
    pub fn with_directive(mut self, directive: CloneDirective) -> Self {
        self.directive = directive;
        self
    }

    /// Shorthand for `with_directive(CloneDirective::Omit)`.
    pub fn omit(self) -> Self {
        self.with_directive(CloneDirective::Omit)
    }

    /// Shorthand for `with_directive(CloneDirective::Shallow)`.
    pub fn shallow(self) -> Self {
        self.with_directive(CloneDirective::Shallow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_types_are_interned() {
        let a = Type::sequence_of(Type::INT);
        let b = Type::sequence_of(Type::INT);
        assert_eq!(a, b);
        assert_eq!(&*a.name(), "[]int");
        assert_ne!(Type::array_of(Type::INT, 3), Type::array_of(Type::INT, 4));
    }

    #[test]
    fn struct_declarations_are_nominal() {
        let a = Type::new_struct("Same", vec![FieldDesc::new("x", Type::INT)]).unwrap();
        let b = Type::new_struct("Same", vec![FieldDesc::new("x", Type::INT)]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn self_pointer_is_allowed() {
        let node = Type::declare_struct("Node");
        assert!(!node.is_defined());
        assert_eq!(node.flat_kind(), Kind::Struct);
        node.define_struct(vec![FieldDesc::new("next", Type::pointer_to(node))])
            .unwrap();
        assert!(node.is_defined());
        assert_eq!(node.field_index("next"), Some(0));
    }

    #[test]
    fn self_containment_by_value_is_rejected() {
        let outer = Type::declare_struct("Outer");
        let inner = Type::new_struct(
            "Inner",
            vec![FieldDesc::new("back", Type::array_of(outer, 2))],
        )
        .unwrap();
        let err = outer
            .define_struct(vec![FieldDesc::new("inner", inner)])
            .unwrap_err();
        assert!(matches!(err, TypeError::InfiniteSize { ref via, .. } if via == "inner"));
        assert!(!outer.is_defined());
    }

    #[test]
    fn define_twice_fails() {
        let t = Type::new_struct("Once", vec![]).unwrap();
        assert!(matches!(
            t.define_struct(vec![]),
            Err(TypeError::AlreadyDefined { .. })
        ));
    }

    #[test]
    fn define_non_struct_fails() {
        assert!(matches!(
            Type::INT.define_struct(vec![]),
            Err(TypeError::NotAStruct { kind: Kind::Int, .. })
        ));
    }

    #[test]
    fn duplicate_member_names_fail() {
        let err = Type::new_struct(
            "Dup",
            vec![FieldDesc::new("a", Type::INT), FieldDesc::new("a", Type::STR)],
        )
        .unwrap_err();
        assert!(matches!(err, TypeError::DuplicateField { .. }));
    }

    #[test]
    fn strip_pointers_reaches_the_pointee() {
        let s = Type::new_struct("Deep", vec![]).unwrap();
        let pp = Type::pointer_to(Type::pointer_to(s));
        assert_eq!(pp.strip_pointers(), s);
        assert_eq!(Type::INT.strip_pointers(), Type::INT);
    }

    #[test]
    fn timestamp_hides_its_zone() {
        let fields = Type::TIMESTAMP.fields().unwrap();
        let zone = &fields[Type::TIMESTAMP.field_index("zone").unwrap()];
        assert!(!zone.exported);
        assert_eq!(zone.ty, Type::ZONE_PTR);
    }

    #[test]
    fn directive_tags_parse() {
        assert_eq!(CloneDirective::parse("-"), Some(CloneDirective::Omit));
        assert_eq!(CloneDirective::parse("skip"), Some(CloneDirective::Omit));
        assert_eq!(
            CloneDirective::parse("shadowcopy"),
            Some(CloneDirective::Shallow)
        );
        assert_eq!(CloneDirective::parse(""), Some(CloneDirective::Default));
        assert_eq!(CloneDirective::parse("deep"), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn array_names_carry_length(len in 0usize..64) {
                let ty = Type::array_of(Type::UINT, len);
                prop_assert_eq!(ty.name().to_string(), format!("[{len}]uint"));
                prop_assert_eq!(ty.kind(), TypeKind::Array { elem: Type::UINT, len });
            }
        }
    }
}
