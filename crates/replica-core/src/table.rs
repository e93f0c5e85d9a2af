//! The process-wide, append-only type table behind [`Type`] handles.
//!
//! Entries are never removed. Structural types (pointer, sequence, array,
//! map, channel) are interned by shape so equal shapes share one handle;
//! struct and variant declarations are nominal and always get a fresh entry.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::kind::Kind;
use crate::types::{FieldDesc, Type, TypeKind};

/// One row of the type table.
pub(crate) struct Entry {
    pub(crate) name: Arc<str>,
    /// Known from declaration, even before a struct is defined.
    pub(crate) tag: Kind,
    pub(crate) kind: OnceLock<TypeKind>,
}

/// Interning key for structural types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Shape {
    Pointer(Type),
    Sequence(Type),
    Array(Type, usize),
    Map(Type, Type),
    Channel(Type),
}

pub(crate) struct TypeTable {
    entries: RwLock<Vec<Arc<Entry>>>,
    shapes: DashMap<Shape, Type>,
}

static TABLE: OnceLock<TypeTable> = OnceLock::new();

/// The process-wide table, bootstrapped with the predefined types on first use.
pub(crate) fn table() -> &'static TypeTable {
    TABLE.get_or_init(TypeTable::bootstrap)
}

impl TypeTable {
    fn bootstrap() -> Self {
        let table = Self {
            entries: RwLock::new(Vec::with_capacity(64)),
            shapes: DashMap::new(),
        };

        // Push order must match the `Type::*` constants.
        table.push("bool", Kind::Bool, Some(TypeKind::Bool));
        table.push("int", Kind::Int, Some(TypeKind::Int));
        table.push("uint", Kind::Uint, Some(TypeKind::Uint));
        table.push("float", Kind::Float, Some(TypeKind::Float));
        table.push("str", Kind::Str, Some(TypeKind::Str));
        table.push("func", Kind::Func, Some(TypeKind::Func));
        table.push("raw_addr", Kind::RawAddr, Some(TypeKind::RawAddr));
        table.push("type", Kind::TypeHandle, Some(TypeKind::TypeHandle));
        table.push("any", Kind::Variant, Some(TypeKind::Variant));

        let zone_fields: Arc<[FieldDesc]> = vec![FieldDesc::new("name", Type::STR)].into();
        table.push(
            "Zone",
            Kind::Struct,
            Some(TypeKind::Struct {
                fields: zone_fields,
            }),
        );
        let zone_ptr = table.intern(Shape::Pointer(Type::ZONE));

        let timestamp_fields: Arc<[FieldDesc]> = vec![
            FieldDesc::private("secs", Type::INT),
            FieldDesc::private("nanos", Type::INT),
            FieldDesc::private("zone", zone_ptr),
        ]
        .into();
        table.push(
            "Timestamp",
            Kind::Struct,
            Some(TypeKind::Struct {
                fields: timestamp_fields,
            }),
        );
        table.push(
            "Allocator",
            Kind::Struct,
            Some(TypeKind::Struct {
                fields: Vec::new().into(),
            }),
        );

        debug_assert_eq!(zone_ptr, Type::ZONE_PTR);
        debug_assert_eq!(table.entries.read().len(), Type::ALLOCATOR.index() + 1);
        table
    }

    pub(crate) fn push(&self, name: &str, tag: Kind, kind: Option<TypeKind>) -> Type {
        let entry = Entry {
            name: name.into(),
            tag,
            kind: OnceLock::new(),
        };
        if let Some(kind) = kind {
            let _ = entry.kind.set(kind);
        }
        let mut entries = self.entries.write();
        let ty = Type::from_index(entries.len());
        entries.push(Arc::new(entry));
        ty
    }

    pub(crate) fn entry(&self, ty: Type) -> Arc<Entry> {
        let entries = self.entries.read();
        match entries.get(ty.index()) {
            Some(entry) => Arc::clone(entry),
            None => panic!("replica: <bug> type handle {} is not in the table", ty.index()),
        }
    }

    pub(crate) fn intern(&self, shape: Shape) -> Type {
        if let Some(ty) = self.shapes.get(&shape) {
            return *ty;
        }
        *self.shapes.entry(shape).or_insert_with(|| {
            let (name, tag, kind) = self.describe(shape);
            self.push(&name, tag, Some(kind))
        })
    }

    fn describe(&self, shape: Shape) -> (String, Kind, TypeKind) {
        let name_of = |ty: Type| self.entry(ty).name.clone();
        match shape {
            Shape::Pointer(elem) => (
                format!("*{}", name_of(elem)),
                Kind::Pointer,
                TypeKind::Pointer { elem },
            ),
            Shape::Sequence(elem) => (
                format!("[]{}", name_of(elem)),
                Kind::Sequence,
                TypeKind::Sequence { elem },
            ),
            Shape::Array(elem, len) => (
                format!("[{len}]{}", name_of(elem)),
                Kind::Array,
                TypeKind::Array { elem, len },
            ),
            Shape::Map(key, value) => (
                format!("map[{}]{}", name_of(key), name_of(value)),
                Kind::Map,
                TypeKind::Map { key, value },
            ),
            Shape::Channel(elem) => (
                format!("chan {}", name_of(elem)),
                Kind::Channel,
                TypeKind::Channel { elem },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_names_line_up_with_constants() {
        let t = table();
        assert_eq!(&*t.entry(Type::BOOL).name, "bool");
        assert_eq!(&*t.entry(Type::ANY).name, "any");
        assert_eq!(&*t.entry(Type::ZONE_PTR).name, "*Zone");
        assert_eq!(&*t.entry(Type::TIMESTAMP).name, "Timestamp");
        assert_eq!(&*t.entry(Type::ALLOCATOR).name, "Allocator");
    }

    #[test]
    fn interning_is_stable() {
        let t = table();
        let a = t.intern(Shape::Map(Type::STR, Type::INT));
        let b = t.intern(Shape::Map(Type::STR, Type::INT));
        assert_eq!(a, b);
        assert_eq!(&*t.entry(a).name, "map[str]int");
    }
}
