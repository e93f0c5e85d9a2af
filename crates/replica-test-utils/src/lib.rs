//! Test fixtures and counting allocators for Replica development.
//!
//! Provides [`CountingMethods`], an [`AllocatorMethods`] backing store that
//! counts what it is asked for, [`DeepStrings`] which makes text non-scalar,
//! and builders for the graphs the engine tests walk: rings, linked lists
//! and a small record type with every kind of member.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use replica_core::{FieldDesc, Kind, Type};
use replica_engine::{
    AllocatorMethods, Channel, MapValue, Pointer, Sequence, StructValue, Value, Variant,
};

/// Allocation operations a [`CountingMethods`] may provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    New,
    Sequence,
    Map,
    Channel,
}

/// Snapshot of a [`CountingMethods`]' counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub new: usize,
    pub sequences: usize,
    pub maps: usize,
    pub channels: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.new + self.sequences + self.maps + self.channels
    }
}

/// Heap-backed allocator methods that count every request they serve.
///
/// Operations not listed at construction are left unprovided, so an
/// allocator built over these methods defers them to its parent.
pub struct CountingMethods {
    provides: Vec<Op>,
    new: AtomicUsize,
    sequences: AtomicUsize,
    maps: AtomicUsize,
    channels: AtomicUsize,
}

impl CountingMethods {
    /// Provide and count all four operations.
    pub fn all() -> Self {
        Self::only(&[Op::New, Op::Sequence, Op::Map, Op::Channel])
    }

    /// Provide and count only `ops`.
    pub fn only(ops: &[Op]) -> Self {
        Self {
            provides: ops.to_vec(),
            new: AtomicUsize::new(0),
            sequences: AtomicUsize::new(0),
            maps: AtomicUsize::new(0),
            channels: AtomicUsize::new(0),
        }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            new: self.new.load(Ordering::SeqCst),
            sequences: self.sequences.load(Ordering::SeqCst),
            maps: self.maps.load(Ordering::SeqCst),
            channels: self.channels.load(Ordering::SeqCst),
        }
    }

    fn serve(&self, op: Op, counter: &AtomicUsize) -> bool {
        let provided = self.provides.contains(&op);
        if provided {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        provided
    }
}

impl Default for CountingMethods {
    fn default() -> Self {
        Self::all()
    }
}

impl AllocatorMethods for CountingMethods {
    fn new(&self, ty: Type) -> Option<Pointer> {
        self.serve(Op::New, &self.new)
            .then(|| Pointer::to(Value::zero(ty)))
    }

    fn make_sequence(&self, ty: Type, len: usize, cap: usize) -> Option<Sequence> {
        self.serve(Op::Sequence, &self.sequences)
            .then(|| Sequence::make(ty, len, cap))
    }

    fn make_map(&self, ty: Type, hint: usize) -> Option<MapValue> {
        self.serve(Op::Map, &self.maps)
            .then(|| MapValue::with_capacity(ty, hint))
    }

    fn make_channel(&self, ty: Type, cap: usize) -> Option<Channel> {
        self.serve(Op::Channel, &self.channels)
            .then(|| Channel::new(ty, cap))
    }
}

/// Treats text as non-scalar so every string is copied into new storage.
pub struct DeepStrings;

impl AllocatorMethods for DeepStrings {
    fn is_scalar(&self, kind: Kind) -> Option<bool> {
        Some(kind != Kind::Str && kind.is_scalar_by_default())
    }
}

/// `Node { id: str, next: *Node }`, shared by every test in the process.
pub fn node_type() -> Type {
    static NODE: OnceLock<Type> = OnceLock::new();
    *NODE.get_or_init(|| {
        let node = Type::declare_struct("Node");
        node.define_struct(vec![
            FieldDesc::new("id", Type::STR),
            FieldDesc::new("next", Type::pointer_to(node)),
        ])
        .expect("Node definition is valid");
        node
    })
}

fn node(id: &str) -> Pointer {
    let p = Pointer::to(Value::zero(node_type()));
    p.set_field("id", id.into()).expect("Node has an id member");
    p
}

/// A singly linked list with the given ids, returned by its head.
/// The last node's `next` is nil.
pub fn linked_list(ids: &[&str]) -> Value {
    let mut next = Pointer::null(Type::pointer_to(node_type()));
    for id in ids.iter().rev() {
        let p = node(id);
        p.set_field("next", next.into()).expect("next is a *Node");
        next = p;
    }
    next.into()
}

/// A cycle `ids[0] -> ids[1] -> ... -> ids[0]`, returned by its first node.
///
/// The ring leaks when dropped; that is fine in tests.
pub fn ring(ids: &[&str]) -> Value {
    assert!(!ids.is_empty(), "a ring needs at least one node");
    let nodes: Vec<Pointer> = ids.iter().map(|id| node(id)).collect();
    for (i, p) in nodes.iter().enumerate() {
        let next = nodes[(i + 1) % nodes.len()].clone();
        p.set_field("next", next.into()).expect("next is a *Node");
    }
    nodes[0].clone().into()
}

/// Follow `next` from `start`, collecting `steps` ids. Stops early at nil.
pub fn walk(start: &Value, steps: usize) -> Vec<String> {
    let mut ids = Vec::with_capacity(steps);
    let mut current = start.as_pointer().cloned();
    while ids.len() < steps {
        let p = match current {
            Some(p) if !p.is_null() => p,
            _ => break,
        };
        let id = p.field("id").expect("Node has an id member");
        ids.push(id.as_str().map(|s| s.to_string()).unwrap_or_default());
        current = p.field("next").ok().and_then(|v| v.as_pointer().cloned());
    }
    ids
}

/// `Record` with a scalar, a string, a pointer, a sequence, a map, a
/// variant and a channel member.
pub fn record_type() -> Type {
    static RECORD: OnceLock<Type> = OnceLock::new();
    *RECORD.get_or_init(|| {
        Type::new_struct(
            "Record",
            vec![
                FieldDesc::new("id", Type::INT),
                FieldDesc::new("name", Type::STR),
                FieldDesc::new("score", Type::pointer_to(Type::FLOAT)),
                FieldDesc::new("tags", Type::sequence_of(Type::STR)),
                FieldDesc::new("attrs", Type::map_of(Type::STR, Type::INT)),
                FieldDesc::new("extra", Type::ANY),
                FieldDesc::new("events", Type::channel_of(Type::INT)),
            ],
        )
        .expect("Record definition is valid")
    })
}

/// A fully populated `Record` behind a pointer.
pub fn sample_record(id: i64) -> Value {
    let tags = Sequence::from_values(
        Type::sequence_of(Type::STR),
        vec!["alpha".into(), "beta".into()],
    )
    .expect("tags are strings");
    let attrs = MapValue::new(Type::map_of(Type::STR, Type::INT));
    attrs.insert("x".into(), Value::Int(1)).expect("attrs is map[str]int");
    attrs.insert("y".into(), Value::Int(2)).expect("attrs is map[str]int");

    let record = StructValue::new(record_type())
        .and_then(|s| s.with("id", id))
        .and_then(|s| s.with("name", format!("record-{id}")))
        .and_then(|s| s.with("score", Pointer::to(Value::Float(id as f64 * 0.5))))
        .and_then(|s| s.with("tags", tags))
        .and_then(|s| s.with("attrs", attrs))
        .and_then(|s| s.with("extra", Variant::any(Pointer::to(Value::Int(id)))))
        .and_then(|s| s.with("events", Channel::new(Type::channel_of(Type::INT), 2)))
        .expect("Record members are well-typed");
    Pointer::to(record.into()).into()
}

/// A struct made only of scalar members.
pub fn flat_type() -> Type {
    static FLAT: OnceLock<Type> = OnceLock::new();
    *FLAT.get_or_init(|| {
        Type::new_struct(
            "Flat",
            vec![
                FieldDesc::new("a", Type::INT),
                FieldDesc::new("b", Type::FLOAT),
                FieldDesc::new("c", Type::STR),
                FieldDesc::new("d", Type::array_of(Type::UINT, 8)),
            ],
        )
        .expect("Flat definition is valid")
    })
}
