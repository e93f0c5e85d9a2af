//! Wrapper isolation and override re-entrancy across threads and nested
//! graphs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use replica_core::{FieldDesc, Type};
use replica_engine::{Allocator, Pointer, StructValue, Value, Wrapper};
use replica_test_utils::{record_type, sample_record};

#[test]
fn wrapper_isolation_holds_for_records() {
    let wrapper = Wrapper::new(Allocator::from_heap());
    let original = sample_record(11);
    let shadow = wrapper.wrap(&original);

    let sp = shadow.as_pointer().unwrap();
    sp.set_field("name", "mutated".into()).unwrap();
    let tags = sp.field("tags").unwrap();
    tags.as_sequence().unwrap().set(1, "gamma".into()).unwrap();

    let op = original.as_pointer().unwrap();
    assert_eq!(op.field("name").unwrap(), Value::from("record-11"));
    let tags = op.field("tags").unwrap();
    assert_eq!(tags.as_sequence().unwrap().get(1).unwrap(), Value::from("beta"));

    assert!(wrapper.unwrap(&shadow).as_pointer().unwrap().ptr_eq(op));

    wrapper.undo(&shadow);
    assert_eq!(sp.field("name").unwrap(), Value::from("record-11"));
    let tags = sp.field("tags").unwrap();
    assert_eq!(tags.as_sequence().unwrap().get(1).unwrap(), Value::from("beta"));
}

#[test]
fn concurrent_wraps_share_one_table() {
    let wrapper = Arc::new(Wrapper::new(Allocator::from_heap()));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let wrapper = wrapper.clone();
            thread::spawn(move || {
                let mut pairs = Vec::new();
                for i in 0..25 {
                    let original = sample_record(t * 100 + i);
                    let shadow = wrapper.wrap(&original);
                    pairs.push((original, shadow));
                }
                for (original, shadow) in &pairs {
                    let back = wrapper.unwrap(shadow);
                    assert!(back
                        .as_pointer()
                        .unwrap()
                        .ptr_eq(original.as_pointer().unwrap()));
                }
                pairs
            })
        })
        .collect();

    let pairs: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(wrapper.len(), 100);
    assert!(pairs.iter().all(|(_, s)| wrapper.is_wrapped(s)));
}

#[test]
fn concurrent_clones_of_one_graph() {
    let allocator = Allocator::from_heap();
    let shared = sample_record(5);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let allocator = allocator.clone();
            let shared = shared.clone();
            thread::spawn(move || allocator.clone_value_safely(&shared))
        })
        .collect();
    for h in handles {
        let cloned = h.join().unwrap();
        let id = cloned.as_pointer().unwrap().field("id").unwrap();
        assert_eq!(id, Value::Int(5));
    }
}

#[test]
fn override_reentry_uses_default_rules_once() {
    let allocator = Allocator::from_heap();
    let ty = record_type();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    allocator.set_override(ty, move |cloner, old, new| {
        seen.fetch_add(1, Ordering::SeqCst);
        *new = cloner.clone(old);
        if let Value::Struct(s) = new {
            s.set_field("name", "overridden".into()).unwrap();
        }
    });

    let cloned = allocator.clone_value(&sample_record(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let p = cloned.as_pointer().unwrap();
    assert_eq!(p.field("name").unwrap(), Value::from("overridden"));
    assert_eq!(p.field("id").unwrap(), Value::Int(1));
    assert!(allocator.remove_override(ty));
}

#[test]
fn override_applies_to_every_nested_instance() {
    let allocator = Allocator::from_heap();
    let leaf = Type::new_struct("Leaf", vec![FieldDesc::new("n", Type::INT)]).unwrap();
    let pair = Type::new_struct(
        "LeafPair",
        vec![
            FieldDesc::new("left", Type::pointer_to(leaf)),
            FieldDesc::new("right", leaf),
        ],
    )
    .unwrap();
    allocator.set_override(leaf, |cloner, old, new| {
        *new = cloner.clone(old);
        if let Value::Struct(s) = new {
            let n = s.field("n").unwrap().as_int().unwrap();
            s.set_field("n", Value::Int(n * 10)).unwrap();
        }
    });

    let leaf_value = |n: i64| -> Value { StructValue::new(leaf).unwrap().with("n", n).unwrap().into() };
    let v: Value = StructValue::new(pair)
        .unwrap()
        .with("left", Pointer::to(leaf_value(1)))
        .unwrap()
        .with("right", leaf_value(2))
        .unwrap()
        .into();

    let cloned = allocator.clone_value(&v);
    let s = cloned.as_struct().unwrap();
    let left = s.field("left").unwrap().as_pointer().unwrap().field("n").unwrap();
    assert_eq!(left, Value::Int(10));
    let right = s.field("right").unwrap().as_struct().unwrap().field("n").unwrap().clone();
    assert_eq!(right, Value::Int(20));
}
