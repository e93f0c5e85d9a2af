//! The free-function surface over the default allocator and wrapper.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use replica::prelude::*;
use replica_test_utils::{ring, sample_record, walk, CountingMethods};

fn boxed(name: &str) -> Type {
    Type::new_struct(name, vec![FieldDesc::new("p", Type::pointer_to(Type::INT))]).unwrap()
}

fn boxed_value(ty: Type, inner: &Pointer) -> Value {
    StructValue::new(ty)
        .unwrap()
        .with("p", inner.clone())
        .unwrap()
        .into()
}

#[test]
fn clone_and_clone_safely() {
    let record = sample_record(8);
    let copy = replica::clone(&record);
    let p = copy.as_pointer().unwrap();
    assert_eq!(p.field("id").unwrap(), Value::Int(8));
    assert!(!p.ptr_eq(record.as_pointer().unwrap()));

    let r = ring(&["p", "q"]);
    assert_eq!(walk(&replica::clone_safely(&r), 4), vec!["p", "q", "p", "q"]);
}

#[test]
fn process_wide_scalar_mark_reaches_scoped_allocators() {
    let ty = boxed("FacadeScalar");
    let inner = Pointer::to(Value::Int(1));
    let v = boxed_value(ty, &inner);

    let before = replica::from_heap().clone_value(&v);
    let p = before.as_struct().unwrap().field("p").unwrap();
    assert!(!p.as_pointer().unwrap().ptr_eq(&inner));

    assert!(replica::mark_scalar(ty));
    let scoped = replica::new_allocator(Arc::new(CountingMethods::all()), None);
    let after = scoped.clone_value(&v);
    let p = after.as_struct().unwrap().field("p").unwrap();
    assert!(p.as_pointer().unwrap().ptr_eq(&inner));
}

#[test]
fn opaque_pointer_mark() {
    let ty = boxed("FacadeOpaque");
    let ptr_ty = Type::pointer_to(ty);
    assert!(replica::mark_opaque_pointer(ptr_ty));
    assert!(!replica::mark_opaque_pointer(Type::INT));

    let v: Value = Pointer::to(boxed_value(ty, &Pointer::to(Value::Int(0)))).into();
    let copy = replica::clone(&v);
    assert!(copy.as_pointer().unwrap().ptr_eq(v.as_pointer().unwrap()));
}

#[test]
fn override_set_and_removed() {
    let ty = Type::new_struct("FacadeCounter", vec![FieldDesc::new("n", Type::INT)]).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    assert!(replica::set_override(ty, move |cloner, old, new| {
        seen.fetch_add(1, Ordering::SeqCst);
        *new = cloner.clone(old);
    }));

    let v: Value = StructValue::new(ty).unwrap().with("n", 4i64).unwrap().into();
    assert_eq!(replica::clone(&v), v);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(replica::remove_override(ty));
    assert!(!replica::remove_override(ty));
    assert_eq!(replica::clone(&v), v);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn wrap_unwrap_undo() {
    let original = sample_record(2);
    let shadow = replica::wrap(&original);
    let sp = shadow.as_pointer().unwrap();
    sp.set_field("id", Value::Int(-1)).unwrap();
    assert_eq!(
        original.as_pointer().unwrap().field("id").unwrap(),
        Value::Int(2)
    );

    let back = replica::unwrap(&shadow);
    assert!(back.as_pointer().unwrap().ptr_eq(original.as_pointer().unwrap()));

    replica::undo(&shadow);
    assert_eq!(sp.field("id").unwrap(), Value::Int(2));
    assert!(replica::default_wrapper().is_wrapped(&shadow));

    // Unknown inputs are passed through.
    assert!(replica::unwrap(&original)
        .as_pointer()
        .unwrap()
        .ptr_eq(original.as_pointer().unwrap()));
    replica::undo(&original);
}

#[test]
fn arena_through_the_facade() {
    let arena = replica::arena::Arena::new(ArenaConfig::default()).unwrap();
    let copy = arena.clone_in(&sample_record(5));
    assert_eq!(
        copy.as_pointer().unwrap().field("id").unwrap(),
        Value::Int(5)
    );
}
