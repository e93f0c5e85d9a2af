//! Per-type clone overrides.
//!
//! An override replaces the member-wise copy of one struct type. It gets a
//! [`Cloner`] so it can clone sub-parts, or the whole original under the
//! default rules, without re-entering itself.
//!
//! ```
//! use replica_core::{FieldDesc, Type};
//! use replica_engine::{Allocator, Pointer, StructValue, Value};
//!
//! let session = Type::new_struct(
//!     "Session",
//!     vec![FieldDesc::new("id", Type::INT), FieldDesc::new("token", Type::STR)],
//! )
//! .unwrap();
//! let allocator = Allocator::from_heap();
//! allocator.set_override(session, |cloner, old, new| {
//!     // Default copy, then scrub the token.
//!     *new = cloner.clone(old);
//!     if let Value::Struct(s) = new {
//!         s.set_field("token", Value::from("")).unwrap();
//!     }
//! });
//!
//! let original = StructValue::new(session).unwrap().with("id", 7i64).unwrap().with("token", "secret").unwrap();
//! let copy = allocator.clone_value(&Pointer::to(original.into()).into());
//! let copy = copy.as_pointer().unwrap();
//! assert_eq!(copy.field("id").unwrap(), Value::Int(7));
//! assert_eq!(copy.field("token").unwrap(), Value::from(""));
//! ```

use std::sync::Arc;

use crate::alloc::Allocator;
use crate::engine::CloneState;
use crate::value::Value;

/// A shared override: `(cloner, original, zeroed destination)`.
pub type OverrideFn = Arc<dyn Fn(&Cloner<'_>, &Value, &mut Value) + Send + Sync>;

/// Handle back into the clone engine, bound to one allocator.
///
/// Each call starts a fresh top-level clone in which the argument itself
/// bypasses its own override. Overrides of every other value still apply.
pub struct Cloner<'a> {
    allocator: &'a Allocator,
}

impl<'a> Cloner<'a> {
    pub(crate) fn new(allocator: &'a Allocator) -> Self {
        Self { allocator }
    }

    /// The allocator the override runs under.
    pub fn allocator(&self) -> &'a Allocator {
        self.allocator
    }

    /// Fast clone of `value`, skipping `value`'s own override.
    pub fn clone(&self, value: &Value) -> Value {
        CloneState::new(self.allocator, false)
            .excluding(value)
            .clone_value(value)
    }

    /// Cycle-safe clone of `value`, skipping `value`'s own override.
    pub fn clone_safely(&self, value: &Value) -> Value {
        CloneState::new(self.allocator, true)
            .excluding(value)
            .clone_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Pointer, StructValue};
    use replica_core::{FieldDesc, Type};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn self_clone_inside_override_terminates() {
        let ty = Type::new_struct(
            "Counted",
            vec![
                FieldDesc::new("n", Type::INT),
                FieldDesc::new("p", Type::pointer_to(Type::INT)),
            ],
        )
        .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let allocator = Allocator::from_heap();
        let seen = calls.clone();
        allocator.set_override(ty, move |cloner, old, new| {
            seen.fetch_add(1, Ordering::Relaxed);
            *new = cloner.clone(old);
        });

        let p = Pointer::to(Value::Int(3));
        let original = StructValue::new(ty)
            .unwrap()
            .with("n", 1i64)
            .unwrap()
            .with("p", p.clone())
            .unwrap();
        let copy = allocator.clone_value(&original.into());
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        let copied_p = copy.as_struct().unwrap().field("p").unwrap().as_pointer().unwrap().clone();
        assert!(!copied_p.ptr_eq(&p));
        assert_eq!(copied_p.load().unwrap(), Value::Int(3));
    }

    #[test]
    fn override_sees_zeroed_destination() {
        let ty = Type::new_struct("Zeroed", vec![FieldDesc::new("n", Type::INT)]).unwrap();
        let allocator = Allocator::from_heap();
        allocator.set_override(ty, |_, old, new| {
            assert_eq!(new.as_struct().unwrap().field("n").unwrap(), &Value::Int(0));
            *new = old.clone();
        });
        let v: Value = StructValue::new(ty).unwrap().with("n", 9i64).unwrap().into();
        assert_eq!(allocator.clone_value(&v), v);
    }

    #[test]
    #[should_panic(expected = "<bug>")]
    fn override_changing_the_type_is_a_bug() {
        let ty = Type::new_struct("Retyped", vec![]).unwrap();
        let allocator = Allocator::from_heap();
        allocator.set_override(ty, |_, _, new| *new = Value::Int(1));
        let _ = allocator.clone_value(&StructValue::new(ty).unwrap().into());
    }
}
