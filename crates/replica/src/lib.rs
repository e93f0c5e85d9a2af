//! Replica: deep cloning of cyclic object graphs.
//!
//! This is the top-level facade crate. It re-exports the sub-crates and
//! offers free functions over the process default [`Allocator`] and a
//! process-wide [`Wrapper`].
//!
//! # Quick start
//!
//! ```rust
//! use replica::prelude::*;
//!
//! let point = Type::new_struct(
//!     "Point",
//!     vec![FieldDesc::new("x", Type::INT), FieldDesc::new("label", Type::pointer_to(Type::STR))],
//! )
//! .unwrap();
//! let original: Value = Pointer::to(
//!     StructValue::new(point)
//!         .unwrap()
//!         .with("x", 3i64)
//!         .unwrap()
//!         .with("label", Pointer::to("origin".into()))
//!         .unwrap()
//!         .into(),
//! )
//! .into();
//!
//! let copy = replica::clone(&original);
//! assert_eq!(copy, original);
//! assert!(!copy.as_pointer().unwrap().ptr_eq(original.as_pointer().unwrap()));
//!
//! // Copy-on-write: mutate the shadow, recover the original.
//! let shadow = replica::wrap(&original);
//! shadow.as_pointer().unwrap().set_field("x", Value::Int(99)).unwrap();
//! assert_eq!(original.as_pointer().unwrap().field("x").unwrap(), Value::Int(3));
//! assert!(replica::unwrap(&shadow).as_pointer().unwrap().ptr_eq(original.as_pointer().unwrap()));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `replica-core` | Type table, member descriptors, errors |
//! | [`engine`] | `replica-engine` | Values, allocators, clone engine, overrides, wrapper |
//! | [`arena`] | `replica-arena` | Bump-arena backing store |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::sync::{Arc, OnceLock};

/// Type table, member descriptors and errors (`replica-core`).
pub use replica_core as types;

/// Value model, allocators, clone engine and wrapper (`replica-engine`).
pub use replica_engine as engine;

/// Bump-arena backing store (`replica-arena`).
pub use replica_arena as arena;

use replica_core::Type;
use replica_engine::{Allocator, AllocatorMethods, Cloner, Value, Wrapper};

/// Common imports for typical Replica usage.
///
/// ```rust
/// use replica::prelude::*;
/// ```
pub mod prelude {
    // Types
    pub use replica_core::{CloneDirective, FieldDesc, Kind, Type, TypeError, ValueError};

    // Values
    pub use replica_engine::{
        ArrayValue, Channel, Func, MapValue, Pointer, Sequence, StructValue, Value, Variant,
    };

    // Allocation and cloning
    pub use replica_engine::{Allocator, AllocatorMethods, Cloner, Heap, Wrapper, WrapperConfig};

    // Arena
    pub use replica_arena::{Arena, ArenaConfig};
}

/// The process default allocator every other allocator descends from.
pub fn default_allocator() -> Arc<Allocator> {
    Allocator::default_allocator()
}

/// The process-wide wrapper behind [`wrap`], [`unwrap`] and [`undo`].
pub fn default_wrapper() -> &'static Wrapper {
    static WRAPPER: OnceLock<Wrapper> = OnceLock::new();
    WRAPPER.get_or_init(|| Wrapper::new(default_allocator()))
}

/// Fast deep clone of `value` with the default allocator. Shared
/// references are duplicated and cycles do not terminate; use
/// [`clone_safely`] for those.
pub fn clone(value: &Value) -> Value {
    default_allocator().clone_value(value)
}

/// Deep clone of `value` that preserves aliasing and reproduces cycles.
pub fn clone_safely(value: &Value) -> Value {
    default_allocator().clone_value_safely(value)
}

/// Copy struct `ty` by value from now on, process-wide.
pub fn mark_scalar(ty: Type) -> bool {
    default_allocator().mark_scalar(ty)
}

/// Share the referent of pointer type `ty` instead of copying it,
/// process-wide.
pub fn mark_opaque_pointer(ty: Type) -> bool {
    default_allocator().mark_opaque_pointer(ty)
}

/// Clone struct `ty` with `f` instead of member by member, process-wide.
pub fn set_override<F>(ty: Type, f: F) -> bool
where
    F: Fn(&Cloner<'_>, &Value, &mut Value) + Send + Sync + 'static,
{
    default_allocator().set_override(ty, f)
}

/// Drop the process-wide override for `ty`.
pub fn remove_override(ty: Type) -> bool {
    default_allocator().remove_override(ty)
}

/// Copy-on-write shadow of a pointer to a struct. See [`Wrapper::wrap`].
pub fn wrap(value: &Value) -> Value {
    default_wrapper().wrap(value)
}

/// The original behind a shadow from [`wrap`], else `value` itself.
pub fn unwrap(value: &Value) -> Value {
    default_wrapper().unwrap(value)
}

/// Reset a shadow from [`wrap`] to a fresh copy of its original.
pub fn undo(value: &Value) {
    default_wrapper().undo(value)
}

/// A heap-backed allocator scoped under the default one.
pub fn from_heap() -> Arc<Allocator> {
    Allocator::from_heap()
}

/// A scoped allocator over `methods`, under `parent` or the default
/// allocator.
pub fn new_allocator(
    methods: Arc<dyn AllocatorMethods>,
    parent: Option<Arc<Allocator>>,
) -> Arc<Allocator> {
    Allocator::new(methods, parent)
}
