//! Pluggable allocation and the per-allocator registries.
//!
//! An [`Allocator`] resolves every allocation by asking its own
//! [`AllocatorMethods`], then each parent in turn, then the built-in
//! [`Heap`]. Scalar marks, opaque-pointer marks and overrides are looked up
//! the same way, so a child allocator inherits its parents' customization
//! without copying it.

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::{DashMap, DashSet};
use replica_core::{Kind, Type};

use crate::classify::{bump_registry_epoch, CachedMeta};
use crate::custom::{Cloner, OverrideFn};
use crate::value::{Channel, MapValue, Pointer, Sequence, Value};

/// Backing store operations. Every method defaults to "not provided",
/// which defers to the parent allocator and finally to the heap.
///
/// The implementor owns its pool; making that pool thread-safe is the
/// implementor's job.
pub trait AllocatorMethods: Send + Sync {
    /// A pointer to a fresh zero value of `ty`.
    fn new(&self, ty: Type) -> Option<Pointer> {
        let _ = ty;
        None
    }

    /// A fresh sequence of sequence type `ty` with `len` zero elements and
    /// room for `cap`.
    fn make_sequence(&self, ty: Type, len: usize, cap: usize) -> Option<Sequence> {
        let _ = (ty, len, cap);
        None
    }

    /// A fresh, empty, non-nil map of map type `ty` sized for `hint` entries.
    fn make_map(&self, ty: Type, hint: usize) -> Option<MapValue> {
        let _ = (ty, hint);
        None
    }

    /// A fresh, empty channel of channel type `ty` buffering `cap` values.
    fn make_channel(&self, ty: Type, cap: usize) -> Option<Channel> {
        let _ = (ty, cap);
        None
    }

    /// Whether values of `kind` are copied by bit pattern.
    fn is_scalar(&self, kind: Kind) -> Option<bool> {
        let _ = kind;
        None
    }
}

/// The ambient heap. Provides everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Heap;

impl AllocatorMethods for Heap {
    fn new(&self, ty: Type) -> Option<Pointer> {
        Some(Pointer::to(Value::zero(ty)))
    }

    fn make_sequence(&self, ty: Type, len: usize, cap: usize) -> Option<Sequence> {
        Some(Sequence::make(ty, len, cap))
    }

    fn make_map(&self, ty: Type, hint: usize) -> Option<MapValue> {
        Some(MapValue::with_capacity(ty, hint))
    }

    fn make_channel(&self, ty: Type, cap: usize) -> Option<Channel> {
        Some(Channel::new(ty, cap))
    }

    fn is_scalar(&self, kind: Kind) -> Option<bool> {
        Some(kind.is_scalar_by_default())
    }
}

/// A scoped allocation context: backing store, parent chain, metadata
/// cache and registries.
pub struct Allocator {
    methods: Arc<dyn AllocatorMethods>,
    parent: Option<Arc<Allocator>>,
    record: Option<Pointer>,
    pub(crate) structs: DashMap<Type, CachedMeta>,
    scalar_marks: DashSet<Type>,
    opaque_marks: DashSet<Type>,
    overrides: DashMap<Type, OverrideFn>,
}

impl Allocator {
    /// A scoped allocator over `methods`. Without an explicit parent the
    /// process default allocator is the parent.
    ///
    /// The allocator allocates its own `Allocator` record through the
    /// resolved `new`, so a counting or pooling backing store sees it.
    pub fn new(methods: Arc<dyn AllocatorMethods>, parent: Option<Arc<Allocator>>) -> Arc<Self> {
        let parent = parent.unwrap_or_else(Self::default_allocator);
        Self::build(methods, Some(parent))
    }

    /// A heap-backed allocator whose parent is the process default.
    pub fn from_heap() -> Arc<Self> {
        Self::new(Arc::new(Heap), None)
    }

    /// The process default allocator: heap-backed, parent-less, with
    /// `Timestamp` marked scalar.
    pub fn default_allocator() -> Arc<Self> {
        static DEFAULT: OnceLock<Arc<Allocator>> = OnceLock::new();
        DEFAULT
            .get_or_init(|| {
                let allocator = Self::build(Arc::new(Heap), None);
                allocator.mark_scalar(Type::TIMESTAMP);
                allocator
            })
            .clone()
    }

    fn build(methods: Arc<dyn AllocatorMethods>, parent: Option<Arc<Allocator>>) -> Arc<Self> {
        let mut allocator = Self {
            methods,
            parent,
            record: None,
            structs: DashMap::new(),
            scalar_marks: DashSet::new(),
            opaque_marks: DashSet::new(),
            overrides: DashMap::new(),
        };
        allocator.record = Some(allocator.alloc(Type::ALLOCATOR));
        log::debug!(
            "allocator created (depth {})",
            allocator.ancestors().count() - 1
        );
        Arc::new(allocator)
    }

    /// The parent allocator, if any.
    pub fn parent(&self) -> Option<&Arc<Allocator>> {
        self.parent.as_ref()
    }

    /// The record this allocator allocated for itself.
    pub fn record(&self) -> Option<&Pointer> {
        self.record.as_ref()
    }

    /// This allocator followed by each of its parents.
    pub fn ancestors(&self) -> impl Iterator<Item = &Allocator> {
        std::iter::successors(Some(self), |a| a.parent.as_deref())
    }

    fn resolve<T>(&self, op: impl Fn(&dyn AllocatorMethods) -> Option<T>) -> Option<T> {
        self.ancestors().find_map(|a| op(a.methods.as_ref()))
    }

    /// A pointer to a fresh zero value of `ty`.
    ///
    /// # Panics
    ///
    /// Panics if the backing store hands back a nil pointer or one of the
    /// wrong type. Allocation failure is not recoverable.
    pub fn alloc(&self, ty: Type) -> Pointer {
        let p = self
            .resolve(|m| m.new(ty))
            .unwrap_or_else(|| Pointer::to(Value::zero(ty)));
        if p.is_null() || p.elem_type() != ty {
            panic!("replica: allocation failed: new({ty}) returned {p:?}");
        }
        p
    }

    /// A fresh sequence with `len` zero elements and room for `cap`.
    ///
    /// # Panics
    ///
    /// Panics if the backing store hands back a sequence of the wrong
    /// shape.
    pub fn make_sequence(&self, ty: Type, len: usize, cap: usize) -> Sequence {
        let s = self
            .resolve(|m| m.make_sequence(ty, len, cap))
            .unwrap_or_else(|| Sequence::make(ty, len, cap));
        if s.is_nil() || s.ty() != ty || s.len() != len || s.cap() < cap {
            panic!("replica: allocation failed: make_sequence({ty}, {len}, {cap}) returned {s:?}");
        }
        s
    }

    /// A fresh, empty, non-nil map sized for `hint` entries.
    pub fn make_map(&self, ty: Type, hint: usize) -> MapValue {
        let m = self
            .resolve(|m| m.make_map(ty, hint))
            .unwrap_or_else(|| MapValue::with_capacity(ty, hint));
        if m.is_nil() || m.ty() != ty {
            panic!("replica: allocation failed: make_map({ty}, {hint}) returned {m:?}");
        }
        m
    }

    /// A fresh, empty channel buffering `cap` values.
    pub fn make_channel(&self, ty: Type, cap: usize) -> Channel {
        let c = self
            .resolve(|m| m.make_channel(ty, cap))
            .unwrap_or_else(|| Channel::new(ty, cap));
        if c.is_nil() || c.ty() != ty || c.cap() != cap {
            panic!("replica: allocation failed: make_channel({ty}, {cap}) returned {c:?}");
        }
        c
    }

    /// Whether values of `kind` are copied by bit pattern.
    pub fn is_scalar_kind(&self, kind: Kind) -> bool {
        self.resolve(|m| m.is_scalar(kind))
            .unwrap_or_else(|| kind.is_scalar_by_default())
    }

    /// Treat struct `ty` (after stripping pointers) as scalar: its values
    /// are copied without visiting members. Returns `false`, doing
    /// nothing, when `ty` is not a struct.
    pub fn mark_scalar(&self, ty: Type) -> bool {
        let ty = ty.strip_pointers();
        if ty.flat_kind() != Kind::Struct {
            return false;
        }
        self.scalar_marks.insert(ty);
        bump_registry_epoch();
        log::debug!("marked {ty} as scalar");
        true
    }

    /// Treat pointer type `ty` as opaque: its referent is never followed.
    /// Returns `false`, doing nothing, when `ty` is not a pointer type.
    pub fn mark_opaque_pointer(&self, ty: Type) -> bool {
        if ty.flat_kind() != Kind::Pointer {
            return false;
        }
        self.opaque_marks.insert(ty);
        bump_registry_epoch();
        log::debug!("marked {ty} as an opaque pointer");
        true
    }

    /// Clone values of struct `ty` (after stripping pointers) with `f`
    /// instead of member by member.
    ///
    /// `f` receives a [`Cloner`] bound to this allocator, the original and a
    /// zeroed destination it must fill. Returns `false`, doing nothing,
    /// when `ty` is not a struct.
    pub fn set_override<F>(&self, ty: Type, f: F) -> bool
    where
        F: Fn(&Cloner<'_>, &Value, &mut Value) + Send + Sync + 'static,
    {
        self.set_override_fn(ty, Arc::new(f))
    }

    /// [`set_override`](Self::set_override) for an already shared function.
    pub fn set_override_fn(&self, ty: Type, f: OverrideFn) -> bool {
        let ty = ty.strip_pointers();
        if ty.flat_kind() != Kind::Struct {
            return false;
        }
        self.overrides.insert(ty, f);
        bump_registry_epoch();
        log::debug!("override set for {ty}");
        true
    }

    /// Drop the override registered on this allocator for `ty`.
    pub fn remove_override(&self, ty: Type) -> bool {
        let ty = ty.strip_pointers();
        let removed = self.overrides.remove(&ty).is_some();
        if removed {
            bump_registry_epoch();
            log::debug!("override removed for {ty}");
        }
        removed
    }

    pub(crate) fn is_marked_scalar(&self, ty: Type) -> bool {
        self.ancestors().any(|a| a.scalar_marks.contains(&ty))
    }

    pub(crate) fn is_opaque(&self, ty: Type) -> bool {
        self.ancestors().any(|a| a.opaque_marks.contains(&ty))
    }

    pub(crate) fn override_for(&self, ty: Type) -> Option<OverrideFn> {
        self.ancestors()
            .find_map(|a| a.overrides.get(&ty).map(|f| Arc::clone(&f)))
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("depth", &(self.ancestors().count() - 1))
            .field("cached_structs", &self.structs.len())
            .field("scalar_marks", &self.scalar_marks.len())
            .field("opaque_marks", &self.opaque_marks.len())
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_core::FieldDesc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ChannelsOnly {
        channels: AtomicUsize,
    }

    impl AllocatorMethods for ChannelsOnly {
        fn make_channel(&self, ty: Type, cap: usize) -> Option<Channel> {
            self.channels.fetch_add(1, Ordering::Relaxed);
            Some(Channel::new(ty, cap))
        }
    }

    #[test]
    fn default_marks_timestamp_scalar() {
        let a = Allocator::default_allocator();
        assert!(a.is_marked_scalar(Type::TIMESTAMP));
        assert!(a.parent().is_none());
        assert!(Arc::ptr_eq(&a, &Allocator::default_allocator()));
    }

    #[test]
    fn from_heap_inherits_default_marks() {
        let a = Allocator::from_heap();
        assert!(a.is_marked_scalar(Type::TIMESTAMP));
        assert_eq!(a.ancestors().count(), 2);
    }

    #[test]
    fn allocator_allocates_its_own_record() {
        let a = Allocator::from_heap();
        let record = a.record().unwrap();
        assert_eq!(record.elem_type(), Type::ALLOCATOR);
    }

    #[test]
    fn unprovided_operations_fall_through() {
        let methods = Arc::new(ChannelsOnly::default());
        let a = Allocator::new(methods.clone(), None);
        let chan = a.make_channel(Type::channel_of(Type::INT), 3);
        assert_eq!(chan.cap(), 3);
        assert_eq!(methods.channels.load(Ordering::Relaxed), 1);
        let seq = a.make_sequence(Type::sequence_of(Type::INT), 2, 5);
        assert_eq!((seq.len(), seq.cap()), (2, 5));
        assert!(a.is_scalar_kind(Kind::Str));
    }

    #[test]
    fn registry_calls_ignore_the_wrong_shape() {
        let a = Allocator::from_heap();
        assert!(!a.mark_scalar(Type::INT));
        assert!(!a.mark_opaque_pointer(Type::INT));
        assert!(!a.set_override(Type::STR, |_, _, _| {}));
        assert!(!a.remove_override(Type::STR));
    }

    #[test]
    fn marks_are_visible_from_children() {
        let parent = Allocator::from_heap();
        let child = Allocator::new(Arc::new(Heap), Some(parent.clone()));
        let s = Type::new_struct("Marked", vec![FieldDesc::new("p", Type::pointer_to(Type::INT))])
            .unwrap();
        assert!(parent.mark_scalar(Type::pointer_to(s)));
        assert!(child.is_marked_scalar(s));
        assert!(!Allocator::default_allocator().is_marked_scalar(s));

        let opaque = Type::pointer_to(Type::FLOAT);
        parent.mark_opaque_pointer(opaque);
        assert!(child.is_opaque(opaque));
    }

    #[test]
    fn overrides_can_be_removed() {
        let a = Allocator::from_heap();
        let s = Type::new_struct("Overridden", vec![]).unwrap();
        assert!(a.set_override(s, |_, old, new| *new = old.clone()));
        assert!(a.override_for(s).is_some());
        assert!(a.remove_override(s));
        assert!(a.override_for(s).is_none());
    }

    #[test]
    #[should_panic(expected = "allocation failed")]
    fn wrong_typed_allocation_is_fatal() {
        struct Broken;
        impl AllocatorMethods for Broken {
            fn new(&self, _ty: Type) -> Option<Pointer> {
                Some(Pointer::to(Value::Int(0)))
            }
        }
        let _ = Allocator::new(Arc::new(Broken), None);
    }
}
