//! Struct classification and the per-allocator metadata cache.
//!
//! Classifying a struct decides which members the engine must visit.
//! Everything else rides along with the bulk copy of the struct's slots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use replica_core::{CloneDirective, Type, TypeKind};
use smallvec::SmallVec;

use crate::alloc::Allocator;
use crate::custom::OverrideFn;

static REGISTRY_EPOCH: AtomicU64 = AtomicU64::new(0);

pub(crate) fn registry_epoch() -> u64 {
    REGISTRY_EPOCH.load(Ordering::Acquire)
}

/// Invalidate every cached [`StructMeta`] computed so far.
pub(crate) fn bump_registry_epoch() {
    REGISTRY_EPOCH.fetch_add(1, Ordering::AcqRel);
}

/// What the engine needs to know about one struct type.
pub struct StructMeta {
    pub(crate) ref_slots: SmallVec<[usize; 4]>,
    pub(crate) zero_slots: SmallVec<[usize; 4]>,
    pub(crate) override_fn: Option<OverrideFn>,
}

impl StructMeta {
    /// Slots cloned recursively, in slot order.
    pub fn ref_slots(&self) -> &[usize] {
        &self.ref_slots
    }

    /// Slots reset to zero because their member is marked omit.
    pub fn zero_slots(&self) -> &[usize] {
        &self.zero_slots
    }

    /// Whether an override replaces the member-wise copy.
    pub fn has_override(&self) -> bool {
        self.override_fn.is_some()
    }

    /// Whether a bulk copy of the slots is already a complete clone.
    pub fn is_shallow(&self) -> bool {
        self.ref_slots.is_empty() && self.zero_slots.is_empty()
    }
}

impl std::fmt::Debug for StructMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructMeta")
            .field("ref_slots", &self.ref_slots)
            .field("zero_slots", &self.zero_slots)
            .field("has_override", &self.has_override())
            .finish()
    }
}

pub(crate) struct CachedMeta {
    epoch: u64,
    meta: Arc<StructMeta>,
}

impl Allocator {
    /// Classify struct type `ty`, memoized per allocator.
    ///
    /// Concurrent first computations race harmlessly: the first entry
    /// stored for the current registry epoch wins.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not a defined struct.
    pub fn classify(&self, ty: Type) -> Arc<StructMeta> {
        let epoch = registry_epoch();
        if let Some(cached) = self.structs.get(&ty) {
            if cached.epoch == epoch {
                return Arc::clone(&cached.meta);
            }
        }

        log::trace!("classifying {ty} at registry epoch {epoch}");
        let meta = Arc::new(self.compute_meta(ty));
        match self.structs.entry(ty) {
            Entry::Occupied(entry) if entry.get().epoch == epoch => Arc::clone(&entry.get().meta),
            Entry::Occupied(mut entry) => {
                entry.insert(CachedMeta {
                    epoch,
                    meta: Arc::clone(&meta),
                });
                meta
            }
            Entry::Vacant(entry) => {
                entry.insert(CachedMeta {
                    epoch,
                    meta: Arc::clone(&meta),
                });
                meta
            }
        }
    }

    fn compute_meta(&self, ty: Type) -> StructMeta {
        let mut meta = StructMeta {
            ref_slots: SmallVec::new(),
            zero_slots: SmallVec::new(),
            override_fn: self.override_for(ty),
        };
        if self.is_marked_scalar(ty) {
            return meta;
        }

        let fields = match ty.fields() {
            Some(fields) => fields,
            None => panic!("replica: <bug> cannot classify '{ty}': not a defined struct"),
        };
        for (slot, field) in fields.iter().enumerate() {
            match field.directive {
                CloneDirective::Omit => meta.zero_slots.push(slot),
                CloneDirective::Shallow => {}
                CloneDirective::Default => {
                    if !self.is_elidable(field.ty) {
                        meta.ref_slots.push(slot);
                    }
                }
            }
        }
        meta
    }

    /// Whether a value of `ty` is fully cloned by a bit copy.
    ///
    /// Pointers are never classified through, which keeps cyclic type
    /// graphs finite.
    pub fn is_elidable(&self, ty: Type) -> bool {
        match ty.kind() {
            TypeKind::Struct { .. } => {
                let meta = self.classify(ty);
                meta.is_shallow() && !meta.has_override()
            }
            TypeKind::Array { elem, len } => len == 0 || self.is_elidable(elem),
            TypeKind::Pointer { .. } => self.is_opaque(ty),
            TypeKind::Sequence { .. }
            | TypeKind::Map { .. }
            | TypeKind::Channel { .. }
            | TypeKind::Variant => false,
            scalar => self.is_scalar_kind(scalar.kind()),
        }
    }
}
