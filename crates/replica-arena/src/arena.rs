//! The arena backing store and its scoped allocator.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use replica_core::Type;
use replica_engine::{Allocator, AllocatorMethods, Pointer, Sequence, Value};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::segment::SegmentList;

/// Point-in-time usage of an [`Arena`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Pointer cells retained.
    pub cells: usize,
    /// Sequence buffers retained.
    pub buffers: usize,
    /// Segments created so far.
    pub segments: usize,
    /// Slots in use.
    pub used: usize,
    /// Slots the arena may hold at most.
    pub capacity: usize,
    /// Approximate bytes held by the retained slots.
    pub approx_bytes: usize,
}

struct Store {
    segments: Mutex<SegmentList>,
}

impl Store {
    fn try_new(&self, ty: Type) -> Result<Pointer, ArenaError> {
        let p = Pointer::to(Value::zero(ty));
        self.segments.lock().push_cell(p.clone())?;
        Ok(p)
    }

    fn try_sequence(&self, ty: Type, len: usize, cap: usize) -> Result<Sequence, ArenaError> {
        let cost = cap.max(len).max(1);
        let seq = Sequence::make(ty, len, cap);
        self.segments.lock().push_buffer(seq.clone(), cost)?;
        Ok(seq)
    }
}

fn fatal(err: ArenaError) -> ! {
    log::warn!("arena rejected an allocation: {err}");
    panic!("replica: allocation failed: {err}")
}

impl AllocatorMethods for Store {
    fn new(&self, ty: Type) -> Option<Pointer> {
        Some(self.try_new(ty).unwrap_or_else(|e| fatal(e)))
    }

    fn make_sequence(&self, ty: Type, len: usize, cap: usize) -> Option<Sequence> {
        Some(self.try_sequence(ty, len, cap).unwrap_or_else(|e| fatal(e)))
    }
}

/// A bump arena for pointer cells and sequence buffers.
///
/// Maps and channels are not arena-allocated; the arena's allocator leaves
/// them to its parent. Everything the arena hands out is retained until
/// [`reset`](Self::reset), after which only values still referenced
/// elsewhere survive.
///
/// # Examples
///
/// ```
/// use replica_arena::{Arena, ArenaConfig};
/// use replica_engine::{Pointer, Value};
///
/// let arena = Arena::new(ArenaConfig::default()).unwrap();
/// let v: Value = Pointer::to(Value::Int(7)).into();
/// let cloned = arena.clone_in(&v);
/// assert_eq!(cloned, v);
/// assert!(arena.stats().cells >= 1);
/// ```
pub struct Arena {
    config: ArenaConfig,
    store: Arc<Store>,
    allocator: Arc<Allocator>,
}

impl Arena {
    /// Create an arena from a validated `config`, parented on the process
    /// default allocator.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        Self::build(config, None)
    }

    /// Create an arena whose allocator defers to `parent` for maps,
    /// channels, marks and overrides.
    pub fn with_parent(config: ArenaConfig, parent: Arc<Allocator>) -> Result<Self, ArenaError> {
        Self::build(config, Some(parent))
    }

    fn build(config: ArenaConfig, parent: Option<Arc<Allocator>>) -> Result<Self, ArenaError> {
        config.validate()?;
        let store = Arc::new(Store {
            segments: Mutex::new(SegmentList::new(config.segment_cells, config.max_segments)),
        });
        let allocator = Allocator::new(store.clone(), parent);
        Ok(Self {
            config,
            store,
            allocator,
        })
    }

    /// The configuration this arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// The scoped allocator that draws from this arena.
    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    /// Allocate a zeroed cell of type `ty` in the arena.
    pub fn try_alloc(&self, ty: Type) -> Result<Pointer, ArenaError> {
        self.store.try_new(ty)
    }

    /// Allocate a sequence buffer in the arena.
    pub fn try_make_sequence(
        &self,
        ty: Type,
        len: usize,
        cap: usize,
    ) -> Result<Sequence, ArenaError> {
        self.store.try_sequence(ty, len, cap)
    }

    /// Fast clone of `value` into the arena.
    ///
    /// # Panics
    ///
    /// Panics if the arena runs out of capacity mid-clone.
    pub fn clone_in(&self, value: &Value) -> Value {
        self.allocator.clone_value(value)
    }

    /// Cycle-safe clone of `value` into the arena.
    ///
    /// # Panics
    ///
    /// Panics if the arena runs out of capacity mid-clone.
    pub fn clone_safely_in(&self, value: &Value) -> Value {
        self.allocator.clone_value_safely(value)
    }

    /// Release everything the arena retains and rewind to the first
    /// segment.
    pub fn reset(&self) {
        let mut segments = self.store.segments.lock();
        let released = segments.cell_count() + segments.buffer_count();
        segments.reset();
        log::debug!("arena reset released {released} allocations");
    }

    /// Current usage.
    pub fn stats(&self) -> ArenaStats {
        let segments = self.store.segments.lock();
        let used = segments.total_used();
        ArenaStats {
            cells: segments.cell_count(),
            buffers: segments.buffer_count(),
            segments: segments.segment_count(),
            used,
            capacity: segments.capacity(),
            approx_bytes: used * std::mem::size_of::<Value>(),
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_core::FieldDesc;
    use replica_engine::{MapValue, StructValue};

    fn small(segment_cells: usize, max_segments: u16) -> Arena {
        Arena::new(ArenaConfig {
            segment_cells,
            max_segments,
        })
        .unwrap()
    }

    #[test]
    fn allocator_record_lives_in_the_arena() {
        let arena = small(16, 1);
        let stats = arena.stats();
        assert_eq!(stats.cells, 1);
        assert_eq!(stats.used, 1);
        assert_eq!(stats.capacity, 16);
    }

    #[test]
    fn pointer_and_sequence_clones_are_counted() {
        let arena = small(64, 4);
        let seq = Sequence::make(Type::sequence_of(Type::INT), 2, 5);
        let v: Value = Pointer::to(seq.into()).into();
        let before = arena.stats();
        let cloned = arena.clone_in(&v);
        assert_eq!(cloned, v);

        let after = arena.stats();
        assert_eq!(after.cells - before.cells, 1);
        assert_eq!(after.buffers - before.buffers, 1);
        assert_eq!(after.used - before.used, 1 + 5);
    }

    #[test]
    fn maps_fall_back_to_the_heap() {
        let arena = small(8, 1);
        let m = MapValue::new(Type::map_of(Type::INT, Type::INT));
        m.insert(Value::Int(1), Value::Int(2)).unwrap();
        let before = arena.stats();
        let cloned = arena.clone_in(&m.into());
        assert_eq!(cloned.as_map().unwrap().len(), 1);
        assert_eq!(arena.stats(), before);
    }

    #[test]
    fn try_alloc_reports_exhaustion() {
        let arena = small(2, 1);
        arena.try_alloc(Type::INT).unwrap();
        let err = arena.try_alloc(Type::INT).unwrap_err();
        assert!(matches!(err, ArenaError::CapacityExceeded { requested: 1, .. }));
        assert!(arena
            .try_make_sequence(Type::sequence_of(Type::INT), 0, 3)
            .is_err());
    }

    #[test]
    #[should_panic(expected = "replica: allocation failed")]
    fn exhaustion_mid_clone_panics() {
        let arena = small(2, 1);
        let list = Type::new_struct(
            "Chain",
            vec![FieldDesc::new("next", Type::pointer_to(Type::INT))],
        )
        .unwrap();
        let inner = Pointer::to(Value::Int(1));
        let outer = StructValue::new(list).unwrap().with("next", inner).unwrap();
        let v: Value = Pointer::to(Pointer::to(outer.into()).into()).into();
        arena.clone_in(&v);
    }

    #[test]
    fn reset_rewinds_and_keeps_live_clones() {
        let arena = small(4, 2);
        let v: Value = Pointer::to(Value::Int(9)).into();
        let kept = arena.clone_in(&v);
        arena.reset();
        let stats = arena.stats();
        assert_eq!((stats.cells, stats.used), (0, 0));
        assert_eq!(kept, v);
        for _ in 0..8 {
            arena.clone_in(&v);
        }
        assert_eq!(arena.stats().segments, 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Arena::new(ArenaConfig {
            segment_cells: 0,
            max_segments: 1,
        })
        .unwrap_err();
        assert!(matches!(err, ArenaError::InvalidConfig { .. }));
    }

    #[test]
    fn child_of_a_custom_parent_inherits_marks() {
        let parent = Allocator::from_heap();
        let boxed = Type::new_struct(
            "Boxed",
            vec![FieldDesc::new("p", Type::pointer_to(Type::INT))],
        )
        .unwrap();
        parent.mark_scalar(boxed);
        let arena = Arena::with_parent(ArenaConfig::default(), parent).unwrap();

        let inner = Pointer::to(Value::Int(3));
        let v: Value = StructValue::new(boxed).unwrap().with("p", inner.clone()).unwrap().into();
        let before = arena.stats();
        let cloned = arena.clone_in(&v);
        let p = cloned.as_struct().unwrap().field("p").unwrap();
        assert!(p.as_pointer().unwrap().ptr_eq(&inner));
        assert_eq!(arena.stats(), before);
    }
}
