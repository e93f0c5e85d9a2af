//! Clone engine for Replica.
//!
//! Provides the tagged [`Value`] model, scoped [`Allocator`]s with
//! pluggable backing stores, struct classification, the fast and
//! cycle-safe clone paths, per-type overrides and the copy-on-write
//! [`Wrapper`].
//!
//! # Architecture
//!
//! ```text
//! Allocator ── methods: Arc<dyn AllocatorMethods> (own pool, else parent, else Heap)
//! │  ├── parent: Option<Arc<Allocator>>
//! │  ├── structs: DashMap<Type, CachedMeta>     (classify, epoch-stamped)
//! │  └── scalar / opaque marks, overrides        (looked up the parent chain)
//! │
//! ├── clone_value / clone_value_safely ── CloneState (visited table, excluded value)
//! └── Wrapper ── DashMap<addr, { weak clone, original }>
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod alloc;
pub mod classify;
pub mod custom;
mod engine;
pub mod value;
pub mod wrapper;

pub use alloc::{Allocator, AllocatorMethods, Heap};
pub use classify::StructMeta;
pub use custom::{Cloner, OverrideFn};
pub use value::{
    ArrayValue, Buffer, Cell, Channel, ChannelHandle, Func, MapKey, MapValue, Pointer, Sequence,
    StructValue, Value, Variant,
};
pub use wrapper::{ConfigError, Wrapper, WrapperConfig};
