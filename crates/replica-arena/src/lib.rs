//! Bump-arena backing store for Replica allocators.
//!
//! An [`Arena`] plugs into the engine's allocator abstraction: clones made
//! through [`Arena::allocator`] (or [`Arena::clone_in`]) place their pointer
//! cells and sequence buffers in arena segments, while maps and channels
//! come from the parent allocator.
//!
//! # Architecture
//!
//! ```text
//! Arena
//! ├── ArenaConfig (segment_cells × max_segments slots)
//! ├── Store: Mutex<SegmentList> → Segment[] (retained cells and buffers)
//! └── Arc<Allocator> (new + make_sequence from the store, the rest from the parent)
//! ```
//!
//! Running out of capacity inside a clone is fatal: the allocator panics
//! with `replica: allocation failed`. [`Arena::try_alloc`] and
//! [`Arena::try_make_sequence`] report the same condition as an
//! [`ArenaError`] instead.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod segment;

pub use arena::{Arena, ArenaStats};
pub use config::ArenaConfig;
pub use error::ArenaError;
