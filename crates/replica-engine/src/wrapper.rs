//! Copy-on-write wrapper.
//!
//! [`Wrapper::wrap`] hands out a fast clone of a struct behind a pointer and
//! remembers which original it came from. The caller mutates the clone
//! freely; [`Wrapper::unwrap`] recovers the original in O(1) and
//! [`Wrapper::undo`] resets the clone to a fresh copy of the original.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use replica_core::Kind;

use crate::alloc::Allocator;
use crate::value::{Pointer, Value};

/// Errors from [`WrapperConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The purge threshold must be at least 1.
    ZeroPurgeThreshold,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroPurgeThreshold => write!(f, "wrapper purge threshold must be at least 1"),
        }
    }
}

impl Error for ConfigError {}

/// Tuning for a [`Wrapper`].
#[derive(Clone, Debug)]
pub struct WrapperConfig {
    /// Table size at which dead entries are first purged. After each purge
    /// the next threshold is twice the surviving entry count, and never
    /// below this value.
    pub purge_threshold: usize,
}

impl WrapperConfig {
    /// Default purge threshold.
    pub const DEFAULT_PURGE_THRESHOLD: usize = 1024;

    /// Config with default values.
    pub fn new() -> Self {
        Self {
            purge_threshold: Self::DEFAULT_PURGE_THRESHOLD,
        }
    }

    /// Check the config for values the wrapper cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.purge_threshold == 0 {
            return Err(ConfigError::ZeroPurgeThreshold);
        }
        Ok(())
    }
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct Entry {
    wrapped: Weak<RwLock<Value>>,
    original: Pointer,
}

/// Table from wrapped pointer identity to original pointer.
pub struct Wrapper {
    allocator: Arc<Allocator>,
    table: DashMap<usize, Entry>,
    floor: usize,
    purge_at: AtomicUsize,
}

impl Wrapper {
    /// A wrapper cloning through `allocator`, with default config.
    pub fn new(allocator: Arc<Allocator>) -> Self {
        Self::from_config(allocator, &WrapperConfig::new())
    }

    /// A wrapper cloning through `allocator` with a validated `config`.
    pub fn with_config(allocator: Arc<Allocator>, config: WrapperConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_config(allocator, &config))
    }

    fn from_config(allocator: Arc<Allocator>, config: &WrapperConfig) -> Self {
        Self {
            allocator,
            table: DashMap::new(),
            floor: config.purge_threshold,
            purge_at: AtomicUsize::new(config.purge_threshold),
        }
    }

    /// The allocator clones come from.
    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    fn original_of(&self, p: &Pointer) -> Option<Pointer> {
        let entry = self.table.get(&p.addr())?;
        let live = entry.wrapped.upgrade()?;
        let cell = p.cell()?;
        Arc::ptr_eq(&live, cell).then(|| entry.original.clone())
    }

    /// Clone the struct `value` points to and return a pointer to the
    /// clone. Anything that is not a non-nil pointer to a struct, and any
    /// pointer this wrapper already produced, is returned unchanged.
    pub fn wrap(&self, value: &Value) -> Value {
        let p = match value {
            Value::Pointer(p) if !p.is_null() && p.elem_type().flat_kind() == Kind::Struct => p,
            _ => return value.clone(),
        };
        if self.original_of(p).is_some() {
            return value.clone();
        }

        let cloned = self.allocator.clone_value(value);
        if let Some(cell) = cloned.as_pointer().and_then(Pointer::cell) {
            self.table.insert(
                cloned.as_pointer().map_or(0, Pointer::addr),
                Entry {
                    wrapped: Arc::downgrade(cell),
                    original: p.clone(),
                },
            );
        }
        self.maybe_purge();
        cloned
    }

    /// The original behind a wrapped pointer, or `value` itself when it was
    /// not produced by [`wrap`](Self::wrap).
    pub fn unwrap(&self, value: &Value) -> Value {
        match value {
            Value::Pointer(p) => self
                .original_of(p)
                .map_or_else(|| value.clone(), Value::Pointer),
            _ => value.clone(),
        }
    }

    /// Reset a wrapped pointer's referent to a fresh fast clone of its
    /// original. Does nothing for values not produced by
    /// [`wrap`](Self::wrap).
    ///
    /// This costs a full clone; prefer [`unwrap`](Self::unwrap) when the
    /// original itself will do.
    pub fn undo(&self, value: &Value) {
        let p = match value {
            Value::Pointer(p) => p,
            _ => return,
        };
        let original = match self.original_of(p) {
            Some(original) => original,
            None => return,
        };
        let fresh = match original.read() {
            Some(guard) => self.allocator.clone_value(&guard),
            None => return,
        };
        if let Some(mut slot) = p.write() {
            *slot = fresh;
        }
    }

    /// Whether `value` is a live pointer produced by [`wrap`](Self::wrap).
    pub fn is_wrapped(&self, value: &Value) -> bool {
        value
            .as_pointer()
            .is_some_and(|p| self.original_of(p).is_some())
    }

    /// Number of table entries, dead ones included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Drop entries whose wrapped pointer is gone. Returns how many were
    /// removed.
    pub fn purge(&self) -> usize {
        let before = self.table.len();
        self.table.retain(|_, entry| entry.wrapped.strong_count() > 0);
        let live = self.table.len();
        self.purge_at
            .store((live * 2).max(self.floor), Ordering::Relaxed);
        let removed = before.saturating_sub(live);
        log::trace!("wrapper purge removed {removed} dead entries, {live} live");
        removed
    }

    fn maybe_purge(&self) {
        if self.table.len() >= self.purge_at.load(Ordering::Relaxed) {
            self.purge();
        }
    }
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapper")
            .field("entries", &self.table.len())
            .field("purge_at", &self.purge_at.load(Ordering::Relaxed))
            .finish()
    }
}
