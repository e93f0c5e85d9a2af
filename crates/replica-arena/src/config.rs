//! Arena configuration parameters.

use crate::error::ArenaError;

/// Configuration for an [`Arena`](crate::Arena).
///
/// Capacity is counted in slots: a pointer cell takes one slot and a
/// sequence buffer takes one slot per element of capacity (at least one).
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Slots per segment. A larger buffer gets a dedicated segment of
    /// its own size, charged as the segments it spans.
    ///
    /// Default: 4096.
    pub segment_cells: usize,

    /// Maximum number of segments the arena may grow to.
    ///
    /// Default: 64, so the default arena holds 262_144 slots.
    pub max_segments: u16,
}

impl ArenaConfig {
    /// Default slots per segment.
    pub const DEFAULT_SEGMENT_CELLS: usize = 4096;

    /// Default maximum segment count.
    pub const DEFAULT_MAX_SEGMENTS: u16 = 64;

    /// Config with default values.
    pub fn new() -> Self {
        Self {
            segment_cells: Self::DEFAULT_SEGMENT_CELLS,
            max_segments: Self::DEFAULT_MAX_SEGMENTS,
        }
    }

    /// Total slot capacity across all segments. Saturates for configs
    /// that would not pass [`validate`](Self::validate).
    pub fn capacity(&self) -> usize {
        self.segment_cells.saturating_mul(self.max_segments as usize)
    }

    /// Check the config for values an arena cannot run with.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.segment_cells == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "segment_cells must be at least 1".into(),
            });
        }
        if self.max_segments == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "max_segments must be at least 1".into(),
            });
        }
        if self
            .segment_cells
            .checked_mul(self.max_segments as usize)
            .is_none()
        {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "segment_cells * max_segments overflows ({} * {})",
                    self.segment_cells, self.max_segments
                ),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
