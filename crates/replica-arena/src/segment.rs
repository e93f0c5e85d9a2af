//! Segments and growable segment lists.
//!
//! A [`Segment`] retains the cells and buffers bump-allocated into it until
//! it is reset. A [`SegmentList`] overflows into new segments when the
//! current one is full, up to a fixed maximum.

use replica_engine::{Pointer, Sequence};

use crate::error::ArenaError;

/// A single segment with a bump cursor counted in slots.
pub struct Segment {
    cells: Vec<Pointer>,
    buffers: Vec<Sequence>,
    cursor: usize,
    capacity: usize,
}

impl Segment {
    /// Create an empty segment holding up to `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: Vec::new(),
            buffers: Vec::new(),
            cursor: 0,
            capacity,
        }
    }

    fn bump(&mut self, cost: usize) -> bool {
        match self.cursor.checked_add(cost) {
            Some(next) if next <= self.capacity => {
                self.cursor = next;
                true
            }
            _ => false,
        }
    }

    /// Retain `cell` for one slot. Returns `false` if the segment is full.
    pub fn push_cell(&mut self, cell: Pointer) -> bool {
        if !self.bump(1) {
            return false;
        }
        self.cells.push(cell);
        true
    }

    /// Retain `buffer` for `cost` slots. Returns `false` if it does not fit.
    pub fn push_buffer(&mut self, buffer: Sequence, cost: usize) -> bool {
        if !self.bump(cost) {
            return false;
        }
        self.buffers.push(buffer);
        true
    }

    /// Release everything retained and rewind the cursor.
    ///
    /// Values still referenced elsewhere stay alive; the segment only
    /// stops holding them.
    pub fn reset(&mut self) {
        self.cells.clear();
        self.buffers.clear();
        self.cursor = 0;
    }

    /// Slots in use.
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Total capacity in slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remaining free slots.
    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    /// Number of pointer cells retained.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of sequence buffers retained.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

enum Item {
    Cell(Pointer),
    Buffer(Sequence),
}

fn push(segment: &mut Segment, item: Item, cost: usize) -> bool {
    match item {
        Item::Cell(cell) => segment.push_cell(cell),
        Item::Buffer(buffer) => segment.push_buffer(buffer, cost),
    }
}

/// A growable list of [`Segment`]s.
///
/// An allocation that does not fit the current segment goes whole into the
/// next one; nothing is split across segments. A buffer larger than a
/// segment gets a dedicated segment of exactly its size, charged against
/// `max_segments` as the number of regular segments it spans.
pub struct SegmentList {
    segments: Vec<Segment>,
    dedicated: Vec<Segment>,
    /// Regular segments' worth of budget held by `dedicated`.
    dedicated_span: usize,
    segment_cells: usize,
    max_segments: u16,
    /// Index of the segment currently being filled.
    current: usize,
}

impl SegmentList {
    /// Create a list with one segment.
    pub fn new(segment_cells: usize, max_segments: u16) -> Self {
        let mut segments = Vec::with_capacity(max_segments as usize);
        segments.push(Segment::new(segment_cells));
        Self {
            segments,
            dedicated: Vec::new(),
            dedicated_span: 0,
            segment_cells,
            max_segments,
            current: 0,
        }
    }

    /// Retain a pointer cell.
    pub fn push_cell(&mut self, cell: Pointer) -> Result<(), ArenaError> {
        self.place(Item::Cell(cell), 1)
    }

    /// Retain a sequence buffer costing `cost` slots.
    pub fn push_buffer(&mut self, buffer: Sequence, cost: usize) -> Result<(), ArenaError> {
        self.place(Item::Buffer(buffer), cost)
    }

    fn budget_used(&self) -> usize {
        self.segments.len() + self.dedicated_span
    }

    fn exceeded(&self, cost: usize) -> ArenaError {
        ArenaError::CapacityExceeded {
            requested: cost,
            capacity: self.capacity().saturating_sub(self.total_used()),
        }
    }

    fn place(&mut self, item: Item, cost: usize) -> Result<(), ArenaError> {
        if cost > self.segment_cells {
            return self.place_dedicated(item, cost);
        }

        while self.segments[self.current].remaining() < cost {
            let next = self.current + 1;
            if next == self.segments.len() {
                if self.budget_used() >= self.max_segments as usize {
                    return Err(self.exceeded(cost));
                }
                self.segments.push(Segment::new(self.segment_cells));
            }
            self.current = next;
        }

        let placed = push(&mut self.segments[self.current], item, cost);
        debug_assert!(placed, "segment had room for {cost} slots");
        Ok(())
    }

    fn place_dedicated(&mut self, item: Item, cost: usize) -> Result<(), ArenaError> {
        let span = cost.div_ceil(self.segment_cells);
        let max = self.max_segments as usize;

        // Empty regular segments past the cursor are only kept for reuse.
        while self.budget_used() + span > max
            && self.segments.len() > self.current + 1
            && self.segments.last().is_some_and(|s| s.used() == 0)
        {
            self.segments.pop();
        }
        if self.budget_used() + span > max {
            return Err(self.exceeded(cost));
        }

        let mut segment = Segment::new(cost);
        let placed = push(&mut segment, item, cost);
        debug_assert!(placed, "dedicated segment is sized for {cost} slots");
        self.dedicated.push(segment);
        self.dedicated_span += span;
        Ok(())
    }

    /// Reset every segment. Allocation restarts at segment 0; grown
    /// regular segments are kept for reuse, dedicated ones are dropped.
    pub fn reset(&mut self) {
        for segment in &mut self.segments {
            segment.reset();
        }
        self.dedicated.clear();
        self.dedicated_span = 0;
        self.current = 0;
    }

    fn all(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().chain(&self.dedicated)
    }

    /// Number of segments created so far, dedicated ones included.
    pub fn segment_count(&self) -> usize {
        self.segments.len() + self.dedicated.len()
    }

    /// Slots in use across all segments.
    pub fn total_used(&self) -> usize {
        self.all().map(Segment::used).sum()
    }

    /// Cells retained across all segments.
    pub fn cell_count(&self) -> usize {
        self.all().map(Segment::cell_count).sum()
    }

    /// Buffers retained across all segments.
    pub fn buffer_count(&self) -> usize {
        self.all().map(Segment::buffer_count).sum()
    }

    /// Slots the list could hold at its maximum size.
    pub fn capacity(&self) -> usize {
        self.segment_cells.saturating_mul(self.max_segments as usize)
    }
}
