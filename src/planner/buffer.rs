//! Fixed-capacity FIFO of planned blocks.
//!
//! `head` counts blocks handed to the step generator and released, `tail`
//! counts blocks appended by the planner. Both run freely and wrap; the slot
//! of a counter is `counter & (N - 1)`, so `N` must be a power of two.

use crate::error::PlannerError;

use super::block::Block;

/// Ring buffer of blocks between the planner and the step generator.
#[derive(Debug, Clone)]
pub struct SegmentBuffer<const N: usize> {
    blocks: [Block; N],
    head: u32,
    tail: u32,
}

impl<const N: usize> SegmentBuffer<N> {
    const POWER_OF_TWO: () = assert!(N.is_power_of_two() && N >= 2, "capacity must be a power of two");

    /// Create an empty buffer.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::POWER_OF_TWO;
        Self {
            blocks: [Block::EMPTY; N],
            head: 0,
            tail: 0,
        }
    }

    #[inline]
    fn slot(counter: u32) -> usize {
        counter as usize & (N - 1)
    }

    /// Number of slots.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of queued blocks, including the busy one.
    #[inline]
    pub fn len(&self) -> usize {
        self.tail.wrapping_sub(self.head) as usize
    }

    /// `true` when no block is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// `true` when no slot is free.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// Free slots.
    #[inline]
    pub fn free_slots(&self) -> usize {
        N - self.len()
    }

    /// Append a block.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::BufferFull` if every slot holds an unexecuted block.
    pub fn push(&mut self, block: Block) -> Result<(), PlannerError> {
        if self.is_full() {
            return Err(PlannerError::BufferFull);
        }
        self.blocks[Self::slot(self.tail)] = block;
        self.tail = self.tail.wrapping_add(1);
        Ok(())
    }

    /// Oldest block.
    #[inline]
    pub fn front(&self) -> Option<&Block> {
        self.get(0)
    }

    /// Newest block.
    #[inline]
    pub fn back(&self) -> Option<&Block> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Block at logical position `index` (0 is the oldest).
    pub fn get(&self, index: usize) -> Option<&Block> {
        if index < self.len() {
            Some(&self.blocks[Self::slot(self.head.wrapping_add(index as u32))])
        } else {
            None
        }
    }

    /// Mutable block at logical position `index`.
    ///
    /// The busy block is never handed out; it belongs to the step generator.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Block> {
        if index < self.len() {
            let block = &mut self.blocks[Self::slot(self.head.wrapping_add(index as u32))];
            if block.flags.busy {
                None
            } else {
                Some(block)
            }
        } else {
            None
        }
    }

    /// Hand the oldest block to the step generator, marking it busy.
    pub fn claim_front(&mut self) -> Option<&Block> {
        if self.is_empty() {
            return None;
        }
        let block = &mut self.blocks[Self::slot(self.head)];
        block.flags.busy = true;
        Some(block)
    }

    /// Whether the oldest block is owned by the step generator.
    #[inline]
    pub fn has_busy(&self) -> bool {
        self.front().is_some_and(|b| b.flags.busy)
    }

    /// Logical index of the first block the planner may still modify.
    #[inline]
    pub fn first_unclaimed(&self) -> usize {
        usize::from(self.has_busy())
    }

    /// Retire the oldest block and free its slot.
    pub fn release_front(&mut self) -> Option<Block> {
        if self.is_empty() {
            return None;
        }
        let slot = Self::slot(self.head);
        let mut block = self.blocks[slot];
        block.flags.busy = false;
        self.blocks[slot].flags.busy = false;
        self.head = self.head.wrapping_add(1);
        Some(block)
    }

    /// Drop every block that the step generator has not claimed.
    ///
    /// Returns the number of blocks dropped.
    pub fn discard_unclaimed(&mut self) -> usize {
        let keep = self.first_unclaimed() as u32;
        let dropped = self.len() - keep as usize;
        self.tail = self.head.wrapping_add(keep);
        dropped
    }

    /// Drop every block, including the busy one.
    pub fn clear(&mut self) {
        if let Some(front) = self.blocks.get_mut(Self::slot(self.head)) {
            front.flags.busy = false;
        }
        self.tail = self.head;
    }

    /// Iterate queued blocks oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Block> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

impl<const N: usize> Default for SegmentBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
