//! Lookahead recalculation over the queued blocks.
//!
//! The reverse pass lowers entry speeds so every block can still slow down to
//! whatever follows it, the forward pass lowers them again where the previous
//! block cannot accelerate fast enough, and finally the trapezoids of every
//! block whose entry or exit changed are rebuilt.
//!
//! The first unclaimed block keeps its entry speed: it either starts from rest
//! or is joined to the exit of the block the step generator is running, whose
//! profile can no longer change.

use super::block::Block;
use super::buffer::SegmentBuffer;
use super::trapezoid::{calculate_trapezoid, max_allowable_speed};

/// Run the reverse, forward and trapezoid passes.
pub fn recalculate<const N: usize>(buffer: &mut SegmentBuffer<N>, min_speed: f32, min_step_rate: u32) {
    reverse_pass(buffer, min_speed);
    forward_pass(buffer);
    recalculate_trapezoids(buffer, min_speed, min_step_rate);
}

fn reverse_kernel(current: &mut Block, next_entry: f32) {
    if current.entry_speed == current.max_entry_speed {
        return;
    }

    current.entry_speed = if current.flags.nominal_length || current.max_entry_speed <= next_entry {
        current.max_entry_speed
    } else {
        current
            .max_entry_speed
            .min(max_allowable_speed(-current.acceleration, next_entry, current.millimeters))
    };
    current.flags.recalculate = true;
}

/// Newest to oldest: cap each entry speed by what the block can shed before
/// the next block's entry.
pub fn reverse_pass<const N: usize>(buffer: &mut SegmentBuffer<N>, min_speed: f32) {
    let first = buffer.first_unclaimed();
    let len = buffer.len();
    if len <= first + 1 {
        return;
    }

    let mut next_entry = min_speed;
    for index in (first + 1..len).rev() {
        if let Some(block) = buffer.get_mut(index) {
            reverse_kernel(block, next_entry);
            next_entry = block.entry_speed;
        }
    }
}

fn forward_kernel(previous: &Block, current: &mut Block) {
    // A previous block that cannot reach nominal speed limits how fast we can enter.
    if !previous.flags.nominal_length && previous.entry_speed < current.entry_speed {
        let entry = current
            .entry_speed
            .min(max_allowable_speed(-previous.acceleration, previous.entry_speed, previous.millimeters));
        if entry != current.entry_speed {
            current.entry_speed = entry;
            current.flags.recalculate = true;
        }
    }
}

/// Oldest to newest: cap each entry speed by what the previous block can reach.
pub fn forward_pass<const N: usize>(buffer: &mut SegmentBuffer<N>) {
    let first = buffer.first_unclaimed();
    for index in first + 1..buffer.len() {
        let previous = match buffer.get(index - 1) {
            Some(block) => *block,
            None => continue,
        };
        if let Some(current) = buffer.get_mut(index) {
            forward_kernel(&previous, current);
        }
    }
}

/// Rebuild the trapezoid of each unclaimed block whose entry or exit changed.
///
/// The newest block always ends at `min_speed`.
pub fn recalculate_trapezoids<const N: usize>(buffer: &mut SegmentBuffer<N>, min_speed: f32, min_step_rate: u32) {
    let first = buffer.first_unclaimed();
    let len = buffer.len();

    for index in first..len {
        let (next_entry, next_flagged) = match buffer.get(index + 1) {
            Some(next) => (next.entry_speed, next.flags.recalculate),
            None => (min_speed, false),
        };

        if let Some(current) = buffer.get_mut(index) {
            if current.flags.recalculate || next_flagged || index + 1 == len {
                let nominal = current.nominal_speed;
                if nominal > 0.0 {
                    calculate_trapezoid(
                        current,
                        current.entry_speed / nominal,
                        next_entry / nominal,
                        min_step_rate,
                    );
                }
                current.flags.recalculate = false;
            }
        }
    }
}
