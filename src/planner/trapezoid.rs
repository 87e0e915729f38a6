//! Trapezoidal speed profile of a block.
//!
//! ```text
//!                               +--------+   <- nominal_rate
//!                              /          \
//!  nominal_rate*entry_factor ->+            \
//!                             |             + <- nominal_rate*exit_factor
//!                             +-------------+
//!                                 time -->
//! ```
//!
//! The profile is expressed in step events of the dominant actuator: the
//! acceleration phase ends at `accelerate_until`, deceleration begins after
//! `decelerate_after`. When the block is too short to reach its nominal rate
//! the plateau vanishes and the two ramps meet where they intersect.

use libm::{ceilf, floorf, sqrtf};

use super::block::Block;

/// Distance (steps) needed to change rate from `initial_rate` to
/// `target_rate` at `acceleration` (steps/s², negative to decelerate).
#[inline]
pub fn estimate_acceleration_distance(initial_rate: f32, target_rate: f32, acceleration: f32) -> f32 {
    if acceleration == 0.0 {
        return 0.0;
    }
    (target_rate * target_rate - initial_rate * initial_rate) / (acceleration * 2.0)
}

/// Point (steps from the start) where an acceleration from `initial_rate`
/// meets a deceleration to `final_rate` when neither can reach the plateau.
#[inline]
pub fn intersection_distance(initial_rate: f32, final_rate: f32, acceleration: f32, distance: f32) -> f32 {
    if acceleration == 0.0 {
        return 0.0;
    }
    (acceleration * 2.0 * distance - initial_rate * initial_rate + final_rate * final_rate)
        / (acceleration * 4.0)
}

/// Highest speed from which `target_velocity` can still be reached over
/// `distance` with `acceleration` (pass a negative value for deceleration).
#[inline]
pub fn max_allowable_speed(acceleration: f32, target_velocity: f32, distance: f32) -> f32 {
    sqrtf((target_velocity * target_velocity - 2.0 * acceleration * distance).max(0.0))
}

/// Recompute the rates and phase boundaries of `block`.
///
/// `entry_factor` and `exit_factor` scale the nominal rate at the start and
/// end of the block; both rates are floored at `min_step_rate`. Returns `false`
/// without touching the block if the step generator owns it.
pub fn calculate_trapezoid(block: &mut Block, entry_factor: f32, exit_factor: f32, min_step_rate: u32) -> bool {
    if block.flags.busy {
        return false;
    }

    let nominal_rate = block.nominal_rate;
    let initial_rate = (ceilf(nominal_rate as f32 * entry_factor) as u32).max(min_step_rate);
    let final_rate = (ceilf(nominal_rate as f32 * exit_factor) as u32).max(min_step_rate);
    let accel = block.acceleration_steps_per_s2 as f32;
    let step_count = block.step_event_count;

    let mut accelerate_steps =
        ceilf(estimate_acceleration_distance(initial_rate as f32, nominal_rate as f32, accel)).max(0.0) as i64;
    let decelerate_steps =
        floorf(estimate_acceleration_distance(nominal_rate as f32, final_rate as f32, -accel)).max(0.0) as i64;
    let mut plateau_steps = step_count as i64 - accelerate_steps - decelerate_steps;

    // No room to cruise: accelerate until the ramps cross, then decelerate.
    if plateau_steps < 0 {
        let intersection =
            ceilf(intersection_distance(initial_rate as f32, final_rate as f32, accel, step_count as f32));
        accelerate_steps = (intersection.max(0.0) as i64).min(step_count as i64);
        plateau_steps = 0;
    }

    block.cruise_rate = if plateau_steps > 0 {
        nominal_rate
    } else {
        let peak = initial_rate as f32 * initial_rate as f32 + 2.0 * accel * accelerate_steps as f32;
        (ceilf(sqrtf(peak)) as u32).min(nominal_rate).max(initial_rate)
    };
    block.initial_rate = initial_rate;
    block.final_rate = final_rate;
    block.accelerate_until = accelerate_steps as u32;
    block.decelerate_after = (accelerate_steps + plateau_steps) as u32;

    let nominal_speed = block.nominal_speed;
    if let Some(lead) = block.advance.as_mut() {
        lead.update(nominal_speed, nominal_speed * exit_factor);
    }
    true
}
