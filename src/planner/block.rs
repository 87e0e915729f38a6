//! Planned motion segment.

use libm::roundf;

use crate::config::Axis;
use crate::motion::Direction;

/// State flags of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockFlags {
    /// The block can reach its nominal speed from any entry speed, so the
    /// lookahead passes may leave its entry speed at the maximum.
    pub nominal_length: bool,
    /// Entry or exit speed changed; the trapezoid has to be recomputed.
    pub recalculate: bool,
    /// The step generator owns the block.
    pub busy: bool,
    /// A homing move that runs until its endstop triggers.
    pub homing: bool,
}

/// Extruder pressure lead of a printing block.
///
/// While the block accelerates or cruises the step generator adds up to
/// `max_steps` extra E steps ahead of the plan; while it decelerates it takes
/// them back down to `final_steps`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvanceLead {
    /// Lead in E steps per mm/s of path speed.
    pub steps_per_speed: f32,
    /// Timer ticks between two lead steps.
    pub interval: u32,
    /// Lead at cruise speed.
    pub max_steps: u32,
    /// Lead at exit speed.
    pub final_steps: u32,
}

impl AdvanceLead {
    /// Refresh the lead targets for new cruise and exit speeds.
    pub fn update(&mut self, nominal_speed: f32, exit_speed: f32) {
        self.max_steps = roundf(nominal_speed * self.steps_per_speed) as u32;
        self.final_steps = (roundf(exit_speed * self.steps_per_speed) as u32).min(self.max_steps);
    }
}

/// A single planned motion segment.
///
/// Step counts cover the three positioning actuators and the extruder. All
/// rates are in steps/s of the dominant actuator; speeds are in mm/s along the
/// path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    /// Submission number, increasing by one per block.
    pub sequence: u32,

    /// Absolute steps per actuator (X/A, Y/B, Z/C, E).
    pub steps: [u32; 4],

    /// Bit `i` set when actuator `i` moves in reverse.
    pub direction_bits: u8,

    /// Step count of the dominant actuator.
    pub step_event_count: u32,

    /// Actuator with the most steps.
    pub dominant: Axis,

    /// Extruder driven by the E steps.
    pub extruder: u8,

    /// Path length in mm.
    pub millimeters: f32,

    /// Cruise speed in mm/s.
    pub nominal_speed: f32,

    /// Planned entry speed in mm/s.
    pub entry_speed: f32,

    /// Junction limit on the entry speed in mm/s.
    pub max_entry_speed: f32,

    /// Acceleration along the path in mm/s².
    pub acceleration: f32,

    /// Acceleration in dominant steps/s².
    pub acceleration_steps_per_s2: u32,

    /// Acceleration as `steps/s² * 2^24 / timer_frequency`, for the step generator.
    pub acceleration_rate: u32,

    /// Step rate at entry.
    pub initial_rate: u32,

    /// Step rate at cruise.
    pub nominal_rate: u32,

    /// Step rate at exit.
    pub final_rate: u32,

    /// Highest step rate reached; below `nominal_rate` when the block never
    /// cruises. Zero until the trapezoid is computed.
    pub cruise_rate: u32,

    /// Last step event of the acceleration phase.
    pub accelerate_until: u32,

    /// Step event after which deceleration starts.
    pub decelerate_after: u32,

    /// State flags.
    pub flags: BlockFlags,

    /// Axis being homed, for homing blocks.
    pub homing_axis: Option<Axis>,

    /// Travel direction of each endstop axis during this block.
    pub endstop_motion: [i8; 3],

    /// Extruder lead, for printing moves with linear advance enabled.
    pub advance: Option<AdvanceLead>,
}

impl Block {
    /// A zeroed block used to fill unused buffer slots.
    pub const EMPTY: Block = Block {
        sequence: 0,
        steps: [0; 4],
        direction_bits: 0,
        step_event_count: 0,
        dominant: Axis::X,
        extruder: 0,
        millimeters: 0.0,
        nominal_speed: 0.0,
        entry_speed: 0.0,
        max_entry_speed: 0.0,
        acceleration: 0.0,
        acceleration_steps_per_s2: 0,
        acceleration_rate: 0,
        initial_rate: 0,
        nominal_rate: 0,
        final_rate: 0,
        cruise_rate: 0,
        accelerate_until: 0,
        decelerate_after: 0,
        flags: BlockFlags {
            nominal_length: false,
            recalculate: false,
            busy: false,
            homing: false,
        },
        homing_axis: None,
        endstop_motion: [0; 3],
        advance: None,
    };

    /// Build the step part of a block from signed actuator deltas.
    pub fn from_delta(delta: [i32; 4]) -> Self {
        let mut block = Block::EMPTY;
        for (i, &d) in delta.iter().enumerate() {
            block.steps[i] = d.unsigned_abs();
            if d < 0 {
                block.direction_bits |= 1 << i;
            }
        }

        let (dominant, count) = block
            .steps
            .iter()
            .enumerate()
            .fold((0, 0), |best, (i, &s)| if s > best.1 { (i, s) } else { best });
        block.dominant = Axis::from_index(dominant).unwrap_or(Axis::X);
        block.step_event_count = count;
        block
    }

    /// Direction of one actuator.
    #[inline]
    pub fn direction(&self, axis: Axis) -> Direction {
        if self.direction_bits & (1 << axis.index()) != 0 {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }

    /// Signed step delta of one actuator.
    #[inline]
    pub fn signed_steps(&self, axis: Axis) -> i32 {
        self.steps[axis.index()] as i32 * self.direction(axis).sign()
    }

    /// Whether any positioning actuator moves.
    #[inline]
    pub fn has_motion_steps(&self) -> bool {
        self.steps[..3].iter().any(|&s| s != 0)
    }

    /// Whether the block is owned by the step generator.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.flags.busy
    }
}

impl Default for Block {
    fn default() -> Self {
        Block::EMPTY
    }
}
