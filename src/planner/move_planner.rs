//! Move admission: from a requested pose to queued blocks.

use libm::{ceilf, fabsf, roundf, sqrtf};

use crate::config::{
    Axis, AxisConstraints, EndstopConfig, KinematicsConfig, MachineConfig, MmPerSec, PlannerConfig,
};
use crate::error::{Error, KinematicsError, PlannerError, Result};
use crate::kinematics::{KinematicModel, Kinematics, Pose, StepMapper};
use crate::motion::timing::MAX_RATE;

use super::block::{AdvanceLead, Block, BlockFlags};
use super::buffer::SegmentBuffer;
use super::junction::{max_junction_speed, unit_vector, Junction};
use super::lookahead;
use super::trapezoid::max_allowable_speed;

/// Extrusion per mm of travel above which a move gets no advance lead.
const MAX_ADVANCE_RATIO: f32 = 3.0;

/// A straight move on a nonlinear machine, queued segment by segment.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SegmentedMove {
    from: Pose,
    to: Pose,
    feedrate: f32,
    segments: u32,
    next: u32,
}

/// Trajectory planner.
///
/// Owns the planned position (the actuator steps at the end of the newest
/// queued block) and turns requested poses into blocks, keeping the lookahead
/// state of the last junction.
#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
    kinematics_config: KinematicsConfig,
    mapper: StepMapper,
    constraints: [AxisConstraints; 4],
    timer_frequency: u32,
    min_step_rate: u32,
    position: [i32; 4],
    pose: Pose,
    previous_unit: [f32; 4],
    previous_nominal_speed: f32,
    next_sequence: u32,
    extruder: u8,
    pending: Option<SegmentedMove>,
}

impl Planner {
    /// Create a planner at the origin.
    pub fn new(config: &MachineConfig) -> Self {
        let constraints: [AxisConstraints; 4] =
            core::array::from_fn(|i| AxisConstraints::from_config(config.axes.get(Axis::ALL[i])));
        let mapper = StepMapper::new(Kinematics::from_config(&config.kinematics), &constraints);
        let mut planner = Self {
            config: config.planner.clone(),
            kinematics_config: config.kinematics.clone(),
            mapper,
            constraints,
            timer_frequency: config.stepper.timer_frequency,
            min_step_rate: config.stepper.min_step_rate,
            position: [0; 4],
            pose: Pose::default(),
            previous_unit: [0.0; 4],
            previous_nominal_speed: 0.0,
            next_sequence: 0,
            extruder: 0,
            pending: None,
        };
        // Nonlinear machines start with the effector at the origin.
        if let Ok(actuators) = planner.mapper.kinematics().inverse(&Pose::default()) {
            let [a, b, c] = planner.mapper.steps_of_actuators(actuators);
            planner.position = [a, b, c, 0];
        }
        planner.pose = planner.mapper.pose_of(&planner.position);
        planner
    }

    /// Planned actuator position (end of the newest queued block).
    #[inline]
    pub fn position(&self) -> [i32; 4] {
        self.position
    }

    /// Pose at the end of the newest queued block.
    #[inline]
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// The pose-to-steps mapper.
    #[inline]
    pub fn mapper(&self) -> &StepMapper {
        &self.mapper
    }

    /// Derived per-axis constraints.
    #[inline]
    pub fn constraints(&self) -> &[AxisConstraints; 4] {
        &self.constraints
    }

    /// Planner settings.
    #[inline]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Active extruder.
    #[inline]
    pub fn extruder(&self) -> u8 {
        self.extruder
    }

    /// Select the extruder driven by subsequent E moves.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::InvalidExtruder` for an unconfigured index.
    pub fn set_extruder(&mut self, extruder: u8) -> core::result::Result<(), PlannerError> {
        if extruder >= self.config.extruders {
            return Err(PlannerError::InvalidExtruder(extruder));
        }
        self.extruder = extruder;
        Ok(())
    }

    /// Whether segments of an accepted move are still waiting for buffer space.
    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget the unqueued rest of a segmented move.
    pub fn discard_pending(&mut self) {
        self.pending = None;
    }

    /// Restart planning from an executed actuator position.
    ///
    /// Used after homing and stops, when the queued blocks no longer describe
    /// where the machine is.
    pub fn resync(&mut self, steps: [i32; 4]) {
        self.position = steps;
        self.pose = self.mapper.pose_of(&steps);
        self.previous_unit = [0.0; 4];
        self.previous_nominal_speed = 0.0;
        self.pending = None;
        self.mapper.reset_residual();
    }

    /// Rewrite one axis of the executed position after homing and restart
    /// planning from it.
    ///
    /// On linear machines `value` is the Cartesian coordinate of `axis`; on
    /// nonlinear ones it is the position of the actuator with the same index.
    /// Returns the new actuator position.
    pub fn set_homed(&mut self, steps: [i32; 4], axis: Axis, value: f32) -> [i32; 4] {
        let mut steps = steps;
        if self.mapper.kinematics().is_linear() {
            let mut pose = self.mapper.pose_of(&steps);
            pose.set(axis, value);
            if let Ok(mapped) = self.mapper.map(&pose, &steps) {
                steps = mapped;
            }
        } else {
            steps[axis.index()] = roundf(value * self.mapper.steps_per_unit(axis)) as i32;
        }
        self.resync(steps);
        steps
    }

    /// Apply per-axis soft limits to a target pose.
    ///
    /// # Errors
    ///
    /// Returns `KinematicsError::OutsideSoftLimits` when a reject-policy limit is violated.
    pub fn apply_limits(&self, target: Pose) -> core::result::Result<Pose, KinematicsError> {
        let mut pose = target;
        for axis in Axis::ALL {
            if let Some(limits) = self.constraints[axis.index()].limits {
                pose.set(axis, limits.enforce(axis, pose.get(axis))?);
            }
        }
        Ok(pose)
    }

    /// Queue a straight move to `target` without waiting.
    ///
    /// On nonlinear machines the move is split into segments; segments that do
    /// not fit yet are kept and queued by [`flush_pending`](Self::flush_pending).
    ///
    /// # Errors
    ///
    /// - `PlannerError::BufferFull` if no slot is free or an earlier move still
    ///   has segments waiting
    /// - `PlannerError::InvalidFeedrate` for a non-positive feedrate
    /// - `KinematicsError` if the target is unreachable or outside soft limits
    pub fn try_plan_move<const N: usize>(
        &mut self,
        buffer: &mut SegmentBuffer<N>,
        target: Pose,
        feedrate: MmPerSec,
    ) -> Result<()> {
        self.flush_pending(buffer)?;
        if self.pending.is_some() || buffer.is_full() {
            trace!("planner backpressure: buffer full");
            return Err(PlannerError::BufferFull.into());
        }

        let feedrate = feedrate.value();
        if !feedrate.is_finite() || feedrate <= 0.0 {
            return Err(PlannerError::InvalidFeedrate(feedrate).into());
        }

        let target = self.apply_limits(target)?;

        if self.mapper.kinematics().is_linear() {
            let steps = self.mapper.map(&target, &self.position)?;
            self.queue_pose(buffer, target, steps, feedrate)?;
            return Ok(());
        }

        // Reject before any segment is queued.
        self.mapper.kinematics().inverse(&target)?;

        let distance = match self.pose.distance_xyz(&target) {
            d if d > 0.0 => d,
            _ => fabsf(target.e - self.pose.e),
        };
        let segments = self.mapper.segments_for(&self.kinematics_config, distance / feedrate);
        self.pending = Some(SegmentedMove {
            from: self.pose,
            to: target,
            feedrate,
            segments,
            next: 1,
        });
        self.flush_pending(buffer)
    }

    /// Queue as many waiting segments as the buffer has room for.
    ///
    /// # Errors
    ///
    /// Returns `KinematicsError::Unreachable` if a segment leaves the envelope;
    /// the rest of that move is dropped.
    pub fn flush_pending<const N: usize>(&mut self, buffer: &mut SegmentBuffer<N>) -> Result<()> {
        while let Some(mut segment) = self.pending {
            if buffer.is_full() {
                return Ok(());
            }

            let pose = if segment.next >= segment.segments {
                segment.to
            } else {
                segment
                    .from
                    .lerp(&segment.to, segment.next as f32 / segment.segments as f32)
            };

            let steps = match self.mapper.map(&pose, &self.position) {
                Ok(steps) => steps,
                Err(e) => {
                    self.pending = None;
                    return Err(Error::Kinematics(e));
                }
            };
            self.queue_pose(buffer, pose, steps, segment.feedrate)?;

            segment.next += 1;
            self.pending = if segment.next > segment.segments {
                None
            } else {
                Some(segment)
            };
        }
        Ok(())
    }

    fn queue_pose<const N: usize>(
        &mut self,
        buffer: &mut SegmentBuffer<N>,
        pose: Pose,
        steps: [i32; 4],
        feedrate: f32,
    ) -> Result<()> {
        let cartesian = [
            pose.x - self.pose.x,
            pose.y - self.pose.y,
            pose.z - self.pose.z,
            pose.e - self.pose.e,
        ];
        if self.append(buffer, steps, cartesian, feedrate, None)? {
            self.pose = pose;
        }
        Ok(())
    }

    /// Queue a homing move on `axis` toward its endstop.
    ///
    /// The move covers 1.5x the configured travel and is cut short by the
    /// endstop.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::BufferFull` if no slot is free.
    pub fn plan_homing<const N: usize>(
        &mut self,
        buffer: &mut SegmentBuffer<N>,
        axis: Axis,
        endstop: &EndstopConfig,
    ) -> Result<()> {
        let pattern = self.mapper.kinematics().home_actuators(axis);
        let sign = endstop.direction_sign();
        let travel = endstop.max_travel.value() * 1.5;

        let mut target = self.position;
        for (i, &dir) in pattern.iter().enumerate() {
            if dir != 0 {
                let steps = roundf(sign * travel * self.mapper.steps_per_unit(Axis::ALL[i])) as i32;
                target[i] = target[i].saturating_add(dir as i32 * steps);
            }
        }

        let mut cartesian = [0.0; 4];
        cartesian[axis.index()] = sign * travel;

        self.pending = None;
        self.append(buffer, target, cartesian, endstop.homing_feedrate.value(), Some(axis))
            .map(|_| ())
    }

    /// Lead plan for a printing move, if linear advance applies to it.
    ///
    /// Only moves that travel and extrude forward get a lead; extrusion-heavy
    /// moves above [`MAX_ADVANCE_RATIO`] are left alone.
    fn advance_lead(&self, block: &Block, extrusion: f32) -> Option<AdvanceLead> {
        let k = self.config.advance_k(block.extruder);
        if k <= 0.0 || extrusion <= 0.0 || block.steps[3] == 0 || !block.has_motion_steps() {
            return None;
        }
        let ratio = extrusion / block.millimeters;
        if ratio > MAX_ADVANCE_RATIO {
            return None;
        }

        let steps_per_speed = ratio * k * self.mapper.steps_per_unit(Axis::E);
        let lead_rate = steps_per_speed * block.acceleration;
        if lead_rate <= 0.0 || !lead_rate.is_finite() {
            return None;
        }
        let fastest = (self.timer_frequency / MAX_RATE).max(1);
        let interval = (self.timer_frequency as f32 / lead_rate) as u32;
        Some(AdvanceLead {
            steps_per_speed,
            interval: interval.max(fastest),
            max_steps: 0,
            final_steps: 0,
        })
    }

    /// Build a block for the move from the planned position to `target` and
    /// queue it. Returns `Ok(false)` when the move is dropped or deferred.
    fn append<const N: usize>(
        &mut self,
        buffer: &mut SegmentBuffer<N>,
        target: [i32; 4],
        cartesian: [f32; 4],
        feedrate: f32,
        homing: Option<Axis>,
    ) -> Result<bool> {
        if buffer.is_full() {
            trace!("planner backpressure: buffer full");
            return Err(PlannerError::BufferFull.into());
        }

        let mut delta = [0i32; 4];
        for (i, d) in delta.iter_mut().enumerate() {
            *d = target[i]
                .checked_sub(self.position[i])
                .ok_or_else(|| KinematicsError::Unreachable {
                    x: self.pose.x + cartesian[0],
                    y: self.pose.y + cartesian[1],
                    z: self.pose.z + cartesian[2],
                })?;
        }
        let mut block = Block::from_delta(delta);

        if block.step_event_count == 0 {
            trace!("zero-length move discarded");
            return Ok(false);
        }
        // Too short to be worth a block: leave the planned position alone so
        // these steps are carried by the next move.
        if homing.is_none() && block.step_event_count < self.config.min_segment_steps {
            trace!("move of {} steps deferred", block.step_event_count);
            return Ok(false);
        }

        block.extruder = self.extruder;
        let has_esteps = block.steps[3] != 0;
        let feedrate = if has_esteps {
            feedrate.max(self.config.min_feedrate.value())
        } else {
            feedrate.max(self.config.min_travel_feedrate.value())
        };

        let min_segment = self.config.min_segment_steps.max(1);
        let mut millimeters = if block.steps[..3].iter().all(|&s| s < min_segment) {
            fabsf(cartesian[3])
        } else {
            sqrtf(cartesian[0] * cartesian[0] + cartesian[1] * cartesian[1] + cartesian[2] * cartesian[2])
        };
        if millimeters <= 0.0 || !millimeters.is_finite() {
            millimeters = block.step_event_count as f32 / self.mapper.steps_per_unit(block.dominant);
        }
        block.millimeters = millimeters;

        let inverse_millimeters = 1.0 / millimeters;
        let inverse_secs = feedrate * inverse_millimeters;
        block.nominal_speed = feedrate;
        block.nominal_rate = ceilf(block.step_event_count as f32 * inverse_secs) as u32;

        // Slow the whole move down if any actuator would exceed its max feedrate.
        let mut speed_factor = 1.0f32;
        for (i, c) in self.constraints.iter().enumerate() {
            if block.steps[i] == 0 {
                continue;
            }
            let current_speed = block.steps[i] as f32 / c.steps_per_unit * inverse_secs;
            if current_speed > c.max_feedrate.value() {
                speed_factor = speed_factor.min(c.max_feedrate.value() / current_speed);
            }
        }
        if speed_factor < 1.0 {
            block.nominal_speed *= speed_factor;
            block.nominal_rate = (block.nominal_rate as f32 * speed_factor) as u32;
        }
        block.nominal_rate = block.nominal_rate.max(1);

        let steps_per_mm = block.step_event_count as f32 * inverse_millimeters;
        let base = if !block.has_motion_steps() {
            self.config.retract_acceleration
        } else if has_esteps {
            self.config.acceleration
        } else {
            self.config.travel_acceleration
        };
        let mut accel = ceilf(base.value() * steps_per_mm) as u64;
        for (i, c) in self.constraints.iter().enumerate() {
            let steps = block.steps[i] as u64;
            if steps == 0 {
                continue;
            }
            let limit = c.max_acceleration_steps_per_sec2 as u64 * block.step_event_count as u64;
            if accel * steps > limit {
                accel = limit / steps;
            }
        }
        let accel = accel.clamp(1, u32::MAX as u64) as u32;
        block.acceleration_steps_per_s2 = accel;
        block.acceleration = accel as f32 / steps_per_mm;
        block.acceleration_rate = ((accel as u64) << 24).checked_div(self.timer_frequency as u64).unwrap_or(0) as u32;
        if homing.is_none() {
            block.advance = self.advance_lead(&block, cartesian[3]);
        }

        let min_speed = self.config.min_planner_speed.value();
        let unit = unit_vector(cartesian);
        let vmax_junction = if buffer.is_empty() || homing.is_some() {
            min_speed
        } else {
            max_junction_speed(
                &Junction {
                    previous_unit: self.previous_unit,
                    unit,
                    previous_nominal_speed: self.previous_nominal_speed,
                    nominal_speed: block.nominal_speed,
                    acceleration: block.acceleration,
                },
                self.config.junction_deviation,
                min_speed,
            )
        };

        block.max_entry_speed = vmax_junction.min(block.nominal_speed);
        block.entry_speed = min_speed.min(block.max_entry_speed);
        let v_allowable = max_allowable_speed(-block.acceleration, min_speed, millimeters);
        block.flags = BlockFlags {
            nominal_length: block.nominal_speed <= v_allowable,
            recalculate: true,
            busy: false,
            homing: homing.is_some(),
        };

        block.endstop_motion = match homing {
            Some(axis) => {
                let mut motion = [0i8; 3];
                if let Some(m) = motion.get_mut(axis.index()) {
                    *m = if cartesian[axis.index()] < 0.0 { -1 } else { 1 };
                }
                motion
            }
            None => self.mapper.kinematics().endstop_motion([delta[0], delta[1], delta[2]]),
        };
        block.homing_axis = homing;
        block.sequence = self.next_sequence;

        buffer.push(block)?;
        debug!(
            "block {} queued: {} steps at {} steps/s",
            block.sequence, block.step_event_count, block.nominal_rate
        );

        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.previous_unit = unit;
        self.previous_nominal_speed = block.nominal_speed;
        self.position = target;

        lookahead::recalculate(buffer, min_speed, self.min_step_rate);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixtures::machine;
    use crate::config::{EndstopSide, LimitPolicy, Millimeters, SoftLimits};

    #[test]
    fn test_single_move_block() {
        let mut planner = Planner::new(&machine(KinematicsConfig::Cartesian));
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        planner
            .try_plan_move(&mut buffer, Pose::new(10.0, 0.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();

        let block = buffer.front().copied().unwrap();
        assert_eq!(block.steps, [800, 0, 0, 0]);
        assert_eq!(block.dominant, Axis::X);
        assert_eq!(block.nominal_rate, 4000);
        assert!((block.millimeters - 10.0).abs() < 1e-5);
        // Travel move: 1500 mm/s² * 80 steps/mm.
        assert_eq!(block.acceleration_steps_per_s2, 120_000);
        assert_eq!(block.entry_speed, block.max_entry_speed);
        assert_eq!(planner.position(), [800, 0, 0, 0]);
    }

    #[test]
    fn test_zero_move_is_discarded() {
        let mut planner = Planner::new(&machine(KinematicsConfig::Cartesian));
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        planner.try_plan_move(&mut buffer, Pose::default(), MmPerSec(50.0)).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_feedrate_clamped_per_axis() {
        let mut planner = Planner::new(&machine(KinematicsConfig::Cartesian));
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        // Z tops out at 5 mm/s.
        planner
            .try_plan_move(&mut buffer, Pose::new(0.0, 0.0, 2.0, 0.0), MmPerSec(50.0))
            .unwrap();
        let block = buffer.front().copied().unwrap();
        assert!((block.nominal_speed - 5.0).abs() < 1e-3);
        assert!(block.nominal_rate <= 2000);
        // Z acceleration limit: 100 mm/s² * 400 steps/mm.
        assert!(block.acceleration_steps_per_s2 <= 40_000);
    }

    #[test]
    fn test_short_move_is_deferred_not_lost() {
        let mut config = machine(KinematicsConfig::Cartesian);
        config.planner.min_segment_steps = 5;
        let mut planner = Planner::new(&config);
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        planner
            .try_plan_move(&mut buffer, Pose::new(0.025, 0.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();
        assert!(buffer.is_empty());
        assert_eq!(planner.position(), [0; 4]);

        planner
            .try_plan_move(&mut buffer, Pose::new(1.0, 0.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();
        assert_eq!(buffer.front().map(|b| b.steps[0]), Some(80));
    }

    #[test]
    fn test_backpressure() {
        let mut planner = Planner::new(&machine(KinematicsConfig::Cartesian));
        let mut buffer: SegmentBuffer<2> = SegmentBuffer::new();

        planner
            .try_plan_move(&mut buffer, Pose::new(1.0, 0.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();
        planner
            .try_plan_move(&mut buffer, Pose::new(2.0, 0.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();
        let result = planner.try_plan_move(&mut buffer, Pose::new(3.0, 0.0, 0.0, 0.0), MmPerSec(50.0));
        assert_eq!(result, Err(Error::Planner(PlannerError::BufferFull)));
        assert_eq!(planner.position(), [160, 0, 0, 0]);
    }

    #[test]
    fn test_soft_limits() {
        let mut config = machine(KinematicsConfig::Cartesian);
        config.axes.x.limits = Some(SoftLimits::new(Millimeters(0.0), Millimeters(200.0), LimitPolicy::Reject));
        config.axes.y.limits = Some(SoftLimits::new(Millimeters(0.0), Millimeters(200.0), LimitPolicy::Clamp));
        let mut planner = Planner::new(&config);
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        let rejected = planner.try_plan_move(&mut buffer, Pose::new(250.0, 0.0, 0.0, 0.0), MmPerSec(50.0));
        assert!(matches!(
            rejected,
            Err(Error::Kinematics(KinematicsError::OutsideSoftLimits { axis: Axis::X, .. }))
        ));

        planner
            .try_plan_move(&mut buffer, Pose::new(10.0, 250.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();
        assert_eq!(planner.position()[1], 16_000);
    }

    #[test]
    fn test_advance_lead_only_on_printing_moves() {
        let mut config = machine(KinematicsConfig::Cartesian);
        config.planner.advance_k.push(0.2).unwrap();
        let mut planner = Planner::new(&config);
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        // 20 mm with 1 mm of filament: 0.05 * 0.2 * 100 steps per mm/s.
        planner
            .try_plan_move(&mut buffer, Pose::new(20.0, 0.0, 0.0, 1.0), MmPerSec(50.0))
            .unwrap();
        let lead = buffer.get(0).and_then(|b| b.advance).unwrap();
        assert!((lead.steps_per_speed - 1.0).abs() < 1e-4);
        // 2 MHz over 1 step/(mm/s) * 1000 mm/s².
        assert!(lead.interval.abs_diff(2000) <= 1, "interval {}", lead.interval);
        assert_eq!(lead.max_steps, 50);

        // Travel, retract and extrusion-heavy moves get no lead.
        planner
            .try_plan_move(&mut buffer, Pose::new(30.0, 0.0, 0.0, 1.0), MmPerSec(50.0))
            .unwrap();
        planner
            .try_plan_move(&mut buffer, Pose::new(40.0, 0.0, 0.0, 0.5), MmPerSec(50.0))
            .unwrap();
        planner
            .try_plan_move(&mut buffer, Pose::new(40.5, 0.0, 0.0, 3.0), MmPerSec(20.0))
            .unwrap();
        for index in 1..4 {
            assert_eq!(buffer.get(index).and_then(|b| b.advance), None, "block {}", index);
        }
    }

    #[test]
    fn test_advance_disabled_without_k() {
        let mut planner = Planner::new(&machine(KinematicsConfig::Cartesian));
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();
        planner
            .try_plan_move(&mut buffer, Pose::new(20.0, 0.0, 0.0, 1.0), MmPerSec(50.0))
            .unwrap();
        assert_eq!(buffer.get(0).and_then(|b| b.advance), None);
    }

    #[test]
    fn test_step_delta_overflow_unreachable() {
        let mut planner = Planner::new(&machine(KinematicsConfig::Cartesian));
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        // Far enough that the step target saturates at i32::MAX.
        planner
            .try_plan_move(&mut buffer, Pose::new(3.0e7, 0.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();
        assert_eq!(planner.position()[0], i32::MAX);

        let result = planner.try_plan_move(&mut buffer, Pose::new(-3.0e7, 0.0, 0.0, 0.0), MmPerSec(50.0));
        assert!(matches!(
            result,
            Err(Error::Kinematics(KinematicsError::Unreachable { .. }))
        ));
        assert_eq!(planner.position()[0], i32::MAX);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_invalid_feedrate() {
        let mut planner = Planner::new(&machine(KinematicsConfig::Cartesian));
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();
        let result = planner.try_plan_move(&mut buffer, Pose::new(1.0, 0.0, 0.0, 0.0), MmPerSec(0.0));
        assert!(matches!(result, Err(Error::Planner(PlannerError::InvalidFeedrate(_)))));
    }

    #[test]
    fn test_print_and_retract_acceleration() {
        let mut planner = Planner::new(&machine(KinematicsConfig::Cartesian));
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        planner
            .try_plan_move(&mut buffer, Pose::new(10.0, 0.0, 0.0, 1.0), MmPerSec(50.0))
            .unwrap();
        planner
            .try_plan_move(&mut buffer, Pose::new(10.0, 0.0, 0.0, 0.0), MmPerSec(40.0))
            .unwrap();

        let print = buffer.get(0).copied().unwrap();
        let retract = buffer.get(1).copied().unwrap();
        assert!((print.acceleration - 1000.0).abs() < 1.0);
        assert!((retract.acceleration - 3000.0).abs() < 1.0);
        assert_eq!(retract.direction(Axis::E), crate::motion::Direction::Reverse);
        assert!((retract.millimeters - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_extruder_selection() {
        let mut config = machine(KinematicsConfig::Cartesian);
        config.planner.extruders = 2;
        let mut planner = Planner::new(&config);
        assert!(planner.set_extruder(1).is_ok());
        assert_eq!(planner.set_extruder(2), Err(PlannerError::InvalidExtruder(2)));

        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();
        planner
            .try_plan_move(&mut buffer, Pose::new(0.0, 0.0, 0.0, 5.0), MmPerSec(20.0))
            .unwrap();
        assert_eq!(buffer.front().map(|b| b.extruder), Some(1));
    }

    #[test]
    fn test_corexy_block_steps() {
        let mut planner = Planner::new(&machine(KinematicsConfig::CoreXy));
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        planner
            .try_plan_move(&mut buffer, Pose::new(0.0, 10.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();
        let block = buffer.front().copied().unwrap();
        assert_eq!(block.signed_steps(Axis::X), 800);
        assert_eq!(block.signed_steps(Axis::Y), -800);
        assert_eq!(block.endstop_motion, [0, 1, 0]);
    }

    #[test]
    fn test_delta_move_is_segmented() {
        let geometry = crate::config::DeltaGeometry {
            diagonal_rod: 250.0,
            radius: 120.0,
            printable_radius: 90.0,
            segments_per_second: 100.0,
        };
        let mut planner = Planner::new(&machine(KinematicsConfig::Delta(geometry)));
        let start = planner.position();
        let mut buffer: SegmentBuffer<4> = SegmentBuffer::new();

        // 20 mm at 50 mm/s = 0.4 s -> 40 segments, only 4 fit.
        planner
            .try_plan_move(&mut buffer, Pose::new(20.0, 0.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();
        assert!(buffer.is_full());
        assert!(planner.has_pending());

        let result = planner.try_plan_move(&mut buffer, Pose::new(0.0, 0.0, 0.0, 0.0), MmPerSec(50.0));
        assert_eq!(result, Err(Error::Planner(PlannerError::BufferFull)));

        // Drain and keep flushing until the move is fully queued.
        let mut executed = [0i32; 4];
        while planner.has_pending() {
            buffer.claim_front();
            let block = buffer.release_front().unwrap();
            for axis in Axis::ALL {
                executed[axis.index()] += block.signed_steps(axis);
            }
            planner.flush_pending(&mut buffer).unwrap();
        }
        while let Some(block) = buffer.release_front() {
            for axis in Axis::ALL {
                executed[axis.index()] += block.signed_steps(axis);
            }
        }

        assert_eq!(buffer.back().map(|b| b.sequence), None);
        for i in 0..4 {
            assert_eq!(start[i] + executed[i], planner.position()[i]);
        }
        let end = planner.pose();
        assert!((end.x - 20.0).abs() < 0.05);
    }

    #[test]
    fn test_homing_block() {
        let mut config = machine(KinematicsConfig::Cartesian);
        let endstop = EndstopConfig {
            side: EndstopSide::Min,
            inverted: false,
            home_position: Millimeters(0.0),
            homing_feedrate: MmPerSec(20.0),
            max_travel: Millimeters(200.0),
        };
        config.axes.x.endstop = Some(endstop.clone());
        let mut planner = Planner::new(&config);
        let mut buffer: SegmentBuffer<16> = SegmentBuffer::new();

        planner.plan_homing(&mut buffer, Axis::X, &endstop).unwrap();
        let block = buffer.front().copied().unwrap();
        assert!(block.flags.homing);
        assert_eq!(block.homing_axis, Some(Axis::X));
        assert_eq!(block.signed_steps(Axis::X), -24_000);
        assert_eq!(block.endstop_motion, [-1, 0, 0]);
    }

    #[test]
    fn test_set_homed_rewrites_one_axis() {
        let mut planner = Planner::new(&machine(KinematicsConfig::CoreXy));

        // Executed: x = 10 mm, y = 5 mm (A = 1200, B = 400 at 80 steps/mm).
        let steps = planner.set_homed([1200, 400, 40, 7], Axis::X, -2.0);
        let pose = planner.mapper().pose_of(&steps);
        assert!((pose.x + 2.0).abs() < 1e-4);
        assert!((pose.y - 5.0).abs() < 1e-4);
        assert_eq!(steps[2..], [40, 7]);
        assert_eq!(planner.position(), steps);
    }
}
