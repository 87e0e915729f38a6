//! Step generation - the timer interrupt body.
//!
//! [`StepperEngine::tick`] is called once per timer interrupt. It claims the
//! oldest block, drives DIR once per block, runs the Bresenham step loop for
//! every actuator against the dominant step count and works out the delay to
//! the next interrupt from the block's trapezoid. Everything in here is
//! integer arithmetic with bounded loops.
//!
//! The ramps are straight lines in time unless S-curve acceleration is on, in
//! which case each ramp follows a precomputed [`BezierRamp`] between the same
//! rates over the same duration. Linear advance lead steps are issued after
//! the block's own steps and are paced by the time between interrupts.

use crate::config::{Axis, MachineConfig};
use crate::endstop::{EndstopInputs, EndstopMonitor};
use crate::error::{Fault, MotorError, PlannerError};
use crate::kinematics::Kinematics;
use crate::motor::{extruder_channel, ChannelMask, PositionState, StepOutputs, MAX_CHANNELS};
use crate::planner::{AdvanceLead, Block, SegmentBuffer};

use super::advance::AdvanceState;
use super::babystep::Babystepper;
use super::profile::{Direction, MotionPhase};
use super::scurve::BezierRamp;
use super::timing::IntervalTable;

/// Something that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickEvent {
    /// The block finished all of its steps.
    BlockCompleted {
        /// Sequence number of the block.
        sequence: u32,
    },
    /// Motion halted and the fault is latched.
    Halted(Fault),
    /// The endstop of a homing move triggered and the move was cut short.
    HomingTriggered {
        /// Axis being homed.
        axis: Axis,
    },
    /// A homing move ran its full length without reaching the switch.
    HomingFailed {
        /// Axis being homed.
        axis: Axis,
    },
    /// A block retired early by a controlled stop.
    Stopped {
        /// Sequence number of the block.
        sequence: u32,
    },
}

/// Result of one timer interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Step events issued in this tick.
    pub steps: u32,
    /// Ticks until the next interrupt; `None` means the timer may stop.
    pub next_interval: Option<u32>,
    /// Event raised in this tick.
    pub event: Option<TickEvent>,
}

impl TickOutcome {
    const IDLE: Self = Self {
        steps: 0,
        next_interval: None,
        event: None,
    };

    /// Whether the engine asked to be stopped.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.next_interval.is_none()
    }
}

/// Result of a homing move, picked up by the main context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomingEvent {
    /// Axis being homed.
    pub axis: Axis,
    /// `true` if the switch was reached.
    pub triggered: bool,
}

/// Execution state of the block being stepped.
#[derive(Debug, Clone)]
struct ActiveBlock {
    sequence: u32,
    steps: [u32; 4],
    directions: [Direction; 4],
    channels: [usize; 4],
    step_event_count: u32,
    /// Step events to run; lowered by a controlled stop.
    end: u32,
    counters: [i32; 4],
    completed: u32,
    accelerate_until: u32,
    decelerate_after: u32,
    initial_rate: u32,
    nominal_rate: u32,
    final_rate: u32,
    acceleration_rate: u32,
    acceleration_steps_per_s2: u32,
    acc_step_rate: u32,
    current_rate: u32,
    acceleration_time: u32,
    deceleration_time: u32,
    ticks_nominal: u32,
    step_loops_nominal: u8,
    step_loops: u8,
    interval: u32,
    /// S-curve ramps; `None` runs the linear ramps.
    accel_ramp: Option<BezierRamp>,
    decel_ramp: Option<BezierRamp>,
    advance: Option<AdvanceLead>,
    homing_axis: Option<Axis>,
    endstop_motion: [i8; 3],
    stopping: bool,
}

impl ActiveBlock {
    /// `s_curve` carries the timer frequency when S-curve ramps are enabled.
    fn new(block: &Block, table: &IntervalTable, s_curve: Option<u32>) -> Self {
        let e_channel = extruder_channel(block.extruder);
        let (ticks_nominal, step_loops_nominal) = table.interval(block.nominal_rate);
        let (interval, step_loops) = table.interval(block.initial_rate);
        let start = -((block.step_event_count >> 1) as i32);

        let cruise_rate = match block.cruise_rate {
            0 => block.nominal_rate,
            rate => rate,
        };
        let accel = block.acceleration_steps_per_s2;
        let accel_ramp = s_curve.map(|timer| BezierRamp::between(block.initial_rate, cruise_rate, accel, timer));
        let decel_ramp = s_curve.map(|timer| BezierRamp::between(cruise_rate, block.final_rate, accel, timer));

        Self {
            sequence: block.sequence,
            steps: block.steps,
            directions: Axis::ALL.map(|axis| block.direction(axis)),
            channels: [0, 1, 2, e_channel],
            step_event_count: block.step_event_count,
            end: block.step_event_count,
            counters: [start; 4],
            completed: 0,
            accelerate_until: block.accelerate_until,
            decelerate_after: block.decelerate_after,
            initial_rate: block.initial_rate,
            nominal_rate: block.nominal_rate,
            final_rate: block.final_rate,
            acceleration_rate: block.acceleration_rate,
            acceleration_steps_per_s2: block.acceleration_steps_per_s2,
            acc_step_rate: block.initial_rate,
            current_rate: block.initial_rate,
            acceleration_time: interval,
            deceleration_time: 0,
            ticks_nominal,
            step_loops_nominal,
            step_loops,
            interval,
            accel_ramp,
            decel_ramp,
            advance: block.advance,
            homing_axis: block.homing_axis,
            endstop_motion: block.endstop_motion,
            stopping: false,
        }
    }

    #[inline]
    fn is_done(&self) -> bool {
        self.completed >= self.end
    }

    #[inline]
    fn is_decelerating(&self) -> bool {
        self.completed > self.decelerate_after
    }

    /// Work out the rate for the next interrupt.
    fn advance_rate(&mut self, table: &IntervalTable) {
        let (interval, loops) = if self.completed <= self.accelerate_until {
            let rate = match &self.accel_ramp {
                Some(ramp) => ramp.eval(self.acceleration_time).max(self.acc_step_rate),
                None => self
                    .initial_rate
                    .saturating_add(mul_shift24(self.acceleration_time, self.acceleration_rate)),
            }
            .min(self.nominal_rate);
            self.acc_step_rate = rate;
            self.current_rate = rate;
            let (interval, loops) = table.interval(rate);
            self.acceleration_time = self.acceleration_time.saturating_add(interval);
            (interval, loops)
        } else if self.is_decelerating() {
            let rate = match &self.decel_ramp {
                Some(ramp) => ramp.eval(self.deceleration_time).min(self.current_rate),
                None => self
                    .acc_step_rate
                    .saturating_sub(mul_shift24(self.deceleration_time, self.acceleration_rate)),
            }
            .max(self.final_rate);
            self.current_rate = rate;
            let (interval, loops) = table.interval(rate);
            self.deceleration_time = self.deceleration_time.saturating_add(interval);
            (interval, loops)
        } else {
            self.current_rate = self.nominal_rate;
            (self.ticks_nominal, self.step_loops_nominal)
        };
        self.interval = interval;
        self.step_loops = loops;
    }
}

/// `(a * b) >> 24`, the fixed-point product used for rate integration.
#[inline]
fn mul_shift24(a: u32, b: u32) -> u32 {
    ((a as u64 * b as u64) >> 24).min(u32::MAX as u64) as u32
}

/// Tick-driven step generator.
#[derive(Debug, Clone)]
pub struct StepperEngine {
    table: IntervalTable,
    timer_frequency: u32,
    s_curve: bool,
    min_step_rate: u32,
    direction_delay_ticks: u32,
    idle_interval: u32,
    /// DIR level last written per channel.
    last_direction: [Option<Direction>; MAX_CHANNELS],
    active: Option<ActiveBlock>,
    fault: Option<Fault>,
    monitor: EndstopMonitor,
    babysteps: Babystepper,
    advance: AdvanceState,
    /// Interval returned by the previous tick.
    scheduled: u32,
    homing_event: Option<HomingEvent>,
}

impl StepperEngine {
    /// Create an idle engine for a machine.
    pub fn new(config: &MachineConfig, kinematics: &Kinematics) -> Self {
        let stepper = &config.stepper;
        Self {
            table: IntervalTable::new(stepper),
            timer_frequency: stepper.timer_frequency,
            s_curve: stepper.s_curve,
            min_step_rate: stepper.min_step_rate.max(1),
            direction_delay_ticks: stepper.direction_delay_ticks,
            idle_interval: (stepper.timer_frequency / 1000).max(1),
            last_direction: [None; MAX_CHANNELS],
            active: None,
            fault: None,
            monitor: EndstopMonitor::new(config),
            babysteps: Babystepper::new(kinematics),
            advance: AdvanceState::new(),
            scheduled: 0,
            homing_event: None,
        }
    }

    /// Run one timer interrupt.
    ///
    /// Claims the next block if none is running, samples the endstops, issues
    /// up to `step_loops` step events and schedules the next interrupt. Lead
    /// steps owed by linear advance follow the block's steps; the timer keeps
    /// running after the buffer drains until the lead is back to zero.
    pub fn tick<const N: usize, O, E>(
        &mut self,
        buffer: &mut SegmentBuffer<N>,
        position: &mut PositionState,
        outputs: &mut O,
        endstops: &mut E,
    ) -> TickOutcome
    where
        O: StepOutputs,
        E: EndstopInputs,
    {
        let elapsed = core::mem::take(&mut self.scheduled);
        let mut outcome = self.step_tick(buffer, position, outputs, endstops);
        if self.fault.is_some() {
            return outcome;
        }

        let settling = match &self.active {
            Some(block) => {
                self.advance
                    .follow(block.advance.as_ref(), block.channels[3], block.is_decelerating());
                block.completed == 0
            }
            None => {
                if buffer.is_empty() {
                    self.advance.release();
                }
                false
            }
        };
        // No lead steps while DIR is settling.
        if !settling && self.advance.run(elapsed, outputs, &self.last_direction).is_err() {
            return self.halt(Fault::OutputFault, buffer);
        }

        if outcome.next_interval.is_none() && self.advance.is_pending() {
            outcome.next_interval = Some(self.advance.interval());
        }
        self.scheduled = outcome.next_interval.unwrap_or(0);
        outcome
    }

    fn step_tick<const N: usize, O, E>(
        &mut self,
        buffer: &mut SegmentBuffer<N>,
        position: &mut PositionState,
        outputs: &mut O,
        endstops: &mut E,
    ) -> TickOutcome
    where
        O: StepOutputs,
        E: EndstopInputs,
    {
        if self.fault.is_some() {
            return TickOutcome::IDLE;
        }

        let mut block = match self.active.take() {
            Some(block) => block,
            None => match self.start_block(buffer, outputs) {
                Ok(Some((block, 0))) => block,
                Ok(Some((block, delay))) => {
                    // Let the drivers settle on the new DIR level.
                    self.active = Some(block);
                    return TickOutcome {
                        steps: 0,
                        next_interval: Some(delay),
                        event: None,
                    };
                }
                Ok(None) => return self.idle_tick(outputs, buffer),
                Err(_) => return self.halt(Fault::OutputFault, buffer),
            },
        };

        if block.endstop_motion != [0; 3] && (block.homing_axis.is_some() || self.monitor.check_during_moves()) {
            if let Some(axis) = self.monitor.sample(endstops, block.endstop_motion) {
                return match block.homing_axis {
                    Some(homing) if homing == axis => {
                        info!("homing {}: endstop reached", axis);
                        buffer.release_front();
                        self.monitor.reset();
                        self.homing_event = Some(HomingEvent { axis, triggered: true });
                        TickOutcome {
                            steps: 0,
                            next_interval: self.next_after_block(buffer, block.interval),
                            event: Some(TickEvent::HomingTriggered { axis }),
                        }
                    }
                    _ => self.halt(Fault::EndstopHit(axis), buffer),
                };
            }
        }

        let mut steps = 0;
        for _ in 0..block.step_loops {
            let mut mask: ChannelMask = 0;
            for i in 0..4 {
                block.counters[i] += block.steps[i] as i32;
                if block.counters[i] > 0 {
                    block.counters[i] -= block.step_event_count as i32;
                    mask |= 1 << block.channels[i];
                }
            }
            if outputs.pulse(mask).is_err() {
                return self.halt(Fault::OutputFault, buffer);
            }
            for i in 0..4 {
                if mask & (1 << block.channels[i]) != 0 {
                    position.step(i, block.directions[i]);
                }
            }
            block.completed += 1;
            steps += 1;
            if block.is_done() {
                break;
            }
        }

        if self.babysteps.is_pending() && self.babysteps.run(outputs, &self.last_direction).is_err() {
            return self.halt(Fault::OutputFault, buffer);
        }

        if block.is_done() {
            return self.finish_block(block, steps, buffer);
        }

        block.advance_rate(&self.table);
        let interval = block.interval;
        self.active = Some(block);
        TickOutcome {
            steps,
            next_interval: Some(interval),
            event: None,
        }
    }

    /// Claim the oldest block and write its DIR levels.
    ///
    /// Returns the block and the settle delay owed before its first step.
    fn start_block<const N: usize, O: StepOutputs>(
        &mut self,
        buffer: &mut SegmentBuffer<N>,
        outputs: &mut O,
    ) -> Result<Option<(ActiveBlock, u32)>, MotorError> {
        let block = loop {
            match buffer.claim_front() {
                Some(block) if block.step_event_count == 0 => {
                    buffer.release_front();
                }
                Some(block) => break *block,
                None => return Ok(None),
            }
        };

        let s_curve = self.s_curve.then_some(self.timer_frequency);
        let active = ActiveBlock::new(&block, &self.table, s_curve);
        let mut changed = false;
        for i in 0..4 {
            if active.steps[i] == 0 {
                continue;
            }
            let channel = active.channels[i];
            let direction = active.directions[i];
            let last = self.last_direction.get_mut(channel).ok_or(MotorError::PinError)?;
            if *last != Some(direction) {
                outputs.set_direction(channel, direction)?;
                *last = Some(direction);
                changed = true;
            }
        }

        self.monitor.reset();
        trace!("block {} started, {} step events", active.sequence, active.end);
        let delay = if changed { self.direction_delay_ticks } else { 0 };
        Ok(Some((active, delay)))
    }

    fn idle_tick<const N: usize, O: StepOutputs>(
        &mut self,
        outputs: &mut O,
        buffer: &mut SegmentBuffer<N>,
    ) -> TickOutcome {
        if !self.babysteps.is_pending() {
            return TickOutcome::IDLE;
        }
        if self.babysteps.run(outputs, &self.last_direction).is_err() {
            return self.halt(Fault::OutputFault, buffer);
        }
        TickOutcome {
            steps: 0,
            next_interval: self.babysteps.is_pending().then_some(self.idle_interval),
            event: None,
        }
    }

    fn finish_block<const N: usize>(
        &mut self,
        block: ActiveBlock,
        steps: u32,
        buffer: &mut SegmentBuffer<N>,
    ) -> TickOutcome {
        buffer.release_front();
        self.monitor.reset();

        let event = match (block.stopping, block.homing_axis) {
            (true, homing) => {
                if let Some(axis) = homing {
                    self.homing_event = Some(HomingEvent { axis, triggered: false });
                }
                debug!("block {} stopped after {} step events", block.sequence, block.completed);
                TickEvent::Stopped {
                    sequence: block.sequence,
                }
            }
            (false, Some(axis)) => {
                warn!("homing {}: endstop not reached", axis);
                self.homing_event = Some(HomingEvent { axis, triggered: false });
                TickEvent::HomingFailed { axis }
            }
            (false, None) => TickEvent::BlockCompleted {
                sequence: block.sequence,
            },
        };

        TickOutcome {
            steps,
            next_interval: self.next_after_block(buffer, block.interval),
            event: Some(event),
        }
    }

    fn next_after_block<const N: usize>(&self, buffer: &SegmentBuffer<N>, interval: u32) -> Option<u32> {
        if !buffer.is_empty() {
            Some(interval)
        } else if self.babysteps.is_pending() {
            Some(self.idle_interval)
        } else {
            None
        }
    }

    /// Stop immediately and latch `fault`.
    ///
    /// The running block and every queued block are dropped; no pulse is issued
    /// until the fault is cleared.
    pub fn halt<const N: usize>(&mut self, fault: Fault, buffer: &mut SegmentBuffer<N>) -> TickOutcome {
        error!("motion halted: {}", fault);
        buffer.clear();
        self.active = None;
        self.fault = Some(fault);
        self.homing_event = None;
        self.babysteps.clear();
        self.advance.clear();
        self.scheduled = 0;
        self.monitor.reset();
        TickOutcome {
            steps: 0,
            next_interval: None,
            event: Some(TickEvent::Halted(fault)),
        }
    }

    /// Decelerate the running block to the minimum step rate and drop the rest.
    ///
    /// Returns `true` if a block is still decelerating; the engine goes idle
    /// once it retires.
    pub fn quick_stop<const N: usize>(&mut self, buffer: &mut SegmentBuffer<N>) -> bool {
        let dropped = buffer.discard_unclaimed();
        let min_rate = self.min_step_rate;
        let timer = self.timer_frequency;

        let Some(block) = self.active.as_mut() else {
            info!("quick stop: {} queued blocks dropped", dropped);
            return false;
        };

        let rate = block.current_rate as u64;
        let floor = (min_rate as u64).min(rate);
        let accel = (block.acceleration_steps_per_s2 as u64).max(1);
        let needed = (rate * rate - floor * floor) / (2 * accel);
        let remaining = block.end - block.completed;
        let stop_steps = (needed.max(1) as u32).min(remaining);

        block.end = block.completed + stop_steps;
        block.accelerate_until = block.accelerate_until.min(block.completed);
        block.decelerate_after = block.completed;
        block.deceleration_time = 0;
        block.acc_step_rate = block.current_rate;
        block.final_rate = min_rate.min(block.current_rate);
        if block.decel_ramp.is_some() {
            block.decel_ramp = Some(BezierRamp::between(
                block.current_rate,
                block.final_rate,
                block.acceleration_steps_per_s2,
                timer,
            ));
        }
        block.stopping = true;

        info!(
            "quick stop: block {} stops in {} step events, {} queued blocks dropped",
            block.sequence,
            stop_steps,
            dropped
        );
        true
    }

    /// Latched fault, if any.
    #[inline]
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    /// Clear a latched fault.
    pub fn clear_fault(&mut self) -> Option<Fault> {
        self.fault.take()
    }

    /// Whether a block is being stepped.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether a controlled stop is still decelerating.
    #[inline]
    pub fn is_stopping(&self) -> bool {
        self.active.as_ref().is_some_and(|b| b.stopping)
    }

    /// Phase of the running block.
    pub fn phase(&self) -> MotionPhase {
        match &self.active {
            Some(b) => MotionPhase::at(b.completed, b.accelerate_until, b.decelerate_after, b.end),
            None => MotionPhase::Complete,
        }
    }

    /// Step rate of the running block in steps/s (0 when idle).
    #[inline]
    pub fn current_rate(&self) -> u32 {
        self.active.as_ref().map_or(0, |b| b.current_rate)
    }

    /// Sequence number of the running block.
    #[inline]
    pub fn active_sequence(&self) -> Option<u32> {
        self.active.as_ref().map(|b| b.sequence)
    }

    /// Delay used to start the timer for babysteps alone.
    #[inline]
    pub fn idle_interval(&self) -> u32 {
        self.idle_interval
    }

    /// Queue a babystep.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::Halted` while a fault is latched and
    /// `PlannerError::BabystepUnsupported` for axes the kinematics cannot nudge.
    pub fn queue_babystep(&mut self, axis: Axis, direction: Direction) -> Result<(), PlannerError> {
        if self.fault.is_some() {
            return Err(PlannerError::Halted);
        }
        self.babysteps.queue(axis, direction)
    }

    /// Whether babysteps are waiting.
    #[inline]
    pub fn babystep_pending(&self) -> bool {
        self.babysteps.is_pending()
    }

    /// Linear advance lead currently applied, in E steps.
    #[inline]
    pub fn advance_lead_steps(&self) -> u32 {
        self.advance.applied()
    }

    /// Whether lead steps are still owed.
    #[inline]
    pub fn advance_pending(&self) -> bool {
        self.advance.is_pending()
    }

    /// Net babysteps issued on an axis.
    #[inline]
    pub fn babystep_offset_steps(&self, axis: Axis) -> i32 {
        self.babysteps.offset_steps(axis)
    }

    /// Take the result of the last homing move.
    pub fn take_homing_event(&mut self) -> Option<HomingEvent> {
        self.homing_event.take()
    }

    /// Whether a homing result is waiting to be applied.
    #[inline]
    pub fn has_homing_event(&self) -> bool {
        self.homing_event.is_some()
    }

    /// The endstop monitor.
    #[inline]
    pub fn monitor(&self) -> &EndstopMonitor {
        &self.monitor
    }
}
