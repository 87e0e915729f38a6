//! The motion context: planner, segment buffer, step engine and hardware in
//! one owned value.

use crate::config::{Axis, MachineConfig, MmPerSec};
use crate::endstop::EndstopInputs;
use crate::error::{Error, Fault, PlannerError, Result};
use crate::kinematics::Pose;
use crate::motion::{Direction, HomingEvent, MotionPhase, StepperEngine, TickOutcome};
use crate::motor::{PositionState, StepOutputs, StepTimer};
use crate::planner::{Planner, SegmentBuffer};

/// Progress of the last homing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingStatus {
    /// The homing move is queued or running.
    InProgress(Axis),
    /// The endstop was reached and the axis position rewritten.
    Homed(Axis),
    /// The move ended without reaching the endstop, or was stopped.
    Failed(Axis),
}

/// Snapshot of the motion system for status reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStatus {
    /// Executed Cartesian position.
    pub position: Pose,
    /// Executed actuator steps.
    pub actuator_steps: [i32; 4],
    /// Blocks queued, including the running one.
    pub buffer_depth: usize,
    /// Phase of the running block.
    pub phase: MotionPhase,
    /// Step rate of the running block in steps/s.
    pub step_rate: u32,
    /// Latched fault.
    pub fault: Option<Fault>,
    /// Last homing result.
    pub homing: Option<HomingStatus>,
    /// Net babystep offset per axis in axis units.
    pub babystep_offset: [f32; 3],
}

/// Owned motion system.
///
/// The main context plans moves through `&mut self` methods; the timer
/// interrupt calls [`on_timer_interrupt`](Self::on_timer_interrupt). Sharing
/// one context between the two goes through [`SharedMotion`](super::SharedMotion).
pub struct MotionContext<OUT, TIM, END, const N: usize>
where
    OUT: StepOutputs,
    TIM: StepTimer,
    END: EndstopInputs,
{
    config: MachineConfig,
    planner: Planner,
    buffer: SegmentBuffer<N>,
    engine: StepperEngine,
    position: PositionState,
    outputs: OUT,
    timer: TIM,
    endstops: END,
    homing: Option<Axis>,
    homing_status: Option<HomingStatus>,
    stopping: bool,
}

impl<OUT, TIM, END, const N: usize> MotionContext<OUT, TIM, END, N>
where
    OUT: StepOutputs,
    TIM: StepTimer,
    END: EndstopInputs,
{
    /// Assemble a context from a validated configuration.
    ///
    /// Prefer [`MotionContextBuilder`](super::MotionContextBuilder), which
    /// validates the configuration and checks the channel count first.
    pub(super) fn new(config: MachineConfig, outputs: OUT, timer: TIM, endstops: END) -> Self {
        let planner = Planner::new(&config);
        let engine = StepperEngine::new(&config, planner.mapper().kinematics());
        let position = PositionState::at(planner.position(), planner.pose());
        info!("motion context ready, {} block buffer", N);
        Self {
            config,
            planner,
            buffer: SegmentBuffer::new(),
            engine,
            position,
            outputs,
            timer,
            endstops,
            homing: None,
            homing_status: None,
            stopping: false,
        }
    }

    // ========== Main context ==========

    /// Queue a straight move to `target` without waiting.
    ///
    /// # Errors
    ///
    /// - `PlannerError::BufferFull` when the buffer has no room (retry later)
    /// - `PlannerError::Halted` while a fault is latched
    /// - `PlannerError::HomingInProgress` during homing
    /// - `KinematicsError` for unreachable or out-of-limits targets
    pub fn try_plan_move(&mut self, target: Pose, feedrate: MmPerSec) -> Result<()> {
        self.service();
        self.check_accepting()?;

        let result = self.planner.try_plan_move(&mut self.buffer, target, feedrate);
        if result.is_ok() {
            self.position.set_requested(target);
        }
        self.wake_timer();
        result
    }

    /// Queue a straight move, calling `idle` while the buffer is full.
    ///
    /// `idle` runs in the main context; it is where the caller yields to other
    /// work or, in a test harness, runs the interrupt.
    ///
    /// # Errors
    ///
    /// Same as [`try_plan_move`](Self::try_plan_move), except that a full
    /// buffer is waited out.
    pub fn plan_move<F>(&mut self, target: Pose, feedrate: MmPerSec, mut idle: F) -> Result<()>
    where
        F: FnMut(&mut Self),
    {
        loop {
            match self.try_plan_move(target, feedrate) {
                Err(Error::Planner(PlannerError::BufferFull)) => idle(self),
                other => return other,
            }
        }
    }

    /// Start homing `axis` toward its endstop.
    ///
    /// # Errors
    ///
    /// - `PlannerError::NotIdle` if motion is queued
    /// - `PlannerError::NoEndstop` if the axis has no switch
    /// - `PlannerError::Halted` while a fault is latched
    pub fn home(&mut self, axis: Axis) -> Result<()> {
        self.service();
        self.check_accepting()?;
        if !self.is_idle() {
            return Err(PlannerError::NotIdle.into());
        }
        let endstop = match (&self.config.axis(axis).endstop, axis) {
            (_, Axis::E) | (None, _) => return Err(PlannerError::NoEndstop(axis).into()),
            (Some(endstop), _) => endstop.clone(),
        };

        self.planner.plan_homing(&mut self.buffer, axis, &endstop)?;
        if self.buffer.is_empty() {
            return Err(PlannerError::HomingFailed(axis).into());
        }
        info!("homing {}", axis);
        self.homing = Some(axis);
        self.homing_status = Some(HomingStatus::InProgress(axis));
        self.wake_timer();
        Ok(())
    }

    /// Home every axis with an endstop, one after another.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::HomingFailed` for the first axis that did not
    /// reach its switch, or any error of [`home`](Self::home).
    pub fn home_all<F>(&mut self, mut idle: F) -> Result<()>
    where
        F: FnMut(&mut Self),
    {
        let axes: heapless::Vec<Axis, 3> = self.config.homeable_axes().filter(|a| *a != Axis::E).collect();
        for axis in axes {
            self.synchronize(&mut idle)?;
            self.home(axis)?;
            self.synchronize(&mut idle)?;
            if self.homing_status != Some(HomingStatus::Homed(axis)) {
                return Err(PlannerError::HomingFailed(axis).into());
            }
        }
        Ok(())
    }

    /// Housekeeping for the main context.
    ///
    /// Applies homing results, finishes controlled stops and queues waiting
    /// segments of nonlinear moves. Called by the planning entry points; call
    /// it from the main loop as well.
    pub fn service(&mut self) {
        if let Some(event) = self.engine.take_homing_event() {
            self.apply_homing(event);
        }

        if self.engine.fault().is_some() {
            self.planner.discard_pending();
            self.stopping = false;
            if let Some(axis) = self.homing.take() {
                self.homing_status = Some(HomingStatus::Failed(axis));
            }
            return;
        }

        if self.stopping && !self.engine.is_active() {
            self.stopping = false;
            self.planner.resync(self.position.steps());
            info!("quick stop complete");
        }

        if !self.stopping && self.planner.has_pending() {
            if self.planner.flush_pending(&mut self.buffer).is_err() {
                warn!("segmented move left the envelope; rest dropped");
            }
            self.wake_timer();
        }
    }

    fn apply_homing(&mut self, event: HomingEvent) {
        let HomingEvent { axis, triggered } = event;
        self.homing = None;

        if !triggered {
            self.homing_status = Some(HomingStatus::Failed(axis));
            self.planner.resync(self.position.steps());
            return;
        }

        let home = self
            .config
            .axis(axis)
            .endstop
            .as_ref()
            .map_or(0.0, |endstop| endstop.home_position.value());
        let steps = self.planner.set_homed(self.position.steps(), axis, home);
        self.position.set_steps(steps);
        self.position.set_requested(self.planner.pose());
        self.homing_status = Some(HomingStatus::Homed(axis));
        info!("{} homed", axis);
    }

    fn check_accepting(&self) -> Result<()> {
        if self.engine.fault().is_some() {
            return Err(PlannerError::Halted.into());
        }
        if self.homing.is_some() {
            return Err(PlannerError::HomingInProgress.into());
        }
        if self.stopping {
            return Err(PlannerError::BufferFull.into());
        }
        Ok(())
    }

    fn wake_timer(&mut self) {
        if !self.timer.is_running() && !self.buffer.is_empty() {
            self.timer.start(self.engine.idle_interval());
        }
    }

    /// Wait until all queued motion has executed.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::Halted` if motion halts while waiting.
    pub fn synchronize<F>(&mut self, mut idle: F) -> Result<()>
    where
        F: FnMut(&mut Self),
    {
        loop {
            self.service();
            if self.engine.fault().is_some() {
                return Err(PlannerError::Halted.into());
            }
            if self.is_idle() {
                return Ok(());
            }
            idle(self);
        }
    }

    /// Queue a babystep on `axis`.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::BabystepUnsupported` for axes the kinematics
    /// cannot nudge and `PlannerError::Halted` while a fault is latched.
    pub fn babystep(&mut self, axis: Axis, direction: Direction) -> Result<()> {
        self.engine.queue_babystep(axis, direction)?;
        if !self.timer.is_running() {
            self.timer.start(self.engine.idle_interval());
        }
        Ok(())
    }

    /// Net babystep offset per positioning axis, in axis units.
    pub fn babystep_offset(&self) -> [f32; 3] {
        let mapper = self.planner.mapper();
        core::array::from_fn(|i| {
            let axis = Axis::MOTION[i];
            self.engine.babystep_offset_steps(axis) as f32 / mapper.steps_per_unit(axis)
        })
    }

    /// Decelerate to a stop and drop every queued move.
    ///
    /// New moves are refused with `BufferFull` until the running block has
    /// slowed down and retired.
    pub fn quick_stop(&mut self) {
        self.planner.discard_pending();
        if self.engine.quick_stop(&mut self.buffer) {
            self.stopping = true;
        } else {
            self.planner.resync(self.position.steps());
            if let Some(axis) = self.homing.take() {
                self.homing_status = Some(HomingStatus::Failed(axis));
            }
        }
    }

    /// Halt immediately and latch [`Fault::EmergencyStop`].
    ///
    /// No step pulse is issued after this returns, until
    /// [`acknowledge_halt`](Self::acknowledge_halt).
    pub fn emergency_stop(&mut self) {
        self.planner.discard_pending();
        self.engine.halt(Fault::EmergencyStop, &mut self.buffer);
        self.timer.stop();
        self.stopping = false;
        if let Some(axis) = self.homing.take() {
            self.homing_status = Some(HomingStatus::Failed(axis));
        }
    }

    /// Clear a latched fault and resume planning from the executed position.
    ///
    /// Returns the fault that was cleared. The position may be wrong after a
    /// hard stop; re-home before trusting it.
    pub fn acknowledge_halt(&mut self) -> Option<Fault> {
        let fault = self.engine.clear_fault();
        if fault.is_some() {
            self.planner.resync(self.position.steps());
            info!("halt acknowledged");
        }
        fault
    }

    /// Select the extruder driven by subsequent E moves.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::InvalidExtruder` for an unconfigured index.
    pub fn select_extruder(&mut self, extruder: u8) -> Result<()> {
        self.planner.set_extruder(extruder)?;
        Ok(())
    }

    // ========== Interrupt context ==========

    /// Timer interrupt body: run one engine tick and reprogram the timer.
    pub fn on_timer_interrupt(&mut self) -> TickOutcome {
        let outcome = self
            .engine
            .tick(&mut self.buffer, &mut self.position, &mut self.outputs, &mut self.endstops);
        match outcome.next_interval {
            Some(ticks) => self.timer.schedule_next_tick(ticks),
            None => self.timer.stop(),
        }
        outcome
    }

    // ========== Queries ==========

    /// Executed Cartesian position.
    pub fn current_position(&self) -> Pose {
        self.planner.mapper().pose_of(&self.position.steps())
    }

    /// Executed actuator steps.
    #[inline]
    pub fn actuator_position(&self) -> [i32; 4] {
        self.position.steps()
    }

    /// Last pose accepted by the planner.
    #[inline]
    pub fn requested_position(&self) -> Pose {
        self.position.requested()
    }

    /// Blocks queued, including the running one.
    #[inline]
    pub fn buffer_depth(&self) -> usize {
        self.buffer.len()
    }

    /// Whether every accepted move has executed.
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
            && !self.engine.is_active()
            && !self.planner.has_pending()
            && !self.engine.has_homing_event()
            && !self.engine.babystep_pending()
            && !self.engine.advance_pending()
            && !self.stopping
    }

    /// Latched fault.
    #[inline]
    pub fn fault(&self) -> Option<Fault> {
        self.engine.fault()
    }

    /// Last homing result.
    #[inline]
    pub fn homing_status(&self) -> Option<HomingStatus> {
        self.homing_status
    }

    /// Status snapshot.
    pub fn status(&self) -> MotionStatus {
        MotionStatus {
            position: self.current_position(),
            actuator_steps: self.position.steps(),
            buffer_depth: self.buffer.len(),
            phase: self.engine.phase(),
            step_rate: self.engine.current_rate(),
            fault: self.engine.fault(),
            homing: self.homing_status,
            babystep_offset: self.babystep_offset(),
        }
    }

    /// Machine configuration.
    #[inline]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// The planner.
    #[inline]
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// The queued blocks.
    #[inline]
    pub fn buffer(&self) -> &SegmentBuffer<N> {
        &self.buffer
    }

    /// The step engine.
    #[inline]
    pub fn engine(&self) -> &StepperEngine {
        &self.engine
    }

    /// The step outputs.
    #[inline]
    pub fn outputs(&self) -> &OUT {
        &self.outputs
    }

    /// The step timer.
    #[inline]
    pub fn timer(&self) -> &TIM {
        &self.timer
    }

    /// The endstop inputs.
    #[inline]
    pub fn endstops_mut(&mut self) -> &mut END {
        &mut self.endstops
    }

    /// Take the hardware back.
    pub fn release(self) -> (OUT, TIM, END) {
        (self.outputs, self.timer, self.endstops)
    }
}
