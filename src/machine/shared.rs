//! Sharing one motion context between the main loop and the timer interrupt.
//!
//! Every access runs inside a critical section, so the interrupt never sees a
//! half-updated buffer. The blocking [`SharedMotion::plan_move`] leaves the
//! critical section between attempts so the interrupt can drain the buffer.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::MmPerSec;
use crate::endstop::EndstopInputs;
use crate::error::{ConfigError, Error, PlannerError, Result};
use crate::kinematics::Pose;
use crate::motion::TickOutcome;
use crate::motor::{StepOutputs, StepTimer};

use super::context::MotionContext;

/// A [`MotionContext`] behind a critical-section mutex, usable from a `static`.
///
/// ```rust,ignore
/// static MOTION: SharedMotion<Pins, Timer, Switches, 16> = SharedMotion::new();
///
/// #[interrupt]
/// fn TIM2() {
///     MOTION.on_timer_interrupt();
/// }
/// ```
pub struct SharedMotion<OUT, TIM, END, const N: usize>
where
    OUT: StepOutputs,
    TIM: StepTimer,
    END: EndstopInputs,
{
    inner: Mutex<RefCell<Option<MotionContext<OUT, TIM, END, N>>>>,
}

impl<OUT, TIM, END, const N: usize> SharedMotion<OUT, TIM, END, N>
where
    OUT: StepOutputs,
    TIM: StepTimer,
    END: EndstopInputs,
{
    /// An empty slot; [`install`](Self::install) a context before use.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Put a context in the slot, returning the previous one.
    pub fn install(&self, context: MotionContext<OUT, TIM, END, N>) -> Option<MotionContext<OUT, TIM, END, N>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(context))
    }

    /// Take the context out of the slot.
    pub fn take(&self) -> Option<MotionContext<OUT, TIM, END, N>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the context inside a critical section.
    ///
    /// Returns `None` if no context is installed.
    pub fn with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut MotionContext<OUT, TIM, END, N>) -> R,
    {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// Timer interrupt body.
    pub fn on_timer_interrupt(&self) -> Option<TickOutcome> {
        self.with(|ctx| ctx.on_timer_interrupt())
    }

    /// Queue a move, calling `idle` outside the critical section while the
    /// buffer is full.
    ///
    /// # Errors
    ///
    /// Same as [`MotionContext::try_plan_move`]; `ConfigError::MissingComponent`
    /// if no context is installed.
    pub fn plan_move<F: FnMut()>(&self, target: Pose, feedrate: MmPerSec, mut idle: F) -> Result<()> {
        loop {
            let result = self
                .with(|ctx| ctx.try_plan_move(target, feedrate))
                .unwrap_or(Err(Error::Config(ConfigError::MissingComponent("motion context"))));
            match result {
                Err(Error::Planner(PlannerError::BufferFull)) => idle(),
                other => return other,
            }
        }
    }

    /// Halt immediately. Safe to call from any context.
    pub fn emergency_stop(&self) {
        self.with(|ctx| ctx.emergency_stop());
    }
}

impl<OUT, TIM, END, const N: usize> Default for SharedMotion<OUT, TIM, END, N>
where
    OUT: StepOutputs,
    TIM: StepTimer,
    END: EndstopInputs,
{
    fn default() -> Self {
        Self::new()
    }
}
