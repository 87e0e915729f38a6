//! Integration tests for printer-motion.
//!
//! These tests run the complete workflow from TOML configuration to step pulses
//! on pins.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

use printer_motion::error::{ConfigError, Error};
use printer_motion::{
    StepTimer,
    Axis, MmPerSec, MotionContext, MotionContextBuilder, MotionPhase, PinBank, Pose, SharedMotion,
};

use common::{cartesian, context, interrupt, run_to_idle, FakeTimer, RecordingOutputs, ScriptedEndstops, CARTESIAN};

// =============================================================================
// TOML to pulses
// =============================================================================

#[test]
fn test_config_file_to_position() {
    let path = std::env::temp_dir().join(format!("printer-motion-it-{}.toml", std::process::id()));
    std::fs::write(&path, CARTESIAN).unwrap();
    let built = MotionContextBuilder::<RecordingOutputs, FakeTimer, ScriptedEndstops, 16>::new()
        .config_file(&path)
        .map(|b| {
            b.outputs(RecordingOutputs::new(4))
                .timer(FakeTimer::default())
                .endstops(ScriptedEndstops::default())
        })
        .and_then(|b| b.build());
    std::fs::remove_file(&path).unwrap();
    let mut ctx = built.expect("context from file");

    // A square with extrusion, then a Z hop.
    for &(x, y, e) in &[(20.0, 0.0, 1.0), (20.0, 20.0, 2.0), (0.0, 20.0, 3.0), (0.0, 0.0, 4.0)] {
        ctx.plan_move(Pose::new(x, y, 0.0, e), MmPerSec(80.0), interrupt)
            .unwrap();
    }
    ctx.plan_move(Pose::new(0.0, 0.0, 0.5, 4.0), MmPerSec(5.0), interrupt)
        .unwrap();
    let status = ctx.status();
    assert!(status.buffer_depth > 0);
    run_to_idle(&mut ctx);

    assert_eq!(ctx.actuator_position(), [0, 0, 200, 400]);
    assert_eq!(ctx.current_position(), Pose::new(0.0, 0.0, 0.5, 4.0));
    assert_eq!(ctx.requested_position(), Pose::new(0.0, 0.0, 0.5, 4.0));
    assert_eq!(ctx.outputs().pulses[0], 3200);
    assert_eq!(ctx.outputs().pulses[1], 3200);

    let status = ctx.status();
    assert_eq!(status.buffer_depth, 0);
    assert_eq!(status.phase, MotionPhase::Complete);
    assert_eq!(status.step_rate, 0);
    assert_eq!(status.fault, None);
    assert!(!ctx.timer().is_running());
}

#[test]
fn test_builder_rejects_too_few_channels() {
    let result = MotionContextBuilder::<_, _, _, 16>::new()
        .config(common::config_with("[planner]\nextruders = 2\n"))
        .outputs(RecordingOutputs::new(4))
        .timer(FakeTimer::default())
        .endstops(())
        .build();
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::ChannelCount {
            required: 5,
            available: 4
        }))
    ));
}

#[test]
fn test_soft_limits_through_context() {
    let mut ctx = context(common::config_with(
        "[axes.x.limits]\nmin = 0.0\nmax = 100.0\npolicy = \"clamp\"\n[axes.y.limits]\nmin = 0.0\nmax = 100.0\n",
    ));

    ctx.plan_move(Pose::new(150.0, 10.0, 0.0, 0.0), MmPerSec(100.0), interrupt)
        .unwrap();
    assert!(matches!(
        ctx.try_plan_move(Pose::new(10.0, -1.0, 0.0, 0.0), MmPerSec(100.0)),
        Err(Error::Kinematics(_))
    ));
    run_to_idle(&mut ctx);
    assert_eq!(ctx.actuator_position(), [8000, 800, 0, 0]);
}

// =============================================================================
// embedded-hal pins
// =============================================================================

type PinContext = MotionContext<PinBank<PinMock, PinMock, NoopDelay>, FakeTimer, (), 4>;

#[test]
fn test_pin_bank_receives_exact_pulses() {
    let three_pulses: Vec<Transaction> = (0..3)
        .flat_map(|_| [Transaction::set(State::High), Transaction::set(State::Low)])
        .collect();

    // X is wired with an inverted DIR line.
    let bank = PinBank::new(NoopDelay::new(), 2000)
        .with(PinMock::new(&three_pulses), PinMock::new(&[Transaction::set(State::Low)]), true)
        .and_then(|b| b.with(PinMock::new(&[]), PinMock::new(&[]), false))
        .and_then(|b| b.with(PinMock::new(&[]), PinMock::new(&[]), false))
        .and_then(|b| b.with(PinMock::new(&[]), PinMock::new(&[]), false))
        .unwrap();

    let mut ctx: PinContext = MotionContextBuilder::new()
        .config(cartesian())
        .outputs(bank)
        .timer(FakeTimer::default())
        .endstops(())
        .build()
        .unwrap();

    // Three steps on X.
    ctx.try_plan_move(Pose::new(3.0 / 80.0, 0.0, 0.0, 0.0), MmPerSec(10.0))
        .unwrap();
    while ctx.timer().is_running() {
        ctx.on_timer_interrupt();
    }
    assert_eq!(ctx.actuator_position(), [3, 0, 0, 0]);

    let (bank, _, _) = ctx.release();
    let (drivers, _) = bank.release();
    for driver in drivers {
        let (mut step, mut dir) = driver.release();
        step.done();
        dir.done();
    }
}

// =============================================================================
// Main context and interrupt on separate threads
// =============================================================================

static MOTION: SharedMotion<RecordingOutputs, FakeTimer, ScriptedEndstops, 16> = SharedMotion::new();

#[test]
fn test_shared_motion_across_threads() {
    assert!(matches!(
        MOTION.plan_move(Pose::new(1.0, 0.0, 0.0, 0.0), MmPerSec(50.0), || {}),
        Err(Error::Config(ConfigError::MissingComponent(_)))
    ));
    assert!(MOTION.install(context(cartesian())).is_none());

    let stop = AtomicBool::new(false);
    thread::scope(|scope| {
        // The step timer interrupt.
        scope.spawn(|| {
            while !stop.load(Ordering::Acquire) {
                MOTION.with(|ctx| {
                    if ctx.timer().is_running() {
                        ctx.on_timer_interrupt();
                    }
                });
                thread::yield_now();
            }
        });

        // Forty moves through a 16-block buffer, back and forth on X and Y.
        for i in 0..40 {
            let x = if i % 2 == 0 { 10.0 } else { 0.0 };
            let y = (i / 2) as f32 * 0.5;
            MOTION
                .plan_move(Pose::new(x, y, 0.0, 0.0), MmPerSec(200.0), thread::yield_now)
                .unwrap();
        }

        while !MOTION
            .with(|ctx| {
                ctx.service();
                ctx.is_idle()
            })
            .unwrap_or(true)
        {
            thread::yield_now();
        }
        stop.store(true, Ordering::Release);
    });

    let ctx = MOTION.take().expect("context installed");
    assert_eq!(ctx.actuator_position(), [0, 760, 0, 0]);
    assert_eq!(ctx.outputs().net[1], 760);
    assert_eq!(ctx.outputs().pulses[0], 40 * 800);
    assert_eq!(ctx.homing_status(), None);
    assert_eq!(ctx.config().axis(Axis::X).steps_per_unit(), 80.0);
}
