//! Shared harness for integration tests: recording step outputs, a fake step
//! timer and scripted endstops.

#![allow(dead_code)]

use printer_motion::config::{parse_config, Axis, MachineConfig};
use printer_motion::error::MotorError;
use printer_motion::motor::{ChannelMask, MAX_CHANNELS};
use printer_motion::{
    Direction, EndstopInputs, MotionContext, MotionContextBuilder, StepOutputs, StepTimer, TickOutcome,
};

/// 80 steps/mm on X/Y, 400 on Z, 100 on E.
pub const CARTESIAN: &str = r#"
[axes.x]
microsteps = 16
rotation_distance = 40.0
max_feedrate = 300.0
max_acceleration = 3000.0

[axes.y]
microsteps = 16
rotation_distance = 40.0
max_feedrate = 300.0
max_acceleration = 3000.0

[axes.z]
microsteps = 16
rotation_distance = 8.0
max_feedrate = 5.0
max_acceleration = 100.0

[axes.e]
microsteps = 16
rotation_distance = 32.0
max_feedrate = 50.0
max_acceleration = 5000.0
"#;

pub fn config_with(extra: &str) -> MachineConfig {
    parse_config(&format!("{CARTESIAN}\n{extra}")).expect("test config must parse")
}

pub fn cartesian() -> MachineConfig {
    config_with("")
}

/// Outputs that count pulses and track the net travel implied by DIR levels.
#[derive(Debug)]
pub struct RecordingOutputs {
    pub channels: usize,
    pub pulses: [u32; MAX_CHANNELS],
    pub net: [i64; MAX_CHANNELS],
    pub directions: [Option<Direction>; MAX_CHANNELS],
    pub direction_writes: u32,
}

impl RecordingOutputs {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            pulses: [0; MAX_CHANNELS],
            net: [0; MAX_CHANNELS],
            directions: [None; MAX_CHANNELS],
            direction_writes: 0,
        }
    }

    pub fn total_pulses(&self) -> u32 {
        self.pulses.iter().sum()
    }
}

impl StepOutputs for RecordingOutputs {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn set_direction(&mut self, channel: usize, direction: Direction) -> Result<(), MotorError> {
        self.directions[channel] = Some(direction);
        self.direction_writes += 1;
        Ok(())
    }

    fn pulse(&mut self, channels: ChannelMask) -> Result<(), MotorError> {
        for channel in 0..self.channels {
            if channels & (1 << channel) != 0 {
                self.pulses[channel] += 1;
                let sign = self.directions[channel].unwrap_or(Direction::Forward).sign();
                self.net[channel] += sign as i64;
            }
        }
        Ok(())
    }
}

/// Timer that records what it was asked to do.
#[derive(Debug, Default)]
pub struct FakeTimer {
    pub running: bool,
    pub starts: u32,
    pub last_interval: Option<u32>,
    pub elapsed_ticks: u64,
}

impl StepTimer for FakeTimer {
    fn start(&mut self, ticks: u32) {
        self.running = true;
        self.starts += 1;
        self.last_interval = Some(ticks);
    }

    fn schedule_next_tick(&mut self, ticks: u32) {
        self.last_interval = Some(ticks);
        self.elapsed_ticks += ticks as u64;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Endstops driven by the test.
#[derive(Debug, Default)]
pub struct ScriptedEndstops {
    pub triggered: [bool; 3],
    pub reads: u32,
}

impl EndstopInputs for ScriptedEndstops {
    fn is_triggered(&mut self, axis: Axis) -> Result<bool, MotorError> {
        self.reads += 1;
        Ok(self.triggered[axis.index()])
    }
}

pub type TestContext = MotionContext<RecordingOutputs, FakeTimer, ScriptedEndstops, 16>;

pub fn context(config: MachineConfig) -> TestContext {
    MotionContextBuilder::new()
        .config(config)
        .outputs(RecordingOutputs::new(MAX_CHANNELS))
        .timer(FakeTimer::default())
        .endstops(ScriptedEndstops::default())
        .build()
        .expect("test context must build")
}

/// Idle hook for `plan_move`/`synchronize`: run one interrupt if the timer is armed.
pub fn interrupt(ctx: &mut TestContext) {
    if ctx.timer().is_running() {
        ctx.on_timer_interrupt();
    } else {
        ctx.service();
    }
}

/// Run interrupts until the timer stops, servicing the main context in
/// between, and collect every outcome.
pub fn run_to_idle(ctx: &mut TestContext) -> Vec<TickOutcome> {
    let mut outcomes = Vec::new();
    loop {
        while ctx.timer().is_running() {
            outcomes.push(ctx.on_timer_interrupt());
            ctx.service();
            assert!(outcomes.len() < 5_000_000, "step timer never stopped");
        }
        ctx.service();
        if !ctx.timer().is_running() {
            return outcomes;
        }
    }
}

/// Run interrupts until `done` holds or the timer stops.
pub fn run_until<F>(ctx: &mut TestContext, mut done: F) -> Vec<TickOutcome>
where
    F: FnMut(&TestContext) -> bool,
{
    let mut outcomes = Vec::new();
    while ctx.timer().is_running() && !done(ctx) {
        outcomes.push(ctx.on_timer_interrupt());
        ctx.service();
        assert!(outcomes.len() < 5_000_000, "condition never reached");
    }
    outcomes
}
