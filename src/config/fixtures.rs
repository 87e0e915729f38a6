//! Machine configurations shared by unit tests.

use super::{
    AxesConfig, AxisConfig, EndstopsConfig, KinematicsConfig, MachineConfig, Microsteps, MmPerSec, MmPerSecSquared,
    PlannerConfig, StepperConfig,
};

pub(crate) fn axis(rotation_distance: f32, max_feedrate: f32, max_acceleration: f32) -> AxisConfig {
    AxisConfig {
        steps_per_rotation: 200,
        microsteps: Microsteps::SIXTEENTH,
        rotation_distance,
        gear_ratio: 1.0,
        max_feedrate: MmPerSec(max_feedrate),
        max_acceleration: MmPerSecSquared(max_acceleration),
        invert_direction: false,
        limits: None,
        endstop: None,
    }
}

/// 80 steps/mm on X/Y, 400 on Z, 100 on E.
pub(crate) fn machine(kinematics: KinematicsConfig) -> MachineConfig {
    MachineConfig {
        kinematics,
        axes: AxesConfig {
            x: axis(40.0, 300.0, 3000.0),
            y: axis(40.0, 300.0, 3000.0),
            z: axis(8.0, 5.0, 100.0),
            e: axis(32.0, 50.0, 5000.0),
        },
        planner: PlannerConfig::default(),
        stepper: StepperConfig::default(),
        endstops: EndstopsConfig::default(),
    }
}
