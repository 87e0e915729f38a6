//! Planner behaviour: trapezoids, junction speeds, lookahead and backpressure.

mod common;

use printer_motion::config::{Axis, AxisConstraints, KinematicsConfig};
use printer_motion::error::{Error, PlannerError};
use printer_motion::planner::lookahead;
use printer_motion::planner::trapezoid::estimate_acceleration_distance;
use printer_motion::{Block, MmPerSec, Planner, Pose, SegmentBuffer};

use common::{cartesian, config_with};

/// 80 steps/mm on X and 100 mm/s^2 for every move: 8000 steps/s^2.
fn slow_config() -> printer_motion::MachineConfig {
    config_with(
        r#"
[planner]
acceleration = 100.0
travel_acceleration = 100.0
"#,
    )
}

#[test]
fn test_1600_step_move_is_triangular() {
    let config = slow_config();
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<16>::new();

    // 20 mm at 50 mm/s: 1600 steps, 4000 steps/s nominal.
    planner
        .try_plan_move(&mut buffer, Pose::new(20.0, 0.0, 0.0, 0.0), MmPerSec(50.0))
        .unwrap();
    let block = *buffer.front().unwrap();
    assert_eq!(block.step_event_count, 1600);
    assert_eq!(block.nominal_rate, 4000);
    assert_eq!(block.acceleration_steps_per_s2, 8000);

    // Starting and ending at rest (the minimum step rate), reaching 4000 steps/s
    // takes about 1000 steps each way; that does not fit twice in 1600.
    let accel = block.acceleration_steps_per_s2 as f32;
    let up = estimate_acceleration_distance(block.initial_rate as f32, 4000.0, accel);
    let down = estimate_acceleration_distance(4000.0, block.final_rate as f32, -accel);
    assert!((up - 1000.0).abs() < 1.0);
    assert!(up + down > 1600.0);

    // Triangle: the ramps meet in the middle, no cruise.
    assert_eq!(block.initial_rate, block.final_rate);
    assert_eq!(block.accelerate_until, 800);
    assert_eq!(block.step_event_count - block.decelerate_after, 800);
}

#[test]
fn test_2400_step_move_has_cruise() {
    let config = slow_config();
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<16>::new();

    planner
        .try_plan_move(&mut buffer, Pose::new(30.0, 0.0, 0.0, 0.0), MmPerSec(50.0))
        .unwrap();
    let block = *buffer.front().unwrap();
    assert_eq!(block.step_event_count, 2400);

    let accel = block.acceleration_steps_per_s2 as f32;
    let up = estimate_acceleration_distance(block.initial_rate as f32, 4000.0, accel);
    let down = estimate_acceleration_distance(4000.0, block.final_rate as f32, -accel);
    assert!(up + down <= 2400.0);

    let cruise = block.decelerate_after - block.accelerate_until;
    assert!((cruise as i64 - 400).abs() <= 2, "cruise of {} steps", cruise);
    assert!((block.accelerate_until as f32 - up).abs() <= 1.0);
}

fn queue(planner: &mut Planner, buffer: &mut SegmentBuffer<16>, points: &[(f32, f32, f32)], feedrate: f32) {
    for &(x, y, e) in points {
        planner
            .try_plan_move(buffer, Pose::new(x, y, 0.0, e), MmPerSec(feedrate))
            .unwrap();
    }
}

/// A print-like path: straight runs, shallow and sharp corners, a reversal.
const PATH: &[(f32, f32, f32)] = &[
    (10.0, 0.0, 0.4),
    (20.0, 0.5, 0.8),
    (30.0, 0.5, 1.2),
    (30.0, 10.0, 1.6),
    (20.0, 20.0, 2.0),
    (25.0, 20.0, 2.2),
    (5.0, 20.0, 3.0),
    (5.0, 2.0, 3.7),
    (5.1, 1.0, 3.75),
];

#[test]
fn test_collinear_blocks_have_equal_junction_rates() {
    let config = cartesian();
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<16>::new();
    let straight: Vec<(f32, f32, f32)> = (1..=8).map(|i| (i as f32 * 3.0, 0.0, 0.0)).collect();
    queue(&mut planner, &mut buffer, &straight, 150.0);

    let blocks: Vec<Block> = buffer.iter().copied().collect();
    for pair in blocks.windows(2) {
        assert_eq!(pair[0].final_rate, pair[1].initial_rate, "junction after {}", pair[0].sequence);
    }
}

#[test]
fn test_corner_rates_come_from_one_junction_speed() {
    let config = cartesian();
    let min_rate = config.stepper.min_step_rate;
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<16>::new();
    queue(&mut planner, &mut buffer, PATH, 150.0);

    let blocks: Vec<Block> = buffer.iter().copied().collect();
    assert_eq!(blocks.len(), PATH.len());
    for pair in blocks.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(b.entry_speed <= b.max_entry_speed + 1e-3);
        if a.final_rate <= min_rate || b.initial_rate <= min_rate {
            continue;
        }
        // Convert both rates back to mm/s; they describe the same junction.
        let mm_per_step_a = a.nominal_speed / a.nominal_rate as f32;
        let mm_per_step_b = b.nominal_speed / b.nominal_rate as f32;
        let exit = a.final_rate as f32 * mm_per_step_a;
        let entry = b.initial_rate as f32 * mm_per_step_b;
        let tolerance = 2.0 * mm_per_step_a.max(mm_per_step_b) + 1e-3;
        assert!(
            (exit - entry).abs() <= tolerance,
            "block {}: exit {} mm/s vs entry {} mm/s",
            a.sequence,
            exit,
            entry
        );
    }
}

#[test]
fn test_blocks_respect_axis_limits() {
    let config = cartesian();
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<16>::new();
    queue(&mut planner, &mut buffer, PATH, 1000.0);
    planner
        .try_plan_move(&mut buffer, Pose::new(0.0, 0.0, 3.0, 3.0), MmPerSec(1000.0))
        .unwrap();

    let constraints: [AxisConstraints; 4] = planner.constraints().clone();
    for block in buffer.iter() {
        let count = block.step_event_count as f32;
        for axis in Axis::ALL {
            let share = block.steps[axis.index()] as f32 / count;
            let c = &constraints[axis.index()];
            assert!(
                block.nominal_rate as f32 * share <= c.max_rate_steps_per_sec * 1.01 + 1.0,
                "block {} exceeds {:?} feedrate",
                block.sequence,
                axis
            );
            assert!(
                block.acceleration_steps_per_s2 as f32 * share <= c.max_acceleration_steps_per_sec2 as f32 * 1.01 + 1.0,
                "block {} exceeds {:?} acceleration",
                block.sequence,
                axis
            );
        }
        assert!(block.initial_rate <= block.nominal_rate);
        assert!(block.final_rate <= block.nominal_rate);
        assert!(block.accelerate_until <= block.decelerate_after);
        assert!(block.decelerate_after <= block.step_event_count);
    }
}

#[test]
fn test_recalculation_is_idempotent() {
    let config = cartesian();
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<16>::new();
    queue(&mut planner, &mut buffer, PATH, 120.0);

    let min_speed = config.planner.min_planner_speed.value();
    let min_rate = config.stepper.min_step_rate;
    let before: Vec<Block> = buffer.iter().copied().collect();

    lookahead::recalculate(&mut buffer, min_speed, min_rate);
    let once: Vec<Block> = buffer.iter().copied().collect();
    lookahead::recalculate(&mut buffer, min_speed, min_rate);
    let twice: Vec<Block> = buffer.iter().copied().collect();

    for ((b, o), t) in before.iter().zip(&once).zip(&twice) {
        assert_eq!(b.entry_speed, o.entry_speed);
        assert_eq!(o.entry_speed, t.entry_speed);
        assert_eq!(o.accelerate_until, t.accelerate_until);
        assert_eq!(o.decelerate_after, t.decelerate_after);
        assert_eq!(o.initial_rate, t.initial_rate);
        assert_eq!(o.final_rate, t.final_rate);
    }
}

#[test]
fn test_blocks_dequeue_in_submission_order() {
    let config = cartesian();
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<16>::new();
    queue(&mut planner, &mut buffer, PATH, 100.0);

    let mut sequences = Vec::new();
    while buffer.claim_front().is_some() {
        sequences.push(buffer.release_front().unwrap().sequence);
    }
    let expected: Vec<u32> = (0..PATH.len() as u32).collect();
    assert_eq!(sequences, expected);
}

#[test]
fn test_full_buffer_backpressures() {
    let config = cartesian();
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<4>::new();

    for i in 1..=4 {
        planner
            .try_plan_move(&mut buffer, Pose::new(i as f32, 0.0, 0.0, 0.0), MmPerSec(50.0))
            .unwrap();
    }
    let position = planner.position();
    assert_eq!(
        planner.try_plan_move(&mut buffer, Pose::new(9.0, 0.0, 0.0, 0.0), MmPerSec(50.0)),
        Err(Error::Planner(PlannerError::BufferFull))
    );
    // Nothing about the refused move leaked into the planner state.
    assert_eq!(planner.position(), position);
    assert_eq!(buffer.len(), 4);

    buffer.claim_front();
    buffer.release_front();
    planner
        .try_plan_move(&mut buffer, Pose::new(9.0, 0.0, 0.0, 0.0), MmPerSec(50.0))
        .unwrap();
    assert_eq!(planner.position()[0], 720);
}

#[test]
fn test_busy_block_never_replanned() {
    let config = cartesian();
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<16>::new();

    planner
        .try_plan_move(&mut buffer, Pose::new(10.0, 0.0, 0.0, 0.0), MmPerSec(100.0))
        .unwrap();
    let claimed = *buffer.claim_front().unwrap();

    queue(&mut planner, &mut buffer, &PATH[1..], 100.0);
    let front = *buffer.front().unwrap();
    assert_eq!(front.entry_speed, claimed.entry_speed);
    assert_eq!(front.initial_rate, claimed.initial_rate);
    assert_eq!(front.final_rate, claimed.final_rate);
    assert_eq!(front.decelerate_after, claimed.decelerate_after);
}

#[test]
fn test_unreachable_delta_pose_rejected_before_queueing() {
    let config = config_with(
        r#"
[kinematics]
type = "delta"
diagonal_rod = 250.0
radius = 120.0
printable_radius = 90.0
"#,
    );
    assert!(matches!(config.kinematics, KinematicsConfig::Delta(_)));
    let mut planner = Planner::new(&config);
    let mut buffer = SegmentBuffer::<16>::new();

    let result = planner.try_plan_move(&mut buffer, Pose::new(400.0, 0.0, 0.0, 0.0), MmPerSec(50.0));
    assert!(matches!(result, Err(Error::Kinematics(_))));
    assert!(buffer.is_empty());
}
