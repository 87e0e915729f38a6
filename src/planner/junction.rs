//! Cornering speed from junction deviation.
//!
//! The junction is treated as a circular arc tangent to both segments whose
//! distance from the sharp corner is the configured deviation. The entry speed
//! is the speed at which the centripetal acceleration on that arc equals the
//! block acceleration.

use libm::sqrtf;

/// Inputs for one junction.
#[derive(Debug, Clone, Copy)]
pub struct Junction {
    /// Unit direction of the previous block (X, Y, Z, E).
    pub previous_unit: [f32; 4],
    /// Unit direction of the new block.
    pub unit: [f32; 4],
    /// Nominal speed of the previous block in mm/s.
    pub previous_nominal_speed: f32,
    /// Nominal speed of the new block in mm/s.
    pub nominal_speed: f32,
    /// Acceleration of the new block in mm/s².
    pub acceleration: f32,
}

/// Cosine beyond which the corner counts as a reversal.
const REVERSAL_COSINE: f32 = 0.95;

/// Maximum entry speed of the new block at its junction with the previous one.
///
/// A straight continuation runs at the lower of the two nominal speeds, a
/// reversal drops to `min_speed`.
pub fn max_junction_speed(junction: &Junction, junction_deviation: f32, min_speed: f32) -> f32 {
    if junction.previous_nominal_speed <= 0.0 {
        return min_speed;
    }

    // Cosine of the angle between the reversed previous direction and the new one:
    // -1 for a straight line, +1 for a full reversal.
    let cos_theta = -junction
        .previous_unit
        .iter()
        .zip(junction.unit.iter())
        .map(|(a, b)| a * b)
        .sum::<f32>();

    if cos_theta >= REVERSAL_COSINE {
        return min_speed;
    }

    let mut vmax = junction.previous_nominal_speed.min(junction.nominal_speed);
    if cos_theta > -REVERSAL_COSINE {
        let sin_theta_d2 = sqrtf(0.5 * (1.0 - cos_theta));
        let limit = sqrtf(junction.acceleration * junction_deviation * sin_theta_d2 / (1.0 - sin_theta_d2));
        vmax = vmax.min(limit);
    }
    vmax.max(min_speed)
}

/// Unit vector of a move from its Cartesian deltas.
///
/// Extruder-only moves point along E so that a retract followed by a prime
/// reads as a reversal.
pub fn unit_vector(delta: [f32; 4]) -> [f32; 4] {
    let length = sqrtf(delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]);
    if length > 0.0 {
        [delta[0] / length, delta[1] / length, delta[2] / length, 0.0]
    } else if delta[3] != 0.0 {
        [0.0, 0.0, 0.0, delta[3].signum()]
    } else {
        [0.0; 4]
    }
}
