//! Rotation estimation from gravity vectors
//!
//! Maps one accelerometer sample to a coarse device rotation. Pure
//! function, no I/O; the client feeds it a freshly fetched sample and the
//! display basis read from the signal store.

use crate::types::RotationState;

/// Standard gravity, m/s^2
const GRAVITY: f32 = 9.8;

/// Tilt below this magnitude on both axes carries no usable direction
const DEAD_ZONE: f32 = 2.0;

/// Pitch beyond this angle means the device faces away from the user
const MAX_PITCH_DEG: f32 = 145.0;

/// Rotation per 90-degree sector, indexed by display basis
///
/// Row n covers the sector centered on n * 90 degrees. Column 0 is the
/// portrait-native basis, column 1 the landscape-native one.
const SECTOR_STATES: [[RotationState; 2]; 4] = [
    [RotationState::PortraitTop, RotationState::LandscapeLeft],
    [RotationState::LandscapeLeft, RotationState::PortraitBottom],
    [RotationState::PortraitBottom, RotationState::LandscapeRight],
    [RotationState::LandscapeRight, RotationState::PortraitTop],
];

/// Estimate device rotation from one gravity sample
///
/// `x`, `y`, `z` are accelerometer axes in m/s^2; `basis` selects the
/// display's native orientation (0 portrait, anything else landscape).
/// Returns `Unknown` when the tilt is too small to classify or the device
/// is pitched past the admissible band.
pub fn estimate(x: f32, y: f32, z: f32, basis: u32) -> RotationState {
    if x.abs() <= DEAD_ZONE && y.abs() <= DEAD_ZONE {
        return RotationState::Unknown;
    }

    let pitch = (z / GRAVITY).clamp(-1.0, 1.0).acos().to_degrees();
    if pitch > MAX_PITCH_DEG {
        return RotationState::Unknown;
    }

    let mut theta = x.atan2(y).to_degrees();
    if theta < 0.0 {
        theta += 360.0;
    }

    // Sectors are centered on 0/90/180/270 with 45 degrees of slack each way
    let sector = (((theta + 45.0) / 90.0) as usize) % 4;
    let column = usize::from(basis != 0);
    SECTOR_STATES[sector][column]
}
