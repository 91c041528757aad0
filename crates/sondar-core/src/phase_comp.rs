//! Velocity-driven column compensation of the range-Doppler image
//!
//! Target motion during the chirp smears energy along the slow-time axis.
//! The compensation re-indexes each column by the motion scale factor
//! `f = 1 + v/c`, pulling the smear back toward the true Doppler bin.
//!
//! Re-indexing is integer-valued: `out[i][round(j·f)] = in[i][j]`. When two
//! source columns round to the same target the later write wins; occupancy
//! is not normalised.

use crate::types::{RangeDopplerImage, SPEED_OF_SOUND};

/// Re-index range-Doppler columns according to the target velocity
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseCompensator;

impl PhaseCompensator {
    pub fn new() -> Self {
        Self
    }

    /// Apply column compensation for radial velocity `velocity` (m/s).
    ///
    /// With `velocity == 0` the output equals the input.
    pub fn compensate(&self, image: &RangeDopplerImage, velocity: f64) -> RangeDopplerImage {
        if image.is_empty() {
            return Vec::new();
        }
        let rows = image.len();
        let cols = image[0].len();
        let factor = 1.0 + velocity / SPEED_OF_SOUND;

        let mut compensated = vec![vec![0.0_f32; cols]; rows];
        for i in 0..rows {
            for j in 0..cols {
                let target = (j as f64 * factor).round() as isize;
                if target >= 0 && (target as usize) < cols {
                    compensated[i][target as usize] = image[i][j];
                }
            }
        }
        compensated
    }
}
