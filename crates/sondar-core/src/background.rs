//! Recursive background subtraction
//!
//! Static reflectors (walls, the desk, the device itself) show up in every
//! time-frequency image. A leaky mean of past images models them; what
//! remains after subtraction is the moving target.
//!
//! The model adapts slowly (`α = 0.05` by default), so a reflector must
//! hold still for tens of frames before it fades into the background.

use crate::types::{Complex, TimeFreqImage};

/// Leaky-mean foreground extractor over time-frequency images
#[derive(Debug, Clone)]
pub struct BackgroundSubtractor {
    background: Option<TimeFreqImage>,
    alpha: f64,
}

impl BackgroundSubtractor {
    pub fn new(alpha: f64) -> Self {
        Self {
            background: None,
            alpha,
        }
    }

    /// True once a background model has been bootstrapped.
    pub fn is_initialized(&self) -> bool {
        self.background.is_some()
    }

    /// Drop the model; the next frame bootstraps a fresh one.
    pub fn reset(&mut self) {
        self.background = None;
    }

    /// Subtract the background model from `current` and update the model.
    ///
    /// The first invocation seeds the model with a deep copy of the input
    /// and returns the input unchanged.
    pub fn subtract(&mut self, current: &TimeFreqImage) -> TimeFreqImage {
        if current.is_empty() {
            return Vec::new();
        }

        let background = match self.background.as_mut() {
            None => {
                self.background = Some(current.clone());
                return current.clone();
            }
            Some(b) => b,
        };

        let rows = current.len();
        let cols = current[0].len();
        let mut foreground = Vec::with_capacity(rows);

        for i in 0..rows {
            let mut row = Vec::with_capacity(cols);
            for j in 0..cols {
                let c = current[i][j];
                let b = background[i][j];
                row.push(c - b);
                background[i][j] = b * (1.0 - self.alpha) + c * self.alpha;
            }
            foreground.push(row);
        }

        foreground
    }
}
