//! Core types for acoustic echo processing
//!
//! This module defines the fundamental types used throughout the SONDAR DSP
//! library, particularly for representing the complex baseband signals that
//! every stage of the pipeline operates on.
//!
//! ## Signal representations
//!
//! The capture side delivers real-valued 16-bit PCM frames. The first thing
//! the pipeline does is lift them into the complex plane (imaginary part
//! zero) so that Doppler warping, dechirping, and the FFT stages can all
//! work on a single representation:
//!
//! ```text
//! mic PCM (i16) ──> ComplexFrame ──> TimeFreqImage ──> RangeDopplerImage
//!                     (fast time)     (STFT windows)    (f32 magnitudes)
//! ```

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Type alias for complex numbers using f64 precision
pub type Complex = Complex64;

/// One capture buffer of signed 16-bit PCM samples
pub type RealFrame = Vec<i16>;

/// A buffer of complex samples (fast time)
pub type ComplexFrame = Vec<Complex>;

/// Time-frequency image produced by the STFT, indexed `[window][freq_bin]`.
/// Only the positive-frequency half of each window's spectrum is kept.
pub type TimeFreqImage = Vec<Vec<Complex>>;

/// Range-Doppler magnitude image, indexed `[freq_bin][slow_time_bin]`.
pub type RangeDopplerImage = Vec<Vec<f32>>;

/// Speed of sound in air (m/s), the propagation constant for every
/// velocity-to-time-scale conversion in the pipeline.
pub const SPEED_OF_SOUND: f64 = 343.0;

/// Result type for SONDAR operations
pub type SondarResult<T> = Result<T, SondarError>;

/// Errors that can occur during SONDAR processing
#[derive(Debug, Clone, thiserror::Error)]
pub enum SondarError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("FFT length must be a power of two, got {0}")]
    InvalidFftSize(usize),

    #[error("empty frame")]
    EmptyFrame,

    #[error("signal too weak: max magnitude {max:.3} below threshold {threshold:.3}")]
    WeakSignal { max: f64, threshold: f64 },

    #[error("correlation {score:.1} below reliability threshold {threshold:.1}")]
    LowCorrelation { score: f64, threshold: f64 },

    #[error("processing stage {stage} failed: {reason}")]
    StageFault { stage: &'static str, reason: String },

    #[error("frame rejected: processing executor saturated or shutting down")]
    ExecutorRejected,

    #[error("shutdown timed out waiting for {0}")]
    ShutdownTimeout(&'static str),
}

/// Signal statistics used by stage diagnostics and the trace logger
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalStats {
    pub len: usize,
    pub max_magnitude: f64,
    pub avg_magnitude: f64,
}

impl SignalStats {
    pub fn compute(samples: &[Complex]) -> Self {
        if samples.is_empty() {
            return Self {
                len: 0,
                max_magnitude: 0.0,
                avg_magnitude: 0.0,
            };
        }
        let mut max = 0.0_f64;
        let mut sum = 0.0_f64;
        for s in samples {
            let mag = s.norm();
            max = max.max(mag);
            sum += mag;
        }
        Self {
            len: samples.len(),
            max_magnitude: max,
            avg_magnitude: sum / samples.len() as f64,
        }
    }
}

/// Helper functions for working with complex frames
pub mod complex_ops {
    use super::*;

    /// Lift a PCM frame into the complex plane (imaginary part zero).
    pub fn pcm_to_complex(frame: &[i16]) -> ComplexFrame {
        frame
            .iter()
            .map(|&s| Complex::new(s as f64, 0.0))
            .collect()
    }

    /// Maximum magnitude over a frame; 0.0 for an empty frame.
    pub fn max_magnitude(frame: &[Complex]) -> f64 {
        frame.iter().map(|c| c.norm()).fold(0.0_f64, f64::max)
    }

    /// Magnitudes of a complex frame.
    pub fn magnitude(frame: &[Complex]) -> Vec<f64> {
        frame.iter().map(|c| c.norm()).collect()
    }

    /// Phases of a complex frame, in radians.
    pub fn phase(frame: &[Complex]) -> Vec<f64> {
        frame.iter().map(|c| c.arg()).collect()
    }

    /// Left-shift a frame by `latency_samples`, zero-filling the tail.
    ///
    /// Removes a fixed playback-to-capture latency so that sample 0 of the
    /// output corresponds to the instant the chirp left the speaker.
    pub fn remove_latency(frame: &[Complex], latency_samples: usize) -> ComplexFrame {
        let len = frame.len();
        if latency_samples == 0 {
            return frame.to_vec();
        }
        let mut shifted = Vec::with_capacity(len);
        for i in 0..len {
            if i + latency_samples < len {
                shifted.push(frame[i + latency_samples]);
            } else {
                shifted.push(Complex::new(0.0, 0.0));
            }
        }
        shifted
    }

    /// Normalize a frame to unit peak magnitude. A silent frame is returned
    /// unchanged.
    pub fn normalize(frame: &[Complex]) -> ComplexFrame {
        let max = max_magnitude(frame);
        if max > 0.0 {
            frame.iter().map(|&c| c / max).collect()
        } else {
            frame.to_vec()
        }
    }
}
