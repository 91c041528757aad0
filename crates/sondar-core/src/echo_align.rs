//! Echo alignment: Doppler compensation and latency removal
//!
//! A moving reflector time-scales its echo; before dechirping, the frame is
//! warped by the inverse scale so that the echo lines up with the emitted
//! chirp again. The warp velocity comes from the Doppler search, gated by
//! its correlation score: an unreliable estimate warps the frame with
//! garbage, which is worse than not warping at all.
//!
//! ```text
//! frame ──> estimate v ──> gate (corr, clamp) ──> time warp ──> strip latency
//!               │                                     │
//!               └── weak frame? ──────────────────────┴──> frame unchanged
//! ```
//!
//! The final step removes the fixed playback-to-capture latency of the
//! device by left-shifting the frame, so sample 0 corresponds to the
//! instant the chirp left the speaker.

use tracing::{debug, warn};

use crate::doppler::DopplerEstimator;
use crate::params::SondarParams;
use crate::types::{complex_ops, Complex, ComplexFrame};

/// An aligned frame together with the velocity that produced it
#[derive(Debug, Clone)]
pub struct AlignedFrame {
    pub frame: ComplexFrame,
    /// Gated and clamped velocity, the value every downstream stage uses
    pub velocity: f64,
    /// Correlation score of the velocity estimate
    pub correlation: f64,
    /// Raw (pre-smoothing) velocity, kept for the trace log
    pub raw_velocity: f64,
}

/// Aligns captured frames against the motion of the dominant reflector.
#[derive(Debug, Clone)]
pub struct EchoAligner {
    params: SondarParams,
    estimator: DopplerEstimator,
    last_velocity: f64,
}

impl EchoAligner {
    pub fn new(params: SondarParams) -> Self {
        let estimator = DopplerEstimator::new(params.clone());
        Self {
            params,
            estimator,
            last_velocity: 0.0,
        }
    }

    /// Gated velocity from the most recent alignment (m/s).
    pub fn velocity(&self) -> f64 {
        self.last_velocity
    }

    /// Align a preprocessed frame against the chirp reference `template`.
    ///
    /// Robustness clauses, in order:
    /// - empty frame → empty frame
    /// - peak magnitude below the weakness threshold → frame unchanged,
    ///   estimator state untouched
    /// - warp produced only zeros → original frame returned
    pub fn align(&mut self, signal: &[Complex], template: &[Complex]) -> AlignedFrame {
        if signal.is_empty() {
            warn!("empty frame handed to echo alignment");
            return AlignedFrame {
                frame: Vec::new(),
                velocity: self.last_velocity,
                correlation: 0.0,
                raw_velocity: 0.0,
            };
        }

        let max_magnitude = complex_ops::max_magnitude(signal);
        if max_magnitude < self.params.weak_signal_threshold {
            warn!(
                max_magnitude,
                threshold = self.params.weak_signal_threshold,
                "frame too weak to align, passing through"
            );
            return AlignedFrame {
                frame: signal.to_vec(),
                velocity: self.last_velocity,
                correlation: 0.0,
                raw_velocity: 0.0,
            };
        }

        let estimate = self.estimator.estimate(signal, template);

        let mut velocity = estimate.smoothed;
        if estimate.correlation < self.params.reliability_threshold {
            warn!(
                correlation = estimate.correlation,
                threshold = self.params.reliability_threshold,
                "low correlation, falling back to zero velocity"
            );
            velocity = 0.0;
        }
        if velocity.abs() > self.params.velocity_clamp_mps {
            warn!(velocity, "extreme velocity, clamping");
            velocity = velocity.signum() * self.params.velocity_clamp_mps;
        }
        self.last_velocity = velocity;

        let scale = self.params.time_scale(velocity);
        debug!(velocity, scale, "applying velocity alignment");
        let warped = warp(signal, scale);

        if warped.iter().all(|c| c.re.abs() < 1e-10 && c.im.abs() < 1e-10) {
            warn!("alignment produced an all-zero frame, keeping the original");
            return AlignedFrame {
                frame: signal.to_vec(),
                velocity,
                correlation: estimate.correlation,
                raw_velocity: estimate.raw,
            };
        }

        let frame = complex_ops::remove_latency(&warped, self.params.latency_samples());

        AlignedFrame {
            frame,
            velocity,
            correlation: estimate.correlation,
            raw_velocity: estimate.raw,
        }
    }
}

/// Resample the frame at `i·scale` with linear interpolation.
///
/// When only one of the two neighbouring samples is in range it is used
/// verbatim; when neither is, the output is zero.
fn warp(signal: &[Complex], scale: f64) -> ComplexFrame {
    let len = signal.len();
    let mut warped = Vec::with_capacity(len);

    for i in 0..len {
        let src = i as f64 * scale;
        let lower = src.floor() as isize;
        let upper = src.ceil() as isize;
        let fraction = src - lower as f64;

        let lower_ok = lower >= 0 && (lower as usize) < len;
        let upper_ok = upper >= 0 && (upper as usize) < len;

        let sample = match (lower_ok, upper_ok) {
            (true, true) => {
                let a = signal[lower as usize];
                let b = signal[upper as usize];
                a * (1.0 - fraction) + b * fraction
            }
            (true, false) => signal[lower as usize],
            (false, true) => signal[upper as usize],
            (false, false) => Complex::new(0.0, 0.0),
        };
        warped.push(sample);
    }
    warped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chirp::ChirpSynth;
    use approx::assert_relative_eq;

    fn short_latency_params() -> SondarParams {
        // A latency much shorter than the frame keeps the shifted chirp
        // visible inside a single test frame.
        SondarParams::builder().device_latency_ms(1.0).build().unwrap()
    }

    #[test]
    fn test_empty_frame_passes_through() {
        let params = SondarParams::default();
        let synth = ChirpSynth::new(params.clone());
        let mut aligner = EchoAligner::new(params);
        let aligned = aligner.align(&[], synth.reference());
        assert!(aligned.frame.is_empty());
    }

    #[test]
    fn test_weak_frame_returned_unchanged() {
        let params = SondarParams::default();
        let synth = ChirpSynth::new(params.clone());
        let mut aligner = EchoAligner::new(params);

        let weak: ComplexFrame = (0..960).map(|i| Complex::new(1e-3 * i as f64 / 960.0, 0.0)).collect();
        let aligned = aligner.align(&weak, synth.reference());
        assert_eq!(aligned.frame, weak);
        assert_relative_eq!(aligned.correlation, 0.0);
    }

    #[test]
    fn test_warp_identity_at_unit_scale() {
        let signal: ComplexFrame = (0..32).map(|i| Complex::new(i as f64, -(i as f64))).collect();
        let warped = warp(&signal, 1.0);
        for (a, b) in signal.iter().zip(&warped) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_warp_out_of_range_is_zero() {
        let signal = vec![Complex::new(1.0, 0.0); 16];
        let warped = warp(&signal, 2.0);
        // Past the halfway point, i*2 runs off the end of the input
        assert_relative_eq!(warped[15].re, 0.0);
        assert_relative_eq!(warped[15].im, 0.0);
    }

    #[test]
    fn test_stationary_chirp_keeps_energy_and_length() {
        let params = short_latency_params();
        let synth = ChirpSynth::new(params.clone());
        let mut aligner = EchoAligner::new(params.clone());

        let signal: ComplexFrame = synth.reference().to_vec();
        let aligned = aligner.align(&signal, synth.reference());

        assert_eq!(aligned.frame.len(), signal.len());
        assert!(aligned.velocity.abs() < 0.1);
        assert!(complex_ops::max_magnitude(&aligned.frame) > 0.0);
    }

    #[test]
    fn test_low_correlation_forces_zero_velocity_and_pure_shift() {
        let params = short_latency_params();
        let synth = ChirpSynth::new(params.clone());
        let mut aligner = EchoAligner::new(params.clone());

        // A purely imaginary frame is orthogonal to the real-valued
        // template: every correlation is exactly zero, far below the
        // reliability threshold, so the warp degenerates to the identity
        // and the output is the input left-shifted by the latency.
        let signal: ComplexFrame = (0..960).map(|_| Complex::new(0.0, 100.0)).collect();
        let aligned = aligner.align(&signal, synth.reference());
        assert_relative_eq!(aligned.velocity, 0.0);

        let shift = params.latency_samples();
        assert_eq!(shift, 48);
        for i in 0..(signal.len() - shift) {
            assert_relative_eq!(aligned.frame[i].im, signal[i + shift].im, epsilon = 1e-9);
        }
        for i in (signal.len() - shift)..signal.len() {
            assert_relative_eq!(aligned.frame[i].im, 0.0);
        }
    }

    #[test]
    fn test_full_latency_zeroes_short_frame() {
        // With the production latency (6373 samples) a single 960-sample
        // frame is shifted entirely out of view.
        let params = SondarParams::default();
        let synth = ChirpSynth::new(params.clone());
        let mut aligner = EchoAligner::new(params);

        let signal: ComplexFrame = synth.reference().to_vec();
        let aligned = aligner.align(&signal, synth.reference());
        assert!(aligned.frame.iter().all(|c| c.norm() == 0.0));
    }
}
