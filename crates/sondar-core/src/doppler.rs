//! Doppler velocity estimation by template-scaling search
//!
//! A reflector moving at radial velocity `v` time-scales its echo by
//! `s = 1 + v/c`. Rather than measuring a carrier shift (the chirp has no
//! single carrier), the estimator warps the reference chirp by candidate
//! scale factors and scores each warped template against the received
//! frame:
//!
//! ```text
//!            coarse sweep                 refinement
//!  v: -5 ────┼──┼──┼──┼──┼──── +5   best ± 0.5 m/s, 10 steps
//!            ▲ argmax                     ▲ argmax
//!                                         │
//!                              EMA: v ← 0.7·v + 0.3·best
//! ```
//!
//! Correlation is a plain real dot product over the central half of the
//! frame, where the echo energy concentrates after bandpass filtering; the
//! frame edges carry filter transients and are excluded.

use tracing::debug;

use crate::params::SondarParams;
use crate::types::{Complex, ComplexFrame, SPEED_OF_SOUND};

/// Result of one velocity estimation pass
#[derive(Debug, Clone, Copy)]
pub struct VelocityEstimate {
    /// Refined argmax before temporal smoothing (m/s)
    pub raw: f64,
    /// EMA-smoothed velocity (m/s)
    pub smoothed: f64,
    /// Correlation score of the winning template
    pub correlation: f64,
}

/// Stateful Doppler estimator; the EMA makes frame order significant.
#[derive(Debug, Clone)]
pub struct DopplerEstimator {
    params: SondarParams,
    last_velocity: f64,
    last_correlation: f64,
}

impl DopplerEstimator {
    pub fn new(params: SondarParams) -> Self {
        Self {
            params,
            last_velocity: 0.0,
            last_correlation: 0.0,
        }
    }

    /// Smoothed velocity from the most recent estimate (m/s).
    pub fn last_velocity(&self) -> f64 {
        self.last_velocity
    }

    /// Correlation score from the most recent estimate.
    pub fn last_correlation(&self) -> f64 {
        self.last_correlation
    }

    /// Estimate the radial velocity of the dominant reflector in
    /// `signal` against the analytic chirp `template`.
    pub fn estimate(&mut self, signal: &[Complex], template: &[Complex]) -> VelocityEstimate {
        let limit = self.params.velocity_search_limit_mps;
        let steps = self.params.velocity_search_steps;
        let step = 2.0 * limit / (steps - 1) as f64;

        let mut best_correlation = f64::NEG_INFINITY;
        let mut best_velocity = 0.0;

        for i in 0..steps {
            let v = -limit + i as f64 * step;
            let scaled = scale_template(template, v);
            let correlation = correlate(signal, &scaled);
            if correlation > best_correlation {
                best_correlation = correlation;
                best_velocity = v;
            }
        }

        let refined = self.refine(signal, template, best_velocity);

        let final_template = scale_template(template, refined);
        let final_correlation = correlate(signal, &final_template);

        self.last_velocity =
            (1.0 - self.params.ema_alpha) * self.last_velocity + self.params.ema_alpha * refined;
        self.last_correlation = final_correlation;

        debug!(
            raw = refined,
            smoothed = self.last_velocity,
            correlation = final_correlation,
            "velocity estimate"
        );

        VelocityEstimate {
            raw: refined,
            smoothed: self.last_velocity,
            correlation: final_correlation,
        }
    }

    /// Second pass: 10-step uniform sweep over `initial ± 0.5 m/s`.
    fn refine(&self, signal: &[Complex], template: &[Complex], initial: f64) -> f64 {
        const REFINE_HALF_WIDTH: f64 = 0.5;
        const REFINE_STEPS: usize = 10;

        let lo = initial - REFINE_HALF_WIDTH;
        let step = 2.0 * REFINE_HALF_WIDTH / (REFINE_STEPS - 1) as f64;

        let mut best_correlation = f64::NEG_INFINITY;
        let mut refined = initial;

        for i in 0..REFINE_STEPS {
            let v = lo + i as f64 * step;
            let scaled = scale_template(template, v);
            let correlation = correlate(signal, &scaled);
            if correlation > best_correlation {
                best_correlation = correlation;
                refined = v;
            }
        }

        refined
    }
}

/// Warp the template as an echo from a reflector at velocity `v` would be:
/// output sample `i` reads the template at `i / s`, `s = 1 + v/c`, with
/// linear interpolation. Samples falling outside the template are zero.
pub fn scale_template(template: &[Complex], velocity: f64) -> ComplexFrame {
    let len = template.len();
    let scale = 1.0 + velocity / SPEED_OF_SOUND;

    let mut scaled = Vec::with_capacity(len);
    for i in 0..len {
        let src = i as f64 / scale;
        let lower = src.floor() as isize;
        let upper = src.ceil() as isize;
        let fraction = src - lower as f64;

        if lower >= 0 && (upper as usize) < len {
            let a = template[lower as usize];
            let b = template[upper as usize];
            scaled.push(a * (1.0 - fraction) + b * fraction);
        } else {
            scaled.push(Complex::new(0.0, 0.0));
        }
    }
    scaled
}

/// Real dot-product correlation over the central half of the common length.
fn correlate(a: &[Complex], b: &[Complex]) -> f64 {
    let len = a.len().min(b.len());
    let start = len / 4;
    let end = 3 * len / 4;

    let mut sum = 0.0;
    for i in start..end {
        sum += a[i].re * b[i].re + a[i].im * b[i].im;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chirp::ChirpSynth;
    use approx::assert_relative_eq;

    fn synth() -> ChirpSynth {
        ChirpSynth::new(SondarParams::default())
    }

    #[test]
    fn test_scale_zero_velocity_is_identity() {
        let synth = synth();
        let scaled = scale_template(synth.reference(), 0.0);
        for (orig, s) in synth.reference().iter().zip(&scaled) {
            assert_relative_eq!(orig.re, s.re, epsilon = 1e-9);
            assert_relative_eq!(orig.im, s.im, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_scale_out_of_range_is_zero() {
        let synth = synth();
        // Receding target: template stretched, tail indices run past the end
        let scaled = scale_template(synth.reference(), -3.0);
        let last = scaled.last().unwrap();
        assert_relative_eq!(last.re, 0.0);
        assert_relative_eq!(last.im, 0.0);
    }

    #[test]
    fn test_stationary_echo_estimates_near_zero() {
        let synth = synth();
        let mut estimator = DopplerEstimator::new(SondarParams::default());
        let signal: ComplexFrame = synth.reference().to_vec();

        let estimate = estimator.estimate(&signal, synth.reference());
        // The refinement grid does not contain 0.0 exactly; the nearest
        // candidate sits at ±0.5/9 ≈ ±0.056 m/s.
        assert!(
            estimate.raw.abs() < 0.1,
            "raw velocity {:.3} m/s too far from 0",
            estimate.raw
        );
        assert!(estimate.correlation > 0.0);
    }

    #[test]
    fn test_moving_echo_estimates_velocity() {
        let synth = synth();
        let mut estimator = DopplerEstimator::new(SondarParams::default());
        let v_true = 1.0;
        let signal = scale_template(synth.reference(), v_true);

        let estimate = estimator.estimate(&signal, synth.reference());
        assert!(
            (estimate.raw - v_true).abs() < 0.15,
            "raw velocity {:.3} m/s, expected ≈ {:.1}",
            estimate.raw,
            v_true
        );
    }

    #[test]
    fn test_ema_converges_on_constant_velocity() {
        let synth = synth();
        let mut estimator = DopplerEstimator::new(SondarParams::default());
        // 0.9444... sits on the refinement grid of the coarse argmax (1.0),
        // so the per-frame estimate is exact and only the EMA lags.
        let v_true = 17.0 / 18.0;
        let signal = scale_template(synth.reference(), v_true);

        let mut estimate = estimator.estimate(&signal, synth.reference());
        for _ in 0..19 {
            estimate = estimator.estimate(&signal, synth.reference());
        }
        assert!(
            (estimate.smoothed - v_true).abs() < 0.05,
            "EMA {:.4} did not converge to {:.4}",
            estimate.smoothed,
            v_true
        );
    }

    #[test]
    fn test_ema_state_carries_between_frames() {
        let synth = synth();
        let mut estimator = DopplerEstimator::new(SondarParams::default());
        let signal = scale_template(synth.reference(), 2.0);

        let first = estimator.estimate(&signal, synth.reference());
        // First smoothed value is 0.3 of the raw estimate
        assert_relative_eq!(first.smoothed, 0.3 * first.raw, epsilon = 1e-9);

        let second = estimator.estimate(&signal, synth.reference());
        assert!(second.smoothed.abs() > first.smoothed.abs());
    }
}
