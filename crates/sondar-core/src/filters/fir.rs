//! Ultrasonic bandpass FIR filter
//!
//! Windowed-sinc bandpass confined to the chirp band, applied to every
//! captured frame before alignment. Everything below the band (voices,
//! ambient noise) and above it (harmonics, aliasing products) would
//! otherwise leak into the correlation search and the range spectrum.
//!
//! The kernel is the classic difference of two lowpass sincs at the band
//! edges, Hamming-tapered:
//!
//! ```text
//! h[n] = (sin(ω_hi·n) − sin(ω_lo·n)) / (π·n) · w[n],   n = i − K/2
//! h[0] = (ω_hi − ω_lo) / π · w[K/2]        (ω in rad/sample)
//! ```
//!
//! The kernel is real, so filtering a complex frame convolves the real and
//! imaginary channels independently.

use crate::filters::windows::Window;
use crate::params::SondarParams;
use crate::types::{Complex, ComplexFrame};

/// Bandpass FIR filter over complex frames with a real-valued kernel
#[derive(Debug, Clone)]
pub struct BandpassFir {
    kernel: Vec<f64>,
}

impl BandpassFir {
    /// Design the kernel for the configured chirp band.
    pub fn new(params: &SondarParams) -> Self {
        Self {
            kernel: design_bandpass_sinc(
                params.f_lo_hz,
                params.f_hi_hz,
                params.sample_rate_hz,
                params.fir_taps,
            ),
        }
    }

    /// Kernel taps (odd length, symmetric).
    pub fn kernel(&self) -> &[f64] {
        &self.kernel
    }

    /// Convolve the frame with the kernel, treating samples outside the
    /// frame as zero. Output length equals input length; an empty frame
    /// yields an empty frame.
    pub fn apply(&self, signal: &[Complex]) -> ComplexFrame {
        let signal_len = signal.len();
        let kernel_len = self.kernel.len();
        let half = kernel_len / 2;

        let mut filtered = Vec::with_capacity(signal_len);
        for i in 0..signal_len {
            let mut acc = Complex::new(0.0, 0.0);
            for (j, &tap) in self.kernel.iter().enumerate() {
                let idx = i as isize - j as isize + half as isize;
                if idx >= 0 && (idx as usize) < signal_len {
                    let s = signal[idx as usize];
                    acc.re += s.re * tap;
                    acc.im += s.im * tap;
                }
            }
            filtered.push(acc);
        }
        filtered
    }
}

/// Windowed-sinc bandpass design: difference of two lowpass kernels at the
/// normalized band edges.
fn design_bandpass_sinc(f_lo: f64, f_hi: f64, sample_rate: f64, taps: usize) -> Vec<f64> {
    use std::f64::consts::PI;

    let omega_lo = 2.0 * PI * f_lo / sample_rate;
    let omega_hi = 2.0 * PI * f_hi / sample_rate;
    let half = (taps / 2) as isize;

    let mut kernel = Vec::with_capacity(taps);
    for i in 0..taps {
        let n = i as isize - half;
        let ideal = if n == 0 {
            (omega_hi - omega_lo) / PI
        } else {
            let n = n as f64;
            ((omega_hi * n).sin() - (omega_lo * n).sin()) / (PI * n)
        };
        kernel.push(ideal * Window::Hamming.coefficient(i, taps));
    }
    kernel
}
