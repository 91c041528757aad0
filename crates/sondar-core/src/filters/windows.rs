//! Window functions for chirp shaping and spectral analysis
//!
//! | Window     | Sidelobe Level | Used for                          |
//! |------------|----------------|-----------------------------------|
//! | Rectangular| -13 dB         | raw correlation                   |
//! | Hamming    | -43 dB         | chirp taper, bandpass FIR design  |
//! | Hann       | -32 dB         | STFT analysis windows             |
//! | Blackman   | -58 dB         | high-dynamic-range analysis       |

use std::f64::consts::PI;

/// Window function type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Rectangular window (no tapering)
    Rectangular,
    /// Hamming window: 0.54 - 0.46*cos(2πn/(N-1))
    Hamming,
    /// Hann window: 0.5*(1 - cos(2πn/(N-1)))
    Hann,
    /// Blackman window: 0.42 - 0.5*cos(2πn/(N-1)) + 0.08*cos(4πn/(N-1))
    Blackman,
}

impl Window {
    /// Generate window coefficients for the given length.
    ///
    /// Lengths 0 and 1 return `vec![]` and `vec![1.0]` respectively.
    pub fn generate(&self, length: usize) -> Vec<f64> {
        if length == 0 {
            return Vec::new();
        }
        if length == 1 {
            return vec![1.0];
        }
        let m = (length - 1) as f64;
        (0..length)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / m;
                match self {
                    Window::Rectangular => 1.0,
                    Window::Hamming => 0.54 - 0.46 * x.cos(),
                    Window::Hann => 0.5 * (1.0 - x.cos()),
                    Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }

    /// Evaluate a single coefficient without materialising the window.
    pub fn coefficient(&self, i: usize, length: usize) -> f64 {
        if length < 2 {
            return 1.0;
        }
        let x = 2.0 * PI * i as f64 / (length - 1) as f64;
        match self {
            Window::Rectangular => 1.0,
            Window::Hamming => 0.54 - 0.46 * x.cos(),
            Window::Hann => 0.5 * (1.0 - x.cos()),
            Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
        }
    }
}
