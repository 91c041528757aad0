//! Dechirp, STFT, and range-Doppler formation
//!
//! Three steps turn an aligned echo frame into a range-Doppler magnitude
//! image:
//!
//! ```text
//! aligned ──×──> baseband ──STFT──> time-freq image ──slow-time FFT──> range-Doppler
//!           │                        [window][bin]                      [bin][doppler]
//!       downchirp
//! ```
//!
//! 1. **Dechirp**: multiplying by the complex down-chirp collapses the
//!    chirp's linear phase ramp; each reflector becomes a tone whose
//!    frequency is proportional to its round-trip delay (range).
//! 2. **STFT**: Hann-tapered sliding windows resolve those tones into a
//!    time-frequency image. Only the positive-frequency half of each
//!    spectrum is kept.
//! 3. **Slow time**: a second FFT across the window axis per frequency bin
//!    separates reflectors by Doppler, exactly as an FMCW radar forms its
//!    range-Doppler map from consecutive sweeps.

use tracing::debug;

use crate::fft_utils::FftProcessor;
use crate::filters::Window;
use crate::params::SondarParams;
use crate::types::{Complex, ComplexFrame, RangeDopplerImage, SondarResult, TimeFreqImage};

/// Baseband conversion and image formation for aligned echo frames
#[derive(Debug)]
pub struct Downconverter {
    window_len: usize,
    step: usize,
    hann: Vec<f64>,
    window_fft: FftProcessor,
    /// Slow-time plan, re-used while the padded window count is stable
    slow_time_fft: Option<FftProcessor>,
}

impl Downconverter {
    pub fn new(params: &SondarParams) -> SondarResult<Self> {
        let window_len = params.stft_window;
        Ok(Self {
            window_len,
            step: params.stft_step,
            hann: Window::Hann.generate(window_len),
            window_fft: FftProcessor::new(window_len)?,
            slow_time_fft: None,
        })
    }

    /// Mix the aligned frame with the down-chirp template. Samples beyond
    /// the template length are zeroed.
    pub fn dechirp(&self, aligned: &[Complex], downchirp: &[Complex]) -> ComplexFrame {
        aligned
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                if i < downchirp.len() {
                    s * downchirp[i]
                } else {
                    Complex::new(0.0, 0.0)
                }
            })
            .collect()
    }

    /// Short-time Fourier transform of the baseband signal.
    ///
    /// Output shape is `[(L − W)/H + 1][W/2]`; a signal shorter than one
    /// window produces an empty image.
    pub fn time_freq_image(&mut self, baseband: &[Complex]) -> TimeFreqImage {
        let len = baseband.len();
        if len < self.window_len {
            return Vec::new();
        }
        let num_windows = (len - self.window_len) / self.step + 1;
        debug!(
            window = self.window_len,
            step = self.step,
            num_windows,
            "computing STFT"
        );

        let mut image = Vec::with_capacity(num_windows);
        let mut buffer = vec![Complex::new(0.0, 0.0); self.window_len];

        for w in 0..num_windows {
            let start = w * self.step;
            for i in 0..self.window_len {
                buffer[i] = baseband[start + i] * self.hann[i];
            }
            self.window_fft.fft_inplace(&mut buffer);
            image.push(buffer[..self.window_len / 2].to_vec());
        }
        image
    }

    /// Range-Doppler image: per frequency bin, FFT the slow-time sequence
    /// across windows (zero-padded to the next power of two) and keep the
    /// magnitudes.
    ///
    /// Output shape is `[W/2][next_pow2(num_windows)]`.
    pub fn range_doppler(&mut self, image: &TimeFreqImage) -> SondarResult<RangeDopplerImage> {
        let time_steps = image.len();
        if time_steps == 0 {
            return Ok(Vec::new());
        }
        let freq_bins = image[0].len();
        let padded = time_steps.next_power_of_two();

        let mut fft = match self.slow_time_fft.take() {
            Some(plan) if plan.size() == padded => plan,
            _ => FftProcessor::new(padded)?,
        };

        debug!(time_steps, freq_bins, padded, "computing range-Doppler image");

        let mut output = vec![vec![0.0_f32; padded]; freq_bins];
        let mut slow_time = vec![Complex::new(0.0, 0.0); padded];

        for freq in 0..freq_bins {
            for t in 0..padded {
                slow_time[t] = if t < time_steps {
                    image[t][freq]
                } else {
                    Complex::new(0.0, 0.0)
                };
            }
            fft.fft_inplace(&mut slow_time);
            for t in 0..padded {
                output[freq][t] = slow_time[t].norm() as f32;
            }
        }
        self.slow_time_fft = Some(fft);

        Ok(output)
    }
}
