//! FFT utilities for echo processing
//!
//! Thin wrapper around `rustfft` shared by the STFT, the slow-time Doppler
//! transform, and the tests. The wrapper pins one plan per transform length
//! and reuses its scratch buffer, so per-frame processing performs no
//! planning work.
//!
//! Every transform length in the pipeline is a power of two by
//! construction (STFT window 512, slow-time length padded with
//! `next_power_of_two`). The wrapper enforces this at plan time instead of
//! silently padding: a non-power-of-two request is a configuration error,
//! not a runtime condition.

use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

use crate::types::{Complex, SondarError, SondarResult};

/// FFT processor for a fixed power-of-two length
pub struct FftProcessor {
    size: usize,
    fft_forward: Arc<dyn Fft<f64>>,
    fft_inverse: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex>,
}

impl fmt::Debug for FftProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftProcessor")
            .field("size", &self.size)
            .finish()
    }
}

impl FftProcessor {
    /// Plan forward and inverse transforms for `size` points.
    pub fn new(size: usize) -> SondarResult<Self> {
        if size == 0 || !size.is_power_of_two() {
            return Err(SondarError::InvalidFftSize(size));
        }
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(size);
        let fft_inverse = planner.plan_fft_inverse(size);
        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());
        let scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        Ok(Self {
            size,
            fft_forward,
            fft_inverse,
            scratch,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward FFT in place. The buffer length must equal the planned size.
    pub fn fft_inplace(&mut self, buffer: &mut [Complex]) {
        debug_assert_eq!(buffer.len(), self.size);
        self.fft_forward
            .process_with_scratch(buffer, &mut self.scratch);
    }

    /// Forward FFT into a new buffer.
    pub fn fft(&mut self, input: &[Complex]) -> Vec<Complex> {
        let mut buffer = input.to_vec();
        self.fft_inplace(&mut buffer);
        buffer
    }

    /// Inverse FFT in place, normalised by `1/N`.
    pub fn ifft_inplace(&mut self, buffer: &mut [Complex]) {
        debug_assert_eq!(buffer.len(), self.size);
        self.fft_inverse
            .process_with_scratch(buffer, &mut self.scratch);

        let scale = 1.0 / self.size as f64;
        for sample in buffer.iter_mut() {
            *sample *= scale;
        }
    }

    /// Inverse FFT into a new buffer, normalised by `1/N`.
    pub fn ifft(&mut self, input: &[Complex]) -> Vec<Complex> {
        let mut buffer = input.to_vec();
        self.ifft_inplace(&mut buffer);
        buffer
    }

    /// Magnitude spectrum of a complex buffer.
    pub fn magnitude_spectrum(spectrum: &[Complex]) -> Vec<f64> {
        spectrum.iter().map(|c| c.norm()).collect()
    }
}

/// 2-D FFT: 1-D transforms row-wise, then column-wise.
///
/// Both dimensions must be powers of two. Used by analysis tooling; the
/// range-Doppler stage performs its column transforms directly so that it
/// can zero-pad the slow-time axis first.
pub fn fft_2d(input: &[Vec<Complex>]) -> SondarResult<Vec<Vec<Complex>>> {
    let rows = input.len();
    if rows == 0 {
        return Ok(Vec::new());
    }
    let cols = input[0].len();

    let mut row_fft = FftProcessor::new(cols)?;
    let mut output: Vec<Vec<Complex>> = input.iter().map(|row| row_fft.fft(row)).collect();

    let mut col_fft = FftProcessor::new(rows)?;
    let mut column = vec![Complex::new(0.0, 0.0); rows];
    for j in 0..cols {
        for (i, row) in output.iter().enumerate() {
            column[i] = row[j];
        }
        col_fft.fft_inplace(&mut column);
        for (i, row) in output.iter_mut().enumerate() {
            row[j] = column[i];
        }
    }

    Ok(output)
}

/// Magnitudes of a 2-D complex image as `f32`.
pub fn magnitude_2d(input: &[Vec<Complex>]) -> Vec<Vec<f32>> {
    input
        .iter()
        .map(|row| row.iter().map(|c| c.norm() as f32).collect())
        .collect()
}
