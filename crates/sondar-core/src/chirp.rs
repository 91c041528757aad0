//! Probe chirp synthesis
//!
//! Generates the linear FM up-chirp the speaker emits, the matched reference
//! template used by the Doppler search, and the complex down-chirp used to
//! dechirp received echoes to baseband.
//!
//! ## Waveforms
//!
//! All three share the same instantaneous phase
//!
//! ```text
//! φ(t) = 2π·(f_lo·t + ½·k·t²),   k = (f_hi − f_lo) / T_c
//! ```
//!
//! - **emission**: `sin(φ)`, Hamming-tapered, scaled to 80 % of `i16::MAX`
//!   and quantised for the DAC
//! - **reference template**: the emitted waveform lifted to the complex
//!   plane with zero imaginary part (no Hilbert transform; the real
//!   template is enough for the correlation search and far cheaper)
//! - **down-chirp**: unit-amplitude `exp(−jφ)`, the baseband mixing signal
//!
//! Multiplying a received up-chirp by the down-chirp collapses the linear
//! phase ramp, leaving tones whose frequencies encode target range (the
//! same trick LoRa demodulators use with a conjugate reference chirp).

use std::f64::consts::PI;

use crate::params::SondarParams;
use crate::types::{Complex, ComplexFrame, RealFrame};

/// Generator for the SONDAR probe waveforms.
///
/// Templates are precomputed once per session and borrowed by the stages
/// that consume them.
#[derive(Debug, Clone)]
pub struct ChirpSynth {
    params: SondarParams,
    emission: RealFrame,
    reference: ComplexFrame,
    downchirp: ComplexFrame,
}

impl ChirpSynth {
    pub fn new(params: SondarParams) -> Self {
        let emission = generate_emission(&params);
        let reference = emission
            .iter()
            .map(|&s| Complex::new(s as f64, 0.0))
            .collect();
        let downchirp = generate_downchirp(&params);
        Self {
            params,
            emission,
            reference,
            downchirp,
        }
    }

    pub fn params(&self) -> &SondarParams {
        &self.params
    }

    /// The quantised emission waveform handed to the audio output.
    pub fn emission(&self) -> &[i16] {
        &self.emission
    }

    /// The analytic reference template for correlation searches.
    pub fn reference(&self) -> &[Complex] {
        &self.reference
    }

    /// The complex down-chirp used as the dechirp mixing signal.
    pub fn downchirp(&self) -> &[Complex] {
        &self.downchirp
    }
}

/// Generate the Hamming-windowed emission chirp as signed 16-bit samples.
fn generate_emission(params: &SondarParams) -> RealFrame {
    let n = params.chirp_samples();
    let rate = params.chirp_rate();
    let amplitude = i16::MAX as f64 * params.amplitude_scale;

    let mut chirp = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64 / params.sample_rate_hz;
        let phase = 2.0 * PI * (params.f_lo_hz * t + 0.5 * rate * t * t);
        let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos();
        chirp.push((amplitude * window * phase.sin()) as i16);
    }
    chirp
}

/// Generate the unit-amplitude down-chirp `exp(−jφ)`.
fn generate_downchirp(params: &SondarParams) -> ComplexFrame {
    let n = params.chirp_samples();
    let rate = params.chirp_rate();

    let mut downchirp = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64 / params.sample_rate_hz;
        let phase = 2.0 * PI * (params.f_lo_hz * t + 0.5 * rate * t * t);
        downchirp.push(Complex::new((-phase).cos(), (-phase).sin()));
    }
    downchirp
}
