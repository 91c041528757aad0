//! SONDAR acquisition and processing parameters
//!
//! Every numeric constant of the sensing chain lives here, injected into the
//! stages that need it so that no parameter is defined in two places.
//!
//! ## The chirp band
//!
//! The probe signal is a 20 ms linear up-chirp swept across 15–17 kHz: high
//! enough to be inaudible to most adults, low enough that commodity speakers
//! and microphones still have usable response.
//!
//! ```text
//! f (kHz)
//!  17 |      /      /      /
//!     |     /      /      /
//!  15 |____/______/______/____
//!     |  20ms gap  ...        t
//!     |<-- 100 ms emit period -->|
//! ```
//!
//! Sensing rate is 10 Hz: one chirp per 100 ms emit period, one capture
//! buffer (20 ms, `sample_rate/50` samples) processed per frame.

use serde::{Deserialize, Serialize};

use crate::types::{SondarError, SondarResult, SPEED_OF_SOUND};

/// Complete parameter set for a SONDAR session.
///
/// Construct with [`SondarParams::builder`], which validates the chirp band
/// against Nyquist, or take [`SondarParams::default`] for the reference
/// 48 kHz / 15–17 kHz configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SondarParams {
    /// Capture and playback sample rate (Hz)
    pub sample_rate_hz: f64,
    /// Chirp start frequency (Hz)
    pub f_lo_hz: f64,
    /// Chirp end frequency (Hz)
    pub f_hi_hz: f64,
    /// Chirp duration (ms)
    pub chirp_ms: f64,
    /// Silence between chirps (ms); the chirp+gap pair is one range profile
    pub inter_chirp_gap_ms: f64,
    /// Fixed playback-to-capture latency of the device (ms)
    pub device_latency_ms: f64,
    /// Period of the chirp emitter (ms); 100 ms gives the 10 Hz sensing rate
    pub emit_period_ms: u64,
    /// Emission amplitude as a fraction of `i16::MAX`
    pub amplitude_scale: f64,
    /// Bandpass FIR kernel length (odd)
    pub fir_taps: usize,
    /// STFT window length (power of two)
    pub stft_window: usize,
    /// STFT hop between windows (samples)
    pub stft_step: usize,
    /// Background model adaptation rate
    pub background_alpha: f64,
    /// Velocity EMA weight given to the newest estimate
    pub ema_alpha: f64,
    /// Half-width of the coarse velocity search (m/s)
    pub velocity_search_limit_mps: f64,
    /// Number of hypotheses in the coarse velocity sweep
    pub velocity_search_steps: usize,
    /// Hard clamp on the velocity handed downstream (m/s)
    pub velocity_clamp_mps: f64,
    /// Correlation score below which the velocity estimate is discarded
    pub reliability_threshold: f64,
    /// Peak magnitude below which a frame is considered too weak to align
    pub weak_signal_threshold: f64,
    /// Apply the bandpass FIR twice during preprocessing for extra
    /// stopband rejection at the cost of passband droop
    pub double_bandpass: bool,
    /// Smallest admissible synthetic aperture (radians)
    pub min_aperture_rad: f64,
    /// Aperture assumed when too few distance measurements are available
    pub default_aperture_rad: f64,
}

impl Default for SondarParams {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000.0,
            f_lo_hz: 15_000.0,
            f_hi_hz: 17_000.0,
            chirp_ms: 20.0,
            inter_chirp_gap_ms: 20.0,
            device_latency_ms: 132.78,
            emit_period_ms: 100,
            amplitude_scale: 0.8,
            fir_taps: 101,
            stft_window: 512,
            stft_step: 16,
            background_alpha: 0.05,
            ema_alpha: 0.3,
            velocity_search_limit_mps: 5.0,
            velocity_search_steps: 41,
            velocity_clamp_mps: 10.0,
            reliability_threshold: 1000.0,
            weak_signal_threshold: 1.0,
            double_bandpass: false,
            min_aperture_rad: 1.0_f64.to_radians(),
            default_aperture_rad: 15.0_f64.to_radians(),
        }
    }
}

impl SondarParams {
    /// Create a new builder seeded with the default configuration
    pub fn builder() -> SondarParamsBuilder {
        SondarParamsBuilder::default()
    }

    /// Validate the cross-parameter invariants.
    pub fn validate(&self) -> SondarResult<()> {
        if !(self.f_lo_hz > 0.0 && self.f_lo_hz < self.f_hi_hz) {
            return Err(SondarError::InvalidConfig(format!(
                "chirp band must satisfy 0 < f_lo < f_hi, got [{}, {}]",
                self.f_lo_hz, self.f_hi_hz
            )));
        }
        if self.f_hi_hz >= self.sample_rate_hz / 2.0 {
            return Err(SondarError::InvalidConfig(format!(
                "chirp top {} Hz exceeds Nyquist {} Hz",
                self.f_hi_hz,
                self.sample_rate_hz / 2.0
            )));
        }
        if self.chirp_ms <= 0.0 {
            return Err(SondarError::InvalidConfig(format!(
                "chirp duration must be positive, got {} ms",
                self.chirp_ms
            )));
        }
        if !self.stft_window.is_power_of_two() {
            return Err(SondarError::InvalidConfig(format!(
                "STFT window must be a power of two, got {}",
                self.stft_window
            )));
        }
        if self.stft_step == 0 {
            return Err(SondarError::InvalidConfig(
                "STFT step must be non-zero".into(),
            ));
        }
        if self.fir_taps % 2 == 0 {
            return Err(SondarError::InvalidConfig(format!(
                "FIR kernel length must be odd, got {}",
                self.fir_taps
            )));
        }
        Ok(())
    }

    /// Number of samples in one chirp
    pub fn chirp_samples(&self) -> usize {
        (self.sample_rate_hz * self.chirp_ms / 1000.0) as usize
    }

    /// Number of samples in one capture buffer (20 ms)
    pub fn capture_buffer_samples(&self) -> usize {
        (self.sample_rate_hz as usize) / 50
    }

    /// Device latency expressed in whole samples
    pub fn latency_samples(&self) -> usize {
        (self.device_latency_ms * self.sample_rate_hz / 1000.0).round() as usize
    }

    /// Swept bandwidth (Hz)
    pub fn bandwidth_hz(&self) -> f64 {
        self.f_hi_hz - self.f_lo_hz
    }

    /// Chirp sweep rate (Hz/s)
    pub fn chirp_rate(&self) -> f64 {
        self.bandwidth_hz() / (self.chirp_ms / 1000.0)
    }

    /// Time-scale factor an echo experiences at radial velocity `v` (m/s)
    pub fn time_scale(&self, velocity_mps: f64) -> f64 {
        1.0 + velocity_mps / SPEED_OF_SOUND
    }
}

/// Builder for [`SondarParams`]
#[derive(Default)]
pub struct SondarParamsBuilder {
    params: SondarParams,
}

impl SondarParamsBuilder {
    pub fn sample_rate(mut self, hz: f64) -> Self {
        self.params.sample_rate_hz = hz;
        self
    }

    pub fn chirp_band(mut self, f_lo_hz: f64, f_hi_hz: f64) -> Self {
        self.params.f_lo_hz = f_lo_hz;
        self.params.f_hi_hz = f_hi_hz;
        self
    }

    pub fn chirp_duration_ms(mut self, ms: f64) -> Self {
        self.params.chirp_ms = ms;
        self
    }

    pub fn inter_chirp_gap_ms(mut self, ms: f64) -> Self {
        self.params.inter_chirp_gap_ms = ms;
        self
    }

    pub fn device_latency_ms(mut self, ms: f64) -> Self {
        self.params.device_latency_ms = ms;
        self
    }

    pub fn emit_period_ms(mut self, ms: u64) -> Self {
        self.params.emit_period_ms = ms;
        self
    }

    pub fn stft(mut self, window: usize, step: usize) -> Self {
        self.params.stft_window = window;
        self.params.stft_step = step;
        self
    }

    pub fn background_alpha(mut self, alpha: f64) -> Self {
        self.params.background_alpha = alpha;
        self
    }

    pub fn reliability_threshold(mut self, threshold: f64) -> Self {
        self.params.reliability_threshold = threshold;
        self
    }

    pub fn weak_signal_threshold(mut self, threshold: f64) -> Self {
        self.params.weak_signal_threshold = threshold;
        self
    }

    pub fn double_bandpass(mut self, enabled: bool) -> Self {
        self.params.double_bandpass = enabled;
        self
    }

    /// Validate and produce the final parameter set.
    pub fn build(self) -> SondarResult<SondarParams> {
        self.params.validate()?;
        Ok(self.params)
    }
}
