//! # SONDAR Core DSP Library
//!
//! This crate implements the signal-processing core of SONDAR, an acoustic
//! imaging sensor built from a commodity speaker and microphone. The device
//! emits an inaudible 15–17 kHz linear FM chirp; echoes from a nearby
//! moving object are captured, aligned against the object's motion, and
//! compressed into a range-Doppler image from which velocity, physical
//! size, and coarse shape are inferred.
//!
//! ## Signal Flow
//!
//! ```text
//! mic PCM ─> bandpass ─> Doppler align ─> dechirp ─> STFT ─> background
//!                                                              subtract
//!                                                                 │
//!       size/shape <─ physical map <─ phase comp <─ range-Doppler FFT
//! ```
//!
//! ## Example
//!
//! ```rust
//! use sondar_core::{SondarParams, SondarPipeline};
//!
//! let params = SondarParams::default();
//! let mut pipeline = SondarPipeline::new(params).unwrap();
//!
//! // One 20 ms capture buffer (960 samples at 48 kHz)
//! let frame = vec![0_i16; 960];
//! let result = pipeline.process(&frame).unwrap();
//! println!(
//!     "velocity {:.2} m/s, image {}x{}",
//!     result.velocity_mps,
//!     result.range_doppler.len(),
//!     result.range_doppler.first().map_or(0, |r| r.len()),
//! );
//! ```
//!
//! The capture/emission runtime lives in the companion `sondar-rt` crate;
//! this crate is pure computation and holds no threads.

pub mod background;
pub mod chirp;
pub mod doppler;
pub mod downconvert;
pub mod echo_align;
pub mod fft_utils;
pub mod filters;
pub mod imaging;
pub mod logging;
pub mod params;
pub mod phase_comp;
pub mod pipeline;
pub mod types;

pub use background::BackgroundSubtractor;
pub use chirp::ChirpSynth;
pub use doppler::{DopplerEstimator, VelocityEstimate};
pub use downconvert::Downconverter;
pub use echo_align::{AlignedFrame, EchoAligner};
pub use fft_utils::FftProcessor;
pub use filters::{BandpassFir, Window};
pub use imaging::{ImageConverter, PhysicalImage, ShapeClassifier, ShapeLabel, UnknownClassifier};
pub use logging::SignalTraceLogger;
pub use params::SondarParams;
pub use phase_comp::PhaseCompensator;
pub use pipeline::{FrameResult, SondarPipeline};
pub use types::{Complex, ComplexFrame, RangeDopplerImage, RealFrame, SondarError, SondarResult, TimeFreqImage};
