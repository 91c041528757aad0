//! Per-frame processing pipeline
//!
//! Sequential orchestration of the DSP stages for one captured frame:
//!
//! ```text
//! PCM ─> preprocess ─> align ─> dechirp ─> STFT ─> subtract ─> range-Doppler ─> compensate
//!        (bandpass)    (Doppler)                    background                  (velocity)
//! ```
//!
//! The pipeline owns every piece of session state: the chirp templates, the
//! FIR kernel, the Doppler EMA, the background model, and the last-image
//! snapshots. It is single-threaded by contract: the runtime crate feeds
//! it frames in capture order from one worker.

use tracing::{debug, error};

use crate::background::BackgroundSubtractor;
use crate::chirp::ChirpSynth;
use crate::downconvert::Downconverter;
use crate::echo_align::EchoAligner;
use crate::filters::BandpassFir;
use crate::logging::SignalTraceLogger;
use crate::params::SondarParams;
use crate::phase_comp::PhaseCompensator;
use crate::types::{complex_ops, ComplexFrame, RangeDopplerImage, SondarResult, TimeFreqImage};

/// Output of one pipeline pass
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// Phase-compensated range-Doppler magnitude image
    pub range_doppler: RangeDopplerImage,
    /// Gated, clamped Doppler velocity of the dominant reflector (m/s)
    pub velocity_mps: f64,
}

/// The complete per-frame processing chain and its session state
#[derive(Debug)]
pub struct SondarPipeline {
    params: SondarParams,
    synth: ChirpSynth,
    bandpass: BandpassFir,
    aligner: EchoAligner,
    downconverter: Downconverter,
    background: BackgroundSubtractor,
    phase: PhaseCompensator,
    logger: Option<SignalTraceLogger>,
    frame_counter: usize,
    last_foreground: Option<TimeFreqImage>,
    last_range_doppler: Option<RangeDopplerImage>,
}

impl SondarPipeline {
    pub fn new(params: SondarParams) -> SondarResult<Self> {
        params.validate()?;
        let synth = ChirpSynth::new(params.clone());
        let bandpass = BandpassFir::new(&params);
        let aligner = EchoAligner::new(params.clone());
        let downconverter = Downconverter::new(&params)?;
        let background = BackgroundSubtractor::new(params.background_alpha);

        Ok(Self {
            params,
            synth,
            bandpass,
            aligner,
            downconverter,
            background,
            phase: PhaseCompensator::new(),
            logger: None,
            frame_counter: 0,
            last_foreground: None,
            last_range_doppler: None,
        })
    }

    /// Attach an experiment trace logger.
    pub fn with_logger(mut self, logger: SignalTraceLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Access the attached trace logger, if any.
    pub fn logger_mut(&mut self) -> Option<&mut SignalTraceLogger> {
        self.logger.as_mut()
    }

    pub fn params(&self) -> &SondarParams {
        &self.params
    }

    /// The emission waveform the session should play each period.
    pub fn emission(&self) -> &[i16] {
        self.synth.emission()
    }

    /// Foreground time-frequency image of the most recent frame.
    pub fn last_foreground(&self) -> Option<&TimeFreqImage> {
        self.last_foreground.as_ref()
    }

    /// Compensated range-Doppler image of the most recent frame.
    pub fn last_range_doppler(&self) -> Option<&RangeDopplerImage> {
        self.last_range_doppler.as_ref()
    }

    /// Bandpass the raw PCM frame into the chirp band.
    pub fn preprocess(&self, frame: &[i16]) -> ComplexFrame {
        let complex = complex_ops::pcm_to_complex(frame);
        let filtered = self.bandpass.apply(&complex);
        if self.params.double_bandpass {
            self.bandpass.apply(&filtered)
        } else {
            filtered
        }
    }

    /// Run the full chain on one captured frame.
    ///
    /// Stage failures are logged and surface as an error; pipeline state
    /// stays valid, so the caller simply drops the frame and proceeds with
    /// the next one.
    pub fn process(&mut self, frame: &[i16]) -> SondarResult<FrameResult> {
        let index = self.frame_counter;
        self.frame_counter += 1;
        debug!(index, len = frame.len(), "processing frame");

        if let Some(logger) = self.logger.as_mut() {
            logger.log_raw(frame, index);
        }

        let preprocessed = self.preprocess(frame);
        if let Some(logger) = self.logger.as_mut() {
            logger.log_complex(&preprocessed, index, "preprocessed");
        }

        let aligned = self.aligner.align(&preprocessed, self.synth.reference());
        if let Some(logger) = self.logger.as_mut() {
            logger.log_velocity(
                aligned.raw_velocity,
                aligned.velocity,
                aligned.correlation,
                index,
            );
        }

        let baseband = self
            .downconverter
            .dechirp(&aligned.frame, self.synth.downchirp());
        let time_freq = self.downconverter.time_freq_image(&baseband);
        let foreground = self.background.subtract(&time_freq);

        let range_doppler = match self.downconverter.range_doppler(&foreground) {
            Ok(image) => image,
            Err(e) => {
                error!(index, error = %e, "range-Doppler stage failed, dropping frame");
                return Err(e);
            }
        };

        let compensated = self.phase.compensate(&range_doppler, aligned.velocity);
        if let Some(logger) = self.logger.as_mut() {
            logger.log_image(&compensated, index, "compensated");
        }

        self.last_foreground = Some(foreground);
        self.last_range_doppler = Some(compensated.clone());

        Ok(FrameResult {
            range_doppler: compensated,
            velocity_mps: aligned.velocity,
        })
    }
}
