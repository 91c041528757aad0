//! Audio device abstraction
//!
//! This module defines the common interface the SONDAR runtime expects from
//! an audio backend: mono signed-16 PCM capture at the configured sample
//! rate, and playback of the pre-generated chirp buffer.
//!
//! Real backends wrap a platform audio API; tests use the scripted device
//! in [`crate::synthetic`].

/// Result type for audio device operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Errors that can occur at the audio boundary
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("capture not started")]
    NotStarted,

    #[error("capture already running")]
    AlreadyRunning,

    #[error("hardware error: {0}")]
    HardwareError(String),

    #[error("device released")]
    Released,
}

/// Callback invoked once per capture buffer.
///
/// The slice is only valid for the duration of the call (the driver reuses
/// its buffer), so implementations must copy before handing the frame to
/// anyone else, and must return promptly.
pub type FrameCallback = Box<dyn FnMut(&[i16]) + Send>;

/// Common interface for audio capture/playback backends
pub trait AudioDevice: Send {
    /// Backend name, for diagnostics.
    fn name(&self) -> &str;

    /// Begin capture; `on_frame` fires once per buffer until
    /// [`stop_capture`](Self::stop_capture).
    fn start_capture(&mut self, on_frame: FrameCallback) -> AudioResult<()>;

    /// Stop capture. Idempotent.
    fn stop_capture(&mut self) -> AudioResult<()>;

    /// Queue one buffer of samples for playback.
    fn emit(&mut self, samples: &[i16]) -> AudioResult<()>;

    /// Stop everything and free backend resources. Idempotent; the device
    /// is unusable afterwards.
    fn release(&mut self);
}
