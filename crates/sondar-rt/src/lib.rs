//! # SONDAR Runtime
//!
//! Capture, processing, and emission actors around the `sondar-core`
//! pipeline. The audio backend is injected behind the [`AudioDevice`]
//! trait, so the same session code runs against real hardware or against
//! the scripted [`SyntheticAudioDevice`] in tests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use sondar_core::SondarParams;
//! use sondar_rt::{SondarSession, SyntheticAudioDevice};
//!
//! let device = SyntheticAudioDevice::new(vec![vec![0_i16; 960]; 10],
//!                                        Duration::from_millis(20));
//! let mut session = SondarSession::new(SondarParams::default(), Box::new(device));
//! session.start(Box::new(|result| {
//!     println!("velocity {:.2} m/s", result.velocity_mps);
//! })).unwrap();
//! // ... sense for a while ...
//! session.release();
//! ```

pub mod device;
pub mod session;
pub mod synthetic;

pub use device::{AudioDevice, AudioError, AudioResult, FrameCallback};
pub use session::{ResultSink, SessionError, SessionResult, SondarSession};
pub use synthetic::SyntheticAudioDevice;
