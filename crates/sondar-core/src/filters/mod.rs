//! Filtering primitives: window functions and the ultrasonic bandpass FIR.

pub mod fir;
pub mod windows;

pub use fir::BandpassFir;
pub use windows::Window;
