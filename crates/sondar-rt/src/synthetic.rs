//! Scripted audio device for headless operation
//!
//! Replays a programmed sequence of capture frames on a background thread
//! at a configurable cadence and records everything emitted, so sessions
//! can run end-to-end without audio hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::device::{AudioDevice, AudioError, AudioResult, FrameCallback};

/// Software replacement for a real microphone/speaker pair
pub struct SyntheticAudioDevice {
    frames: Arc<Vec<Vec<i16>>>,
    interval: Duration,
    loop_frames: bool,
    capturing: Arc<AtomicBool>,
    released: bool,
    capture_thread: Option<JoinHandle<()>>,
    emitted: Arc<Mutex<Vec<Vec<i16>>>>,
}

impl SyntheticAudioDevice {
    /// A device that will replay `frames` once, one every `interval`.
    pub fn new(frames: Vec<Vec<i16>>, interval: Duration) -> Self {
        Self {
            frames: Arc::new(frames),
            interval,
            loop_frames: false,
            capturing: Arc::new(AtomicBool::new(false)),
            released: false,
            capture_thread: None,
            emitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replay the frame script forever instead of once.
    pub fn looping(mut self) -> Self {
        self.loop_frames = true;
        self
    }

    /// Handle to the emission record; each [`AudioDevice::emit`] call
    /// appends one buffer.
    pub fn emitted(&self) -> Arc<Mutex<Vec<Vec<i16>>>> {
        Arc::clone(&self.emitted)
    }
}

impl AudioDevice for SyntheticAudioDevice {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn start_capture(&mut self, mut on_frame: FrameCallback) -> AudioResult<()> {
        if self.released {
            return Err(AudioError::Released);
        }
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }

        let frames = Arc::clone(&self.frames);
        let capturing = Arc::clone(&self.capturing);
        let interval = self.interval;
        let loop_frames = self.loop_frames;

        self.capture_thread = Some(thread::spawn(move || {
            debug!(frames = frames.len(), "synthetic capture started");
            loop {
                for frame in frames.iter() {
                    if !capturing.load(Ordering::SeqCst) {
                        return;
                    }
                    on_frame(frame);
                    if !interval.is_zero() {
                        thread::sleep(interval);
                    }
                }
                if !loop_frames {
                    break;
                }
            }
            capturing.store(false, Ordering::SeqCst);
        }));
        Ok(())
    }

    fn stop_capture(&mut self) -> AudioResult<()> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn emit(&mut self, samples: &[i16]) -> AudioResult<()> {
        if self.released {
            return Err(AudioError::Released);
        }
        self.emitted
            .lock()
            .expect("emission record poisoned")
            .push(samples.to_vec());
        Ok(())
    }

    fn release(&mut self) {
        let _ = self.stop_capture();
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_replays_script_once() {
        let mut device =
            SyntheticAudioDevice::new(vec![vec![1; 4], vec![2; 4]], Duration::ZERO);
        let (tx, rx) = mpsc::channel();
        device
            .start_capture(Box::new(move |frame| {
                tx.send(frame.to_vec()).unwrap();
            }))
            .unwrap();
        device.stop_capture().unwrap();

        let received: Vec<Vec<i16>> = rx.try_iter().collect();
        assert!(received.len() <= 2);
    }

    #[test]
    fn test_records_emissions() {
        let mut device = SyntheticAudioDevice::new(Vec::new(), Duration::ZERO);
        let record = device.emitted();
        device.emit(&[1, 2, 3]).unwrap();
        device.emit(&[4, 5]).unwrap();
        let emitted = record.lock().unwrap();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0], vec![1, 2, 3]);
    }

    #[test]
    fn test_released_device_rejects_use() {
        let mut device = SyntheticAudioDevice::new(Vec::new(), Duration::ZERO);
        device.release();
        assert!(matches!(device.emit(&[0]), Err(AudioError::Released)));
        assert!(matches!(
            device.start_capture(Box::new(|_| {})),
            Err(AudioError::Released)
        ));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut device =
            SyntheticAudioDevice::new(vec![vec![0; 4]], Duration::from_millis(50)).looping();
        device.start_capture(Box::new(|_| {})).unwrap();
        assert!(matches!(
            device.start_capture(Box::new(|_| {})),
            Err(AudioError::AlreadyRunning)
        ));
        device.stop_capture().unwrap();
    }
}
