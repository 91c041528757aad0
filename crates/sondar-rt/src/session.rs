//! Sensing session: capture, processing, and emission actors
//!
//! A session wires an [`AudioDevice`] to the core pipeline with three
//! actors:
//!
//! ```text
//!            ┌──────────────┐  bounded(1)   ┌──────────────────┐
//! driver ──> │ capture      │ ──try_send──> │ processing worker │ ──> results
//!            │ callback     │  (drop when   │ (owns pipeline)   │     + snapshot
//!            └──────────────┘    full)      └──────────────────┘
//!            ┌──────────────┐
//!            │ emitter      │ ──chirp every emit_period──> speaker
//!            └──────────────┘
//! ```
//!
//! - The capture callback copies the driver's buffer and hands it off
//!   without ever blocking; if the worker is still busy the frame is
//!   dropped and counted.
//! - The single worker processes frames strictly in arrival order (the
//!   velocity EMA and the background model require it) and publishes each
//!   result to the sink and to the shared last-result snapshot.
//! - The emitter plays the pre-generated chirp at the configured period
//!   (100 ms → 10 Hz sensing rate), independent of processing latency.
//!
//! `stop` is idempotent: it signals both actors, waits briefly for each
//! (500 ms emitter, 1 s worker), and logs instead of hanging if one fails
//! to wind down. `release` implies `stop`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use sondar_core::{FrameResult, SondarError, SondarParams, SondarPipeline};

use crate::device::{AudioDevice, AudioError};

/// Grace period for the emitter thread at shutdown
const EMITTER_GRACE: Duration = Duration::from_millis(500);

/// Grace period for the processing worker at shutdown
const WORKER_GRACE: Duration = Duration::from_secs(1);

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised at the session boundary
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] SondarError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Sink receiving one [`FrameResult`] per processed frame, in capture order
pub type ResultSink = Box<dyn FnMut(FrameResult) + Send>;

/// A thread that signals its completion channel by dropping the sender.
struct Actor {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

impl Actor {
    fn spawn<F>(name: &'static str, body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let _done_tx = done_tx;
            body();
        });
        debug!(name, "actor spawned");
        Self { handle, done }
    }

    /// Wait up to `grace` for the actor to finish, then join it; a
    /// straggler is detached and reported instead of blocking shutdown.
    fn join_within(self, grace: Duration, what: &'static str) {
        match self.done.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = self.handle.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(error = %SondarError::ShutdownTimeout(what), "detaching thread");
            }
        }
    }
}

/// One sensing session over an injected audio device
pub struct SondarSession {
    params: SondarParams,
    device: Arc<Mutex<Box<dyn AudioDevice>>>,
    running: Arc<AtomicBool>,
    emitting: Arc<AtomicBool>,
    frame_tx: Option<SyncSender<Vec<i16>>>,
    emitter: Option<Actor>,
    worker: Option<Actor>,
    last_result: Arc<RwLock<Option<FrameResult>>>,
    dropped: Arc<AtomicU64>,
}

impl SondarSession {
    pub fn new(params: SondarParams, device: Box<dyn AudioDevice>) -> Self {
        Self {
            params,
            device: Arc::new(Mutex::new(device)),
            running: Arc::new(AtomicBool::new(false)),
            emitting: Arc::new(AtomicBool::new(false)),
            frame_tx: None,
            emitter: None,
            worker: None,
            last_result: Arc::new(RwLock::new(None)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// True while the session is capturing and processing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Most recent published result. Eventually consistent: the worker is
    /// the only writer.
    pub fn last_result(&self) -> Option<FrameResult> {
        self.last_result.read().unwrap().clone()
    }

    /// Frames rejected because the worker was still busy.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Start sensing. Results flow into `sink` in capture order; starting
    /// an already-running session is a no-op.
    pub fn start(&mut self, mut sink: ResultSink) -> SessionResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("starting SONDAR session");

        let mut pipeline = SondarPipeline::new(self.params.clone())?;
        let chirp: Vec<i16> = pipeline.emission().to_vec();

        // Processing worker: frames in, results out, strictly in order.
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Vec<i16>>(1);
        let running = Arc::clone(&self.running);
        let snapshot = Arc::clone(&self.last_result);
        self.worker = Some(Actor::spawn("sondar-worker", move || {
            while let Ok(frame) = frame_rx.recv() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                match pipeline.process(&frame) {
                    Ok(result) => {
                        debug!(velocity = result.velocity_mps, "frame processed");
                        *snapshot.write().unwrap() = Some(result.clone());
                        sink(result);
                    }
                    Err(e) => error!(error = %e, "stage fault, dropping frame"),
                }
            }
            debug!("processing worker finished");
        }));

        // Capture actor: copy the driver's buffer and hand it off without
        // blocking; a busy worker costs us the frame, never the callback.
        let tx = frame_tx.clone();
        self.frame_tx = Some(frame_tx);
        let running = Arc::clone(&self.running);
        let dropped = Arc::clone(&self.dropped);
        let capture_result = self
            .device
            .lock()
            .unwrap()
            .start_capture(Box::new(move |frame: &[i16]| {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                match tx.try_send(frame.to_vec()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        let total = dropped.fetch_add(1, Ordering::SeqCst) + 1;
                        warn!(total, "worker saturated, frame dropped");
                    }
                    Err(TrySendError::Disconnected(_)) => {}
                }
            }));
        if let Err(e) = capture_result {
            self.running.store(false, Ordering::SeqCst);
            self.frame_tx = None;
            if let Some(worker) = self.worker.take() {
                worker.join_within(WORKER_GRACE, "processing worker");
            }
            return Err(e.into());
        }

        // Emission actor: one chirp per period, 10 Hz by default.
        self.emitting.store(true, Ordering::SeqCst);
        let emitting = Arc::clone(&self.emitting);
        let device = Arc::clone(&self.device);
        let period = Duration::from_millis(self.params.emit_period_ms);
        self.emitter = Some(Actor::spawn("sondar-emitter", move || {
            while emitting.load(Ordering::SeqCst) {
                if let Err(e) = device.lock().unwrap().emit(&chirp) {
                    error!(error = %e, "chirp emission failed");
                    break;
                }
                thread::sleep(period);
            }
            debug!("emitter finished");
        }));

        info!("SONDAR session started");
        Ok(())
    }

    /// Stop sensing. Idempotent; shutdown stragglers are logged, never
    /// waited on indefinitely.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("stopping SONDAR session");

        self.emitting.store(false, Ordering::SeqCst);
        if let Some(emitter) = self.emitter.take() {
            emitter.join_within(EMITTER_GRACE, "emitter");
        }

        if let Err(e) = self.device.lock().unwrap().stop_capture() {
            warn!(error = %e, "stop_capture failed");
        }

        // Closing the channel drains the worker.
        self.frame_tx = None;
        if let Some(worker) = self.worker.take() {
            worker.join_within(WORKER_GRACE, "processing worker");
        }

        info!("SONDAR session stopped");
    }

    /// Stop the session and free the audio device.
    pub fn release(&mut self) {
        self.stop();
        self.device.lock().unwrap().release();
    }
}

impl Drop for SondarSession {
    fn drop(&mut self) {
        self.stop();
    }
}
