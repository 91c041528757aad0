//! Per-stage experiment trace logging
//!
//! Optional JSON capture of the signal as it moves through the pipeline,
//! meant for offline analysis of recorded experiments. One document per
//! experiment:
//!
//! ```text
//! {
//!   "metadata": { "name", "startTime", "endTime", "experimentId",
//!                 "chirpMinFreq", "chirpMaxFreq", "chirpDuration",
//!                 "sampleRate" },
//!   "samples": [
//!     { "sampleIndex": 12,
//!       "rawSignal": [...],                 ~100 decimated points
//!       "preprocessed": [...],              per-stage magnitudes
//!       "rangeDoppler_stats": {...},        min/max/mean/rows/cols
//!       "rangeDoppler_image": [[...]],      ~50×50 decimated copy
//!       "velocityData": { "rawVelocity", "smoothedVelocity",
//!                         "correlationScore" } }
//!   ]
//! }
//! ```
//!
//! Frames are merged by `sampleIndex`; only the 10 most recent samples are
//! retained, so the logger is safe to leave attached during long sessions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::params::SondarParams;
use crate::types::{Complex, RangeDopplerImage};

/// Number of recent samples retained in memory
const RING_CAPACITY: usize = 10;

/// Target number of points when decimating a 1-D signal
const SIGNAL_POINTS: usize = 100;

/// Target rows/cols when decimating a 2-D image
const IMAGE_POINTS: usize = 50;

/// JSON trace logger for SONDAR experiments
#[derive(Debug, Default)]
pub struct SignalTraceLogger {
    enabled: bool,
    experiment_counter: u32,
    output_dir: Option<PathBuf>,
    metadata: Map<String, Value>,
    samples: Vec<Value>,
}

impl SignalTraceLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Begin a new experiment; prior in-memory data is discarded.
    pub fn start_experiment(&mut self, name: &str, dir: &Path, params: &SondarParams) {
        self.experiment_counter += 1;
        self.samples.clear();
        self.metadata = Map::new();
        self.metadata.insert("name".into(), json!(name));
        self.metadata.insert(
            "startTime".into(),
            json!(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        );
        self.metadata
            .insert("experimentId".into(), json!(self.experiment_counter));
        self.metadata.insert("chirpMinFreq".into(), json!(params.f_lo_hz));
        self.metadata.insert("chirpMaxFreq".into(), json!(params.f_hi_hz));
        self.metadata.insert("chirpDuration".into(), json!(params.chirp_ms));
        self.metadata
            .insert("sampleRate".into(), json!(params.sample_rate_hz));
        self.output_dir = Some(dir.to_path_buf());
        self.enabled = true;
        info!(name, "started experiment trace");
    }

    /// Record a decimated copy of the raw capture frame.
    pub fn log_raw(&mut self, frame: &[i16], sample_index: usize) {
        if !self.enabled {
            return;
        }
        let step = (frame.len() / SIGNAL_POINTS).max(1);
        let points: Vec<Value> = frame.iter().step_by(step).map(|&s| json!(s)).collect();
        self.with_sample(sample_index, |sample| {
            sample.insert("rawSignal".into(), Value::Array(points));
        });
    }

    /// Record decimated magnitudes of a complex frame under `stage`.
    pub fn log_complex(&mut self, frame: &[Complex], sample_index: usize, stage: &str) {
        if !self.enabled {
            return;
        }
        let step = (frame.len() / SIGNAL_POINTS).max(1);
        let points: Vec<Value> = frame
            .iter()
            .step_by(step)
            .map(|c| json!(c.norm()))
            .collect();
        self.with_sample(sample_index, |sample| {
            sample.insert(stage.into(), Value::Array(points));
        });
    }

    /// Record statistics and a decimated copy of a 2-D image under `stage`.
    pub fn log_image(&mut self, image: &RangeDopplerImage, sample_index: usize, stage: &str) {
        if !self.enabled || image.is_empty() || image[0].is_empty() {
            return;
        }

        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut sum = 0.0_f64;
        let mut count = 0usize;
        for row in image {
            for &v in row {
                min = min.min(v);
                max = max.max(v);
                sum += v as f64;
                count += 1;
            }
        }
        let stats = json!({
            "min": min,
            "max": max,
            "mean": sum / count as f64,
            "rows": image.len(),
            "cols": image[0].len(),
        });

        let row_step = (image.len() / IMAGE_POINTS).max(1);
        let col_step = (image[0].len() / IMAGE_POINTS).max(1);
        let decimated: Vec<Value> = image
            .iter()
            .step_by(row_step)
            .map(|row| {
                Value::Array(row.iter().step_by(col_step).map(|&v| json!(v)).collect())
            })
            .collect();

        self.with_sample(sample_index, |sample| {
            sample.insert(format!("{stage}_stats"), stats);
            sample.insert(format!("{stage}_image"), Value::Array(decimated));
        });
        debug!(stage, sample_index, "logged image trace");
    }

    /// Record the velocity estimate for a frame.
    pub fn log_velocity(
        &mut self,
        raw: f64,
        smoothed: f64,
        correlation: f64,
        sample_index: usize,
    ) {
        if !self.enabled {
            return;
        }
        let data = json!({
            "sampleIndex": sample_index,
            "rawVelocity": raw,
            "smoothedVelocity": smoothed,
            "correlationScore": correlation,
        });
        self.with_sample(sample_index, |sample| {
            sample.insert("velocityData".into(), data);
        });
    }

    /// Finalise the experiment and write the JSON document.
    ///
    /// Returns the path of the written file, or `None` if logging was never
    /// started. Logging is disabled afterwards.
    pub fn save(&mut self) -> io::Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        self.enabled = false;

        self.metadata.insert(
            "endTime".into(),
            json!(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        );

        let dir = self.output_dir.clone().expect("set by start_experiment");
        fs::create_dir_all(&dir)?;
        let filename = format!(
            "sondar_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M")
        );
        let path = dir.join(filename);

        let document = json!({
            "metadata": Value::Object(self.metadata.clone()),
            "samples": Value::Array(self.samples.clone()),
        });
        fs::write(&path, serde_json::to_string_pretty(&document)?)?;
        info!(path = %path.display(), "saved experiment trace");
        Ok(Some(path))
    }

    /// Find the sample with the given index or append a new one, keeping at
    /// most [`RING_CAPACITY`] samples.
    fn with_sample<F>(&mut self, sample_index: usize, update: F)
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let pos = self.samples.iter().position(|s| {
            s.get("sampleIndex").and_then(Value::as_u64) == Some(sample_index as u64)
        });

        match pos {
            Some(i) => {
                if let Value::Object(map) = &mut self.samples[i] {
                    update(map);
                }
            }
            None => {
                let mut map = Map::new();
                map.insert("sampleIndex".into(), json!(sample_index));
                update(&mut map);
                if self.samples.len() >= RING_CAPACITY {
                    let excess = self.samples.len() - RING_CAPACITY + 1;
                    self.samples.drain(0..excess);
                }
                self.samples.push(Value::Object(map));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger_with_dir() -> (SignalTraceLogger, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = SignalTraceLogger::new();
        logger.start_experiment("unit", dir.path(), &SondarParams::default());
        (logger, dir)
    }

    #[test]
    fn test_disabled_logger_ignores_everything() {
        let mut logger = SignalTraceLogger::new();
        logger.log_raw(&[1, 2, 3], 0);
        logger.log_velocity(1.0, 0.5, 2000.0, 0);
        assert!(logger.save().unwrap().is_none());
    }

    #[test]
    fn test_samples_merge_by_index() {
        let (mut logger, _dir) = logger_with_dir();
        logger.log_raw(&[1; 960], 7);
        logger.log_velocity(0.5, 0.2, 1500.0, 7);
        assert_eq!(logger.samples.len(), 1);
        let sample = logger.samples[0].as_object().unwrap();
        assert!(sample.contains_key("rawSignal"));
        assert!(sample.contains_key("velocityData"));
    }

    #[test]
    fn test_ring_keeps_last_ten() {
        let (mut logger, _dir) = logger_with_dir();
        for i in 0..15 {
            logger.log_raw(&[0; 100], i);
        }
        assert_eq!(logger.samples.len(), RING_CAPACITY);
        let first = logger.samples[0]["sampleIndex"].as_u64().unwrap();
        assert_eq!(first, 5);
    }

    #[test]
    fn test_raw_signal_is_decimated() {
        let (mut logger, _dir) = logger_with_dir();
        logger.log_raw(&[3; 960], 0);
        let points = logger.samples[0]["rawSignal"].as_array().unwrap();
        // 960 / (960/100 = 9) = 107 points
        assert!(points.len() <= 120, "too many points: {}", points.len());
    }

    #[test]
    fn test_image_stats() {
        let (mut logger, _dir) = logger_with_dir();
        let image = vec![vec![2.0_f32; 32]; 256];
        logger.log_image(&image, 0, "rangeDoppler");
        let sample = logger.samples[0].as_object().unwrap();
        let stats = sample["rangeDoppler_stats"].as_object().unwrap();
        assert_eq!(stats["rows"].as_u64().unwrap(), 256);
        assert_eq!(stats["cols"].as_u64().unwrap(), 32);
        assert_eq!(stats["max"].as_f64().unwrap(), 2.0);
        assert!(sample.contains_key("rangeDoppler_image"));
    }

    #[test]
    fn test_save_writes_document() {
        let (mut logger, dir) = logger_with_dir();
        logger.log_raw(&[1; 960], 0);
        let path = logger.save().unwrap().unwrap();
        assert!(path.starts_with(dir.path()));

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["metadata"]["name"], "unit");
        assert_eq!(doc["metadata"]["sampleRate"], 48_000.0);
        assert!(doc["metadata"].get("endTime").is_some());
        assert_eq!(doc["samples"].as_array().unwrap().len(), 1);

        // save() is terminal until the next experiment
        assert!(logger.save().unwrap().is_none());
    }
}
