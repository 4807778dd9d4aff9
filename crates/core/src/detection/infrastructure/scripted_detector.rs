use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::detection::domain::object_detector::{Detection, DetectorError, ObjectDetector};
use crate::shared::frame::Frame;

/// Detector double that replays a fixed script of detections.
///
/// Call `n` returns the `n`-th entry of the script; once the script runs
/// out, the last entry repeats (an empty script always returns no
/// detections). Records the thresholds observed per call so tests can
/// verify live updates, and can simulate inference latency.
pub struct ScriptedDetector {
    script: Vec<Vec<Detection>>,
    calls: usize,
    latency: Duration,
    observed_thresholds: Arc<Mutex<Vec<(f64, f64)>>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script,
            calls: 0,
            latency: Duration::ZERO,
            observed_thresholds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A detector that returns the same detections on every call.
    pub fn repeating(detections: Vec<Detection>) -> Self {
        Self::new(vec![detections])
    }

    /// Sleeps for `latency` inside each `detect` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Shared handle to the `(confidence, nms)` pairs seen so far.
    pub fn observed_thresholds(&self) -> Arc<Mutex<Vec<(f64, f64)>>> {
        Arc::clone(&self.observed_thresholds)
    }
}

impl ObjectDetector for ScriptedDetector {
    fn detect(
        &mut self,
        _frame: &Frame,
        confidence_threshold: f64,
        nms_threshold: f64,
    ) -> Result<Vec<Detection>, DetectorError> {
        self.observed_thresholds
            .lock()
            .unwrap()
            .push((confidence_threshold, nms_threshold));
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let index = self.calls;
        self.calls += 1;
        match self.script.get(index).or_else(|| self.script.last()) {
            Some(detections) => Ok(detections.clone()),
            None => Ok(Vec::new()),
        }
    }
}
