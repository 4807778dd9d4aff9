use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use thiserror::Error;

use crate::detection::domain::detection_result::{DetectionResult, PersonDetection};
use crate::detection::domain::object_detector::ObjectDetector;
use crate::detection::domain::projection_area::ProjectionArea;
use crate::geometry::polygon::point_in_polygon;
use crate::geometry::{GeometryError, Homography};
use crate::shared::frame_channel::{FrameChannel, FrameReceiver, FrameSender};
use crate::shared::point::Point;
use crate::shared::resolution::Resolution;

/// How long an empty-channel dequeue waits before re-checking the running
/// flag. A hard blocking `recv` would stall shutdown; a bare `try_recv`
/// loop would spin while no capture is attached.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("detection session is already running")]
    AlreadyRunning,
    #[error("detection session is not running")]
    NotRunning,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionState {
    Idle,
    Running,
    Stopped,
}

/// Everything the detection loop needs from the consumer.
///
/// Both thresholds stay adjustable while the session runs; the detector and
/// person class are fixed for the run. The detector arrives fully
/// initialized — model-loading failures belong to the caller, before any
/// session exists.
pub struct DetectionConfig {
    pub detector: Box<dyn ObjectDetector>,
    pub person_class_id: u32,
    pub confidence_threshold: f64,
    pub nms_threshold: f64,
}

/// Per-result delivery callback, invoked from the detection thread.
pub type ResultCallback = Box<dyn FnMut(DetectionResult) + Send>;

/// Owns the detection thread, the frame channel, and the projection math.
///
/// Lifecycle: `Idle → Running → Stopped (→ Idle)`. `start` derives the
/// homography and polygon from the projection area once, creates a fresh
/// single-slot [`FrameChannel`], and hands back the producer half for the
/// caller to attach to a streaming capture session.
pub struct DetectionSession {
    state: Mutex<DetectionState>,
    running: Arc<AtomicBool>,
    confidence_bits: Arc<AtomicU64>,
    nms_bits: Arc<AtomicU64>,
    keepalive_sender: Option<FrameSender>,
    handle: Option<JoinHandle<()>>,
}

impl DetectionSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DetectionState::Idle),
            running: Arc::new(AtomicBool::new(false)),
            confidence_bits: Arc::new(AtomicU64::new(0)),
            nms_bits: Arc::new(AtomicU64::new(0)),
            keepalive_sender: None,
            handle: None,
        }
    }

    /// Spawns the detection thread and returns the channel half to attach
    /// to the capture session.
    ///
    /// `projection_area` must already be rescaled to native camera-frame
    /// coordinates. Fails with [`DetectionError::Geometry`] when its points
    /// do not form a usable quadrilateral.
    pub fn start(
        &mut self,
        config: DetectionConfig,
        projection_area: &ProjectionArea,
        on_result: impl FnMut(DetectionResult) + Send + 'static,
    ) -> Result<FrameSender, DetectionError> {
        {
            let state = self.state.lock().unwrap();
            if *state != DetectionState::Idle {
                return Err(DetectionError::AlreadyRunning);
            }
        }

        let target = projection_area.target_resolution();
        let homography = Homography::from_quad(projection_area.points(), target)?;
        let polygon = *projection_area.points();

        let channel = FrameChannel::new();
        let attach_sender = channel.sender();
        let (keepalive, receiver) = channel.split();
        // Holding one sender here keeps the channel connected even while no
        // capture session is attached.
        self.keepalive_sender = Some(keepalive);

        self.confidence_bits
            .store(config.confidence_threshold.to_bits(), Ordering::Relaxed);
        self.nms_bits
            .store(config.nms_threshold.to_bits(), Ordering::Relaxed);
        self.running.store(true, Ordering::Relaxed);

        let worker = DetectionWorker {
            detector: config.detector,
            person_class_id: config.person_class_id,
            receiver,
            homography,
            polygon,
            target,
            running: Arc::clone(&self.running),
            confidence_bits: Arc::clone(&self.confidence_bits),
            nms_bits: Arc::clone(&self.nms_bits),
            on_result: Box::new(on_result),
        };
        self.handle = Some(thread::spawn(move || worker.run()));
        *self.state.lock().unwrap() = DetectionState::Running;
        log::info!(
            "detection running, flat view {}x{}",
            target.width,
            target.height
        );
        Ok(attach_sender)
    }

    /// Applies from the next detector call onward; the stored bits make the
    /// update atomic, so the loop never sees a torn value.
    pub fn update_confidence_threshold(&self, value: f64) -> Result<(), DetectionError> {
        self.ensure_running()?;
        self.confidence_bits
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn update_nms_threshold(&self, value: f64) -> Result<(), DetectionError> {
        self.ensure_running()?;
        self.nms_bits
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Clears the running flag, joins the detection thread, and drops the
    /// channel. Bounded latency: the dequeue polls instead of blocking.
    pub fn stop(&mut self) -> Result<(), DetectionError> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != DetectionState::Running {
                return Err(DetectionError::NotRunning);
            }
            *state = DetectionState::Stopped;
        }
        self.running.store(false, Ordering::Relaxed);
        self.keepalive_sender = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        *self.state.lock().unwrap() = DetectionState::Idle;
        log::info!("detection stopped");
        Ok(())
    }

    pub fn state(&self) -> DetectionState {
        *self.state.lock().unwrap()
    }

    pub fn is_running(&self) -> bool {
        self.state() == DetectionState::Running
    }

    fn ensure_running(&self) -> Result<(), DetectionError> {
        if *self.state.lock().unwrap() != DetectionState::Running {
            return Err(DetectionError::NotRunning);
        }
        Ok(())
    }
}

impl Default for DetectionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.keepalive_sender = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct DetectionWorker {
    detector: Box<dyn ObjectDetector>,
    person_class_id: u32,
    receiver: FrameReceiver,
    homography: Homography,
    polygon: [Point; 4],
    target: Resolution,
    running: Arc<AtomicBool>,
    confidence_bits: Arc<AtomicU64>,
    nms_bits: Arc<AtomicU64>,
    on_result: ResultCallback,
}

impl DetectionWorker {
    fn run(mut self) {
        while self.running.load(Ordering::Relaxed) {
            let frame = match self.receiver.recv_timeout(RECV_POLL_INTERVAL) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let confidence = f64::from_bits(self.confidence_bits.load(Ordering::Relaxed));
            let nms = f64::from_bits(self.nms_bits.load(Ordering::Relaxed));

            let started = Instant::now();
            let detections = match self.detector.detect(&frame, confidence, nms) {
                Ok(detections) => detections,
                Err(e) => {
                    log::error!("detector failed, ending detection loop: {e}");
                    break;
                }
            };
            let elapsed = started.elapsed().as_secs_f64();
            let inference_fps = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };

            let mut persons = Vec::new();
            let mut person_locations = Vec::new();
            for detection in detections {
                if detection.class_id != self.person_class_id {
                    continue;
                }
                let anchor = detection.bounding_box.anchor_point();
                if !point_in_polygon(anchor, &self.polygon) {
                    continue;
                }
                match self.homography.project(anchor) {
                    Ok(location) => {
                        persons.push(PersonDetection {
                            confidence: detection.confidence,
                            bounding_box: detection.bounding_box,
                        });
                        person_locations.push(location);
                    }
                    Err(e) => {
                        log::warn!(
                            "skipping detection anchored at ({:.1}, {:.1}): {e}",
                            anchor.x,
                            anchor.y
                        );
                    }
                }
            }

            let warped_frame = match self.homography.warp_frame(&frame, self.target) {
                Ok(warped) => warped,
                Err(e) => {
                    log::error!("frame warp failed, ending detection loop: {e}");
                    break;
                }
            };

            (self.on_result)(DetectionResult {
                frame,
                warped_frame,
                inference_fps,
                persons,
                person_locations,
            });
        }
    }
}
