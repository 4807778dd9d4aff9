use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::SendTimeoutError;
use thiserror::Error;

use crate::capture::domain::camera_device::{CameraDevice, CaptureConfig};
use crate::shared::frame::Frame;
use crate::shared::frame_channel::FrameSender;

/// How long a blocked channel push waits before re-checking the running
/// flag. Bounds the latency of `stop()` while detection is saturated.
const SEND_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture session is already running")]
    AlreadyRunning,
    #[error("capture session is not running")]
    NotRunning,
    #[error("capture session is not streaming")]
    NotStreaming,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Initializing,
    Streaming,
    Stopped,
}

/// Per-frame delivery callback, invoked from the capture thread.
pub type FrameCallback = Box<dyn FnMut(Frame) + Send>;

type InitCallback = Box<dyn FnOnce(bool) + Send>;

/// Owns the camera device and the capture thread.
///
/// Lifecycle: `Idle → Initializing → Streaming → Stopped (→ Idle)`; a failed
/// device open drops back to `Idle` so `start` can be retried. Frames are
/// delivered through a swappable callback and, while a detection channel is
/// attached, also pushed into the single-slot channel — a full slot blocks
/// the capture thread rather than dropping the frame.
pub struct CaptureSession {
    state: Arc<Mutex<CaptureState>>,
    running: Arc<AtomicBool>,
    on_frame: Arc<Mutex<FrameCallback>>,
    detection_sender: Arc<Mutex<Option<FrameSender>>>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            running: Arc::new(AtomicBool::new(false)),
            on_frame: Arc::new(Mutex::new(Box::new(|_| {}))),
            detection_sender: Arc::new(Mutex::new(None)),
            handle: None,
        }
    }

    /// Spawns the capture thread.
    ///
    /// The thread opens `device` with the requested configuration and
    /// reports the outcome once through `on_initialized`; on failure it
    /// self-terminates and the session returns to `Idle`. On success every
    /// captured frame goes through `on_frame` (from the capture thread).
    pub fn start(
        &mut self,
        config: CaptureConfig,
        device: Box<dyn CameraDevice>,
        on_initialized: impl FnOnce(bool) + Send + 'static,
        on_frame: impl FnMut(Frame) + Send + 'static,
    ) -> Result<(), CaptureError> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != CaptureState::Idle {
                return Err(CaptureError::AlreadyRunning);
            }
            *state = CaptureState::Initializing;
        }
        // A previous run that failed to initialize leaves a finished thread.
        if let Some(old) = self.handle.take() {
            let _ = old.join();
        }

        *self.on_frame.lock().unwrap() = Box::new(on_frame);
        *self.detection_sender.lock().unwrap() = None;
        self.running.store(true, Ordering::Relaxed);

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let callback = Arc::clone(&self.on_frame);
        let sender_slot = Arc::clone(&self.detection_sender);
        let on_initialized: InitCallback = Box::new(on_initialized);

        self.handle = Some(thread::spawn(move || {
            capture_loop(
                device,
                config,
                state,
                running,
                callback,
                sender_slot,
                on_initialized,
            );
        }));
        Ok(())
    }

    /// Routes captured frames into a detection channel in addition to the
    /// frame callback. Only valid while streaming.
    pub fn attach_detection_channel(&self, sender: FrameSender) -> Result<(), CaptureError> {
        let state = self.state.lock().unwrap();
        if *state != CaptureState::Streaming {
            return Err(CaptureError::NotStreaming);
        }
        *self.detection_sender.lock().unwrap() = Some(sender);
        Ok(())
    }

    /// Stops routing frames into the detection channel.
    pub fn detach_detection_channel(&self) -> Result<(), CaptureError> {
        let state = self.state.lock().unwrap();
        if *state != CaptureState::Streaming {
            return Err(CaptureError::NotStreaming);
        }
        *self.detection_sender.lock().unwrap() = None;
        Ok(())
    }

    /// Swaps the per-frame delivery callback.
    ///
    /// The swap happens under the same lock the capture thread holds during
    /// delivery, so it waits out any in-flight invocation and the next frame
    /// goes to the new callback.
    pub fn update_frame_callback(
        &self,
        on_frame: impl FnMut(Frame) + Send + 'static,
    ) -> Result<(), CaptureError> {
        let state = self.state.lock().unwrap();
        if *state != CaptureState::Streaming {
            return Err(CaptureError::NotStreaming);
        }
        *self.on_frame.lock().unwrap() = Box::new(on_frame);
        Ok(())
    }

    /// Clears the running flag and joins the capture thread, which releases
    /// the device on its way out.
    ///
    /// Returns within a bounded time: the capture loop never blocks without
    /// re-checking the running flag, neither on device reads nor on a full
    /// detection channel.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != CaptureState::Streaming {
                return Err(CaptureError::NotRunning);
            }
            *state = CaptureState::Stopped;
        }
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        *self.detection_sender.lock().unwrap() = None;
        *self.state.lock().unwrap() = CaptureState::Idle;
        Ok(())
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock().unwrap()
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == CaptureState::Streaming
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn capture_loop(
    mut device: Box<dyn CameraDevice>,
    config: CaptureConfig,
    state: Arc<Mutex<CaptureState>>,
    running: Arc<AtomicBool>,
    on_frame: Arc<Mutex<FrameCallback>>,
    detection_sender: Arc<Mutex<Option<FrameSender>>>,
    on_initialized: InitCallback,
) {
    if let Err(e) = device.open(&config) {
        log::error!("camera {} failed to open: {e}", config.camera_index);
        running.store(false, Ordering::Relaxed);
        *state.lock().unwrap() = CaptureState::Idle;
        on_initialized(false);
        return;
    }
    *state.lock().unwrap() = CaptureState::Streaming;
    log::info!(
        "camera {} streaming at {}x{}",
        config.camera_index,
        config.resolution.width,
        config.resolution.height
    );
    on_initialized(true);

    while running.load(Ordering::Relaxed) {
        let frame = match device.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("camera {} read failed: {e}", config.camera_index);
                continue;
            }
        };

        let attached = detection_sender.lock().unwrap().clone();
        match attached {
            Some(tx) => {
                let for_detection = frame.clone();
                (on_frame.lock().unwrap())(frame);
                push_to_detection(&tx, for_detection, &running, &detection_sender);
            }
            None => (on_frame.lock().unwrap())(frame),
        }
    }

    device.close();
    log::info!("camera {} released", config.camera_index);
}

/// Blocking push into the single-slot detection channel.
///
/// Waits in short slices so the loop notices a stop request, a detach, or a
/// detection session that went away. The frame is only ever dropped when one
/// of those ends the wait; it is never dropped because the slot is full.
fn push_to_detection(
    tx: &FrameSender,
    frame: Frame,
    running: &AtomicBool,
    detection_sender: &Mutex<Option<FrameSender>>,
) {
    let mut pending = frame;
    while running.load(Ordering::Relaxed) && detection_sender.lock().unwrap().is_some() {
        match tx.send_timeout(pending, SEND_POLL_INTERVAL) {
            Ok(()) => return,
            Err(SendTimeoutError::Timeout(returned)) => pending = returned,
            Err(SendTimeoutError::Disconnected(_)) => {
                // Detection stopped without detaching; clear the stale sender.
                *detection_sender.lock().unwrap() = None;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use crate::capture::domain::camera_device::DeviceError;
    use crate::capture::infrastructure::synthetic_camera::SyntheticCamera;
    use crate::shared::frame_channel::FrameChannel;
    use crate::shared::resolution::Resolution;

    const STOP_LATENCY_BOUND: Duration = Duration::from_millis(500);

    struct FailingCamera;

    impl CameraDevice for FailingCamera {
        fn open(&mut self, _config: &CaptureConfig) -> Result<(), DeviceError> {
            Err("no such device".into())
        }

        fn read(&mut self) -> Result<Option<Frame>, DeviceError> {
            unreachable!("failed camera must never be read");
        }

        fn close(&mut self) {}
    }

    fn config() -> CaptureConfig {
        CaptureConfig {
            camera_index: 0,
            resolution: Resolution::new(16, 8),
        }
    }

    fn fast_camera() -> Box<SyntheticCamera> {
        Box::new(SyntheticCamera::new(Duration::from_millis(2)))
    }

    fn wait_for(mut predicate: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !predicate() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn start_counting(
        session: &mut CaptureSession,
        counter: &Arc<AtomicUsize>,
    ) {
        let counter = Arc::clone(counter);
        let (init_tx, init_rx) = crossbeam_channel::bounded(1);
        session
            .start(
                config(),
                fast_camera(),
                move |ok| {
                    let _ = init_tx.send(ok);
                },
                move |_frame| {
                    counter.fetch_add(1, Ordering::Relaxed);
                },
            )
            .unwrap();
        assert!(init_rx.recv_timeout(Duration::from_secs(2)).unwrap());
    }

    #[test]
    fn test_start_streams_and_stop_returns_to_idle() {
        let mut session = CaptureSession::new();
        let frames = Arc::new(AtomicUsize::new(0));
        start_counting(&mut session, &frames);

        assert!(session.is_streaming());
        wait_for(|| frames.load(Ordering::Relaxed) >= 3);

        session.stop().unwrap();
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let mut session = CaptureSession::new();
        let frames = Arc::new(AtomicUsize::new(0));
        start_counting(&mut session, &frames);

        let err = session
            .start(config(), fast_camera(), |_| {}, |_| {})
            .unwrap_err();
        assert_eq!(err, CaptureError::AlreadyRunning);

        // The first run is unaffected.
        let before = frames.load(Ordering::Relaxed);
        wait_for(|| frames.load(Ordering::Relaxed) > before);
        session.stop().unwrap();
    }

    #[test]
    fn test_failed_open_reports_false_and_returns_to_idle() {
        let mut session = CaptureSession::new();
        let (init_tx, init_rx) = crossbeam_channel::bounded(1);
        session
            .start(
                config(),
                Box::new(FailingCamera),
                move |ok| {
                    let _ = init_tx.send(ok);
                },
                |_| {},
            )
            .unwrap();

        assert!(!init_rx.recv_timeout(Duration::from_secs(2)).unwrap());
        wait_for(|| session.state() == CaptureState::Idle);

        // A retry with a working device succeeds.
        let frames = Arc::new(AtomicUsize::new(0));
        start_counting(&mut session, &frames);
        wait_for(|| frames.load(Ordering::Relaxed) >= 1);
        session.stop().unwrap();
    }

    #[test]
    fn test_stop_without_start_fails() {
        let mut session = CaptureSession::new();
        assert_eq!(session.stop().unwrap_err(), CaptureError::NotRunning);
    }

    #[test]
    fn test_attach_and_update_require_streaming() {
        let session = CaptureSession::new();
        let channel = FrameChannel::new();
        assert_eq!(
            session.attach_detection_channel(channel.sender()).unwrap_err(),
            CaptureError::NotStreaming
        );
        assert_eq!(
            session.detach_detection_channel().unwrap_err(),
            CaptureError::NotStreaming
        );
        assert_eq!(
            session.update_frame_callback(|_| {}).unwrap_err(),
            CaptureError::NotStreaming
        );
    }

    #[test]
    fn test_update_frame_callback_redirects_delivery() {
        let mut session = CaptureSession::new();
        let first = Arc::new(AtomicUsize::new(0));
        start_counting(&mut session, &first);
        wait_for(|| first.load(Ordering::Relaxed) >= 1);

        let second = Arc::new(AtomicUsize::new(0));
        let second_for_callback = Arc::clone(&second);
        session
            .update_frame_callback(move |_frame| {
                second_for_callback.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        wait_for(|| second.load(Ordering::Relaxed) >= 1);
        let first_after_swap = first.load(Ordering::Relaxed);
        wait_for(|| second.load(Ordering::Relaxed) >= 3);
        // The old callback saw at most one frame already in flight.
        assert!(first.load(Ordering::Relaxed) <= first_after_swap + 1);
        session.stop().unwrap();
    }

    #[test]
    fn test_full_channel_blocks_capture_without_dropping() {
        let mut session = CaptureSession::new();
        let frames = Arc::new(AtomicUsize::new(0));
        start_counting(&mut session, &frames);

        let channel = FrameChannel::new();
        let sender = channel.sender();
        let (_keepalive, receiver) = channel.split();
        session.attach_detection_channel(sender).unwrap();

        wait_for(|| receiver.len() == 1);
        let at_attach = frames.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(200));

        // One frame sits in the slot, one may be parked in the send loop;
        // nothing beyond that was captured while the consumer stalled.
        assert!(frames.load(Ordering::Relaxed) <= at_attach + 2);
        assert_eq!(receiver.len(), 1);

        // Draining the slot resumes capture.
        receiver.recv().unwrap();
        let resumed_from = frames.load(Ordering::Relaxed);
        receiver.recv_timeout(Duration::from_secs(2)).unwrap();
        wait_for(|| frames.load(Ordering::Relaxed) > resumed_from);

        session.detach_detection_channel().unwrap();
        session.stop().unwrap();
    }

    #[test]
    fn test_stop_is_bounded_while_blocked_on_full_channel() {
        let mut session = CaptureSession::new();
        let frames = Arc::new(AtomicUsize::new(0));
        start_counting(&mut session, &frames);

        let channel = FrameChannel::new();
        let sender = channel.sender();
        let (_keepalive, receiver) = channel.split();
        session.attach_detection_channel(sender).unwrap();
        wait_for(|| receiver.len() == 1);

        let started = Instant::now();
        session.stop().unwrap();
        assert!(started.elapsed() < STOP_LATENCY_BOUND);
    }

    #[test]
    fn test_stop_is_bounded_with_slow_device() {
        let mut session = CaptureSession::new();
        let (init_tx, init_rx) = crossbeam_channel::bounded(1);
        session
            .start(
                config(),
                Box::new(SyntheticCamera::new(Duration::from_millis(100))),
                move |ok| {
                    let _ = init_tx.send(ok);
                },
                |_| {},
            )
            .unwrap();
        assert!(init_rx.recv_timeout(Duration::from_secs(2)).unwrap());

        let started = Instant::now();
        session.stop().unwrap();
        assert!(started.elapsed() < STOP_LATENCY_BOUND);
    }
}
