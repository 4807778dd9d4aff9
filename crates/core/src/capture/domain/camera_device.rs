use crate::shared::frame::Frame;
use crate::shared::resolution::Resolution;

pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// Camera parameters fixed for the lifetime of one capture run.
#[derive(Clone, Copy, Debug)]
pub struct CaptureConfig {
    /// Index of the connected camera.
    pub camera_index: u32,
    /// Resolution requested from the device; the device may deliver the
    /// nearest mode it supports.
    pub resolution: Resolution,
}

/// Domain interface for a physical (or simulated) camera.
///
/// The capture session owns the device for the whole run and drives it from
/// the capture thread. `read` must return within a bounded interval so a
/// stop request is honored promptly: implementations backed by blocking
/// native reads should use a short internal timeout and yield `Ok(None)`
/// when no frame is ready yet.
pub trait CameraDevice: Send {
    /// Opens the device and applies the requested resolution.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), DeviceError>;

    /// Reads the next frame, or `Ok(None)` when none is available yet.
    fn read(&mut self) -> Result<Option<Frame>, DeviceError>;

    /// Releases the device.
    fn close(&mut self);
}
