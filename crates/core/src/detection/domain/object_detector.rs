use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

pub type DetectorError = Box<dyn std::error::Error + Send + Sync>;

/// One raw detection as returned by the model backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

/// Domain interface for the object-detection backend.
///
/// The backend is an opaque collaborator: synchronous, side-effect-free on
/// the frame, and trusted to return. Thresholds are passed per call because
/// the consumer may adjust them while detection runs. Implementations may be
/// stateful, hence `&mut self`.
pub trait ObjectDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        confidence_threshold: f64,
        nms_threshold: f64,
    ) -> Result<Vec<Detection>, DetectorError>;
}
