use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;
use crate::shared::point::Point;

/// A person detection accepted by the class and projection-area filters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersonDetection {
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

/// Everything produced for one processed frame.
///
/// `person_locations[i]` is the flat-view position of `persons[i]`'s
/// ground-contact anchor. Results are transient: handed to the consumer's
/// callback and not retained by the pipeline.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    /// The frame the detector ran on.
    pub frame: Frame,
    /// The projection area rectified into the flat top-down view.
    pub warped_frame: Frame,
    /// `1 / elapsed_seconds` of the detector call.
    pub inference_fps: f64,
    pub persons: Vec<PersonDetection>,
    pub person_locations: Vec<Point>,
}
