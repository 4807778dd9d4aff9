//! Capture/detection pipeline for locating persons inside a user-defined
//! projection area.
//!
//! A [`capture::session::CaptureSession`] reads frames from a
//! [`capture::domain::camera_device::CameraDevice`] on its own thread and
//! hands them to a [`detection::session::DetectionSession`] over a
//! single-slot [`shared::frame_channel::FrameChannel`]. The detection thread
//! runs an opaque [`detection::domain::object_detector::ObjectDetector`],
//! keeps person detections whose ground-contact anchor falls inside the
//! projection area, and reports each person's position rectified into a flat
//! top-down view.
//!
//! Presentation concerns (windows, previews, model selection) live outside
//! this crate; callbacks are invoked from worker threads and the consumer is
//! responsible for marshaling onto its own execution context.

pub mod capture;
pub mod detection;
pub mod geometry;
pub mod shared;
