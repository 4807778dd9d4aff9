//! Perspective-transform math for the projection area.
//!
//! Self-contained: depends only on the shared value types. The homography
//! maps the user-picked quadrilateral onto the flat-view rectangle; the
//! polygon test decides which detections are inside the area at all.

pub mod homography;
pub mod polygon;

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// The four projection-area points are collinear or duplicated, so no
    /// invertible homography exists.
    #[error("projection area points are collinear or duplicated")]
    DegenerateQuadrilateral,
    /// The homogeneous divisor of a projected point is within machine
    /// epsilon of zero; the point maps to infinity.
    #[error("projected point lies at infinity")]
    PointAtInfinity,
}

pub use homography::Homography;
pub use polygon::{point_in_polygon, rescale_points};
