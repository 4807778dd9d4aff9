use crate::geometry::polygon::rescale_points;
use crate::shared::point::Point;
use crate::shared::resolution::Resolution;

/// The user-picked ground quadrilateral plus the flat-view resolution.
///
/// Points are kept in insertion order and must wind clockwise starting at
/// the top-right corner. They are expressed in whatever coordinate space the
/// user picked them in — typically a scaled preview — and must be rescaled
/// to native camera-frame coordinates before a detection session starts.
#[derive(Clone, Debug)]
pub struct ProjectionArea {
    points: [Point; 4],
    target_resolution: Resolution,
}

impl ProjectionArea {
    pub fn new(points: [Point; 4], target_resolution: Resolution) -> Self {
        Self {
            points,
            target_resolution,
        }
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.points
    }

    pub fn target_resolution(&self) -> Resolution {
        self.target_resolution
    }

    /// Maps the points from the preview's coordinate space into another
    /// (typically the native camera resolution).
    pub fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        let rescaled = rescale_points(&self.points, from, to);
        Self {
            points: [rescaled[0], rescaled[1], rescaled[2], rescaled[3]],
            target_resolution: self.target_resolution,
        }
    }
}
