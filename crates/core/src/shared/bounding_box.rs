use crate::shared::point::Point;

/// An axis-aligned detection box in camera-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bottom-edge midpoint of the box.
    ///
    /// Used as the ground-contact approximation for a detected person: the
    /// point where the person meets the floor plane, which is what gets
    /// projected into the flat view.
    pub fn anchor_point(&self) -> Point {
        Point::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_anchor_is_bottom_edge_midpoint() {
        let b = BoundingBox::new(100, 50, 40, 120);
        let anchor = b.anchor_point();
        assert_relative_eq!(anchor.x, 120.0);
        assert_relative_eq!(anchor.y, 170.0);
    }

    #[test]
    fn test_anchor_with_odd_width() {
        let b = BoundingBox::new(0, 0, 5, 10);
        let anchor = b.anchor_point();
        assert_relative_eq!(anchor.x, 2.5);
        assert_relative_eq!(anchor.y, 10.0);
    }
}
