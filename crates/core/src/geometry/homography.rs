use ndarray::ArrayView3;

use crate::geometry::GeometryError;
use crate::shared::frame::Frame;
use crate::shared::point::Point;
use crate::shared::resolution::Resolution;

/// Pivots and determinants below this magnitude are treated as zero.
const SINGULARITY_EPSILON: f64 = 1e-10;

/// A 3×3 perspective-transform matrix between two image planes.
///
/// Built from the four projection-area corners; maps camera-frame points
/// into the rectified flat view.
#[derive(Clone, Copy, Debug)]
pub struct Homography {
    m: [[f64; 3]; 3],
}

impl Homography {
    /// Computes the homography taking `quad` onto the corners of a
    /// `target`-sized rectangle.
    ///
    /// The quadrilateral points must be supplied clockwise starting at the
    /// top-right corner; they map to `(w,0)`, `(w,h)`, `(0,h)` and `(0,0)`
    /// respectively. Returns [`GeometryError::DegenerateQuadrilateral`] when
    /// the points are collinear or duplicated.
    pub fn from_quad(quad: &[Point; 4], target: Resolution) -> Result<Self, GeometryError> {
        let w = target.width as f64;
        let h = target.height as f64;
        let corners = [
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
            Point::new(0.0, 0.0),
        ];
        Self::from_correspondences(quad, &corners)
    }

    /// Solves the standard 8×8 linear system for the four point pairs,
    /// fixing `m22 = 1`.
    fn from_correspondences(src: &[Point; 4], dst: &[Point; 4]) -> Result<Self, GeometryError> {
        let mut system = [[0.0f64; 9]; 8];
        for i in 0..4 {
            let (x, y) = (src[i].x, src[i].y);
            let (u, v) = (dst[i].x, dst[i].y);
            system[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, u];
            system[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, v];
        }
        let h = solve(&mut system)?;
        Ok(Self {
            m: [
                [h[0], h[1], h[2]],
                [h[3], h[4], h[5]],
                [h[6], h[7], 1.0],
            ],
        })
    }

    /// Applies the transform with explicit perspective division.
    ///
    /// Returns [`GeometryError::PointAtInfinity`] when the homogeneous
    /// divisor vanishes; callers skip the affected detection instead of
    /// propagating NaN.
    pub fn project(&self, p: Point) -> Result<Point, GeometryError> {
        let m = &self.m;
        let w = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
        if w.abs() < f64::EPSILON {
            return Err(GeometryError::PointAtInfinity);
        }
        Ok(Point::new(
            (m[0][0] * p.x + m[0][1] * p.y + m[0][2]) / w,
            (m[1][0] * p.x + m[1][1] * p.y + m[1][2]) / w,
        ))
    }

    /// Adjugate inverse of the 3×3 matrix.
    pub fn inverse(&self) -> Result<Self, GeometryError> {
        let m = &self.m;
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        if det.abs() < SINGULARITY_EPSILON {
            return Err(GeometryError::DegenerateQuadrilateral);
        }
        let adj = [
            [
                m[1][1] * m[2][2] - m[1][2] * m[2][1],
                m[0][2] * m[2][1] - m[0][1] * m[2][2],
                m[0][1] * m[1][2] - m[0][2] * m[1][1],
            ],
            [
                m[1][2] * m[2][0] - m[1][0] * m[2][2],
                m[0][0] * m[2][2] - m[0][2] * m[2][0],
                m[0][2] * m[1][0] - m[0][0] * m[1][2],
            ],
            [
                m[1][0] * m[2][1] - m[1][1] * m[2][0],
                m[0][1] * m[2][0] - m[0][0] * m[2][1],
                m[0][0] * m[1][1] - m[0][1] * m[1][0],
            ],
        ];
        let mut inv = [[0.0; 3]; 3];
        for (row, adj_row) in inv.iter_mut().zip(adj.iter()) {
            for (cell, &a) in row.iter_mut().zip(adj_row.iter()) {
                *cell = a / det;
            }
        }
        Ok(Self { m: inv })
    }

    /// Resamples the whole source frame into a `target`-sized flat view.
    ///
    /// Inverse-maps every destination pixel and samples the source
    /// bilinearly; destinations that fall outside the source stay black.
    pub fn warp_frame(&self, frame: &Frame, target: Resolution) -> Result<Frame, GeometryError> {
        let inverse = self.inverse()?;
        let src = frame.as_ndarray();
        let channels = frame.channels();
        let mut data = vec![0u8; target.pixel_count() * channels];
        let row_stride = target.width as usize * channels;

        for dst_y in 0..target.height as usize {
            for dst_x in 0..target.width as usize {
                let Ok(source) = inverse.project(Point::new(dst_x as f64, dst_y as f64)) else {
                    continue;
                };
                let offset = dst_y * row_stride + dst_x * channels;
                sample_bilinear(&src, source, &mut data[offset..offset + channels]);
            }
        }
        Ok(Frame::new(
            data,
            target.width,
            target.height,
            channels,
            frame.index(),
        ))
    }
}

/// Bilinearly samples `src` at fractional coordinates, writing one pixel
/// into `out`. Leaves `out` untouched when the sample falls outside the
/// source bounds.
fn sample_bilinear(src: &ArrayView3<'_, u8>, at: Point, out: &mut [u8]) {
    let (height, width, channels) = src.dim();
    if at.x < 0.0 || at.y < 0.0 || at.x > (width - 1) as f64 || at.y > (height - 1) as f64 {
        return;
    }
    let x0 = at.x.floor() as usize;
    let y0 = at.y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = at.x - x0 as f64;
    let fy = at.y - y0 as f64;

    for c in 0..channels {
        let top = src[[y0, x0, c]] as f64 * (1.0 - fx) + src[[y0, x1, c]] as f64 * fx;
        let bottom = src[[y1, x0, c]] as f64 * (1.0 - fx) + src[[y1, x1, c]] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
}

/// Gaussian elimination with partial pivoting over an 8×9 augmented matrix.
fn solve(system: &mut [[f64; 9]; 8]) -> Result<[f64; 8], GeometryError> {
    for col in 0..8 {
        let pivot_row = (col..8)
            .max_by(|&a, &b| {
                system[a][col]
                    .abs()
                    .total_cmp(&system[b][col].abs())
            })
            .unwrap_or(col);
        if system[pivot_row][col].abs() < SINGULARITY_EPSILON {
            return Err(GeometryError::DegenerateQuadrilateral);
        }
        system.swap(col, pivot_row);

        for row in (col + 1)..8 {
            let factor = system[row][col] / system[col][col];
            for k in col..9 {
                system[row][k] -= factor * system[col][k];
            }
        }
    }

    let mut solution = [0.0f64; 8];
    for row in (0..8).rev() {
        let mut acc = system[row][8];
        for k in (row + 1)..8 {
            acc -= system[row][k] * solution[k];
        }
        solution[row] = acc / system[row][row];
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const TOLERANCE: f64 = 1e-9;

    fn trapezoid() -> [Point; 4] {
        // Clockwise from top-right, as a user would pick a floor region.
        [
            Point::new(500.0, 120.0),
            Point::new(580.0, 400.0),
            Point::new(60.0, 400.0),
            Point::new(140.0, 120.0),
        ]
    }

    #[test]
    fn test_quad_corners_map_to_target_corners() {
        let target = Resolution::new(400, 300);
        let quad = trapezoid();
        let h = Homography::from_quad(&quad, target).unwrap();
        let expected = [
            Point::new(400.0, 0.0),
            Point::new(400.0, 300.0),
            Point::new(0.0, 300.0),
            Point::new(0.0, 0.0),
        ];
        for (src, dst) in quad.iter().zip(expected.iter()) {
            let p = h.project(*src).unwrap();
            assert_relative_eq!(p.x, dst.x, epsilon = TOLERANCE);
            assert_relative_eq!(p.y, dst.y, epsilon = TOLERANCE);
        }
    }

    #[rstest]
    #[case::collinear([
        Point::new(0.0, 0.0),
        Point::new(1.0, 1.0),
        Point::new(2.0, 2.0),
        Point::new(3.0, 3.0),
    ])]
    #[case::duplicated([
        Point::new(10.0, 10.0),
        Point::new(10.0, 10.0),
        Point::new(0.0, 100.0),
        Point::new(100.0, 0.0),
    ])]
    fn test_degenerate_quad_is_rejected(#[case] quad: [Point; 4]) {
        let result = Homography::from_quad(&quad, Resolution::new(100, 100));
        assert_eq!(result.unwrap_err(), GeometryError::DegenerateQuadrilateral);
    }

    #[test]
    fn test_point_at_infinity_is_reported() {
        // A matrix whose bottom row zeroes out the divisor along y = -1.
        let h = Homography {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0]],
        };
        let err = h.project(Point::new(5.0, -1.0)).unwrap_err();
        assert_eq!(err, GeometryError::PointAtInfinity);
    }

    #[test]
    fn test_inverse_round_trips_points() {
        let h = Homography::from_quad(&trapezoid(), Resolution::new(400, 300)).unwrap();
        let inv = h.inverse().unwrap();
        let p = Point::new(321.5, 210.25);
        let round_tripped = inv.project(h.project(p).unwrap()).unwrap();
        assert_relative_eq!(round_tripped.x, p.x, epsilon = 1e-6);
        assert_relative_eq!(round_tripped.y, p.y, epsilon = 1e-6);
    }

    #[test]
    fn test_interior_point_maps_inside_target() {
        let target = Resolution::new(400, 300);
        let h = Homography::from_quad(&trapezoid(), target).unwrap();
        let centroid = Point::new(320.0, 260.0);
        let p = h.project(centroid).unwrap();
        assert!(p.x > 0.0 && p.x < 400.0);
        assert!(p.y > 0.0 && p.y < 300.0);
    }

    // ── Warping ──────────────────────────────────────────────────────

    /// Axis-aligned square picked clockwise from top-right, so the warp
    /// reduces to a crop-and-scale and pixel values can be predicted.
    fn axis_aligned_square() -> [Point; 4] {
        [
            Point::new(3.0, 1.0),
            Point::new(3.0, 3.0),
            Point::new(1.0, 3.0),
            Point::new(1.0, 1.0),
        ]
    }

    #[test]
    fn test_warp_identity_square_preserves_pixels() {
        // 4x4 single-channel ramp frame
        let data: Vec<u8> = (0..16).map(|v| v * 10).collect();
        let frame = Frame::new(data, 4, 4, 1, 0);
        let target = Resolution::new(2, 2);
        let h = Homography::from_quad(&axis_aligned_square(), target).unwrap();
        let warped = h.warp_frame(&frame, target).unwrap();

        assert_eq!(warped.width(), 2);
        assert_eq!(warped.height(), 2);
        // Destination (0,0) inverse-maps to source (1,1) = 4*1+1 = index 5.
        assert_eq!(warped.data()[0], 50);
    }

    #[test]
    fn test_warp_out_of_bounds_is_black() {
        // A quad reaching outside the tiny source frame leaves black pixels.
        let quad = [
            Point::new(10.0, -5.0),
            Point::new(10.0, 10.0),
            Point::new(-5.0, 10.0),
            Point::new(-5.0, -5.0),
        ];
        let frame = Frame::new(vec![200u8; 4 * 4 * 3], 4, 4, 3, 0);
        let target = Resolution::new(8, 8);
        let h = Homography::from_quad(&quad, target).unwrap();
        let warped = h.warp_frame(&frame, target).unwrap();
        // Top-left of the flat view comes from (-5,-5): outside, black.
        let corner = &warped.data()[..3];
        assert_eq!(corner, &[0, 0, 0]);
    }

    #[test]
    fn test_warp_keeps_frame_index() {
        let frame = Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, 42);
        let h = Homography::from_quad(&axis_aligned_square(), Resolution::new(2, 2)).unwrap();
        let warped = h.warp_frame(&frame, Resolution::new(2, 2)).unwrap();
        assert_eq!(warped.index(), 42);
    }
}
