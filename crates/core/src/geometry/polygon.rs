use crate::shared::point::Point;
use crate::shared::resolution::Resolution;

const EDGE_EPSILON: f64 = 1e-9;

/// Ray-casting containment test over the projection quadrilateral.
///
/// Boundary policy is exclusive: a point exactly on an edge or vertex counts
/// as outside. A person standing on the area's border has not entered it.
pub fn point_in_polygon(point: Point, polygon: &[Point; 4]) -> bool {
    for i in 0..4 {
        if point_on_segment(point, polygon[i], polygon[(i + 1) % 4]) {
            return false;
        }
    }

    let mut inside = false;
    let mut j = 3;
    for i in 0..4 {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x_at_crossing = b.x + (point.y - b.y) * (a.x - b.x) / (a.y - b.y);
            if point.x < x_at_crossing {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Whether `p` lies on the closed segment `a..b`, within [`EDGE_EPSILON`]
/// of perpendicular distance.
fn point_on_segment(p: Point, a: Point, b: Point) -> bool {
    let length = (b.x - a.x).hypot(b.y - a.y);
    if length < EDGE_EPSILON {
        return (p.x - a.x).hypot(p.y - a.y) < EDGE_EPSILON;
    }
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if (cross / length).abs() > EDGE_EPSILON {
        return false;
    }
    let dot = (p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y);
    dot >= -EDGE_EPSILON * length && dot <= length * length + EDGE_EPSILON * length
}

/// Per-axis linear rescaling of points between two coordinate spaces.
///
/// Maps polygon points drawn on a (possibly scaled) preview into native
/// camera-frame coordinates: `x' = x · to.w/from.w`, `y' = y · to.h/from.h`.
pub fn rescale_points(points: &[Point], from: Resolution, to: Resolution) -> Vec<Point> {
    let sx = to.width as f64 / from.width as f64;
    let sy = to.height as f64 / from.height as f64;
    points
        .iter()
        .map(|p| Point::new(p.x * sx, p.y * sy))
        .collect()
}
