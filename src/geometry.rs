//! Planar geometry in course-local meters.
//!
//! Point-in-polygon uses the half-open crossing rule: a point whose y lies
//! in `[min_y, max_y)` of an edge crosses it when strictly left of the edge.
//! For a point exactly on the boundary this puts left and bottom edges
//! inside and right and top edges outside. The tie-break is kept as is
//! (tested in `boundary_inclusion_is_half_open`).

use rand::Rng;
use serde::{Deserialize, Serialize};

const PARALLEL_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point `distance` meters away along `angle` (radians).
    pub fn offset(self, angle: f64, distance: f64) -> Point {
        Point::new(
            self.x + distance * angle.cos(),
            self.y + distance * angle.sin(),
        )
    }

    /// Moves toward `target` by at most `max_step`. Returns the new position
    /// and whether the target was reached exactly.
    pub fn step_toward(self, target: Point, max_step: f64) -> (Point, bool) {
        let remaining = distance(self, target);
        if remaining <= max_step {
            (target, true)
        } else {
            (self.offset(bearing(self, target), max_step), false)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub Vec<Point>);

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Axis-aligned rectangle, counter-clockwise from the minimum corner.
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self(vec![
            Point::new(min_x, min_y),
            Point::new(max_x, min_y),
            Point::new(max_x, max_y),
            Point::new(min_x, max_y),
        ])
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fewer than three vertices: never contains anything.
    pub fn is_degenerate(&self) -> bool {
        self.0.len() < 3
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(point, self)
    }

    pub fn center(&self) -> Point {
        polygon_center(self)
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::around(self.0.iter().copied())
    }

    /// Closed edge list, last vertex connecting back to the first.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.0.len();
        (0..n).map(move |i| (self.0[i], self.0[(i + 1) % n]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn around(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BoundingBox {
            min: first,
            max: first,
        };
        for p in iter {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    pub fn expanded(self, margin: f64) -> Self {
        Self {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn mid(&self) -> Point {
        Point::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
    }
}

pub fn distance(a: Point, b: Point) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Direction from `a` to `b` in radians, `atan2(dy, dx)`.
pub fn bearing(a: Point, b: Point) -> f64 {
    (b.y - a.y).atan2(b.x - a.x)
}

pub fn point_in_polygon(p: Point, polygon: &Polygon) -> bool {
    if polygon.is_degenerate() {
        return false;
    }
    let mut inside = false;
    for (a, b) in polygon.edges() {
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Where the segment `start -> end` first enters `polygon`.
///
/// Returns `start` itself when it is already inside, otherwise the boundary
/// crossing closest to `start`, or `None` when the segment never touches an
/// edge.
pub fn segment_crosses_polygon_entry(start: Point, end: Point, polygon: &Polygon) -> Option<Point> {
    if polygon.is_degenerate() {
        return None;
    }
    if polygon.contains(start) {
        return Some(start);
    }
    polygon
        .edges()
        .filter_map(|(a, b)| segment_intersection(start, end, a, b))
        .min_by(|lhs, rhs| lhs.0.total_cmp(&rhs.0))
        .map(|(_, point)| point)
}

/// Intersection of `p1 -> p2` with `q1 -> q2` as `(t along p, point)`.
fn segment_intersection(p1: Point, p2: Point, q1: Point, q2: Point) -> Option<(f64, Point)> {
    let r = (p2.x - p1.x, p2.y - p1.y);
    let s = (q2.x - q1.x, q2.y - q1.y);
    let denom = cross(r, s);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    let qp = (q1.x - p1.x, q1.y - p1.y);
    let t = cross(qp, s) / denom;
    let u = cross(qp, r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((t, Point::new(p1.x + t * r.0, p1.y + t * r.1)))
    } else {
        None
    }
}

fn cross(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.1 - a.1 * b.0
}

/// Arithmetic mean of the vertices; the origin for an empty polygon.
pub fn polygon_center(polygon: &Polygon) -> Point {
    if polygon.is_empty() {
        return Point::default();
    }
    let n = polygon.0.len() as f64;
    let (sx, sy) = polygon
        .0
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

/// Rejection-samples a uniform point inside `polygon` from its bounding box.
pub fn sample_point_in_polygon<R: Rng>(
    polygon: &Polygon,
    rng: &mut R,
    attempts: u32,
) -> Option<Point> {
    let bbox = polygon.bounds()?;
    if polygon.is_degenerate() || bbox.min.x >= bbox.max.x || bbox.min.y >= bbox.max.y {
        return None;
    }
    (0..attempts).find_map(|_| {
        let candidate = Point::new(
            rng.gen_range(bbox.min.x..bbox.max.x),
            rng.gen_range(bbox.min.y..bbox.max.y),
        );
        polygon.contains(candidate).then_some(candidate)
    })
}
