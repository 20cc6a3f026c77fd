// Copyright 2026 the Mapweave Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Planar feature geometry in map coordinates.
//!
//! All operations are plain arithmetic on [`kurbo`] points; distances are compared squared
//! so nothing here needs float functions beyond what `core` provides.

use alloc::vec::Vec;
use kurbo::{Point, Rect, Vec2};

/// Geometry of a visual primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// A single position.
    Point(Point),
    /// Several unconnected positions.
    MultiPoint(Vec<Point>),
    /// An open polyline.
    LineString(Vec<Point>),
    /// Rings of a polygon; the first is the exterior, the rest are holes.
    ///
    /// Rings may be explicitly closed (first vertex repeated last) or not.
    Polygon(Vec<Vec<Point>>),
}

/// Address of one vertex within a [`Geometry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexRef {
    /// Ring index for polygons, `0` otherwise.
    pub ring: usize,
    /// Vertex index within the ring or list.
    pub index: usize,
}

impl Geometry {
    fn rings(&self) -> impl Iterator<Item = &[Point]> {
        let (single, many): (Option<&[Point]>, &[Vec<Point>]) = match self {
            Self::Point(p) => (Some(core::slice::from_ref(p)), &[]),
            Self::MultiPoint(pts) | Self::LineString(pts) => (Some(pts.as_slice()), &[]),
            Self::Polygon(rings) => (None, rings.as_slice()),
        };
        single.into_iter().chain(many.iter().map(Vec::as_slice))
    }

    fn rings_mut(&mut self) -> Vec<&mut Vec<Point>> {
        match self {
            Self::Point(_) => Vec::new(),
            Self::MultiPoint(pts) | Self::LineString(pts) => alloc::vec![pts],
            Self::Polygon(rings) => rings.iter_mut().collect(),
        }
    }

    /// Every vertex, ring by ring.
    pub fn vertices(&self) -> impl Iterator<Item = Point> + '_ {
        self.rings().flat_map(|r| r.iter().copied())
    }

    /// Axis-aligned bounding box, or `None` for a geometry without vertices.
    pub fn extent(&self) -> Option<Rect> {
        let mut it = self.vertices();
        let first = it.next()?;
        Some(it.fold(Rect::from_points(first, first), |acc, p| {
            acc.union_pt(p)
        }))
    }

    /// Move every vertex by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Self::Point(p) => *p += delta,
            _ => {
                for ring in self.rings_mut() {
                    for p in ring.iter_mut() {
                        *p += delta;
                    }
                }
            }
        }
    }

    /// A copy moved by `delta`.
    pub fn translated(&self, delta: Vec2) -> Self {
        let mut g = self.clone();
        g.translate(delta);
        g
    }

    /// A point standing in for the whole geometry: the point itself, or the extent center.
    pub fn anchor(&self) -> Option<Point> {
        match self {
            Self::Point(p) => Some(*p),
            _ => self.extent().map(|r| r.center()),
        }
    }

    /// The vertex at `v`, if it exists.
    pub fn vertex(&self, v: VertexRef) -> Option<Point> {
        self.rings().nth(v.ring)?.get(v.index).copied()
    }

    /// Nearest vertex to `p` no farther than `max_distance`.
    pub fn nearest_vertex(&self, p: Point, max_distance: f64) -> Option<VertexRef> {
        let limit = max_distance * max_distance;
        let mut best: Option<(f64, VertexRef)> = None;
        for (ring, pts) in self.rings().enumerate() {
            for (index, q) in pts.iter().enumerate() {
                let d = (*q - p).hypot2();
                if d <= limit && best.is_none_or(|(bd, _)| d < bd) {
                    best = Some((d, VertexRef { ring, index }));
                }
            }
        }
        best.map(|(_, v)| v)
    }

    /// Move the vertex at `v` to `to`. Returns `false` if `v` does not exist.
    ///
    /// Moving the first or last vertex of an explicitly closed polygon ring moves both,
    /// so the ring stays closed.
    pub fn set_vertex(&mut self, v: VertexRef, to: Point) -> bool {
        if let Self::Point(p) = self {
            if v.ring == 0 && v.index == 0 {
                *p = to;
                return true;
            }
            return false;
        }
        let is_polygon = matches!(self, Self::Polygon(_));
        let mut rings = self.rings_mut();
        let Some(ring) = rings.get_mut(v.ring) else {
            return false;
        };
        let len = ring.len();
        if v.index >= len {
            return false;
        }
        let closed = is_polygon && len > 1 && ring[0] == ring[len - 1];
        ring[v.index] = to;
        if closed {
            if v.index == 0 {
                ring[len - 1] = to;
            } else if v.index == len - 1 {
                ring[0] = to;
            }
        }
        true
    }

    /// Squared distance from `p` to this geometry; `0.0` inside a polygon.
    pub fn distance_sq(&self, p: Point) -> f64 {
        match self {
            Self::Point(q) => (*q - p).hypot2(),
            Self::MultiPoint(pts) => pts
                .iter()
                .map(|q| (*q - p).hypot2())
                .fold(f64::INFINITY, f64::min),
            Self::LineString(pts) => polyline_distance_sq(pts, p, false),
            Self::Polygon(rings) => {
                if polygon_contains(rings, p) {
                    0.0
                } else {
                    rings
                        .iter()
                        .map(|r| polyline_distance_sq(r, p, true))
                        .fold(f64::INFINITY, f64::min)
                }
            }
        }
    }
}

/// Union of the extents of `geometries`, or `None` when none has vertices.
pub fn union_extent<'a>(geometries: impl IntoIterator<Item = &'a Geometry>) -> Option<Rect> {
    geometries
        .into_iter()
        .filter_map(Geometry::extent)
        .reduce(|a, b| a.union(b))
}

fn segment_distance_sq(a: Point, b: Point, p: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.hypot2();
    if len_sq == 0.0 {
        return (p - a).hypot2();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).hypot2()
}

fn polyline_distance_sq(pts: &[Point], p: Point, closed: bool) -> f64 {
    match pts {
        [] => f64::INFINITY,
        [only] => (*only - p).hypot2(),
        _ => {
            let open = pts
                .windows(2)
                .map(|w| segment_distance_sq(w[0], w[1], p))
                .fold(f64::INFINITY, f64::min);
            if closed {
                open.min(segment_distance_sq(pts[pts.len() - 1], pts[0], p))
            } else {
                open
            }
        }
    }
}

// Even-odd rule over all rings, so holes are excluded.
fn polygon_contains(rings: &[Vec<Point>], p: Point) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        if n < 3 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (ring[i], ring[j]);
            if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
                inside = !inside;
            }
            j = i;
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn square() -> Geometry {
        Geometry::Polygon(vec![vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 0.0),
        ]])
    }

    #[test]
    fn extent_of_polygon() {
        assert_eq!(square().extent(), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert_eq!(Geometry::LineString(Vec::new()).extent(), None);
    }

    #[test]
    fn translate_moves_all_vertices() {
        let g = square().translated(Vec2::new(5.0, -1.0));
        assert_eq!(g.extent(), Some(Rect::new(5.0, -1.0, 15.0, 9.0)));
        let mut p = Geometry::Point(Point::new(1.0, 1.0));
        p.translate(Vec2::new(1.0, 2.0));
        assert_eq!(p, Geometry::Point(Point::new(2.0, 3.0)));
    }

    #[test]
    fn polygon_distance_is_zero_inside() {
        let g = square();
        assert_eq!(g.distance_sq(Point::new(5.0, 5.0)), 0.0);
        assert_eq!(g.distance_sq(Point::new(13.0, 5.0)), 9.0);
    }

    #[test]
    fn polygon_hole_is_outside() {
        let g = Geometry::Polygon(vec![
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            vec![
                Point::new(4.0, 4.0),
                Point::new(6.0, 4.0),
                Point::new(6.0, 6.0),
                Point::new(4.0, 6.0),
            ],
        ]);
        assert!(g.distance_sq(Point::new(5.0, 5.0)) > 0.0);
        assert_eq!(g.distance_sq(Point::new(2.0, 2.0)), 0.0);
    }

    #[test]
    fn line_distance_uses_segments() {
        let g = Geometry::LineString(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert_eq!(g.distance_sq(Point::new(5.0, 2.0)), 4.0);
        assert_eq!(g.distance_sq(Point::new(-3.0, 0.0)), 9.0);
    }

    #[test]
    fn nearest_vertex_respects_limit() {
        let g = square();
        assert_eq!(
            g.nearest_vertex(Point::new(9.5, 9.0), 2.0),
            Some(VertexRef { ring: 0, index: 2 })
        );
        assert_eq!(g.nearest_vertex(Point::new(5.0, 5.0), 2.0), None);
    }

    #[test]
    fn moving_closing_vertex_keeps_ring_closed() {
        let mut g = square();
        assert!(g.set_vertex(VertexRef { ring: 0, index: 0 }, Point::new(-1.0, -1.0)));
        assert_eq!(g.vertex(VertexRef { ring: 0, index: 4 }), Some(Point::new(-1.0, -1.0)));
        assert!(!g.set_vertex(VertexRef { ring: 3, index: 0 }, Point::ORIGIN));
    }

    #[test]
    fn union_extent_skips_empty() {
        let a = Geometry::Point(Point::new(0.0, 0.0));
        let b = Geometry::Point(Point::new(4.0, 2.0));
        let empty = Geometry::MultiPoint(Vec::new());
        assert_eq!(
            union_extent([&a, &empty, &b]),
            Some(Rect::new(0.0, 0.0, 4.0, 2.0))
        );
        assert_eq!(union_extent([&empty]), None);
    }
}
