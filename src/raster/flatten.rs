//! Adaptive subdivision of outline curves into closed polylines.

use crate::outline::{FontPoint, Vertex};

/// Deepest subdivision level before a segment is accepted as flat.
pub const MAX_SUBDIVISION_DEPTH: u32 = 16;

/// Flattened outline: all contour points back to back, with the number of
/// points in each contour.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contours {
    pub points: Vec<FontPoint>,
    pub lengths: Vec<usize>,
}

impl Contours {
    /// Iterates the contours as point slices.
    pub fn iter(&self) -> impl Iterator<Item = &[FontPoint]> {
        let mut start = 0;
        self.lengths.iter().map(move |&len| {
            let contour = &self.points[start..start + len];
            start += len;
            contour
        })
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

trait PointSink {
    fn begin_contour(&mut self);
    fn point(&mut self, p: FontPoint);
}

#[derive(Default)]
struct Counter {
    points: usize,
    contours: usize,
}

impl PointSink for Counter {
    fn begin_contour(&mut self) {
        self.contours += 1;
    }

    fn point(&mut self, _: FontPoint) {
        self.points += 1;
    }
}

impl PointSink for Contours {
    fn begin_contour(&mut self) {
        self.lengths.push(0);
    }

    fn point(&mut self, p: FontPoint) {
        self.points.push(p);
        if let Some(len) = self.lengths.last_mut() {
            *len += 1;
        }
    }
}

fn midpoint(a: FontPoint, b: FontPoint) -> FontPoint {
    a.lerp(b, 0.5)
}

fn tessellate_quad(sink: &mut impl PointSink, p0: FontPoint, p1: FontPoint, p2: FontPoint, flatness_sq: f32, depth: u32) {
    // Curve midpoint against chord midpoint.
    let mid = FontPoint::new((p0.x + 2.0 * p1.x + p2.x) / 4.0, (p0.y + 2.0 * p1.y + p2.y) / 4.0);
    let deviation = midpoint(p0, p2) - mid;
    if depth < MAX_SUBDIVISION_DEPTH && deviation.square_length() > flatness_sq {
        tessellate_quad(sink, p0, midpoint(p0, p1), mid, flatness_sq, depth + 1);
        tessellate_quad(sink, mid, midpoint(p1, p2), p2, flatness_sq, depth + 1);
    } else {
        sink.point(p2);
    }
}

fn tessellate_cubic(
    sink: &mut impl PointSink,
    p0: FontPoint,
    p1: FontPoint,
    p2: FontPoint,
    p3: FontPoint,
    flatness_sq: f32,
    depth: u32,
) {
    let long_len = (p1 - p0).length() + (p2 - p1).length() + (p3 - p2).length();
    let short_len = (p3 - p0).length();
    let flatness = long_len * long_len - short_len * short_len;
    if depth < MAX_SUBDIVISION_DEPTH && flatness > flatness_sq {
        let p01 = midpoint(p0, p1);
        let p12 = midpoint(p1, p2);
        let p23 = midpoint(p2, p3);
        let a = midpoint(p01, p12);
        let b = midpoint(p12, p23);
        let mid = midpoint(a, b);
        tessellate_cubic(sink, p0, p01, a, mid, flatness_sq, depth + 1);
        tessellate_cubic(sink, mid, b, p23, p3, flatness_sq, depth + 1);
    } else {
        sink.point(p3);
    }
}

fn walk(vertices: &[Vertex], flatness_sq: f32, sink: &mut impl PointSink) {
    let mut pen = FontPoint::origin();
    let mut open = false;
    for vertex in vertices {
        match *vertex {
            Vertex::MoveTo(p) => {
                sink.begin_contour();
                sink.point(p);
                open = true;
            }
            // Drawing without a preceding move starts a contour at the pen.
            _ if !open => {
                sink.begin_contour();
                sink.point(pen);
                open = true;
            }
            _ => {}
        }
        match *vertex {
            Vertex::MoveTo(_) => {}
            Vertex::LineTo(p) => sink.point(p),
            Vertex::QuadTo { ctrl, to } => tessellate_quad(sink, pen, ctrl, to, flatness_sq, 0),
            Vertex::CubicTo { ctrl1, ctrl2, to } => {
                tessellate_cubic(sink, pen, ctrl1, ctrl2, to, flatness_sq, 0)
            }
        }
        pen = vertex.to();
    }
}

/// Flattens `vertices` into polylines whose deviation from the true curves
/// stays within `flatness` (in the same units as the vertices).
///
/// A counting pass sizes the output exactly before it is filled.
pub fn flatten(vertices: &[Vertex], flatness: f32) -> Contours {
    let flatness_sq = flatness * flatness;
    let mut counter = Counter::default();
    walk(vertices, flatness_sq, &mut counter);

    let mut contours = Contours {
        points: Vec::with_capacity(counter.points),
        lengths: Vec::with_capacity(counter.contours),
    };
    walk(vertices, flatness_sq, &mut contours);
    contours
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> FontPoint {
        FontPoint::new(x, y)
    }

    fn square() -> Vec<Vertex> {
        vec![
            Vertex::MoveTo(p(0.0, 0.0)),
            Vertex::LineTo(p(0.0, 10.0)),
            Vertex::LineTo(p(10.0, 10.0)),
            Vertex::LineTo(p(10.0, 0.0)),
            Vertex::LineTo(p(0.0, 0.0)),
        ]
    }

    #[test]
    fn lines_pass_through() {
        let contours = flatten(&square(), 0.35);
        assert_eq!(contours.lengths, vec![5]);
        assert_eq!(contours.points[2], p(10.0, 10.0));
    }

    #[test]
    fn contours_split_on_move() {
        let mut vertices = square();
        vertices.extend(square());
        let contours = flatten(&vertices, 0.35);
        assert_eq!(contours.len(), 2);
        let parts: Vec<&[FontPoint]> = contours.iter().collect();
        assert_eq!(parts[0], parts[1]);
    }

    #[test]
    fn flat_quad_is_one_segment() {
        let vertices = [
            Vertex::MoveTo(p(0.0, 0.0)),
            Vertex::QuadTo { ctrl: p(5.0, 0.0), to: p(10.0, 0.0) },
        ];
        assert_eq!(flatten(&vertices, 0.35).points, vec![p(0.0, 0.0), p(10.0, 0.0)]);
    }

    #[test]
    fn curved_quad_stays_within_tolerance() {
        let (p0, p1, p2) = (p(0.0, 0.0), p(50.0, 100.0), p(100.0, 0.0));
        let vertices = [Vertex::MoveTo(p0), Vertex::QuadTo { ctrl: p1, to: p2 }];
        let contours = flatten(&vertices, 0.5);
        assert!(contours.points.len() > 8);
        assert_eq!(*contours.points.last().unwrap(), p2);
        // Every emitted point lies on the curve.
        for q in &contours.points[1..] {
            let t = q.x / 100.0;
            let y = 2.0 * (1.0 - t) * t * 100.0;
            assert!((q.y - y).abs() < 1e-3, "{q:?}");
        }
        // Chord midpoints deviate from the curve by at most the tolerance.
        for w in contours.points.windows(2) {
            let m = midpoint(w[0], w[1]);
            let t = m.x / 100.0;
            let y = 2.0 * (1.0 - t) * t * 100.0;
            assert!((m.y - y).abs() <= 0.5 + 1e-3);
        }
    }

    #[test]
    fn cubic_ends_at_its_endpoint() {
        let vertices = [
            Vertex::MoveTo(p(0.0, 0.0)),
            Vertex::CubicTo { ctrl1: p(0.0, 50.0), ctrl2: p(100.0, 50.0), to: p(100.0, 0.0) },
        ];
        let contours = flatten(&vertices, 0.35);
        assert!(contours.points.len() > 4);
        assert_eq!(*contours.points.last().unwrap(), p(100.0, 0.0));
    }

    #[test]
    fn depth_cap_still_reaches_endpoint() {
        // A negative tolerance never counts as flat, so only the cap stops it.
        let mut contours = Contours::default();
        contours.begin_contour();
        let end = p(100.0, 0.0);
        tessellate_cubic(&mut contours, p(0.0, 0.0), p(0.0, 50.0), p(100.0, 50.0), end, -1.0, 0);
        assert_eq!(contours.points.len(), 1 << MAX_SUBDIVISION_DEPTH);
        assert_eq!(*contours.points.last().unwrap(), end);
    }

    #[test]
    fn drawing_before_move_starts_at_origin() {
        let contours = flatten(&[Vertex::LineTo(p(3.0, 4.0))], 0.35);
        assert_eq!(contours.points, vec![p(0.0, 0.0), p(3.0, 4.0)]);
    }
}
