//! Analytic anti-aliased scanline rasterization.
//!
//! Each non-horizontal contour segment becomes a directed edge. Scanlines are
//! swept top to bottom; every active edge adds the exact signed area it
//! covers in each pixel, plus a running fill carried to the right. The
//! coverage of a pixel is the absolute accumulated area.

use euclid::{Point2D, Vector2D};

use super::flatten::Contours;
use super::{Bitmap, Pixel};

/// Edge counts at or below this use insertion sort only.
const INSERTION_SORT_THRESHOLD: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Edge {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    /// Whether the edge was reversed to run downwards.
    invert: bool,
}

/// Turns contours into edges sorted by their top, in pixel space.
fn build_edges(
    contours: &Contours,
    scale: Vector2D<f32, Pixel>,
    shift: Vector2D<f32, Pixel>,
    invert: bool,
) -> Vec<Edge> {
    let y_scale = if invert { -scale.y } else { scale.y };
    let mut edges = Vec::with_capacity(contours.points.len());
    for contour in contours.iter() {
        let Some(mut prev) = contour.last() else {
            continue;
        };
        for point in contour {
            let (a, b) = (prev, point);
            prev = point;
            if a.y == b.y {
                continue;
            }
            let reversed = if invert { a.y > b.y } else { a.y < b.y };
            let (top, bottom) = if reversed { (a, b) } else { (b, a) };
            edges.push(Edge {
                x0: top.x * scale.x + shift.x,
                y0: top.y * y_scale + shift.y,
                x1: bottom.x * scale.x + shift.x,
                y1: bottom.y * y_scale + shift.y,
                invert: reversed,
            });
        }
    }
    sort_edges(&mut edges);
    edges
}

fn less(a: &Edge, b: &Edge) -> bool {
    a.y0 < b.y0
}

fn sort_edges(edges: &mut [Edge]) {
    quicksort(edges);
    insertion_sort(edges);
}

fn insertion_sort(p: &mut [Edge]) {
    for i in 1..p.len() {
        let t = p[i];
        let mut j = i;
        while j > 0 && less(&t, &p[j - 1]) {
            p[j] = p[j - 1];
            j -= 1;
        }
        p[j] = t;
    }
}

/// Partially sorts `p`; runs shorter than the threshold are left for the
/// final insertion sort.
fn quicksort(mut p: &mut [Edge]) {
    while p.len() > INSERTION_SORT_THRESHOLD {
        let n = p.len();
        let m = n >> 1;
        // Median of first, middle and last goes to the middle.
        let c01 = less(&p[0], &p[m]);
        let c12 = less(&p[m], &p[n - 1]);
        if c01 != c12 {
            let c = less(&p[0], &p[n - 1]);
            let z = if c == c12 { 0 } else { n - 1 };
            p.swap(z, m);
        }
        p.swap(0, m);

        let (mut i, mut j) = (1, n - 1);
        loop {
            while i < n && less(&p[i], &p[0]) {
                i += 1;
            }
            while j > 0 && less(&p[0], &p[j]) {
                j -= 1;
            }
            if i >= j {
                break;
            }
            p.swap(i, j);
            i += 1;
            j -= 1;
        }

        // Recurse into the smaller side, loop on the larger one.
        let (left, right) = std::mem::take(&mut p).split_at_mut(i);
        if j < n - i {
            quicksort(&mut left[..j]);
            p = right;
        } else {
            quicksort(right);
            p = &mut left[..j];
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct ActiveEdge {
    next: Option<usize>,
    /// X at the top of the current scanline, relative to the bitmap.
    fx: f32,
    /// dx per unit y.
    fdx: f32,
    /// dy per unit x, 0 for vertical edges.
    fdy: f32,
    direction: f32,
    sy: f32,
    ey: f32,
}

impl ActiveEdge {
    fn new(e: &Edge, off_x: i32, start_y: f32) -> Self {
        let dxdy = (e.x1 - e.x0) / (e.y1 - e.y0);
        Self {
            next: None,
            fx: e.x0 + dxdy * (start_y - e.y0) - off_x as f32,
            fdx: dxdy,
            fdy: if dxdy != 0.0 { 1.0 / dxdy } else { 0.0 },
            direction: if e.invert { 1.0 } else { -1.0 },
            sy: e.y0,
            ey: e.y1,
        }
    }
}

/// Singly linked list of active edges in an arena, with recycled slots.
#[derive(Default)]
struct ActiveList {
    nodes: Vec<ActiveEdge>,
    head: Option<usize>,
    free: Option<usize>,
}

impl ActiveList {
    fn push_front(&mut self, mut edge: ActiveEdge) {
        edge.next = self.head;
        let index = match self.free {
            Some(index) => {
                self.free = self.nodes[index].next;
                self.nodes[index] = edge;
                index
            }
            None => {
                self.nodes.push(edge);
                self.nodes.len() - 1
            }
        };
        self.head = Some(index);
    }

    /// Drops edges that end at or above `y_top`.
    fn retire(&mut self, y_top: f32) {
        let mut prev: Option<usize> = None;
        let mut cur = self.head;
        while let Some(i) = cur {
            let next = self.nodes[i].next;
            if self.nodes[i].ey <= y_top {
                match prev {
                    Some(p) => self.nodes[p].next = next,
                    None => self.head = next,
                }
                self.nodes[i].next = self.free;
                self.free = Some(i);
            } else {
                prev = Some(i);
            }
            cur = next;
        }
    }

    fn iter(&self) -> impl Iterator<Item = &ActiveEdge> {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            let edge = &self.nodes[cur?];
            cur = edge.next;
            Some(edge)
        })
    }

    fn advance(&mut self) {
        let mut cur = self.head;
        while let Some(i) = cur {
            let edge = &mut self.nodes[i];
            edge.fx += edge.fdx;
            cur = edge.next;
        }
    }
}

/// Adds the area of the part of `e` between (x0, y0) and (x1, y1) that
/// lies in pixel column `x` of `buf`.
fn handle_clipped_edge(buf: &mut [f32], x: usize, e: &ActiveEdge, mut x0: f32, mut y0: f32, mut x1: f32, mut y1: f32) {
    if y0 == y1 || y0 > e.ey || y1 < e.sy {
        return;
    }
    if y0 < e.sy {
        x0 += (x1 - x0) * (e.sy - y0) / (y1 - y0);
        y0 = e.sy;
    }
    if y1 > e.ey {
        x1 += (x1 - x0) * (e.ey - y1) / (y1 - y0);
        y1 = e.ey;
    }

    let xf = x as f32;
    if x0 <= xf && x1 <= xf {
        buf[x] += e.direction * (y1 - y0);
    } else if !(x0 >= xf + 1.0 && x1 >= xf + 1.0) {
        // Coverage is one minus the average x position inside the pixel.
        buf[x] += e.direction * (y1 - y0) * (1.0 - ((x0 - xf) + (x1 - xf)) / 2.0);
    }
}

fn sized_trapezoid_area(height: f32, top_width: f32, bottom_width: f32) -> f32 {
    (top_width + bottom_width) / 2.0 * height
}

fn position_trapezoid_area(height: f32, tx0: f32, tx1: f32, bx0: f32, bx1: f32) -> f32 {
    sized_trapezoid_area(height, tx1 - tx0, bx1 - bx0)
}

fn sized_triangle_area(height: f32, width: f32) -> f32 {
    height * width / 2.0
}

/// Accumulates the coverage of one active edge on the scanline starting
/// at `y_top`.
///
/// `fill` has one more slot than `scanline`; the running fill that starts
/// right of column `x` goes to `fill[x + 1]`.
fn fill_active_edge(scanline: &mut [f32], fill: &mut [f32], e: &ActiveEdge, y_top: f32) {
    let len = scanline.len() as f32;
    let y_bottom = y_top + 1.0;

    if e.fdx == 0.0 {
        let x0 = e.fx;
        if x0 < len {
            if x0 >= 0.0 {
                let x = x0 as usize;
                handle_clipped_edge(scanline, x, e, x0, y_top, x0, y_bottom);
                handle_clipped_edge(fill, x + 1, e, x0, y_top, x0, y_bottom);
            } else {
                handle_clipped_edge(fill, 0, e, x0, y_top, x0, y_bottom);
            }
        }
        return;
    }

    let mut x0 = e.fx;
    let mut dx = e.fdx;
    let mut xb = x0 + dx;
    let mut dy = e.fdy;

    // Clip the segment to this scanline; x0 is where the infinite line
    // crosses y_top, which may lie outside the segment.
    let (mut x_top, mut sy0) = if e.sy > y_top {
        (x0 + dx * (e.sy - y_top), e.sy)
    } else {
        (x0, y_top)
    };
    let (mut x_bottom, mut sy1) = if e.ey < y_bottom {
        (x0 + dx * (e.ey - y_top), e.ey)
    } else {
        (xb, y_bottom)
    };

    if x_top >= 0.0 && x_bottom >= 0.0 && x_top < len && x_bottom < len {
        if x_top as usize == x_bottom as usize {
            // Spans a single pixel.
            let x = x_top as usize;
            let xf = x as f32;
            let height = (sy1 - sy0) * e.direction;
            scanline[x] += position_trapezoid_area(height, x_top, xf + 1.0, x_bottom, xf + 1.0);
            fill[x + 1] += height;
            return;
        }

        if x_top > x_bottom {
            // Mirror the scanline vertically; the signed area is unchanged.
            sy0 = y_bottom - (sy0 - y_top);
            sy1 = y_bottom - (sy1 - y_top);
            std::mem::swap(&mut sy0, &mut sy1);
            std::mem::swap(&mut x_bottom, &mut x_top);
            dx = -dx;
            dy = -dy;
            std::mem::swap(&mut x0, &mut xb);
        }
        debug_assert!(dx >= 0.0 && dy >= 0.0);

        let x1 = x_top as usize;
        let x2 = x_bottom as usize;
        // Where the edge crosses the right side of the first pixel, and the
        // left side of the last one.
        let mut y_crossing = y_top + dy * ((x1 + 1) as f32 - x0);
        let mut y_final = y_top + dy * (x2 as f32 - x0);

        // Nearly horizontal edges can overshoot the scanline.
        if y_crossing > y_bottom {
            y_crossing = y_bottom;
        }

        let sign = e.direction;
        let mut area = sign * (y_crossing - sy0);
        scanline[x1] += sized_triangle_area(area, (x1 + 1) as f32 - x_top);

        if y_final > y_bottom {
            let denom = x2 as i32 - (x1 as i32 + 1);
            y_final = y_bottom;
            if denom != 0 {
                dy = (y_final - y_crossing) / denom as f32;
            }
        }

        // Each middle pixel gets the rectangle from the pixels to its left
        // plus a sliding trapezoid of its own.
        let step = sign * dy;
        for x in x1 + 1..x2 {
            scanline[x] += area + step / 2.0;
            area += step;
        }

        let x2f = x2 as f32;
        scanline[x2] += area + sign * position_trapezoid_area(sy1 - y_final, x2f, x2f + 1.0, x_bottom, x2f + 1.0);
        fill[x2 + 1] += sign * (sy1 - sy0);
        return;
    }

    // The edge leaves the bitmap: clip it against every pixel column.
    for x in 0..scanline.len() {
        let xf = x as f32;
        let y0 = y_top;
        let (x1, x2) = (xf, xf + 1.0);
        let (x3, y3) = (xb, y_bottom);
        let y1 = (xf - x0) / dx + y_top;
        let y2 = (xf + 1.0 - x0) / dx + y_top;

        if x0 < x1 && x3 > x2 {
            handle_clipped_edge(scanline, x, e, x0, y0, x1, y1);
            handle_clipped_edge(scanline, x, e, x1, y1, x2, y2);
            handle_clipped_edge(scanline, x, e, x2, y2, x3, y3);
        } else if x3 < x1 && x0 > x2 {
            handle_clipped_edge(scanline, x, e, x0, y0, x2, y2);
            handle_clipped_edge(scanline, x, e, x2, y2, x1, y1);
            handle_clipped_edge(scanline, x, e, x1, y1, x3, y3);
        } else if (x0 < x1 && x3 > x1) || (x3 < x1 && x0 > x1) {
            handle_clipped_edge(scanline, x, e, x0, y0, x1, y1);
            handle_clipped_edge(scanline, x, e, x1, y1, x3, y3);
        } else if (x0 < x2 && x3 > x2) || (x3 < x2 && x0 > x2) {
            handle_clipped_edge(scanline, x, e, x0, y0, x2, y2);
            handle_clipped_edge(scanline, x, e, x2, y2, x3, y3);
        } else {
            handle_clipped_edge(scanline, x, e, x0, y0, x3, y3);
        }
    }
}

fn rasterize_sorted_edges(bitmap: &mut Bitmap<'_>, edges: &[Edge], offset: Point2D<i32, Pixel>) {
    let width = bitmap.width as usize;
    let mut scanline = vec![0.0f32; width];
    let mut fill = vec![0.0f32; width + 1];
    let mut active = ActiveList::default();
    let mut next_edge = 0;

    for j in 0..bitmap.height as usize {
        let y_top = (offset.y + j as i32) as f32;
        let y_bottom = y_top + 1.0;
        scanline.fill(0.0);
        fill.fill(0.0);

        active.retire(y_top);

        while let Some(e) = edges.get(next_edge).filter(|e| e.y0 <= y_bottom) {
            if e.y0 != e.y1 {
                let mut z = ActiveEdge::new(e, offset.x, y_top);
                // Subpixel shifts can leave a sliver of an edge above the
                // first row.
                if j == 0 && offset.y != 0 && z.ey < y_top {
                    z.ey = y_top;
                }
                active.push_front(z);
            }
            next_edge += 1;
        }

        for e in active.iter() {
            fill_active_edge(&mut scanline, &mut fill, e, y_top);
        }

        let row = &mut bitmap.pixels[j * bitmap.stride..][..width];
        let mut sum = 0.0;
        for (i, pixel) in row.iter_mut().enumerate() {
            sum += fill[i];
            let k = (scanline[i] + sum).abs() * 255.0 + 0.5;
            *pixel = (k as i32).min(255) as u8;
        }

        active.advance();
    }
}

/// Rasterizes flattened `contours` into `bitmap`.
///
/// Points are mapped with `p * scale + shift` (y negated first when
/// `invert` is set), and `offset` is the pixel position of the bitmap's
/// top-left corner in that space.
pub fn rasterize(
    bitmap: &mut Bitmap<'_>,
    contours: &Contours,
    scale: Vector2D<f32, Pixel>,
    shift: Vector2D<f32, Pixel>,
    offset: Point2D<i32, Pixel>,
    invert: bool,
) {
    let edges = build_edges(contours, scale, shift, invert);
    rasterize_sorted_edges(bitmap, &edges, offset);
}
