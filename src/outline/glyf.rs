//! TrueType `glyf` outlines: simple glyphs with quadratic contours and
//! composite glyphs assembled from transformed components.

use std::ops::Range;

use euclid::{Box2D, Point2D};

use crate::error::{FormatError, OutOfBounds, OutlineError};
use crate::font::reader::{Reader, i16_at, u16_at, u32_at};
use crate::font::{FontInfo, Outlines};
use crate::glyph_id::GlyphId;
use crate::outline::{FontPoint, FontUnit, GlyphOutline, OutlineSink, Vertex};

/// Deepest composite nesting followed before giving up.
pub(crate) const MAX_COMPOSITE_DEPTH: usize = 16;
/// Most components one glyph may expand to, counted over every level.
pub(crate) const MAX_COMPOSITE_COMPONENTS: usize = 1024;
/// Most vertices a composite outline may accumulate.
pub(crate) const MAX_COMPOSITE_VERTICES: usize = 1 << 20;

// Simple glyph point flags.
const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

// Composite component flags.
const ARGS_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY_VALUES: u16 = 0x0002;
const HAVE_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const HAVE_X_AND_Y_SCALE: u16 = 0x0040;
const HAVE_TWO_BY_TWO: u16 = 0x0080;

/// Borrowed view of the `glyf` and `loca` tables of one face.
#[derive(Clone, Copy)]
pub(crate) struct GlyfTables<'a> {
    pub glyf: &'a [u8],
    pub loca: &'a [u8],
    pub long_offsets: bool,
    pub num_glyphs: usize,
}

impl<'a> GlyfTables<'a> {
    fn of(font: &'a FontInfo) -> Option<Self> {
        match font.outlines() {
            Outlines::TrueType { glyf, loca, long_offsets } => Some(Self {
                glyf: font.table_bytes(glyf),
                loca: font.table_bytes(loca),
                long_offsets: *long_offsets,
                num_glyphs: font.num_glyphs(),
            }),
            Outlines::Cff { .. } => None,
        }
    }

    /// Byte range of `glyph` inside `glyf`, or `None` when it has no data.
    fn glyph_range(&self, glyph: GlyphId) -> Result<Option<Range<usize>>, OutOfBounds> {
        let gid = glyph.to_u16() as usize;
        if gid >= self.num_glyphs {
            return Ok(None);
        }
        let (start, end) = if self.long_offsets {
            (
                u32_at(self.loca, gid * 4)? as usize,
                u32_at(self.loca, gid * 4 + 4)? as usize,
            )
        } else {
            (
                u16_at(self.loca, gid * 2)? as usize * 2,
                u16_at(self.loca, gid * 2 + 2)? as usize * 2,
            )
        };
        if start == end {
            return Ok(None);
        }
        if start > end || end > self.glyf.len() {
            return Err(OutOfBounds);
        }
        Ok(Some(start..end))
    }

    fn glyph_data(&self, glyph: GlyphId) -> Result<Option<&'a [u8]>, OutOfBounds> {
        Ok(self.glyph_range(glyph)?.map(|r| &self.glyf[r]))
    }

    pub fn is_empty(&self, glyph: GlyphId) -> Result<bool, OutOfBounds> {
        Ok(match self.glyph_data(glyph)? {
            None => true,
            Some(data) => i16_at(data, 0)? == 0,
        })
    }

    pub fn header_box(&self, glyph: GlyphId) -> Result<Option<Box2D<i32, FontUnit>>, OutOfBounds> {
        let Some(data) = self.glyph_data(glyph)? else {
            return Ok(None);
        };
        let v = |offset| i16_at(data, offset).map(i32::from);
        Ok(Some(Box2D::new(
            Point2D::new(v(2)?, v(4)?),
            Point2D::new(v(6)?, v(8)?),
        )))
    }

    /// Appends the outline of `glyph` to `out`.
    pub fn append_outline(&self, glyph: GlyphId, out: &mut GlyphOutline) -> Result<(), FormatError> {
        let mut components = 0;
        self.append_glyph(glyph, 0, &mut components, out)
    }

    /// `components` counts every component expanded so far for the
    /// outermost glyph.
    fn append_glyph(
        &self,
        glyph: GlyphId,
        depth: usize,
        components: &mut usize,
        out: &mut GlyphOutline,
    ) -> Result<(), FormatError> {
        let Some(data) = self.glyph_data(glyph)? else {
            return Ok(());
        };
        let num_contours = i16_at(data, 0)?;
        match num_contours {
            0 => Ok(()),
            n if n > 0 => Ok(simple_outline(data, n as usize, out)?),
            _ => self.composite_outline(data, depth, components, out),
        }
    }

    fn composite_outline(
        &self,
        data: &[u8],
        depth: usize,
        components: &mut usize,
        out: &mut GlyphOutline,
    ) -> Result<(), FormatError> {
        if depth >= MAX_COMPOSITE_DEPTH {
            return Err(FormatError::CompositeTooDeep(MAX_COMPOSITE_DEPTH));
        }
        let mut r = Reader::at(data, 10);
        loop {
            let flags = r.u16()?;
            let component = GlyphId::new(r.u16()?);

            let (dx, dy) = if flags & ARGS_ARE_WORDS != 0 {
                (r.i16()? as f32, r.i16()? as f32)
            } else {
                (r.i8()? as f32, r.i8()? as f32)
            };
            // Point-matching anchors are not resolved; such components stay in place.
            let (e, f) = if flags & ARGS_ARE_XY_VALUES != 0 { (dx, dy) } else { (0.0, 0.0) };

            let (a, b, c, d) = if flags & HAVE_SCALE != 0 {
                let s = f2dot14(r.i16()?);
                (s, 0.0, 0.0, s)
            } else if flags & HAVE_X_AND_Y_SCALE != 0 {
                let sx = f2dot14(r.i16()?);
                let sy = f2dot14(r.i16()?);
                (sx, 0.0, 0.0, sy)
            } else if flags & HAVE_TWO_BY_TWO != 0 {
                (
                    f2dot14(r.i16()?),
                    f2dot14(r.i16()?),
                    f2dot14(r.i16()?),
                    f2dot14(r.i16()?),
                )
            } else {
                (1.0, 0.0, 0.0, 1.0)
            };

            *components += 1;
            if *components > MAX_COMPOSITE_COMPONENTS {
                return Err(FormatError::CompositeTooLarge);
            }
            let mut part = GlyphOutline::default();
            self.append_glyph(component, depth + 1, components, &mut part)?;
            out.vertices.extend(part.vertices.into_iter().map(|v| {
                v.map(|p| FontPoint::new(a * p.x + c * p.y + e, b * p.x + d * p.y + f))
            }));
            if out.vertices.len() > MAX_COMPOSITE_VERTICES {
                return Err(FormatError::CompositeTooLarge);
            }

            if flags & MORE_COMPONENTS == 0 {
                return Ok(());
            }
        }
    }
}

fn f2dot14(v: i16) -> f32 {
    v as f32 / 16384.0
}

#[derive(Clone, Copy)]
struct Point {
    x: i32,
    y: i32,
    on_curve: bool,
}

impl Point {
    fn font_point(self) -> FontPoint {
        FontPoint::new(self.x as f32, self.y as f32)
    }

    fn midpoint(self, other: Self) -> FontPoint {
        FontPoint::new(((self.x + other.x) >> 1) as f32, ((self.y + other.y) >> 1) as f32)
    }
}

fn decode_points(data: &[u8], num_contours: usize) -> Result<(Vec<usize>, Vec<Point>), OutOfBounds> {
    let mut r = Reader::at(data, 10);
    let mut ends = Vec::with_capacity(num_contours);
    for _ in 0..num_contours {
        ends.push(r.u16()? as usize);
    }
    let instructions = r.u16()? as usize;
    r.skip(instructions)?;
    let num_points = ends.last().map_or(0, |&e| e + 1);

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = r.u8()?;
        let repeat = if flag & REPEAT != 0 { r.u8()? as usize } else { 0 };
        for _ in 0..=repeat {
            flags.push(flag);
        }
    }
    flags.truncate(num_points);

    let mut xs = Vec::with_capacity(num_points);
    let mut x = 0i32;
    for &flag in &flags {
        x = x.wrapping_add(delta(&mut r, flag, X_SHORT, X_SAME_OR_POSITIVE)?);
        xs.push(x as i16 as i32);
    }
    let mut points = Vec::with_capacity(num_points);
    let mut y = 0i32;
    for (&flag, x) in flags.iter().zip(xs) {
        y = y.wrapping_add(delta(&mut r, flag, Y_SHORT, Y_SAME_OR_POSITIVE)?);
        points.push(Point {
            x,
            y: y as i16 as i32,
            on_curve: flag & ON_CURVE != 0,
        });
    }
    Ok((ends, points))
}

fn delta(r: &mut Reader<'_>, flag: u8, short: u8, same_or_positive: u8) -> Result<i32, OutOfBounds> {
    Ok(if flag & short != 0 {
        let d = r.u8()? as i32;
        if flag & same_or_positive != 0 { d } else { -d }
    } else if flag & same_or_positive != 0 {
        0
    } else {
        r.i16()? as i32
    })
}

/// Emits the contours of a simple glyph. Runs of off-curve points get an
/// implied on-curve midpoint, and every contour is closed explicitly.
fn simple_outline(data: &[u8], num_contours: usize, sink: &mut impl OutlineSink) -> Result<(), OutOfBounds> {
    let (ends, points) = decode_points(data, num_contours)?;
    let mut start = 0;
    for end in ends {
        if end < start {
            continue;
        }
        let contour = points.get(start..=end).ok_or(OutOfBounds)?;
        start = end + 1;
        emit_contour(contour, sink);
    }
    Ok(())
}

fn emit_contour(contour: &[Point], sink: &mut impl OutlineSink) {
    let Some(&first) = contour.first() else {
        return;
    };
    // A contour may open on an off-curve point; it is kept as the closing
    // control point and the start moves to the next on-curve position.
    let (start, start_ctrl, rest) = if first.on_curve {
        (first.font_point(), None, &contour[1..])
    } else {
        match contour.get(1) {
            Some(&next) if !next.on_curve => (first.midpoint(next), Some(first), &contour[1..]),
            Some(&next) => (next.font_point(), Some(first), &contour[2..]),
            None => (first.font_point(), Some(first), &contour[1..]),
        }
    };
    sink.move_to(start);

    let mut ctrl: Option<Point> = None;
    for &p in rest {
        if p.on_curve {
            match ctrl.take() {
                Some(c) => sink.quad_to(c.font_point(), p.font_point()),
                None => sink.line_to(p.font_point()),
            }
        } else {
            if let Some(c) = ctrl {
                sink.quad_to(c.font_point(), c.midpoint(p));
            }
            ctrl = Some(p);
        }
    }

    match (start_ctrl, ctrl) {
        (Some(sc), Some(c)) => {
            sink.quad_to(c.font_point(), c.midpoint(sc));
            sink.quad_to(sc.font_point(), start);
        }
        (Some(sc), None) => sink.quad_to(sc.font_point(), start),
        (None, Some(c)) => sink.quad_to(c.font_point(), start),
        (None, None) => sink.line_to(start),
    }
}

pub(crate) fn glyph_outline(font: &FontInfo, glyph: GlyphId, out: &mut GlyphOutline) -> Result<(), OutlineError> {
    match GlyfTables::of(font) {
        Some(tables) => Ok(tables.append_outline(glyph, out)?),
        None => Ok(()),
    }
}

pub(crate) fn glyph_header_box(font: &FontInfo, glyph: GlyphId) -> Result<Option<Box2D<i32, FontUnit>>, OutOfBounds> {
    match GlyfTables::of(font) {
        Some(tables) => tables.header_box(glyph),
        None => Ok(None),
    }
}

pub(crate) fn is_empty(font: &FontInfo, glyph: GlyphId) -> bool {
    GlyfTables::of(font).is_none_or(|tables| tables.is_empty(glyph).unwrap_or(true))
}
