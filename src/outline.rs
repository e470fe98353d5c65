//! Glyph outlines as sequences of path operations in font design units.
//!
//! TrueType (`glyf`) and CFF (Type2 charstring) outlines are both decoded
//! into a [`GlyphOutline`]. Outlines are built on demand and never cached.

pub(crate) mod charstring;
pub(crate) mod glyf;

use euclid::{Box2D, Point2D};

use crate::error::OutlineError;
use crate::font::{FontInfo, Outlines};
use crate::glyph_id::GlyphId;

/// Coordinate space of font design units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FontUnit;

pub type FontPoint = Point2D<f32, FontUnit>;

/// One path operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Vertex {
    MoveTo(FontPoint),
    LineTo(FontPoint),
    QuadTo { ctrl: FontPoint, to: FontPoint },
    CubicTo { ctrl1: FontPoint, ctrl2: FontPoint, to: FontPoint },
}

impl Vertex {
    /// End point of the operation.
    pub fn to(&self) -> FontPoint {
        match *self {
            Self::MoveTo(p) | Self::LineTo(p) => p,
            Self::QuadTo { to, .. } | Self::CubicTo { to, .. } => to,
        }
    }

    fn map(self, f: impl Fn(FontPoint) -> FontPoint) -> Self {
        match self {
            Self::MoveTo(p) => Self::MoveTo(f(p)),
            Self::LineTo(p) => Self::LineTo(f(p)),
            Self::QuadTo { ctrl, to } => Self::QuadTo { ctrl: f(ctrl), to: f(to) },
            Self::CubicTo { ctrl1, ctrl2, to } => Self::CubicTo {
                ctrl1: f(ctrl1),
                ctrl2: f(ctrl2),
                to: f(to),
            },
        }
    }
}

/// Outline of one glyph. Each contour starts with [`Vertex::MoveTo`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphOutline {
    pub vertices: Vec<Vertex>,
}

impl GlyphOutline {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_contours(&self) -> usize {
        self.vertices
            .iter()
            .filter(|v| matches!(v, Vertex::MoveTo(_)))
            .count()
    }
}

/// Receives path operations while an outline is decoded.
pub(crate) trait OutlineSink {
    fn move_to(&mut self, p: FontPoint);
    fn line_to(&mut self, p: FontPoint);
    fn quad_to(&mut self, ctrl: FontPoint, to: FontPoint);
    fn cubic_to(&mut self, ctrl1: FontPoint, ctrl2: FontPoint, to: FontPoint);
}

impl OutlineSink for GlyphOutline {
    fn move_to(&mut self, p: FontPoint) {
        self.vertices.push(Vertex::MoveTo(p));
    }

    fn line_to(&mut self, p: FontPoint) {
        self.vertices.push(Vertex::LineTo(p));
    }

    fn quad_to(&mut self, ctrl: FontPoint, to: FontPoint) {
        self.vertices.push(Vertex::QuadTo { ctrl, to });
    }

    fn cubic_to(&mut self, ctrl1: FontPoint, ctrl2: FontPoint, to: FontPoint) {
        self.vertices.push(Vertex::CubicTo { ctrl1, ctrl2, to });
    }
}

/// Tracks the extent of every point, control points included.
#[derive(Default)]
pub(crate) struct BoundsSink {
    bounds: Option<Box2D<f32, FontUnit>>,
}

impl BoundsSink {
    fn track(&mut self, p: FontPoint) {
        self.bounds = Some(match self.bounds {
            None => Box2D::new(p, p),
            Some(b) => Box2D::new(b.min.min(p), b.max.max(p)),
        });
    }

    pub fn bounds(&self) -> Option<Box2D<f32, FontUnit>> {
        self.bounds
    }
}

impl OutlineSink for BoundsSink {
    fn move_to(&mut self, p: FontPoint) {
        self.track(p);
    }

    fn line_to(&mut self, p: FontPoint) {
        self.track(p);
    }

    fn quad_to(&mut self, ctrl: FontPoint, to: FontPoint) {
        self.track(ctrl);
        self.track(to);
    }

    fn cubic_to(&mut self, ctrl1: FontPoint, ctrl2: FontPoint, to: FontPoint) {
        self.track(ctrl1);
        self.track(ctrl2);
        self.track(to);
    }
}

/// Outline extraction
impl FontInfo {
    /// Decodes the outline of `glyph`.
    ///
    /// Glyphs without an outline (such as a space) yield an empty outline.
    /// Errors are scoped to this glyph; the font stays usable.
    pub fn glyph_shape(&self, glyph: GlyphId) -> Result<GlyphOutline, OutlineError> {
        let mut outline = GlyphOutline::default();
        match self.outlines() {
            Outlines::TrueType { .. } => glyf::glyph_outline(self, glyph, &mut outline)?,
            Outlines::Cff { table, tables } => {
                charstring::evaluate(self.table_bytes(table), tables, glyph, &mut outline)?
            }
        }
        Ok(outline)
    }

    pub fn codepoint_shape(&self, codepoint: u32) -> Result<GlyphOutline, OutlineError> {
        self.glyph_shape(self.glyph_index(codepoint))
    }

    /// Bounding box of `glyph` in font units, or `None` for empty glyphs.
    ///
    /// TrueType boxes come from the glyph header. CFF boxes are measured by
    /// running the charstring and include control points.
    pub fn glyph_box(&self, glyph: GlyphId) -> Result<Option<Box2D<i32, FontUnit>>, OutlineError> {
        match self.outlines() {
            Outlines::TrueType { .. } => Ok(glyf::glyph_header_box(self, glyph)?),
            Outlines::Cff { table, tables } => {
                let mut sink = BoundsSink::default();
                charstring::evaluate(self.table_bytes(table), tables, glyph, &mut sink)?;
                Ok(sink.bounds().map(|b| {
                    Box2D::new(
                        Point2D::new(b.min.x.floor() as i32, b.min.y.floor() as i32),
                        Point2D::new(b.max.x.ceil() as i32, b.max.y.ceil() as i32),
                    )
                }))
            }
        }
    }

    pub fn codepoint_box(&self, codepoint: u32) -> Result<Option<Box2D<i32, FontUnit>>, OutlineError> {
        self.glyph_box(self.glyph_index(codepoint))
    }

    /// Whether `glyph` has no outline at all.
    pub fn is_glyph_empty(&self, glyph: GlyphId) -> bool {
        match self.outlines() {
            Outlines::TrueType { .. } => glyf::is_empty(self, glyph),
            Outlines::Cff { .. } => self.glyph_box(glyph).map_or(true, |b| b.is_none()),
        }
    }
}
