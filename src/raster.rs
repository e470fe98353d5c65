//! Coverage bitmaps: flattening outlines and rasterizing them with exact
//! anti-aliasing.

pub mod flatten;
pub(crate) mod scanline;

use euclid::{Box2D, Point2D, Vector2D};

use crate::error::{BitmapError, OutlineError};
use crate::font::FontInfo;
use crate::glyph_id::GlyphId;
use crate::outline::Vertex;
use flatten::flatten;
pub use scanline::rasterize as rasterize_contours;

/// Coordinate space of bitmap pixels, y pointing down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pixel;

/// Curve tolerance used for glyph bitmaps, in pixels.
pub const GLYPH_FLATNESS: f32 = 0.35;

/// A caller-owned 8-bit coverage buffer.
///
/// Row `y` starts at `y * stride`; only the first `width` bytes of a row
/// are written.
#[derive(Debug)]
pub struct Bitmap<'a> {
    width: u32,
    height: u32,
    stride: usize,
    pixels: &'a mut [u8],
}

impl<'a> Bitmap<'a> {
    pub fn new(width: u32, height: u32, stride: usize, pixels: &'a mut [u8]) -> Result<Self, BitmapError> {
        let err = BitmapError {
            width,
            height,
            stride,
            len: pixels.len(),
        };
        let needed = match height {
            0 => Some(0),
            h => (h as usize - 1)
                .checked_mul(stride)
                .and_then(|n| n.checked_add(width as usize)),
        };
        if stride < width as usize || needed.is_none_or(|n| n > pixels.len()) {
            return Err(err);
        }
        Ok(Self {
            width,
            height,
            stride,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pixels(&self) -> &[u8] {
        self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.pixels
    }

    /// A view of the `width` x `height` region whose top-left pixel is
    /// at (`x`, `y`). Returns `None` if the region does not fit.
    pub fn sub_bitmap(&mut self, x: u32, y: u32, width: u32, height: u32) -> Option<Bitmap<'_>> {
        if x.checked_add(width)? > self.width || y.checked_add(height)? > self.height {
            return None;
        }
        let start = y as usize * self.stride + x as usize;
        let end = if height == 0 {
            start
        } else {
            start + (height as usize - 1) * self.stride + width as usize
        };
        Some(Bitmap {
            width,
            height,
            stride: self.stride,
            pixels: &mut self.pixels[start..end],
        })
    }

    pub(crate) fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.pixels[y * self.stride..][..self.width as usize]
    }
}

/// An owned glyph bitmap together with where it sits relative to the pen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    /// Offset of the top-left pixel from the glyph origin, y down.
    pub offset: Vector2D<i32, Pixel>,
    pub pixels: Vec<u8>,
}

/// Width and height of a pixel box, clamped at zero. `None` when the
/// extent does not fit an `i32`.
pub(crate) fn box_extent(bbox: &Box2D<i32, Pixel>) -> Option<(u32, u32)> {
    let w = bbox.max.x.checked_sub(bbox.min.x)?.max(0);
    let h = bbox.max.y.checked_sub(bbox.min.y)?.max(0);
    Some((w as u32, h as u32))
}

/// Flattens `vertices` and rasterizes them into `bitmap`.
///
/// Font-space points are mapped by `p * scale + shift`, with y negated
/// first when `invert` is set. `offset` is the pixel position of the
/// bitmap's top-left corner in the mapped space. `flatness` is in pixels.
pub fn rasterize(
    bitmap: &mut Bitmap<'_>,
    flatness: f32,
    vertices: &[Vertex],
    scale: Vector2D<f32, Pixel>,
    shift: Vector2D<f32, Pixel>,
    offset: Point2D<i32, Pixel>,
    invert: bool,
) {
    let min_scale = scale.x.min(scale.y);
    if min_scale == 0.0 {
        return;
    }
    let contours = flatten(vertices, flatness / min_scale);
    scanline::rasterize(bitmap, &contours, scale, shift, offset, invert);
}

/// Glyph bitmaps
impl FontInfo {
    /// Pixel box covering `glyph` at `scale`, y pointing down.
    pub fn glyph_bitmap_box(&self, glyph: GlyphId, scale: Vector2D<f32, Pixel>) -> Result<Box2D<i32, Pixel>, OutlineError> {
        self.glyph_bitmap_box_subpixel(glyph, scale, Vector2D::zero())
    }

    /// Pixel box covering `glyph` at `scale`, moved by a subpixel `shift`.
    pub fn glyph_bitmap_box_subpixel(
        &self,
        glyph: GlyphId,
        scale: Vector2D<f32, Pixel>,
        shift: Vector2D<f32, Pixel>,
    ) -> Result<Box2D<i32, Pixel>, OutlineError> {
        let Some(b) = self.glyph_box(glyph)? else {
            return Ok(Box2D::zero());
        };
        Ok(Box2D::new(
            Point2D::new(
                (b.min.x as f32 * scale.x + shift.x).floor() as i32,
                (-b.max.y as f32 * scale.y + shift.y).floor() as i32,
            ),
            Point2D::new(
                (b.max.x as f32 * scale.x + shift.x).ceil() as i32,
                (-b.min.y as f32 * scale.y + shift.y).ceil() as i32,
            ),
        ))
    }

    pub fn codepoint_bitmap_box(&self, codepoint: u32, scale: Vector2D<f32, Pixel>) -> Result<Box2D<i32, Pixel>, OutlineError> {
        self.glyph_bitmap_box(self.glyph_index(codepoint), scale)
    }

    /// Renders `glyph` into `bitmap`, whose top-left corner is the top-left
    /// of the glyph's bitmap box.
    pub fn make_glyph_bitmap(
        &self,
        bitmap: &mut Bitmap<'_>,
        glyph: GlyphId,
        scale: Vector2D<f32, Pixel>,
        shift: Vector2D<f32, Pixel>,
    ) -> Result<(), OutlineError> {
        let outline = self.glyph_shape(glyph)?;
        let bbox = self.glyph_bitmap_box_subpixel(glyph, scale, shift)?;
        if bitmap.width() > 0 && bitmap.height() > 0 {
            rasterize(bitmap, GLYPH_FLATNESS, &outline.vertices, scale, shift, bbox.min, true);
        }
        Ok(())
    }

    pub fn make_codepoint_bitmap(
        &self,
        bitmap: &mut Bitmap<'_>,
        codepoint: u32,
        scale: Vector2D<f32, Pixel>,
        shift: Vector2D<f32, Pixel>,
    ) -> Result<(), OutlineError> {
        self.make_glyph_bitmap(bitmap, self.glyph_index(codepoint), scale, shift)
    }

    /// Allocates and renders a bitmap of `glyph`.
    ///
    /// A zero scale on one axis falls back to the other; with both zero the
    /// bitmap is empty.
    pub fn glyph_bitmap(
        &self,
        glyph: GlyphId,
        mut scale: Vector2D<f32, Pixel>,
        shift: Vector2D<f32, Pixel>,
    ) -> Result<GlyphBitmap, OutlineError> {
        if scale.x == 0.0 {
            scale.x = scale.y;
        }
        if scale.y == 0.0 {
            scale.y = scale.x;
        }
        if scale.x == 0.0 {
            return Ok(GlyphBitmap::default());
        }

        let outline = self.glyph_shape(glyph)?;
        let bbox = self.glyph_bitmap_box_subpixel(glyph, scale, shift)?;
        let (width, height) = box_extent(&bbox).ok_or(OutlineError::BitmapOverflow)?;
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or(OutlineError::BitmapOverflow)?;
        let mut pixels = vec![0u8; len];
        if width > 0 && height > 0 {
            let mut bitmap = Bitmap {
                width,
                height,
                stride: width as usize,
                pixels: &mut pixels,
            };
            rasterize(&mut bitmap, GLYPH_FLATNESS, &outline.vertices, scale, shift, bbox.min, true);
        }
        Ok(GlyphBitmap {
            width,
            height,
            offset: bbox.min.to_vector(),
            pixels,
        })
    }

    pub fn codepoint_bitmap(
        &self,
        codepoint: u32,
        scale: Vector2D<f32, Pixel>,
        shift: Vector2D<f32, Pixel>,
    ) -> Result<GlyphBitmap, OutlineError> {
        self.glyph_bitmap(self.glyph_index(codepoint), scale, shift)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontBlob;
    use crate::outline::FontPoint;
    use crate::testing::{cff_square_font, square_font};

    fn scale(s: f32) -> Vector2D<f32, Pixel> {
        Vector2D::new(s, s)
    }

    #[test]
    fn rejects_short_buffers() {
        let mut pixels = vec![0u8; 10];
        assert!(Bitmap::new(4, 3, 4, &mut pixels).is_err());
        assert!(Bitmap::new(4, 2, 3, &mut pixels).is_err());
        assert!(Bitmap::new(4, 3, 3, &mut pixels).is_err());
        assert!(Bitmap::new(2, 3, 4, &mut pixels).is_ok());
        assert!(Bitmap::new(0, 0, 0, &mut []).is_ok());
    }

    #[test]
    fn sub_bitmap_is_bounds_checked() {
        let mut pixels = vec![0u8; 64];
        let mut atlas = Bitmap::new(8, 8, 8, &mut pixels).unwrap();
        assert!(atlas.sub_bitmap(6, 6, 3, 1).is_none());
        let mut sub = atlas.sub_bitmap(2, 3, 2, 2).unwrap();
        sub.row_mut(1).fill(9);
        assert_eq!(&pixels[4 * 8 + 2..4 * 8 + 4], &[9, 9]);
        assert_eq!(pixels.iter().filter(|&&p| p == 9).count(), 2);
    }

    #[test]
    fn square_at_unit_scale_is_solid() {
        let square = [
            Vertex::MoveTo(FontPoint::new(0.0, 0.0)),
            Vertex::LineTo(FontPoint::new(0.0, 10.0)),
            Vertex::LineTo(FontPoint::new(10.0, 10.0)),
            Vertex::LineTo(FontPoint::new(10.0, 0.0)),
            Vertex::LineTo(FontPoint::new(0.0, 0.0)),
        ];
        let mut pixels = vec![0u8; 100];
        let mut bitmap = Bitmap::new(10, 10, 10, &mut pixels).unwrap();
        rasterize(&mut bitmap, 0.35, &square, scale(1.0), Vector2D::zero(), Point2D::origin(), false);
        assert!(pixels.iter().all(|&p| p == 255));
    }

    #[test]
    fn flattened_contours_rasterize_directly() {
        let triangle = [
            Vertex::MoveTo(FontPoint::new(0.0, 0.0)),
            Vertex::QuadTo { ctrl: FontPoint::new(4.0, 12.0), to: FontPoint::new(8.0, 0.0) },
            Vertex::LineTo(FontPoint::new(0.0, 0.0)),
        ];
        let mut expected = vec![0u8; 64];
        let mut bitmap = Bitmap::new(8, 8, 8, &mut expected).unwrap();
        rasterize(&mut bitmap, 0.35, &triangle, scale(1.0), Vector2D::zero(), Point2D::new(0, -8), true);

        let contours = flatten(&triangle, 0.35);
        let mut pixels = vec![0u8; 64];
        let mut bitmap = Bitmap::new(8, 8, 8, &mut pixels).unwrap();
        rasterize_contours(&mut bitmap, &contours, scale(1.0), Vector2D::zero(), Point2D::new(0, -8), true);
        assert_eq!(pixels, expected);
        assert!(pixels.iter().any(|&p| p == 255));
    }

    #[test]
    fn extreme_scale_overflow_is_an_error() {
        let font = FontInfo::load(&FontBlob::new(square_font()), 0).unwrap();
        let err = font.codepoint_bitmap('A' as u32, scale(1e30), Vector2D::zero()).unwrap_err();
        assert_eq!(err, OutlineError::BitmapOverflow);
        let bbox = Box2D::new(Point2D::new(i32::MIN, 0), Point2D::new(i32::MAX, 5));
        assert_eq!(box_extent(&bbox), None);
        let inverted = Box2D::new(Point2D::new(4, 4), Point2D::new(1, 9));
        assert_eq!(box_extent(&inverted), Some((0, 5)));
    }

    #[test]
    fn bitmap_box_flips_y() {
        let font = FontInfo::load(&FontBlob::new(square_font()), 0).unwrap();
        let bbox = font.codepoint_bitmap_box('A' as u32, scale(0.01)).unwrap();
        assert_eq!(bbox, Box2D::new(Point2D::new(0, -7), Point2D::new(7, 0)));
        let shifted = font
            .glyph_bitmap_box_subpixel(font.glyph_index('A' as u32), scale(0.01), Vector2D::new(0.5, 0.0))
            .unwrap();
        assert_eq!(shifted.min.x, 0);
        assert_eq!(shifted.max.x, 8);
    }

    #[test]
    fn glyph_bitmap_of_square() {
        for data in [square_font(), cff_square_font()] {
            let font = FontInfo::load(&FontBlob::new(data), 0).unwrap();
            let bitmap = font.codepoint_bitmap('A' as u32, scale(0.01), Vector2D::zero()).unwrap();
            assert_eq!((bitmap.width, bitmap.height), (7, 7));
            assert_eq!(bitmap.offset, Vector2D::new(0, -7));
            assert!(bitmap.pixels.iter().all(|&p| p == 255), "{:?}", bitmap.pixels);
        }
    }

    #[test]
    fn zero_scale_falls_back_to_other_axis() {
        let font = FontInfo::load(&FontBlob::new(square_font()), 0).unwrap();
        let a = font.codepoint_bitmap('A' as u32, Vector2D::new(0.0, 0.01), Vector2D::zero()).unwrap();
        assert_eq!((a.width, a.height), (7, 7));
        let none = font.codepoint_bitmap('A' as u32, Vector2D::zero(), Vector2D::zero()).unwrap();
        assert_eq!(none, GlyphBitmap::default());
    }

    #[test]
    fn empty_glyph_has_empty_bitmap() {
        let font = FontInfo::load(&FontBlob::new(square_font()), 0).unwrap();
        let space = font.codepoint_bitmap(' ' as u32, scale(0.02), Vector2D::zero()).unwrap();
        assert_eq!((space.width, space.height), (0, 0));
        assert!(space.pixels.is_empty());
    }

    #[test]
    fn make_glyph_bitmap_writes_caller_buffer() {
        let font = FontInfo::load(&FontBlob::new(square_font()), 0).unwrap();
        let mut pixels = vec![0u8; 7 * 7];
        let mut bitmap = Bitmap::new(7, 7, 7, &mut pixels).unwrap();
        font.make_codepoint_bitmap(&mut bitmap, 'A' as u32, scale(0.01), Vector2D::zero()).unwrap();
        assert!(pixels.iter().all(|&p| p == 255));
    }
}
