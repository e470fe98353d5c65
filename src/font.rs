//! Font blob and table directory parsing.
//!
//! A [`FontBlob`] is the immutable bytes of one font file, possibly a
//! TrueType collection. [`FontInfo::load`] walks the table directory of one
//! face once and caches the offsets every later query needs.

pub(crate) mod cff;
pub(crate) mod cmap;
pub(crate) mod kern;
pub(crate) mod reader;

use std::ops::Range;
use std::sync::Arc;

use euclid::{Box2D, Point2D};

use crate::error::{FormatError, OutOfBounds};
use crate::glyph_id::GlyphId;
use crate::outline::FontUnit;
use cff::CffTables;
use reader::{i16_at, tag_at, u16_at, u32_at};

/// A 4-byte table tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const CMAP: Self = Self(*b"cmap");
    pub const HEAD: Self = Self(*b"head");
    pub const HHEA: Self = Self(*b"hhea");
    pub const HMTX: Self = Self(*b"hmtx");
    pub const MAXP: Self = Self(*b"maxp");
    pub const GLYF: Self = Self(*b"glyf");
    pub const LOCA: Self = Self(*b"loca");
    pub const CFF: Self = Self(*b"CFF ");
    pub const KERN: Self = Self(*b"kern");
    pub const GPOS: Self = Self(*b"GPOS");
    pub const OS2: Self = Self(*b"OS/2");
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Raw bytes of one font file, shared and read-only.
///
/// Cloning is cheap. Several [`FontInfo`]s may borrow the same blob from
/// different threads.
#[derive(Clone, Debug)]
pub struct FontBlob(Arc<[u8]>);

impl FontBlob {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn is_collection(&self) -> bool {
        let data = self.as_bytes();
        tag_at(data, 0) == Ok(*b"ttcf")
            && matches!(u32_at(data, 4), Ok(0x0001_0000 | 0x0002_0000))
    }

    /// Number of faces in the blob: 1 for a plain font, the directory size
    /// for a collection, 0 when the data is not a font.
    pub fn num_fonts(&self) -> usize {
        if is_font(self.as_bytes()) {
            1
        } else if self.is_collection() {
            u32_at(self.as_bytes(), 8).map_or(0, |n| n as usize)
        } else {
            0
        }
    }

    /// Byte offset of face `index`, or `None` if there is no such face.
    pub fn offset_for_index(&self, index: usize) -> Option<usize> {
        let data = self.as_bytes();
        if is_font(data) {
            return (index == 0).then_some(0);
        }
        if self.is_collection() {
            let count = u32_at(data, 8).ok()? as usize;
            if index >= count {
                return None;
            }
            return u32_at(data, 12 + index * 4).ok().map(|o| o as usize);
        }
        None
    }
}

impl From<Vec<u8>> for FontBlob {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

fn is_font(data: &[u8]) -> bool {
    matches!(
        tag_at(data, 0),
        Ok([b'1', 0, 0, 0] | [0, 1, 0, 0] | [b't', b'y', b'p', b'1'] | [b'O', b'T', b'T', b'O'] | [b't', b'r', b'u', b'e'])
    )
}

fn find_table(data: &[u8], font_start: usize, tag: Tag) -> Result<Option<Range<usize>>, OutOfBounds> {
    let num_tables = u16_at(data, font_start + 4)? as usize;
    let directory = font_start + 12;
    for i in 0..num_tables {
        let record = directory + 16 * i;
        if tag_at(data, record)? == tag.0 {
            let offset = u32_at(data, record + 8)? as usize;
            let length = u32_at(data, record + 12)? as usize;
            let end = offset.checked_add(length).ok_or(OutOfBounds)?;
            if end > data.len() {
                return Err(OutOfBounds);
            }
            return Ok(Some(offset..end));
        }
    }
    Ok(None)
}

/// Where the glyph outlines of a face live.
#[derive(Clone, Debug)]
pub(crate) enum Outlines {
    TrueType {
        glyf: Range<usize>,
        loca: Range<usize>,
        long_offsets: bool,
    },
    Cff {
        table: Range<usize>,
        tables: CffTables,
    },
}

/// Horizontal metrics of one glyph, in font units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HMetrics {
    pub advance_width: i32,
    pub left_side_bearing: i32,
}

/// Vertical metrics of a face, in font units.
///
/// `descent` is usually negative. The baseline-to-baseline distance is
/// `ascent - descent + line_gap`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VMetrics {
    pub ascent: i32,
    pub descent: i32,
    pub line_gap: i32,
}

/// Offsets of one face inside a [`FontBlob`], parsed once at load time.
#[derive(Clone, Debug)]
pub struct FontInfo {
    blob: FontBlob,
    font_start: usize,
    num_glyphs: usize,
    units_per_em: u16,

    cmap: Range<usize>,
    cmap_subtable: usize,
    head: Range<usize>,
    hhea: Range<usize>,
    hmtx: Range<usize>,
    kern: Option<Range<usize>>,
    gpos: Option<Range<usize>>,
    os2: Option<Range<usize>>,

    outlines: Outlines,
}

impl FontInfo {
    /// Loads face `index` of `blob`.
    pub fn load(blob: &FontBlob, index: usize) -> Result<Self, FormatError> {
        let offset = blob
            .offset_for_index(index)
            .ok_or(if blob.num_fonts() == 0 {
                FormatError::UnknownMagic
            } else {
                FormatError::FontIndexOutOfRange(index)
            })?;
        Self::load_at(blob, offset)
    }

    /// Loads the face whose table directory starts at `font_start`.
    pub fn load_at(blob: &FontBlob, font_start: usize) -> Result<Self, FormatError> {
        let data = blob.as_bytes();
        let table = |tag| find_table(data, font_start, tag);
        let required = |tag| -> Result<Range<usize>, FormatError> {
            table(tag)?.ok_or(FormatError::MissingTable(tag))
        };

        let cmap = required(Tag::CMAP)?;
        let head = required(Tag::HEAD)?;
        let hhea = required(Tag::HHEA)?;
        let hmtx = required(Tag::HMTX)?;

        let outlines = match table(Tag::GLYF)? {
            Some(glyf) => {
                let loca = required(Tag::LOCA)?;
                let format = i16_at(&data[head.clone()], 50)?;
                if !matches!(format, 0 | 1) {
                    return Err(FormatError::UnsupportedLocaFormat(format));
                }
                Outlines::TrueType {
                    glyf,
                    loca,
                    long_offsets: format == 1,
                }
            }
            None => {
                let cff = table(Tag::CFF)?.ok_or(FormatError::MissingTable(Tag::GLYF))?;
                let tables = CffTables::parse(&data[cff.clone()])?;
                Outlines::Cff { table: cff, tables }
            }
        };

        let num_glyphs = match table(Tag::MAXP)? {
            Some(maxp) => u16_at(&data[maxp], 4)? as usize,
            None => 0xffff,
        };
        let cmap_subtable = cmap::find_unicode_subtable(&data[cmap.clone()])?
            .ok_or(FormatError::NoUnicodeCmap)?;
        let units_per_em = u16_at(&data[head.clone()], 18)?;

        let info = Self {
            blob: blob.clone(),
            font_start,
            num_glyphs,
            units_per_em,
            cmap,
            cmap_subtable,
            head,
            hhea,
            hmtx,
            kern: table(Tag::KERN)?,
            gpos: table(Tag::GPOS)?,
            os2: table(Tag::OS2)?,
            outlines,
        };
        log::debug!(
            "loaded font at offset {}: {} glyphs, {} outlines",
            font_start,
            info.num_glyphs,
            if info.is_cff() { "CFF" } else { "TrueType" }
        );
        Ok(info)
    }

    pub fn blob(&self) -> &FontBlob {
        &self.blob
    }

    pub(crate) fn data(&self) -> &[u8] {
        self.blob.as_bytes()
    }

    pub(crate) fn outlines(&self) -> &Outlines {
        &self.outlines
    }

    pub(crate) fn table_bytes(&self, range: &Range<usize>) -> &[u8] {
        &self.data()[range.clone()]
    }

    pub fn font_start(&self) -> usize {
        self.font_start
    }

    pub fn num_glyphs(&self) -> usize {
        self.num_glyphs
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn is_cff(&self) -> bool {
        matches!(self.outlines, Outlines::Cff { .. })
    }
}

/// Glyph lookup
impl FontInfo {
    /// Resolves `codepoint` through the font's Unicode cmap.
    ///
    /// Returns [`GlyphId::NOTDEF`] when the font has no glyph for it.
    pub fn glyph_index(&self, codepoint: u32) -> GlyphId {
        cmap::glyph_index(self.table_bytes(&self.cmap), self.cmap_subtable, codepoint)
    }

    pub fn has_glyph(&self, codepoint: u32) -> bool {
        !self.glyph_index(codepoint).is_notdef()
    }
}

/// Metrics
impl FontInfo {
    pub fn v_metrics(&self) -> VMetrics {
        let hhea = self.table_bytes(&self.hhea);
        VMetrics {
            ascent: i16_at(hhea, 4).unwrap_or(0) as i32,
            descent: i16_at(hhea, 6).unwrap_or(0) as i32,
            line_gap: i16_at(hhea, 8).unwrap_or(0) as i32,
        }
    }

    /// Typographic metrics from `OS/2`, if the font has that table.
    pub fn typo_v_metrics(&self) -> Option<VMetrics> {
        let os2 = self.table_bytes(self.os2.as_ref()?);
        Some(VMetrics {
            ascent: i16_at(os2, 68).ok()? as i32,
            descent: i16_at(os2, 70).ok()? as i32,
            line_gap: i16_at(os2, 72).ok()? as i32,
        })
    }

    pub fn h_metrics(&self, glyph: GlyphId) -> HMetrics {
        let hhea = self.table_bytes(&self.hhea);
        let hmtx = self.table_bytes(&self.hmtx);
        let num_long = u16_at(hhea, 34).unwrap_or(0) as usize;
        let gid = glyph.to_u16() as usize;
        let metrics = if gid < num_long {
            (u16_at(hmtx, 4 * gid), i16_at(hmtx, 4 * gid + 2))
        } else if num_long > 0 {
            // Trailing glyphs share the last advance and store only a bearing.
            (
                u16_at(hmtx, 4 * (num_long - 1)),
                i16_at(hmtx, 4 * num_long + 2 * (gid - num_long)),
            )
        } else {
            return HMetrics::default();
        };
        HMetrics {
            advance_width: metrics.0.unwrap_or(0) as i32,
            left_side_bearing: metrics.1.unwrap_or(0) as i32,
        }
    }

    pub fn codepoint_h_metrics(&self, codepoint: u32) -> HMetrics {
        self.h_metrics(self.glyph_index(codepoint))
    }

    /// Bounding box of all glyphs, from `head`.
    pub fn bounding_box(&self) -> Box2D<i32, FontUnit> {
        let head = self.table_bytes(&self.head);
        let v = |offset| i16_at(head, offset).unwrap_or(0) as i32;
        Box2D::new(Point2D::new(v(36), v(38)), Point2D::new(v(40), v(42)))
    }

    /// Scale that maps `ascent - descent` to `pixels`.
    pub fn scale_for_pixel_height(&self, pixels: f32) -> f32 {
        let VMetrics { ascent, descent, .. } = self.v_metrics();
        let height = (ascent - descent) as f32;
        if height == 0.0 { 0.0 } else { pixels / height }
    }

    /// Scale that maps one em to `pixels`.
    pub fn scale_for_mapping_em_to_pixels(&self, pixels: f32) -> f32 {
        if self.units_per_em == 0 {
            0.0
        } else {
            pixels / self.units_per_em as f32
        }
    }

    /// Scale for a requested font size: positive sizes are pixel heights,
    /// negative sizes are em sizes.
    pub fn scale_for_size(&self, size: f32) -> f32 {
        if size > 0.0 {
            self.scale_for_pixel_height(size)
        } else {
            self.scale_for_mapping_em_to_pixels(-size)
        }
    }
}

/// Kerning
impl FontInfo {
    /// Additional advance between `left` and `right`, in font units.
    ///
    /// GPOS pair adjustments take precedence over the legacy `kern` table.
    pub fn glyph_kern_advance(&self, left: GlyphId, right: GlyphId) -> i32 {
        if let Some(gpos) = &self.gpos {
            kern::gpos_advance(self.table_bytes(gpos), left, right)
        } else if let Some(table) = &self.kern {
            kern::kern_advance(self.table_bytes(table), left, right)
        } else {
            0
        }
    }

    pub fn codepoint_kern_advance(&self, left: u32, right: u32) -> i32 {
        if self.gpos.is_none() && self.kern.is_none() {
            return 0;
        }
        self.glyph_kern_advance(self.glyph_index(left), self.glyph_index(right))
    }
}
