//! Glyph atlas packing.
//!
//! A packing session gathers a rectangle for every requested glyph, packs
//! the rectangles with a [`Skyline`], then renders each glyph into its slot
//! of a shared 8-bit atlas. Gather, pack and render can be called
//! separately, several times over one [`PackContext`], to grow a single
//! atlas from several fonts or sizes.

pub mod prefilter;
pub mod skyline;

use euclid::{Box2D, Point2D, Vector2D};

use crate::error::AtlasSizeError;
use crate::font::FontInfo;
use crate::raster::{Bitmap, Pixel, box_extent};
use prefilter::{MAX_OVERSAMPLE, h_prefilter, oversample_shift, v_prefilter};
pub use skyline::{Heuristic, PackRect, Skyline};

/// Largest atlas side, bounded by the 16-bit slot coordinates of
/// [`PackedChar`].
pub const MAX_ATLAS_SIZE: u32 = u16::MAX as u32;

/// Texture coordinate space, `0.0..=1.0` across the atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Uv;

/// Settings for a packing session.
#[derive(Clone, Debug, PartialEq)]
pub struct PackConfig {
    /// Atlas size in pixels.
    pub width: u32,
    pub height: u32,
    /// Empty pixels kept between neighbouring glyphs.
    pub padding: u32,
    pub h_oversample: u32,
    pub v_oversample: u32,
    /// Give missing codepoints an empty slot instead of the missing glyph.
    pub skip_missing: bool,
    pub heuristic: Heuristic,
    /// Skyline node storage. Defaults to the usable atlas width.
    pub node_capacity: Option<usize>,
    pub allow_out_of_mem: bool,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            padding: 1,
            h_oversample: 1,
            v_oversample: 1,
            skip_missing: false,
            heuristic: Heuristic::default(),
            node_capacity: None,
            allow_out_of_mem: false,
        }
    }
}

/// Codepoints of one [`PackRange`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Codepoints {
    /// `count` consecutive codepoints starting at `first`.
    Range { first: u32, count: u32 },
    List(Vec<u32>),
}

impl Codepoints {
    pub fn len(&self) -> usize {
        match self {
            Self::Range { count, .. } => *count as usize,
            Self::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let (range, list) = match self {
            Self::Range { first, count } => (*first..first.saturating_add(*count), &[][..]),
            Self::List(list) => (0..0, list.as_slice()),
        };
        range.chain(list.iter().copied())
    }
}

/// Where a glyph landed in the atlas and how to place it on screen.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PackedChar {
    /// Slot in the atlas, in atlas pixels.
    pub atlas: Box2D<u16, Pixel>,
    /// Quad corners relative to the pen, y down.
    pub offset: Box2D<f32, Pixel>,
    pub x_advance: f32,
}

/// A screen quad and the atlas region to texture it with.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AlignedQuad {
    pub screen: Box2D<f32, Pixel>,
    pub uv: Box2D<f32, Uv>,
}

impl PackedChar {
    /// Quad for drawing this glyph at `pen` in a `atlas_width` x
    /// `atlas_height` atlas, then advances the pen.
    ///
    /// With `align_to_integer` the quad's top-left corner snaps to the
    /// nearest pixel.
    pub fn quad(
        &self,
        atlas_width: u32,
        atlas_height: u32,
        pen: &mut Point2D<f32, Pixel>,
        align_to_integer: bool,
    ) -> AlignedQuad {
        let screen = if align_to_integer {
            let origin = Point2D::new(
                (pen.x + self.offset.min.x + 0.5).floor(),
                (pen.y + self.offset.min.y + 0.5).floor(),
            );
            Box2D::new(origin, origin + self.offset.size())
        } else {
            self.offset.translate(pen.to_vector())
        };
        let (iw, ih) = (1.0 / atlas_width as f32, 1.0 / atlas_height as f32);
        let uv = Box2D::new(
            Point2D::new(self.atlas.min.x as f32 * iw, self.atlas.min.y as f32 * ih),
            Point2D::new(self.atlas.max.x as f32 * iw, self.atlas.max.y as f32 * ih),
        );
        pen.x += self.x_advance;
        AlignedQuad { screen, uv }
    }
}

/// Codepoints of one font size, and the packing results for them.
#[derive(Clone, Debug, PartialEq)]
pub struct PackRange {
    /// Pixel height if positive, em size if negative.
    pub font_size: f32,
    pub codepoints: Codepoints,
    /// One record per codepoint, filled by rendering.
    pub packed: Vec<PackedChar>,
    oversample: (u32, u32),
}

impl PackRange {
    pub fn new(font_size: f32, codepoints: Codepoints) -> Self {
        let packed = vec![PackedChar::default(); codepoints.len()];
        Self {
            font_size,
            codepoints,
            packed,
            oversample: (1, 1),
        }
    }

    /// Oversampling the range was gathered with.
    pub fn oversample(&self) -> (u32, u32) {
        self.oversample
    }
}

/// One atlas-building session.
#[derive(Clone, Debug)]
pub struct PackContext {
    width: u32,
    height: u32,
    padding: u32,
    h_oversample: u32,
    v_oversample: u32,
    skip_missing: bool,
    skyline: Skyline,
}

impl PackContext {
    /// Starts a session. Fails if either atlas side exceeds
    /// [`MAX_ATLAS_SIZE`].
    pub fn new(config: &PackConfig) -> Result<Self, AtlasSizeError> {
        if config.width > MAX_ATLAS_SIZE || config.height > MAX_ATLAS_SIZE {
            return Err(AtlasSizeError {
                width: config.width,
                height: config.height,
            });
        }
        let target_w = config.width.saturating_sub(config.padding);
        let target_h = config.height.saturating_sub(config.padding);
        let nodes = config.node_capacity.unwrap_or(target_w as usize);
        let mut skyline = Skyline::new(target_w, target_h, nodes);
        skyline.set_heuristic(config.heuristic);
        skyline.set_allow_out_of_mem(config.allow_out_of_mem);
        log::debug!(
            "pack session {}x{} padding {} with {} skyline nodes",
            config.width, config.height, config.padding, nodes
        );

        let mut context = Self {
            width: config.width,
            height: config.height,
            padding: config.padding,
            h_oversample: 1,
            v_oversample: 1,
            skip_missing: config.skip_missing,
            skyline,
        };
        context.set_oversampling(config.h_oversample, config.v_oversample);
        Ok(context)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Oversampling for ranges gathered from now on. Factors outside
    /// `1..=8` are ignored.
    pub fn set_oversampling(&mut self, h: u32, v: u32) {
        let valid = 1..=MAX_OVERSAMPLE;
        if valid.contains(&h) {
            self.h_oversample = h;
        } else {
            log::warn!("ignoring horizontal oversampling {h}");
        }
        if valid.contains(&v) {
            self.v_oversample = v;
        } else {
            log::warn!("ignoring vertical oversampling {v}");
        }
    }

    pub fn set_skip_missing(&mut self, skip: bool) {
        self.skip_missing = skip;
    }

    /// One rectangle per codepoint of `ranges`, in order, sized for the
    /// oversampled glyph plus padding.
    pub fn gather_rects(&self, font: &FontInfo, ranges: &mut [PackRange]) -> Vec<PackRect> {
        let mut rects = Vec::with_capacity(ranges.iter().map(|r| r.codepoints.len()).sum());
        let mut missing_added = false;
        for range in ranges.iter_mut() {
            let scale = font.scale_for_size(range.font_size);
            range.oversample = (self.h_oversample, self.v_oversample);
            let over_scale = Vector2D::new(scale * self.h_oversample as f32, scale * self.v_oversample as f32);
            for codepoint in range.codepoints.iter() {
                let glyph = font.glyph_index(codepoint);
                let id = rects.len();
                if glyph.is_notdef() && (self.skip_missing || missing_added) {
                    rects.push(PackRect::new(id, 0, 0));
                    continue;
                }
                let bbox = font
                    .glyph_bitmap_box_subpixel(glyph, over_scale, Vector2D::zero())
                    .unwrap_or_else(|err| {
                        log::warn!("glyph {glyph} of U+{codepoint:04X}: {err}");
                        Box2D::zero()
                    });
                // An unrepresentable box gets a rect no atlas can hold.
                let (w, h) = box_extent(&bbox).unwrap_or((u32::MAX, u32::MAX));
                let w = w.saturating_add(self.padding + self.h_oversample - 1);
                let h = h.saturating_add(self.padding + self.v_oversample - 1);
                rects.push(PackRect::new(id, w, h));
                missing_added |= glyph.is_notdef();
            }
        }
        rects
    }

    /// Places `rects` in the atlas. Returns whether all of them fit.
    pub fn pack_rects(&mut self, rects: &mut [PackRect]) -> bool {
        let all_packed = self.skyline.pack_rects(rects);
        if !all_packed {
            let unpacked = rects.iter().filter(|r| !r.was_packed).count();
            log::warn!("{unpacked} of {} rects did not fit the atlas", rects.len());
        }
        all_packed
    }

    /// Renders the glyphs of `ranges` into their packed `rects` and fills
    /// each range's [`PackRange::packed`] records.
    ///
    /// `atlas` must be at least the session size and start out cleared.
    /// Returns `false` if any codepoint has no usable slot.
    pub fn render_into_rects(
        &self,
        atlas: &mut Bitmap<'_>,
        font: &FontInfo,
        ranges: &mut [PackRange],
        rects: &mut [PackRect],
    ) -> bool {
        let mut all_rendered = true;
        let mut missing: Option<PackedChar> = None;
        let mut rects = rects.iter_mut();
        let pad = self.padding;
        let (atlas_w, atlas_h) = (atlas.width(), atlas.height());

        for range in ranges.iter_mut() {
            let scale = font.scale_for_size(range.font_size);
            let (h_over, v_over) = range.oversample;
            let over_scale = Vector2D::new(scale * h_over as f32, scale * v_over as f32);
            let recip = Vector2D::<f32, Pixel>::new(1.0 / h_over as f32, 1.0 / v_over as f32);
            let sub = Vector2D::<f32, Pixel>::new(oversample_shift(h_over), oversample_shift(v_over));
            range.packed.resize(range.codepoints.len(), PackedChar::default());

            for (codepoint, packed) in range.codepoints.iter().zip(range.packed.iter_mut()) {
                let Some(r) = rects.next() else {
                    return false;
                };
                let glyph = font.glyph_index(codepoint);
                if !r.was_packed {
                    all_rendered = false;
                    *packed = PackedChar::default();
                    continue;
                }
                let empty = r.w == 0 || r.h == 0;
                // Missing codepoints past the first share its record, or stay
                // empty when skipped.
                if empty && glyph.is_notdef() && (self.skip_missing || missing.is_some()) {
                    *packed = match missing {
                        Some(record) if !self.skip_missing => record,
                        _ => PackedChar::default(),
                    };
                    continue;
                }

                if !empty {
                    r.x += pad;
                    r.y += pad;
                    r.w = r.w.saturating_sub(pad);
                    r.h = r.h.saturating_sub(pad);

                    let Some(mut slot) = atlas.sub_bitmap(r.x, r.y, r.w, r.h) else {
                        log::warn!("slot of U+{codepoint:04X} lies outside a {atlas_w}x{atlas_h} atlas");
                        all_rendered = false;
                        continue;
                    };
                    let glyph_w = (r.w + 1).saturating_sub(h_over);
                    let glyph_h = (r.h + 1).saturating_sub(v_over);
                    if let Some(mut target) = slot.sub_bitmap(0, 0, glyph_w, glyph_h)
                        && let Err(err) = font.make_glyph_bitmap(&mut target, glyph, over_scale, Vector2D::zero())
                    {
                        log::warn!("rendering glyph {glyph} of U+{codepoint:04X} empty: {err}");
                    }
                    if h_over > 1 {
                        h_prefilter(&mut slot, h_over);
                    }
                    if v_over > 1 {
                        v_prefilter(&mut slot, v_over);
                    }
                }

                let slot_corners = (
                    u16::try_from(r.x),
                    u16::try_from(r.y),
                    r.x.checked_add(r.w).map(u16::try_from),
                    r.y.checked_add(r.h).map(u16::try_from),
                );
                let (Ok(x0), Ok(y0), Some(Ok(x1)), Some(Ok(y1))) = slot_corners else {
                    log::warn!("slot of U+{codepoint:04X} is beyond 16-bit atlas coordinates");
                    all_rendered = false;
                    *packed = PackedChar::default();
                    continue;
                };

                let bbox = font.glyph_bitmap_box(glyph, over_scale).unwrap_or_else(|_| Box2D::zero());
                let min = bbox.min.to_f32();
                let size = Vector2D::<f32, Pixel>::new(r.w as f32, r.h as f32);
                *packed = PackedChar {
                    atlas: Box2D::new(Point2D::new(x0, y0), Point2D::new(x1, y1)),
                    offset: Box2D::new(
                        Point2D::new(min.x * recip.x + sub.x, min.y * recip.y + sub.y),
                        Point2D::new((min.x + size.x) * recip.x + sub.x, (min.y + size.y) * recip.y + sub.y),
                    ),
                    x_advance: scale * font.h_metrics(glyph).advance_width as f32,
                };
                if glyph.is_notdef() && missing.is_none() {
                    missing = Some(*packed);
                }
            }
        }
        all_rendered
    }

    /// Gathers, packs and renders `ranges` in one go.
    pub fn pack_font_ranges(&mut self, atlas: &mut Bitmap<'_>, font: &FontInfo, ranges: &mut [PackRange]) -> bool {
        let mut rects = self.gather_rects(font, ranges);
        let all_packed = self.pack_rects(&mut rects);
        let all_rendered = self.render_into_rects(atlas, font, ranges, &mut rects);
        all_packed && all_rendered
    }
}
