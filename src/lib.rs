//! # Suzuri Raster
//!
//! A TrueType/OpenType glyph rasterizer and texture atlas packer.
//!
//! ## Overview
//!
//! Everything starts from a [`FontBlob`], the raw bytes of a font file or
//! collection. [`FontInfo::load`] parses one face of it; from there glyphs
//! can be resolved from codepoints, extracted as outlines (`glyf` quadratic
//! contours or CFF Type2 charstrings), flattened and rasterized into 8-bit
//! coverage bitmaps. The [`pack`] module packs many glyphs into one atlas
//! and records where each one landed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use suzuri_raster::{Bitmap, FontBlob, FontInfo};
//! use suzuri_raster::pack::{Codepoints, PackConfig, PackContext, PackRange};
//!
//! let blob = FontBlob::from(std::fs::read("font.ttf").unwrap());
//! let font = FontInfo::load(&blob, 0).unwrap();
//!
//! // 1. Configure the atlas
//! let config = PackConfig { width: 512, height: 512, ..PackConfig::default() };
//! let mut context = PackContext::new(&config).unwrap();
//! context.set_oversampling(2, 2);
//!
//! // 2. Pack printable ASCII at 32px
//! let mut ranges = [PackRange::new(32.0, Codepoints::Range { first: 32, count: 95 })];
//! let mut pixels = vec![0u8; 512 * 512];
//! let mut atlas = Bitmap::new(512, 512, 512, &mut pixels).unwrap();
//! context.pack_font_ranges(&mut atlas, &font, &mut ranges);
//!
//! // 3. Draw with ranges[0].packed[i].quad(...)
//! ```
//!
//! ## Features
//!
//! *   **Font parsing**: plain fonts and collections, cmap formats 0/4/6/12/13, metrics and kerning.
//! *   **Outlines**: simple and composite TrueType glyphs, CFF and CID-keyed CFF charstrings.
//! *   **Rasterization**: adaptive curve flattening and exact-area anti-aliasing.
//! *   **Atlas packing**: skyline bin packing with oversampling prefilters.
//! *   **Untrusted input**: malformed data yields errors, never panics.

pub mod error;
pub mod font;
pub mod font_storage;
pub mod glyph_id;
pub mod outline;
pub mod pack;
pub mod raster;

#[cfg(test)]
mod testing;

// common re-exports
pub use error::{AtlasSizeError, BitmapError, CharstringError, FormatError, LoadError, OutlineError};
pub use font::{FontBlob, FontInfo, HMetrics, Tag, VMetrics};
pub use font_storage::{FontId, FontStorage};
pub use glyph_id::GlyphId;
pub use outline::{FontPoint, FontUnit, GlyphOutline, Vertex};
pub use raster::{Bitmap, GlyphBitmap, Pixel};

// re-export dependencies
pub use euclid;
