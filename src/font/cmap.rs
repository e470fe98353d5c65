//! Codepoint to glyph index lookup over `cmap` subtables.
//!
//! Every lookup failure, including malformed subtables, resolves to
//! [`GlyphId::NOTDEF`]. A missing glyph is a normal outcome, never an error.

use crate::error::OutOfBounds;
use crate::font::reader::{i16_at, u8_at, u16_at, u32_at};
use crate::glyph_id::GlyphId;

const PLATFORM_UNICODE: u16 = 0;
const PLATFORM_MICROSOFT: u16 = 3;
const MS_ENCODING_UNICODE_BMP: u16 = 1;
const MS_ENCODING_UNICODE_FULL: u16 = 10;

/// Picks the Unicode subtable of a `cmap` table.
///
/// Returns the subtable offset relative to `cmap`. Microsoft Unicode
/// encodings and any Unicode-platform record are accepted; the last matching
/// record in the table wins.
pub(crate) fn find_unicode_subtable(cmap: &[u8]) -> Result<Option<usize>, OutOfBounds> {
    let num_tables = u16_at(cmap, 2)? as usize;
    let mut found = None;
    for i in 0..num_tables {
        let record = 4 + 8 * i;
        let platform = u16_at(cmap, record)?;
        let encoding = u16_at(cmap, record + 2)?;
        let is_unicode = match platform {
            PLATFORM_MICROSOFT => {
                matches!(encoding, MS_ENCODING_UNICODE_BMP | MS_ENCODING_UNICODE_FULL)
            }
            PLATFORM_UNICODE => true,
            _ => false,
        };
        if is_unicode {
            found = Some(u32_at(cmap, record + 4)? as usize);
        }
    }
    Ok(found)
}

/// Maps `codepoint` through the subtable starting at `subtable` in `cmap`.
pub(crate) fn glyph_index(cmap: &[u8], subtable: usize, codepoint: u32) -> GlyphId {
    lookup(cmap, subtable, codepoint)
        .ok()
        .flatten()
        .map_or(GlyphId::NOTDEF, GlyphId::new)
}

fn lookup(cmap: &[u8], subtable: usize, codepoint: u32) -> Result<Option<u16>, OutOfBounds> {
    match u16_at(cmap, subtable)? {
        0 => format0(cmap, subtable, codepoint),
        4 => format4(cmap, subtable, codepoint),
        6 => format6(cmap, subtable, codepoint),
        12 | 13 => format12_13(cmap, subtable, codepoint),
        format => {
            log::trace!("unsupported cmap subtable format {format}");
            Ok(None)
        }
    }
}

/// Byte encoding table: one glyph byte per codepoint.
fn format0(cmap: &[u8], subtable: usize, codepoint: u32) -> Result<Option<u16>, OutOfBounds> {
    let length = u16_at(cmap, subtable + 2)? as u32;
    if codepoint < length.saturating_sub(6) {
        Ok(Some(u8_at(cmap, subtable + 6 + codepoint as usize)? as u16))
    } else {
        Ok(None)
    }
}

/// Trimmed table: one dense run of glyph ids.
fn format6(cmap: &[u8], subtable: usize, codepoint: u32) -> Result<Option<u16>, OutOfBounds> {
    let first = u16_at(cmap, subtable + 6)? as u32;
    let count = u16_at(cmap, subtable + 8)? as u32;
    if codepoint >= first && codepoint < first + count {
        let index = (codepoint - first) as usize;
        Ok(Some(u16_at(cmap, subtable + 10 + index * 2)?))
    } else {
        Ok(None)
    }
}

/// Segment mapping to delta values, BMP only.
fn format4(cmap: &[u8], subtable: usize, codepoint: u32) -> Result<Option<u16>, OutOfBounds> {
    if codepoint > 0xffff {
        return Ok(None);
    }
    let cp = codepoint as u16;
    let seg_count = (u16_at(cmap, subtable + 6)? / 2) as usize;
    let end_codes = subtable + 14;
    let start_codes = end_codes + seg_count * 2 + 2;
    let id_deltas = start_codes + seg_count * 2;
    let id_range_offsets = id_deltas + seg_count * 2;

    // First segment whose end code is >= cp.
    let (mut lo, mut hi) = (0usize, seg_count);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if u16_at(cmap, end_codes + mid * 2)? < cp {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo == seg_count {
        return Ok(None);
    }
    let segment = lo;

    let start = u16_at(cmap, start_codes + segment * 2)?;
    if cp < start {
        return Ok(None);
    }
    let delta = i16_at(cmap, id_deltas + segment * 2)?;
    let range_offset_pos = id_range_offsets + segment * 2;
    let range_offset = u16_at(cmap, range_offset_pos)? as usize;
    if range_offset == 0 {
        return Ok(Some(cp.wrapping_add(delta as u16)));
    }

    // The offset is relative to its own position in the idRangeOffset array.
    let glyph_pos = range_offset_pos + range_offset + (cp - start) as usize * 2;
    let glyph = u16_at(cmap, glyph_pos)?;
    if glyph == 0 {
        Ok(None)
    } else {
        Ok(Some(glyph.wrapping_add(delta as u16)))
    }
}

/// Segmented coverage (12) and many-to-one range mappings (13).
fn format12_13(cmap: &[u8], subtable: usize, codepoint: u32) -> Result<Option<u16>, OutOfBounds> {
    let format = u16_at(cmap, subtable)?;
    let num_groups = u32_at(cmap, subtable + 12)? as usize;
    let groups = subtable + 16;

    let (mut lo, mut hi) = (0usize, num_groups);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let group = groups + mid * 12;
        let start = u32_at(cmap, group)?;
        let end = u32_at(cmap, group + 4)?;
        if codepoint < start {
            hi = mid;
        } else if codepoint > end {
            lo = mid + 1;
        } else {
            let start_glyph = u32_at(cmap, group + 8)?;
            let glyph = if format == 12 {
                start_glyph.wrapping_add(codepoint - start)
            } else {
                start_glyph
            };
            return Ok(u16::try_from(glyph).ok());
        }
    }
    Ok(None)
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cmap_format4, cmap_format12};

    fn be16(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn format0_maps_single_bytes() {
        let mut table = be16(&[0, 6 + 256, 0]);
        table.extend((0..=255u8).map(|b| b.wrapping_mul(3)));
        assert_eq!(glyph_index(&table, 0, 2), GlyphId::new(6));
        assert_eq!(glyph_index(&table, 0, 255), GlyphId::new(253));
        assert_eq!(glyph_index(&table, 0, 256), GlyphId::NOTDEF);
    }

    #[test]
    fn format6_maps_trimmed_range() {
        let table = be16(&[6, 16, 0, 0x41, 3, 10, 11, 12]);
        assert_eq!(glyph_index(&table, 0, 0x40), GlyphId::NOTDEF);
        assert_eq!(glyph_index(&table, 0, 0x41), GlyphId::new(10));
        assert_eq!(glyph_index(&table, 0, 0x43), GlyphId::new(12));
        assert_eq!(glyph_index(&table, 0, 0x44), GlyphId::NOTDEF);
    }

    #[test]
    fn format4_delta_segments() {
        let table = cmap_format4(&[(0x20, 3), (0x41, 1), (0x42, 2), (0x263a, 7)]);
        let sub = find_unicode_subtable(&table).unwrap().unwrap();
        assert_eq!(glyph_index(&table, sub, 0x41), GlyphId::new(1));
        assert_eq!(glyph_index(&table, sub, 0x42), GlyphId::new(2));
        assert_eq!(glyph_index(&table, sub, 0x20), GlyphId::new(3));
        assert_eq!(glyph_index(&table, sub, 0x263a), GlyphId::new(7));
        assert_eq!(glyph_index(&table, sub, 0x43), GlyphId::NOTDEF);
        assert_eq!(glyph_index(&table, sub, 0x1_0000), GlyphId::NOTDEF);
    }

    #[test]
    fn format4_range_offset_array() {
        // One segment 'a'..='c' resolved through glyphIdArray, plus the
        // terminating 0xffff segment.
        let mut table = be16(&[4, 38, 0, 4, 4, 1, 0]);
        table.extend(be16(&[0x63, 0xffff])); // end codes
        table.extend(be16(&[0])); // reserved pad
        table.extend(be16(&[0x61, 0xffff])); // start codes
        table.extend(be16(&[0, 1])); // deltas
        table.extend(be16(&[4, 0])); // range offsets, relative to themselves
        table.extend(be16(&[20, 0, 22])); // glyphIdArray
        assert_eq!(glyph_index(&table, 0, 0x61), GlyphId::new(20));
        assert_eq!(glyph_index(&table, 0, 0x62), GlyphId::NOTDEF);
        assert_eq!(glyph_index(&table, 0, 0x63), GlyphId::new(22));
        assert_eq!(glyph_index(&table, 0, 0x64), GlyphId::NOTDEF);
    }

    #[test]
    fn format12_groups_beyond_bmp() {
        let table = cmap_format12(&[(0x41, 1), (0x42, 2), (0x1f600, 9)]);
        let sub = find_unicode_subtable(&table).unwrap().unwrap();
        assert_eq!(glyph_index(&table, sub, 0x41), GlyphId::new(1));
        assert_eq!(glyph_index(&table, sub, 0x42), GlyphId::new(2));
        assert_eq!(glyph_index(&table, sub, 0x1f600), GlyphId::new(9));
        assert_eq!(glyph_index(&table, sub, 0x1f601), GlyphId::NOTDEF);
    }

    #[test]
    fn format13_maps_whole_group_to_one_glyph() {
        let mut table = be16(&[13, 0]);
        table.extend(28u32.to_be_bytes());
        table.extend(0u32.to_be_bytes());
        table.extend(1u32.to_be_bytes());
        table.extend(0x100u32.to_be_bytes());
        table.extend(0x1ffu32.to_be_bytes());
        table.extend(5u32.to_be_bytes());
        assert_eq!(glyph_index(&table, 0, 0x100), GlyphId::new(5));
        assert_eq!(glyph_index(&table, 0, 0x1ff), GlyphId::new(5));
        assert_eq!(glyph_index(&table, 0, 0x200), GlyphId::NOTDEF);
    }

    #[test]
    fn truncated_subtable_is_a_miss() {
        let table = cmap_format12(&[(0x41, 1)]);
        let sub = find_unicode_subtable(&table).unwrap().unwrap();
        let cut = &table[..table.len() - 4];
        assert_eq!(glyph_index(cut, sub, 0x41), GlyphId::NOTDEF);
    }
}
