//! Pair kerning from `GPOS` pair adjustment lookups and the legacy `kern`
//! table. Only horizontal X-advance adjustments are read.

use crate::error::OutOfBounds;
use crate::font::reader::{i16_at, u16_at};
use crate::glyph_id::GlyphId;

const LOOKUP_PAIR_ADJUSTMENT: u16 = 2;
const VALUE_FORMAT_X_ADVANCE: u16 = 0x0004;

/// Advance adjustment from a `kern` table, format 0, first subtable only.
pub(crate) fn kern_advance(kern: &[u8], left: GlyphId, right: GlyphId) -> i32 {
    kern_pair(kern, left, right).unwrap_or(0)
}

fn kern_pair(kern: &[u8], left: GlyphId, right: GlyphId) -> Result<i32, OutOfBounds> {
    // Need at least one subtable, and it must be horizontal format 0.
    if u16_at(kern, 2)? < 1 || u16_at(kern, 8)? != 1 {
        return Ok(0);
    }
    let num_pairs = u16_at(kern, 10)? as usize;
    let needle = (left.to_u16() as u32) << 16 | right.to_u16() as u32;
    let (mut lo, mut hi) = (0usize, num_pairs);
    while lo < hi {
        let mid = (lo + hi) / 2;
        let record = 18 + mid * 6;
        let key = (u16_at(kern, record)? as u32) << 16 | u16_at(kern, record + 2)? as u32;
        match needle.cmp(&key) {
            std::cmp::Ordering::Less => hi = mid,
            std::cmp::Ordering::Greater => lo = mid + 1,
            std::cmp::Ordering::Equal => return Ok(i16_at(kern, record + 4)? as i32),
        }
    }
    Ok(0)
}

/// Advance adjustment from the first matching `GPOS` pair adjustment.
pub(crate) fn gpos_advance(gpos: &[u8], left: GlyphId, right: GlyphId) -> i32 {
    gpos_pair(gpos, left, right).ok().flatten().unwrap_or(0)
}

fn gpos_pair(gpos: &[u8], left: GlyphId, right: GlyphId) -> Result<Option<i32>, OutOfBounds> {
    if u16_at(gpos, 0)? != 1 || u16_at(gpos, 2)? != 0 {
        return Ok(None);
    }
    let lookup_list = u16_at(gpos, 8)? as usize;
    let lookup_count = u16_at(gpos, lookup_list)? as usize;
    for i in 0..lookup_count {
        let lookup = lookup_list + u16_at(gpos, lookup_list + 2 + 2 * i)? as usize;
        if u16_at(gpos, lookup)? != LOOKUP_PAIR_ADJUSTMENT {
            continue;
        }
        let subtable_count = u16_at(gpos, lookup + 4)? as usize;
        for s in 0..subtable_count {
            let subtable = lookup + u16_at(gpos, lookup + 6 + 2 * s)? as usize;
            if let Some(advance) = pair_subtable(gpos, subtable, left, right)? {
                return Ok(Some(advance));
            }
        }
    }
    Ok(None)
}

fn pair_subtable(
    gpos: &[u8],
    subtable: usize,
    left: GlyphId,
    right: GlyphId,
) -> Result<Option<i32>, OutOfBounds> {
    let format = u16_at(gpos, subtable)?;
    let coverage = subtable + u16_at(gpos, subtable + 2)? as usize;
    let Some(coverage_index) = coverage_index(gpos, coverage, left)? else {
        return Ok(None);
    };
    let value_format1 = u16_at(gpos, subtable + 4)?;
    let value_format2 = u16_at(gpos, subtable + 6)?;
    // Only X-advance on the first glyph is understood.
    if value_format1 != VALUE_FORMAT_X_ADVANCE || value_format2 != 0 {
        return Ok(None);
    }

    match format {
        1 => {
            let pair_set_count = u16_at(gpos, subtable + 8)? as usize;
            if coverage_index >= pair_set_count {
                return Ok(None);
            }
            let pair_set = subtable + u16_at(gpos, subtable + 10 + 2 * coverage_index)? as usize;
            let pair_count = u16_at(gpos, pair_set)? as usize;
            let records = pair_set + 2;
            let (mut lo, mut hi) = (0usize, pair_count);
            while lo < hi {
                let mid = (lo + hi) / 2;
                // secondGlyph followed by one int16 value record.
                let record = records + mid * 4;
                let second = u16_at(gpos, record)?;
                match right.to_u16().cmp(&second) {
                    std::cmp::Ordering::Less => hi = mid,
                    std::cmp::Ordering::Greater => lo = mid + 1,
                    std::cmp::Ordering::Equal => {
                        return Ok(Some(i16_at(gpos, record + 2)? as i32));
                    }
                }
            }
            Ok(None)
        }
        2 => {
            let class_def1 = subtable + u16_at(gpos, subtable + 8)? as usize;
            let class_def2 = subtable + u16_at(gpos, subtable + 10)? as usize;
            let class1 = glyph_class(gpos, class_def1, left)? as usize;
            let class2 = glyph_class(gpos, class_def2, right)? as usize;
            let class1_count = u16_at(gpos, subtable + 12)? as usize;
            let class2_count = u16_at(gpos, subtable + 14)? as usize;
            if class1 >= class1_count || class2 >= class2_count {
                return Ok(None);
            }
            let record = subtable + 16 + 2 * (class1 * class2_count + class2);
            Ok(Some(i16_at(gpos, record)? as i32))
        }
        _ => Ok(None),
    }
}

fn coverage_index(gpos: &[u8], coverage: usize, glyph: GlyphId) -> Result<Option<usize>, OutOfBounds> {
    let gid = glyph.to_u16();
    match u16_at(gpos, coverage)? {
        1 => {
            let count = u16_at(gpos, coverage + 2)? as usize;
            let (mut lo, mut hi) = (0usize, count);
            while lo < hi {
                let mid = (lo + hi) / 2;
                let value = u16_at(gpos, coverage + 4 + 2 * mid)?;
                match gid.cmp(&value) {
                    std::cmp::Ordering::Less => hi = mid,
                    std::cmp::Ordering::Greater => lo = mid + 1,
                    std::cmp::Ordering::Equal => return Ok(Some(mid)),
                }
            }
            Ok(None)
        }
        2 => {
            let count = u16_at(gpos, coverage + 2)? as usize;
            let (mut lo, mut hi) = (0usize, count);
            while lo < hi {
                let mid = (lo + hi) / 2;
                let range = coverage + 4 + 6 * mid;
                let start = u16_at(gpos, range)?;
                let end = u16_at(gpos, range + 2)?;
                if gid < start {
                    hi = mid;
                } else if gid > end {
                    lo = mid + 1;
                } else {
                    let start_index = u16_at(gpos, range + 4)? as usize;
                    return Ok(Some(start_index + (gid - start) as usize));
                }
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn glyph_class(gpos: &[u8], class_def: usize, glyph: GlyphId) -> Result<u16, OutOfBounds> {
    let gid = glyph.to_u16();
    match u16_at(gpos, class_def)? {
        1 => {
            let start = u16_at(gpos, class_def + 2)?;
            let count = u16_at(gpos, class_def + 4)?;
            if gid >= start && gid - start < count {
                u16_at(gpos, class_def + 6 + 2 * (gid - start) as usize)
            } else {
                Ok(0)
            }
        }
        2 => {
            let count = u16_at(gpos, class_def + 2)? as usize;
            let (mut lo, mut hi) = (0usize, count);
            while lo < hi {
                let mid = (lo + hi) / 2;
                let record = class_def + 4 + 6 * mid;
                let start = u16_at(gpos, record)?;
                let end = u16_at(gpos, record + 2)?;
                if gid < start {
                    hi = mid;
                } else if gid > end {
                    lo = mid + 1;
                } else {
                    return u16_at(gpos, record + 4);
                }
            }
            Ok(0)
        }
        _ => Ok(0),
    }
}
