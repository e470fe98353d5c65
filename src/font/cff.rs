//! Structural parsing of the `CFF ` table: INDEX and DICT data.
//!
//! Only what outline extraction needs is located here: the CharStrings
//! INDEX, global and local subroutines, and for CID-keyed fonts the FDArray
//! and FDSelect structures. All offsets are relative to the start of the
//! table.

use std::ops::Range;

use crate::error::{FormatError, OutOfBounds};
use crate::font::reader::Reader;
use crate::glyph_id::GlyphId;

// Top DICT operators.
const OP_CHARSTRINGS: u16 = 17;
const OP_PRIVATE: u16 = 18;
const OP_CHARSTRING_TYPE: u16 = 0x100 | 6;
const OP_FD_ARRAY: u16 = 0x100 | 36;
const OP_FD_SELECT: u16 = 0x100 | 37;
// Private DICT operators.
const OP_SUBRS: u16 = 19;

/// A parsed CFF INDEX header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Index {
    count: usize,
    off_size: u8,
    /// Position of the offset array.
    offsets: usize,
    /// Position one byte before the object data; offsets are 1-based.
    data_base: usize,
    /// Position just past the INDEX.
    end: usize,
}

impl Index {
    /// Parses the INDEX starting at `pos` in `table`.
    pub fn parse(table: &[u8], pos: usize) -> Result<Self, OutOfBounds> {
        let mut r = Reader::at(table, pos);
        let count = r.u16()? as usize;
        if count == 0 {
            return Ok(Self {
                end: r.position(),
                ..Self::default()
            });
        }
        let off_size = r.u8()?;
        if !(1..=4).contains(&off_size) {
            return Err(OutOfBounds);
        }
        let offsets = r.position();
        r.skip(count * off_size as usize)?;
        let last = r.uint(off_size)? as usize;
        let data_base = r.position() - 1;
        let end = data_base.checked_add(last).ok_or(OutOfBounds)?;
        if end > table.len() {
            return Err(OutOfBounds);
        }
        Ok(Self {
            count,
            off_size,
            offsets,
            data_base,
            end,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Byte range of object `i` within the table.
    pub fn get(&self, table: &[u8], i: usize) -> Result<Range<usize>, OutOfBounds> {
        if i >= self.count {
            return Err(OutOfBounds);
        }
        let mut r = Reader::at(table, self.offsets + i * self.off_size as usize);
        let start = self.data_base + r.uint(self.off_size)? as usize;
        let end = self.data_base + r.uint(self.off_size)? as usize;
        if start > end || end > self.end {
            return Err(OutOfBounds);
        }
        Ok(start..end)
    }
}

/// Reads one DICT/charstring integer whose first byte is `b0`.
///
/// Covers the 1-byte (32..=246), 2-byte (247..=254), 3-byte (28) and
/// 5-byte (29) encodings.
pub(crate) fn read_int(r: &mut Reader<'_>, b0: u8) -> Result<i32, OutOfBounds> {
    Ok(match b0 {
        32..=246 => b0 as i32 - 139,
        247..=250 => (b0 as i32 - 247) * 256 + r.u8()? as i32 + 108,
        251..=254 => -(b0 as i32 - 251) * 256 - r.u8()? as i32 - 108,
        28 => r.i16()? as i32,
        29 => r.i32()?,
        _ => 0,
    })
}

fn skip_operand(r: &mut Reader<'_>) -> Result<(), OutOfBounds> {
    let b0 = r.u8()?;
    if b0 == 30 {
        // Real number: nibbles until an 0xf terminator.
        loop {
            let v = r.u8()?;
            if v & 0x0f == 0x0f || v >> 4 == 0x0f {
                break;
            }
        }
        Ok(())
    } else {
        read_int(r, b0).map(|_| ())
    }
}

/// Collects the integer operands of `key` in the DICT occupying `dict`.
///
/// Returns an empty list when the operator is absent.
pub(crate) fn dict_ints(table: &[u8], dict: Range<usize>, key: u16) -> Result<Vec<i32>, OutOfBounds> {
    let bytes = table.get(dict).ok_or(OutOfBounds)?;
    let mut r = Reader::new(bytes);
    while !r.is_at_end() {
        let start = r.position();
        while r.peek_u8()? >= 28 {
            skip_operand(&mut r)?;
        }
        let end = r.position();
        let mut op = r.u8()? as u16;
        if op == 12 {
            op = 0x100 | r.u8()? as u16;
        }
        if op == key {
            let mut operands = Reader::new(&bytes[start..end]);
            let mut out = Vec::new();
            while !operands.is_at_end() {
                let b0 = operands.u8()?;
                out.push(read_int(&mut operands, b0)?);
            }
            return Ok(out);
        }
    }
    Ok(Vec::new())
}

fn dict_int(table: &[u8], dict: Range<usize>, key: u16) -> Result<Option<i32>, OutOfBounds> {
    Ok(dict_ints(table, dict, key)?.first().copied())
}

/// Subroutine index referenced by the Private DICT of `font_dict`.
fn private_subrs(table: &[u8], font_dict: Range<usize>) -> Result<Index, OutOfBounds> {
    let private = dict_ints(table, font_dict, OP_PRIVATE)?;
    let (size, offset) = match private[..] {
        [size, offset, ..] if size > 0 && offset > 0 => (size as usize, offset as usize),
        _ => return Ok(Index::default()),
    };
    let private_dict = offset..offset.checked_add(size).ok_or(OutOfBounds)?;
    match dict_int(table, private_dict, OP_SUBRS)? {
        Some(subrs) if subrs > 0 => Index::parse(table, offset + subrs as usize),
        _ => Ok(Index::default()),
    }
}

/// Where a CFF font keeps the pieces needed to run charstrings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CffTables {
    pub charstrings: Index,
    pub global_subrs: Index,
    pub local_subrs: Index,
    pub font_dicts: Option<Index>,
    pub fd_select: Option<usize>,
}

impl CffTables {
    /// Locates the outline structures inside the `CFF ` table bytes.
    pub fn parse(table: &[u8]) -> Result<Self, FormatError> {
        let header_size = table.get(2).copied().ok_or(OutOfBounds)? as usize;
        let names = Index::parse(table, header_size)?;
        let top_dicts = Index::parse(table, names.end())?;
        let strings = Index::parse(table, top_dicts.end())?;
        let global_subrs = Index::parse(table, strings.end())?;
        let top_dict = top_dicts.get(table, 0)?;

        let charstrings_at = dict_int(table, top_dict.clone(), OP_CHARSTRINGS)?.unwrap_or(0);
        let charstring_type = dict_int(table, top_dict.clone(), OP_CHARSTRING_TYPE)?.unwrap_or(2);
        let fd_array_at = dict_int(table, top_dict.clone(), OP_FD_ARRAY)?.unwrap_or(0);
        let fd_select_at = dict_int(table, top_dict.clone(), OP_FD_SELECT)?.unwrap_or(0);
        let local_subrs = private_subrs(table, top_dict)?;

        if charstring_type != 2 {
            return Err(FormatError::UnsupportedCharstringType(charstring_type));
        }
        if charstrings_at <= 0 {
            return Err(FormatError::MissingCharStrings);
        }

        let (font_dicts, fd_select) = if fd_array_at > 0 {
            if fd_select_at <= 0 {
                return Err(FormatError::MissingFdSelect);
            }
            (
                Some(Index::parse(table, fd_array_at as usize)?),
                Some(fd_select_at as usize),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            charstrings: Index::parse(table, charstrings_at as usize)?,
            global_subrs,
            local_subrs,
            font_dicts,
            fd_select,
        })
    }

    /// Local subroutines for `glyph`, resolving the font DICT of CID fonts.
    pub fn subrs_for_glyph(&self, table: &[u8], glyph: GlyphId) -> Result<Index, OutOfBounds> {
        let (Some(font_dicts), Some(fd_select)) = (&self.font_dicts, self.fd_select) else {
            return Ok(self.local_subrs);
        };
        let gid = glyph.to_u16() as usize;
        let mut r = Reader::at(table, fd_select);
        let fd = match r.u8()? {
            0 => {
                r.skip(gid)?;
                Some(r.u8()? as usize)
            }
            3 => {
                let num_ranges = r.u16()?;
                let mut start = r.u16()? as usize;
                let mut fd = None;
                for _ in 0..num_ranges {
                    let v = r.u8()? as usize;
                    let end = r.u16()? as usize;
                    if gid >= start && gid < end {
                        fd = Some(v);
                        break;
                    }
                    start = end;
                }
                fd
            }
            _ => None,
        };
        match fd {
            Some(fd) => private_subrs(table, font_dicts.get(table, fd)?),
            None => Ok(Index::default()),
        }
    }
}

/// Index bias applied to subroutine numbers.
pub(crate) fn subr_bias(count: usize) -> i32 {
    if count < 1240 {
        107
    } else if count < 33900 {
        1131
    } else {
        32768
    }
}
