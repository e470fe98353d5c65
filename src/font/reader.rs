//! Bounds-checked big-endian reads over font data.

use crate::error::OutOfBounds;

pub(crate) fn u8_at(data: &[u8], offset: usize) -> Result<u8, OutOfBounds> {
    data.get(offset).copied().ok_or(OutOfBounds)
}

pub(crate) fn u16_at(data: &[u8], offset: usize) -> Result<u16, OutOfBounds> {
    Ok(u16::from_be_bytes(array_at(data, offset)?))
}

pub(crate) fn i16_at(data: &[u8], offset: usize) -> Result<i16, OutOfBounds> {
    Ok(i16::from_be_bytes(array_at(data, offset)?))
}

pub(crate) fn u32_at(data: &[u8], offset: usize) -> Result<u32, OutOfBounds> {
    Ok(u32::from_be_bytes(array_at(data, offset)?))
}

pub(crate) fn tag_at(data: &[u8], offset: usize) -> Result<[u8; 4], OutOfBounds> {
    array_at(data, offset)
}

fn array_at<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], OutOfBounds> {
    let end = offset.checked_add(N).ok_or(OutOfBounds)?;
    let bytes = data.get(offset..end).ok_or(OutOfBounds)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Sequential reader with a cursor.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn skip(&mut self, n: usize) -> Result<(), OutOfBounds> {
        let pos = self.pos.checked_add(n).ok_or(OutOfBounds)?;
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }
        self.pos = pos;
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8, OutOfBounds> {
        u8_at(self.data, self.pos)
    }

    pub fn u8(&mut self) -> Result<u8, OutOfBounds> {
        let v = u8_at(self.data, self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn i8(&mut self) -> Result<i8, OutOfBounds> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self) -> Result<u16, OutOfBounds> {
        let v = u16_at(self.data, self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn i16(&mut self) -> Result<i16, OutOfBounds> {
        let v = i16_at(self.data, self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn u32(&mut self) -> Result<u32, OutOfBounds> {
        let v = u32_at(self.data, self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn i32(&mut self) -> Result<i32, OutOfBounds> {
        Ok(self.u32()? as i32)
    }

    /// Reads an unsigned big-endian integer of `size` bytes (1 to 4).
    pub fn uint(&mut self, size: u8) -> Result<u32, OutOfBounds> {
        let mut v = 0u32;
        for _ in 0..size {
            v = (v << 8) | self.u8()? as u32;
        }
        Ok(v)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_access_is_bounds_checked() {
        let data = [0x12, 0x34, 0xff, 0xfe];
        assert_eq!(u16_at(&data, 0), Ok(0x1234));
        assert_eq!(i16_at(&data, 2), Ok(-2));
        assert_eq!(u32_at(&data, 0), Ok(0x1234_fffe));
        assert_eq!(u16_at(&data, 3), Err(OutOfBounds));
        assert_eq!(u32_at(&data, usize::MAX - 1), Err(OutOfBounds));
    }

    #[test]
    fn cursor_advances_and_stops_at_end() {
        let data = [1, 0, 2, 0, 0, 0, 3];
        let mut r = Reader::new(&data);
        assert_eq!(r.u8().unwrap(), 1);
        assert_eq!(r.u16().unwrap(), 2);
        assert_eq!(r.uint(3).unwrap(), 0);
        assert_eq!(r.position(), 6);
        assert_eq!(r.i8().unwrap(), 3);
        assert!(r.is_at_end());
        assert!(r.u8().is_err());
        assert!(r.skip(1).is_err());
    }
}
