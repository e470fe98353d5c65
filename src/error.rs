use thiserror::Error;

use crate::font::Tag;

/// A read ran past the end of the data it was addressed into.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("read past end of data")]
pub struct OutOfBounds;

/// Errors that abort loading a font.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("data is not a TrueType/OpenType font or collection")]
    UnknownMagic,
    #[error("font index {0} is not present in the blob")]
    FontIndexOutOfRange(usize),
    #[error("required table `{0}` is missing")]
    MissingTable(Tag),
    #[error("cmap has no Unicode subtable")]
    NoUnicodeCmap,
    #[error("unsupported loca format {0}")]
    UnsupportedLocaFormat(i16),
    #[error("unsupported charstring type {0}")]
    UnsupportedCharstringType(i32),
    #[error("CFF font has no CharStrings index")]
    MissingCharStrings,
    #[error("CID-keyed CFF font has an FDArray but no FDSelect")]
    MissingFdSelect,
    #[error("composite glyph nesting exceeds {0} levels")]
    CompositeTooDeep(usize),
    #[error("composite glyph expands to too many components")]
    CompositeTooLarge,
    #[error("font data truncated")]
    Truncated(#[from] OutOfBounds),
}

/// Errors raised while interpreting a single Type2 charstring.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CharstringError {
    #[error("glyph {0} has no charstring")]
    GlyphOutOfRange(u16),
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("operand stack overflow")]
    StackOverflow,
    #[error("unknown operator {0:#x}")]
    UnknownOperator(u16),
    #[error("subroutine {0} does not exist")]
    InvalidSubroutine(i32),
    #[error("subroutine nesting exceeds {0} levels")]
    NestingTooDeep(usize),
    #[error("return outside of a subroutine")]
    ReturnWithoutCall,
    #[error("charstring ended without endchar")]
    MissingEndchar,
    #[error("charstring data truncated")]
    Truncated(#[from] OutOfBounds),
}

/// Errors scoped to extracting one glyph outline.
///
/// Shared parser state is never modified by a failed extraction, so callers
/// may substitute a placeholder and carry on with other glyphs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OutlineError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Charstring(#[from] CharstringError),
    #[error("glyph bitmap size overflows at this scale")]
    BitmapOverflow,
}

impl From<OutOfBounds> for OutlineError {
    fn from(e: OutOfBounds) -> Self {
        Self::Format(FormatError::Truncated(e))
    }
}

/// A bitmap descriptor whose buffer cannot hold the described pixels.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("{len}-byte buffer cannot hold a {width}x{height} bitmap with stride {stride}")]
pub struct BitmapError {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub len: usize,
}

/// An atlas too large for 16-bit slot coordinates.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("{width}x{height} atlas exceeds 65535 pixels on a side")]
pub struct AtlasSizeError {
    pub width: u32,
    pub height: u32,
}

/// Errors from adding fonts to a [`FontStorage`](crate::FontStorage).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read font file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
}
