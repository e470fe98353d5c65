/// Index of a glyph inside one font.
///
/// Glyph indices are font-specific: the same codepoint maps to different
/// indices in different fonts. Index 0 is the "missing glyph" (`.notdef`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlyphId(u16);

impl GlyphId {
    /// The missing glyph, returned for codepoints a font does not cover.
    pub const NOTDEF: Self = Self(0);

    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub const fn to_u16(self) -> u16 {
        self.0
    }

    pub const fn is_notdef(self) -> bool {
        self.0 == 0
    }
}

impl From<u16> for GlyphId {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for GlyphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gid{}", self.0)
    }
}
