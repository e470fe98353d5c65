//! In-memory font synthesis for unit tests.
//!
//! Builds minimal but well-formed sfnt files, `cmap` subtables, `glyf`
//! glyphs and CFF tables so that parsing, outline extraction, rasterization
//! and packing can be tested without binary fixtures.

use crate::font::Tag;

fn be16(out: &mut Vec<u8>, v: u16) {
    out.extend(v.to_be_bytes());
}

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend(v.to_be_bytes());
}

/// Serializes a single-face sfnt with `tables`, sorted by tag.
pub fn sfnt(magic: [u8; 4], tables: &[(Tag, Vec<u8>)]) -> Vec<u8> {
    let mut tables: Vec<&(Tag, Vec<u8>)> = tables.iter().collect();
    tables.sort_by_key(|(tag, _)| tag.0);

    let num_tables = tables.len() as u16;
    let mut out = Vec::new();
    out.extend(magic);
    be16(&mut out, num_tables);
    let entry_selector = (num_tables.max(1)).ilog2() as u16;
    let search_range = (1u16 << entry_selector) * 16;
    be16(&mut out, search_range);
    be16(&mut out, entry_selector);
    be16(&mut out, (num_tables * 16).saturating_sub(search_range));

    let mut offset = 12 + 16 * tables.len();
    let mut data = Vec::new();
    for (tag, bytes) in &tables {
        out.extend(tag.0);
        be32(&mut out, 0);
        be32(&mut out, offset as u32);
        be32(&mut out, bytes.len() as u32);
        data.extend(bytes);
        while data.len() % 4 != 0 {
            data.push(0);
        }
        offset = 12 + 16 * tables.len() + data.len();
    }
    out.extend(data);
    out
}

/// Wraps complete single-face fonts into a `ttcf` collection, relocating
/// their table offsets.
pub fn collection(fonts: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(b"ttcf");
    be32(&mut out, 0x0001_0000);
    be32(&mut out, fonts.len() as u32);
    let mut base = 12 + 4 * fonts.len();
    for font in fonts {
        be32(&mut out, base as u32);
        base += font.len().next_multiple_of(4);
    }
    for font in fonts {
        let start = out.len();
        let mut font = font.clone();
        let num_tables = u16::from_be_bytes([font[4], font[5]]) as usize;
        for i in 0..num_tables {
            let at = 12 + 16 * i + 8;
            let offset = u32::from_be_bytes([font[at], font[at + 1], font[at + 2], font[at + 3]]);
            font[at..at + 4].copy_from_slice(&(offset + start as u32).to_be_bytes());
        }
        out.extend(font);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }
    out
}

/// A `cmap` table holding one Microsoft BMP subtable in format 4, one
/// segment per mapping.
pub fn cmap_format4(mappings: &[(u32, u16)]) -> Vec<u8> {
    let mut mappings = mappings.to_vec();
    mappings.sort();
    let seg_count = mappings.len() + 1;

    let mut sub = Vec::new();
    be16(&mut sub, 4);
    be16(&mut sub, (16 + 8 * seg_count) as u16);
    be16(&mut sub, 0);
    be16(&mut sub, (seg_count * 2) as u16);
    let entry_selector = seg_count.ilog2() as u16;
    be16(&mut sub, 2 << entry_selector);
    be16(&mut sub, entry_selector);
    be16(&mut sub, (seg_count as u16 * 2).saturating_sub(2 << entry_selector));
    for &(cp, _) in &mappings {
        be16(&mut sub, cp as u16);
    }
    be16(&mut sub, 0xffff);
    be16(&mut sub, 0);
    for &(cp, _) in &mappings {
        be16(&mut sub, cp as u16);
    }
    be16(&mut sub, 0xffff);
    for &(cp, gid) in &mappings {
        be16(&mut sub, gid.wrapping_sub(cp as u16));
    }
    be16(&mut sub, 1);
    for _ in 0..seg_count {
        be16(&mut sub, 0);
    }
    cmap_with(3, 1, sub)
}

/// A `cmap` table holding one Microsoft full-repertoire subtable in
/// format 12, one group per mapping.
pub fn cmap_format12(mappings: &[(u32, u16)]) -> Vec<u8> {
    let mut mappings = mappings.to_vec();
    mappings.sort();
    let mut sub = Vec::new();
    be16(&mut sub, 12);
    be16(&mut sub, 0);
    be32(&mut sub, (16 + 12 * mappings.len()) as u32);
    be32(&mut sub, 0);
    be32(&mut sub, mappings.len() as u32);
    for &(cp, gid) in &mappings {
        be32(&mut sub, cp);
        be32(&mut sub, cp);
        be32(&mut sub, gid as u32);
    }
    cmap_with(3, 10, sub)
}

fn cmap_with(platform: u16, encoding: u16, subtable: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::new();
    be16(&mut out, 0);
    be16(&mut out, 1);
    be16(&mut out, platform);
    be16(&mut out, encoding);
    be32(&mut out, 12);
    out.extend(subtable);
    out
}

// Simple glyph flags, as stored in `glyf`.
const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

/// Builder for a simple `glyf` glyph from absolute points.
#[derive(Clone, Debug, Default)]
pub struct SimpleGlyph {
    contours: Vec<Vec<(i32, i32, bool)>>,
    repeat_flags: bool,
}

impl SimpleGlyph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contour of `(x, y, on_curve)` points.
    pub fn contour(mut self, points: &[(i32, i32, bool)]) -> Self {
        self.contours.push(points.to_vec());
        self
    }

    /// Run-length encodes the flag array with REPEAT.
    pub fn repeat_flags(mut self) -> Self {
        self.repeat_flags = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let points: Vec<(i32, i32, bool)> = self.contours.iter().flatten().copied().collect();
        let coord = |f: fn(&(i32, i32, bool)) -> i32| points.iter().map(f);
        let (x_min, x_max) = (coord(|p| p.0).min().unwrap_or(0), coord(|p| p.0).max().unwrap_or(0));
        let (y_min, y_max) = (coord(|p| p.1).min().unwrap_or(0), coord(|p| p.1).max().unwrap_or(0));

        let mut out = Vec::new();
        be16(&mut out, self.contours.len() as u16);
        for v in [x_min, y_min, x_max, y_max] {
            be16(&mut out, v as i16 as u16);
        }
        let mut end = 0;
        for contour in &self.contours {
            end += contour.len();
            be16(&mut out, (end - 1) as u16);
        }
        be16(&mut out, 0);

        let (mut flags, mut xs, mut ys) = (Vec::new(), Vec::new(), Vec::new());
        let (mut px, mut py) = (0, 0);
        for &(x, y, on_curve) in &points {
            let mut flag = if on_curve { ON_CURVE } else { 0 };
            flag |= encode_delta(&mut xs, x - px, X_SHORT, X_SAME_OR_POSITIVE);
            flag |= encode_delta(&mut ys, y - py, Y_SHORT, Y_SAME_OR_POSITIVE);
            flags.push(flag);
            (px, py) = (x, y);
        }

        if self.repeat_flags {
            let mut i = 0;
            while i < flags.len() {
                let run = flags[i..].iter().take_while(|&&f| f == flags[i]).count().min(256);
                out.push(flags[i] | REPEAT);
                out.push((run - 1) as u8);
                i += run;
            }
        } else {
            out.extend(&flags);
        }
        out.extend(xs);
        out.extend(ys);
        out
    }
}

fn encode_delta(out: &mut Vec<u8>, delta: i32, short: u8, same_or_positive: u8) -> u8 {
    if delta == 0 {
        same_or_positive
    } else if delta.abs() < 256 {
        out.push(delta.unsigned_abs() as u8);
        if delta > 0 { short | same_or_positive } else { short }
    } else {
        out.extend((delta as i16).to_be_bytes());
        0
    }
}

/// A composite glyph placing each `(glyph, dx, dy, scale)` component.
pub fn composite_glyph(components: &[(u16, i16, i16, Option<f32>)]) -> Vec<u8> {
    const ARGS_ARE_WORDS: u16 = 0x0001;
    const ARGS_ARE_XY_VALUES: u16 = 0x0002;
    const HAVE_SCALE: u16 = 0x0008;
    const MORE_COMPONENTS: u16 = 0x0020;

    let mut out = Vec::new();
    be16(&mut out, u16::MAX);
    out.extend([0; 8]);
    for (i, &(glyph, dx, dy, scale)) in components.iter().enumerate() {
        let mut flags = ARGS_ARE_WORDS | ARGS_ARE_XY_VALUES;
        if scale.is_some() {
            flags |= HAVE_SCALE;
        }
        if i + 1 < components.len() {
            flags |= MORE_COMPONENTS;
        }
        be16(&mut out, flags);
        be16(&mut out, glyph);
        out.extend(dx.to_be_bytes());
        out.extend(dy.to_be_bytes());
        if let Some(s) = scale {
            out.extend(((s * 16384.0).round() as i16).to_be_bytes());
        }
    }
    out
}

/// Concatenated glyph data and the matching long-format `loca`.
pub fn glyf_and_loca(glyphs: &[Vec<u8>]) -> (Vec<u8>, Vec<u8>) {
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    for glyph in glyphs {
        be32(&mut loca, glyf.len() as u32);
        glyf.extend(glyph);
    }
    be32(&mut loca, glyf.len() as u32);
    (glyf, loca)
}

/// A CFF INDEX of `objects` with 4-byte offsets.
pub fn cff_index(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    be16(&mut out, objects.len() as u16);
    if objects.is_empty() {
        return out;
    }
    out.push(4);
    let mut offset = 1u32;
    be32(&mut out, offset);
    for object in objects {
        offset += object.len() as u32;
        be32(&mut out, offset);
    }
    for object in objects {
        out.extend(object);
    }
    out
}

fn dict_int(out: &mut Vec<u8>, v: i32) {
    out.push(29);
    out.extend(v.to_be_bytes());
}

fn dict_op(out: &mut Vec<u8>, op: u16) {
    if op >= 0x100 {
        out.extend([12, op as u8]);
    } else {
        out.push(op as u8);
    }
}

/// A Private DICT whose Subrs INDEX follows it directly.
fn private_dict() -> Vec<u8> {
    let mut out = Vec::new();
    dict_int(&mut out, 6);
    dict_op(&mut out, 19);
    out
}

/// Builder for a bare CFF table.
#[derive(Clone, Debug)]
pub struct CffBuilder {
    glyphs: Vec<Vec<u8>>,
    local_subrs: Vec<Vec<u8>>,
    global_subrs: Vec<Vec<u8>>,
    charstring_type: i32,
    cid: Option<(Vec<Vec<Vec<u8>>>, Vec<u8>)>,
}

impl CffBuilder {
    pub fn new() -> Self {
        Self {
            glyphs: Vec::new(),
            local_subrs: Vec::new(),
            global_subrs: Vec::new(),
            charstring_type: 2,
            cid: None,
        }
    }

    pub fn glyph(mut self, charstring: Vec<u8>) -> Self {
        self.glyphs.push(charstring);
        self
    }

    pub fn local_subr(mut self, charstring: Vec<u8>) -> Self {
        self.local_subrs.push(charstring);
        self
    }

    pub fn global_subr(mut self, charstring: Vec<u8>) -> Self {
        self.global_subrs.push(charstring);
        self
    }

    pub fn charstring_type(mut self, kind: i32) -> Self {
        self.charstring_type = kind;
        self
    }

    /// Makes the font CID-keyed: one font DICT per entry of `subrs`, and a
    /// format 0 FDSelect mapping glyph `i` to `select[i]`.
    pub fn cid_font_dicts(mut self, subrs: Vec<Vec<Vec<u8>>>, select: Vec<u8>) -> Self {
        self.cid = Some((subrs, select));
        self
    }

    fn top_dict(&self, charstrings: usize, private: Option<(usize, usize)>, cid: Option<(usize, usize)>) -> Vec<u8> {
        let mut out = Vec::new();
        if self.charstring_type != 2 {
            dict_int(&mut out, self.charstring_type);
            dict_op(&mut out, 0x100 | 6);
        }
        dict_int(&mut out, charstrings as i32);
        dict_op(&mut out, 17);
        if let Some((size, offset)) = private {
            dict_int(&mut out, size as i32);
            dict_int(&mut out, offset as i32);
            dict_op(&mut out, 18);
        }
        if let Some((fd_array, fd_select)) = cid {
            dict_int(&mut out, fd_array as i32);
            dict_op(&mut out, 0x100 | 36);
            dict_int(&mut out, fd_select as i32);
            dict_op(&mut out, 0x100 | 37);
        }
        out
    }

    pub fn build(&self) -> Vec<u8> {
        let header = [1u8, 0, 4, 4];
        let names = cff_index(&[b"Test".to_vec()]);
        let strings = cff_index(&[]);
        let global_subrs = cff_index(&self.global_subrs);

        // Every DICT integer is 5 bytes wide, so placeholders size the top DICT.
        let has_private = !self.local_subrs.is_empty();
        let top_size = self
            .top_dict(0, has_private.then_some((0, 0)), self.cid.as_ref().map(|_| (0, 0)))
            .len();
        let top_index_size = cff_index(&[vec![0; top_size]]).len();
        let base = header.len() + names.len() + top_index_size + strings.len() + global_subrs.len();

        let mut tail = cff_index(&self.glyphs);
        let mut private = None;
        if has_private {
            let dict = private_dict();
            private = Some((dict.len(), base + tail.len()));
            tail.extend(dict);
            tail.extend(cff_index(&self.local_subrs));
        }
        let mut cid = None;
        if let Some((font_subrs, select)) = &self.cid {
            let mut font_dicts = Vec::new();
            for subrs in font_subrs {
                let dict = private_dict();
                let mut font_dict = Vec::new();
                dict_int(&mut font_dict, dict.len() as i32);
                dict_int(&mut font_dict, (base + tail.len()) as i32);
                dict_op(&mut font_dict, 18);
                font_dicts.push(font_dict);
                tail.extend(dict);
                tail.extend(cff_index(subrs));
            }
            let fd_array = base + tail.len();
            tail.extend(cff_index(&font_dicts));
            let fd_select = base + tail.len();
            tail.push(0);
            tail.extend(select);
            cid = Some((fd_array, fd_select));
        }

        let mut out = header.to_vec();
        out.extend(names);
        out.extend(cff_index(&[self.top_dict(base, private, cid)]));
        out.extend(strings);
        out.extend(global_subrs);
        out.extend(tail);
        out
    }
}

/// One token of a Type2 charstring.
#[derive(Clone, Copy, Debug)]
pub enum Cs {
    /// Integer operand in the shortest encoding.
    N(i32),
    Op(u8),
    /// Two-byte operator `12 x`.
    Esc(u8),
    /// 16.16 fixed-point operand.
    Fixed(f32),
    Raw(u8),
}

/// Encodes a Type2 charstring.
pub fn charstring(program: &[Cs]) -> Vec<u8> {
    let mut out = Vec::new();
    for token in program {
        match *token {
            Cs::N(v @ -107..=107) => out.push((v + 139) as u8),
            Cs::N(v @ 108..=1131) => {
                let w = v - 108;
                out.extend([(247 + w / 256) as u8, (w % 256) as u8]);
            }
            Cs::N(v @ -1131..=-108) => {
                let w = -v - 108;
                out.extend([(251 + w / 256) as u8, (w % 256) as u8]);
            }
            Cs::N(v) => {
                out.push(28);
                out.extend((v as i16).to_be_bytes());
            }
            Cs::Op(op) | Cs::Raw(op) => out.push(op),
            Cs::Esc(op) => out.extend([12, op]),
            Cs::Fixed(v) => {
                out.push(255);
                out.extend(((v * 65536.0) as i32).to_be_bytes());
            }
        }
    }
    out
}

/// A synthetic face: a notdef, a 700-unit square on 'A' and an empty
/// space, with unitsPerEm 1000 and hhea metrics 800 / -200 / 90.
#[derive(Clone, Debug)]
pub struct TestFont {
    magic: [u8; 4],
    tables: Vec<(Tag, Vec<u8>)>,
    metrics: Vec<(u16, i16)>,
    num_long_metrics: usize,
    removed: Vec<Tag>,
}

// Glyph ids of the synthetic faces.
const SQUARE: u16 = 1;
const SPACE: u16 = 2;
const NUM_GLYPHS: u16 = 3;

impl TestFont {
    fn common(magic: [u8; 4], long_loca: bool) -> Self {
        let mut head = Vec::new();
        be32(&mut head, 0x0001_0000);
        be32(&mut head, 0x0001_0000);
        be32(&mut head, 0);
        be32(&mut head, 0x5f0f_3cf5);
        be16(&mut head, 0);
        be16(&mut head, 1000);
        head.extend([0; 16]);
        for v in [0, 0, 700, 700] {
            be16(&mut head, v);
        }
        be16(&mut head, 0);
        be16(&mut head, 8);
        be16(&mut head, 2);
        be16(&mut head, long_loca as u16);
        be16(&mut head, 0);

        let mut maxp = Vec::new();
        be32(&mut maxp, 0x0000_5000);
        be16(&mut maxp, NUM_GLYPHS);

        let cmap = cmap_format4(&[(' ' as u32, SPACE), ('A' as u32, SQUARE)]);
        Self {
            magic,
            tables: vec![(Tag::HEAD, head), (Tag::MAXP, maxp), (Tag::CMAP, cmap)],
            metrics: vec![(500, 0), (800, 0), (250, 0)],
            num_long_metrics: NUM_GLYPHS as usize,
            removed: Vec::new(),
        }
    }

    /// TrueType flavour.
    pub fn square() -> Self {
        let square = SimpleGlyph::new()
            .contour(&[(0, 0, true), (0, 700, true), (700, 700, true), (700, 0, true)])
            .build();
        let (glyf, loca) = glyf_and_loca(&[Vec::new(), square, Vec::new()]);
        let mut font = Self::common(0x0001_0000u32.to_be_bytes(), true);
        font.tables.push((Tag::GLYF, glyf));
        font.tables.push((Tag::LOCA, loca));
        font
    }

    /// CFF flavour with the same glyphs.
    pub fn cff_square() -> Self {
        use Cs::{N, Op};
        const RLINETO: u8 = 5;
        const ENDCHAR: u8 = 14;
        const RMOVETO: u8 = 21;
        let square = charstring(&[
            N(0), N(0), Op(RMOVETO),
            N(0), N(700), Op(RLINETO),
            N(700), N(0), Op(RLINETO),
            N(0), N(-700), Op(RLINETO),
            Op(ENDCHAR),
        ]);
        let cff = CffBuilder::new()
            .glyph(vec![ENDCHAR])
            .glyph(square)
            .glyph(vec![ENDCHAR])
            .build();
        let mut font = Self::common(*b"OTTO", false);
        font.tables.push((Tag::CFF, cff));
        font
    }

    pub fn without_table(mut self, tag: Tag) -> Self {
        self.removed.push(tag);
        self
    }

    /// Stores full metrics for only the first `n` glyphs.
    pub fn long_metrics(mut self, n: usize) -> Self {
        self.num_long_metrics = n.min(self.metrics.len());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut hhea = Vec::new();
        be32(&mut hhea, 0x0001_0000);
        for v in [800i16, -200, 90] {
            hhea.extend(v.to_be_bytes());
        }
        hhea.extend([0; 24]);
        be16(&mut hhea, self.num_long_metrics as u16);

        let mut hmtx = Vec::new();
        for (i, &(advance, lsb)) in self.metrics.iter().enumerate() {
            if i < self.num_long_metrics {
                be16(&mut hmtx, advance);
            }
            hmtx.extend(lsb.to_be_bytes());
        }

        let mut tables = self.tables.clone();
        tables.push((Tag::HHEA, hhea));
        tables.push((Tag::HMTX, hmtx));
        tables.retain(|(tag, _)| !self.removed.contains(tag));
        sfnt(self.magic, &tables)
    }
}

pub fn square_font() -> Vec<u8> {
    TestFont::square().build()
}

pub fn cff_square_font() -> Vec<u8> {
    TestFont::cff_square().build()
}
