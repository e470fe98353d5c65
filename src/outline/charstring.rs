//! Type2 charstring interpreter.
//!
//! Charstrings are a small stack machine: operands are pushed, operators
//! consume the whole stack. Hints are skipped and flex sequences are always
//! drawn as two cubic curves.

use crate::error::CharstringError;
use crate::font::cff::{CffTables, Index, read_int, subr_bias};
use crate::font::reader::Reader;
use crate::glyph_id::GlyphId;
use crate::outline::{FontPoint, OutlineSink};

/// Operand stack size.
const STACK_LIMIT: usize = 48;
/// Deepest subroutine nesting allowed.
pub(crate) const MAX_SUBR_DEPTH: usize = 10;

mod op {
    pub const HSTEM: u8 = 0x01;
    pub const VSTEM: u8 = 0x03;
    pub const VMOVETO: u8 = 0x04;
    pub const RLINETO: u8 = 0x05;
    pub const HLINETO: u8 = 0x06;
    pub const VLINETO: u8 = 0x07;
    pub const RRCURVETO: u8 = 0x08;
    pub const CALLSUBR: u8 = 0x0a;
    pub const RETURN: u8 = 0x0b;
    pub const ESCAPE: u8 = 0x0c;
    pub const ENDCHAR: u8 = 0x0e;
    pub const HSTEMHM: u8 = 0x12;
    pub const HINTMASK: u8 = 0x13;
    pub const CNTRMASK: u8 = 0x14;
    pub const RMOVETO: u8 = 0x15;
    pub const HMOVETO: u8 = 0x16;
    pub const VSTEMHM: u8 = 0x17;
    pub const RCURVELINE: u8 = 0x18;
    pub const RLINECURVE: u8 = 0x19;
    pub const VVCURVETO: u8 = 0x1a;
    pub const HHCURVETO: u8 = 0x1b;
    pub const SHORTINT: u8 = 0x1c;
    pub const CALLGSUBR: u8 = 0x1d;
    pub const VHCURVETO: u8 = 0x1e;
    pub const HVCURVETO: u8 = 0x1f;
    pub const FIXED: u8 = 0xff;

    pub const HFLEX: u8 = 0x22;
    pub const FLEX: u8 = 0x23;
    pub const HFLEX1: u8 = 0x24;
    pub const FLEX1: u8 = 0x25;
}

/// Turns relative pen movements into absolute sink calls.
struct Pen<'s, S> {
    sink: &'s mut S,
    first: FontPoint,
    current: FontPoint,
    started: bool,
}

impl<'s, S: OutlineSink> Pen<'s, S> {
    fn new(sink: &'s mut S) -> Self {
        Self {
            sink,
            first: FontPoint::origin(),
            current: FontPoint::origin(),
            started: false,
        }
    }

    fn ensure_started(&mut self) {
        if !self.started {
            self.started = true;
            self.first = self.current;
            self.sink.move_to(self.current);
        }
    }

    fn close(&mut self) {
        if self.started && self.first != self.current {
            self.sink.line_to(self.first);
        }
    }

    fn rmove_to(&mut self, dx: f32, dy: f32) {
        self.close();
        self.current = FontPoint::new(self.current.x + dx, self.current.y + dy);
        self.first = self.current;
        self.started = true;
        self.sink.move_to(self.current);
    }

    fn rline_to(&mut self, dx: f32, dy: f32) {
        self.ensure_started();
        self.current = FontPoint::new(self.current.x + dx, self.current.y + dy);
        self.sink.line_to(self.current);
    }

    fn rcurve_to(&mut self, dx1: f32, dy1: f32, dx2: f32, dy2: f32, dx3: f32, dy3: f32) {
        self.ensure_started();
        let c1 = FontPoint::new(self.current.x + dx1, self.current.y + dy1);
        let c2 = FontPoint::new(c1.x + dx2, c1.y + dy2);
        self.current = FontPoint::new(c2.x + dx3, c2.y + dy3);
        self.sink.cubic_to(c1, c2, self.current);
    }
}

struct Stack {
    values: [f32; STACK_LIMIT],
    len: usize,
}

impl Stack {
    fn push(&mut self, v: f32) -> Result<(), CharstringError> {
        if self.len >= STACK_LIMIT {
            return Err(CharstringError::StackOverflow);
        }
        self.values[self.len] = v;
        self.len += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<f32, CharstringError> {
        if self.len == 0 {
            return Err(CharstringError::StackUnderflow);
        }
        self.len -= 1;
        Ok(self.values[self.len])
    }

    /// The operands, requiring at least `min` of them.
    fn args(&self, min: usize) -> Result<&[f32], CharstringError> {
        if self.len < min {
            return Err(CharstringError::StackUnderflow);
        }
        Ok(&self.values[..self.len])
    }
}

fn subroutine<'a>(table: &'a [u8], subrs: &Index, number: i32) -> Result<&'a [u8], CharstringError> {
    let index = number + subr_bias(subrs.len());
    let i = usize::try_from(index)
        .ok()
        .filter(|&i| i < subrs.len())
        .ok_or(CharstringError::InvalidSubroutine(number))?;
    let bytes = &table[subrs.get(table, i)?];
    if bytes.is_empty() {
        return Err(CharstringError::InvalidSubroutine(number));
    }
    Ok(bytes)
}

/// Runs the charstring of `glyph`, feeding the resulting path into `sink`.
///
/// `table` is the whole `CFF ` table. A failure leaves `sink` holding a
/// partial path; callers discard it.
pub(crate) fn evaluate(
    table: &[u8],
    cff: &CffTables,
    glyph: GlyphId,
    sink: &mut impl OutlineSink,
) -> Result<(), CharstringError> {
    let gid = glyph.to_u16() as usize;
    if gid >= cff.charstrings.len() {
        return Err(CharstringError::GlyphOutOfRange(glyph.to_u16()));
    }
    let mut r = Reader::new(&table[cff.charstrings.get(table, gid)?]);

    let mut pen = Pen::new(sink);
    let mut stack = Stack {
        values: [0.0; STACK_LIMIT],
        len: 0,
    };
    let mut call_stack: Vec<Reader<'_>> = Vec::with_capacity(MAX_SUBR_DEPTH);
    let mut local_subrs: Option<Index> = None;
    let mut in_header = true;
    let mut mask_bits = 0usize;

    while !r.is_at_end() {
        let b0 = r.u8()?;
        let mut clear_stack = true;
        match b0 {
            op::HINTMASK | op::CNTRMASK => {
                // Stems given right before the first mask are an implicit vstem.
                if in_header {
                    mask_bits += stack.len / 2;
                }
                in_header = false;
                r.skip(mask_bits.div_ceil(8))?;
            }
            op::HSTEM | op::VSTEM | op::HSTEMHM | op::VSTEMHM => {
                mask_bits += stack.len / 2;
            }

            op::RMOVETO => {
                in_header = false;
                let s = stack.args(2)?;
                pen.rmove_to(s[s.len() - 2], s[s.len() - 1]);
            }
            op::VMOVETO => {
                in_header = false;
                let s = stack.args(1)?;
                pen.rmove_to(0.0, s[s.len() - 1]);
            }
            op::HMOVETO => {
                in_header = false;
                let s = stack.args(1)?;
                pen.rmove_to(s[s.len() - 1], 0.0);
            }

            op::RLINETO => {
                let s = stack.args(2)?;
                for pair in s.chunks_exact(2) {
                    pen.rline_to(pair[0], pair[1]);
                }
            }
            op::HLINETO | op::VLINETO => {
                let s = stack.args(1)?;
                let mut horizontal = b0 == op::HLINETO;
                for &d in s {
                    if horizontal {
                        pen.rline_to(d, 0.0);
                    } else {
                        pen.rline_to(0.0, d);
                    }
                    horizontal = !horizontal;
                }
            }

            op::HVCURVETO | op::VHCURVETO => {
                let s = stack.args(4)?;
                let mut horizontal = b0 == op::HVCURVETO;
                let mut i = 0;
                while i + 3 < s.len() {
                    // A fifth operand on the last curve is its final free delta.
                    let last = if s.len() - i == 5 { s[i + 4] } else { 0.0 };
                    if horizontal {
                        pen.rcurve_to(s[i], 0.0, s[i + 1], s[i + 2], last, s[i + 3]);
                    } else {
                        pen.rcurve_to(0.0, s[i], s[i + 1], s[i + 2], s[i + 3], last);
                    }
                    horizontal = !horizontal;
                    i += 4;
                }
            }
            op::RRCURVETO => {
                let s = stack.args(6)?;
                for c in s.chunks_exact(6) {
                    pen.rcurve_to(c[0], c[1], c[2], c[3], c[4], c[5]);
                }
            }
            op::RCURVELINE => {
                let s = stack.args(8)?;
                let curves = (s.len() - 2) / 6 * 6;
                for c in s[..curves].chunks_exact(6) {
                    pen.rcurve_to(c[0], c[1], c[2], c[3], c[4], c[5]);
                }
                let line = s.get(curves..curves + 2).ok_or(CharstringError::StackUnderflow)?;
                pen.rline_to(line[0], line[1]);
            }
            op::RLINECURVE => {
                let s = stack.args(8)?;
                let lines = (s.len() - 6) / 2 * 2;
                for pair in s[..lines].chunks_exact(2) {
                    pen.rline_to(pair[0], pair[1]);
                }
                let c = s.get(lines..lines + 6).ok_or(CharstringError::StackUnderflow)?;
                pen.rcurve_to(c[0], c[1], c[2], c[3], c[4], c[5]);
            }
            op::VVCURVETO | op::HHCURVETO => {
                let s = stack.args(4)?;
                let (mut f, rest) = if s.len() % 2 == 1 { (s[0], &s[1..]) } else { (0.0, s) };
                for c in rest.chunks_exact(4) {
                    if b0 == op::HHCURVETO {
                        pen.rcurve_to(c[0], f, c[1], c[2], c[3], 0.0);
                    } else {
                        pen.rcurve_to(f, c[0], c[1], c[2], 0.0, c[3]);
                    }
                    f = 0.0;
                }
            }

            op::CALLSUBR | op::CALLGSUBR => {
                let number = stack.pop()? as i32;
                if call_stack.len() >= MAX_SUBR_DEPTH {
                    return Err(CharstringError::NestingTooDeep(MAX_SUBR_DEPTH));
                }
                let subrs = if b0 == op::CALLSUBR {
                    match local_subrs {
                        Some(subrs) => subrs,
                        None => *local_subrs.insert(cff.subrs_for_glyph(table, glyph)?),
                    }
                } else {
                    cff.global_subrs
                };
                let body = subroutine(table, &subrs, number)?;
                call_stack.push(r);
                r = Reader::new(body);
                clear_stack = false;
            }
            op::RETURN => {
                r = call_stack.pop().ok_or(CharstringError::ReturnWithoutCall)?;
                clear_stack = false;
            }
            op::ENDCHAR => {
                pen.close();
                return Ok(());
            }

            op::ESCAPE => {
                let b1 = r.u8()?;
                flex(&mut pen, b1, &stack)?;
            }

            op::FIXED => {
                stack.push(r.i32()? as f32 / 65536.0)?;
                clear_stack = false;
            }
            op::SHORTINT | 32..=254 => {
                stack.push(read_int(&mut r, b0)? as i16 as f32)?;
                clear_stack = false;
            }
            _ => return Err(CharstringError::UnknownOperator(b0 as u16)),
        }
        if clear_stack {
            stack.len = 0;
        }
    }
    Err(CharstringError::MissingEndchar)
}

fn flex<S: OutlineSink>(pen: &mut Pen<'_, S>, b1: u8, stack: &Stack) -> Result<(), CharstringError> {
    match b1 {
        op::HFLEX => {
            let s = stack.args(7)?;
            pen.rcurve_to(s[0], 0.0, s[1], s[2], s[3], 0.0);
            pen.rcurve_to(s[4], 0.0, s[5], -s[2], s[6], 0.0);
        }
        op::FLEX => {
            // s[12] is the flex depth, ignored.
            let s = stack.args(13)?;
            pen.rcurve_to(s[0], s[1], s[2], s[3], s[4], s[5]);
            pen.rcurve_to(s[6], s[7], s[8], s[9], s[10], s[11]);
        }
        op::HFLEX1 => {
            let s = stack.args(9)?;
            pen.rcurve_to(s[0], s[1], s[2], s[3], s[4], 0.0);
            pen.rcurve_to(s[5], 0.0, s[6], s[7], s[8], -(s[1] + s[3] + s[7]));
        }
        op::FLEX1 => {
            let s = stack.args(11)?;
            let dx = s[0] + s[2] + s[4] + s[6] + s[8];
            let dy = s[1] + s[3] + s[5] + s[7] + s[9];
            // The last operand is the delta along the dominant axis.
            let (dx6, dy6) = if dx.abs() > dy.abs() { (s[10], -dy) } else { (-dx, s[10]) };
            pen.rcurve_to(s[0], s[1], s[2], s[3], s[4], s[5]);
            pen.rcurve_to(s[6], s[7], s[8], s[9], dx6, dy6);
        }
        _ => return Err(CharstringError::UnknownOperator(0x0c00 | b1 as u16)),
    }
    Ok(())
}
