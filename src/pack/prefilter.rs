//! Box filters applied to oversampled glyphs.
//!
//! A glyph rendered at `n` times the target resolution is smeared by an
//! `n`-wide running average, so that sampling it at the target resolution
//! behaves like sampling a properly positioned subpixel glyph.

use crate::raster::Bitmap;

/// Largest accepted oversampling factor.
pub const MAX_OVERSAMPLE: u32 = 8;

const OVER_MASK: usize = MAX_OVERSAMPLE as usize - 1;

/// Runs the running-sum filter over one line of `len` samples, reading and
/// writing sample `i` at `line[i * step]`.
fn filter_line(line: &mut [u8], len: usize, step: usize, kernel: usize) {
    let mut history = [0u8; MAX_OVERSAMPLE as usize];
    let mut total: i32 = 0;
    let safe = len.saturating_sub(kernel);
    let mut i = 0;
    if len >= kernel {
        while i <= safe {
            let sample = line[i * step];
            total += sample as i32 - history[i & OVER_MASK] as i32;
            history[(i + kernel) & OVER_MASK] = sample;
            line[i * step] = (total / kernel as i32) as u8;
            i += 1;
        }
    }
    // The trailing samples are padding; only the window drains.
    while i < len {
        total -= history[i & OVER_MASK] as i32;
        line[i * step] = (total / kernel as i32) as u8;
        i += 1;
    }
}

/// Horizontal box filter of width `kernel` over every row.
pub fn h_prefilter(bitmap: &mut Bitmap<'_>, kernel: u32) {
    let kernel = kernel.clamp(1, MAX_OVERSAMPLE) as usize;
    let width = bitmap.width() as usize;
    for y in 0..bitmap.height() as usize {
        filter_line(bitmap.row_mut(y), width, 1, kernel);
    }
}

/// Vertical box filter of height `kernel` over every column.
pub fn v_prefilter(bitmap: &mut Bitmap<'_>, kernel: u32) {
    let kernel = kernel.clamp(1, MAX_OVERSAMPLE) as usize;
    let (width, height, stride) = (bitmap.width() as usize, bitmap.height() as usize, bitmap.stride());
    let pixels = bitmap.pixels_mut();
    for x in 0..width {
        filter_line(&mut pixels[x..], height, stride, kernel);
    }
}

/// Offset that re-centres a glyph filtered with an `oversample`-wide box.
pub fn oversample_shift(oversample: u32) -> f32 {
    if oversample == 0 {
        return 0.0;
    }
    -((oversample - 1) as f32) / (2.0 * oversample as f32)
}
