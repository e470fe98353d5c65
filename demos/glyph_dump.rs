use euclid::Vector2D;
use image::{ImageBuffer, Luma};
use suzuri_raster::{FontBlob, FontInfo, Vertex};

const SHADES: &[u8] = b" .:-=+*#%@";

#[allow(clippy::unwrap_used)]
fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: glyph_dump <font file> [char] [pixel height]");
    let c = args.next().and_then(|s| s.chars().next()).unwrap_or('g');
    let font_size: f32 = args
        .next()
        .map(|s| s.parse().expect("pixel height must be a number"))
        .unwrap_or(24.0);

    let blob = FontBlob::from(std::fs::read(&path).expect("failed to read font file"));
    println!("{path}: {} face(s)", blob.num_fonts());
    let font = FontInfo::load(&blob, 0).expect("failed to parse font");

    let glyph = font.glyph_index(c as u32);
    let metrics = font.h_metrics(glyph);
    println!(
        "'{c}' -> glyph {glyph}, advance {}, lsb {}",
        metrics.advance_width, metrics.left_side_bearing
    );

    match font.glyph_shape(glyph) {
        Ok(outline) => {
            let curves = outline
                .vertices
                .iter()
                .filter(|v| matches!(v, Vertex::QuadTo { .. } | Vertex::CubicTo { .. }))
                .count();
            println!(
                "outline: {} contours, {} vertices ({curves} curves)",
                outline.num_contours(),
                outline.len()
            );
        }
        Err(e) => println!("outline failed: {e}"),
    }

    let scale = font.scale_for_size(font_size);
    let bitmap = font
        .glyph_bitmap(glyph, Vector2D::new(scale, scale), Vector2D::zero())
        .expect("failed to rasterize glyph");
    println!(
        "bitmap: {}x{} at offset ({}, {})",
        bitmap.width, bitmap.height, bitmap.offset.x, bitmap.offset.y
    );

    for row in bitmap.pixels.chunks(bitmap.width.max(1) as usize) {
        let line: String = row
            .iter()
            .map(|&p| SHADES[p as usize * (SHADES.len() - 1) / 255] as char)
            .collect();
        println!("{line}");
    }

    if bitmap.width == 0 || bitmap.height == 0 {
        println!("Bitmap is empty; nothing to write.");
        return;
    }

    // Ensure debug directory exists
    std::fs::create_dir_all("debug").expect("failed to create debug directory");

    let img_buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_raw(bitmap.width, bitmap.height, bitmap.pixels).unwrap();
    img_buffer.save("debug/glyph.png").expect("failed to save glyph image");
    println!("Saved debug image to debug/glyph.png");
}
