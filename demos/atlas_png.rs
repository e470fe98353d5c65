use euclid::Point2D;
use image::{ImageBuffer, Luma};
use suzuri_raster::{
    Bitmap, FontBlob, FontInfo,
    pack::{Codepoints, PackConfig, PackContext, PackRange},
};

const ATLAS_SIZE: u32 = 512;

#[allow(clippy::unwrap_used)]
fn main() {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .expect("usage: atlas_png <font file> [pixel height]");
    let font_size: f32 = std::env::args()
        .nth(2)
        .map(|s| s.parse().expect("pixel height must be a number"))
        .unwrap_or(32.0);

    let blob = FontBlob::from(std::fs::read(&path).expect("failed to read font file"));
    let font = FontInfo::load(&blob, 0).expect("failed to parse font");
    println!(
        "Loaded {path}: {} glyphs, {} outlines",
        font.num_glyphs(),
        if font.is_cff() { "CFF" } else { "TrueType" }
    );

    // Pack printable ASCII with 2x2 oversampling
    let config = PackConfig {
        width: ATLAS_SIZE,
        height: ATLAS_SIZE,
        h_oversample: 2,
        v_oversample: 2,
        ..PackConfig::default()
    };
    let mut context = PackContext::new(&config).unwrap();
    let mut ranges = [PackRange::new(font_size, Codepoints::Range { first: 32, count: 95 })];
    let mut pixels = vec![0u8; (ATLAS_SIZE * ATLAS_SIZE) as usize];
    let mut atlas = Bitmap::new(ATLAS_SIZE, ATLAS_SIZE, ATLAS_SIZE as usize, &mut pixels).unwrap();

    let timer = std::time::Instant::now();
    let all_packed = context.pack_font_ranges(&mut atlas, &font, &mut ranges);
    println!("Packed atlas (all glyphs: {all_packed}, elapsed: {:.2?})", timer.elapsed());

    // Lay out a sample line with the packed quads
    let text = "The quick brown fox jumps over the lazy dog.";
    let scale = font.scale_for_size(font_size);
    let ascent = font.v_metrics().ascent as f32 * scale;
    let line_height = font_size.ceil() as u32 + 2;
    let line_width = 4 + text
        .chars()
        .filter_map(|c| ranges[0].packed.get((c as u32).wrapping_sub(32) as usize))
        .map(|p| p.x_advance)
        .sum::<f32>()
        .ceil() as u32;
    let mut line = vec![0u8; (line_width * line_height) as usize];
    let mut pen = Point2D::new(2.0, ascent + 1.0);
    for c in text.chars() {
        let Some(packed) = ranges[0].packed.get((c as u32).wrapping_sub(32) as usize) else {
            continue;
        };
        let quad = packed.quad(ATLAS_SIZE, ATLAS_SIZE, &mut pen, true);
        let (x0, y0) = (quad.screen.min.x as i32, quad.screen.min.y as i32);
        for ay in packed.atlas.min.y..packed.atlas.max.y {
            for ax in packed.atlas.min.x..packed.atlas.max.x {
                let x = x0 + (ax - packed.atlas.min.x) as i32;
                let y = y0 + (ay - packed.atlas.min.y) as i32;
                if x < 0 || y < 0 || x >= line_width as i32 || y >= line_height as i32 {
                    continue;
                }
                let dst = &mut line[(y as u32 * line_width + x as u32) as usize];
                *dst = (*dst).max(pixels[ay as usize * ATLAS_SIZE as usize + ax as usize]);
            }
        }
    }

    // Ensure debug directory exists
    std::fs::create_dir_all("debug").expect("failed to create debug directory");

    let atlas_image: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_raw(ATLAS_SIZE, ATLAS_SIZE, pixels).unwrap();
    atlas_image.save("debug/atlas.png").expect("failed to save atlas image");

    let line_image: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_raw(line_width, line_height, line).unwrap();
    line_image.save("debug/atlas_line.png").expect("failed to save line image");

    println!("Saved debug/atlas.png and debug/atlas_line.png");
}
