use crate::{
    geometry::{BYTES_PER_PIXEL, Extent},
    text::{GlyphImage, GlyphKind},
    theme::{Bgra, mul_div255},
};

/// Direct pixel access to one mapped ARGB8888 buffer.
pub struct Canvas<'a> {
    pixel_data: &'a mut [u8],
    width: i32,
    height: i32,
}

impl<'a> Canvas<'a> {
    pub fn new(pixel_data: &'a mut [u8], extent: Extent) -> Self {
        assert!(
            pixel_data.len() >= extent.byte_len(),
            "buffer of {} bytes is too small for {}x{}",
            pixel_data.len(),
            extent.width,
            extent.height
        );
        Self {
            pixel_data,
            width: extent.width as i32,
            height: extent.height as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Overwrites every pixel, no blending.
    pub fn fill(&mut self, color: Bgra) {
        let len = (self.width * self.height) as usize * BYTES_PER_PIXEL as usize;
        for pixel in self.pixel_data[..len].chunks_exact_mut(BYTES_PER_PIXEL as usize) {
            pixel.copy_from_slice(color.as_ref());
        }
    }

    #[inline]
    fn pixel_idx(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some(((y * self.width + x) * BYTES_PER_PIXEL as i32) as usize)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Bgra> {
        let idx = self.pixel_idx(x, y)?;
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.pixel_data[idx..idx + 4]);
        Some(Bgra::from_bytes(bytes))
    }

    /// Premultiplied OVER of `color` onto the pixel at `(x, y)`. Out of bounds is clipped.
    pub fn blend(&mut self, x: i32, y: i32, color: Bgra) {
        let Some(idx) = self.pixel_idx(x, y) else {
            return;
        };

        let inv_alpha = 255 - color.a();
        let dst = &mut self.pixel_data[idx..idx + 4];
        dst[0] = color.b().saturating_add(mul_div255(dst[0], inv_alpha));
        dst[1] = color.g().saturating_add(mul_div255(dst[1], inv_alpha));
        dst[2] = color.r().saturating_add(mul_div255(dst[2], inv_alpha));
        dst[3] = color.a().saturating_add(mul_div255(dst[3], inv_alpha));
    }

    /// Draws one rasterized glyph whose bitmap origin lands on `(x, y)`.
    ///
    /// Mask glyphs are painted through `foreground`; color glyphs keep their own pixels.
    pub fn composite(&mut self, x: i32, y: i32, glyph: &GlyphImage, foreground: Bgra) {
        let width = glyph.width as i32;
        for gy in 0..glyph.height as i32 {
            for gx in 0..width {
                let i = (gy * width + gx) as usize;
                let color = match glyph.kind {
                    GlyphKind::Mask => match glyph.data.get(i) {
                        Some(&coverage) => foreground.with_coverage(coverage),
                        None => continue,
                    },
                    GlyphKind::Color => match glyph.data.get(i * 4..i * 4 + 4) {
                        Some(&[r, g, b, a]) => Bgra::from_rgba(r, g, b, a),
                        _ => continue,
                    },
                };
                if color.a() == 0 {
                    continue;
                }
                self.blend(x + gx, y + gy, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BG: Bgra = Bgra::from_packed_rgba(0x0c0c0cff);
    const FG: Bgra = Bgra::from_packed_rgba(0xbbbbbbff);

    fn solid_mask(width: u32, height: u32, coverage: u8) -> GlyphImage {
        GlyphImage {
            left: 0,
            top: 0,
            width,
            height,
            kind: GlyphKind::Mask,
            data: vec![coverage; (width * height) as usize],
        }
    }

    #[test]
    fn fill_overwrites_every_pixel() {
        let extent = Extent::new(4, 2);
        let mut data = vec![0xaa; extent.byte_len()];
        let mut canvas = Canvas::new(&mut data, extent);
        canvas.fill(BG);
        assert!(data.chunks_exact(4).all(|px| px == BG.as_ref()));
    }

    #[test]
    fn full_coverage_mask_paints_foreground() {
        let extent = Extent::new(8, 8);
        let mut data = vec![0; extent.byte_len()];
        let mut canvas = Canvas::new(&mut data, extent);
        canvas.fill(BG);
        canvas.composite(2, 2, &solid_mask(2, 2, 255), FG);

        assert_eq!(canvas.pixel(2, 2), Some(FG));
        assert_eq!(canvas.pixel(3, 3), Some(FG));
        assert_eq!(canvas.pixel(4, 4), Some(BG));
    }

    #[test]
    fn zero_coverage_keeps_background() {
        let extent = Extent::new(4, 4);
        let mut data = vec![0; extent.byte_len()];
        let mut canvas = Canvas::new(&mut data, extent);
        canvas.fill(BG);
        canvas.composite(0, 0, &solid_mask(4, 4, 0), FG);
        assert!(data.chunks_exact(4).all(|px| px == BG.as_ref()));
    }

    #[test]
    fn half_coverage_blends_between_colors() {
        let extent = Extent::new(1, 1);
        let mut data = vec![0; extent.byte_len()];
        let mut canvas = Canvas::new(&mut data, extent);
        canvas.fill(Bgra::from_packed_rgba(0x000000ff));
        canvas.composite(0, 0, &solid_mask(1, 1, 128), Bgra::from_packed_rgba(0xffffffff));

        let px = canvas.pixel(0, 0).unwrap();
        assert_eq!(px.a(), 255);
        assert!((127..=129).contains(&px.r()), "got {}", px.r());
    }

    #[test]
    fn color_glyphs_ignore_foreground() {
        let extent = Extent::new(1, 1);
        let mut data = vec![0; extent.byte_len()];
        let mut canvas = Canvas::new(&mut data, extent);
        canvas.fill(BG);
        let red = GlyphImage {
            left: 0,
            top: 0,
            width: 1,
            height: 1,
            kind: GlyphKind::Color,
            data: vec![255, 0, 0, 255],
        };
        canvas.composite(0, 0, &red, FG);
        assert_eq!(canvas.pixel(0, 0), Some(Bgra::from_packed_rgba(0xff0000ff)));
    }

    #[test]
    fn glyphs_outside_the_buffer_are_clipped() {
        let extent = Extent::new(4, 4);
        let mut data = vec![0; extent.byte_len()];
        let mut canvas = Canvas::new(&mut data, extent);
        canvas.fill(BG);
        canvas.composite(-3, -3, &solid_mask(4, 4, 255), FG);
        canvas.composite(3, 3, &solid_mask(4, 4, 255), FG);

        assert_eq!(canvas.pixel(0, 0), Some(FG));
        assert_eq!(canvas.pixel(1, 1), Some(BG));
        assert_eq!(canvas.pixel(3, 3), Some(FG));
    }
}
