use cosmic_text::{
    Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache, SwashContent, SwashImage,
    fontdb,
};

/// Logical DPI that point sizes are converted with, before scaling.
const POINTS_DPI: f32 = 96.0;

const DEFAULT_POINTS: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum FontFamily {
    Monospace,
    SansSerif,
    Serif,
    Named(String),
}

impl FontFamily {
    fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "monospace" | "mono" => Self::Monospace,
            "sans" | "sans-serif" | "sans serif" => Self::SansSerif,
            "serif" => Self::Serif,
            _ => Self::Named(name.trim().to_string()),
        }
    }

    fn as_cosmic(&self) -> Family<'_> {
        match self {
            Self::Monospace => Family::Monospace,
            Self::SansSerif => Family::SansSerif,
            Self::Serif => Family::Serif,
            Self::Named(name) => Family::Name(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FontSize {
    Points(f32),
    Pixels(f32),
}

/// A parsed font description such as `monospace:size=10` or `JetBrainsMono Nerd Font 14px`.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescription {
    pub family: FontFamily,
    pub size: FontSize,
}

impl FontDescription {
    /// Device pixel size at the given output scale.
    pub fn pixel_size(&self, scale: u32) -> f32 {
        let unscaled = match self.size {
            FontSize::Points(points) => points * POINTS_DPI / 72.0,
            FontSize::Pixels(pixels) => pixels,
        };
        unscaled * scale.max(1) as f32
    }

    // family:size=10 / family:pixelsize=14
    fn parse_attributes(s: &str) -> Result<Self, String> {
        let mut parts = s.split(':');
        let family = parts.next().unwrap_or_default();
        let mut size = FontSize::Points(DEFAULT_POINTS);

        for attr in parts {
            let Some((key, value)) = attr.split_once('=') else {
                continue;
            };
            let value: f32 = value
                .trim()
                .parse()
                .map_err(|_| format!("Invalid font size: {}", value))?;
            match key.trim() {
                "size" => size = FontSize::Points(value),
                "pixelsize" => size = FontSize::Pixels(value),
                _ => {}
            }
        }

        Ok(Self {
            family: FontFamily::parse(family),
            size,
        })
    }

    // family 10 / family 14px
    fn parse_trailing_size(s: &str) -> Self {
        let (family, last) = s.trim().rsplit_once(' ').unwrap_or((s, ""));

        let size = if let Some(px) = last.strip_suffix("px") {
            px.parse().ok().map(FontSize::Pixels)
        } else {
            last.parse().ok().map(FontSize::Points)
        };

        match size {
            Some(size) => Self {
                family: FontFamily::parse(family),
                size,
            },
            None => Self {
                family: FontFamily::parse(s),
                size: FontSize::Points(DEFAULT_POINTS),
            },
        }
    }
}

impl std::str::FromStr for FontDescription {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("Empty font description".to_string());
        }
        if s.contains(':') {
            Self::parse_attributes(s)
        } else {
            Ok(Self::parse_trailing_size(s))
        }
    }
}

impl Default for FontDescription {
    fn default() -> Self {
        Self {
            family: FontFamily::Monospace,
            size: FontSize::Points(DEFAULT_POINTS),
        }
    }
}

/// A font resolved for one output scale. Rebuilt, never patched, when the scale changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledFont {
    pub family: FontFamily,
    pub scale: u32,
    pub pixel_size: f32,
    pub ascent: f32,
    pub descent: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphKind {
    /// One coverage byte per pixel.
    Mask,
    /// Straight RGBA, four bytes per pixel.
    Color,
}

/// A rasterized glyph bitmap. `left`/`top` place it relative to the pen on the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphImage {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub kind: GlyphKind,
    pub data: Vec<u8>,
}

impl GlyphImage {
    fn from_swash(image: &SwashImage) -> Self {
        let placement = image.placement;
        let (kind, data) = match image.content {
            SwashContent::Mask => (GlyphKind::Mask, image.data.clone()),
            SwashContent::Color => (GlyphKind::Color, image.data.clone()),
            // Collapse subpixel coverage to a single alpha channel
            SwashContent::SubpixelMask => (
                GlyphKind::Mask,
                image
                    .data
                    .chunks_exact(4)
                    .map(|px| ((px[0] as u16 + px[1] as u16 + px[2] as u16) / 3) as u8)
                    .collect(),
            ),
        };

        Self {
            left: placement.left,
            top: placement.top,
            width: placement.width,
            height: placement.height,
            kind,
            data,
        }
    }
}

/// A glyph positioned along a run. `x`/`y` are the pen offset from the run origin.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedGlyph {
    pub x: i32,
    pub y: i32,
    pub image: GlyphImage,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapedRun {
    /// Sum of glyph advances in device pixels.
    pub width: i32,
    pub glyphs: Vec<PlacedGlyph>,
}

/// Turns text into positioned glyph bitmaps.
pub trait Shaper {
    fn load(&mut self, description: &FontDescription, scale: u32) -> ScaledFont;
    fn shape(&mut self, text: &str, font: &ScaledFont) -> ShapedRun;
}

pub struct CosmicShaper {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

impl CosmicShaper {
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            swash_cache: SwashCache::new(),
        }
    }

    fn vertical_metrics(&mut self, family: &FontFamily, pixel_size: f32) -> Option<(f32, f32)> {
        let families = [family.as_cosmic()];
        let query = fontdb::Query {
            families: &families,
            ..fontdb::Query::default()
        };
        let id = self.font_system.db().query(&query)?;
        let font = self.font_system.get_font(id)?;
        let metrics = font.as_swash().metrics(&[]).scale(pixel_size);
        Some((metrics.ascent, metrics.descent.abs()))
    }
}

impl Default for CosmicShaper {
    fn default() -> Self {
        Self::new()
    }
}

impl Shaper for CosmicShaper {
    fn load(&mut self, description: &FontDescription, scale: u32) -> ScaledFont {
        let pixel_size = description.pixel_size(scale);
        let (ascent, descent) = self
            .vertical_metrics(&description.family, pixel_size)
            .unwrap_or_else(|| {
                log::warn!("no face found for {:?}, estimating metrics", description.family);
                (pixel_size * 0.8, pixel_size * 0.2)
            });

        log::debug!(
            "loaded {:?} at {pixel_size}px (scale {scale}), ascent {ascent:.1}, descent {descent:.1}",
            description.family
        );

        ScaledFont {
            family: description.family.clone(),
            scale,
            pixel_size,
            ascent,
            descent,
        }
    }

    fn shape(&mut self, text: &str, font: &ScaledFont) -> ShapedRun {
        let metrics = Metrics::new(font.pixel_size, font.pixel_size * 1.2);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(&mut self.font_system, None, None);
        buffer.set_text(
            &mut self.font_system,
            text,
            &Attrs::new().family(font.family.as_cosmic()),
            Shaping::Advanced,
        );
        buffer.shape_until_scroll(&mut self.font_system, false);

        let mut shaped = ShapedRun::default();
        for run in buffer.layout_runs() {
            shaped.width = shaped.width.max(run.line_w.round() as i32);
            for glyph in run.glyphs.iter() {
                let physical = glyph.physical((0.0, 0.0), 1.0);
                if let Some(image) = self
                    .swash_cache
                    .get_image(&mut self.font_system, physical.cache_key)
                {
                    shaped.glyphs.push(PlacedGlyph {
                        x: physical.x,
                        y: physical.y,
                        image: GlyphImage::from_swash(image),
                    });
                }
            }
        }

        shaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fcft_style_points() {
        let font: FontDescription = "monospace:size=10".parse().unwrap();
        assert_eq!(font.family, FontFamily::Monospace);
        assert_eq!(font.size, FontSize::Points(10.0));
    }

    #[test]
    fn parses_fcft_style_pixels() {
        let font: FontDescription = "Iosevka:weight=bold:pixelsize=16".parse().unwrap();
        assert_eq!(font.family, FontFamily::Named("Iosevka".into()));
        assert_eq!(font.size, FontSize::Pixels(16.0));
    }

    #[test]
    fn parses_trailing_pixel_size_with_spaces_in_family() {
        let font: FontDescription = "JetBrainsMono Nerd Font 14px".parse().unwrap();
        assert_eq!(font.family, FontFamily::Named("JetBrainsMono Nerd Font".into()));
        assert_eq!(font.size, FontSize::Pixels(14.0));
    }

    #[test]
    fn family_without_size_gets_default() {
        let font: FontDescription = "DejaVu Sans Mono".parse().unwrap();
        assert_eq!(font.family, FontFamily::Named("DejaVu Sans Mono".into()));
        assert_eq!(font.size, FontSize::Points(DEFAULT_POINTS));
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!("monospace:size=big".parse::<FontDescription>().is_err());
        assert!("".parse::<FontDescription>().is_err());
    }

    #[test]
    fn pixel_size_scales_without_mutating_the_description() {
        let font: FontDescription = "monospace 14px".parse().unwrap();
        assert_eq!(font.pixel_size(2), 28.0);
        assert_eq!(font.pixel_size(1), 14.0);
        assert_eq!(font.size, FontSize::Pixels(14.0));
    }

    #[test]
    fn points_convert_at_96_dpi() {
        let font: FontDescription = "monospace:size=12".parse().unwrap();
        assert_eq!(font.pixel_size(1), 16.0);
        assert_eq!(font.pixel_size(3), 48.0);
    }
}
