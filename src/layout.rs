use crate::{
    canvas::Canvas,
    content::split_segments,
    text::{FontDescription, ScaledFont, Shaper},
    theme::Theme,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Center,
    End,
}

impl Align {
    pub const ALL: [Self; 3] = [Self::Start, Self::Center, Self::End];

    /// Left edge of a run of `run_width` pixels inside a buffer `buffer_width` wide.
    pub fn origin(self, buffer_width: i32, run_width: i32) -> i32 {
        match self {
            Self::Start => 0,
            Self::Center => (buffer_width - run_width) / 2,
            Self::End => buffer_width - run_width,
        }
    }
}

/// Baseline that vertically centers the font's ascent + descent box.
pub fn baseline(buffer_height: i32, ascent: f32, descent: f32) -> i32 {
    (buffer_height as f32 / 2.0 + (ascent - descent) / 2.0).round() as i32
}

/// Draws status lines with one font description and one theme.
pub struct Painter<S> {
    shaper: S,
    description: FontDescription,
    theme: Theme,
}

impl<S: Shaper> Painter<S> {
    pub fn new(shaper: S, description: FontDescription, theme: Theme) -> Self {
        Self {
            shaper,
            description,
            theme,
        }
    }

    pub fn shaper(&self) -> &S {
        &self.shaper
    }

    /// Builds a fresh font for an output scale.
    pub fn load_font(&mut self, scale: u32) -> ScaledFont {
        self.shaper.load(&self.description, scale)
    }

    pub fn paint(&mut self, canvas: &mut Canvas, font: &ScaledFont, status: &str) {
        canvas.fill(self.theme.background);

        let y = baseline(canvas.height(), font.ascent, font.descent);
        for (segment, align) in split_segments(status).into_iter().zip(Align::ALL) {
            if segment.is_empty() {
                continue;
            }

            let run = self.shaper.shape(segment, font);
            let x = align.origin(canvas.width(), run.width);
            log::trace!("{align:?} segment {segment:?} at x={x}, width {}", run.width);

            for glyph in &run.glyphs {
                canvas.composite(
                    x + glyph.x + glyph.image.left,
                    y + glyph.y - glyph.image.top,
                    &glyph.image,
                    self.theme.foreground,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_aligned_runs_touch_the_right_edge() {
        for buffer_width in [1, 20, 800, 1600] {
            for run_width in 0..=buffer_width.min(64) {
                let x = Align::End.origin(buffer_width, run_width);
                assert_eq!(x + run_width, buffer_width);
            }
        }
    }

    #[test]
    fn start_is_flush_left_and_center_is_centered() {
        assert_eq!(Align::Start.origin(800, 120), 0);
        assert_eq!(Align::Center.origin(800, 120), 340);
    }

    #[test]
    fn baseline_centers_the_em_box() {
        // 20px tall bar, 12px ascent, 4px descent: box spans 2..18 around baseline 14
        assert_eq!(baseline(20, 12.0, 4.0), 14);
        assert_eq!(baseline(40, 24.0, 8.0), 28);
    }
}
