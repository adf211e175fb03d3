/// Bytes per ARGB8888 pixel.
pub const BYTES_PER_PIXEL: u32 = 4;

/// DPI assumed when an output does not report its physical size.
pub const FALLBACK_DPI: f32 = 96.0;

const MM_PER_INCH: f32 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Logical size multiplied into device pixels.
    pub const fn scaled(self, scale: u32) -> Self {
        Self {
            width: self.width * scale,
            height: self.height * scale,
        }
    }

    pub const fn stride(&self) -> u32 {
        self.width * BYTES_PER_PIXEL
    }

    pub const fn byte_len(&self) -> usize {
        self.stride() as usize * self.height as usize
    }
}

/// Diagonal DPI of an output from its physical size in millimetres and its mode in pixels.
pub fn dpi(physical_mm: (i32, i32), pixels: (i32, i32)) -> f32 {
    let (width_mm, height_mm) = physical_mm;
    if width_mm <= 0 && height_mm <= 0 {
        return FALLBACK_DPI;
    }

    let diagonal_in = (width_mm as f32).hypot(height_mm as f32) / MM_PER_INCH;
    let diagonal_px = (pixels.0 as f32).hypot(pixels.1 as f32);
    if diagonal_px == 0.0 {
        return FALLBACK_DPI;
    }

    diagonal_px / diagonal_in
}
