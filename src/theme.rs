/// A premultiplied pixel in `wl_shm` ARGB8888 byte order (little endian: B, G, R, A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bgra([u8; 4]);

impl Bgra {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);

    pub const fn from_rgba(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self([
            premultiply(blue, alpha),
            premultiply(green, alpha),
            premultiply(red, alpha),
            alpha,
        ])
    }

    /// Unpacks `0xRRGGBBAA`.
    pub const fn from_packed_rgba(rgba: u32) -> Self {
        Self::from_rgba(
            (rgba >> 24) as u8,
            (rgba >> 16) as u8,
            (rgba >> 8) as u8,
            rgba as u8,
        )
    }

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn b(&self) -> u8 {
        self.0[0]
    }

    pub const fn g(&self) -> u8 {
        self.0[1]
    }

    pub const fn r(&self) -> u8 {
        self.0[2]
    }

    pub const fn a(&self) -> u8 {
        self.0[3]
    }

    /// Scales every channel by `coverage / 255`.
    pub const fn with_coverage(self, coverage: u8) -> Self {
        Self([
            mul_div255(self.0[0], coverage),
            mul_div255(self.0[1], coverage),
            mul_div255(self.0[2], coverage),
            mul_div255(self.0[3], coverage),
        ])
    }
}

impl AsRef<[u8]> for Bgra {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[inline]
pub const fn mul_div255(a: u8, b: u8) -> u8 {
    ((a as u16 * b as u16 + 127) / 255) as u8
}

const fn premultiply(channel: u8, alpha: u8) -> u8 {
    mul_div255(channel, alpha)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub foreground: Bgra,
    pub background: Bgra,
}

impl Theme {
    pub const DEFAULT_FOREGROUND: u32 = 0xbbbbbbff;
    pub const DEFAULT_BACKGROUND: u32 = 0x0c0c0cff;

    pub const fn from_packed(foreground: u32, background: u32) -> Self {
        Self {
            foreground: Bgra::from_packed_rgba(foreground),
            background: Bgra::from_packed_rgba(background),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_packed(Self::DEFAULT_FOREGROUND, Self::DEFAULT_BACKGROUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_rgba_is_stored_as_bgra() {
        let color = Bgra::from_packed_rgba(0x11223344);
        assert_eq!(color.a(), 0x44);
        // premultiplied by 0x44 / 0xff
        assert_eq!(color.r(), mul_div255(0x11, 0x44));
        assert_eq!(color.g(), mul_div255(0x22, 0x44));
        assert_eq!(color.b(), mul_div255(0x33, 0x44));
    }

    #[test]
    fn opaque_colors_are_unchanged_by_premultiplication() {
        let color = Bgra::from_packed_rgba(0xbbbbbbff);
        assert_eq!(color.as_ref(), &[0xbb, 0xbb, 0xbb, 0xff]);
    }

    #[test]
    fn zero_coverage_is_transparent() {
        let color = Bgra::from_packed_rgba(0xffffffff).with_coverage(0);
        assert_eq!(color, Bgra::TRANSPARENT);
    }
}
