//! 8-bit indexed color model.
//!
//! Colors are packed 3/3/2: bits 0-2 red level (0-7), bits 3-5 green level
//! (0-7), bits 6-7 blue level (0-3). Each level maps to a full 8-bit channel
//! by scaling to 255 and rounding.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }
}

/// Undecoded-pixel fill for truncated graphics chunks.
pub const SENTINEL: Rgba = Rgba::new(255, 0, 255, 255);

/// Expand a packed color index to RGBA. Alpha is always 255.
pub fn expand(index: u8) -> Rgba {
    let r = (index & 0x07) as f64 / 7.0;
    let g = ((index >> 3) & 0x07) as f64 / 7.0;
    let b = ((index >> 6) & 0x03) as f64 / 3.0;
    Rgba {
        r: (r * 255.0).round() as u8,
        g: (g * 255.0).round() as u8,
        b: (b * 255.0).round() as u8,
        a: 255,
    }
}

/// Re-quantize an RGBA color to the nearest packed index.
///
/// Per-channel linear re-quantization, not a nearest-palette-entry search;
/// only exact on inputs whose channels already sit on a representable level.
pub fn quantize(c: Rgba) -> u8 {
    let r = ((c.r as f64 / 255.0) * 7.0).round().clamp(0.0, 7.0) as u8;
    let g = ((c.g as f64 / 255.0) * 7.0).round().clamp(0.0, 7.0) as u8;
    let b = ((c.b as f64 / 255.0) * 3.0).round().clamp(0.0, 3.0) as u8;
    (b << 6) | (g << 3) | r
}

/// The full 256-entry index -> RGBA table, built once at startup and
/// immutable afterwards.
pub struct Palette {
    lut: [Rgba; 256],
}

impl Palette {
    pub fn build() -> Self {
        let mut lut = [Rgba::new(0, 0, 0, 0); 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = expand(i as u8);
        }
        Palette { lut }
    }

    #[inline]
    pub fn color(&self, index: u8) -> Rgba {
        self.lut[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_extremes() {
        assert_eq!(expand(0x00), Rgba::new(0, 0, 0, 255));
        assert_eq!(expand(0xFF), Rgba::new(255, 255, 255, 255));
        // Pure red: level 7 in the low field.
        assert_eq!(expand(0x07), Rgba::new(255, 0, 0, 255));
        // Pure blue: level 3 in the top field.
        assert_eq!(expand(0xC0), Rgba::new(0, 0, 255, 255));
    }

    #[test]
    fn expand_is_opaque_everywhere() {
        for i in 0..=255u8 {
            assert_eq!(expand(i).a, 255);
        }
    }

    #[test]
    fn quantize_round_trips_every_index() {
        // Every expanded entry is a field fixed point of the quantizer.
        for i in 0..=255u8 {
            assert_eq!(quantize(expand(i)), i, "index {:#04x}", i);
        }
    }

    #[test]
    fn quantize_snaps_near_misses() {
        // 254,254,254 is within rounding distance of full white.
        assert_eq!(quantize(Rgba::new(254, 254, 254, 255)), 0xFF);
        assert_eq!(quantize(Rgba::new(1, 1, 1, 255)), 0x00);
    }

    #[test]
    fn palette_matches_expand() {
        let pal = Palette::build();
        for i in 0..=255u8 {
            assert_eq!(pal.color(i), expand(i));
        }
    }
}
