//! CPU-side RGBA images.
//!
//! Every decoded resource (graphics pages, sprites, the screen mirror) and
//! the render target itself is an `Image`. Pixels are stored row-major as
//! RGBA bytes so the buffer can be streamed to a texture unmodified.

pub mod font;


use crate::color::Rgba;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32, fill: Rgba) -> Self {
        let mut img = Image {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        };
        img.fill(fill);
        img
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major. Pitch is `width * 4`.
    pub fn bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn fill(&mut self, c: Rgba) {
        for px in self.pixels.chunks_exact_mut(4) {
            px[0] = c.r;
            px[1] = c.g;
            px[2] = c.b;
            px[3] = c.a;
        }
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    pub fn get(&self, x: i32, y: i32) -> Option<Rgba> {
        self.index(x, y).map(|i| {
            Rgba::new(
                self.pixels[i],
                self.pixels[i + 1],
                self.pixels[i + 2],
                self.pixels[i + 3],
            )
        })
    }

    /// Write a pixel. Returns false when the coordinate is out of bounds.
    pub fn set(&mut self, x: i32, y: i32, c: Rgba) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.pixels[i] = c.r;
                self.pixels[i + 1] = c.g;
                self.pixels[i + 2] = c.b;
                self.pixels[i + 3] = c.a;
                true
            }
            None => false,
        }
    }

    /// Copy a sub-rectangle. The caller must have validated the bounds.
    pub fn sub_image(&self, x: u32, y: u32, w: u32, h: u32) -> Image {
        let mut out = Image::new(w, h, Rgba::new(0, 0, 0, 0));
        for row in 0..h {
            for col in 0..w {
                if let Some(c) = self.get((x + col) as i32, (y + row) as i32) {
                    out.set(col as i32, row as i32, c);
                }
            }
        }
        out
    }
}
