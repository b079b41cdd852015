//! The render target and its CPU pixel mirror.
//!
//! `Screen` is the 320x240 framebuffer all drawing lands in; the frontend
//! streams its bytes to a texture once per frame. `ScreenCache` sits in
//! front of it for pixel read-back: direct pixel writes are tracked in
//! place while the mirror is clean, anything else invalidates it, and a
//! read re-derives the mirror from a full readback only when it has to.

use crate::color::Rgba;
use crate::gfx::font;
use crate::gfx::Image;

pub const SCREEN_WIDTH: u32 = 320;
pub const SCREEN_HEIGHT: u32 = 240;

#[derive(Debug, Clone, Copy)]
struct Clip {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

pub struct Screen {
    target: Image,
    clip: Option<Clip>,
}

impl Screen {
    pub fn new() -> Self {
        Screen {
            target: Image::new(SCREEN_WIDTH, SCREEN_HEIGHT, Rgba::new(0, 0, 0, 255)),
            clip: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.target.width()
    }

    pub fn height(&self) -> u32 {
        self.target.height()
    }

    /// Framebuffer bytes for texture upload.
    pub fn bytes(&self) -> &[u8] {
        self.target.bytes()
    }

    /// Full readback of the current target contents.
    pub fn read_back(&self) -> Image {
        self.target.clone()
    }

    pub fn set_clip(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.clip = Some(Clip { x, y, w, h });
    }

    pub fn clear_clip(&mut self) {
        self.clip = None;
    }

    #[inline]
    fn in_clip(&self, x: i32, y: i32) -> bool {
        match self.clip {
            Some(c) => x >= c.x && y >= c.y && x < c.x + c.w && y < c.y + c.h,
            None => true,
        }
    }

    /// Clears the whole target, clip region included.
    pub fn clear(&mut self, c: Rgba) {
        self.target.fill(c);
    }

    /// Write one pixel, honoring the clip region. Returns whether a pixel
    /// actually landed in the target.
    pub fn set_pixel(&mut self, x: i32, y: i32, c: Rgba) -> bool {
        if !self.in_clip(x, y) {
            return false;
        }
        self.target.set(x, y, c)
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Rgba> {
        self.target.get(x, y)
    }

    pub fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, c: Rgba) {
        // Bresenham.
        let (mut x, mut y) = (x0, y0);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.set_pixel(x, y, c);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn rect(&mut self, x: i32, y: i32, w: i32, h: i32, c: Rgba) {
        if w < 1 || h < 1 {
            return;
        }
        let (x1, y1) = (x + w - 1, y + h - 1);
        for px in x..=x1 {
            self.set_pixel(px, y, c);
            self.set_pixel(px, y1, c);
        }
        for py in (y + 1)..y1 {
            self.set_pixel(x, py, c);
            self.set_pixel(x1, py, c);
        }
    }

    pub fn rect_fill(&mut self, x: i32, y: i32, w: i32, h: i32, c: Rgba) {
        for py in y..y + h {
            for px in x..x + w {
                self.set_pixel(px, py, c);
            }
        }
    }

    pub fn circ(&mut self, cx: i32, cy: i32, r: i32, c: Rgba) {
        if r < 0 {
            return;
        }
        // Midpoint circle.
        let mut x = r;
        let mut y = 0;
        let mut d = 1 - r;
        while x >= y {
            self.set_pixel(cx + x, cy + y, c);
            self.set_pixel(cx + y, cy + x, c);
            self.set_pixel(cx - y, cy + x, c);
            self.set_pixel(cx - x, cy + y, c);
            self.set_pixel(cx - x, cy - y, c);
            self.set_pixel(cx - y, cy - x, c);
            self.set_pixel(cx + y, cy - x, c);
            self.set_pixel(cx + x, cy - y, c);
            y += 1;
            if d <= 0 {
                d += 2 * y + 1;
            } else {
                x -= 1;
                d += 2 * (y - x) + 1;
            }
        }
    }

    pub fn circ_fill(&mut self, cx: i32, cy: i32, r: i32, c: Rgba) {
        if r < 0 {
            return;
        }
        let mut x = r;
        let mut y = 0;
        let mut d = 1 - r;
        while x >= y {
            self.hline(cx - x, cx + x, cy + y, c);
            self.hline(cx - x, cx + x, cy - y, c);
            self.hline(cx - y, cx + y, cy + x, c);
            self.hline(cx - y, cx + y, cy - x, c);
            y += 1;
            if d <= 0 {
                d += 2 * y + 1;
            } else {
                x -= 1;
                d += 2 * (y - x) + 1;
            }
        }
    }

    fn hline(&mut self, x0: i32, x1: i32, y: i32, c: Rgba) {
        for x in x0..=x1 {
            self.set_pixel(x, y, c);
        }
    }

    pub fn tri(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, x3: i32, y3: i32, c: Rgba) {
        self.line(x1, y1, x2, y2, c);
        self.line(x2, y2, x3, y3, c);
        self.line(x3, y3, x1, y1, c);
    }

    pub fn tri_fill(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, x3: i32, y3: i32, c: Rgba) {
        let orient =
            |ax: i32, ay: i32, bx: i32, by: i32, px: i32, py: i32| -> i64 {
                (bx - ax) as i64 * (py - ay) as i64 - (by - ay) as i64 * (px - ax) as i64
            };
        let area = orient(x1, y1, x2, y2, x3, y3);
        if area == 0 {
            // Degenerate: collapses to a line.
            self.line(x1, y1, x2, y2, c);
            self.line(x2, y2, x3, y3, c);
            return;
        }
        let min_x = x1.min(x2).min(x3);
        let max_x = x1.max(x2).max(x3);
        let min_y = y1.min(y2).min(y3);
        let max_y = y1.max(y2).max(y3);
        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let w0 = orient(x2, y2, x3, y3, px, py);
                let w1 = orient(x3, y3, x1, y1, px, py);
                let w2 = orient(x1, y1, x2, y2, px, py);
                let inside = if area > 0 {
                    w0 >= 0 && w1 >= 0 && w2 >= 0
                } else {
                    w0 <= 0 && w1 <= 0 && w2 <= 0
                };
                if inside {
                    self.set_pixel(px, py, c);
                }
            }
        }
    }

    pub fn draw_text(&mut self, text: &str, x: i32, y: i32, c: Rgba) {
        let mut pen_x = x;
        let mut pen_y = y;
        for ch in text.chars() {
            if ch == '\n' {
                pen_x = x;
                pen_y += font::LINE_H;
                continue;
            }
            if let Some(rows) = font::glyph(ch) {
                for (row, bits) in rows.iter().enumerate() {
                    for col in 0..font::CHAR_W {
                        if bits & (1 << col) != 0 {
                            self.set_pixel(pen_x + col, pen_y + row as i32, c);
                        }
                    }
                }
            }
            pen_x += font::CHAR_W;
        }
    }

    /// Word-wrapped text bounded to `max_width` pixels.
    pub fn draw_text_wrapped(&mut self, text: &str, x: i32, y: i32, max_width: i32, c: Rgba) {
        for (i, line) in font::wrap(text, max_width).iter().enumerate() {
            self.draw_text(line, x, y + i as i32 * font::LINE_H, c);
        }
    }

    /// Blit an image with uniform scale, optional flips, and a rotation in
    /// degrees about the scaled image's center. Transparent (alpha 0)
    /// source pixels are skipped; everything else overwrites.
    pub fn blit(
        &mut self,
        img: &Image,
        x: f64,
        y: f64,
        scale: f64,
        flip_h: bool,
        flip_v: bool,
        rotation: f64,
    ) {
        if scale <= 0.0 || img.width() == 0 || img.height() == 0 {
            return;
        }
        let sw = img.width() as f64 * scale;
        let sh = img.height() as f64 * scale;
        let (ccx, ccy) = (x + sw / 2.0, y + sh / 2.0);
        let theta = rotation.to_radians();
        let (sin, cos) = theta.sin_cos();

        // Destination bounding box of the rotated rect.
        let half_w = sw / 2.0;
        let half_h = sh / 2.0;
        let ext_x = half_w * cos.abs() + half_h * sin.abs();
        let ext_y = half_w * sin.abs() + half_h * cos.abs();
        let min_x = (ccx - ext_x).floor() as i32;
        let max_x = (ccx + ext_x).ceil() as i32;
        let min_y = (ccy - ext_y).floor() as i32;
        let max_y = (ccy + ext_y).ceil() as i32;

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                // Inverse-rotate the pixel center into sprite space.
                let dx = px as f64 + 0.5 - ccx;
                let dy = py as f64 + 0.5 - ccy;
                let u = cos * dx + sin * dy + half_w;
                let v = -sin * dx + cos * dy + half_h;
                if u < 0.0 || v < 0.0 || u >= sw || v >= sh {
                    continue;
                }
                let mut sx = (u / scale) as i32;
                let mut sy = (v / scale) as i32;
                if flip_h {
                    sx = img.width() as i32 - 1 - sx;
                }
                if flip_v {
                    sy = img.height() as i32 - 1 - sy;
                }
                if let Some(c) = img.get(sx, sy) {
                    if c.a != 0 {
                        self.set_pixel(px, py, c);
                    }
                }
            }
        }
    }
}

impl Default for Screen {
    fn default() -> Self {
        Screen::new()
    }
}

/// Lazily-synced CPU mirror of the render target.
///
/// Absent or dirty means the next read pays for one full readback; while
/// clean, reads are O(1) and direct pixel writes are tracked in place.
pub struct ScreenCache {
    mirror: Option<Image>,
    dirty: bool,
    readbacks: u64,
}

impl ScreenCache {
    pub fn new() -> Self {
        ScreenCache {
            mirror: None,
            dirty: false,
            readbacks: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.mirror.is_some() && !self.dirty
    }

    /// Number of full readbacks performed so far.
    pub fn readbacks(&self) -> u64 {
        self.readbacks
    }

    /// Track a single successfully written pixel. Only a clean mirror is
    /// updated; an absent or dirty one is left for the next re-derivation.
    pub fn note_pixel_write(&mut self, x: i32, y: i32, c: Rgba) {
        if self.dirty {
            return;
        }
        if let Some(mirror) = &mut self.mirror {
            mirror.set(x, y, c);
        }
    }

    /// An untrackable draw happened; stale contents must be discarded
    /// before the next read.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn read_pixel(&mut self, screen: &Screen, x: i32, y: i32) -> Option<Rgba> {
        if self.dirty {
            self.mirror = None;
            self.dirty = false;
        }
        if self.mirror.is_none() {
            self.readbacks += 1;
            log::debug!("SCREEN: mirror re-derived from readback #{}", self.readbacks);
            self.mirror = Some(screen.read_back());
        }
        self.mirror.as_ref().and_then(|m| m.get(x, y))
    }

    /// Drop the mirror entirely (reset, cart swap, shutdown).
    pub fn release(&mut self) {
        self.mirror = None;
        self.dirty = false;
    }
}

impl Default for ScreenCache {
    fn default() -> Self {
        ScreenCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba::new(255, 0, 0, 255);
    const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    #[test]
    fn clear_floods_whole_target() {
        let mut screen = Screen::new();
        screen.set_clip(0, 0, 10, 10);
        screen.clear(RED);
        assert_eq!(screen.get_pixel(319, 239), Some(RED));
    }

    #[test]
    fn clip_bounds_pixel_writes() {
        let mut screen = Screen::new();
        screen.set_clip(10, 10, 5, 5);
        assert!(!screen.set_pixel(9, 10, RED));
        assert!(screen.set_pixel(10, 10, RED));
        assert!(screen.set_pixel(14, 14, RED));
        assert!(!screen.set_pixel(15, 14, RED));
        screen.clear_clip();
        assert!(screen.set_pixel(9, 10, RED));
    }

    #[test]
    fn line_hits_both_endpoints() {
        let mut screen = Screen::new();
        screen.line(1, 1, 6, 4, WHITE);
        assert_eq!(screen.get_pixel(1, 1), Some(WHITE));
        assert_eq!(screen.get_pixel(6, 4), Some(WHITE));
    }

    #[test]
    fn rect_fill_covers_exact_area() {
        let mut screen = Screen::new();
        screen.rect_fill(2, 3, 4, 2, WHITE);
        assert_eq!(screen.get_pixel(2, 3), Some(WHITE));
        assert_eq!(screen.get_pixel(5, 4), Some(WHITE));
        assert_ne!(screen.get_pixel(6, 4), Some(WHITE));
        assert_ne!(screen.get_pixel(5, 5), Some(WHITE));
    }

    #[test]
    fn tri_fill_covers_vertices() {
        let mut screen = Screen::new();
        screen.tri_fill(10, 10, 20, 10, 10, 20, WHITE);
        assert_eq!(screen.get_pixel(10, 10), Some(WHITE));
        assert_eq!(screen.get_pixel(20, 10), Some(WHITE));
        assert_eq!(screen.get_pixel(10, 20), Some(WHITE));
        assert_eq!(screen.get_pixel(12, 12), Some(WHITE));
        assert_ne!(screen.get_pixel(20, 20), Some(WHITE));
    }

    #[test]
    fn blit_skips_transparent_pixels() {
        let mut screen = Screen::new();
        screen.clear(RED);
        let mut img = Image::new(2, 1, Rgba::new(0, 255, 0, 255));
        img.set(1, 0, Rgba::new(0, 0, 0, 0));
        screen.blit(&img, 0.0, 0.0, 1.0, false, false, 0.0);
        assert_eq!(screen.get_pixel(0, 0), Some(Rgba::new(0, 255, 0, 255)));
        assert_eq!(screen.get_pixel(1, 0), Some(RED));
    }

    #[test]
    fn blit_scale_and_flip() {
        let mut screen = Screen::new();
        let mut img = Image::new(2, 1, Rgba::new(0, 255, 0, 255));
        img.set(0, 0, WHITE);
        screen.blit(&img, 0.0, 0.0, 2.0, true, false, 0.0);
        // Flipped: white source pixel now covers the right half.
        assert_eq!(screen.get_pixel(0, 0), Some(Rgba::new(0, 255, 0, 255)));
        assert_eq!(screen.get_pixel(3, 1), Some(WHITE));
    }

    #[test]
    fn cache_starts_absent_and_derives_on_read() {
        let mut screen = Screen::new();
        let mut cache = ScreenCache::new();
        assert!(!cache.is_clean());
        screen.set_pixel(5, 5, RED);
        assert_eq!(cache.read_pixel(&screen, 5, 5), Some(RED));
        assert!(cache.is_clean());
        assert_eq!(cache.readbacks(), 1);
    }

    #[test]
    fn clean_mirror_tracks_pixel_writes_without_readback() {
        let mut screen = Screen::new();
        let mut cache = ScreenCache::new();
        cache.read_pixel(&screen, 0, 0);
        assert_eq!(cache.readbacks(), 1);
        // Pixel-only writes keep the mirror clean and exact.
        for i in 0..10 {
            assert!(screen.set_pixel(i, 7, RED));
            cache.note_pixel_write(i, 7, RED);
        }
        assert_eq!(cache.read_pixel(&screen, 9, 7), Some(RED));
        assert_eq!(cache.readbacks(), 1);
    }

    #[test]
    fn untrackable_draw_forces_fresh_readback() {
        let mut screen = Screen::new();
        let mut cache = ScreenCache::new();
        cache.read_pixel(&screen, 0, 0);
        screen.rect_fill(0, 0, 4, 4, WHITE);
        cache.invalidate();
        assert!(!cache.is_clean());
        assert_eq!(cache.read_pixel(&screen, 2, 2), Some(WHITE));
        assert_eq!(cache.readbacks(), 2);
        assert!(cache.is_clean());
    }

    #[test]
    fn absent_mirror_ignores_pixel_tracking() {
        let screen = Screen::new();
        let mut cache = ScreenCache::new();
        cache.note_pixel_write(0, 0, RED);
        assert!(!cache.is_clean());
        // First read still derives from the real target, not the note.
        let mut screen = screen;
        screen.set_pixel(0, 0, WHITE);
        assert_eq!(cache.read_pixel(&screen, 0, 0), Some(WHITE));
    }

    #[test]
    fn release_drops_mirror() {
        let screen = Screen::new();
        let mut cache = ScreenCache::new();
        cache.read_pixel(&screen, 0, 0);
        assert!(cache.is_clean());
        cache.release();
        assert!(!cache.is_clean());
        assert_eq!(cache.read_pixel(&screen, 0, 0), Some(Rgba::new(0, 0, 0, 255)));
        assert_eq!(cache.readbacks(), 2);
    }
}
