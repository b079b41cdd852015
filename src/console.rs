//! The console context: one running session's worth of state.
//!
//! Owns the palette, the current cart, the render target and its mirror,
//! and the input snapshot. Every capability exposed to programs is a
//! method here that validates its arguments and returns a descriptive
//! error on violation; the scripting layer only converts values and
//! forwards. That keeps the whole surface testable without an interpreter.

use std::fmt;
use std::path::Path;

use crate::cart::{Cart, DefineError};
use crate::color::{self, Palette, Rgba};
use crate::input::{InputState, BUTTON_COUNT};
use crate::screen::{Screen, ScreenCache};

/// Fixed identifier reported by `version()`.
pub const VERSION: &str = "Alpha-RS";

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    ColorOutOfRange(i64),
    CoordOutOfRange(i64),
    PixelOffScreen { x: i64, y: i64 },
    BadScale(f64),
    BadFlip(i64),
    BadButton(i64),
    BadClip { w: i64, h: i64 },
    NoSuchSprite(i64),
    Define(DefineError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::ColorOutOfRange(c) => {
                write!(f, "color {} out of range (expected 0-255)", c)
            }
            ApiError::CoordOutOfRange(v) => write!(f, "coordinate {} out of range", v),
            ApiError::PixelOffScreen { x, y } => {
                write!(f, "pixel ({},{}) is outside the screen", x, y)
            }
            ApiError::BadScale(s) => write!(f, "scale {} must be greater than zero", s),
            ApiError::BadFlip(v) => write!(f, "flip {} out of range (expected 0-3)", v),
            ApiError::BadButton(i) => {
                write!(f, "button {} out of range (expected 0-{})", i, BUTTON_COUNT - 1)
            }
            ApiError::BadClip { w, h } => {
                write!(f, "clip size {}x{} must not be negative", w, h)
            }
            ApiError::NoSuchSprite(id) => write!(f, "no sprite with id {}", id),
            ApiError::Define(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<DefineError> for ApiError {
    fn from(e: DefineError) -> Self {
        ApiError::Define(e)
    }
}

pub struct Console {
    palette: Palette,
    pub cart: Cart,
    screen: Screen,
    cache: ScreenCache,
    pub input: InputState,
    close_requested: bool,
    clipboard_pending: Option<String>,
}

fn color_arg(c: i64) -> Result<u8, ApiError> {
    u8::try_from(c).map_err(|_| ApiError::ColorOutOfRange(c))
}

fn coord(v: i64) -> Result<i32, ApiError> {
    i32::try_from(v).map_err(|_| ApiError::CoordOutOfRange(v))
}

impl Console {
    pub fn new(cart: Cart) -> Self {
        Console {
            palette: Palette::build(),
            cart,
            screen: Screen::new(),
            cache: ScreenCache::new(),
            input: InputState::default(),
            close_requested: false,
            clipboard_pending: None,
        }
    }

    fn expand(&self, c: i64) -> Result<Rgba, ApiError> {
        Ok(self.palette.color(color_arg(c)?))
    }

    // --- drawing capabilities ---

    pub fn cls(&mut self, c: i64) -> Result<(), ApiError> {
        let rgba = self.expand(c)?;
        self.screen.clear(rgba);
        self.cache.invalidate();
        Ok(())
    }

    pub fn pix(&mut self, x: i64, y: i64, c: i64) -> Result<(), ApiError> {
        let rgba = self.expand(c)?;
        let (x, y) = (coord(x)?, coord(y)?);
        // The one draw cheap enough to track in the mirror.
        if self.screen.set_pixel(x, y, rgba) {
            self.cache.note_pixel_write(x, y, rgba);
        }
        Ok(())
    }

    pub fn pget(&mut self, x: i64, y: i64) -> Result<u8, ApiError> {
        let (cx, cy) = (coord(x)?, coord(y)?);
        match self.cache.read_pixel(&self.screen, cx, cy) {
            Some(rgba) => Ok(color::quantize(rgba)),
            None => Err(ApiError::PixelOffScreen { x, y }),
        }
    }

    pub fn line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, c: i64) -> Result<(), ApiError> {
        let rgba = self.expand(c)?;
        self.screen
            .line(coord(x0)?, coord(y0)?, coord(x1)?, coord(y1)?, rgba);
        self.cache.invalidate();
        Ok(())
    }

    pub fn rect(
        &mut self,
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        c: i64,
        fill: bool,
    ) -> Result<(), ApiError> {
        let rgba = self.expand(c)?;
        let (x, y, w, h) = (coord(x)?, coord(y)?, coord(w)?, coord(h)?);
        if fill {
            self.screen.rect_fill(x, y, w, h, rgba);
        } else {
            self.screen.rect(x, y, w, h, rgba);
        }
        self.cache.invalidate();
        Ok(())
    }

    pub fn circ(&mut self, x: i64, y: i64, r: i64, c: i64, fill: bool) -> Result<(), ApiError> {
        let rgba = self.expand(c)?;
        let (x, y, r) = (coord(x)?, coord(y)?, coord(r)?);
        if fill {
            self.screen.circ_fill(x, y, r, rgba);
        } else {
            self.screen.circ(x, y, r, rgba);
        }
        self.cache.invalidate();
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tri(
        &mut self,
        x1: i64,
        y1: i64,
        x2: i64,
        y2: i64,
        x3: i64,
        y3: i64,
        c: i64,
        fill: bool,
    ) -> Result<(), ApiError> {
        let rgba = self.expand(c)?;
        let (x1, y1) = (coord(x1)?, coord(y1)?);
        let (x2, y2) = (coord(x2)?, coord(y2)?);
        let (x3, y3) = (coord(x3)?, coord(y3)?);
        if fill {
            self.screen.tri_fill(x1, y1, x2, y2, x3, y3, rgba);
        } else {
            self.screen.tri(x1, y1, x2, y2, x3, y3, rgba);
        }
        self.cache.invalidate();
        Ok(())
    }

    pub fn print(&mut self, text: &str, x: i64, y: i64, c: i64) -> Result<(), ApiError> {
        let rgba = self.expand(c)?;
        self.screen.draw_text(text, coord(x)?, coord(y)?, rgba);
        self.cache.invalidate();
        Ok(())
    }

    pub fn print_wrapped(
        &mut self,
        text: &str,
        x: i64,
        y: i64,
        max_width: i64,
        c: i64,
    ) -> Result<(), ApiError> {
        let rgba = self.expand(c)?;
        self.screen
            .draw_text_wrapped(text, coord(x)?, coord(y)?, coord(max_width)?, rgba);
        self.cache.invalidate();
        Ok(())
    }

    pub fn text_width(&self, text: &str) -> i32 {
        crate::gfx::font::measure(text)
    }

    pub fn spr(
        &mut self,
        id: i64,
        x: f64,
        y: f64,
        scale: f64,
        flip: i64,
        rotation: f64,
    ) -> Result<(), ApiError> {
        let sprite_id = u32::try_from(id).map_err(|_| ApiError::NoSuchSprite(id))?;
        if scale <= 0.0 || !scale.is_finite() {
            return Err(ApiError::BadScale(scale));
        }
        if !(0..=3).contains(&flip) {
            return Err(ApiError::BadFlip(flip));
        }
        let sprite = self
            .cart
            .sprite(sprite_id)
            .ok_or(ApiError::NoSuchSprite(id))?;
        let flip_h = flip & 1 != 0;
        let flip_v = flip & 2 != 0;
        self.screen
            .blit(&sprite.image, x, y, scale, flip_h, flip_v, rotation);
        self.cache.invalidate();
        Ok(())
    }

    pub fn sprdef(
        &mut self,
        page_id: i64,
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        colorkey: Option<i64>,
    ) -> Result<u32, ApiError> {
        let key = colorkey.map(color_arg).transpose()?;
        Ok(self.cart.define_sprite(page_id, x, y, w, h, key)?)
    }

    pub fn clip(&mut self, x: i64, y: i64, w: i64, h: i64) -> Result<(), ApiError> {
        if w < 0 || h < 0 {
            return Err(ApiError::BadClip { w, h });
        }
        self.screen
            .set_clip(coord(x)?, coord(y)?, coord(w)?, coord(h)?);
        Ok(())
    }

    pub fn clear_clip(&mut self) {
        self.screen.clear_clip();
    }

    // --- input / diagnostics ---

    pub fn btn(&self, i: i64) -> Result<bool, ApiError> {
        let index = u8::try_from(i)
            .ok()
            .filter(|&i| i < BUTTON_COUNT)
            .ok_or(ApiError::BadButton(i))?;
        Ok(self.input.pressed(index))
    }

    pub fn trace(&self, message: &str) {
        log::info!("SCRIPT: {}", message);
    }

    // --- fallback-only capabilities ---

    pub fn copy_to_clipboard(&mut self, text: String) {
        self.clipboard_pending = Some(text);
    }

    pub fn restart_down(&self) -> bool {
        self.input.restart_chord()
    }

    // --- host side ---

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Clipboard text queued by the fallback program, if any.
    pub fn take_clipboard(&mut self) -> Option<String> {
        self.clipboard_pending.take()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Release per-run resources: sprites, the screen mirror, and the clip
    /// region. Used on reset, fault, and cart swap; the next program starts
    /// with the whole screen writable.
    pub fn release_run_resources(&mut self) {
        self.cart.clear_sprites();
        self.cache.release();
        self.screen.clear_clip();
    }

    /// Load a cart file against this console's palette. Never fails; a
    /// broken file yields the embedded load-error program.
    pub fn load_cart_file(&self, path: &Path) -> Cart {
        Cart::load_file(path, &self.palette)
    }

    /// Swap in a new cart, dropping the old one and everything it owned.
    pub fn replace_cart(&mut self, cart: Cart) {
        self.cart = cart;
        self.release_run_resources();
    }

    #[cfg(test)]
    pub fn cache(&self) -> &ScreenCache {
        &self.cache
    }
}
