//! Cartridge resources: code, graphics pages, blobs, sprites.
//!
//! A cart is built by one pass over the parsed chunk tree. Resource lookup
//! is a linear scan from the most recently added entry, so a resource
//! loaded later with a colliding id shadows earlier ones.

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::Path;

use crate::color::{self, Palette, SENTINEL};
use crate::gfx::Image;
use crate::riff::{self, Chunk};

pub const TAG_CODE: [u8; 4] = *b"CODE";
pub const TAG_GRAPHICS: [u8; 4] = *b"GRPH";
pub const TAG_BINARY: [u8; 4] = *b"BIN ";

/// Upper bound on decoded pixels per graphics page. A parseable chunk
/// claiming more than this is corrupt or hostile, not a real page.
pub const MAX_PAGE_PIXELS: u64 = 1 << 24;

/// Minimal built-in program substituted when a cartridge cannot be parsed.
pub const LOAD_ERROR_PROGRAM: &str =
    "function doframe() cls(7) print('error loading cart') end";

/// Built-in program for a session started without a cartridge.
pub const NO_CART_PROGRAM: &str = "function doframe()\n\
     cls(0)\n\
     print('no cart loaded', 104, 110, 255)\n\
     print('drop a cartridge file here', 56, 124, 146)\n\
     end";

pub struct GraphicsPage {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub image: Image,
}

pub struct Blob {
    pub id: u32,
    pub data: Vec<u8>,
}

pub struct Sprite {
    pub id: u32,
    pub image: Image,
}

#[derive(Default)]
pub struct Cart {
    pub code: Vec<u8>,
    graphics: Vec<GraphicsPage>,
    blobs: Vec<Blob>,
    sprites: Vec<Sprite>,
    // Session-monotonic; survives bulk sprite clears.
    next_sprite_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefineError {
    NoSuchPage(i64),
    OriginOutOfBounds { x: i64, y: i64, width: u32, height: u32 },
    BadSize { w: i64, h: i64 },
    PastEdge { x: i64, y: i64, w: i64, h: i64, width: u32, height: u32 },
}

impl fmt::Display for DefineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineError::NoSuchPage(id) => write!(f, "no graphics page with id {}", id),
            DefineError::OriginOutOfBounds { x, y, width, height } => write!(
                f,
                "sprite origin ({},{}) outside page bounds {}x{}",
                x, y, width, height
            ),
            DefineError::BadSize { w, h } => {
                write!(f, "sprite size {}x{} must be at least 1x1", w, h)
            }
            DefineError::PastEdge { x, y, w, h, width, height } => write!(
                f,
                "sprite rect ({},{} {}x{}) extends past page bounds {}x{}",
                x, y, w, h, width, height
            ),
        }
    }
}

impl std::error::Error for DefineError {}

impl Cart {
    /// Cart that runs one of the built-in programs instead of loaded code.
    pub fn from_builtin(program: &str) -> Self {
        Cart {
            code: program.as_bytes().to_vec(),
            ..Cart::default()
        }
    }

    /// Decode every resource reachable from the chunk tree root.
    pub fn from_chunk(root: &Chunk, palette: &Palette) -> Self {
        let mut cart = Cart::default();
        cart.walk(root, palette);
        log::info!(
            "CART: loaded {} code bytes, {} graphics pages, {} blobs",
            cart.code.len(),
            cart.graphics.len(),
            cart.blobs.len()
        );
        cart
    }

    /// Load a cartridge file. Never fails: unreadable or malformed files
    /// produce a cart running the built-in load-error program.
    pub fn load_file(path: &Path, palette: &Palette) -> Self {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                log::error!("CART: cannot read {}: {}", path.display(), e);
                return Cart::from_builtin(LOAD_ERROR_PROGRAM);
            }
        };
        log::info!("CART: read {} ({} bytes)", path.display(), data.len());
        match riff::parse(&data) {
            Ok(root) => Cart::from_chunk(&root, palette),
            Err(e) => {
                log::error!("CART: error loading cart: {}", e);
                Cart::from_builtin(LOAD_ERROR_PROGRAM)
            }
        }
    }

    fn walk(&mut self, chunk: &Chunk, palette: &Palette) {
        match chunk {
            Chunk::Container { children, .. } => {
                for child in children {
                    self.walk(child, palette);
                }
            }
            Chunk::Leaf { tag, data } => match *tag {
                TAG_CODE => self.code.extend_from_slice(data),
                TAG_GRAPHICS => self.load_graphics(data, palette),
                TAG_BINARY => self.load_blob(data),
                _ => {}
            },
        }
    }

    fn load_graphics(&mut self, payload: &[u8], palette: &Palette) {
        if payload.len() < 12 {
            log::warn!(
                "CART: graphics chunk of {} bytes is too short for its header; skipped",
                payload.len()
            );
            return;
        }
        let id = u32_at(payload, 0);
        let width = u32_at(payload, 4);
        let height = u32_at(payload, 8);
        let indices = &payload[12..];
        let expected = width as u64 * height as u64;
        if expected > MAX_PAGE_PIXELS {
            log::warn!(
                "CART: graphics chunk {} claims {}x{} pixels; too large, skipped",
                id,
                width,
                height
            );
            return;
        }
        if expected > indices.len() as u64 {
            log::warn!(
                "CART: truncated graphics chunk {}; will read all the pixels I can",
                id
            );
        }

        let mut image = Image::new(width, height, SENTINEL);
        let mut x: u32 = 0;
        let mut y: u32 = 0;
        for &index in indices {
            if width == 0 || y >= height {
                break;
            }
            image.set(x as i32, y as i32, palette.color(index));
            x += 1;
            if x == width {
                x = 0;
                y += 1;
            }
        }
        // Head insertion: the newest page shadows older ones with the same id.
        self.graphics.insert(0, GraphicsPage { id, width, height, image });
    }

    fn load_blob(&mut self, payload: &[u8]) {
        if payload.len() < 4 {
            log::warn!(
                "CART: binary chunk of {} bytes is too short for its id; skipped",
                payload.len()
            );
            return;
        }
        let id = u32_at(payload, 0);
        self.blobs.insert(0, Blob {
            id,
            data: payload[4..].to_vec(),
        });
    }

    pub fn page(&self, id: u32) -> Option<&GraphicsPage> {
        self.graphics.iter().find(|p| p.id == id)
    }

    pub fn blob(&self, id: u32) -> Option<&Blob> {
        self.blobs.iter().find(|b| b.id == id)
    }

    pub fn sprite(&self, id: u32) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.id == id)
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    /// Cut a sub-rectangle out of a graphics page into a new sprite.
    ///
    /// With a colorkey, every pixel whose re-quantized color equals the key
    /// becomes transparent; the comparison re-derives the index from the
    /// decoded RGBA, so visually identical pixels key out together no matter
    /// which source index produced them.
    pub fn define_sprite(
        &mut self,
        page_id: i64,
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        colorkey: Option<u8>,
    ) -> Result<u32, DefineError> {
        // Report the id as the program passed it, negatives included.
        let page = u32::try_from(page_id)
            .ok()
            .and_then(|id| self.page(id))
            .ok_or(DefineError::NoSuchPage(page_id))?;
        let (pw, ph) = (page.width, page.height);
        if x < 0 || y < 0 || x > pw as i64 || y > ph as i64 {
            return Err(DefineError::OriginOutOfBounds { x, y, width: pw, height: ph });
        }
        if w < 1 || h < 1 {
            return Err(DefineError::BadSize { w, h });
        }
        if x + w > pw as i64 || y + h > ph as i64 {
            return Err(DefineError::PastEdge { x, y, w, h, width: pw, height: ph });
        }

        let mut image = page.image.sub_image(x as u32, y as u32, w as u32, h as u32);
        if let Some(key) = colorkey {
            for py in 0..image.height() as i32 {
                for px in 0..image.width() as i32 {
                    if let Some(mut c) = image.get(px, py) {
                        if color::quantize(c) == key {
                            c.a = 0;
                            image.set(px, py, c);
                        }
                    }
                }
            }
        }

        let id = self.next_sprite_id;
        self.next_sprite_id += 1;
        self.sprites.insert(0, Sprite { id, image });
        Ok(id)
    }

    /// Bulk-release all sprites. The id counter keeps counting.
    pub fn clear_sprites(&mut self) {
        self.sprites.clear();
    }
}

fn u32_at(data: &[u8], i: usize) -> u32 {
    u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]])
}
