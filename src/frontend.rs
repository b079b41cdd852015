//! SDL2 frontend: window, events, presentation, frame pacing.
//!
//! The console renders into a CPU image; every frame that image is
//! streamed into a texture and scaled to the window. Cart files can be
//! dropped onto the window to hot-swap the running program.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use sdl2::event::Event;
use sdl2::keyboard::{Mod, Scancode};
use sdl2::pixels::PixelFormatEnum;
use sdl2::rect::Rect;
use sdl2::render::BlendMode;

use crate::api::SharedConsole;
use crate::color::Rgba;
use crate::gfx::font;
use crate::gfx::Image;
use crate::input::Buttons;
use crate::screen::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::script::ScriptRuntime;
use crate::shutdown;

pub const WINDOW_TITLE: &str = "NeXUS";
pub const WINDOW_SCALE: u32 = 3;

const TARGET_FRAME: Duration = Duration::from_nanos(1_000_000_000 / 60);

const OVERLAY_W: u32 = 80;
const OVERLAY_H: u32 = 12;

struct PerfStats {
    window_start: Instant,
    frames_in_window: u32,
    fps: f64,
}

impl PerfStats {
    fn new() -> Self {
        PerfStats {
            window_start: Instant::now(),
            frames_in_window: 0,
            fps: 60.0,
        }
    }

    fn frame_done(&mut self) {
        self.frames_in_window += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_millis(500) {
            self.fps = self.frames_in_window as f64 / elapsed.as_secs_f64();
            self.window_start = Instant::now();
            self.frames_in_window = 0;
        }
    }

    fn overlay(&self) -> Image {
        let color = if self.fps >= 30.0 {
            Rgba::new(255, 255, 255, 255)
        } else if self.fps >= 15.0 {
            Rgba::new(255, 160, 0, 255)
        } else {
            Rgba::new(230, 40, 40, 255)
        };
        let mut img = Image::new(OVERLAY_W, OVERLAY_H, Rgba::new(0, 0, 0, 160));
        let text = format!("FPS: {:.0}", self.fps);
        let mut px = 2;
        for ch in text.chars() {
            if let Some(rows) = font::glyph(ch) {
                for (dy, row) in rows.iter().enumerate() {
                    for dx in 0..font::CHAR_W {
                        if row & (1 << dx) != 0 {
                            img.set(px + dx, 2 + dy as i32, color);
                        }
                    }
                }
            }
            px += font::CHAR_W;
        }
        img
    }
}

fn ctrl_held(keymod: Mod) -> bool {
    keymod.intersects(Mod::LCTRLMOD | Mod::RCTRLMOD)
}

fn read_buttons(kb: &sdl2::keyboard::KeyboardState) -> Buttons {
    let mut buttons = Buttons::empty();
    let mut map = |scancode, flag| {
        if kb.is_scancode_pressed(scancode) {
            buttons |= flag;
        }
    };
    map(Scancode::Left, Buttons::LEFT);
    map(Scancode::Right, Buttons::RIGHT);
    map(Scancode::Up, Buttons::UP);
    map(Scancode::Down, Buttons::DOWN);
    map(Scancode::Z, Buttons::A);
    map(Scancode::X, Buttons::B);
    map(Scancode::Return, Buttons::START);
    map(Scancode::RShift, Buttons::SELECT);
    buttons
}

/// Run the console until the window closes or a quit is requested.
pub fn run(console: SharedConsole, mut runtime: ScriptRuntime) -> Result<(), String> {
    let sdl = sdl2::init()?;
    let video = sdl.video()?;
    let window = video
        .window(
            WINDOW_TITLE,
            SCREEN_WIDTH * WINDOW_SCALE,
            SCREEN_HEIGHT * WINDOW_SCALE,
        )
        .position_centered()
        .build()
        .map_err(|e| e.to_string())?;
    let mut canvas = window.into_canvas().build().map_err(|e| e.to_string())?;
    let creator = canvas.texture_creator();
    let mut frame_tex = creator
        .create_texture_streaming(PixelFormatEnum::ABGR8888, SCREEN_WIDTH, SCREEN_HEIGHT)
        .map_err(|e| e.to_string())?;
    let mut overlay_tex = creator
        .create_texture_streaming(PixelFormatEnum::ABGR8888, OVERLAY_W, OVERLAY_H)
        .map_err(|e| e.to_string())?;
    overlay_tex.set_blend_mode(BlendMode::Blend);
    let mut events = sdl.event_pump()?;

    let mut show_fps = false;
    let mut perf = PerfStats::new();

    runtime.boot();

    'running: loop {
        let frame_start = Instant::now();
        let mut dropped: Vec<PathBuf> = Vec::new();
        let mut force_reset = false;

        for event in events.poll_iter() {
            match event {
                Event::Quit { .. } => console.borrow_mut().request_close(),
                Event::DropFile { filename, .. } => dropped.push(PathBuf::from(filename)),
                Event::KeyDown {
                    scancode: Some(Scancode::F),
                    keymod,
                    repeat: false,
                    ..
                } if ctrl_held(keymod) => show_fps = !show_fps,
                Event::KeyDown {
                    scancode: Some(Scancode::R),
                    keymod,
                    repeat: false,
                    ..
                } if ctrl_held(keymod) => force_reset = true,
                _ => {}
            }
        }

        // Hot-swap only when exactly one cart lands in a frame.
        match dropped.as_slice() {
            [] => {}
            [path] => {
                log::info!("CART: dropped file {}", path.display());
                let cart = console.borrow().load_cart_file(path);
                if let Err(e) = runtime.swap_cart(cart) {
                    log::error!("LUA: {}", e);
                    break 'running;
                }
            }
            batch => log::warn!("CART: {} files dropped at once; ignoring them", batch.len()),
        }

        {
            let kb = events.keyboard_state();
            let buttons = read_buttons(&kb);
            let ctrl = kb.is_scancode_pressed(Scancode::LCtrl)
                || kb.is_scancode_pressed(Scancode::RCtrl);
            let chord = ctrl && kb.is_scancode_pressed(Scancode::R);
            let mut c = console.borrow_mut();
            c.input.set_buttons(buttons);
            c.input.set_restart_chord(chord);
        }

        if force_reset {
            log::info!("RESET: host chord");
            if let Err(e) = runtime.reset() {
                log::error!("LUA: {}", e);
                break 'running;
            }
        }

        runtime.tick();

        if let Some(text) = console.borrow_mut().take_clipboard() {
            if let Err(e) = video.clipboard().set_clipboard_text(&text) {
                log::warn!("CLIP: {}", e);
            } else {
                log::info!("CLIP: copied {} bytes", text.len());
            }
        }

        frame_tex
            .update(
                None,
                console.borrow().screen().bytes(),
                SCREEN_WIDTH as usize * 4,
            )
            .map_err(|e| e.to_string())?;
        canvas.clear();
        canvas.copy(&frame_tex, None, None)?;
        if show_fps {
            let overlay = perf.overlay();
            overlay_tex
                .update(None, overlay.bytes(), OVERLAY_W as usize * 4)
                .map_err(|e| e.to_string())?;
            let dst = Rect::new(
                6,
                6,
                OVERLAY_W * WINDOW_SCALE,
                OVERLAY_H * WINDOW_SCALE,
            );
            canvas.copy(&overlay_tex, None, dst)?;
        }
        canvas.present();
        perf.frame_done();

        if console.borrow().close_requested() || shutdown::should_quit() {
            break 'running;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < TARGET_FRAME {
            std::thread::sleep(TARGET_FRAME - elapsed);
        }
    }

    log::info!("SHUTDOWN: frontend loop exited");
    Ok(())
}
