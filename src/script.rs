//! Lua program lifecycle: boot, per-frame tick, fault handling.
//!
//! A faulting cart is replaced by an embedded fault screen program that
//! runs on a reduced capability surface. A fault while the fault screen
//! is active is unrecoverable and shuts the console down.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Lua, LuaOptions, StdLib, Value};

use crate::api::{self, SharedConsole, Surface};
use crate::cart::Cart;
use crate::shutdown;

/// Global the host calls once per frame, if the program defines it.
pub const ENTRY_POINT: &str = "doframe";

const CART_CHUNK: &str = "[cart code]";
const FAULT_CHUNK: &str = "[fault screen]";

/// Exit code reported when a program cannot be recovered.
const FAULT_EXIT_CODE: i32 = 70;

/// Shown when a cart program dies. The fault text arrives through the
/// `nexus_fault` global; only the reduced surface is available here.
const FALLBACK_PROGRAM: &str = r#"
local copied = false

function doframe()
    cls(128)
    print('PROGRAM FAULT', 8, 8, 7)
    printwrap(nexus_fault or 'unknown error', 8, 26, 304, 255)
    print('ctrl+r: restart', 8, 222, 255)
    print('z: copy error', 140, 222, 255)
    if btn(4) and not copied then
        copyclip(nexus_fault or '')
        copied = true
    end
    if copied then
        print('copied', 260, 222, 56)
    end
end
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Cart program running normally.
    Cart,
    /// Fault screen running after a cart fault.
    Fallback,
    /// Unrecoverable; ticks are ignored while the host winds down.
    Dead,
}

pub struct ScriptRuntime {
    lua: Lua,
    console: SharedConsole,
    mode: Mode,
}

/// Stdlib subset offered to programs. No io, no os, and the file
/// loaders are removed from globals below.
fn program_libs() -> StdLib {
    StdLib::COROUTINE | StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH | StdLib::PACKAGE
}

fn build_lua(console: &SharedConsole, surface: Surface) -> mlua::Result<Lua> {
    let lua = Lua::new_with(program_libs(), LuaOptions::default())?;
    lua.globals().set("dofile", Value::Nil)?;
    lua.globals().set("loadfile", Value::Nil)?;
    api::register(&lua, console, surface)?;
    Ok(lua)
}

impl ScriptRuntime {
    pub fn new(console: SharedConsole) -> mlua::Result<Self> {
        let lua = build_lua(&console, Surface::Cart)?;
        Ok(ScriptRuntime {
            lua,
            console,
            mode: Mode::Cart,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Run the current cart's top-level code. A compile or runtime error
    /// here faults straight to the fault screen.
    pub fn boot(&mut self) {
        let code = {
            let console = self.console.borrow();
            String::from_utf8_lossy(&console.cart.code).into_owned()
        };
        log::info!("LUA: running cart code ({} bytes)", code.len());
        let result = self.lua.load(&code).set_name(CART_CHUNK).exec();
        if let Err(e) = result {
            self.fault(&e.to_string());
        }
    }

    /// Call the program's frame entry point. Missing entry point is a
    /// blank frame, not an error.
    pub fn tick(&mut self) {
        if self.mode == Mode::Dead {
            return;
        }
        let entry = match self.lua.globals().get::<Value>(ENTRY_POINT) {
            Ok(v) => v,
            Err(e) => {
                self.fault(&e.to_string());
                return;
            }
        };
        if let Value::Function(frame) = entry {
            if let Err(e) = frame.call::<()>(()) {
                self.fault(&e.to_string());
            }
        }
    }

    /// Tear down the faulting program and hand the session to the fault
    /// screen. A second fault is unrecoverable.
    pub fn fault(&mut self, message: &str) {
        log::error!("LUA: {}", message);
        match self.mode {
            Mode::Dead => {}
            Mode::Fallback => {
                log::error!("LUA: fault screen faulted; shutting down");
                self.die();
            }
            Mode::Cart => {
                self.console.borrow_mut().release_run_resources();
                let lua = match build_lua(&self.console, Surface::Fallback) {
                    Ok(lua) => lua,
                    Err(e) => {
                        log::error!("LUA: cannot build fault screen interpreter: {}", e);
                        self.die();
                        return;
                    }
                };
                self.lua = lua;
                self.mode = Mode::Fallback;
                let start = self
                    .lua
                    .globals()
                    .set("nexus_fault", message)
                    .and_then(|()| self.lua.load(FALLBACK_PROGRAM).set_name(FAULT_CHUNK).exec());
                if let Err(e) = start {
                    log::error!("LUA: fault screen failed to start: {}", e);
                    self.die();
                }
            }
        }
    }

    fn die(&mut self) {
        self.mode = Mode::Dead;
        self.console.borrow_mut().request_close();
        shutdown::request_quit_with_code(FAULT_EXIT_CODE);
    }

    /// Restart the current cart from its top-level code with a fresh
    /// interpreter. Sprites and screen mirror are released first.
    pub fn reset(&mut self) -> mlua::Result<()> {
        log::info!("RESET: restarting current cart");
        self.console.borrow_mut().release_run_resources();
        self.lua = build_lua(&self.console, Surface::Cart)?;
        self.mode = Mode::Cart;
        self.boot();
        Ok(())
    }

    /// Replace the running cart and restart.
    pub fn swap_cart(&mut self, cart: Cart) -> mlua::Result<()> {
        self.console.borrow_mut().replace_cart(cart);
        self.reset()
    }
}

/// Build a console/runtime pair around `cart`, ready to boot.
pub fn session(cart: Cart) -> mlua::Result<(SharedConsole, ScriptRuntime)> {
    let console = Rc::new(RefCell::new(crate::console::Console::new(cart)));
    let runtime = ScriptRuntime::new(console.clone())?;
    Ok((console, runtime))
}
