//! The capability surface registered into program globals.
//!
//! One fixed registry maps capability names to binder functions; each
//! binder wraps a validated `Console` method in a Lua closure. The cart
//! surface gets the full set, the fault screen a reduced one plus its
//! own entries. Argument violations surface as Lua errors and are caught
//! by the protected call around every tick.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Function, Lua};

use crate::console::{ApiError, Console, VERSION};

pub type SharedConsole = Rc<RefCell<Console>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Cart,
    Fallback,
}

pub struct Capability {
    pub name: &'static str,
    /// Registered for normal cart programs.
    pub cart: bool,
    /// Registered for the fault screen program.
    pub fallback: bool,
    bind: fn(&Lua, SharedConsole) -> mlua::Result<Function>,
}

const REGISTRY: &[Capability] = &[
    Capability { name: "cls", cart: true, fallback: true, bind: bind_cls },
    Capability { name: "pix", cart: true, fallback: false, bind: bind_pix },
    Capability { name: "pget", cart: true, fallback: false, bind: bind_pget },
    Capability { name: "line", cart: true, fallback: false, bind: bind_line },
    Capability { name: "rect", cart: true, fallback: false, bind: bind_rect },
    Capability { name: "rectfill", cart: true, fallback: false, bind: bind_rectfill },
    Capability { name: "circ", cart: true, fallback: false, bind: bind_circ },
    Capability { name: "circfill", cart: true, fallback: false, bind: bind_circfill },
    Capability { name: "tri", cart: true, fallback: false, bind: bind_tri },
    Capability { name: "trifill", cart: true, fallback: false, bind: bind_trifill },
    Capability { name: "print", cart: true, fallback: true, bind: bind_print },
    Capability { name: "textwidth", cart: true, fallback: true, bind: bind_textwidth },
    Capability { name: "spr", cart: true, fallback: false, bind: bind_spr },
    Capability { name: "sprdef", cart: true, fallback: false, bind: bind_sprdef },
    Capability { name: "clip", cart: true, fallback: false, bind: bind_clip },
    Capability { name: "btn", cart: true, fallback: true, bind: bind_btn },
    Capability { name: "trace", cart: true, fallback: true, bind: bind_trace },
    Capability { name: "version", cart: true, fallback: true, bind: bind_version },
    Capability { name: "copyclip", cart: false, fallback: true, bind: bind_copyclip },
    Capability { name: "restartdown", cart: false, fallback: true, bind: bind_restartdown },
    Capability { name: "printwrap", cart: false, fallback: true, bind: bind_printwrap },
];

pub fn registry() -> &'static [Capability] {
    REGISTRY
}

/// Install the capability set for `surface` into the interpreter globals.
pub fn register(lua: &Lua, console: &SharedConsole, surface: Surface) -> mlua::Result<()> {
    let globals = lua.globals();
    for cap in REGISTRY {
        let wanted = match surface {
            Surface::Cart => cap.cart,
            Surface::Fallback => cap.fallback,
        };
        if wanted {
            globals.set(cap.name, (cap.bind)(lua, console.clone())?)?;
        }
    }
    Ok(())
}

fn script_err(e: ApiError) -> mlua::Error {
    mlua::Error::RuntimeError(e.to_string())
}

fn bind_cls(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, c: Option<i64>| {
        console.borrow_mut().cls(c.unwrap_or(0)).map_err(script_err)
    })
}

fn bind_pix(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, (x, y, c): (i64, i64, i64)| {
        console.borrow_mut().pix(x, y, c).map_err(script_err)
    })
}

fn bind_pget(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, (x, y): (i64, i64)| {
        console
            .borrow_mut()
            .pget(x, y)
            .map(|c| c as i64)
            .map_err(script_err)
    })
}

fn bind_line(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, (x0, y0, x1, y1, c): (i64, i64, i64, i64, i64)| {
        console
            .borrow_mut()
            .line(x0, y0, x1, y1, c)
            .map_err(script_err)
    })
}

fn bind_rect(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, (x, y, w, h, c): (i64, i64, i64, i64, i64)| {
        console
            .borrow_mut()
            .rect(x, y, w, h, c, false)
            .map_err(script_err)
    })
}

fn bind_rectfill(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, (x, y, w, h, c): (i64, i64, i64, i64, i64)| {
        console
            .borrow_mut()
            .rect(x, y, w, h, c, true)
            .map_err(script_err)
    })
}

fn bind_circ(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, (x, y, r, c): (i64, i64, i64, i64)| {
        console
            .borrow_mut()
            .circ(x, y, r, c, false)
            .map_err(script_err)
    })
}

fn bind_circfill(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, (x, y, r, c): (i64, i64, i64, i64)| {
        console
            .borrow_mut()
            .circ(x, y, r, c, true)
            .map_err(script_err)
    })
}

type TriArgs = (i64, i64, i64, i64, i64, i64, i64);

fn bind_tri(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, (x1, y1, x2, y2, x3, y3, c): TriArgs| {
        console
            .borrow_mut()
            .tri(x1, y1, x2, y2, x3, y3, c, false)
            .map_err(script_err)
    })
}

fn bind_trifill(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, (x1, y1, x2, y2, x3, y3, c): TriArgs| {
        console
            .borrow_mut()
            .tri(x1, y1, x2, y2, x3, y3, c, true)
            .map_err(script_err)
    })
}

fn bind_print(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(
        move |_, (text, x, y, c): (mlua::String, Option<i64>, Option<i64>, Option<i64>)| {
            console
                .borrow_mut()
                .print(
                    &text.to_string_lossy(),
                    x.unwrap_or(0),
                    y.unwrap_or(0),
                    // Default white text.
                    c.unwrap_or(255),
                )
                .map_err(script_err)
        },
    )
}

fn bind_textwidth(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, text: mlua::String| {
        Ok(console.borrow().text_width(&text.to_string_lossy()) as i64)
    })
}

fn bind_spr(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(
        move |_,
              (id, x, y, scale, flip, rotation): (
            i64,
            f64,
            f64,
            Option<f64>,
            Option<i64>,
            Option<f64>,
        )| {
            console
                .borrow_mut()
                .spr(
                    id,
                    x,
                    y,
                    scale.unwrap_or(1.0),
                    flip.unwrap_or(0),
                    rotation.unwrap_or(0.0),
                )
                .map_err(script_err)
        },
    )
}

fn bind_sprdef(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(
        move |_, (page, x, y, w, h, colorkey): (i64, i64, i64, i64, i64, Option<i64>)| {
            console
                .borrow_mut()
                .sprdef(page, x, y, w, h, colorkey)
                .map(|id| id as i64)
                .map_err(script_err)
        },
    )
}

fn bind_clip(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(
        move |_, (x, y, w, h): (Option<i64>, Option<i64>, Option<i64>, Option<i64>)| {
            match (x, y, w, h) {
                (None, None, None, None) => {
                    console.borrow_mut().clear_clip();
                    Ok(())
                }
                (Some(x), Some(y), Some(w), Some(h)) => {
                    console.borrow_mut().clip(x, y, w, h).map_err(script_err)
                }
                _ => Err(mlua::Error::RuntimeError(
                    "clip expects no arguments or all of x, y, w, h".into(),
                )),
            }
        },
    )
}

fn bind_btn(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, i: i64| console.borrow().btn(i).map_err(script_err))
}

fn bind_trace(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, message: mlua::String| {
        console.borrow().trace(&message.to_string_lossy());
        Ok(())
    })
}

fn bind_version(lua: &Lua, _console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, ()| Ok(VERSION))
}

fn bind_copyclip(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, text: mlua::String| {
        console
            .borrow_mut()
            .copy_to_clipboard(text.to_string_lossy().to_string());
        Ok(())
    })
}

fn bind_restartdown(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(move |_, ()| Ok(console.borrow().restart_down()))
}

fn bind_printwrap(lua: &Lua, console: SharedConsole) -> mlua::Result<Function> {
    lua.create_function(
        move |_, (text, x, y, max_width, c): (mlua::String, i64, i64, i64, Option<i64>)| {
            console
                .borrow_mut()
                .print_wrapped(&text.to_string_lossy(), x, y, max_width, c.unwrap_or(255))
                .map_err(script_err)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::Cart;
    use mlua::{LuaOptions, StdLib};

    fn lua_console(surface: Surface) -> (Lua, SharedConsole) {
        let console = Rc::new(RefCell::new(Console::new(Cart::from_builtin(""))));
        let lua = Lua::new_with(StdLib::MATH | StdLib::STRING, LuaOptions::default()).unwrap();
        register(&lua, &console, surface).unwrap();
        (lua, console)
    }

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = registry().iter().map(|c| c.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), registry().len());
    }

    #[test]
    fn every_capability_is_reachable_from_a_surface() {
        for cap in registry() {
            assert!(cap.cart || cap.fallback, "{} is unreachable", cap.name);
        }
    }

    #[test]
    fn fallback_surface_is_reduced() {
        let fallback_only: Vec<_> = registry()
            .iter()
            .filter(|c| c.fallback && !c.cart)
            .map(|c| c.name)
            .collect();
        assert_eq!(fallback_only, ["copyclip", "restartdown", "printwrap"]);
        // Resource-touching capabilities stay off the fault screen.
        for name in ["spr", "sprdef", "pget", "clip"] {
            let cap = registry().iter().find(|c| c.name == name).unwrap();
            assert!(!cap.fallback, "{} must not reach the fault screen", name);
        }
    }

    #[test]
    fn cart_surface_round_trips_pixels() {
        let (lua, console) = lua_console(Surface::Cart);
        lua.load("pix(3, 4, 210) result = pget(3, 4)").exec().unwrap();
        let result: i64 = lua.globals().get("result").unwrap();
        assert_eq!(result, 210);
        assert_eq!(console.borrow_mut().pget(3, 4), Ok(210));
    }

    #[test]
    fn argument_violations_raise_catchable_errors() {
        let (lua, _console) = lua_console(Surface::Cart);
        lua.load(
            "ok, err = pcall(pix, 0, 0, 999)\n\
             assert(not ok)\n\
             assert(string.find(tostring(err), 'out of range', 1, true))",
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn fallback_surface_excludes_cart_drawing() {
        let (lua, _console) = lua_console(Surface::Fallback);
        lua.load("assert(spr == nil and sprdef == nil and pget == nil)")
            .exec()
            .unwrap();
        lua.load("assert(type(copyclip) == 'function')").exec().unwrap();
    }

    #[test]
    fn version_is_fixed() {
        let (lua, _console) = lua_console(Surface::Cart);
        let v: String = lua.load("return version()").eval().unwrap();
        assert_eq!(v, VERSION);
    }
}
