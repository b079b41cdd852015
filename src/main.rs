mod api;
mod cart;
mod color;
mod console;
mod frontend;
mod gfx;
mod input;
mod riff;
mod screen;
mod script;
mod shutdown;

use std::path::Path;
use std::process;

use crate::cart::{Cart, NO_CART_PROGRAM};
use crate::console::VERSION;

fn main() {
    env_logger::init();
    shutdown::install();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("NeXUS {}", VERSION);
        eprintln!("Usage: {} [cartridge]", args[0]);
        eprintln!("Drop a cartridge file onto the window to hot-swap it.");
        return;
    }
    if args.len() > 2 {
        eprintln!("Usage: {} [cartridge]", args[0]);
        process::exit(2);
    }

    log::info!("NEXUS: version {}", VERSION);

    let (console, runtime) = match script::session(Cart::from_builtin(NO_CART_PROGRAM)) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("failed to start the interpreter: {}", e);
            process::exit(1);
        }
    };

    if let Some(path) = args.get(1) {
        let cart = console.borrow().load_cart_file(Path::new(path));
        console.borrow_mut().replace_cart(cart);
    }

    if let Err(e) = frontend::run(console, runtime) {
        eprintln!("{}", e);
        process::exit(1);
    }

    let code = shutdown::exit_code();
    if code != 0 {
        process::exit(code);
    }
}
