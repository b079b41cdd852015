//! Process-wide quit flag shared between the frontend loop, the script
//! runtime, and signal handlers.
//!
//! The exit code records why the process is going down: the first
//! non-zero code sticks, so an unrecoverable program fault is not
//! masked by a later clean-quit request.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

static QUIT_REQUESTED: AtomicBool = AtomicBool::new(false);
static EXIT_CODE: AtomicI32 = AtomicI32::new(0);

pub fn should_quit() -> bool {
    QUIT_REQUESTED.load(Ordering::SeqCst)
}

pub fn request_quit() {
    QUIT_REQUESTED.store(true, Ordering::SeqCst);
}

pub fn exit_code() -> i32 {
    EXIT_CODE.load(Ordering::SeqCst)
}

pub fn request_quit_with_code(code: i32) {
    if code != 0 {
        // First failure wins.
        let _ = EXIT_CODE.compare_exchange(0, code, Ordering::SeqCst, Ordering::SeqCst);
    }
    request_quit();
}

/// Route SIGINT/SIGTERM into the quit flag so Ctrl+C tears the frame
/// loop down instead of killing the process mid-frame.
#[cfg(unix)]
pub fn install() {
    use std::os::raw::c_int;
    const SIGINT: c_int = 2;
    const SIGTERM: c_int = 15;

    extern "C" fn handler(_sig: c_int) {
        // Flag only; no IO in signal context.
        request_quit();
    }

    extern "C" {
        fn signal(sig: c_int, handler: extern "C" fn(c_int)) -> usize;
    }

    unsafe {
        let _ = signal(SIGINT, handler);
        let _ = signal(SIGTERM, handler);
    }
}

/// Elsewhere the window close event is the only quit source.
#[cfg(not(unix))]
pub fn install() {}
