//! SIGINT/SIGTERM handling: runners finish the current file, then stop.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exit status when a second signal forces an immediate stop
const FORCED_EXIT_CODE: i32 = 130;

fn flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// Set once the first SIGINT or SIGTERM arrived.
pub fn is_shutdown_requested() -> bool {
    flag().load(Ordering::Relaxed)
}

/// Record a stop request; true if one was already pending.
fn request() -> bool {
    flag().swap(true, Ordering::Relaxed)
}

/// Register SIGINT and SIGTERM handlers.
///
/// The first signal only sets the flag: input already handed to the
/// publisher still drains. A second signal exits the process.
pub fn install_signal_handlers() -> io::Result<()> {
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
        unsafe {
            signal_hook::low_level::register(signal, || {
                if request() {
                    std::process::exit(FORCED_EXIT_CODE);
                }
            })?;
        }
    }
    Ok(())
}
