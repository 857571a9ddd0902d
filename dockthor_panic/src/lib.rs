/*!
 * DockThor panic hook: reports unhandled panics as exception events.
 *
 * `install()` registers a `std::panic::set_hook` handler that:
 *
 * 1. Extracts the panic message, source location and thread name.
 * 2. Captures a backtrace at the panic site. Symbols are resolved later,
 *    on the delivery worker.
 * 3. Queues an `Exception { type_name: "panic", .. }` for detached delivery
 *    through the global client.
 * 4. Calls the previous hook, so the default stderr output is preserved.
 *
 * Delivery happens on the worker thread; keep the `Guard` from `init()`
 * alive so it can drain the queue while the process unwinds.
 */

use std::cell::Cell;
use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicBool, Ordering};

use dockthor_core::{panic_message, Exception};

/// Exception type name used for every panic.
pub const PANIC_TYPE: &str = "panic";

static INSTALLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// Set while this thread runs the hook; breaks recursion if capturing
    /// itself panics.
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

/**
 * Installs the panic hook. Idempotent.
 *
 * Call after `dockthor_core::init()`; without a global client the hook
 * only forwards to the previous one.
 */
pub fn install() {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    let previous_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        let reentered = IN_HOOK.with(|flag| flag.replace(true));

        if !reentered {
            let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                dockthor_core::dispatch_exception(exception_from_panic(info));
            }));
            IN_HOOK.with(|flag| flag.set(false));
        }

        previous_hook(info);
    }));
}

/**
 * Builds the exception reported for a panic, with an unresolved backtrace
 * of the current thread.
 */
pub fn exception_from_panic(info: &PanicHookInfo<'_>) -> Exception {
    let location = info
        .location()
        .map(|loc| format!(" at {}:{}", loc.file(), loc.line()))
        .unwrap_or_default();

    let thread = std::thread::current();
    let thread_name = thread.name().unwrap_or("<unnamed>");

    let value = format!(
        "{}{location} [thread: {thread_name}]",
        panic_message(info.payload())
    );

    Exception::new(PANIC_TYPE, value).with_unresolved(backtrace::Backtrace::new_unresolved())
}
