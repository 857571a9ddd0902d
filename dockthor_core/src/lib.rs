/*!
 * DockThor Core: the SDK engine.
 *
 * Converts runtime occurrences (errors, messages, timed spans) into a
 * canonical `Event`, renders it into the ingestion wire format, and
 * delivers it either on the calling thread (explicit capture, outcome
 * returned) or through a background worker (detached, fire-and-forget).
 *
 * End users normally depend on the `dockthor` facade crate, which
 * re-exports this API and wires up the addons.
 *
 * # Module structure
 *
 * - `protocol/`: what we send: auth, ids, spans, events, stack traces,
 *   serializer
 * - `transport/`: how we deliver: HTTP sender, background worker
 * - `client`: options, the `Client`, the process-wide instance
 * - `dispatch`: the detached-submission seam used by integrations
 * - `guard`: flush-on-drop
 */

mod client;
mod dispatch;
mod error;
mod guard;
pub mod protocol;
pub mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use client::{get_client, Client, Options, DEFAULT_QUEUE_CAPACITY, FLUSH_TIMEOUT};
pub use dispatch::Dispatch;
pub use error::{Error, Result};
pub use guard::Guard;
pub use protocol::auth::AuthData;
pub use protocol::constants::{SDK_NAME, SDK_VERSION};
pub use protocol::event::{Event, EventBuilder, EventKind, ExceptionPayload, Level, Stacktrace};
pub use protocol::exception::{panic_message, Exception};
pub use protocol::serializer::{RequestContext, SchemaVersion, Serializer, User};
pub use protocol::span::Span;
pub use protocol::stacktrace::{Frame, InAppFilter, RawFrame, StacktraceExtractor};
pub use transport::Transport;

// ---------------------------------------------------------------------------
// Process-wide API
// ---------------------------------------------------------------------------

/**
 * Builds a `Client` from `options` and installs it process-wide.
 *
 * Keep the returned `Guard` alive for the life of the application; dropping
 * it drains pending detached deliveries.
 *
 * # Errors
 * `Error::Init` if a client is already installed or the worker thread
 * cannot be spawned.
 */
pub fn init(options: impl Into<Options>) -> Result<Guard> {
    client::install(Client::new(options)?)?;
    Ok(Guard::new())
}

/**
 * Captures `error` through the global client. `Ok(())` when uninitialized.
 */
pub fn capture_error<E: std::error::Error + ?Sized>(error: &E) -> Result<()> {
    match get_client() {
        Some(client) => client.capture_error(error),
        None => Ok(()),
    }
}

/// Captures a message through the global client. `Ok(())` when uninitialized.
pub fn capture_message(message: &str, level: Level) -> Result<()> {
    match get_client() {
        Some(client) => client.capture_message(message, level),
        None => Ok(()),
    }
}

/// Captures a transaction through the global client. `Ok(())` when uninitialized.
pub fn capture_transaction(name: &str, spans: Vec<Span>) -> Result<()> {
    match get_client() {
        Some(client) => client.capture_transaction(name, spans),
        None => Ok(()),
    }
}

/**
 * Queues an exception for detached delivery through the global client.
 *
 * Low-level entry point for addons (e.g. the panic hook) that must not
 * block. Silent no-op when uninitialized.
 */
pub fn dispatch_exception(exception: Exception) {
    if let Some(client) = get_client() {
        client.dispatch_exception(exception);
    }
}

/**
 * Drains detached deliveries of the global client. `true` when nothing is
 * pending or the queue drained within `FLUSH_TIMEOUT`.
 */
pub fn flush() -> bool {
    get_client().map_or(true, |client| client.flush(FLUSH_TIMEOUT))
}

/**
 * Closes the global client: drains, then rejects further captures.
 */
pub fn close() {
    if let Some(client) = get_client() {
        client.close();
    }
}
