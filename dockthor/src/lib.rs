/*!
 * DockThor: telemetry SDK for Rust.
 *
 * The crate applications depend on. Re-exports the core API and the request
 * span collector, and wires up addons (panic hook) through a single `init`.
 *
 * # Quick start
 *
 * ```ignore
 * fn main() {
 *     let _guard = dockthor::init(("PROJECT_TOKEN", "PRIVATE_KEY")).unwrap();
 *
 *     dockthor::capture_message("Application started", dockthor::Level::Info).ok();
 *
 *     // panics are captured automatically (catch_panics defaults to true)
 *     // _guard drops here → pending deliveries are flushed
 * }
 * ```
 *
 * # Instrumenting requests
 *
 * ```ignore
 * let collector = dockthor::RequestSpanCollector::new(client.clone())
 *     .exclude_paths(["/health"]);
 *
 * let response = collector.handle(request, |req| router.dispatch(req));
 * ```
 */

// ---------------------------------------------------------------------------
// Re-exports: the public surface area
// ---------------------------------------------------------------------------

pub use dockthor_core::{
    capture_error, capture_message, capture_transaction, close, dispatch_exception, flush,
    get_client, AuthData, Client, Dispatch, Error, Event, EventKind, Exception, Frame, Guard,
    InAppFilter, Level, RawFrame, RequestContext, Result, SchemaVersion, Serializer, Span,
    StacktraceExtractor, Transport, User, FLUSH_TIMEOUT, SDK_NAME, SDK_VERSION,
};
pub use dockthor_middleware::{
    InboundRequest, RequestSpanCollector, ResponseStatus, FAILURE_STATUS, OP_HTTP_SERVER,
};

/// Core client configuration, for building a `Client` by hand.
pub use dockthor_core::Options as ClientOptions;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/**
 * Configuration for `init`.
 *
 * Implements `From<(&str, &str)>` and `From<ClientOptions>` so the common
 * cases need no struct literal. `catch_panics` defaults to `true`.
 */
#[derive(Debug, Clone)]
pub struct Options {
    /// Everything the client itself needs: credentials, endpoint, queue.
    pub client: ClientOptions,

    /// Whether to install a panic hook that reports panics.
    pub catch_panics: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            client: ClientOptions::default(),
            catch_panics: true,
        }
    }
}

impl From<ClientOptions> for Options {
    fn from(client: ClientOptions) -> Self {
        Self {
            client,
            ..Default::default()
        }
    }
}

/// `dockthor::init(("TOKEN", "PRIVATE_KEY"))`.
impl From<(&str, &str)> for Options {
    fn from(credentials: (&str, &str)) -> Self {
        ClientOptions::from(credentials).into()
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

/**
 * Initializes the SDK: installs the global client, then the addons the
 * options ask for.
 *
 * An empty token or private key yields a disabled client; every capture
 * is then a successful no-op.
 *
 * # Errors
 * `Error::Init` if called more than once or the delivery worker cannot be
 * started.
 *
 * # Returns
 * A `Guard`: keep it alive for the duration of the app. When it drops,
 * pending deliveries are flushed.
 */
pub fn init(options: impl Into<Options>) -> Result<Guard> {
    let opts = options.into();
    let guard = dockthor_core::init(opts.client)?;

    if opts.catch_panics {
        dockthor_panic::install();
    }

    Ok(guard)
}
