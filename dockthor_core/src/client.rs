/**
 * The DockThor client: owns the transport, the detached-delivery worker
 * and the per-client capture settings.
 *
 * Two delivery paths:
 * - **Explicit** (`capture_*`): builds the event, sends it on the calling
 *   thread, and returns the delivery outcome.
 * - **Detached** (`submit`, `Dispatch`): queues the event, or for
 *   exceptions the raw capture, for the worker and returns immediately.
 *   Symbol resolution and source extraction of dispatched exceptions run
 *   on the worker. Failures are logged and dropped.
 *
 * A client built without a token or private key is *disabled*: no HTTP
 * agent, no thread, and every capture is a successful no-op.
 *
 * A process-wide instance can be installed with `dockthor_core::init()`;
 * free functions in the crate root route through it.
 */
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};

use crate::dispatch::Dispatch;
use crate::error::{Error, Result};
use crate::protocol::auth::AuthData;
use crate::protocol::constants::{
    DEFAULT_ENVIRONMENT, DEFAULT_HOST, DEFAULT_PATH, DEFAULT_SCHEME,
};
use crate::protocol::event::{Event, EventBuilder, Level};
use crate::protocol::exception::Exception;
use crate::protocol::serializer::{SchemaVersion, Serializer};
use crate::protocol::span::Span;
use crate::protocol::stacktrace::{InAppFilter, StacktraceExtractor};
use crate::transport::{FlushSignal, Transport, Worker, WorkerMsg, DEFAULT_TIMEOUT};

// ---------------------------------------------------------------------------
// Global singleton
// ---------------------------------------------------------------------------

static GLOBAL_CLIENT: OnceLock<Client> = OnceLock::new();

/**
 * Returns the process-wide client, or `None` before `init()`.
 */
pub fn get_client() -> Option<&'static Client> {
    GLOBAL_CLIENT.get()
}

/**
 * Installs `client` as the process-wide instance. Fails if one is already
 * installed.
 */
pub(crate) fn install(client: Client) -> Result<&'static Client> {
    GLOBAL_CLIENT
        .set(client)
        .map_err(|_| Error::Init("DockThor SDK is already initialized".into()))?;
    GLOBAL_CLIENT
        .get()
        .ok_or_else(|| Error::Init("global client missing after install".into()))
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Flush deadline used by `close()` and the `Guard`.
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Default capacity of the detached-delivery queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/**
 * Client configuration.
 *
 * ```ignore
 * let client = dockthor_core::Client::new(dockthor_core::Options {
 *     environment: "staging".into(),
 *     ..dockthor_core::Options::new("project-token", "private-key")
 * })?;
 * ```
 */
#[derive(Debug, Clone)]
pub struct Options {
    /// Public project token, embedded in the ingestion URL.
    pub token: String,

    /// Secret sent as `Authorization: Bearer <private_key>`.
    pub private_key: String,

    pub environment: String,
    pub scheme: String,
    pub host: String,
    pub path: String,

    /// Per-request network timeout.
    pub timeout: Duration,

    pub schema_version: SchemaVersion,

    /// Decides which frames belong to the application.
    pub in_app: InAppFilter,

    /// Detached deliveries beyond this many pending events are dropped.
    pub queue_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            token: String::new(),
            private_key: String::new(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            schema_version: SchemaVersion::default(),
            in_app: InAppFilter::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Options {
    pub fn new(token: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            private_key: private_key.into(),
            ..Default::default()
        }
    }

    pub fn auth(&self) -> AuthData {
        AuthData::new(self.token.clone(), self.private_key.clone())
            .with_scheme(self.scheme.clone())
            .with_host(self.host.clone())
            .with_path(self.path.clone())
    }
}

/// `("token", "private_key")` with every other option defaulted.
impl From<(&str, &str)> for Options {
    fn from((token, private_key): (&str, &str)) -> Self {
        Self::new(token, private_key)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct Client {
    events: EventBuilder,

    /// `None` for a disabled client.
    delivery: Option<Delivery>,

    closed: AtomicBool,
}

struct Delivery {
    transport: Arc<Transport>,
    sender: Sender<WorkerMsg>,
}

impl Client {
    /**
     * Builds a client and, unless it is disabled, spawns its worker thread.
     *
     * # Errors
     * `Error::Init` if the worker thread cannot be spawned.
     */
    pub fn new(options: impl Into<Options>) -> Result<Self> {
        let options = options.into();
        let events = EventBuilder::new(
            StacktraceExtractor::new(options.in_app.clone()),
            options.environment.clone(),
        );

        let delivery = if options.token.is_empty() || options.private_key.is_empty() {
            tracing::debug!("token or private key missing, client is disabled");
            None
        } else {
            let transport = Arc::new(Transport::new(
                options.auth(),
                Serializer::new(options.schema_version),
                options.timeout,
            ));
            let (sender, receiver) = crossbeam_channel::bounded(options.queue_capacity);
            Worker::spawn(receiver, transport.clone(), events.clone())?;
            Some(Delivery { transport, sender })
        };

        Ok(Self {
            events,
            delivery,
            closed: AtomicBool::new(false),
        })
    }

    pub fn environment(&self) -> &str {
        self.events.environment()
    }

    pub fn is_enabled(&self) -> bool {
        self.delivery.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Explicit captures
    // -----------------------------------------------------------------------

    /**
     * Sends a pre-built event on the calling thread.
     *
     * # Errors
     * `Error::Closed` after `close()`; otherwise whatever delivery reports.
     */
    pub fn capture_event(&self, event: &Event) -> Result<()> {
        match self.live()? {
            Some(delivery) => delivery.transport.send(event, event.is_transaction()),
            None => Ok(()),
        }
    }

    /// Captures `exception` at level `error`.
    pub fn capture_exception(&self, exception: &Exception) -> Result<()> {
        self.capture_event(&self.events.exception(exception))
    }

    /// Captures any `std::error::Error`, with a backtrace of this call site.
    pub fn capture_error<E: StdError + ?Sized>(&self, error: &E) -> Result<()> {
        self.capture_exception(&Exception::from_error(error))
    }

    pub fn capture_message(&self, message: &str, level: Level) -> Result<()> {
        self.capture_event(&self.events.message(message, level))
    }

    /// Captures a transaction; delivered to the transaction endpoint.
    pub fn capture_transaction(&self, name: &str, spans: Vec<Span>) -> Result<()> {
        self.capture_event(&self.events.transaction(name, spans))
    }

    // -----------------------------------------------------------------------
    // Detached delivery
    // -----------------------------------------------------------------------

    /**
     * Queues `event` for the worker and returns at once. Drops the event
     * (with a warning) if the client is closed or the queue is full.
     */
    pub fn submit(&self, event: Event) {
        self.enqueue(WorkerMsg::Deliver(event));
    }

    fn enqueue(&self, msg: WorkerMsg) {
        let delivery = match self.live() {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return,
            Err(_) => {
                tracing::warn!("client closed, dropping detached event");
                return;
            }
        };

        match delivery.sender.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("detached delivery queue is full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("worker thread has shut down, dropping event");
            }
        }
    }

    /**
     * Blocks until every detached event queued so far has been handled, or
     * `timeout` elapses. Returns `true` if the queue drained in time.
     */
    pub fn flush(&self, timeout: Duration) -> bool {
        let Some(delivery) = &self.delivery else {
            return true;
        };

        let signal = Arc::new(FlushSignal::new());
        match delivery
            .sender
            .send_timeout(WorkerMsg::Flush(signal.clone()), timeout)
        {
            Ok(()) => signal.wait_timeout(timeout),
            Err(_) => false,
        }
    }

    /**
     * Drains pending detached deliveries (bounded by `FLUSH_TIMEOUT`), then
     * closes the transport. Requests already in flight complete; new
     * captures fail with `Error::Closed`. Idempotent.
     */
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(delivery) = &self.delivery {
            let signal = Arc::new(FlushSignal::new());
            let drained = delivery
                .sender
                .send_timeout(WorkerMsg::Flush(signal.clone()), FLUSH_TIMEOUT)
                .is_ok()
                && signal.wait_timeout(FLUSH_TIMEOUT);
            if !drained {
                tracing::warn!("flush timed out while closing, some events may be lost");
            }
            delivery.transport.close();
        }
    }

    fn live(&self) -> Result<Option<&Delivery>> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(self.delivery.as_ref())
    }
}

impl Dispatch for Client {
    fn dispatch_exception(&self, exception: Exception) {
        self.enqueue(WorkerMsg::Capture(exception));
    }

    fn dispatch_transaction(&self, name: String, spans: Vec<Span>) {
        self.submit(self.events.transaction(name, spans));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_server::TestServer;

    fn client_for(server: &TestServer) -> Client {
        let auth = server.auth();
        Client::new(Options {
            scheme: auth.scheme,
            host: auth.host,
            path: auth.path,
            environment: "test".into(),
            ..Options::new(auth.token, auth.private_key)
        })
        .unwrap()
    }

    #[test]
    fn explicit_capture_reports_success() {
        let server = TestServer::start(201);
        let client = client_for(&server);

        client.capture_message("hello", Level::Info).unwrap();

        let body: serde_json::Value = serde_json::from_slice(&server.requests()[0].body).unwrap();
        assert_eq!(body["environment"], "test");
        assert_eq!(body["level"], "info");
    }

    #[test]
    fn explicit_capture_reports_failure() {
        let server = TestServer::start(500);
        let client = client_for(&server);

        let err = client.capture_message("boom", Level::Error).unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn capture_error_sends_exception_payload() {
        let server = TestServer::start(200);
        let client = client_for(&server);
        let err = "nope".parse::<u8>().unwrap_err();

        client.capture_error(&err).unwrap();

        let body: serde_json::Value = serde_json::from_slice(&server.requests()[0].body).unwrap();
        assert_eq!(body["level"], "error");
        assert_eq!(body["exception"]["values"][0]["type"], "ParseIntError");
        assert_eq!(server.requests()[0].path, "/api/v1/abc/project/");
    }

    #[test]
    fn transaction_capture_uses_transaction_endpoint() {
        let server = TestServer::start(200);
        let client = client_for(&server);
        let mut span = Span::new();
        span.finish();

        client.capture_transaction("GET /", vec![span]).unwrap();
        assert_eq!(server.requests()[0].path, "/api/v1/abc/transaction/");
    }

    #[test]
    fn detached_dispatch_is_delivered_by_the_worker() {
        let server = TestServer::start(200);
        let client = client_for(&server);

        client.dispatch_transaction("GET /x".into(), vec![Span::new()]);
        client.dispatch_exception(Exception::new("E", "bad"));
        assert!(client.flush(Duration::from_secs(5)));

        let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&"/api/v1/abc/transaction/".to_string()));
        assert!(paths.contains(&"/api/v1/abc/project/".to_string()));
    }

    #[test]
    fn dispatched_exception_is_symbolized_off_the_caller_thread() {
        let server = TestServer::start(200);
        let client = client_for(&server);

        let exception = Exception::from_error(&"x".parse::<u8>().unwrap_err());
        assert!(!exception.is_resolved());
        client.dispatch_exception(exception);
        assert!(client.flush(Duration::from_secs(5)));

        let body: serde_json::Value = serde_json::from_slice(&server.requests()[0].body).unwrap();
        assert_eq!(body["environment"], "test");
        assert_eq!(body["exception"]["values"][0]["type"], "ParseIntError");
        assert!(!body["exception"]["values"][0]["stacktrace"]["frames"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn detached_failure_is_swallowed() {
        let server = TestServer::start(503);
        let client = client_for(&server);

        client.dispatch_transaction("GET /x".into(), vec![Span::new()]);
        assert!(client.flush(Duration::from_secs(5)));
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn close_rejects_new_captures() {
        let server = TestServer::start(200);
        let client = client_for(&server);

        client.close();
        client.close();

        assert!(client.is_closed());
        assert!(matches!(
            client.capture_message("late", Level::Info),
            Err(Error::Closed)
        ));
        client.dispatch_transaction("late".into(), vec![]);
        assert!(server.requests().is_empty());
    }

    #[test]
    fn close_drains_pending_detached_events() {
        let server = TestServer::start(200);
        let client = client_for(&server);

        client.submit(Event::from_message("queued", Level::Info, "test"));
        client.close();

        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn disabled_client_is_a_no_op() {
        let client = Client::new(Options::default()).unwrap();
        assert!(!client.is_enabled());
        assert!(client.capture_message("nobody listens", Level::Info).is_ok());
        assert!(client.flush(Duration::from_millis(10)));

        let client = Client::new(("token", "")).unwrap();
        assert!(!client.is_enabled());
    }

    #[test]
    fn options_resolve_auth() {
        let options = Options {
            host: "ingest.example".into(),
            ..Options::new("abc", "k")
        };
        assert_eq!(options.auth().project_url(), "https://ingest.example/api/v1/abc/project/");
        assert_eq!(options.environment, "production");
        assert_eq!(options.timeout, Duration::from_secs(10));
    }
}
