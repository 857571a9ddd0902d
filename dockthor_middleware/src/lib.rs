/*!
 * Request span collector: one transaction per inbound HTTP request.
 *
 * Framework-agnostic: an adapter exposes the request through
 * `InboundRequest` and the response through `ResponseStatus`, then routes
 * the handler call through `RequestSpanCollector::handle`.
 *
 * Per request:
 *
 * ```text
 * START ──► handler ──┬─ Ok(response) ─► COMPLETE (status = response code)
 *                     ├─ Err(error) ───► FAILED   (status = 500)
 *                     └─ panic ────────► FAILED   (status = 500)
 *
 * then: finish span ─► FAILED only: dispatch exception (detached)
 *                    ─► dispatch one-span transaction (detached)
 *                    ─► return the original Err / resume the original panic
 * ```
 *
 * The span ends as soon as the handler returns, so its duration covers the
 * handler alone. Failures are captured with an unresolved backtrace; symbol
 * lookup and source extraction happen on the delivery worker. The handler's
 * response and error pass through untouched, and queueing is the only added
 * cost on the response path. Requests whose path starts with an excluded
 * prefix skip all of this.
 */

use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use backtrace::Backtrace;

use dockthor_core::{panic_message, Dispatch, Exception, Span};
use serde_json::Value;

/// Span operation recorded for every request.
pub const OP_HTTP_SERVER: &str = "http.server";

/// Status recorded when the handler failed instead of responding.
pub const FAILURE_STATUS: u16 = 500;

// ---------------------------------------------------------------------------
// Framework boundary
// ---------------------------------------------------------------------------

/**
 * What the collector needs to know about an inbound request.
 */
pub trait InboundRequest {
    fn method(&self) -> &str;

    fn path(&self) -> &str;

    /// Raw query string without the leading `?`.
    fn query(&self) -> &str {
        ""
    }

    /// Peer address, if the framework knows it.
    fn client_addr(&self) -> Option<String> {
        None
    }
}

/// A handler response, as far as the collector cares.
pub trait ResponseStatus {
    fn status(&self) -> u16;
}

impl ResponseStatus for u16 {
    fn status(&self) -> u16 {
        *self
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

pub struct RequestSpanCollector<D> {
    dispatch: D,
    exclude_paths: Vec<String>,
}

/// Request facts copied before the request is handed to the handler.
struct RequestFacts {
    method: String,
    path: String,
    query: String,
    client_addr: Option<String>,
}

impl<D: Dispatch> RequestSpanCollector<D> {
    pub fn new(dispatch: D) -> Self {
        Self {
            dispatch,
            exclude_paths: Vec::new(),
        }
    }

    /**
     * Requests whose path starts with any of `prefixes` pass straight
     * through without a span.
     */
    pub fn exclude_paths<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_paths.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /**
     * Runs `next` with `request`, recording one span around it.
     *
     * Returns exactly what `next` returned. If `next` panics, the panic is
     * resumed after the span and exception have been dispatched.
     *
     * Any printable error type works, including `Box<dyn Error>`.
     */
    pub fn handle<R, T, E, F>(&self, request: R, next: F) -> Result<T, E>
    where
        R: InboundRequest,
        T: ResponseStatus,
        E: Display,
        F: FnOnce(R) -> Result<T, E>,
    {
        if self.is_excluded(request.path()) {
            return next(request);
        }

        let facts = RequestFacts {
            method: request.method().to_string(),
            path: request.path().to_string(),
            query: request.query().to_string(),
            client_addr: request.client_addr(),
        };
        let name = format!("{} {}", facts.method, facts.path);
        let mut span = Span::new()
            .with_op(OP_HTTP_SERVER)
            .with_description(name.clone());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| next(request)));
        span.finish();

        let status = match &outcome {
            Ok(Ok(response)) => response.status(),
            Ok(Err(error)) => {
                self.dispatch.dispatch_exception(Exception::from_display(error));
                FAILURE_STATUS
            }
            Err(payload) => {
                let exception = Exception::new("panic", panic_message(payload.as_ref()))
                    .with_unresolved(Backtrace::new_unresolved());
                self.dispatch.dispatch_exception(exception);
                FAILURE_STATUS
            }
        };

        annotate_span(&mut span, &facts, status);
        tracing::trace!(transaction = %name, status, "dispatching request transaction");
        self.dispatch.dispatch_transaction(name, vec![span]);

        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// Fills in request data and status on an already finished span.
fn annotate_span(span: &mut Span, facts: &RequestFacts, status: u16) {
    let duration_ms = span
        .duration_ms()
        .map(|ms| (ms * 100.0).round() / 100.0)
        .unwrap_or_default();

    let url = if facts.query.is_empty() {
        facts.path.clone()
    } else {
        format!("{}?{}", facts.path, facts.query)
    };

    span.set_status(status.to_string());
    span.set_data("url", url);
    span.set_data("path", facts.path.as_str());
    span.set_data("method", facts.method.as_str());
    span.set_data("query", facts.query.as_str());
    span.set_data("duration_ms", duration_ms);
    span.set_tag("http.status_code", status);
    span.set_tag(
        "client_host",
        facts.client_addr.clone().map_or(Value::Null, Value::from),
    );
}
