/*!
 * HTTP delivery to the ingestion endpoint.
 *
 * Uses `ureq`: a blocking client with its own connection pool. The agent is
 * internally synchronized, so one `Transport` is shared by the caller threads
 * doing explicit captures and the background worker doing detached ones.
 *
 * One POST per event, no retries. Anything but a 2xx is a delivery failure
 * returned to the caller.
 */

use std::sync::RwLock;
use std::time::Duration;

use ureq::Agent;

use crate::error::{Error, Result};
use crate::protocol::auth::AuthData;
use crate::protocol::event::Event;
use crate::protocol::serializer::{RequestContext, Serializer, User};

/// Per-request network timeout used when the host application sets none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Transport {
    auth: AuthData,
    serializer: Serializer,

    /// `None` once closed. Dropping the agent releases the pool after any
    /// in-flight requests holding a clone have completed.
    agent: RwLock<Option<Agent>>,
}

impl Transport {
    /**
     * Creates a transport for `auth` with a fixed per-request `timeout`.
     */
    pub fn new(auth: AuthData, serializer: Serializer, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            auth,
            serializer,
            agent: RwLock::new(Some(agent)),
        }
    }

    pub fn auth(&self) -> &AuthData {
        &self.auth
    }

    /**
     * Delivers `event` to the project or transaction endpoint.
     */
    pub fn send(&self, event: &Event, is_transaction: bool) -> Result<()> {
        self.send_with(event, is_transaction, None, None)
    }

    /**
     * Delivers `event` with optional request and user context.
     *
     * Steps run strictly in order: resolve URL, serialize, POST.
     *
     * # Errors
     * - `Error::Closed` after `close()`.
     * - `Error::Serialize` for a malformed event.
     * - `Error::Network` on connect failure or timeout.
     * - `Error::Status` for any non-2xx response.
     */
    pub fn send_with(
        &self,
        event: &Event,
        is_transaction: bool,
        request: Option<&RequestContext>,
        user: Option<&User>,
    ) -> Result<()> {
        let agent = self.agent()?;

        let url = if is_transaction {
            self.auth.transaction_url()
        } else {
            self.auth.project_url()
        };
        let body = self.serializer.serialize(event, None, request, user)?;

        tracing::debug!(
            %url,
            event_id = %event.event_id,
            is_transaction,
            bytes = body.len(),
            "delivering event"
        );

        let response = agent
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", self.auth.bearer())
            .send(&body[..])?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "event accepted");
            return Ok(());
        }

        let body = response
            .into_body()
            .read_to_string()
            .unwrap_or_else(|_| "<unreadable body>".into());
        Err(Error::Status {
            status: status.as_u16(),
            body,
        })
    }

    /**
     * Rejects further sends. Requests already in flight run to completion.
     */
    pub fn close(&self) {
        if let Ok(mut agent) = self.agent.write() {
            agent.take();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.agent.read().map_or(true, |agent| agent.is_none())
    }

    fn agent(&self) -> Result<Agent> {
        self.agent
            .read()
            .ok()
            .and_then(|agent| agent.clone())
            .ok_or(Error::Closed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::protocol::event::Level;
    use crate::protocol::span::Span;
    use crate::transport::test_server::TestServer;

    fn transport(server: &TestServer) -> Transport {
        Transport::new(server.auth(), Serializer::default(), DEFAULT_TIMEOUT)
    }

    #[test]
    fn success_statuses() {
        for status in [200, 201, 204] {
            let server = TestServer::start(status);
            let event = Event::from_message("ok", Level::Info, "test");
            assert!(transport(&server).send(&event, false).is_ok(), "status {status}");
        }
    }

    #[test]
    fn server_error_is_a_delivery_failure() {
        let server = TestServer::start(500);
        let event = Event::from_message("boom", Level::Error, "test");

        let err = transport(&server).send(&event, false).unwrap_err();
        assert!(err.is_delivery_failure());
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn request_shape() {
        let server = TestServer::start(200);
        let event = Event::from_message("hello", Level::Info, "test");
        transport(&server).send(&event, false).unwrap();

        let requests = server.wait_for(1);
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/v1/abc/project/");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("authorization"), Some("Bearer k"));

        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["message"], "hello");
        assert_eq!(body["event_id"], event.event_id.as_str());
    }

    #[test]
    fn transactions_go_to_the_transaction_endpoint() {
        let server = TestServer::start(200);
        let mut span = Span::new();
        span.finish();
        let event = Event::from_transaction("GET /", vec![span], "test");
        transport(&server).send(&event, true).unwrap();

        assert_eq!(server.wait_for(1)[0].path, "/api/v1/abc/transaction/");
    }

    #[test]
    fn unreachable_endpoint_is_a_network_error() {
        let auth = TestServer::unreachable_auth();
        let transport = Transport::new(auth, Serializer::default(), Duration::from_secs(2));
        let event = Event::from_message("lost", Level::Info, "test");

        let err = transport.send(&event, false).unwrap_err();
        assert!(matches!(err, Error::Network(_)), "{err:?}");
        assert!(err.is_delivery_failure());
    }

    #[test]
    fn one_transport_serves_concurrent_senders() {
        let server = TestServer::start(200);
        let transport = Arc::new(transport(&server));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let transport = Arc::clone(&transport);
                thread::spawn(move || {
                    let event = Event::from_message(format!("m{i}"), Level::Info, "test");
                    transport.send(&event, false)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        let requests = server.requests();
        assert_eq!(requests.len(), 8);
        let mut messages: Vec<String> = requests
            .iter()
            .map(|r| {
                let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
                body["message"].as_str().unwrap().to_string()
            })
            .collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), 8);
    }

    #[test]
    fn close_lets_an_in_flight_send_finish() {
        let server = TestServer::start_delayed(200, Duration::from_millis(300));
        let transport = Arc::new(transport(&server));

        let in_flight = {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                transport.send(&Event::from_message("slow", Level::Info, "test"), false)
            })
        };

        assert_eq!(server.wait_for(1).len(), 1);
        transport.close();

        assert!(in_flight.join().unwrap().is_ok());
        let late = Event::from_message("late", Level::Info, "test");
        assert!(matches!(transport.send(&late, false), Err(Error::Closed)));
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn closed_transport_rejects_sends() {
        let server = TestServer::start(200);
        let transport = transport(&server);
        transport.close();

        assert!(transport.is_closed());
        let event = Event::from_message("late", Level::Info, "test");
        assert!(matches!(transport.send(&event, false), Err(Error::Closed)));
        assert!(server.requests().is_empty());
    }
}
