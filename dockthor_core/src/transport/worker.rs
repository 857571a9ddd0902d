/**
 * Background worker that performs detached deliveries.
 *
 * ```text
 *  ┌──────────────────┐    bounded channel    ┌────────────────────┐
 *  │ request threads  │ ───── WorkerMsg ────► │ dockthor-worker    │
 *  │ panic hook, etc. │                       │ (single thread)    │
 *  └──────────────────┘                       └─────────┬──────────┘
 *                                                       │ Transport::send()
 *                                                       ▼
 *                                                ingestion endpoint
 * ```
 *
 * Producers never wait on delivery: they `try_send` either a built event or
 * a raw `Exception` and return. Raw exceptions are symbolized, run through
 * the stack-trace extractor and built into events here, so the cost of
 * capturing stays off the producer's thread. For each event the order is
 * extract, serialize, send. A failed delivery is logged and dropped,
 * nobody observes it. Across producers there is no ordering guarantee
 * beyond channel order.
 *
 * The loop exits once every sender is dropped.
 */
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;

use super::http::Transport;
use crate::error::{Error, Result};
use crate::protocol::event::{Event, EventBuilder};
use crate::protocol::exception::Exception;

pub enum WorkerMsg {
    /// A built event waiting for delivery.
    Deliver(Event),

    /// A raw exception, built into an error event by the worker.
    Capture(Exception),

    /// Signals the sender once every message queued before it is handled.
    Flush(Arc<FlushSignal>),
}

// ---------------------------------------------------------------------------
// FlushSignal
// ---------------------------------------------------------------------------

/**
 * One-shot completion flag a flushing thread can wait on.
 */
#[derive(Default)]
pub struct FlushSignal {
    done: Mutex<bool>,
    condvar: Condvar,
}

impl FlushSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        if let Ok(mut done) = self.done.lock() {
            *done = true;
            self.condvar.notify_all();
        }
    }

    /**
     * Blocks until `notify()` or `timeout`. Returns `false` on timeout or
     * a poisoned lock.
     */
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Ok(guard) = self.done.lock() else {
            return false;
        };
        match self.condvar.wait_timeout_while(guard, timeout, |done| !*done) {
            Ok((_, result)) => !result.timed_out(),
            Err(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

pub struct Worker;

impl Worker {
    /**
     * Spawns the worker thread. No join handle is kept; `Client::flush`
     * is how callers wait for the queue to drain.
     */
    pub fn spawn(
        receiver: Receiver<WorkerMsg>,
        transport: Arc<Transport>,
        events: EventBuilder,
    ) -> Result<()> {
        thread::Builder::new()
            .name("dockthor-worker".into())
            .spawn(move || {
                /*
                 * A panic inside the HTTP stack must not take the host
                 * process down with it; log and let the thread end.
                 */
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    Self::run_loop(&receiver, &transport, &events);
                }));

                if result.is_err() {
                    tracing::error!("worker thread panicked, detached deliveries will be dropped");
                }
            })
            .map(|_| ())
            .map_err(|e| Error::Init(format!("failed to spawn worker thread: {e}")))
    }

    fn run_loop(receiver: &Receiver<WorkerMsg>, transport: &Transport, events: &EventBuilder) {
        while let Ok(msg) = receiver.recv() {
            match msg {
                WorkerMsg::Deliver(event) => Self::deliver(transport, &event),
                WorkerMsg::Capture(mut exception) => {
                    exception.resolve();
                    Self::deliver(transport, &events.exception(&exception));
                }
                WorkerMsg::Flush(signal) => signal.notify(),
            }
        }
        tracing::debug!("worker channel disconnected, exiting");
    }

    fn deliver(transport: &Transport, event: &Event) {
        if let Err(err) = transport.send(event, event.is_transaction()) {
            tracing::warn!(
                event_id = %event.event_id,
                error = %err,
                "detached delivery failed, dropping event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::event::Level;
    use crate::protocol::serializer::Serializer;
    use crate::protocol::stacktrace::StacktraceExtractor;
    use crate::transport::http::DEFAULT_TIMEOUT;
    use crate::transport::test_server::TestServer;

    fn spawn(server_status: u16) -> (TestServer, crossbeam_channel::Sender<WorkerMsg>) {
        let server = TestServer::start(server_status);
        let transport = Arc::new(Transport::new(server.auth(), Serializer::default(), DEFAULT_TIMEOUT));
        let (tx, rx) = crossbeam_channel::bounded(8);
        let events = EventBuilder::new(StacktraceExtractor::default(), "worker-test");
        Worker::spawn(rx, transport, events).unwrap();
        (server, tx)
    }

    fn flush(tx: &crossbeam_channel::Sender<WorkerMsg>) -> bool {
        let signal = Arc::new(FlushSignal::new());
        tx.send(WorkerMsg::Flush(signal.clone())).unwrap();
        signal.wait_timeout(Duration::from_secs(5))
    }

    #[test]
    fn delivers_queued_events_before_flush_completes() {
        let (server, tx) = spawn(200);
        for i in 0..3 {
            let event = Event::from_message(format!("m{i}"), Level::Info, "test");
            tx.send(WorkerMsg::Deliver(event)).unwrap();
        }

        assert!(flush(&tx));
        assert_eq!(server.requests().len(), 3);
    }

    #[test]
    fn failed_delivery_does_not_stop_the_worker() {
        let (server, tx) = spawn(500);
        tx.send(WorkerMsg::Deliver(Event::from_message("a", Level::Info, "t"))).unwrap();
        tx.send(WorkerMsg::Deliver(Event::from_message("b", Level::Info, "t"))).unwrap();

        assert!(flush(&tx));
        assert_eq!(server.requests().len(), 2);
    }

    #[test]
    fn raw_exceptions_are_resolved_and_built_on_the_worker() {
        let (server, tx) = spawn(200);
        let err = "x".parse::<u8>().unwrap_err();
        let exception = Exception::from_error(&err);
        assert!(!exception.is_resolved());

        tx.send(WorkerMsg::Capture(exception)).unwrap();
        assert!(flush(&tx));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/api/v1/abc/project/");

        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["level"], "error");
        assert_eq!(body["environment"], "worker-test");
        assert_eq!(body["exception"]["values"][0]["type"], "ParseIntError");
        let frames = body["exception"]["values"][0]["stacktrace"]["frames"].as_array().unwrap();
        assert!(!frames.is_empty());
    }

    #[test]
    fn flush_signal_times_out_without_notify() {
        let signal = FlushSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        signal.notify();
        assert!(signal.wait_timeout(Duration::from_millis(20)));
    }
}
