/**
 * Transport layer: everything about *how* events reach the endpoint.
 *
 * - `http`: the blocking `ureq` sender used by explicit captures
 * - `worker`: the background thread that performs detached deliveries
 */

pub mod http;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_server;

pub use http::{Transport, DEFAULT_TIMEOUT};
pub use worker::{FlushSignal, Worker, WorkerMsg};
