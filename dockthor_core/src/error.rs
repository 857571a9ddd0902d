/**
 * Error type shared by every fallible operation in the SDK.
 *
 * Only delivery and construction can fail from the caller's point of view.
 * Stack-trace extraction and metadata collection never produce an `Error`;
 * they degrade to empty context or placeholder values instead.
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The ingestion endpoint answered with a non-2xx status.
    #[error("ingestion endpoint responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connect failure, timeout or I/O error while talking to the endpoint.
    #[error("failed to deliver event: {0}")]
    Network(#[from] ureq::Error),

    /// The transport (or the client owning it) has been closed.
    #[error("transport closed")]
    Closed,

    /// An event could not be rendered to JSON. Well-formed events never hit this.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Client construction failed or the global client is already set.
    #[error("initialization failed: {0}")]
    Init(String),
}

impl Error {
    /**
     * Returns `true` for the errors that mean "the payload did not reach
     * the endpoint": an HTTP error status or a network-level failure.
     */
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self, Error::Status { .. } | Error::Network(_))
    }

    /// HTTP status carried by the failure, if the endpoint answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
