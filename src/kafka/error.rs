use kafka_protocol::messages::ApiKey;
use thiserror::Error;

/// Failures of a broker round trip.
///
/// Only transport-level problems are represented here. Error codes the
/// broker returns inside a well-formed response are data and are handed to
/// the caller untouched.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error talking to broker: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to broker {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("codec error: {0:#}")]
    Codec(anyhow::Error),

    #[error("correlation id mismatch: sent {expected}, received {actual}")]
    CorrelationMismatch { expected: i32, actual: i32 },

    #[error("invalid message size: {0}")]
    MessageTooLarge(i32),

    #[error("broker does not support {0:?} in a version this client speaks")]
    UnsupportedVersion(ApiKey),

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("connection to {0} closed")]
    ConnectionClosed(String),

    #[error("no broker address given and no default broker configured")]
    NoBrokerAddress,

    #[error("{field} value {value} does not fit the wire representation")]
    OutOfRange { field: &'static str, value: i128 },
}

impl From<anyhow::Error> for ClientError {
    fn from(e: anyhow::Error) -> Self {
        ClientError::Codec(e)
    }
}

impl ClientError {
    /// True for the two ways a caller-supplied context can end a request.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ClientError::Cancelled | ClientError::DeadlineExceeded)
    }
}
