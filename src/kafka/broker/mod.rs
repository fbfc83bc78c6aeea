pub mod connection;
pub mod pool;
pub mod types;

use async_trait::async_trait;
use kafka_protocol::messages::{ApiKey, RequestKind, ResponseKind};

use super::context::RequestContext;
use super::error::ClientError;

pub use pool::BrokerPool;
pub use types::SupportedVersions;

/// Sends one request to the broker at `addr` and waits for its reply.
///
/// Implementations must answer a `RequestKind` variant with the matching
/// `ResponseKind` variant, give up with [`ClientError::Cancelled`] or
/// [`ClientError::DeadlineExceeded`] once `ctx` ends, and tolerate
/// concurrent calls for the same or different addresses.
#[async_trait]
pub trait RoundTripper: Send + Sync {
    async fn round_trip(
        &self,
        ctx: &RequestContext,
        addr: &str,
        api_key: ApiKey,
        request: RequestKind,
    ) -> Result<ResponseKind, ClientError>;
}
