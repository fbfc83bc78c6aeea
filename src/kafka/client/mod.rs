mod handlers;
pub mod types;

use std::sync::Arc;

use log::debug;

use super::broker::{BrokerPool, RoundTripper};
use super::config::ClientConfig;
use super::context::RequestContext;
use super::error::ClientError;
use super::protocol::BrokerRequest;
use handlers::handle_elect_leaders;
use types::{ElectLeadersRequest, ElectLeadersResponse};

/// Admin client for Kafka brokers.
///
/// Cheap to clone; clones share the underlying connections.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn RoundTripper>,
    default_broker: Option<String>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let default_broker = config.broker.clone();
        Self {
            transport: Arc::new(BrokerPool::new(config)),
            default_broker,
        }
    }

    /// Builds a client on top of any dispatcher, e.g. a stub in tests.
    pub fn with_transport(transport: Arc<dyn RoundTripper>) -> Self {
        Self { transport, default_broker: None }
    }

    pub fn with_default_broker(mut self, addr: impl Into<String>) -> Self {
        self.default_broker = Some(addr.into());
        self
    }

    pub(crate) fn resolve_addr(&self, addr: Option<&str>) -> Result<String, ClientError> {
        addr.or(self.default_broker.as_deref())
            .map(str::to_string)
            .ok_or(ClientError::NoBrokerAddress)
    }

    /// Sends `request` to `addr` and returns the response the protocol pairs
    /// with it.
    ///
    /// # Panics
    ///
    /// If the dispatcher answers with a different response type, which means
    /// the dispatcher itself is broken.
    pub async fn round_trip<R: BrokerRequest>(
        &self,
        ctx: &RequestContext,
        addr: &str,
        request: R,
    ) -> Result<R::Response, ClientError> {
        debug!("Sending {:?} request to {}", R::API_KEY, addr);
        let response = self
            .transport
            .round_trip(ctx, addr, R::API_KEY, request.into_kind())
            .await?;
        match R::response_from(response) {
            Ok(response) => Ok(response),
            Err(other) => panic!("{:?} request answered with mismatched response {:?}", R::API_KEY, other),
        }
    }

    /// Asks the broker to run leader elections for the given partitions.
    ///
    /// Only dispatch failures are returned as errors. Election failures are
    /// reported through the error codes in the response.
    pub async fn elect_leaders(
        &self,
        ctx: &RequestContext,
        request: &ElectLeadersRequest,
    ) -> Result<ElectLeadersResponse, ClientError> {
        handle_elect_leaders(self, ctx, request).await
    }
}


#[cfg(test)]
mod tests {
    use kafka_protocol::messages::{ApiVersionsRequest, ApiVersionsResponse, ElectLeadersResponse as WireResponse, ResponseKind};

    use super::testing::StubTransport;
    use super::*;

    #[test]
    fn explicit_address_wins_over_default() {
        let client = Client::with_transport(StubTransport::new(|| Err(ClientError::Cancelled)))
            .with_default_broker("default:9092");
        assert_eq!(client.resolve_addr(Some("other:9092")).unwrap(), "other:9092");
        assert_eq!(client.resolve_addr(None).unwrap(), "default:9092");
    }

    #[test]
    fn missing_address_is_an_error() {
        let client = Client::with_transport(StubTransport::new(|| Err(ClientError::Cancelled)));
        assert!(matches!(client.resolve_addr(None), Err(ClientError::NoBrokerAddress)));
    }

    #[tokio::test]
    async fn round_trip_unwraps_matching_response() {
        let stub = StubTransport::new(|| {
            Ok(ResponseKind::ApiVersions(ApiVersionsResponse::default().with_error_code(35)))
        });
        let client = Client::with_transport(stub.clone());
        let response = client
            .round_trip(&RequestContext::new(), "b:9092", ApiVersionsRequest::default())
            .await
            .unwrap();
        assert_eq!(response.error_code, 35);
        assert_eq!(stub.calls.lock().unwrap()[0].1, kafka_protocol::messages::ApiKey::ApiVersions);
    }

    #[tokio::test]
    #[should_panic(expected = "mismatched response")]
    async fn round_trip_panics_on_mismatched_response() {
        let stub = StubTransport::new(|| Ok(ResponseKind::ElectLeaders(WireResponse::default())));
        let client = Client::with_transport(stub);
        let _ = client
            .round_trip(&RequestContext::new(), "b:9092", ApiVersionsRequest::default())
            .await;
    }
}
