pub mod kafka;

pub use kafka::client::types::{ElectLeadersRequest, ElectLeadersResponse, ElectionType, PartitionResult};
pub use kafka::{BrokerPool, Client, ClientConfig, ClientError, RequestContext, RoundTripper};
