pub mod broker;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod protocol;

pub use broker::{BrokerPool, RoundTripper};
pub use client::Client;
pub use config::ClientConfig;
pub use context::RequestContext;
pub use error::ClientError;
