use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use kafka_protocol::messages::{ApiKey, RequestKind, ResponseKind};
use log::debug;
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef, ActorStatus};
use tokio::sync::OnceCell;

use super::RoundTripper;
use super::connection::{Args, ConnectionActor, Message};
use crate::kafka::config::ClientConfig;
use crate::kafka::context::RequestContext;
use crate::kafka::error::ClientError;

// One slot per address; the first caller to reach an empty slot connects and
// everyone else waits on the same cell.
type Slot = Arc<OnceCell<ActorRef<Message>>>;

/// Routes requests to one connection actor per broker address, connecting
/// on first use and replacing actors whose connection broke.
pub struct BrokerPool {
    config: Arc<ClientConfig>,
    connections: DashMap<String, Slot>,
}

fn is_alive(actor: &ActorRef<Message>) -> bool {
    !matches!(actor.get_status(), ActorStatus::Stopping | ActorStatus::Stopped)
}

async fn spawn_connection(config: Arc<ClientConfig>, addr: String) -> Result<ActorRef<Message>, ClientError> {
    let (actor, _handle) = Actor::spawn(None, ConnectionActor, Args { addr: addr.clone(), config })
        .await
        .map_err(|e| ClientError::Connect { addr, reason: e.to_string() })?;
    Ok(actor)
}

impl BrokerPool {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: Arc::new(config),
            connections: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Number of broker connections currently held open.
    pub fn connection_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().get().is_some_and(is_alive))
            .count()
    }

    fn slot(&self, addr: &str) -> Slot {
        match self.connections.entry(addr.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().get().is_some_and(|actor| !is_alive(actor)) {
                    debug!("Replacing stopped connection to {}", addr);
                    entry.insert(Arc::new(OnceCell::new()));
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(OnceCell::new())).value().clone(),
        }
    }

    async fn connection(&self, ctx: &RequestContext, addr: &str) -> Result<ActorRef<Message>, ClientError> {
        let slot = self.slot(addr);
        if let Some(actor) = slot.get() {
            return Ok(actor.clone());
        }

        // Connecting runs in its own task so that a cancelled caller does not
        // abandon a half-started actor; the finished connection stays in the
        // slot for the next call.
        let config = self.config.clone();
        let target = addr.to_string();
        let connect = tokio::spawn(async move {
            slot.get_or_try_init(|| spawn_connection(config, target))
                .await
                .cloned()
        });
        ctx.run(connect).await?.map_err(|e| ClientError::Connect {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?
    }
}

#[async_trait]
impl RoundTripper for BrokerPool {
    async fn round_trip(
        &self,
        ctx: &RequestContext,
        addr: &str,
        api_key: ApiKey,
        request: RequestKind,
    ) -> Result<ResponseKind, ClientError> {
        let ctx = ctx.clone().with_timeout(self.config.request_timeout);
        ctx.check()?;

        let actor = self.connection(&ctx, addr).await?;
        debug!("Dispatching {:?} to {}", api_key, addr);

        let queued = ctx.clone();
        let call = actor.call(
            |reply| Message::RoundTrip { ctx: queued, api_key, request, reply },
            None,
        );
        match ctx.run(call).await? {
            Ok(CallResult::Success(result)) => result,
            Ok(CallResult::Timeout) => Err(ClientError::DeadlineExceeded),
            Ok(CallResult::SenderError) | Err(_) => Err(ClientError::ConnectionClosed(addr.to_string())),
        }
    }
}

impl Drop for BrokerPool {
    fn drop(&mut self) {
        for entry in self.connections.iter() {
            if let Some(actor) = entry.value().get() {
                actor.stop(None);
            }
        }
    }
}
