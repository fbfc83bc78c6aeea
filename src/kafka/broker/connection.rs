use std::sync::Arc;

use bytes::BytesMut;
use kafka_protocol::messages::*;
use log::{debug, error, info, warn};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use super::types::SupportedVersions;
use crate::kafka::config::ClientConfig;
use crate::kafka::context::RequestContext;
use crate::kafka::error::ClientError;
use crate::kafka::protocol::{BrokerRequest, RequestFrame, ResponseFrame};

// ApiVersions v0 is understood by every broker version
const API_VERSIONS_PROBE_VERSION: i16 = 0;

/// Owns one TCP connection to one broker and serializes the exchanges on it.
pub struct ConnectionActor;

pub enum Message {
    RoundTrip {
        ctx: RequestContext,
        api_key: ApiKey,
        request: RequestKind,
        reply: RpcReplyPort<Result<ResponseKind, ClientError>>,
    },
}

pub struct Args {
    pub addr: String,
    pub config: Arc<ClientConfig>,
}

pub struct ConnectionState {
    addr: String,
    config: Arc<ClientConfig>,
    tcp_reader: OwnedReadHalf,
    tcp_writer: OwnedWriteHalf,
    correlation_id: i32,
    versions: SupportedVersions,
}

impl ConnectionState {
    fn next_correlation_id(&mut self) -> i32 {
        self.correlation_id = self.correlation_id.wrapping_add(1);
        self.correlation_id
    }

    /// Negotiates a version, frames the request and waits for its reply.
    async fn round_trip(&mut self, api_key: ApiKey, request: RequestKind) -> Result<ResponseKind, ClientError> {
        let api_version = self
            .versions
            .negotiate(api_key)
            .ok_or(ClientError::UnsupportedVersion(api_key))?;
        self.exchange(api_key, api_version, request).await
    }

    async fn exchange(
        &mut self,
        api_key: ApiKey,
        api_version: i16,
        request: RequestKind,
    ) -> Result<ResponseKind, ClientError> {
        let correlation_id = self.next_correlation_id();
        let frame = RequestFrame::new(api_key, api_version, correlation_id, &self.config.client_id, request);

        // Encoding failures leave the stream untouched.
        let mut buf = BytesMut::new();
        frame.encode(&mut buf)?;

        let timeout = self.config.request_timeout;
        let response = tokio::time::timeout(timeout, self.write_and_read(&buf))
            .await
            .map_err(|_| ClientError::DeadlineExceeded)??;

        let response = ResponseFrame::decode(api_key, api_version, &mut response.freeze())?;
        if response.correlation_id() != correlation_id {
            return Err(ClientError::CorrelationMismatch {
                expected: correlation_id,
                actual: response.correlation_id(),
            });
        }
        Ok(response.response)
    }

    async fn write_and_read(&mut self, frame: &[u8]) -> Result<BytesMut, ClientError> {
        self.tcp_writer.write_all(frame).await?;
        self.tcp_writer.flush().await?;

        let message_size = match self.tcp_reader.read_i32().await {
            Ok(size) if size <= 0 || size > self.config.max_message_size => {
                return Err(ClientError::MessageTooLarge(size));
            }
            Ok(size) => size,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ClientError::ConnectionClosed(self.addr.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut buf = BytesMut::with_capacity(message_size as usize);
        buf.resize(message_size as usize, 0);
        match self.tcp_reader.read_exact(&mut buf).await {
            Ok(_) => Ok(buf),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(ClientError::ConnectionClosed(self.addr.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn negotiate_versions(&mut self) -> Result<(), ClientError> {
        let response = self
            .exchange(
                ApiKey::ApiVersions,
                API_VERSIONS_PROBE_VERSION,
                ApiVersionsRequest::default().into_kind(),
            )
            .await?;
        let response = match ApiVersionsRequest::response_from(response) {
            Ok(response) => response,
            Err(other) => panic!("ApiVersions request answered with {:?}", other),
        };
        if response.error_code != 0 {
            return Err(ClientError::Connect {
                addr: self.addr.clone(),
                reason: format!("ApiVersions failed with error code {}", response.error_code),
            });
        }
        self.versions = SupportedVersions::from_response(&response);
        debug!("Broker {} advertised {} APIs", self.addr, self.versions.api_count());
        Ok(())
    }
}

/// Failures after which the byte stream can no longer be trusted to be
/// aligned on a frame boundary.
fn breaks_connection(err: &ClientError) -> bool {
    matches!(
        err,
        ClientError::Io(_)
            | ClientError::ConnectionClosed(_)
            | ClientError::MessageTooLarge(_)
            | ClientError::CorrelationMismatch { .. }
            | ClientError::DeadlineExceeded
    )
}

async fn connect(addr: &str, config: Arc<ClientConfig>) -> Result<ConnectionState, ClientError> {
    let tcp_stream = TcpStream::connect(addr).await.map_err(|e| ClientError::Connect {
        addr: addr.to_string(),
        reason: e.to_string(),
    })?;
    tcp_stream.set_nodelay(true)?;
    let (tcp_reader, tcp_writer) = tcp_stream.into_split();

    let mut state = ConnectionState {
        addr: addr.to_string(),
        config,
        tcp_reader,
        tcp_writer,
        correlation_id: 0,
        versions: SupportedVersions::default(),
    };
    state.negotiate_versions().await?;
    Ok(state)
}

impl Actor for ConnectionActor {
    type Msg = Message;
    type State = ConnectionState;
    type Arguments = Args;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_timeout = args.config.connect_timeout;
        let state = match tokio::time::timeout(connect_timeout, connect(&args.addr, args.config)).await {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                warn!("Failed to connect to broker {}: {}", args.addr, e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Timed out connecting to broker {} after {:?}", args.addr, connect_timeout);
                return Err(ClientError::Connect {
                    addr: args.addr.clone(),
                    reason: format!("timed out after {:?}", connect_timeout),
                }
                .into());
            }
        };
        info!("Connected to broker {}", state.addr);
        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            Message::RoundTrip { ctx, api_key, request, reply } => {
                // Callers that gave up while queued must not reach the broker.
                if let Err(e) = ctx.check() {
                    debug!("Dropping queued {:?} to {}: {}", api_key, state.addr, e);
                    let _ = reply.send(Err(e));
                    return Ok(());
                }
                if reply.is_closed() {
                    debug!("Dropping queued {:?} to {}: caller went away", api_key, state.addr);
                    return Ok(());
                }

                let result = state.round_trip(api_key, request).await;
                let broken = matches!(&result, Err(e) if breaks_connection(e));
                if let Err(e) = &result {
                    error!("{:?} round trip to {} failed: {}", api_key, state.addr, e);
                }

                if reply.send(result).is_err() {
                    debug!("Caller of {:?} to {} went away before the reply", api_key, state.addr);
                }
                if broken {
                    myself.stop(Some(format!("connection to {} is broken", state.addr)));
                }
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        debug!("Connection to {} closed", state.addr);
        Ok(())
    }
}
