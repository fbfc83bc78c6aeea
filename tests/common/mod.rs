use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use kafka_admin::kafka::protocol::{RequestFrame, ResponseFrame};
use kafka_protocol::messages::api_versions_response::ApiVersion;
use kafka_protocol::messages::elect_leaders_response::{PartitionResult, ReplicaElectionResult};
use kafka_protocol::messages::*;
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the fake broker does with a request.
pub enum Reply {
    Respond(ResponseKind),
    /// Answer only after the given pause; later requests on the same
    /// connection wait behind it.
    Delay(Duration, ResponseKind),
    /// Keep the connection open and never answer.
    Ignore,
    /// Drop the connection without answering.
    Close,
}

type Handler = dyn Fn(&RequestFrame) -> Reply + Send + Sync;

/// In-process broker speaking the real wire format, answering through a
/// test-supplied handler.
pub struct FakeBroker {
    pub addr: String,
    /// (api_key, api_version) of every request received, ApiVersions included.
    pub requests: Arc<Mutex<Vec<(ApiKey, i16)>>>,
    pub accepted: Arc<AtomicUsize>,
}

impl FakeBroker {
    pub async fn start(handler: impl Fn(&RequestFrame) -> Reply + Send + Sync + 'static) -> Self {
        Self::start_with_versions(
            vec![(ApiKey::ApiVersions, 0, 3), (ApiKey::ElectLeaders, 0, 2)],
            handler,
        )
        .await
    }

    pub async fn start_with_versions(
        versions: Vec<(ApiKey, i16, i16)>,
        handler: impl Fn(&RequestFrame) -> Reply + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));
        let handler: Arc<Handler> = Arc::new(handler);
        let versions = Arc::new(versions);

        let (requests_clone, accepted_clone) = (requests.clone(), accepted.clone());
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accepted_clone.fetch_add(1, Ordering::SeqCst);
                let (handler, versions, requests) = (handler.clone(), versions.clone(), requests_clone.clone());
                tokio::spawn(async move {
                    if let Err(e) = serve(socket, handler, versions, requests).await {
                        debug!("Fake broker connection ended: {:?}", e);
                    }
                });
            }
        });

        Self { addr, requests, accepted }
    }

    pub fn request_log(&self) -> Vec<(ApiKey, i16)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_of(&self, api_key: ApiKey) -> usize {
        self.request_log().iter().filter(|(key, _)| *key == api_key).count()
    }
}

fn api_versions_response(versions: &[(ApiKey, i16, i16)]) -> ResponseKind {
    let api_keys = versions
        .iter()
        .map(|(key, min, max)| {
            ApiVersion::default()
                .with_api_key(*key as i16)
                .with_min_version(*min)
                .with_max_version(*max)
        })
        .collect();
    ResponseKind::ApiVersions(ApiVersionsResponse::default().with_error_code(0).with_api_keys(api_keys))
}

async fn serve(
    mut socket: TcpStream,
    handler: Arc<Handler>,
    versions: Arc<Vec<(ApiKey, i16, i16)>>,
    requests: Arc<Mutex<Vec<(ApiKey, i16)>>>,
) -> Result<(), anyhow::Error> {
    loop {
        let size = match socket.read_i32().await {
            Ok(size) => size,
            Err(_) => return Ok(()),
        };
        let mut buf = BytesMut::with_capacity(size as usize);
        buf.resize(size as usize, 0);
        socket.read_exact(&mut buf).await?;

        let frame = RequestFrame::decode(&mut buf.freeze())?;
        requests.lock().unwrap().push((frame.api_key, frame.api_version()));

        let reply = if frame.api_key == ApiKey::ApiVersions {
            Reply::Respond(api_versions_response(&versions))
        } else {
            (*handler)(&frame)
        };

        match reply {
            Reply::Delay(pause, response) => {
                tokio::time::sleep(pause).await;
                let mut out = BytesMut::new();
                ResponseFrame::answering(&frame, response).encode(&mut out)?;
                socket.write_all(&out).await?;
                socket.flush().await?;
            }
            Reply::Respond(response) => {
                let mut out = BytesMut::new();
                ResponseFrame::answering(&frame, response).encode(&mut out)?;
                socket.write_all(&out).await?;
                socket.flush().await?;
            }
            Reply::Ignore => {}
            Reply::Close => return Ok(()),
        }
    }
}

/// Answers an ElectLeaders request with a success for every requested
/// partition, in request order.
pub fn elect_all(frame: &RequestFrame) -> Reply {
    let RequestKind::ElectLeaders(request) = &frame.request else {
        return Reply::Close;
    };
    let results = request
        .topic_partitions
        .iter()
        .flatten()
        .map(|group| {
            ReplicaElectionResult::default()
                .with_topic(group.topic.clone())
                .with_partition_result(
                    group
                        .partitions
                        .iter()
                        .map(|&id| PartitionResult::default().with_partition_id(id).with_error_code(0))
                        .collect(),
                )
        })
        .collect();
    Reply::Respond(ResponseKind::ElectLeaders(
        ElectLeadersResponse::default()
            .with_error_code(0)
            .with_replica_election_results(results),
    ))
}
