use kafka_protocol::messages::elect_leaders_request::TopicPartitions;
use kafka_protocol::messages::{
    ElectLeadersRequest as WireRequest, ElectLeadersResponse as WireResponse, TopicName,
};
use kafka_protocol::protocol::StrBytes;
use log::{debug, warn};

use crate::kafka::client::Client;
use crate::kafka::client::types::{ElectLeadersRequest, ElectLeadersResponse, PartitionResult};
use crate::kafka::context::RequestContext;
use crate::kafka::error::ClientError;

/// Shapes the caller's request into the single-topic wire request.
pub(crate) fn build_request(request: &ElectLeadersRequest) -> Result<WireRequest, ClientError> {
    let partitions = request
        .partitions
        .iter()
        .map(|&partition| {
            i32::try_from(partition).map_err(|_| ClientError::OutOfRange {
                field: "partition",
                value: partition.into(),
            })
        })
        .collect::<Result<Vec<i32>, _>>()?;

    // as_millis drops the sub-millisecond part
    let millis = request.timeout.as_millis();
    let timeout_ms = i32::try_from(millis).map_err(|_| ClientError::OutOfRange {
        field: "timeout_ms",
        value: millis as i128,
    })?;

    let topic_partitions = TopicPartitions::default()
        .with_topic(TopicName(StrBytes::from_string(request.topic.clone())))
        .with_partitions(partitions);

    Ok(WireRequest::default()
        .with_election_type(request.election_type as i8)
        .with_topic_partitions(Some(vec![topic_partitions]))
        .with_timeout_ms(timeout_ms))
}

/// Flattens per-topic, per-partition results into one list, topics outer and
/// partitions inner, in the order the broker sent them.
pub(crate) fn flatten_response(response: WireResponse) -> ElectLeadersResponse {
    let mut partition_results = Vec::new();
    for topic_result in response.replica_election_results {
        for partition_result in topic_result.partition_result {
            partition_results.push(PartitionResult {
                partition: partition_result.partition_id,
                error_code: partition_result.error_code,
                error_message: partition_result
                    .error_message
                    .map(|message| message.to_string())
                    .unwrap_or_default(),
            });
        }
    }

    ElectLeadersResponse {
        error_code: response.error_code,
        partition_results,
    }
}

pub(crate) async fn handle_elect_leaders(
    client: &Client,
    ctx: &RequestContext,
    request: &ElectLeadersRequest,
) -> Result<ElectLeadersResponse, ClientError> {
    let typed_request = build_request(request)?;
    let addr = client.resolve_addr(request.addr.as_deref())?;

    debug!(
        "Handling ElectLeaders request: topic={}, partitions={:?}, timeout_ms={}, addr={}",
        request.topic, request.partitions, typed_request.timeout_ms, addr
    );

    let typed_response = client.round_trip(ctx, &addr, typed_request).await?;
    let response = flatten_response(typed_response);

    if response.error_code != 0 {
        warn!("ElectLeaders for topic {} failed with error code {}", request.topic, response.error_code);
    }
    debug!(
        "ElectLeaders for topic {}: {} partition results, {} failed",
        request.topic,
        response.partition_results.len(),
        response.failed_partitions().count()
    );

    Ok(response)
}
