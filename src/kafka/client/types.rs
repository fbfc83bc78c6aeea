use std::time::Duration;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Which replica the broker should promote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i8)]
pub enum ElectionType {
    /// Move leadership back to the preferred replica.
    #[default]
    Preferred = 0,
    /// Allow an out-of-sync replica to become leader.
    Unclean = 1,
}

/// Run leader elections for some partitions of one topic.
#[derive(Debug, Clone, Default)]
pub struct ElectLeadersRequest {
    /// Broker to send the request to. Falls back to the client's configured
    /// broker when unset.
    pub addr: Option<String>,

    /// Topic to run the elections in.
    pub topic: String,

    /// Partitions to elect leaders for, sent as given (order and duplicates
    /// included).
    pub partitions: Vec<i64>,

    /// How long the broker may spend on the elections.
    pub timeout: Duration,

    pub election_type: ElectionType,
}

impl ElectLeadersRequest {
    pub fn new(topic: impl Into<String>, partitions: Vec<i64>) -> Self {
        Self {
            topic: topic.into(),
            partitions,
            ..Default::default()
        }
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_election_type(mut self, election_type: ElectionType) -> Self {
        self.election_type = election_type;
        self
    }
}

/// Outcome of an ElectLeaders call.
///
/// A successful call can still carry failures: check `error_code` and the
/// code of every partition result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectLeadersResponse {
    /// Non-zero when the broker rejected the request as a whole.
    pub error_code: i16,

    /// One entry per partition the broker reported on, in the order it
    /// reported them.
    pub partition_results: Vec<PartitionResult>,
}

impl ElectLeadersResponse {
    /// True when neither the request nor any partition failed.
    pub fn is_ok(&self) -> bool {
        self.error_code == 0 && self.partition_results.iter().all(PartitionResult::is_ok)
    }

    pub fn failed_partitions(&self) -> impl Iterator<Item = &PartitionResult> {
        self.partition_results.iter().filter(|p| !p.is_ok())
    }
}

/// Election result for a single partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionResult {
    pub partition: i32,

    /// Non-zero when the election for this partition failed.
    pub error_code: i16,

    /// Broker's description of the failure, empty on success.
    pub error_message: String,
}

impl PartitionResult {
    pub fn is_ok(&self) -> bool {
        self.error_code == 0
    }
}
