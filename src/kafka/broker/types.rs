use std::collections::HashMap;

use kafka_protocol::messages::ApiKey;
use kafka_protocol::messages::ApiVersionsResponse;

/// API version ranges a broker advertised in its ApiVersions response.
#[derive(Debug, Clone, Default)]
pub struct SupportedVersions {
    ranges: HashMap<i16, (i16, i16)>, // api_key -> (min_version, max_version)
}

impl SupportedVersions {
    pub fn from_response(response: &ApiVersionsResponse) -> Self {
        let ranges = response
            .api_keys
            .iter()
            .map(|v| (v.api_key, (v.min_version, v.max_version)))
            .collect();
        Self { ranges }
    }

    pub fn api_count(&self) -> usize {
        self.ranges.len()
    }

    /// Highest version both this client and the broker speak for `api_key`.
    pub fn negotiate(&self, api_key: ApiKey) -> Option<i16> {
        let ours = api_key.valid_versions();
        let (min, max) = *self.ranges.get(&(api_key as i16))?;
        let version = ours.max.min(max);
        (version >= ours.min.max(min)).then_some(version)
    }
}
