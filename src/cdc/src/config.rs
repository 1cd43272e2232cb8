// Copyright 2023 Greptime Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Consumer config for the change log transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CdcConfig {
    /// The broker endpoints of the log cluster.
    pub broker_endpoints: Vec<String>,
    /// The change topic of the indexed table.
    pub topic: String,
    /// The consumer group; one group per index namespace.
    pub consumer_group: String,
    /// Max records fetched per poll.
    pub poll_batch_size: usize,
    /// How long to back off when a poll returns nothing or fails.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for CdcConfig {
    fn default() -> Self {
        Self {
            broker_endpoints: vec!["127.0.0.1:9092".to_string()],
            topic: String::new(),
            consumer_group: String::new(),
            poll_batch_size: 64,
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_cdc_config() {
        let toml_str = r#"
            broker_endpoints = ["kafka:9092"]
            topic = "dbserver.public.orders"
            consumer_group = "inv-index-1"
            poll_interval = "200ms"
        "#;
        let decoded: CdcConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            decoded,
            CdcConfig {
                broker_endpoints: vec!["kafka:9092".to_string()],
                topic: "dbserver.public.orders".to_string(),
                consumer_group: "inv-index-1".to_string(),
                poll_batch_size: 64,
                poll_interval: Duration::from_millis(200),
            }
        );
    }
}
