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

use serde::{Deserialize, Serialize};

/// Connection config for the external KV service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KvConfig {
    /// The endpoint of the KV service.
    pub addr: String,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_kv_config() {
        let toml_str = r#"
            addr = "redis:6379"
        "#;
        let decoded: KvConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            decoded,
            KvConfig {
                addr: "redis:6379".to_string(),
            }
        );
        assert_eq!(KvConfig::default().addr, "127.0.0.1:6379");
    }
}
