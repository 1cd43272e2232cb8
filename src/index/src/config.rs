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

/// Tuning and naming options shared by every index of one process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexOptions {
    /// Prefix applied to every KV key this process owns.
    pub namespace: String,
    /// Bucket cardinality above which an insert splits the bucket. A
    /// bucket may transiently exceed this during the insert that splits
    /// it.
    pub split_threshold: usize,
    /// Number of buckets fetched per page during a sparse scan.
    pub scan_page_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            namespace: "inv-index".to_string(),
            split_threshold: 1000,
            scan_page_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_index_options() {
        let toml_str = r#"
            namespace = "inv-index-1"
            split_threshold = 500
        "#;
        let decoded: IndexOptions = toml::from_str(toml_str).unwrap();
        assert_eq!(
            decoded,
            IndexOptions {
                namespace: "inv-index-1".to_string(),
                split_threshold: 500,
                scan_page_size: 100,
            }
        );
    }

    #[test]
    fn test_defaults() {
        let options = IndexOptions::default();
        assert_eq!(options.split_threshold, 1000);
        assert_eq!(options.scan_page_size, 100);
    }
}
