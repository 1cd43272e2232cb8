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

use snafu::ResultExt;
use store::KvBackendRef;

use crate::error::{ForwardValueUtf8Snafu, ParseForwardValueSnafu, Result, StoreSnafu};

/// Per-field map from row id to the exact sort value, the source of truth
/// for intra-bucket ordering. Entries are decimal strings in a hash.
#[derive(Clone)]
pub struct ForwardValueStore {
    hash_key: String,
    kv: KvBackendRef,
}

impl ForwardValueStore {
    pub fn new(namespace: &str, table_name: &str, field_name: &str, kv: KvBackendRef) -> Self {
        Self {
            hash_key: format!("{namespace}:fv:sparse:{table_name}:{field_name}"),
            kv,
        }
    }

    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// Fetches the forward values of `ids`, positionally. Missing entries
    /// yield zero; callers that need presence must check the hash
    /// directly rather than treating zero as absent.
    pub async fn multi_get(&self, ids: &[u32]) -> Result<Vec<u64>> {
        let fields: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let values = self
            .kv
            .hash_multi_get(&self.hash_key, &fields)
            .await
            .context(StoreSnafu)?;
        ids.iter()
            .zip(values)
            .map(|(&id, value)| match value {
                Some(bytes) => {
                    let text =
                        std::str::from_utf8(&bytes).context(ForwardValueUtf8Snafu { id })?;
                    text.parse::<u64>()
                        .context(ParseForwardValueSnafu { id, value: text })
                }
                None => Ok(0),
            })
            .collect()
    }

    pub async fn set(&self, id: u32, value: u64) -> Result<()> {
        self.kv
            .hash_set(
                &self.hash_key,
                &id.to_string(),
                value.to_string().into_bytes(),
            )
            .await
            .context(StoreSnafu)
    }

    pub async fn remove(&self, id: u32) -> Result<()> {
        self.kv
            .hash_delete(&self.hash_key, &[id.to_string()])
            .await
            .context(StoreSnafu)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use store::MemoryKvBackend;

    use super::*;
    use crate::error::Error;

    fn store() -> ForwardValueStore {
        let kv: KvBackendRef = Arc::new(MemoryKvBackend::new());
        ForwardValueStore::new("test", "orders", "create_time", kv)
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let fv = store();
        fv.set(1, 1000).await.unwrap();
        fv.set(2, 2000).await.unwrap();

        assert_eq!(fv.multi_get(&[2, 1]).await.unwrap(), vec![2000, 1000]);
        // Missing ids read as zero.
        assert_eq!(fv.multi_get(&[3]).await.unwrap(), vec![0]);

        fv.remove(1).await.unwrap();
        assert_eq!(fv.multi_get(&[1]).await.unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_rejects_non_decimal_value() {
        let fv = store();
        fv.kv
            .hash_set(fv.hash_key(), "1", b"xyz".to_vec())
            .await
            .unwrap();
        let err = fv.multi_get(&[1]).await.unwrap_err();
        assert!(matches!(err, Error::ParseForwardValue { .. }));
    }
}
