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

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::kv::KvBackend;

/// An in-process [`KvBackend`]. Stands in for the networked KV service in
/// tests and local runs; every operation is linearizable under one lock.
#[derive(Default)]
pub struct MemoryKvBackend {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
    // Member -> score. The map is keyed by member so iteration yields
    // lexicographic order, which is the order the contract promises.
    zsets: HashMap<String, BTreeMap<String, f64>>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live fields in a hash, for test assertions.
    pub fn hash_len(&self, key: &str) -> usize {
        let inner = self.inner.read().unwrap();
        inner.hashes.get(key).map(|h| h.len()).unwrap_or(0)
    }
}

#[async_trait]
impl KvBackend for MemoryKvBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned())
    }

    async fn hash_multi_get(&self, key: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let inner = self.inner.read().unwrap();
        let hash = inner.hashes.get(key);
        Ok(fields
            .iter()
            .map(|field| hash.and_then(|h| h.get(field)).cloned())
            .collect())
    }

    async fn hash_set(&self, key: &str, field: &str, value: Vec<u8>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hash_delete(&self, key: &str, fields: &[String]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let mut emptied = false;
        if let Some(hash) = inner.hashes.get_mut(key) {
            for field in fields {
                hash.remove(field);
            }
            emptied = hash.is_empty();
        }
        if emptied {
            inner.hashes.remove(key);
        }
        Ok(())
    }

    async fn sorted_add(&self, key: &str, entries: &[(f64, String)]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let zset = inner.zsets.entry(key.to_string()).or_default();
        for (score, member) in entries {
            zset.insert(member.clone(), *score);
        }
        Ok(())
    }

    async fn sorted_remove(&self, key: &str, members: &[String]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let mut emptied = false;
        if let Some(zset) = inner.zsets.get_mut(key) {
            for member in members {
                zset.remove(member);
            }
            emptied = zset.is_empty();
        }
        if emptied {
            inner.zsets.remove(key);
        }
        Ok(())
    }

    async fn sorted_lex_range(
        &self,
        key: &str,
        start: &str,
        stop: &str,
        reverse: bool,
        limit: usize,
    ) -> Result<Vec<String>> {
        let inner = self.inner.read().unwrap();
        let Some(zset) = inner.zsets.get(key) else {
            return Ok(vec![]);
        };
        let (lo, hi) = if start <= stop {
            (start, stop)
        } else {
            (stop, start)
        };
        let range = zset.range::<str, _>((Bound::Included(lo), Bound::Included(hi)));
        let members = if reverse {
            range.rev().take(limit).map(|(m, _)| m.clone()).collect()
        } else {
            range.take(limit).map(|(m, _)| m.clone()).collect()
        };
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::u64_to_hex;

    #[tokio::test]
    async fn test_hash_roundtrip() {
        let kv = MemoryKvBackend::new();
        assert!(kv.hash_get("h", "a").await.unwrap().is_none());

        kv.hash_set("h", "a", b"1".to_vec()).await.unwrap();
        kv.hash_set("h", "b", b"2".to_vec()).await.unwrap();
        assert_eq!(kv.hash_get("h", "a").await.unwrap(), Some(b"1".to_vec()));

        let values = kv
            .hash_multi_get("h", &["a".into(), "missing".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"2".to_vec())]);

        kv.hash_delete("h", &["a".into()]).await.unwrap();
        assert!(kv.hash_get("h", "a").await.unwrap().is_none());
        assert_eq!(kv.hash_len("h"), 1);
    }

    #[tokio::test]
    async fn test_sorted_lex_range() {
        let kv = MemoryKvBackend::new();
        let entries: Vec<_> = [3u64, 1, 7, 5]
            .into_iter()
            .map(|v| (v as f64, u64_to_hex(v)))
            .collect();
        kv.sorted_add("z", &entries).await.unwrap();

        let forward = kv
            .sorted_lex_range("z", &u64_to_hex(0), &u64_to_hex(u64::MAX), false, 100)
            .await
            .unwrap();
        assert_eq!(
            forward,
            vec![u64_to_hex(1), u64_to_hex(3), u64_to_hex(5), u64_to_hex(7)]
        );

        // Reverse scan from 6 downward finds the floor of 6 first.
        let floor = kv
            .sorted_lex_range("z", &u64_to_hex(6), &u64_to_hex(0), true, 1)
            .await
            .unwrap();
        assert_eq!(floor, vec![u64_to_hex(5)]);

        kv.sorted_remove("z", &[u64_to_hex(5)]).await.unwrap();
        let floor = kv
            .sorted_lex_range("z", &u64_to_hex(6), &u64_to_hex(0), true, 1)
            .await
            .unwrap();
        assert_eq!(floor, vec![u64_to_hex(3)]);
    }

    #[tokio::test]
    async fn test_sorted_lex_range_limit() {
        let kv = MemoryKvBackend::new();
        let entries: Vec<_> = (0u64..10)
            .map(|v| (v as f64, u64_to_hex(v)))
            .collect();
        kv.sorted_add("z", &entries).await.unwrap();

        let page = kv
            .sorted_lex_range("z", &u64_to_hex(u64::MAX), &u64_to_hex(0), true, 3)
            .await
            .unwrap();
        assert_eq!(page, vec![u64_to_hex(9), u64_to_hex(8), u64_to_hex(7)]);
    }
}
