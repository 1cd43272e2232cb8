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

pub mod reader;
pub mod writer;

use roaring::RoaringBitmap;

pub use crate::sparse::reader::SparseIndexReader;
pub use crate::sparse::writer::SparseIndexWriter;
use crate::error::Result;
use crate::forward::ForwardValueStore;

/// Names one sparse-indexed `(table, field)` pair. Buckets are held in two
/// parallel structures: a sorted set of sort-key members for ordered range
/// scans and floor lookups, and a hash from member to bitmap payload.
#[derive(Debug, Clone)]
pub struct SparseIndex {
    zset_key: String,
    hash_key: String,
}

impl SparseIndex {
    pub fn new(namespace: &str, table_name: &str, field_name: &str) -> Self {
        let base = format!("{namespace}:skbm:sparse:{table_name}:{field_name}");
        Self {
            zset_key: format!("{base}:zs"),
            hash_key: format!("{base}:hm"),
        }
    }

    pub fn zset_key(&self) -> &str {
        &self.zset_key
    }

    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }
}

/// A row id paired with its exact sort value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortId {
    pub id: u32,
    pub sort_key: u64,
}

/// One bucket: its sort key and the ids it owns. An empty bitmap marks the
/// bucket for deletion when persisted.
#[derive(Debug)]
pub(crate) struct SortKeyBitmap {
    pub sort_key: u64,
    pub bitmap: RoaringBitmap,
}

/// Resolves the ids of `bitmap` against the forward store and sorts them
/// by `(value, id)`. The id tie-break keeps equal-valued rows in a stable
/// order across scans and splits.
pub(crate) async fn sort_ids(
    forward: &ForwardValueStore,
    bitmap: &RoaringBitmap,
) -> Result<Vec<SortId>> {
    let ids: Vec<u32> = bitmap.iter().collect();
    let values = forward.multi_get(&ids).await?;
    let mut sort_ids: Vec<SortId> = ids
        .into_iter()
        .zip(values)
        .map(|(id, sort_key)| SortId { id, sort_key })
        .collect();
    sort_ids.sort_unstable_by_key(|sort_id| (sort_id.sort_key, sort_id.id));
    Ok(sort_ids)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use store::{KvBackendRef, MemoryKvBackend};

    use super::*;

    #[test]
    fn test_key_layout() {
        let index = SparseIndex::new("ns", "orders", "create_time");
        assert_eq!(index.zset_key(), "ns:skbm:sparse:orders:create_time:zs");
        assert_eq!(index.hash_key(), "ns:skbm:sparse:orders:create_time:hm");
    }

    #[tokio::test]
    async fn test_sort_ids_orders_by_value_then_id() {
        let kv: KvBackendRef = Arc::new(MemoryKvBackend::new());
        let forward = ForwardValueStore::new("ns", "orders", "create_time", kv);
        forward.set(1, 30).await.unwrap();
        forward.set(2, 10).await.unwrap();
        forward.set(3, 30).await.unwrap();

        let bitmap = RoaringBitmap::from_iter([1u32, 2, 3]);
        let sorted = sort_ids(&forward, &bitmap).await.unwrap();
        assert_eq!(
            sorted,
            vec![
                SortId { id: 2, sort_key: 10 },
                SortId { id: 1, sort_key: 30 },
                SortId { id: 3, sort_key: 30 },
            ]
        );
    }
}
