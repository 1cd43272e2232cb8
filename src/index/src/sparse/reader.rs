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

use roaring::RoaringBitmap;
use snafu::ResultExt;
use store::{hex_to_u64, u64_to_hex, KvBackendRef};

use crate::bitmap;
use crate::error::{ParseSortKeySnafu, Result, StoreSnafu};
use crate::forward::ForwardValueStore;
use crate::sparse::{sort_ids, SortId, SparseIndex};

/// Ordered scans over the bucket registry of one sparse index.
pub struct SparseIndexReader {
    index: SparseIndex,
    forward: ForwardValueStore,
    kv: KvBackendRef,
    page_size: usize,
}

impl SparseIndexReader {
    pub fn new(
        index: SparseIndex,
        forward: ForwardValueStore,
        kv: KvBackendRef,
        page_size: usize,
    ) -> Self {
        Self {
            index,
            forward,
            kv,
            page_size,
        }
    }

    /// Walks buckets in sort-key order (descending when `reverse`) and
    /// delivers, per bucket, the ids present in `base` sorted by their
    /// exact `(value, id)`; reverse scans deliver each batch reversed.
    /// `visit` returns whether the scan should continue.
    ///
    /// Bucket ranges are non-decreasing across the registry, so the
    /// concatenation of batches is totally ordered by `(value, id)` up to
    /// ties on boundary values between equal-keyed neighbors.
    pub async fn scan<F>(&self, base: &RoaringBitmap, reverse: bool, mut visit: F) -> Result<()>
    where
        F: FnMut(Vec<SortId>) -> bool,
    {
        let (mut cursor, end) = if reverse {
            (u64::MAX, 0u64)
        } else {
            (0u64, u64::MAX)
        };
        loop {
            let members = self
                .kv
                .sorted_lex_range(
                    self.index.zset_key(),
                    &u64_to_hex(cursor),
                    &u64_to_hex(end),
                    reverse,
                    self.page_size,
                )
                .await
                .context(StoreSnafu)?;
            if members.is_empty() {
                break;
            }
            let keys = members
                .iter()
                .map(|member| {
                    hex_to_u64(member).context(ParseSortKeySnafu {
                        member: member.as_str(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let values = self
                .kv
                .hash_multi_get(self.index.hash_key(), &members)
                .await
                .context(StoreSnafu)?;

            for (_, value) in keys.iter().zip(values) {
                // A member without a payload is a partially applied
                // write; treat it as empty.
                let Some(bytes) = value else {
                    continue;
                };
                let mut intersection = bitmap::decode(&bytes)?;
                intersection &= base;
                if intersection.is_empty() {
                    continue;
                }
                let mut batch = sort_ids(&self.forward, &intersection).await?;
                if reverse {
                    batch.reverse();
                }
                if !visit(batch) {
                    return Ok(());
                }
            }

            cursor = keys[keys.len() - 1];
            if cursor == end {
                break;
            }
            cursor = if reverse { cursor - 1 } else { cursor + 1 };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use store::MemoryKvBackend;

    use super::*;
    use crate::sparse::SparseIndexWriter;

    async fn populated() -> (SparseIndexReader, SparseIndexWriter) {
        let kv: KvBackendRef = Arc::new(MemoryKvBackend::new());
        let index = SparseIndex::new("test", "orders", "create_time");
        let forward = ForwardValueStore::new("test", "orders", "create_time", kv.clone());
        let writer = SparseIndexWriter::new(index.clone(), forward.clone(), kv.clone(), 4);
        // Small page size to exercise the cursor arithmetic.
        let reader = SparseIndexReader::new(index, forward, kv, 2);
        for id in 1..=12u32 {
            writer.add(id as u64 * 10, id).await.unwrap();
        }
        (reader, writer)
    }

    async fn collect(reader: &SparseIndexReader, base: &RoaringBitmap, reverse: bool) -> Vec<u32> {
        let mut ids = Vec::new();
        reader
            .scan(base, reverse, |batch| {
                ids.extend(batch.into_iter().map(|sort_id| sort_id.id));
                true
            })
            .await
            .unwrap();
        ids
    }

    #[tokio::test]
    async fn test_scan_forward_and_reverse() {
        let (reader, _writer) = populated().await;
        let base = RoaringBitmap::from_iter(1..=12u32);

        assert_eq!(
            collect(&reader, &base, false).await,
            (1..=12u32).collect::<Vec<_>>()
        );
        assert_eq!(
            collect(&reader, &base, true).await,
            (1..=12u32).rev().collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_scan_intersects_base() {
        let (reader, _writer) = populated().await;
        let base = RoaringBitmap::from_iter([2u32, 7, 11]);

        assert_eq!(collect(&reader, &base, true).await, vec![11, 7, 2]);
    }

    #[tokio::test]
    async fn test_scan_stops_when_callback_returns_false() {
        let (reader, _writer) = populated().await;
        let base = RoaringBitmap::from_iter(1..=12u32);

        let mut ids = Vec::new();
        reader
            .scan(&base, true, |batch| {
                ids.extend(batch.into_iter().map(|sort_id| sort_id.id));
                ids.len() < 3
            })
            .await
            .unwrap();
        assert!(ids.len() >= 3);
        assert_eq!(&ids[..3], &[12, 11, 10]);
    }

    #[tokio::test]
    async fn test_scan_empty_registry() {
        let kv: KvBackendRef = Arc::new(MemoryKvBackend::new());
        let index = SparseIndex::new("test", "orders", "create_time");
        let forward = ForwardValueStore::new("test", "orders", "create_time", kv.clone());
        let reader = SparseIndexReader::new(index, forward, kv, 100);

        let mut called = false;
        reader
            .scan(&RoaringBitmap::from_iter([1u32]), true, |_| {
                called = true;
                true
            })
            .await
            .unwrap();
        assert!(!called);
    }

    #[tokio::test]
    async fn test_equal_values_order_by_id() {
        let kv: KvBackendRef = Arc::new(MemoryKvBackend::new());
        let index = SparseIndex::new("test", "orders", "create_time");
        let forward = ForwardValueStore::new("test", "orders", "create_time", kv.clone());
        let writer = SparseIndexWriter::new(index.clone(), forward.clone(), kv.clone(), 100);
        let reader = SparseIndexReader::new(index, forward, kv, 100);
        for id in [5u32, 1, 9, 3] {
            writer.add(42, id).await.unwrap();
        }

        let base = RoaringBitmap::from_iter([1u32, 3, 5, 9]);
        assert_eq!(collect(&reader, &base, false).await, vec![1, 3, 5, 9]);
        assert_eq!(collect(&reader, &base, true).await, vec![9, 5, 3, 1]);
    }
}
