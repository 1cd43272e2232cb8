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
use store::{u64_to_hex, KvBackendRef};
use tracing::warn;

use crate::bitmap;
use crate::error::{ParseSortKeySnafu, Result, StoreSnafu};
use crate::forward::ForwardValueStore;
use crate::sparse::{sort_ids, SortId, SortKeyBitmap, SparseIndex};

/// Mutates the bucket registry of one sparse index. Each id lives in
/// exactly one bucket, the bucket whose sort key is the floor of the id's
/// forward value; inserts that find a full floor bucket split it near the
/// median.
pub struct SparseIndexWriter {
    index: SparseIndex,
    forward: ForwardValueStore,
    kv: KvBackendRef,
    split_threshold: usize,
}

impl SparseIndexWriter {
    pub fn new(
        index: SparseIndex,
        forward: ForwardValueStore,
        kv: KvBackendRef,
        split_threshold: usize,
    ) -> Self {
        Self {
            index,
            forward,
            kv,
            split_threshold,
        }
    }

    pub async fn add(&self, value: u64, id: u32) -> Result<()> {
        let floor = self.floor_bucket(value).await?;
        let mut updates = match floor {
            // Value space empty at or below `value`: open a new bucket.
            None => vec![SortKeyBitmap {
                sort_key: value,
                bitmap: RoaringBitmap::new(),
            }],
            Some(bucket) if (bucket.bitmap.len() as usize) < self.split_threshold => vec![bucket],
            Some(bucket) => self.split(bucket, value).await?,
        };
        // The floor of `value` among the updated buckets is always first.
        updates[0].bitmap.insert(id);
        self.forward.set(id, value).await?;
        self.write_buckets(updates).await
    }

    pub async fn remove(&self, value: u64, id: u32) -> Result<()> {
        match self.floor_bucket(value).await? {
            Some(mut bucket) => {
                bucket.bitmap.remove(id);
                self.write_buckets(vec![bucket]).await?;
            }
            // Tolerated so that replaying a delete after a partial apply
            // stays idempotent.
            None => warn!(
                "Cannot find floor bucket, value: {}, id: {}, index: {}",
                value,
                id,
                self.index.zset_key()
            ),
        }
        self.forward.remove(id).await
    }

    pub async fn move_value(&self, before: u64, after: u64, id: u32) -> Result<()> {
        if before == after {
            return Ok(());
        }
        self.remove(before, id).await?;
        self.add(after, id).await
    }

    /// Splits a full bucket at the value boundary nearest the median of
    /// its exact `(value, id)` order and returns the buckets to persist,
    /// the floor of `value` first. A bucket holding a single value has no
    /// boundary to split at: it widens when the incoming value extends the
    /// run, otherwise the incoming value opens its own bucket and the run
    /// is re-keyed to its value.
    async fn split(&self, bucket: SortKeyBitmap, value: u64) -> Result<Vec<SortKeyBitmap>> {
        let sorted = sort_ids(&self.forward, &bucket.bitmap).await?;
        let old_key = bucket.sort_key;
        let Some(mid) = split_point(&sorted) else {
            let run_value = sorted[0].sort_key;
            if value == run_value {
                return Ok(vec![bucket]);
            }
            let mut updates = vec![
                SortKeyBitmap {
                    sort_key: value,
                    bitmap: RoaringBitmap::new(),
                },
                SortKeyBitmap {
                    sort_key: run_value,
                    bitmap: bucket.bitmap,
                },
            ];
            if old_key != updates[0].sort_key && old_key != updates[1].sort_key {
                updates.push(SortKeyBitmap {
                    sort_key: old_key,
                    bitmap: RoaringBitmap::new(),
                });
            }
            return Ok(updates);
        };

        let mut lower = bucket.bitmap;
        lower.clear();
        for sort_id in &sorted[..mid] {
            lower.insert(sort_id.id);
        }
        let mut upper = RoaringBitmap::new();
        for sort_id in &sorted[mid..] {
            upper.insert(sort_id.id);
        }

        let mut updates = vec![
            SortKeyBitmap {
                sort_key: sorted[0].sort_key,
                bitmap: lower,
            },
            SortKeyBitmap {
                sort_key: sorted[mid].sort_key,
                bitmap: upper,
            },
        ];
        // Make the floor of `value` the first bucket. Removals may have
        // left `value` (and the bucket's stored key) below the smallest
        // surviving value, in which case the lower half is re-keyed down
        // to keep covering it.
        if updates[1].sort_key <= value {
            updates.swap(0, 1);
        } else if value < updates[0].sort_key {
            updates[0].sort_key = value;
        }
        // A stale key would keep every pre-split id, so it goes in the
        // same batch.
        if old_key != updates[0].sort_key && old_key != updates[1].sort_key {
            updates.push(SortKeyBitmap {
                sort_key: old_key,
                bitmap: RoaringBitmap::new(),
            });
        }
        Ok(updates)
    }

    /// The bucket with the greatest sort key `<= value`, with its decoded
    /// bitmap.
    async fn floor_bucket(&self, value: u64) -> Result<Option<SortKeyBitmap>> {
        let members = self
            .kv
            .sorted_lex_range(
                self.index.zset_key(),
                &u64_to_hex(value),
                &u64_to_hex(0),
                true,
                1,
            )
            .await
            .context(StoreSnafu)?;
        let Some(member) = members.first() else {
            return Ok(None);
        };
        let sort_key = store::hex_to_u64(member).context(ParseSortKeySnafu {
            member: member.as_str(),
        })?;
        let bytes = self
            .kv
            .hash_get(self.index.hash_key(), member)
            .await
            .context(StoreSnafu)?;
        let bitmap = match bytes {
            Some(bytes) => bitmap::decode(&bytes)?,
            None => RoaringBitmap::new(),
        };
        Ok(Some(SortKeyBitmap { sort_key, bitmap }))
    }

    /// Persists buckets: empty bitmaps delete the bucket from both the
    /// sorted set and the hash, the rest are upserted. Deletes run first
    /// so a split replacing a stale key cannot drop a key it just wrote.
    async fn write_buckets(&self, buckets: Vec<SortKeyBitmap>) -> Result<()> {
        let (deletes, upserts): (Vec<_>, Vec<_>) =
            buckets.into_iter().partition(|b| b.bitmap.is_empty());

        if !deletes.is_empty() {
            let members: Vec<String> = deletes.iter().map(|b| u64_to_hex(b.sort_key)).collect();
            self.kv
                .sorted_remove(self.index.zset_key(), &members)
                .await
                .context(StoreSnafu)?;
            self.kv
                .hash_delete(self.index.hash_key(), &members)
                .await
                .context(StoreSnafu)?;
        }
        if !upserts.is_empty() {
            let entries: Vec<(f64, String)> = upserts
                .iter()
                .map(|b| (b.sort_key as f64, u64_to_hex(b.sort_key)))
                .collect();
            self.kv
                .sorted_add(self.index.zset_key(), &entries)
                .await
                .context(StoreSnafu)?;
            for bucket in upserts {
                self.kv
                    .hash_set(
                        self.index.hash_key(),
                        &u64_to_hex(bucket.sort_key),
                        bitmap::encode(&bucket.bitmap)?,
                    )
                    .await
                    .context(StoreSnafu)?;
            }
        }
        Ok(())
    }
}

/// The split index nearest the median that falls on a value boundary.
/// Splitting inside a run of equal values would give both halves the same
/// sort key, collapsing them into one bucket and shadowing the other, so
/// the boundary snaps outward; `None` means the bucket holds one value.
fn split_point(sorted: &[SortId]) -> Option<usize> {
    let mid = sorted.len() / 2;
    let target = sorted[mid].sort_key;
    let below = sorted.partition_point(|sort_id| sort_id.sort_key < target);
    if below > 0 {
        return Some(below);
    }
    let above = sorted.partition_point(|sort_id| sort_id.sort_key <= target);
    (above < sorted.len()).then_some(above)
}
