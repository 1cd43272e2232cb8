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

//! Shared harness for the cross-crate tests: an index stack on an
//! in-memory KV backend, a random-order workload generator, and checkers
//! for the structural invariants of the sparse index.

use std::collections::BTreeMap;
use std::sync::Arc;

use cdc::{ChangeEvent, Op, OrderRow, OrdersIndexApplier};
use index::catalog::OrdersCatalog;
use index::{bitmap, IndexOptions};
use query::OrdersSearchService;
use rand::rngs::StdRng;
use rand::Rng;
use roaring::RoaringBitmap;
use store::{KvBackendRef, MemoryKvBackend};

/// The full index stack over one in-memory KV backend.
pub struct TestIndex {
    pub kv: KvBackendRef,
    pub catalog: OrdersCatalog,
    pub applier: OrdersIndexApplier,
    pub service: OrdersSearchService,
}

impl TestIndex {
    pub fn new(split_threshold: usize) -> Self {
        let kv: KvBackendRef = Arc::new(MemoryKvBackend::new());
        let catalog = OrdersCatalog::new(IndexOptions {
            namespace: "it".to_string(),
            split_threshold,
            ..Default::default()
        });
        Self {
            applier: OrdersIndexApplier::new(&catalog, kv.clone()),
            service: OrdersSearchService::new(&catalog, kv.clone()),
            catalog,
            kv,
        }
    }

    pub async fn apply(&self, event: &ChangeEvent) {
        self.applier.apply(event).await.unwrap();
    }

    /// All sparse buckets in sort-key order, decoded.
    pub async fn buckets(&self) -> Vec<(u64, RoaringBitmap)> {
        let sparse = self.catalog.create_time();
        let members = self
            .kv
            .sorted_lex_range(
                sparse.zset_key(),
                &store::u64_to_hex(0),
                &store::u64_to_hex(u64::MAX),
                false,
                usize::MAX,
            )
            .await
            .unwrap();
        let mut buckets = Vec::with_capacity(members.len());
        for member in members {
            let bytes = self
                .kv
                .hash_get(sparse.hash_key(), &member)
                .await
                .unwrap()
                .unwrap_or_default();
            buckets.push((
                store::hex_to_u64(&member).unwrap(),
                bitmap::decode(&bytes).unwrap(),
            ));
        }
        buckets
    }

    /// The forward entry of `id`, `None` when absent (as opposed to the
    /// zero that `multi_get` folds absence into).
    pub async fn forward_entry(&self, id: u32) -> Option<u64> {
        let forward = self.catalog.forward_store(self.kv.clone());
        self.kv
            .hash_get(forward.hash_key(), &id.to_string())
            .await
            .unwrap()
            .map(|bytes| String::from_utf8(bytes).unwrap().parse().unwrap())
    }

    /// Checks the structural invariants of the sparse index:
    /// each id lives in exactly one bucket, every indexed id has a
    /// forward entry, forward values respect bucket boundaries, and no
    /// stored bucket is empty.
    pub async fn check_sparse_invariants(&self, split_threshold: usize) {
        let buckets = self.buckets().await;
        let mut seen = RoaringBitmap::new();
        for (i, (key, ids)) in buckets.iter().enumerate() {
            assert!(!ids.is_empty(), "bucket {key} stored empty");
            let next_key = buckets.get(i + 1).map(|(k, _)| *k);
            let mut values = Vec::new();
            for id in ids {
                assert!(seen.insert(id), "id {id} appears in more than one bucket");
                let value = self
                    .forward_entry(id)
                    .await
                    .unwrap_or_else(|| panic!("id {id} in bucket {key} has no forward entry"));
                assert!(value >= *key, "id {id} value {value} below bucket key {key}");
                if let Some(next_key) = next_key {
                    assert!(
                        value < next_key,
                        "id {id} value {value} beyond next bucket key {next_key}"
                    );
                }
                values.push(value);
            }
            // Only a single-valued bucket may widen past the threshold.
            if ids.len() as usize > split_threshold {
                values.sort_unstable();
                values.dedup();
                assert_eq!(
                    values.len(),
                    1,
                    "bucket {key} exceeds the split threshold with distinct values"
                );
            }
        }
    }
}

/// A generated order row, also the unit of the naive model.
pub fn random_order(rng: &mut StdRng, id: u32) -> OrderRow {
    let order_status = rng.gen_range(1..=3i64);
    // Orders that were never accepted have no provider.
    let provider_id = if order_status == 1 {
        None
    } else {
        Some(rng.gen_range(0..10i64))
    };
    OrderRow {
        id,
        order_status,
        product_id: rng.gen_range(0..10i64),
        provider_id,
        create_time: rng.gen_range(1_000..2_000u64),
    }
}

pub fn insert_event(row: OrderRow) -> ChangeEvent {
    ChangeEvent {
        op: Op::Create,
        before: None,
        after: Some(row),
    }
}

pub fn update_event(before: OrderRow, after: OrderRow) -> ChangeEvent {
    ChangeEvent {
        op: Op::Update,
        before: Some(before),
        after: Some(after),
    }
}

pub fn delete_event(row: OrderRow) -> ChangeEvent {
    ChangeEvent {
        op: Op::Delete,
        before: Some(row),
        after: None,
    }
}

/// The naive oracle: the authoritative rows, queried by brute force.
#[derive(Default)]
pub struct NaiveModel {
    rows: BTreeMap<u32, OrderRow>,
}

impl NaiveModel {
    pub fn apply(&mut self, event: &ChangeEvent) {
        match event.op {
            Op::Read | Op::Create | Op::Update => {
                let after = event.after.clone().unwrap();
                self.rows.insert(after.id, after);
            }
            Op::Delete => {
                self.rows.remove(&event.before.as_ref().unwrap().id);
            }
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &OrderRow> {
        self.rows.values()
    }

    /// Answers a query the slow way: filter, sort by
    /// `(create_time, id)` descending, cut at the limit.
    pub fn list(&self, request: &query::Request) -> query::Response {
        let mut matches: Vec<&OrderRow> = self
            .rows
            .values()
            .filter(|row| {
                request
                    .order_status_eq
                    .map_or(true, |status| row.order_status == status)
                    && request
                        .product_id_eq
                        .map_or(true, |product| row.product_id == product)
                    && request.provider_id_filter.as_ref().map_or(true, |filter| {
                        match filter.mode {
                            query::FilterMode::Eq => row.provider_id == filter.value,
                            query::FilterMode::Null => row.provider_id.is_none(),
                            query::FilterMode::NotNull => row.provider_id.is_some(),
                        }
                    })
            })
            .collect();
        let total = matches.len() as u64;
        matches.sort_by_key(|row| std::cmp::Reverse((row.create_time, row.id)));
        let ids = matches
            .iter()
            .take(request.limit.unwrap_or(usize::MAX))
            .map(|row| row.id)
            .collect();
        query::Response { total, ids }
    }
}
