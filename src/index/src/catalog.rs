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

//! Index registration for the fixed `orders` schema: one universe
//! posting, term indexes on `order_status`, `product_id` and
//! `provider_id`, and a sparse index on `create_time` with its forward
//! store.

use store::KvBackendRef;

use crate::config::IndexOptions;
use crate::forward::ForwardValueStore;
use crate::sparse::{SparseIndex, SparseIndexReader, SparseIndexWriter};
use crate::term::TermIndex;

pub const ORDERS_TABLE: &str = "orders";

pub const UNIVERSE_FIELD: &str = "__all";
pub const ORDER_STATUS_FIELD: &str = "order_status";
pub const PRODUCT_ID_FIELD: &str = "product_id";
pub const PROVIDER_ID_FIELD: &str = "provider_id";
pub const CREATE_TIME_FIELD: &str = "create_time";

/// The universe posting keeps every live row under this single value key.
pub const UNIVERSE_VALUE: i64 = 0;

/// The registered indexes of the `orders` table. Descriptors only; the
/// ingest and query sides attach their own readers and writers.
#[derive(Debug, Clone)]
pub struct OrdersCatalog {
    options: IndexOptions,
    universe: TermIndex,
    order_status: TermIndex,
    product_id: TermIndex,
    provider_id: TermIndex,
    create_time: SparseIndex,
}

impl OrdersCatalog {
    pub fn new(options: IndexOptions) -> Self {
        let ns = &options.namespace;
        Self {
            universe: TermIndex::new(ns, ORDERS_TABLE, UNIVERSE_FIELD),
            order_status: TermIndex::new(ns, ORDERS_TABLE, ORDER_STATUS_FIELD),
            product_id: TermIndex::new(ns, ORDERS_TABLE, PRODUCT_ID_FIELD),
            provider_id: TermIndex::new(ns, ORDERS_TABLE, PROVIDER_ID_FIELD),
            create_time: SparseIndex::new(ns, ORDERS_TABLE, CREATE_TIME_FIELD),
            options,
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn universe(&self) -> &TermIndex {
        &self.universe
    }

    pub fn order_status(&self) -> &TermIndex {
        &self.order_status
    }

    pub fn product_id(&self) -> &TermIndex {
        &self.product_id
    }

    pub fn provider_id(&self) -> &TermIndex {
        &self.provider_id
    }

    pub fn create_time(&self) -> &SparseIndex {
        &self.create_time
    }

    pub fn forward_store(&self, kv: KvBackendRef) -> ForwardValueStore {
        ForwardValueStore::new(&self.options.namespace, ORDERS_TABLE, CREATE_TIME_FIELD, kv)
    }

    pub fn sparse_writer(&self, kv: KvBackendRef) -> SparseIndexWriter {
        SparseIndexWriter::new(
            self.create_time.clone(),
            self.forward_store(kv.clone()),
            kv,
            self.options.split_threshold,
        )
    }

    pub fn sparse_reader(&self, kv: KvBackendRef) -> SparseIndexReader {
        SparseIndexReader::new(
            self.create_time.clone(),
            self.forward_store(kv.clone()),
            kv,
            self.options.scan_page_size,
        )
    }
}
