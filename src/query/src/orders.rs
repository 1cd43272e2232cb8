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

use index::catalog::{OrdersCatalog, UNIVERSE_VALUE};
use index::sparse::SparseIndexReader;
use index::term::TermIndexReader;
use snafu::ResultExt;
use store::KvBackendRef;
use tracing::debug;

use crate::error::{ReadIndexSnafu, Result};

/// How a nullable equality filter matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Eq,
    Null,
    NotNull,
}

#[derive(Debug, Clone, Copy)]
pub struct NullableValueFilter<T> {
    pub mode: FilterMode,
    pub value: Option<T>,
}

impl<T> NullableValueFilter<T> {
    pub fn eq(value: T) -> Self {
        Self {
            mode: FilterMode::Eq,
            value: Some(value),
        }
    }

    pub fn null() -> Self {
        Self {
            mode: FilterMode::Null,
            value: None,
        }
    }

    pub fn not_null() -> Self {
        Self {
            mode: FilterMode::NotNull,
            value: None,
        }
    }
}

/// A conjunction of equality/nullability filters plus a result limit.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub order_status_eq: Option<i64>,
    pub product_id_eq: Option<i64>,
    pub provider_id_filter: Option<NullableValueFilter<i64>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Count of all matches, regardless of `limit`.
    pub total: u64,
    /// Matching ids ordered by `create_time` descending, then id
    /// descending.
    pub ids: Vec<u32>,
}

/// Answers conjunctive filter queries over the `orders` index, ordered by
/// the secondary sort key, without touching the primary table.
pub struct OrdersSearchService {
    universe: TermIndexReader<i64>,
    order_status: TermIndexReader<i64>,
    product_id: TermIndexReader<i64>,
    provider_id: TermIndexReader<Option<i64>>,
    create_time: SparseIndexReader,
}

impl OrdersSearchService {
    pub fn new(catalog: &OrdersCatalog, kv: KvBackendRef) -> Self {
        Self {
            universe: TermIndexReader::new(catalog.universe().clone(), kv.clone()),
            order_status: TermIndexReader::new(catalog.order_status().clone(), kv.clone()),
            product_id: TermIndexReader::new(catalog.product_id().clone(), kv.clone()),
            provider_id: TermIndexReader::new(catalog.provider_id().clone(), kv.clone()),
            create_time: catalog.sparse_reader(kv),
        }
    }

    /// Lists ids matching the request, ordered by create time descending.
    ///
    /// The accumulator starts from the universe posting so a request with
    /// no equality filters still intersects with the sort scan. Term
    /// readers hand out freshly decoded bitmaps, so the accumulator never
    /// aliases stored state.
    pub async fn list(&self, request: &Request) -> Result<Response> {
        debug!("Querying orders, request: {:?}", request);
        let mut acc = self
            .universe
            .get(UNIVERSE_VALUE)
            .await
            .context(ReadIndexSnafu)?;
        if let Some(order_status) = request.order_status_eq {
            let posting = self
                .order_status
                .get(order_status)
                .await
                .context(ReadIndexSnafu)?;
            acc &= &posting;
        }
        if let Some(product_id) = request.product_id_eq {
            let posting = self
                .product_id
                .get(product_id)
                .await
                .context(ReadIndexSnafu)?;
            acc &= &posting;
        }
        if let Some(filter) = &request.provider_id_filter {
            let posting = match filter.mode {
                FilterMode::Eq => self.provider_id.get(filter.value).await,
                // Both null modes resolve against the null posting.
                FilterMode::Null | FilterMode::NotNull => self.provider_id.get(None).await,
            }
            .context(ReadIndexSnafu)?;
            match filter.mode {
                FilterMode::Eq | FilterMode::Null => acc &= &posting,
                FilterMode::NotNull => acc -= &posting,
            }
        }

        let total = acc.len();
        if request.limit == Some(0) || total == 0 {
            return Ok(Response { total, ids: vec![] });
        }

        let mut ids = Vec::new();
        self.create_time
            .scan(&acc, true, |batch| {
                for sort_id in batch {
                    ids.push(sort_id.id);
                    if let Some(limit) = request.limit {
                        if ids.len() >= limit {
                            return false;
                        }
                    }
                }
                true
            })
            .await
            .context(ReadIndexSnafu)?;
        Ok(Response { total, ids })
    }
}
