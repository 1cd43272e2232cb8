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
use index::sparse::SparseIndexWriter;
use index::term::TermIndexWriter;
use snafu::{OptionExt, ResultExt};
use store::KvBackendRef;

use crate::error::{ApplyIndexSnafu, MissingImageSnafu, Result};
use crate::event::{ChangeEvent, Op, OrderRow};

/// Turns change events into index mutations for the `orders` table.
///
/// The write order within one event is fixed and observable, because the
/// sub-writes are not atomic: the universe posting first on insert and
/// delete, then the term fields in declared order, the sparse index last.
/// Every mutation is idempotent per id, so replaying a partially applied
/// event converges.
pub struct OrdersIndexApplier {
    universe: TermIndexWriter<i64>,
    order_status: TermIndexWriter<i64>,
    product_id: TermIndexWriter<i64>,
    provider_id: TermIndexWriter<Option<i64>>,
    create_time: SparseIndexWriter,
}

impl OrdersIndexApplier {
    pub fn new(catalog: &OrdersCatalog, kv: KvBackendRef) -> Self {
        Self {
            universe: TermIndexWriter::new(catalog.universe().clone(), kv.clone()),
            order_status: TermIndexWriter::new(catalog.order_status().clone(), kv.clone()),
            product_id: TermIndexWriter::new(catalog.product_id().clone(), kv.clone()),
            provider_id: TermIndexWriter::new(catalog.provider_id().clone(), kv.clone()),
            create_time: catalog.sparse_writer(kv),
        }
    }

    pub async fn apply(&self, event: &ChangeEvent) -> Result<()> {
        match event.op {
            Op::Read | Op::Create => {
                let after = event.after.as_ref().context(MissingImageSnafu {
                    op: event.op,
                    image: "after",
                })?;
                self.on_insert(after).await
            }
            Op::Update => {
                let before = event.before.as_ref().context(MissingImageSnafu {
                    op: event.op,
                    image: "before",
                })?;
                let after = event.after.as_ref().context(MissingImageSnafu {
                    op: event.op,
                    image: "after",
                })?;
                self.on_update(before, after).await
            }
            Op::Delete => {
                let before = event.before.as_ref().context(MissingImageSnafu {
                    op: event.op,
                    image: "before",
                })?;
                self.on_delete(before).await
            }
        }
    }

    async fn on_insert(&self, row: &OrderRow) -> Result<()> {
        self.universe
            .add(UNIVERSE_VALUE, row.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.order_status
            .add(row.order_status, row.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.product_id
            .add(row.product_id, row.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.provider_id
            .add(row.provider_id, row.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.create_time
            .add(row.create_time, row.id)
            .await
            .context(ApplyIndexSnafu)
    }

    async fn on_update(&self, before: &OrderRow, after: &OrderRow) -> Result<()> {
        self.order_status
            .move_value(before.order_status, after.order_status, after.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.product_id
            .move_value(before.product_id, after.product_id, after.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.provider_id
            .move_value(before.provider_id, after.provider_id, after.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.create_time
            .move_value(before.create_time, after.create_time, after.id)
            .await
            .context(ApplyIndexSnafu)
    }

    async fn on_delete(&self, row: &OrderRow) -> Result<()> {
        self.universe
            .remove(UNIVERSE_VALUE, row.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.order_status
            .remove(row.order_status, row.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.product_id
            .remove(row.product_id, row.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.provider_id
            .remove(row.provider_id, row.id)
            .await
            .context(ApplyIndexSnafu)?;
        self.create_time
            .remove(row.create_time, row.id)
            .await
            .context(ApplyIndexSnafu)
    }
}
