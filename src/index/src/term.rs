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

use std::marker::PhantomData;

use roaring::RoaringBitmap;
use snafu::ResultExt;
use store::KvBackendRef;

use crate::bitmap;
use crate::error::{Result, StoreSnafu};

/// The hash field under which null values are posted. Decimal rendering of
/// an integer never produces this literal, so the token cannot collide
/// with a real value key.
pub const NULL_TOKEN: &str = "null";

/// Names one term-indexed `(table, field)` pair and renders its posting
/// hash key.
#[derive(Debug, Clone)]
pub struct TermIndex {
    hash_key: String,
}

impl TermIndex {
    pub fn new(namespace: &str, table_name: &str, field_name: &str) -> Self {
        Self {
            hash_key: format!("{namespace}:bm:term:{table_name}:{field_name}"),
        }
    }

    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }
}

/// A scalar usable as a term posting coordinate. The index only needs
/// equality and a collision-free rendering as a hash field.
pub trait TermValue: Copy + PartialEq + Send + Sync + 'static {
    fn value_key(&self) -> String;
}

impl TermValue for i64 {
    fn value_key(&self) -> String {
        self.to_string()
    }
}

impl TermValue for Option<i64> {
    fn value_key(&self) -> String {
        match self {
            Some(value) => value.to_string(),
            None => NULL_TOKEN.to_string(),
        }
    }
}

pub struct TermIndexReader<T> {
    index: TermIndex,
    kv: KvBackendRef,
    _value: PhantomData<T>,
}

impl<T: TermValue> TermIndexReader<T> {
    pub fn new(index: TermIndex, kv: KvBackendRef) -> Self {
        Self {
            index,
            kv,
            _value: PhantomData,
        }
    }

    /// Reads the posting for `value`. The returned bitmap is freshly
    /// decoded and owned by the caller, so it may be mutated without
    /// aliasing stored state. A missing posting is the empty set.
    pub async fn get(&self, value: T) -> Result<RoaringBitmap> {
        let bytes = self
            .kv
            .hash_get(self.index.hash_key(), &value.value_key())
            .await
            .context(StoreSnafu)?;
        match bytes {
            Some(bytes) => bitmap::decode(&bytes),
            None => Ok(RoaringBitmap::new()),
        }
    }
}

pub struct TermIndexWriter<T> {
    index: TermIndex,
    kv: KvBackendRef,
    _value: PhantomData<T>,
}

impl<T: TermValue> TermIndexWriter<T> {
    pub fn new(index: TermIndex, kv: KvBackendRef) -> Self {
        Self {
            index,
            kv,
            _value: PhantomData,
        }
    }

    pub async fn add(&self, value: T, id: u32) -> Result<()> {
        self.update(value, |bitmap| {
            bitmap.insert(id);
        })
        .await
    }

    pub async fn remove(&self, value: T, id: u32) -> Result<()> {
        self.update(value, |bitmap| {
            bitmap.remove(id);
        })
        .await
    }

    /// Moves `id` between postings as remove-then-add. The two writes are
    /// not atomic; replaying either half is idempotent.
    pub async fn move_value(&self, before: T, after: T, id: u32) -> Result<()> {
        if before == after {
            return Ok(());
        }
        self.remove(before, id).await?;
        self.add(after, id).await
    }

    async fn update(&self, value: T, mutate: impl FnOnce(&mut RoaringBitmap)) -> Result<()> {
        let hash_key = self.index.hash_key();
        let value_key = value.value_key();
        let bytes = self
            .kv
            .hash_get(hash_key, &value_key)
            .await
            .context(StoreSnafu)?;
        let mut bitmap = match bytes {
            Some(bytes) => bitmap::decode(&bytes)?,
            None => RoaringBitmap::new(),
        };
        mutate(&mut bitmap);
        if bitmap.is_empty() {
            self.kv
                .hash_delete(hash_key, &[value_key])
                .await
                .context(StoreSnafu)
        } else {
            self.kv
                .hash_set(hash_key, &value_key, bitmap::encode(&bitmap)?)
                .await
                .context(StoreSnafu)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use store::MemoryKvBackend;

    use super::*;

    fn reader_writer() -> (TermIndexReader<Option<i64>>, TermIndexWriter<Option<i64>>) {
        let kv: KvBackendRef = Arc::new(MemoryKvBackend::new());
        let index = TermIndex::new("test", "orders", "provider_id");
        (
            TermIndexReader::new(index.clone(), kv.clone()),
            TermIndexWriter::new(index, kv),
        )
    }

    #[test]
    fn test_value_keys() {
        assert_eq!(42i64.value_key(), "42");
        assert_eq!((-7i64).value_key(), "-7");
        assert_eq!(Some(42i64).value_key(), "42");
        assert_eq!(None::<i64>.value_key(), NULL_TOKEN);
    }

    #[test]
    fn test_hash_key_layout() {
        let index = TermIndex::new("ns", "orders", "order_status");
        assert_eq!(index.hash_key(), "ns:bm:term:orders:order_status");
    }

    #[tokio::test]
    async fn test_add_remove() {
        let (reader, writer) = reader_writer();

        writer.add(Some(3), 1).await.unwrap();
        writer.add(Some(3), 2).await.unwrap();
        writer.add(None, 9).await.unwrap();

        let posting = reader.get(Some(3)).await.unwrap();
        assert_eq!(posting.iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(reader.get(None).await.unwrap().len(), 1);

        writer.remove(Some(3), 1).await.unwrap();
        assert_eq!(reader.get(Some(3)).await.unwrap().iter().collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_empty_posting_is_deleted() {
        let (reader, writer) = reader_writer();

        writer.add(Some(3), 1).await.unwrap();
        writer.remove(Some(3), 1).await.unwrap();
        assert!(reader.get(Some(3)).await.unwrap().is_empty());
        // The field itself must be gone, not hold an empty encoding.
        let raw = writer
            .kv
            .hash_get(writer.index.hash_key(), &Some(3i64).value_key())
            .await
            .unwrap();
        assert!(raw.is_none());
    }

    #[tokio::test]
    async fn test_move_value() {
        let (reader, writer) = reader_writer();

        writer.add(Some(1), 5).await.unwrap();
        writer.move_value(Some(1), Some(2), 5).await.unwrap();
        assert!(reader.get(Some(1)).await.unwrap().is_empty());
        assert!(reader.get(Some(2)).await.unwrap().contains(5));

        // Equal keys leave the posting untouched.
        writer.move_value(Some(2), Some(2), 5).await.unwrap();
        assert!(reader.get(Some(2)).await.unwrap().contains(5));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (reader, writer) = reader_writer();
        writer.add(Some(1), 5).await.unwrap();
        writer.remove(Some(1), 5).await.unwrap();
        writer.remove(Some(1), 5).await.unwrap();
        assert!(reader.get(Some(1)).await.unwrap().is_empty());
    }
}
