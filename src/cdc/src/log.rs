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

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::Result;

pub type EntryId = u64;

pub type CdcLogRef = Arc<dyn CdcLog>;

/// One record of the change log. Offsets start at 1 and are dense within
/// a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdcRecord {
    pub offset: EntryId,
    pub payload: Vec<u8>,
}

/// The transport contract of the partitioned change log: at-least-once
/// delivery in per-partition order. `poll` returns records after the
/// committed offset, so anything applied but not committed is redelivered.
#[async_trait]
pub trait CdcLog: Send + Sync {
    async fn poll(&self, max: usize) -> Result<Vec<CdcRecord>>;

    async fn commit(&self, offset: EntryId) -> Result<()>;
}

/// An in-process [`CdcLog`] for tests and local runs.
#[derive(Default)]
pub struct MemoryCdcLog {
    inner: RwLock<MemoryCdcLogInner>,
}

#[derive(Default)]
struct MemoryCdcLogInner {
    payloads: Vec<Vec<u8>>,
    committed: EntryId,
}

impl MemoryCdcLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, payload: Vec<u8>) {
        self.inner.write().unwrap().payloads.push(payload);
    }

    pub fn committed(&self) -> EntryId {
        self.inner.read().unwrap().committed
    }
}

#[async_trait]
impl CdcLog for MemoryCdcLog {
    async fn poll(&self, max: usize) -> Result<Vec<CdcRecord>> {
        let inner = self.inner.read().unwrap();
        let start = inner.committed as usize;
        Ok(inner
            .payloads
            .iter()
            .enumerate()
            .skip(start)
            .take(max)
            .map(|(i, payload)| CdcRecord {
                offset: i as EntryId + 1,
                payload: payload.clone(),
            })
            .collect())
    }

    async fn commit(&self, offset: EntryId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.committed = inner.committed.max(offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_poll_redelivers_until_committed() {
        let log = MemoryCdcLog::new();
        log.append(b"a".to_vec());
        log.append(b"b".to_vec());

        let records = log.poll(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offset, 1);

        // Nothing committed, so everything comes back.
        assert_eq!(log.poll(10).await.unwrap().len(), 2);

        log.commit(1).await.unwrap();
        let records = log.poll(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].offset, 2);

        log.commit(2).await.unwrap();
        assert!(log.poll(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_never_regresses() {
        let log = MemoryCdcLog::new();
        log.append(b"a".to_vec());
        log.append(b"b".to_vec());
        log.commit(2).await.unwrap();
        log.commit(1).await.unwrap();
        assert_eq!(log.committed(), 2);
    }
}
