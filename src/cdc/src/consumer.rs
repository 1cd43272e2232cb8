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

use std::sync::Mutex;

use snafu::{ensure, ResultExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::applier::OrdersIndexApplier;
use crate::config::CdcConfig;
use crate::error::{IllegalStateSnafu, Result, WaitStopSnafu};
use crate::event::ChangeEvent;
use crate::log::CdcLogRef;

/// The ingestion task of one partition: polls the change log, applies
/// each record to the index, and commits the offset after the whole event
/// is applied. A failed event is left uncommitted so the transport
/// redelivers it.
pub struct Consumer {
    cancel_token: CancellationToken,
    inner: Mutex<ConsumerInner>,
}

struct ConsumerInner {
    /// The task handle. Some once the consumer is started.
    handle: Option<JoinHandle<()>>,
    /// The worker to run. Some until the consumer is started.
    worker: Option<ConsumerWorker>,
}

struct ConsumerWorker {
    log: CdcLogRef,
    applier: OrdersIndexApplier,
    config: CdcConfig,
}

impl ConsumerWorker {
    /// Applies one batch. Returns the number of records applied and
    /// committed.
    async fn poll_once(&self) -> Result<usize> {
        let records = self.log.poll(self.config.poll_batch_size).await?;
        let polled = records.len();
        for record in records {
            debug!("Message claimed, offset: {}", record.offset);
            let event = ChangeEvent::decode(&record.payload, record.offset)?;
            self.applier.apply(&event).await?;
            self.log.commit(record.offset).await?;
        }
        Ok(polled)
    }
}

impl Consumer {
    pub fn new(log: CdcLogRef, applier: OrdersIndexApplier, config: CdcConfig) -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            inner: Mutex::new(ConsumerInner {
                handle: None,
                worker: Some(ConsumerWorker {
                    log,
                    applier,
                    config,
                }),
            }),
        }
    }

    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        ensure!(inner.worker.is_some(), IllegalStateSnafu);

        // Safety: checked above.
        let worker = inner.worker.take().unwrap();
        let child = self.cancel_token.child_token();
        let handle = tokio::spawn(async move {
            let interval = worker.config.poll_interval;
            loop {
                let applied = tokio::select! {
                    _ = child.cancelled() => return,
                    result = worker.poll_once() => match result {
                        Ok(applied) => applied,
                        Err(e) => {
                            // The offset was not committed, so the failed
                            // event is redelivered after the backoff.
                            error!("Failed to consume change log: {e}");
                            0
                        }
                    },
                };
                if applied == 0 {
                    tokio::select! {
                        _ = child.cancelled() => return,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }
        });
        inner.handle = Some(handle);
        debug!("CDC consumer started");
        Ok(())
    }

    /// Stops the consumer and waits for the task to exit. Stopping twice
    /// is allowed.
    pub async fn stop(&self) -> Result<()> {
        let handle = {
            let mut inner = self.inner.lock().unwrap();
            let Some(handle) = inner.handle.take() else {
                return Ok(());
            };
            self.cancel_token.cancel();
            handle
        };
        handle.await.context(WaitStopSnafu)?;
        info!("CDC consumer stopped");
        Ok(())
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap();
        if inner.handle.is_some() {
            self.cancel_token.cancel();
        }
    }
}
