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

pub mod applier;
pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod log;

pub use applier::OrdersIndexApplier;
pub use config::CdcConfig;
pub use consumer::Consumer;
pub use event::{ChangeEvent, Op, OrderRow};
pub use log::{CdcLog, CdcLogRef, CdcRecord, EntryId, MemoryCdcLog};
