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

use serde_json::error::Error as JsonError;
use snafu::{Location, Snafu};

use crate::event::Op;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to decode change message, offset: {}", offset))]
    DecodeMessage {
        offset: u64,
        #[snafu(source)]
        error: JsonError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Change message misses the {} image, op: {:?}", image, op))]
    MissingImage {
        op: Op,
        image: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to apply change to index"))]
    ApplyIndex {
        source: index::error::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("CDC transport failure, reason: {}", reason))]
    Transport {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Consumer already started"))]
    IllegalState {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to wait for the consumer task to stop"))]
    WaitStop {
        #[snafu(source)]
        error: tokio::task::JoinError,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
