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

use std::io::Error as IoError;
use std::num::ParseIntError;
use std::str::Utf8Error;

use snafu::{Location, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to access KV store"))]
    Store {
        source: store::error::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to encode bitmap"))]
    EncodeBitmap {
        #[snafu(source)]
        error: IoError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to decode bitmap"))]
    DecodeBitmap {
        #[snafu(source)]
        error: IoError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Corrupted bitmap data, consumed: {}, expected: {}", consumed, expected))]
    CorruptedBitmap {
        consumed: u64,
        expected: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Forward value is not valid UTF-8, id: {}", id))]
    ForwardValueUtf8 {
        id: u32,
        #[snafu(source)]
        error: Utf8Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to parse forward value, id: {}, value: {}", id, value))]
    ParseForwardValue {
        id: u32,
        value: String,
        #[snafu(source)]
        error: ParseIntError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to parse sort key member: {}", member))]
    ParseSortKey {
        member: String,
        #[snafu(source)]
        error: ParseIntError,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
