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

use std::num::ParseIntError;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub type KvBackendRef = Arc<dyn KvBackend>;

/// The narrow contract the index layer consumes from the external
/// key-value service: hashes for postings and forward values, sorted sets
/// for the sparse bucket registry.
///
/// Sorted-set members are 16-hex zero-padded lowercase renderings of `u64`
/// sort keys (see [`u64_to_hex`]); the accompanying score is the same
/// value as `f64` and is only a tie-break hint. Lexicographic order of the
/// members is authoritative and agrees with integer order because the hex
/// form is zero-padded.
#[async_trait]
pub trait KvBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>>;

    /// Returns one entry per requested field, `None` for missing fields.
    async fn hash_multi_get(&self, key: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    async fn hash_set(&self, key: &str, field: &str, value: Vec<u8>) -> Result<()>;

    async fn hash_delete(&self, key: &str, fields: &[String]) -> Result<()>;

    async fn sorted_add(&self, key: &str, entries: &[(f64, String)]) -> Result<()>;

    async fn sorted_remove(&self, key: &str, members: &[String]) -> Result<()>;

    /// Scans members between `start` and `stop`, both inclusive. The scan
    /// begins at `start` and walks toward `stop`; `reverse` therefore asks
    /// for descending lexicographic order, with `start` above `stop`.
    /// At most `limit` members are returned.
    async fn sorted_lex_range(
        &self,
        key: &str,
        start: &str,
        stop: &str,
        reverse: bool,
        limit: usize,
    ) -> Result<Vec<String>>;
}

/// Renders a sort key as a sorted-set member. Zero-padding keeps the
/// lexicographic order of members aligned with the integer order.
pub fn u64_to_hex(value: u64) -> String {
    format!("{value:016x}")
}

pub fn hex_to_u64(member: &str) -> std::result::Result<u64, ParseIntError> {
    u64::from_str_radix(member, 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_member_roundtrip() {
        for value in [0, 1, 42, u64::MAX - 1, u64::MAX] {
            let member = u64_to_hex(value);
            assert_eq!(member.len(), 16);
            assert_eq!(hex_to_u64(&member).unwrap(), value);
        }
    }

    #[test]
    fn test_hex_member_order() {
        let mut members = vec![u64_to_hex(300), u64_to_hex(2), u64_to_hex(u64::MAX)];
        members.sort();
        assert_eq!(
            members,
            vec![u64_to_hex(2), u64_to_hex(300), u64_to_hex(u64::MAX)]
        );
    }

    #[test]
    fn test_hex_member_rejects_garbage() {
        assert!(hex_to_u64("not-a-sort-key").is_err());
    }
}
