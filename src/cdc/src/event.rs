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

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{DecodeMessageSnafu, Result};

/// The operation of a change event. `Read` is the snapshot phase of the
/// CDC connector and indexes like an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "r")]
    Read,
    #[serde(rename = "c")]
    Create,
    #[serde(rename = "u")]
    Update,
    #[serde(rename = "d")]
    Delete,
}

/// A row image carried by a change event, one field per indexed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: u32,
    pub order_status: i64,
    pub product_id: i64,
    pub provider_id: Option<i64>,
    pub create_time: u64,
}

/// A row-level change notification with before/after images. An unknown
/// `op` or a missing required field fails deserialization, which is fatal
/// to the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub op: Op,
    pub before: Option<OrderRow>,
    pub after: Option<OrderRow>,
}

impl ChangeEvent {
    pub fn decode(payload: &[u8], offset: u64) -> Result<Self> {
        serde_json::from_slice(payload).context(DecodeMessageSnafu { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_decode_create() {
        let payload = br#"{
            "op": "c",
            "before": null,
            "after": {"id": 1, "order_status": 2, "product_id": 7, "provider_id": null, "create_time": 1000}
        }"#;
        let event = ChangeEvent::decode(payload, 0).unwrap();
        assert_eq!(event.op, Op::Create);
        assert!(event.before.is_none());
        let after = event.after.unwrap();
        assert_eq!(after.id, 1);
        assert_eq!(after.provider_id, None);
        assert_eq!(after.create_time, 1000);
    }

    #[test]
    fn test_decode_update_images() {
        let payload = br#"{
            "op": "u",
            "before": {"id": 1, "order_status": 1, "product_id": 7, "provider_id": 5, "create_time": 1000},
            "after": {"id": 1, "order_status": 2, "product_id": 7, "provider_id": 5, "create_time": 1000}
        }"#;
        let event = ChangeEvent::decode(payload, 3).unwrap();
        assert_eq!(event.op, Op::Update);
        assert_eq!(event.before.unwrap().order_status, 1);
        assert_eq!(event.after.unwrap().order_status, 2);
    }

    #[test]
    fn test_decode_rejects_unknown_op() {
        let payload = br#"{"op": "x", "before": null, "after": null}"#;
        let err = ChangeEvent::decode(payload, 9).unwrap_err();
        assert!(matches!(err, Error::DecodeMessage { offset: 9, .. }));
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let payload = br#"{
            "op": "c",
            "before": null,
            "after": {"id": 1, "order_status": 2, "product_id": 7, "provider_id": null}
        }"#;
        assert!(ChangeEvent::decode(payload, 0).is_err());
    }
}
