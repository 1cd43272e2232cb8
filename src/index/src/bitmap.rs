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

use std::io::Cursor;

use roaring::RoaringBitmap;
use snafu::{ensure, ResultExt};

use crate::error::{CorruptedBitmapSnafu, DecodeBitmapSnafu, EncodeBitmapSnafu, Result};

/// Serializes a bitmap into the standard roaring on-wire form.
///
/// Callers must not store the encoding of an empty bitmap; the absence of
/// a key is the canonical empty set.
pub fn encode(bitmap: &RoaringBitmap) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(bitmap.serialized_size());
    bitmap.serialize_into(&mut buf).context(EncodeBitmapSnafu)?;
    Ok(buf)
}

/// Deserializes a bitmap, rejecting trailing bytes. A decode that does not
/// consume the whole value means the stored data is corrupted.
pub fn decode(bytes: &[u8]) -> Result<RoaringBitmap> {
    if bytes.is_empty() {
        return Ok(RoaringBitmap::new());
    }
    let mut cursor = Cursor::new(bytes);
    let bitmap = RoaringBitmap::deserialize_from(&mut cursor).context(DecodeBitmapSnafu)?;
    ensure!(
        cursor.position() == bytes.len() as u64,
        CorruptedBitmapSnafu {
            consumed: cursor.position(),
            expected: bytes.len(),
        }
    );
    Ok(bitmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_roundtrip() {
        let bitmap = RoaringBitmap::from_iter([1u32, 2, 3, 1000, u32::MAX]);
        let bytes = encode(&bitmap).unwrap();
        assert_eq!(decode(&bytes).unwrap(), bitmap);
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = encode(&RoaringBitmap::from_iter([7u32])).unwrap();
        bytes.push(0);
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::CorruptedBitmap { .. }));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"not a bitmap").is_err());
    }
}
