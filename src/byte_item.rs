//! Byte items
//!
//! The blob layout shared by the front end and the store's comparator:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────┐
//! │ KeyLen (2,LE)│     Key      │      Value       │
//! └──────────────┴──────────────┴──────────────────┘
//! ```

use std::cmp::Ordering;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, StrataError};

/// Size of the key length prefix
pub const KEY_LEN_SIZE: usize = 2;

/// Key/value blob in the store's encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteItem(Bytes);

impl ByteItem {
    /// Encode `key` and `value`. Keys longer than `u16::MAX` are rejected.
    pub fn new(key: &[u8], value: &[u8]) -> Result<Self> {
        let key_len = u16::try_from(key.len()).map_err(|_| {
            StrataError::InvalidItem(format!(
                "key of {} bytes exceeds the {} byte limit",
                key.len(),
                u16::MAX
            ))
        })?;

        let mut buf = BytesMut::with_capacity(KEY_LEN_SIZE + key.len() + value.len());
        buf.put_u16_le(key_len);
        buf.put_slice(key);
        buf.put_slice(value);
        Ok(Self(buf.freeze()))
    }

    /// Query carrying only a key, for lookups and deletes
    pub fn key_only(key: &[u8]) -> Result<Self> {
        Self::new(key, &[])
    }

    /// Wrap an already encoded blob
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        if data.len() < KEY_LEN_SIZE || value_offset(&data) > data.len() {
            return Err(StrataError::InvalidItem(format!(
                "blob of {} bytes does not hold its declared key",
                data.len()
            )));
        }
        Ok(Self(data))
    }

    pub fn key(&self) -> &[u8] {
        &self.0[KEY_LEN_SIZE..value_offset(&self.0)]
    }

    pub fn value(&self) -> &[u8] {
        &self.0[value_offset(&self.0)..]
    }

    /// Value as a shared slice of the blob
    pub fn value_bytes(&self) -> Bytes {
        self.0.slice(value_offset(&self.0)..)
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

fn value_offset(blob: &[u8]) -> usize {
    KEY_LEN_SIZE + u16::from_le_bytes([blob[0], blob[1]]) as usize
}

/// Key slice of an encoded blob; an undersized blob yields its raw tail.
fn key_of(blob: &[u8]) -> &[u8] {
    if blob.len() < KEY_LEN_SIZE {
        return blob;
    }
    let end = value_offset(blob).min(blob.len());
    &blob[KEY_LEN_SIZE..end]
}

/// Orders encoded blobs by key, ignoring the value.
pub fn byte_item_key_compare(this: &[u8], that: &[u8]) -> Ordering {
    key_of(this).cmp(key_of(that))
}
