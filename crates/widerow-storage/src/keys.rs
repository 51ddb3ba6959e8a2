//! Key layout for cells stored in RocksDB.
//!
//! Every cell of a store column family lives under one RocksDB key:
//!
//! ```text
//! [row_len: u32 BE][row_key bytes][column sort key]
//! ```
//!
//! The length prefix keeps each row's cells contiguous and stops one row
//! key from prefixing another. The column sort key is chosen so RocksDB's
//! bytewise order equals the family's [`Comparator`] order:
//!
//! | Comparator | Sort key |
//! |------------|----------|
//! | `Bytes`, `Ascii`, `Utf8`, `LexicalUuid` | the column key itself |
//! | `Long` | 8 bytes BE with the sign bit flipped |
//! | `TimeUuid` | 8 bytes BE timestamp ticks, then the 16 UUID bytes |

use widerow_core::types::time_uuid;
use widerow_core::Comparator;

use crate::error::{RocksResult, RocksTransportError};

const LONG_SIGN: u64 = 1 << 63;
const TICKS_LEN: usize = 8;

/// Key prefix shared by every cell of one row.
pub fn row_prefix(row_key: &str) -> Vec<u8> {
    let bytes = row_key.as_bytes();
    let mut prefix = Vec::with_capacity(4 + bytes.len());
    prefix.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    prefix.extend_from_slice(bytes);
    prefix
}

/// Sortable form of a column key.
///
/// # Errors
/// - `RocksTransportError::InvalidRequest` if the key is malformed for the
///   comparator
pub fn encode_column(comparator: Comparator, name: &[u8]) -> RocksResult<Vec<u8>> {
    comparator
        .validate(name)
        .map_err(RocksTransportError::InvalidRequest)?;
    Ok(match comparator {
        Comparator::Long => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(name);
            (u64::from_be_bytes(raw) ^ LONG_SIGN).to_be_bytes().to_vec()
        }
        Comparator::TimeUuid => {
            let mut key = Vec::with_capacity(TICKS_LEN + name.len());
            key.extend_from_slice(&time_uuid::timestamp_ticks(name).to_be_bytes());
            key.extend_from_slice(name);
            key
        }
        _ => name.to_vec(),
    })
}

/// Inverse of [`encode_column`].
pub fn decode_column(comparator: Comparator, sort_key: &[u8]) -> RocksResult<Vec<u8>> {
    let corrupt = || {
        RocksTransportError::Serialization(format!("bad {} sort key of {} bytes", comparator, sort_key.len()))
    };
    match comparator {
        Comparator::Long => {
            let raw: [u8; 8] = sort_key.try_into().map_err(|_| corrupt())?;
            Ok((u64::from_be_bytes(raw) ^ LONG_SIGN).to_be_bytes().to_vec())
        }
        Comparator::TimeUuid => {
            if sort_key.len() != TICKS_LEN + 16 {
                return Err(corrupt());
            }
            Ok(sort_key[TICKS_LEN..].to_vec())
        }
        _ => Ok(sort_key.to_vec()),
    }
}

/// Full RocksDB key of one cell.
pub fn cell_key(row_key: &str, comparator: Comparator, name: &[u8]) -> RocksResult<Vec<u8>> {
    let mut key = row_prefix(row_key);
    key.extend(encode_column(comparator, name)?);
    Ok(key)
}

/// Split a cell key into its row key and column sort key.
pub fn split_cell_key(key: &[u8]) -> RocksResult<(String, &[u8])> {
    let corrupt = || RocksTransportError::Serialization(format!("cell key of {} bytes has no row prefix", key.len()));
    let len_bytes: [u8; 4] = key.get(..4).and_then(|b| b.try_into().ok()).ok_or_else(corrupt)?;
    let row_end = 4 + u32::from_be_bytes(len_bytes) as usize;
    let row = key.get(4..row_end).ok_or_else(corrupt)?;
    let row = String::from_utf8(row.to_vec()).map_err(|e| RocksTransportError::Serialization(e.to_string()))?;
    Ok((row, &key[row_end..]))
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// when no such key exists (all bytes `0xFF`).
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    while let Some(last) = next.pop() {
        if last < u8::MAX {
            next.push(last + 1);
            return Some(next);
        }
    }
    None
}
