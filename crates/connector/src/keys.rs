//! Row key derivation for the contract-table backend.
//!
//! The contract stores every row under `sha256(row_key)`, where `row_key` is
//! a table prefix followed by the encoded key. Writers send the encoded key
//! and the contract prepends the prefix; readers rebuild the full row key and
//! look up its hash. Both sides must therefore encode keys identically, and
//! this module is the single place that does it.
//!
//! A key is encoded as the standard base64 of its big-endian magnitude:
//! leading zero bytes are dropped, so `[0x00, 0x01]` and `[0x01]` name the
//! same row, and an empty or all-zero key encodes as the empty string.

use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};

/// Prefix of rows holding state entries.
pub const STATE_PREFIX: &str = "DState:";

/// Prefix of rows holding package blobs.
pub const PACKAGE_PREFIX: &str = "DPackages:";

/// Row key of the record-time scalar.
pub const RECORD_TIME_KEY: &str = "DRecordTime";

/// Row key of the ledger-identity scalar.
pub const LEDGER_ID_KEY: &str = "DLedgerID";

/// Encodes a raw key the way the contract indexes it.
#[must_use]
pub fn encode_index_key(key: &[u8]) -> String {
    let start = key.iter().position(|b| *b != 0).unwrap_or(key.len());
    STANDARD.encode(&key[start..])
}

/// Builds the full row key for `key` under `prefix`.
#[must_use]
pub fn row_key(prefix: &str, key: &[u8]) -> String {
    format!("{prefix}{}", encode_index_key(key))
}

/// Returns the lowercase hex SHA-256 of a row key, as used for the
/// secondary index bounds.
#[must_use]
pub fn row_hash(row_key: &str) -> String {
    hex::encode(Sha256::digest(row_key.as_bytes()))
}
