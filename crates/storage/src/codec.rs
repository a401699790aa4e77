//! Value codec: gzip payloads and little-endian binary layouts.
//!
//! Every value the connector persists is gzip-compressed on the way out and
//! decompressed on the way back. The remaining helpers cover the two binary
//! layouts the ledger functions speak:
//!
//! - **Commit index**: unsigned 32-bit, little-endian, exactly 4 bytes
//! - **String list**: a 4-byte little-endian count `N`, then `N` records, each a 4-byte
//!   little-endian length `L` followed by `L` raw UTF-8 bytes (no padding, no terminator)

use std::io::{Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use crate::error::CodecError;

const LEN_PREFIX: usize = 4;

/// Compresses `data` into a gzip stream.
///
/// The output is deterministic: the gzip header carries no file name and a
/// zero modification time.
///
/// # Errors
///
/// Returns [`CodecError::Compress`] if the encoder fails, which only happens
/// when the environment is broken.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let buffer = Vec::with_capacity(data.len() / 2 + 32);
    let mut encoder = GzEncoder::new(buffer, Compression::default());
    encoder.write_all(data).map_err(CodecError::Compress)?;
    encoder.finish().map_err(CodecError::Compress)
}

/// Decompresses a gzip stream produced by [`compress`].
///
/// A zero-length input yields a zero-length output without running the
/// decoder.
///
/// # Errors
///
/// Returns [`CodecError::Decompress`] if `data` is not a valid gzip stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(data.len() * 2);
    GzDecoder::new(data).read_to_end(&mut out).map_err(CodecError::Decompress)?;
    Ok(out)
}

/// Encodes a commit index as 4 little-endian bytes.
#[must_use]
pub fn encode_index(index: u32) -> [u8; 4] {
    index.to_le_bytes()
}

/// Decodes a commit index from exactly 4 little-endian bytes.
///
/// # Errors
///
/// Returns [`CodecError::InvalidIndexLength`] for any other length.
pub fn decode_index(bytes: &[u8]) -> Result<u32, CodecError> {
    let raw: [u8; 4] =
        bytes.try_into().map_err(|_| CodecError::InvalidIndexLength { len: bytes.len() })?;
    Ok(u32::from_le_bytes(raw))
}

/// Encodes an ordered list of strings in the length-prefixed layout.
///
/// # Errors
///
/// Returns [`CodecError::LengthOverflow`] if the count or a record length
/// does not fit in a `u32`.
pub fn encode_string_list<S: AsRef<str>>(items: &[S]) -> Result<Vec<u8>, CodecError> {
    let payload: usize = items.iter().map(|s| LEN_PREFIX + s.as_ref().len()).sum();
    let mut out = Vec::with_capacity(LEN_PREFIX + payload);

    out.extend_from_slice(&len_prefix(items.len())?);
    for item in items {
        let bytes = item.as_ref().as_bytes();
        out.extend_from_slice(&len_prefix(bytes.len())?);
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

fn len_prefix(len: usize) -> Result<[u8; LEN_PREFIX], CodecError> {
    u32::try_from(len).map(u32::to_le_bytes).map_err(|_| CodecError::LengthOverflow { len })
}

/// Decodes a length-prefixed string list.
///
/// An empty payload decodes to an empty list.
///
/// # Errors
///
/// Returns [`CodecError::Truncated`] when a count, length or record runs
/// past the end of the payload, [`CodecError::TrailingBytes`] when bytes
/// remain after the last record, and [`CodecError::InvalidUtf8`] for a
/// record that is not UTF-8.
pub fn decode_string_list(data: &[u8]) -> Result<Vec<String>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = Reader { data, offset: 0 };
    let count = reader.read_u32()? as usize;

    // Each record needs at least its length prefix; cap the allocation so a
    // corrupt count cannot request gigabytes.
    let mut items = Vec::with_capacity(count.min(reader.remaining() / LEN_PREFIX));
    for _ in 0..count {
        let len = reader.read_u32()? as usize;
        let bytes = reader.take(len)?;
        items.push(String::from_utf8(bytes.to_vec())?);
    }

    match reader.remaining() {
        0 => Ok(items),
        count => Err(CodecError::TrailingBytes { count }),
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], CodecError> {
        let available = self.remaining();
        if needed > available {
            return Err(CodecError::Truncated { offset: self.offset, needed, available });
        }
        let slice = &self.data[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(LEN_PREFIX)?;
        decode_index(bytes)
    }
}
