//! Fixed-width numeric and string-list encoding used in reply payloads.
//!
//! Sensor nodes transmit every multi-byte value least-significant byte first,
//! independent of the host. All conversions go through `to_le_bytes` /
//! `from_le_bytes` so host order never leaks into the wire format.

use crate::error::ProbeError;

pub const U64_WIDTH: usize = 8;
pub const F32_WIDTH: usize = 4;
pub const F64_WIDTH: usize = 8;

/// Separator between strings in a path listing.
pub const NULL_DELIMITER: u8 = 0x00;

pub fn encode_u64_le(value: u64) -> [u8; U64_WIDTH] {
    value.to_le_bytes()
}

pub fn encode_f32_le(value: f32) -> [u8; F32_WIDTH] {
    value.to_le_bytes()
}

pub fn encode_f64_le(value: f64) -> [u8; F64_WIDTH] {
    value.to_le_bytes()
}

/// Borrow exactly `N` bytes at `offset`, or fail with `MalformedPayload`.
fn fixed<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N], ProbeError> {
    let end = offset
        .checked_add(N)
        .ok_or_else(|| ProbeError::MalformedPayload("offset overflow".into()))?;
    let slice = bytes.get(offset..end).ok_or_else(|| {
        ProbeError::MalformedPayload(format!(
            "need {} bytes at offset {}, payload has {}",
            N,
            offset,
            bytes.len()
        ))
    })?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

pub fn decode_u64_le(bytes: &[u8], offset: usize) -> Result<u64, ProbeError> {
    fixed::<U64_WIDTH>(bytes, offset).map(u64::from_le_bytes)
}

pub fn decode_f32_le(bytes: &[u8], offset: usize) -> Result<f32, ProbeError> {
    fixed::<F32_WIDTH>(bytes, offset).map(f32::from_le_bytes)
}

pub fn decode_f64_le(bytes: &[u8], offset: usize) -> Result<f64, ProbeError> {
    fixed::<F64_WIDTH>(bytes, offset).map(f64::from_le_bytes)
}

/// Split a 0x00-delimited listing into strings.
///
/// Empty segments are dropped, so leading, trailing and doubled delimiters
/// are harmless. Invalid UTF-8 is replaced rather than rejected; this never fails.
pub fn split_null_delimited(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|b| *b == NULL_DELIMITER)
        .filter(|segment| !segment.is_empty())
        .map(|segment| String::from_utf8_lossy(segment).into_owned())
        .collect()
}

/// Inverse of [`split_null_delimited`] for non-empty strings without NULs.
pub fn join_null_delimited<S: AsRef<str>>(items: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(NULL_DELIMITER);
        }
        out.extend_from_slice(item.as_ref().as_bytes());
    }
    out
}
