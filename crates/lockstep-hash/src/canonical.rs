//! The canonical byte encoding.
//!
//! Exactly one encoding is used for everything that is hashed. Layout rules
//! (format version [`CANONICAL_FORMAT_VERSION`]):
//!
//! 1. Integers are fixed width, big-endian (`u8`, `u32`, `u64`, `i64`, `i128`).
//! 2. `bool` is one byte, `0` or `1`.
//! 3. Strings and byte strings are a `u32` length followed by the bytes.
//!    Strings must be valid UTF-8.
//! 4. Sequences are a `u32` count followed by the elements in order.
//! 5. Maps and sets are a `u32` count followed by entries in strictly
//!    ascending key order. Decoding rejects unsorted or duplicate keys.
//! 6. `Option` is a tag byte (`0` = none, `1` = some) followed by the value.
//! 7. Decimals are normalized, then written as `i128` mantissa and `u32`
//!    scale. There is no floating point anywhere in the format.
//! 8. Struct fields are written in declaration order; enum variants are a
//!    one-byte tag fixed by the type's `Canonical` impl.
//!
//! Because the decoder enforces every rule, a byte string decodes if and only
//! if it is the canonical encoding of the decoded value.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use crate::digest::{DIGEST_LEN, Digest};

/// Version of the canonical byte layout.
pub const CANONICAL_FORMAT_VERSION: u32 = 1;

/// Errors raised while encoding or decoding canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonicalError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input at offset {offset}: needed {needed} more bytes")]
    UnexpectedEnd {
        /// Byte offset where the read started.
        offset: usize,
        /// Number of bytes that were missing.
        needed: usize,
    },

    /// An enum tag did not match any variant.
    #[error("unknown {kind} tag {tag} at offset {offset}")]
    UnknownTag {
        /// Name of the type being decoded.
        kind: &'static str,
        /// The tag byte found.
        tag: u8,
        /// Byte offset of the tag.
        offset: usize,
    },

    /// Map or set keys were not strictly ascending.
    #[error("{kind} keys out of canonical order at offset {offset}")]
    UnsortedKeys {
        /// Kind of collection.
        kind: &'static str,
        /// Byte offset of the offending key.
        offset: usize,
    },

    /// A length or count does not fit the format.
    #[error("length {len} exceeds the canonical limit")]
    LengthOverflow {
        /// The length that was rejected.
        len: u64,
    },

    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the string body.
        offset: usize,
    },

    /// Bytes remained after the top-level value was decoded.
    #[error("{count} trailing bytes after canonical value")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// A value is representable but not canonical (for example a
    /// non-normalized decimal or an out-of-range field).
    #[error("non-canonical value for {field}: {reason}")]
    InvalidValue {
        /// The field or type being checked.
        field: &'static str,
        /// Explanation of the violation.
        reason: String,
    },
}

/// A type with a canonical byte encoding.
pub trait Canonical: Sized {
    /// Append the canonical encoding of `self` to `enc`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the value cannot be represented in the
    /// canonical format.
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError>;

    /// Read one value from `dec`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the bytes are not a canonical encoding.
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError>;
}

/// Encode a value to a fresh byte vector.
///
/// # Errors
///
/// Returns [`CanonicalError`] if the value cannot be encoded.
pub fn to_canonical_bytes<T: Canonical>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let mut enc = Encoder::new();
    value.encode(&mut enc)?;
    Ok(enc.into_bytes())
}

/// Decode a value that must span the whole of `bytes`.
///
/// # Errors
///
/// Returns [`CanonicalError`] if the bytes are malformed, non-canonical, or
/// have trailing data.
pub fn from_canonical_bytes<T: Canonical>(bytes: &[u8]) -> Result<T, CanonicalError> {
    let mut dec = Decoder::new(bytes);
    let value = T::decode(&mut dec)?;
    dec.finish()?;
    Ok(value)
}

/// Append-only canonical byte writer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Create an empty encoder.
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consume the encoder and return the bytes written.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Number of bytes written so far.
    pub const fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub const fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write one byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a big-endian `u32`.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian `u64`.
    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian `i64`.
    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian `i128`.
    pub fn put_i128(&mut self, value: i128) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a boolean as `0` or `1`.
    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Write a `u32` length or count.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::LengthOverflow`] if `len` exceeds `u32::MAX`.
    pub fn put_len(&mut self, len: usize) -> Result<(), CanonicalError> {
        let len = u32::try_from(len).map_err(|_err| CanonicalError::LengthOverflow {
            len: u64::try_from(len).unwrap_or(u64::MAX),
        })?;
        self.put_u32(len);
        Ok(())
    }

    /// Write a length-prefixed byte string.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::LengthOverflow`] if the slice is too long.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), CanonicalError> {
        self.put_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::LengthOverflow`] if the string is too long.
    pub fn put_str(&mut self, value: &str) -> Result<(), CanonicalError> {
        self.put_bytes(value.as_bytes())
    }

    /// Write raw bytes with no length prefix (fixed-size fields only).
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a decimal as normalized `(mantissa, scale)`.
    pub fn put_decimal(&mut self, value: Decimal) {
        let normalized = value.normalize();
        self.put_i128(normalized.mantissa());
        self.put_u32(normalized.scale());
    }

    /// Write a counted sequence.
    ///
    /// # Errors
    ///
    /// Propagates element encoding errors.
    pub fn put_seq<T: Canonical>(&mut self, items: &[T]) -> Result<(), CanonicalError> {
        self.put_len(items.len())?;
        for item in items {
            item.encode(self)?;
        }
        Ok(())
    }
}

/// Canonical byte reader with strict validation.
#[derive(Debug)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    /// Start reading at the beginning of `bytes`.
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Current read offset.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Number of unread bytes.
    pub const fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    /// Fail unless every byte has been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::TrailingBytes`] if input remains.
    pub const fn finish(&self) -> Result<(), CanonicalError> {
        let count = self.remaining();
        if count == 0 {
            Ok(())
        } else {
            Err(CanonicalError::TrailingBytes { count })
        }
    }

    /// Take the next `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::UnexpectedEnd`] if fewer than `n` remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CanonicalError> {
        let start = self.offset;
        let end = start.checked_add(n).ok_or(CanonicalError::LengthOverflow {
            len: u64::try_from(n).unwrap_or(u64::MAX),
        })?;
        let slice = self
            .bytes
            .get(start..end)
            .ok_or(CanonicalError::UnexpectedEnd {
                offset: start,
                needed: end.saturating_sub(self.bytes.len()),
            })?;
        self.offset = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CanonicalError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Read one byte.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::UnexpectedEnd`] at end of input.
    pub fn get_u8(&mut self) -> Result<u8, CanonicalError> {
        Ok(u8::from_be_bytes(self.take_array::<1>()?))
    }

    /// Read a big-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::UnexpectedEnd`] at end of input.
    pub fn get_u32(&mut self) -> Result<u32, CanonicalError> {
        Ok(u32::from_be_bytes(self.take_array::<4>()?))
    }

    /// Read a big-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::UnexpectedEnd`] at end of input.
    pub fn get_u64(&mut self) -> Result<u64, CanonicalError> {
        Ok(u64::from_be_bytes(self.take_array::<8>()?))
    }

    /// Read a big-endian `i64`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::UnexpectedEnd`] at end of input.
    pub fn get_i64(&mut self) -> Result<i64, CanonicalError> {
        Ok(i64::from_be_bytes(self.take_array::<8>()?))
    }

    /// Read a big-endian `i128`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::UnexpectedEnd`] at end of input.
    pub fn get_i128(&mut self) -> Result<i128, CanonicalError> {
        Ok(i128::from_be_bytes(self.take_array::<16>()?))
    }

    /// Read a boolean, rejecting bytes other than `0` and `1`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::InvalidValue`] for any other byte.
    pub fn get_bool(&mut self) -> Result<bool, CanonicalError> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CanonicalError::InvalidValue {
                field: "bool",
                reason: format!("byte {other} is not 0 or 1"),
            }),
        }
    }

    /// Read a `u32` length or count.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] at end of input.
    pub fn get_len(&mut self) -> Result<usize, CanonicalError> {
        let len = self.get_u32()?;
        usize::try_from(len).map_err(|_err| CanonicalError::LengthOverflow {
            len: u64::from(len),
        })
    }

    /// Read a length-prefixed byte string.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the input is truncated.
    pub fn get_bytes(&mut self) -> Result<&'a [u8], CanonicalError> {
        let len = self.get_len()?;
        self.take(len)
    }

    /// Read a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::InvalidUtf8`] if the body is not UTF-8.
    pub fn get_str(&mut self) -> Result<String, CanonicalError> {
        let bytes = self.get_bytes()?;
        let offset = self.offset.saturating_sub(bytes.len());
        core::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_err| CanonicalError::InvalidUtf8 { offset })
    }

    /// Read a normalized decimal.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::InvalidValue`] if the scale is out of range
    /// or the value is not in normalized form.
    pub fn get_decimal(&mut self) -> Result<Decimal, CanonicalError> {
        let mantissa = self.get_i128()?;
        let scale = self.get_u32()?;
        let value = Decimal::try_from_i128_with_scale(mantissa, scale).map_err(|err| {
            CanonicalError::InvalidValue {
                field: "decimal",
                reason: err.to_string(),
            }
        })?;
        let normalized = value.normalize();
        if normalized.mantissa() != mantissa || normalized.scale() != scale {
            return Err(CanonicalError::InvalidValue {
                field: "decimal",
                reason: format!("{value} is not normalized"),
            });
        }
        Ok(value)
    }

    /// Read a counted sequence.
    ///
    /// # Errors
    ///
    /// Propagates element decoding errors.
    pub fn get_seq<T: Canonical>(&mut self) -> Result<Vec<T>, CanonicalError> {
        let count = self.get_len()?;
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Primitive impls
// ---------------------------------------------------------------------------

impl Canonical for u8 {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_u8(*self);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        dec.get_u8()
    }
}

impl Canonical for u32 {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_u32(*self);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        dec.get_u32()
    }
}

impl Canonical for u64 {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_u64(*self);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        dec.get_u64()
    }
}

impl Canonical for i64 {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_i64(*self);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        dec.get_i64()
    }
}

impl Canonical for bool {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_bool(*self);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        dec.get_bool()
    }
}

impl Canonical for String {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_str(self)
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        dec.get_str()
    }
}

impl Canonical for Decimal {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_decimal(*self);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        dec.get_decimal()
    }
}

impl Canonical for Digest {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_raw(self.as_bytes());
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        let bytes = dec.take_array::<DIGEST_LEN>()?;
        Ok(Self::from_bytes(bytes))
    }
}

impl<T: Canonical> Canonical for Option<T> {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        match self {
            None => {
                enc.put_u8(0);
                Ok(())
            }
            Some(value) => {
                enc.put_u8(1);
                value.encode(enc)
            }
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        let offset = dec.offset();
        match dec.get_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(dec)?)),
            tag => Err(CanonicalError::UnknownTag {
                kind: "option",
                tag,
                offset,
            }),
        }
    }
}

impl<A: Canonical, B: Canonical> Canonical for (A, B) {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        self.0.encode(enc)?;
        self.1.encode(enc)
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        let a = A::decode(dec)?;
        let b = B::decode(dec)?;
        Ok((a, b))
    }
}

impl<T: Canonical> Canonical for Vec<T> {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_seq(self)
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        dec.get_seq()
    }
}

impl<K: Canonical + Ord, V: Canonical> Canonical for BTreeMap<K, V> {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_len(self.len())?;
        // BTreeMap iterates in ascending key order.
        for (key, value) in self {
            key.encode(enc)?;
            value.encode(enc)?;
        }
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        let count = dec.get_len()?;
        let mut map = Self::new();
        for _ in 0..count {
            let offset = dec.offset();
            let key = K::decode(dec)?;
            if map.last_key_value().is_some_and(|(last, _)| key <= *last) {
                return Err(CanonicalError::UnsortedKeys { kind: "map", offset });
            }
            let value = V::decode(dec)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<T: Canonical + Ord> Canonical for BTreeSet<T> {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_len(self.len())?;
        for item in self {
            item.encode(enc)?;
        }
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        let count = dec.get_len()?;
        let mut set = Self::new();
        for _ in 0..count {
            let offset = dec.offset();
            let item = T::decode(dec)?;
            if set.last().is_some_and(|last| item <= *last) {
                return Err(CanonicalError::UnsortedKeys { kind: "set", offset });
            }
            set.insert(item);
        }
        Ok(set)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        assert_eq!(to_canonical_bytes(&0x0102_0304_u32).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(
            to_canonical_bytes(&-2_i64).unwrap(),
            vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]
        );
    }

    #[test]
    fn strings_are_length_prefixed() {
        let bytes = to_canonical_bytes(&"hi".to_owned()).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 2, b'h', b'i']);
    }

    #[test]
    fn map_encoding_is_sorted_regardless_of_insertion() {
        let mut a = BTreeMap::new();
        a.insert(3_u64, true);
        a.insert(1_u64, false);
        let mut b = BTreeMap::new();
        b.insert(1_u64, false);
        b.insert(3_u64, true);
        assert_eq!(to_canonical_bytes(&a).unwrap(), to_canonical_bytes(&b).unwrap());
    }

    #[test]
    fn decoder_rejects_unsorted_map() {
        let mut enc = Encoder::new();
        enc.put_u32(2);
        enc.put_u64(5);
        enc.put_bool(true);
        enc.put_u64(4);
        enc.put_bool(false);
        let err = from_canonical_bytes::<BTreeMap<u64, bool>>(&enc.into_bytes()).unwrap_err();
        assert!(matches!(err, CanonicalError::UnsortedKeys { kind: "map", .. }));
    }

    #[test]
    fn decoder_rejects_duplicate_set_items() {
        let mut enc = Encoder::new();
        enc.put_u32(2);
        enc.put_u64(7);
        enc.put_u64(7);
        let err = from_canonical_bytes::<BTreeSet<u64>>(&enc.into_bytes()).unwrap_err();
        assert!(matches!(err, CanonicalError::UnsortedKeys { kind: "set", .. }));
    }

    #[test]
    fn decoder_rejects_trailing_bytes() {
        let err = from_canonical_bytes::<u8>(&[1, 2]).unwrap_err();
        assert_eq!(err, CanonicalError::TrailingBytes { count: 1 });
    }

    #[test]
    fn decoder_reports_truncation() {
        let err = from_canonical_bytes::<u64>(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, CanonicalError::UnexpectedEnd { offset: 0, .. }));
    }

    #[test]
    fn decimals_normalize_before_encoding() {
        let a = Decimal::new(1500, 3); // 1.500
        let b = Decimal::new(15, 1); // 1.5
        assert_eq!(to_canonical_bytes(&a).unwrap(), to_canonical_bytes(&b).unwrap());
        let back: Decimal = from_canonical_bytes(&to_canonical_bytes(&a).unwrap()).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn decoder_rejects_unnormalized_decimal() {
        let mut enc = Encoder::new();
        enc.put_i128(1500);
        enc.put_u32(3);
        let err = from_canonical_bytes::<Decimal>(&enc.into_bytes()).unwrap_err();
        assert!(matches!(err, CanonicalError::InvalidValue { field: "decimal", .. }));
    }

    #[test]
    fn bool_must_be_zero_or_one() {
        assert!(from_canonical_bytes::<bool>(&[2]).is_err());
        assert!(from_canonical_bytes::<bool>(&[1]).unwrap());
    }

    #[test]
    fn option_tags() {
        assert_eq!(to_canonical_bytes(&None::<u8>).unwrap(), vec![0]);
        assert_eq!(to_canonical_bytes(&Some(9_u8)).unwrap(), vec![1, 9]);
        assert!(from_canonical_bytes::<Option<u8>>(&[3, 9]).is_err());
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = from_canonical_bytes::<String>(&[0, 0, 0, 1, 0xff]).unwrap_err();
        assert!(matches!(err, CanonicalError::InvalidUtf8 { .. }));
    }
}
