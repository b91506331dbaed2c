//! Canonical CBOR encoder.

use std::cmp::Ordering;

use crate::error::{CodecError, CodecResult};
use crate::value::{compare_encoded, Value};
use crate::MAX_DEPTH;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;

const SIMPLE_FALSE: u8 = 0xf4;
const SIMPLE_TRUE: u8 = 0xf5;
const SIMPLE_NULL: u8 = 0xf6;

/// Encode a value to canonical CBOR bytes.
///
/// Output follows RFC 8949 Section 4.2.1: shortest-form integers and
/// lengths, definite lengths only, map keys sorted length-first then
/// bytewise.
///
/// The encoder writes values as they are and never reorders them, so
/// whatever it accepts decodes back to an equal value. Use
/// [`Value::canonicalize`] to bring a hand-built value into shape first.
///
/// # Errors
///
/// Returns [`CodecError::DuplicateKey`] if any map repeats a key, and
/// [`CodecError::EncodingFailed`] for map keys out of canonical order, an
/// [`Value::Unsigned`] that fits in `i64`, or nesting past [`MAX_DEPTH`].
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder writing into an owned buffer.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
    depth: usize,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            depth: 0,
        }
    }

    /// Append one value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::encoding_failed("nesting too deep"));
        }
        match value {
            Value::Null => self.buffer.push(SIMPLE_NULL),
            Value::Bool(b) => self.buffer.push(if *b { SIMPLE_TRUE } else { SIMPLE_FALSE }),
            Value::Integer(n) => self.write_integer(*n),
            Value::Unsigned(n) => {
                if i64::try_from(*n).is_ok() {
                    return Err(CodecError::encoding_failed(format!(
                        "unsigned {n} must be an Integer"
                    )));
                }
                self.write_head(MAJOR_UNSIGNED, *n);
            }
            Value::Bytes(b) => {
                self.write_head(MAJOR_BYTES, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.write_head(MAJOR_TEXT, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.write_head(MAJOR_ARRAY, items.len() as u64);
                self.nested(|e| items.iter().try_for_each(|item| e.encode(item)))?;
            }
            Value::Map(pairs) => self.nested(|e| e.write_map(pairs))?,
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn nested<F>(&mut self, f: F) -> CodecResult<()>
    where
        F: FnOnce(&mut Self) -> CodecResult<()>,
    {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_integer(&mut self, n: i64) {
        if n >= 0 {
            self.write_head(MAJOR_UNSIGNED, n as u64);
        } else {
            // -1 - n is in [0, i64::MAX] for every negative n
            self.write_head(MAJOR_NEGATIVE, (-1 - n) as u64);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_head(&mut self, major: u8, arg: u64) {
        let mt = major << 5;
        if arg < 24 {
            self.buffer.push(mt | arg as u8);
        } else if arg <= u64::from(u8::MAX) {
            self.buffer.extend_from_slice(&[mt | 24, arg as u8]);
        } else if arg <= u64::from(u16::MAX) {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(arg as u16).to_be_bytes());
        } else if arg <= u64::from(u32::MAX) {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(arg as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&arg.to_be_bytes());
        }
    }

    /// Keys are encoded at the map's own depth, as the decoder reads them.
    fn encode_key(&self, key: &Value) -> CodecResult<Vec<u8>> {
        let mut encoder = Self {
            buffer: Vec::new(),
            depth: self.depth,
        };
        encoder.encode(key)?;
        Ok(encoder.into_bytes())
    }

    fn write_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        let keys = pairs
            .iter()
            .map(|(key, _)| self.encode_key(key))
            .collect::<CodecResult<Vec<_>>>()?;

        for (i, w) in keys.windows(2).enumerate() {
            match compare_encoded(&w[0], &w[1]) {
                Ordering::Less => {}
                Ordering::Equal => {
                    return Err(CodecError::DuplicateKey {
                        key: format!("{:?}", pairs[i].0),
                    });
                }
                Ordering::Greater => {
                    return Err(CodecError::encoding_failed(format!(
                        "map key {:?} out of canonical order",
                        pairs[i + 1].0
                    )));
                }
            }
        }

        self.write_head(MAJOR_MAP, pairs.len() as u64);
        for (key_bytes, (_, value)) in keys.iter().zip(pairs) {
            self.buffer.extend_from_slice(key_bytes);
            self.encode(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(value: &Value) -> Vec<u8> {
        to_canonical_cbor(value).unwrap()
    }

    #[test]
    fn simple_values() {
        assert_eq!(enc(&Value::Null), vec![0xf6]);
        assert_eq!(enc(&Value::Bool(false)), vec![0xf4]);
        assert_eq!(enc(&Value::Bool(true)), vec![0xf5]);
    }

    #[test]
    fn integer_width_boundaries() {
        assert_eq!(enc(&Value::Integer(23)), vec![0x17]);
        assert_eq!(enc(&Value::Integer(24)), vec![0x18, 24]);
        assert_eq!(enc(&Value::Integer(256)), vec![0x19, 0x01, 0x00]);
        assert_eq!(enc(&Value::Integer(65536)), vec![0x1a, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(
            enc(&Value::Integer(i64::MAX)),
            vec![0x1b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn negative_integers() {
        assert_eq!(enc(&Value::Integer(-1)), vec![0x20]);
        assert_eq!(enc(&Value::Integer(-25)), vec![0x38, 24]);
        assert_eq!(
            enc(&Value::Integer(i64::MIN)),
            vec![0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn text_and_bytes() {
        assert_eq!(enc(&Value::Text("u1".into())), vec![0x62, b'u', b'1']);
        assert_eq!(enc(&Value::Bytes(vec![9, 8])), vec![0x42, 9, 8]);
    }

    #[test]
    fn unsorted_map_is_refused_not_reordered() {
        let unsorted = Value::Map(vec![
            (Value::Text("name".into()), Value::Integer(1)),
            (Value::Text("id".into()), Value::Integer(2)),
        ]);
        let err = to_canonical_cbor(&unsorted).unwrap_err();
        assert!(err.is_encode_side());
        assert!(err.to_string().contains("canonical order"));

        let bytes = enc(&unsorted.canonicalize());
        let sorted = Value::text_map([("id", Value::Integer(2)), ("name", Value::Integer(1))]);
        assert_eq!(bytes, enc(&sorted));
        assert_eq!(&bytes[..4], &[0xa2, 0x62, b'i', b'd']);
    }

    #[test]
    fn unsorted_map_inside_sorted_map_is_refused() {
        let inner = Value::Map(vec![
            (Value::Text("zz".into()), Value::Null),
            (Value::Text("a".into()), Value::Null),
        ]);
        let outer = Value::text_map([("m", inner)]);
        assert!(to_canonical_cbor(&outer).is_err());
        assert!(to_canonical_cbor(&outer.canonicalize()).is_ok());
    }

    #[test]
    fn unsigned_above_i64_range() {
        assert_eq!(
            enc(&Value::Unsigned(i64::MAX as u64 + 1)),
            vec![0x1b, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            enc(&Value::Unsigned(u64::MAX)),
            vec![0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn small_unsigned_is_refused() {
        // decoding 5 yields Integer(5), so Unsigned(5) could not round-trip
        let err = to_canonical_cbor(&Value::Unsigned(5)).unwrap_err();
        assert!(err.is_encode_side());
        assert_eq!(Value::Unsigned(5).canonicalize(), Value::Integer(5));
    }

    fn nest(levels: usize) -> Value {
        (0..levels).fold(Value::Null, |inner, _| Value::Array(vec![inner]))
    }

    #[test]
    fn nesting_limit_matches_decoder() {
        let deepest = nest(MAX_DEPTH - 1);
        let bytes = enc(&deepest);
        assert_eq!(crate::from_cbor(&bytes).unwrap(), deepest);

        let err = to_canonical_cbor(&nest(MAX_DEPTH)).unwrap_err();
        assert_eq!(err, CodecError::encoding_failed("nesting too deep"));
        assert!(to_canonical_cbor(&nest(1_000)).is_err());
    }

    #[test]
    fn nesting_limit_counts_map_keys() {
        let key = nest(MAX_DEPTH - 1);
        let map = Value::Map(vec![(key, Value::Null)]);
        assert!(to_canonical_cbor(&map).is_err());
    }

    #[test]
    fn duplicate_keys_are_unrepresentable() {
        let map = Value::Map(vec![
            (Value::Text("id".into()), Value::Integer(1)),
            (Value::Text("id".into()), Value::Integer(2)),
        ]);
        assert!(matches!(
            to_canonical_cbor(&map),
            Err(CodecError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn nested_duplicate_keys_are_caught() {
        let inner = Value::Map(vec![
            (Value::Integer(1), Value::Null),
            (Value::Integer(1), Value::Bool(true)),
        ]);
        let outer = Value::Array(vec![Value::Null, inner]);
        assert!(to_canonical_cbor(&outer).is_err());
    }
}
