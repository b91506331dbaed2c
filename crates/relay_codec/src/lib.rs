//! # Relay Codec
//!
//! Canonical CBOR encoding for payloads carried through the session relay.
//!
//! Records in the generic store hold opaque bytes. This crate defines the
//! byte form the relay writes there:
//! - Identical values produce identical bytes
//! - Decoding accepts only canonical input, so a corrupt or foreign
//!   payload is reported instead of silently reinterpreted
//! - `decode(encode(v)) == v` for every value the encoder accepts; values
//!   with out-of-order map keys, non-canonical integers or nesting past
//!   [`MAX_DEPTH`] are refused rather than rewritten
//!
//! ## Usage
//!
//! ```
//! use relay_codec::{from_cbor, to_canonical_cbor, Value};
//!
//! let value = Value::text_map([("name", Value::from("alice"))]);
//! let bytes = to_canonical_cbor(&value).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;

/// Deepest container nesting either direction accepts.
///
/// A value at depth `MAX_DEPTH` (inside that many arrays or maps) is
/// rejected by the encoder and the decoder alike.
pub const MAX_DEPTH: usize = 128;

/// Types with a canonical CBOR form.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Types that can be rebuilt from canonical CBOR.
pub trait Decode: Sized {
    /// Decode a value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            ((i64::MAX as u64 + 1)..=u64::MAX).prop_map(Value::Unsigned),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
            "[a-z0-9 ]{0,12}".prop_map(Value::Text),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(Value::from),
            ]
        })
    }

    /// Independent decode with ciborium to check the bytes are plain CBOR.
    fn ciborium_roundtrip(bytes: &[u8]) -> ciborium::value::Value {
        ciborium::de::from_reader(bytes).unwrap()
    }

    #[test]
    fn bytes_are_readable_by_a_general_cbor_decoder() {
        let value = Value::text_map([
            ("id", Value::from("u1")),
            ("count", Value::Integer(-7)),
            ("tags", Value::Array(vec![Value::from("a"), Value::Null])),
        ]);
        let bytes = to_canonical_cbor(&value).unwrap();

        let generic = ciborium_roundtrip(&bytes);
        let map = generic.as_map().unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map[0].0.as_text(), Some("id"));
        assert_eq!(map[0].1.as_text(), Some("u1"));
    }

    #[test]
    fn ciborium_output_for_sorted_map_is_accepted() {
        let generic = ciborium::value::Value::Map(vec![
            (
                ciborium::value::Value::Text("a".into()),
                ciborium::value::Value::Integer(1.into()),
            ),
            (
                ciborium::value::Value::Text("bb".into()),
                ciborium::value::Value::Bool(false),
            ),
        ]);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&generic, &mut bytes).unwrap();

        let decoded = from_cbor(&bytes).unwrap();
        assert_eq!(decoded.get("a"), Some(&Value::Integer(1)));
        assert_eq!(decoded.get("bb"), Some(&Value::Bool(false)));
    }

    #[test]
    fn full_unsigned_range_matches_a_general_cbor_decoder() {
        let bytes = to_canonical_cbor(&Value::Unsigned(u64::MAX)).unwrap();
        let n: u64 = ciborium_roundtrip(&bytes)
            .as_integer()
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(n, u64::MAX);

        let generic = ciborium::value::Value::Integer((i64::MAX as u64 + 1).into());
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&generic, &mut bytes).unwrap();
        assert_eq!(from_cbor(&bytes).unwrap(), Value::Unsigned(i64::MAX as u64 + 1));
    }

    proptest! {
        #[test]
        fn roundtrip_law(value in value_strategy()) {
            let bytes = value.encode().unwrap();
            prop_assert_eq!(Value::decode(&bytes).unwrap(), value);
        }

        #[test]
        fn encoding_is_deterministic(value in value_strategy()) {
            prop_assert_eq!(value.encode().unwrap(), value.encode().unwrap());
        }
    }
}
