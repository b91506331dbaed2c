//! Type-tagged payload envelope.

use relay_codec::{
    from_cbor, to_canonical_cbor, CodecError, CodecResult, Decode, Encode, Value,
};

use crate::fields::Fields;

/// A message type with a statically declared type identifier.
pub trait TypedMessage {
    /// Identifier stored alongside the encoded message.
    const TYPE_URL: &'static str;
}

/// An encoded message together with the identifier of its type.
///
/// This is the byte form of every record payload written by the relay:
/// the store sees opaque bytes, and the tag lets readers refuse payloads
/// of the wrong type instead of misreading them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Any {
    /// Type identifier of `value`.
    pub type_url: String,
    /// Canonical CBOR encoding of the message.
    pub value: Vec<u8>,
}

impl Any {
    /// Creates an envelope from raw parts.
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }

    /// Encodes `message` and tags it with its type.
    pub fn pack<T: TypedMessage + Encode>(message: &T) -> CodecResult<Self> {
        Ok(Self::new(T::TYPE_URL, message.encode()?))
    }

    /// Returns true if the envelope holds a `T`.
    pub fn is<T: TypedMessage>(&self) -> bool {
        self.type_url == T::TYPE_URL
    }

    /// Decodes the message, failing if the tag does not match `T`.
    pub fn unpack<T: TypedMessage + Decode>(&self) -> CodecResult<T> {
        if !self.is::<T>() {
            return Err(CodecError::type_mismatch(T::TYPE_URL, self.type_url.clone()));
        }
        T::decode(&self.value)
    }
}

impl Encode for Any {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(&Value::text_map([
            ("type_url", Value::Text(self.type_url.clone())),
            ("value", Value::Bytes(self.value.clone())),
        ]))
    }
}

impl Decode for Any {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let value = from_cbor(bytes)?;
        let fields = Fields::of("any", &value)?;
        Ok(Self {
            type_url: fields.text("type_url")?.to_string(),
            value: fields.bytes("value")?.to_vec(),
        })
    }
}
