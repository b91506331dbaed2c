//! The session entity carried through the relay.

use std::collections::BTreeMap;

use relay_codec::{from_cbor, to_canonical_cbor, CodecError, CodecResult, Decode, Encode, Value};

use crate::any::{Any, TypedMessage};
use crate::fields::Fields;

/// Type identifier under which sessions are stored.
pub const SESSION_TYPE_URL: &str = "type.relay.dev/relay.session.Session";

/// A session record.
///
/// Only `id` has meaning to the relay. Everything else lives in `data`
/// and is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    /// Identifier, unique among sessions.
    pub id: String,
    /// Caller-defined fields.
    pub data: BTreeMap<String, Value>,
}

impl Session {
    /// Creates a session with no fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: BTreeMap::new(),
        }
    }

    /// Sets a field, returning the session.
    ///
    /// The value is stored in canonical form (see [`Value::canonicalize`]),
    /// so the session decodes back equal to itself. Values written to
    /// `data` directly must already be canonical or encoding fails.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into().canonicalize());
        self
    }

    /// Looks up a field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Builds the CBOR value form.
    pub fn to_value(&self) -> CodecResult<Value> {
        if self.id.is_empty() {
            return Err(CodecError::encoding_failed("session id must not be empty"));
        }
        Ok(Value::text_map([
            ("id", Value::Text(self.id.clone())),
            ("data", Value::text_map(self.data.clone())),
        ]))
    }

    /// Rebuilds a session from its CBOR value form.
    pub fn from_value(value: &Value) -> CodecResult<Self> {
        let fields = Fields::of("session", value)?;

        let id = fields.text("id")?;
        if id.is_empty() {
            return Err(CodecError::decoding_failed("session: empty id"));
        }

        let raw = fields
            .get("data")
            .map(|v| {
                v.as_map()
                    .ok_or_else(|| CodecError::decoding_failed("session: data is not a map"))
            })
            .transpose()?
            .unwrap_or_default();

        let mut data = BTreeMap::new();
        for (key, value) in raw {
            let key = key
                .as_text()
                .ok_or_else(|| CodecError::decoding_failed("session: non-text field name"))?;
            data.insert(key.to_string(), value.clone());
        }

        Ok(Self {
            id: id.to_string(),
            data,
        })
    }

    /// Encodes the session as a type-tagged record payload.
    pub fn to_payload(&self) -> CodecResult<Vec<u8>> {
        Any::pack(self)?.encode()
    }

    /// Decodes a record payload, checking its type tag.
    pub fn from_payload(bytes: &[u8]) -> CodecResult<Self> {
        Any::decode(bytes)?.unpack()
    }
}

impl TypedMessage for Session {
    const TYPE_URL: &'static str = SESSION_TYPE_URL;
}

impl Encode for Session {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(&self.to_value()?)
    }
}

impl Decode for Session {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        Self::from_value(&from_cbor(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Session {
        Session::new("u1")
            .with_field("name", "alice")
            .with_field("expires_at", 1_700_000_000i64)
            .with_field("claims", Value::text_map([("groups", Value::from(vec![Value::from("admin")]))]))
    }

    #[test]
    fn payload_roundtrip() {
        let session = alice();
        let payload = session.to_payload().unwrap();
        assert_eq!(Session::from_payload(&payload).unwrap(), session);
    }

    #[test]
    fn session_without_fields_roundtrips() {
        let session = Session::new("bare");
        assert_eq!(Session::decode(&session.encode().unwrap()).unwrap(), session);
    }

    #[test]
    fn empty_id_cannot_be_encoded() {
        let err = Session::default().to_payload().unwrap_err();
        assert!(err.is_encode_side());
    }

    #[test]
    fn duplicate_nested_keys_cannot_be_encoded() {
        let broken = Value::Map(vec![
            (Value::from("k"), Value::Null),
            (Value::from("k"), Value::Null),
        ]);
        let session = Session::new("u1").with_field("bad", broken);
        assert!(matches!(
            session.to_payload(),
            Err(CodecError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn unsorted_field_map_is_stored_canonical() {
        let unsorted = Value::Map(vec![
            (Value::from("zz"), Value::Null),
            (Value::from("a"), Value::Null),
        ]);
        let session = Session::new("u1").with_field("m", unsorted.clone());
        assert_eq!(session.field("m"), Some(&unsorted.clone().canonicalize()));
        let payload = session.to_payload().unwrap();
        assert_eq!(Session::from_payload(&payload).unwrap(), session);

        let mut raw = Session::new("u1");
        raw.data.insert("m".into(), unsorted);
        assert!(raw.to_payload().unwrap_err().is_encode_side());
    }

    #[test]
    fn too_deep_field_cannot_be_encoded() {
        let deep = (0..200).fold(Value::Null, |inner, _| Value::Array(vec![inner]));
        let session = Session::new("u1").with_field("deep", deep);
        assert_eq!(
            session.to_payload(),
            Err(CodecError::encoding_failed("nesting too deep"))
        );
    }

    #[test]
    fn field_at_the_depth_limit_roundtrips() {
        // the session map and its data map take two levels
        let levels = relay_codec::MAX_DEPTH - 3;
        let deep = (0..levels).fold(Value::Null, |inner, _| Value::Array(vec![inner]));
        let session = Session::new("u1").with_field("deep", deep);
        let payload = session.to_payload().unwrap();
        assert_eq!(Session::from_payload(&payload).unwrap(), session);
    }

    #[test]
    fn payload_from_other_type_is_rejected() {
        let foreign = Any::new("type.relay.dev/relay.user.User", alice().encode().unwrap());
        let bytes = foreign.encode().unwrap();
        assert!(matches!(
            Session::from_payload(&bytes),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(Session::from_payload(b"not cbor at all").is_err());
        assert!(Session::from_payload(&[]).is_err());
    }

    #[test]
    fn missing_data_decodes_as_empty() {
        let value = Value::text_map([("id", Value::from("u2"))]);
        let session = Session::from_value(&value).unwrap();
        assert_eq!(session, Session::new("u2"));
    }

    #[test]
    fn non_text_field_names_rejected() {
        let value = Value::text_map([
            ("id", Value::from("u2")),
            ("data", Value::map(vec![(Value::Integer(1), Value::Null)])),
        ]);
        assert!(Session::from_value(&value).is_err());
    }
}
