//! Session payload test vectors.
//!
//! The vectors pin the exact bytes a session is stored as, so any other
//! implementation writing sessions into the same store can check itself
//! against them.

use std::collections::BTreeMap;

use relay_protocol::{Session, Value};
use serde::{Deserialize, Serialize};

const SESSION_PAYLOADS: &str = include_str!("../vectors/session_payloads.json");

/// A field value in JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorValue {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Text.
    Text(String),
    /// Byte string, hex-encoded.
    BytesHex(String),
    /// Array.
    Array(Vec<VectorValue>),
}

impl VectorValue {
    /// Converts to a codec value.
    pub fn to_value(&self) -> Value {
        match self {
            VectorValue::Null => Value::Null,
            VectorValue::Bool(b) => Value::Bool(*b),
            VectorValue::Int(n) => Value::Integer(*n),
            VectorValue::Text(s) => Value::Text(s.clone()),
            VectorValue::BytesHex(h) => Value::Bytes(hex_decode(h).unwrap_or_default()),
            VectorValue::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }
}

/// One session field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorField {
    /// Field name.
    pub key: String,
    /// Field value.
    pub value: VectorValue,
}

/// A session and its expected stored payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Session id.
    pub session_id: String,
    /// Session fields.
    pub fields: Vec<VectorField>,
    /// Expected payload bytes (hex-encoded).
    pub payload_hex: String,
}

impl SessionVector {
    /// Builds the session described by the vector.
    pub fn session(&self) -> Session {
        let data: BTreeMap<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.key.clone(), f.value.to_value()))
            .collect();
        Session {
            id: self.session_id.clone(),
            data,
        }
    }

    /// Expected payload bytes.
    pub fn payload(&self) -> Vec<u8> {
        hex_decode(&self.payload_hex).unwrap_or_default()
    }
}

/// A file of session vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionVectorFile {
    /// Type identifier every payload is tagged with.
    pub type_url: String,
    /// The vectors.
    pub vectors: Vec<SessionVector>,
}

/// Loads the bundled session payload vectors.
pub fn session_vectors() -> SessionVectorFile {
    serde_json::from_str(SESSION_PAYLOADS).expect("bundled vectors must parse")
}

/// Hex-encodes bytes.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Hex-decodes a string, or `None` if it is not valid hex.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}
