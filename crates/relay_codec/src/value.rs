//! Dynamic value model for caller-defined session fields.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::encoder::to_canonical_cbor;
use crate::MAX_DEPTH;

/// A dynamic CBOR value.
///
/// Session fields the relay does not interpret are carried as `Value`s.
/// There is no float variant: floats have no single canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Unsigned integer above `i64::MAX`.
    ///
    /// Smaller unsigned values are [`Value::Integer`]; the encoder refuses
    /// them here. [`Value::from`] on a `u64` picks the right variant.
    Unsigned(u64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// UTF-8 text string.
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of key-value pairs in canonical key order.
    ///
    /// The encoder refuses pairs in any other order. Build maps with
    /// [`Value::map`] or repair them with [`Value::canonicalize`].
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Create a map value with keys in canonical order.
    ///
    /// Only the top level is sorted; nested values are taken as given.
    pub fn map(mut pairs: Vec<(Value, Value)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp_canonical(&b.0));
        Value::Map(pairs)
    }

    /// Create a map keyed by text from any iterator of string pairs.
    pub fn text_map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Text(k.into()), v))
                .collect(),
        )
    }

    /// Compare two values by their canonical encoding.
    ///
    /// Canonical order is length-first, then bytewise, over the encoded form.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let a = to_canonical_cbor(self).unwrap_or_default();
        let b = to_canonical_cbor(other).unwrap_or_default();
        compare_encoded(&a, &b)
    }

    /// Rewrite this value into the form the encoder accepts.
    ///
    /// Sorts every map by canonical key order and turns each
    /// [`Value::Unsigned`] that fits in `i64` into a [`Value::Integer`].
    /// Duplicate keys are kept, so encoding still reports them. Nesting
    /// past [`MAX_DEPTH`] is left alone; it cannot be encoded either way.
    #[must_use]
    pub fn canonicalize(self) -> Self {
        self.canonicalize_at(0)
    }

    fn canonicalize_at(self, depth: usize) -> Self {
        if depth >= MAX_DEPTH {
            return self;
        }
        match self {
            Value::Unsigned(n) => Value::from(n),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| item.canonicalize_at(depth + 1))
                    .collect(),
            ),
            Value::Map(pairs) => Value::map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.canonicalize_at(depth + 1), v.canonicalize_at(depth + 1)))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as an unsigned integer, if it is a non-negative one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(n) => u64::try_from(*n).ok(),
            Value::Unsigned(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a text key in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }
}

/// Length-first, then bytewise.
pub(crate) fn compare_encoded(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Value::Unsigned(n), Value::Integer)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::text_map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
