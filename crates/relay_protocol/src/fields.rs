//! Field access helpers for CBOR map bodies.

use relay_codec::{CodecError, CodecResult, Value};

/// Read-only view over the pairs of a decoded CBOR map.
pub(crate) struct Fields<'a> {
    what: &'static str,
    pairs: &'a [(Value, Value)],
}

impl<'a> Fields<'a> {
    /// Wraps `value`, failing if it is not a map.
    pub(crate) fn of(what: &'static str, value: &'a Value) -> CodecResult<Self> {
        let pairs = value
            .as_map()
            .ok_or_else(|| CodecError::decoding_failed(format!("{what}: expected map")))?;
        Ok(Self { what, pairs })
    }

    pub(crate) fn get(&self, name: &str) -> Option<&'a Value> {
        self.pairs
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    }

    pub(crate) fn require(&self, name: &str) -> CodecResult<&'a Value> {
        self.get(name).ok_or_else(|| {
            CodecError::decoding_failed(format!("{}: missing field {name}", self.what))
        })
    }

    pub(crate) fn text(&self, name: &str) -> CodecResult<&'a str> {
        self.require(name)?
            .as_text()
            .ok_or_else(|| self.wrong_type(name, "text"))
    }

    pub(crate) fn bytes(&self, name: &str) -> CodecResult<&'a [u8]> {
        self.require(name)?
            .as_bytes()
            .ok_or_else(|| self.wrong_type(name, "bytes"))
    }

    pub(crate) fn array(&self, name: &str) -> CodecResult<&'a [Value]> {
        self.require(name)?
            .as_array()
            .ok_or_else(|| self.wrong_type(name, "array"))
    }

    /// Unsigned field; absent means zero.
    pub(crate) fn u64_or_zero(&self, name: &str) -> CodecResult<u64> {
        match self.get(name) {
            None => Ok(0),
            Some(Value::Integer(n)) if *n < 0 => Err(CodecError::decoding_failed(format!(
                "{}: {name} is negative",
                self.what
            ))),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| self.wrong_type(name, "an unsigned integer")),
        }
    }

    fn wrong_type(&self, name: &str, expected: &str) -> CodecError {
        CodecError::decoding_failed(format!("{}: {name} is not {expected}", self.what))
    }
}
