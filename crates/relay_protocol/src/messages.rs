//! Wire messages exchanged with relay callers.
//!
//! Every message body is a canonical CBOR map. [`RelayMessage`] frames a
//! body with a one-byte type code so a transport can carry any of them on
//! a single channel.

use relay_codec::{from_cbor, to_canonical_cbor, CodecError, CodecResult, Value};

use crate::cursor::Cursor;
use crate::fields::Fields;
use crate::session::Session;

/// Request to store or overwrite a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    /// The session to write.
    pub session: Session,
}

impl AddRequest {
    /// Creates an add request.
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn to_value(&self) -> CodecResult<Value> {
        Ok(Value::text_map([("session", self.session.to_value()?)]))
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        let fields = Fields::of("add request", value)?;
        Ok(Self {
            session: Session::from_value(fields.require("session")?)?,
        })
    }
}

/// Request to remove a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    /// Identifier of the session to remove.
    pub id: String,
}

impl DeleteRequest {
    /// Creates a delete request.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    fn to_value(&self) -> Value {
        Value::text_map([("id", Value::Text(self.id.clone()))])
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        let fields = Fields::of("delete request", value)?;
        Ok(Self::new(fields.text("id")?))
    }
}

/// Request to open a session change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncRequest {
    /// Epoch the caller last saw, or zero.
    pub server_version: u64,
    /// Record version the caller last saw, or zero.
    pub record_version: u64,
}

impl SyncRequest {
    /// Creates a sync request resuming from `cursor`.
    pub fn from_cursor(cursor: Cursor) -> Self {
        Self {
            server_version: cursor.server_version,
            record_version: cursor.record_version,
        }
    }

    /// Cursor carried by this request.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.server_version, self.record_version)
    }

    fn to_value(&self) -> CodecResult<Value> {
        Ok(Value::text_map([
            ("server_version", Value::from(self.server_version)),
            ("record_version", Value::from(self.record_version)),
        ]))
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        let fields = Fields::of("sync request", value)?;
        Ok(Self {
            server_version: fields.u64_or_zero("server_version")?,
            record_version: fields.u64_or_zero("record_version")?,
        })
    }
}

/// One batch of session changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncResponse {
    /// Epoch of the batch.
    pub server_version: u64,
    /// Version of the last record in the batch.
    pub record_version: u64,
    /// Changed sessions, in store order.
    pub sessions: Vec<Session>,
}

impl SyncResponse {
    /// Cursor from which a reconnecting caller resumes after this batch.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.server_version, self.record_version)
    }

    fn to_value(&self) -> CodecResult<Value> {
        let sessions = self
            .sessions
            .iter()
            .map(Session::to_value)
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(Value::text_map([
            ("server_version", Value::from(self.server_version)),
            ("record_version", Value::from(self.record_version)),
            ("sessions", Value::Array(sessions)),
        ]))
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        let fields = Fields::of("sync response", value)?;
        let sessions = fields
            .array("sessions")?
            .iter()
            .map(Session::from_value)
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(Self {
            server_version: fields.u64_or_zero("server_version")?,
            record_version: fields.u64_or_zero("record_version")?,
            sessions,
        })
    }
}

/// A relay protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// Add request.
    AddRequest(AddRequest),
    /// Delete request.
    DeleteRequest(DeleteRequest),
    /// Sync request.
    SyncRequest(SyncRequest),
    /// Sync response batch.
    SyncResponse(SyncResponse),
    /// Success with no payload.
    Empty,
}

impl RelayMessage {
    /// Returns the message type code.
    pub fn type_code(&self) -> u8 {
        match self {
            RelayMessage::AddRequest(_) => 1,
            RelayMessage::DeleteRequest(_) => 2,
            RelayMessage::SyncRequest(_) => 3,
            RelayMessage::SyncResponse(_) => 4,
            RelayMessage::Empty => 5,
        }
    }

    /// Encodes as a type code byte followed by the CBOR body.
    pub fn encode_framed(&self) -> CodecResult<Vec<u8>> {
        let body = match self {
            RelayMessage::AddRequest(m) => m.to_value()?,
            RelayMessage::DeleteRequest(m) => m.to_value(),
            RelayMessage::SyncRequest(m) => m.to_value()?,
            RelayMessage::SyncResponse(m) => m.to_value()?,
            RelayMessage::Empty => Value::Map(Vec::new()),
        };
        let mut out = vec![self.type_code()];
        out.extend(to_canonical_cbor(&body)?);
        Ok(out)
    }

    /// Decodes a framed message.
    pub fn decode_framed(bytes: &[u8]) -> CodecResult<Self> {
        let (&code, body) = bytes.split_first().ok_or(CodecError::UnexpectedEof)?;
        let value = from_cbor(body)?;
        match code {
            1 => AddRequest::from_value(&value).map(RelayMessage::AddRequest),
            2 => DeleteRequest::from_value(&value).map(RelayMessage::DeleteRequest),
            3 => SyncRequest::from_value(&value).map(RelayMessage::SyncRequest),
            4 => SyncResponse::from_value(&value).map(RelayMessage::SyncResponse),
            5 => Ok(RelayMessage::Empty),
            other => Err(CodecError::unsupported_type(format!(
                "relay message type {other}"
            ))),
        }
    }
}
