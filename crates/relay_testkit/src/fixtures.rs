//! Session fixtures and store records.

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use relay_protocol::{Any, Encode, Session, Value, SESSION_TYPE_URL};
use relay_store::{Record, StoreBatch};

/// Default wait for stream items in tests.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// A session with typical fields.
pub fn alice() -> Session {
    Session::new("u1")
        .with_field("user", "alice")
        .with_field("expires_at", 1_700_000_000i64)
        .with_field(
            "claims",
            Value::text_map([("groups", Value::from(vec![Value::from("admin")]))]),
        )
}

/// A second session with a different id.
pub fn bob() -> Session {
    Session::new("u2")
        .with_field("user", "bob")
        .with_field("expires_at", 1_700_003_600i64)
}

/// Numbered sessions `s1..=sN`.
pub fn numbered_sessions(count: usize) -> Vec<Session> {
    (1..=count)
        .map(|n| Session::new(format!("s{n}")).with_field("n", n as i64))
        .collect()
}

/// Stores `session` as a record at `version`.
pub fn session_record(session: &Session, version: u64) -> Record {
    let payload = session.to_payload().expect("fixture session must encode");
    Record::new(SESSION_TYPE_URL, session.id.clone(), payload, version)
}

/// A record whose payload is not CBOR at all.
pub fn garbage_record(id: &str, version: u64) -> Record {
    Record::new(
        SESSION_TYPE_URL,
        id,
        Bytes::from_static(b"\xffnot a session"),
        version,
    )
}

/// A record whose envelope names another message type.
pub fn foreign_record(id: &str, version: u64) -> Record {
    let payload = Any::new("type.relay.dev/relay.user.User", vec![0xa0])
        .encode()
        .expect("envelope must encode");
    Record::new(SESSION_TYPE_URL, id, payload, version)
}

/// A batch of session records with consecutive versions from `first_version`.
pub fn session_batch(server_version: u64, first_version: u64, sessions: &[Session]) -> StoreBatch {
    let records = sessions
        .iter()
        .zip(first_version..)
        .map(|(session, version)| session_record(session, version))
        .collect();
    StoreBatch::new(server_version, records)
}

/// Waits for the next stream item, panicking after [`STREAM_TIMEOUT`].
pub async fn next_item<S>(stream: &mut S) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    tokio::time::timeout(STREAM_TIMEOUT, stream.next())
        .await
        .expect("timed out waiting for stream item")
}

/// Returns true if the stream yields nothing within `wait`.
pub async fn is_idle<S>(stream: &mut S, wait: Duration) -> bool
where
    S: Stream + Unpin,
{
    tokio::time::timeout(wait, stream.next()).await.is_err()
}

/// Polls `condition` until it holds, panicking after [`STREAM_TIMEOUT`].
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(STREAM_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
