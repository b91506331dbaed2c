//! Property-based test generators using proptest.
//!
//! Generated sessions always have an encodable shape: a non-empty id and
//! canonical field maps. The `raw_` strategies build maps in arbitrary
//! pair order, the way a caller writing `Value::Map` by hand would.

use std::collections::BTreeMap;

use proptest::prelude::*;
use relay_protocol::{Session, Value};

/// Strategy for session ids.
pub fn session_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,24}").expect("Invalid regex")
}

/// Strategy for field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        any::<u64>().prop_map(Value::from),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
        ".{0,16}".prop_map(Value::Text),
    ]
}

/// Strategy for field values, nested up to three levels.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4)
                .prop_map(Value::from),
        ]
    })
}

/// Strategy for field values whose maps keep their pairs in shuffled order.
pub fn raw_value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4)
                .prop_map(|fields| {
                    fields
                        .into_iter()
                        .map(|(k, v)| (Value::Text(k), v))
                        .collect::<Vec<_>>()
                })
                .prop_shuffle()
                .prop_map(Value::Map),
        ]
    })
}

/// Strategy for sessions whose field values come from [`raw_value_strategy`].
pub fn raw_session_strategy() -> impl Strategy<Value = Session> {
    (
        session_id_strategy(),
        prop::collection::btree_map(field_name_strategy(), raw_value_strategy(), 0..6),
    )
        .prop_map(|(id, data): (String, BTreeMap<String, Value>)| Session { id, data })
}

/// Strategy for sessions.
pub fn session_strategy() -> impl Strategy<Value = Session> {
    (
        session_id_strategy(),
        prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..6),
    )
        .prop_map(|(id, data): (String, BTreeMap<String, Value>)| Session { id, data })
}

/// Strategy for a list of sessions with distinct ids.
pub fn distinct_sessions_strategy(max: usize) -> impl Strategy<Value = Vec<Session>> {
    prop::collection::btree_map(session_id_strategy(), session_strategy(), 0..max.max(1))
        .prop_map(|by_id| {
            by_id
                .into_iter()
                .map(|(id, session)| Session { id, ..session })
                .collect()
        })
}
