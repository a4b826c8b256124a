use proptest::prelude::*;
use proptest::strategy::Just;
use yugabytedb_receiver::RawRow;

use super::mocks::node;

/// Strategy for raw session states, including the ones that get normalized
pub fn raw_state_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("active".to_string()),
        Just("idle".to_string()),
        Just("idle in transaction".to_string()),
        Just("idle in transaction (aborted)".to_string()),
        Just(String::new()),
        "[a-z ]{1,12}",
    ]
}

/// Strategy for usernames from a small pool so keys collide often
pub fn user_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("yugabyte".to_string()),
        Just("alice".to_string()),
        Just("bob".to_string()),
        "[a-z]{1,6}",
    ]
}

/// Strategy for node host names
pub fn host_strategy() -> impl Strategy<Value = String> {
    "node[0-9]"
}

/// Strategy for one global-view row of the state-and-user query
pub fn state_user_row_strategy() -> impl Strategy<Value = RawRow> {
    (host_strategy(), raw_state_strategy(), user_strategy(), 0i64..10_000).prop_map(
        |(host, state, user, count)| {
            RawRow::scalar(count)
                .with_node(node(&host))
                .with_state(state)
                .with_user(user)
        },
    )
}

/// Strategy for per-node scalar rows
pub fn scalar_rows_strategy() -> impl Strategy<Value = Vec<RawRow>> {
    prop::collection::vec(
        (host_strategy(), 0i64..100_000)
            .prop_map(|(host, count)| RawRow::scalar(count).with_node(node(&host))),
        0..16,
    )
}
