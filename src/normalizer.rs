//! Session state normalization.
//!
//! PostgreSQL reports free-form `pg_stat_activity.state` strings; metrics use a
//! canonical label set instead.

/// Canonical label for sessions idle inside an open (or aborted) transaction
pub const IDLE_IN_TRANSACTION: &str = "idle_in_transaction";

/// Canonical label for sessions with no reported state
pub const UNKNOWN_STATE: &str = "unknown";

/// Map a raw session state to its canonical label.
///
/// Both transaction-idle variants collapse to [`IDLE_IN_TRANSACTION`], an
/// empty state becomes [`UNKNOWN_STATE`], and everything else passes through.
pub fn normalize_state(raw_state: &str) -> &str {
    match raw_state {
        "idle in transaction" | "idle in transaction (aborted)" => IDLE_IN_TRANSACTION,
        "" => UNKNOWN_STATE,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_transaction_idle_states_collapse() {
        assert_eq!(normalize_state("idle in transaction"), "idle_in_transaction");
        assert_eq!(
            normalize_state("idle in transaction (aborted)"),
            "idle_in_transaction"
        );
    }

    #[test]
    fn test_empty_state_is_unknown() {
        assert_eq!(normalize_state(""), "unknown");
    }

    #[test]
    fn test_other_states_pass_through() {
        assert_eq!(normalize_state("active"), "active");
        assert_eq!(normalize_state("idle"), "idle");
        assert_eq!(normalize_state("fastpath function call"), "fastpath function call");
        assert_eq!(normalize_state("disabled"), "disabled");
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in prop_oneof![
            Just(String::new()),
            Just("idle in transaction".to_string()),
            Just("idle in transaction (aborted)".to_string()),
            ".*",
        ]) {
            let once = normalize_state(&raw);
            prop_assert_eq!(normalize_state(once), once);
        }

        #[test]
        fn normalization_never_yields_empty(raw in ".*") {
            prop_assert!(!normalize_state(&raw).is_empty());
        }
    }
}
