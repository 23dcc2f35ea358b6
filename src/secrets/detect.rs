//! Change detection for idempotent upserts.

use super::types::SecretRecord;

/// Decides whether writing `desired` over `existing` changes anything.
///
/// Returns `true` when there is no existing record, or when the data maps differ
/// in any key or byte value, or the label maps differ in any key or value. Map
/// order never matters.
pub fn detect(existing: Option<&SecretRecord>, desired: &SecretRecord) -> bool {
    match existing {
        None => true,
        Some(existing) => existing.data != desired.data || existing.labels != desired.labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::{btree_map, vec};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn record_strategy() -> impl Strategy<Value = SecretRecord> {
        (
            btree_map("[a-z_]{1,8}", vec(any::<u8>(), 0..16), 0..6),
            btree_map("[a-z.]{1,8}", "[a-z0-9]{0,8}", 0..4),
        )
            .prop_map(|(data, labels)| SecretRecord { data, labels })
    }

    #[test]
    fn test_first_write_is_a_change() {
        assert!(detect(None, &SecretRecord::new()));
        assert!(detect(None, &SecretRecord::new().with_field("user", "alice")));
    }

    #[test]
    fn test_identical_records_are_unchanged() {
        let a = SecretRecord::new().with_field("user", "alice").with_field("pass", "s3cr3t");
        let b = SecretRecord::new().with_field("pass", "s3cr3t").with_field("user", "alice");
        assert!(!detect(Some(&a), &b));
    }

    #[test]
    fn test_value_key_and_label_differences() {
        let base = SecretRecord::new().with_field("user", "alice").with_label("env", "prod");

        let value = SecretRecord::new().with_field("user", "bob").with_label("env", "prod");
        assert!(detect(Some(&base), &value));

        let key = base.clone().with_field("pass", "s3cr3t");
        assert!(detect(Some(&base), &key));

        let label = SecretRecord::new().with_field("user", "alice").with_label("env", "dev");
        assert!(detect(Some(&base), &label));

        let unlabelled = SecretRecord::new().with_field("user", "alice");
        assert!(detect(Some(&base), &unlabelled));
    }

    #[test]
    fn test_clearing_a_secret_is_a_change() {
        let existing = SecretRecord::new().with_field("user", "alice");
        assert!(detect(Some(&existing), &SecretRecord::new()));
        assert!(!detect(Some(&SecretRecord::new()), &SecretRecord::from_data(BTreeMap::new())));
    }

    proptest! {
        #[test]
        fn detect_none_is_always_true(record in record_strategy()) {
            prop_assert!(detect(None, &record));
        }

        #[test]
        fn detect_is_reflexive(record in record_strategy()) {
            prop_assert!(!detect(Some(&record), &record.clone()));
        }

        #[test]
        fn detect_matches_inequality(a in record_strategy(), b in record_strategy()) {
            prop_assert_eq!(detect(Some(&a), &b), a != b);
        }

        #[test]
        fn detect_does_not_mutate(a in record_strategy(), b in record_strategy()) {
            let (before_a, before_b) = (a.clone(), b.clone());
            let _ = detect(Some(&a), &b);
            prop_assert_eq!(a, before_a);
            prop_assert_eq!(b, before_b);
        }
    }
}
