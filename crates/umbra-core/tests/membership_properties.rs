//! Property-based tests for channel rosters under membership churn.

use proptest::prelude::*;
use umbra_core::Roster;

#[derive(Debug, Clone)]
enum Churn {
    Join(String),
    Leave(String),
    Rename(String, String),
}

fn nick() -> impl Strategy<Value = String> {
    "[a-zA-Z]{1,6}"
}

fn listed() -> impl Strategy<Value = String> {
    ("[@+]?", nick()).prop_map(|(prefix, nick)| format!("{prefix}{nick}"))
}

fn churn() -> impl Strategy<Value = Churn> {
    prop_oneof![
        listed().prop_map(Churn::Join),
        nick().prop_map(Churn::Leave),
        (nick(), nick()).prop_map(|(old, new)| Churn::Rename(old, new)),
    ]
}

fn assert_sorted_and_unique(roster: &Roster) -> Result<(), TestCaseError> {
    for pair in roster.members().windows(2) {
        prop_assert!(pair[0].nick().to_lowercase() <= pair[1].nick().to_lowercase());
    }
    for (i, member) in roster.members().iter().enumerate() {
        for other in &roster.members()[i + 1..] {
            prop_assert!(!member.nick().eq_ignore_ascii_case(other.nick()));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_finalized_roster_stays_sorted(
        initial in prop::collection::vec(listed(), 0..12),
        changes in prop::collection::vec(churn(), 0..24),
    ) {
        let mut roster = Roster::new();
        for raw in &initial {
            roster.insert(raw);
        }
        roster.finalize();
        assert_sorted_and_unique(&roster)?;

        for change in changes {
            match change {
                Churn::Join(raw) => {
                    roster.insert(&raw);
                },
                Churn::Leave(nick) => {
                    roster.remove(&nick);
                },
                Churn::Rename(old, new) => {
                    roster.rename(&old, &new);
                },
            }
            assert_sorted_and_unique(&roster)?;
        }
    }

    #[test]
    fn prop_leave_removes_member(initial in prop::collection::vec(listed(), 1..12), pick in any::<prop::sample::Index>()) {
        let mut roster = Roster::new();
        for raw in &initial {
            roster.insert(raw);
        }
        roster.finalize();

        let gone = pick.get(roster.members()).nick().to_string();
        prop_assert!(roster.remove(&gone));
        prop_assert!(!roster.contains(&gone));
    }
}
