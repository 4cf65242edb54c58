//! Property-based tests for user input parsing.

use proptest::prelude::*;
use umbra_client::Command;

proptest! {
    #[test]
    fn prop_arbitrary_input_never_panics(input in any::<String>()) {
        let _ = Command::parse(&input);
    }

    #[test]
    fn prop_plain_text_is_said_verbatim(text in "[a-zA-Z0-9][^\r\n]{0,40}") {
        prop_assert_eq!(Command::parse(&text), Ok(Some(Command::Say(text.clone()))));
    }

    #[test]
    fn prop_join_always_targets_a_channel(name in "[a-z][a-z0-9]{0,10}", hashed in any::<bool>()) {
        let input = if hashed { format!("/join #{name}") } else { format!("/join {name}") };
        prop_assert_eq!(Command::parse(&input), Ok(Some(Command::Join { channel: format!("#{name}") })));
    }
}
