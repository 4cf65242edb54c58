//! User input parsing.
//!
//! Plain text becomes [`Command::Say`]. Input starting with `/` is a slash
//! command; unknown commands fall back to [`Command::Raw`], which forwards the
//! text after the slash verbatim as a protocol line.

use crate::error::ClientError;

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Message to the current buffer's target.
    Say(String),
    /// `/join <channel>`
    Join {
        /// Channel, `#` added if missing.
        channel: String,
    },
    /// `/query <nick>`: open or select a private buffer.
    Query {
        /// Correspondent.
        nick: String,
    },
    /// `/msg <target> <text>`
    Msg {
        /// Channel or nickname.
        target: String,
        /// Message text.
        text: String,
    },
    /// `/me <action>`
    Me {
        /// Action text.
        text: String,
    },
    /// `/notice <target> <text>`
    Notice {
        /// Channel or nickname.
        target: String,
        /// Notice text.
        text: String,
    },
    /// `/part [channel] [reason]`
    Part {
        /// Channel to leave; the current buffer if omitted.
        channel: Option<String>,
        /// Part message.
        reason: Option<String>,
    },
    /// `/nick <nick>`
    Nick {
        /// Requested nickname.
        nick: String,
    },
    /// `/names [channel]`
    Names {
        /// Channel to list; the current buffer if omitted.
        channel: Option<String>,
    },
    /// `/quit [reason]`: manual disconnect.
    Quit {
        /// QUIT message.
        reason: Option<String>,
    },
    /// Anything else after `/`, sent as-is.
    Raw(String),
}

impl Command {
    /// Parse one line of input. Returns `Ok(None)` for blank input.
    ///
    /// # Errors
    ///
    /// `ClientError::Usage` if a known command lacks required arguments.
    pub fn parse(input: &str) -> Result<Option<Self>, ClientError> {
        let input = input.trim_end_matches(['\r', '\n']);
        if input.trim().is_empty() {
            return Ok(None);
        }

        let Some(rest) = input.strip_prefix('/') else {
            return Ok(Some(Self::Say(input.to_string())));
        };

        let (name, args) = split_word(rest);
        let command = match name.to_ascii_lowercase().as_str() {
            "join" | "j" => {
                let (channel, _) = split_word(args);
                if channel.is_empty() {
                    return Err(ClientError::Usage("/join <channel>"));
                }
                Self::Join { channel: channel_name(channel) }
            },
            "query" => {
                let (nick, _) = split_word(args);
                if nick.is_empty() {
                    return Err(ClientError::Usage("/query <nick>"));
                }
                Self::Query { nick: nick.to_string() }
            },
            "msg" => {
                let (target, text) = split_word(args);
                if target.is_empty() || text.is_empty() {
                    return Err(ClientError::Usage("/msg <target> <text>"));
                }
                Self::Msg { target: target.to_string(), text: text.to_string() }
            },
            "notice" => {
                let (target, text) = split_word(args);
                if target.is_empty() || text.is_empty() {
                    return Err(ClientError::Usage("/notice <target> <text>"));
                }
                Self::Notice { target: target.to_string(), text: text.to_string() }
            },
            "me" => {
                if args.trim().is_empty() {
                    return Err(ClientError::Usage("/me <action>"));
                }
                Self::Me { text: args.trim().to_string() }
            },
            "part" | "leave" => {
                let (first, remainder) = split_word(args);
                if umbra_proto::inbound::is_channel(first) {
                    Self::Part { channel: Some(first.to_string()), reason: non_empty(remainder) }
                } else {
                    Self::Part { channel: None, reason: non_empty(args) }
                }
            },
            "nick" => {
                let (nick, _) = split_word(args);
                if nick.is_empty() {
                    return Err(ClientError::Usage("/nick <nick>"));
                }
                Self::Nick { nick: nick.to_string() }
            },
            "names" => {
                let (channel, _) = split_word(args);
                Self::Names { channel: non_empty(channel).map(|c| channel_name(&c)) }
            },
            "quit" | "disconnect" => Self::Quit { reason: non_empty(args) },
            _ => {
                if rest.trim().is_empty() {
                    return Ok(None);
                }
                Self::Raw(rest.to_string())
            },
        };

        Ok(Some(command))
    }
}

/// First whitespace-delimited word and the trimmed remainder.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() { None } else { Some(text.to_string()) }
}

fn channel_name(name: &str) -> String {
    if umbra_proto::inbound::is_channel(name) { name.to_string() } else { format!("#{name}") }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Command {
        Command::parse(input).unwrap().unwrap()
    }

    #[test]
    fn plain_text_is_said() {
        assert_eq!(parse("hello /there"), Command::Say("hello /there".into()));
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("").unwrap(), None);
    }

    #[test]
    fn join_normalizes_channel() {
        assert_eq!(parse("/join #rust"), Command::Join { channel: "#rust".into() });
        assert_eq!(parse("/JOIN rust"), Command::Join { channel: "#rust".into() });
        assert_eq!(Command::parse("/join"), Err(ClientError::Usage("/join <channel>")));
    }

    #[test]
    fn msg_splits_target_and_text() {
        assert_eq!(
            parse("/msg bob  hi there "),
            Command::Msg { target: "bob".into(), text: "hi there".into() }
        );
        assert_eq!(Command::parse("/msg bob"), Err(ClientError::Usage("/msg <target> <text>")));
    }

    #[test]
    fn me_and_query() {
        assert_eq!(parse("/me waves"), Command::Me { text: "waves".into() });
        assert_eq!(parse("/query carol"), Command::Query { nick: "carol".into() });
        assert!(Command::parse("/me").is_err());
    }

    #[test]
    fn part_with_and_without_channel() {
        assert_eq!(
            parse("/part #a see you"),
            Command::Part { channel: Some("#a".into()), reason: Some("see you".into()) }
        );
        assert_eq!(parse("/part bye all"), Command::Part { channel: None, reason: Some("bye all".into()) });
        assert_eq!(parse("/part"), Command::Part { channel: None, reason: None });
    }

    #[test]
    fn quit_names_nick() {
        assert_eq!(parse("/quit"), Command::Quit { reason: None });
        assert_eq!(parse("/quit gone"), Command::Quit { reason: Some("gone".into()) });
        assert_eq!(parse("/names"), Command::Names { channel: None });
        assert_eq!(parse("/names x"), Command::Names { channel: Some("#x".into()) });
        assert_eq!(parse("/nick zed"), Command::Nick { nick: "zed".into() });
    }

    #[test]
    fn unknown_commands_are_raw() {
        assert_eq!(parse("/mode #x +i"), Command::Raw("mode #x +i".into()));
        assert_eq!(parse("/WHOIS alice"), Command::Raw("WHOIS alice".into()));
        assert_eq!(Command::parse("/").unwrap(), None);
    }
}
