//! Inbound line classification.
//!
//! [`classify`] maps one decrypted line to the event it represents. Rules are
//! applied in a fixed order and the first match wins:
//!
//! 1. 4xx/5xx numerics targeting a channel become [`Inbound::JoinFailed`];
//!    welcome numerics (001, 376, 422) become [`Inbound::Welcome`]; 433 becomes
//!    [`Inbound::NickInUse`]; every other numeric is informational, except:
//! 2. 353 is a NAMES fragment,
//! 3. 366 is the end of NAMES.
//! 4. `PRIVMSG` (with CTCP ACTION detection) and `NOTICE`
//! 5. `JOIN`
//! 6. `PART` / `KICK`
//! 7. `QUIT`, `NICK`
//! 8. `PING`, and the server `ERROR` command.
//!
//! Anything else, including lines with missing parameters, yields `None`.

use crate::Line;

/// Registration complete.
pub const RPL_WELCOME: u16 = 1;
/// End of MOTD.
pub const RPL_ENDOFMOTD: u16 = 376;
/// MOTD missing.
pub const ERR_NOMOTD: u16 = 422;
/// NAMES fragment.
pub const RPL_NAMREPLY: u16 = 353;
/// End of NAMES.
pub const RPL_ENDOFNAMES: u16 = 366;
/// Nickname already taken.
pub const ERR_NICKNAMEINUSE: u16 = 433;
/// Channel is full.
pub const ERR_CHANNELISFULL: u16 = 471;
/// Channel is invite-only.
pub const ERR_INVITEONLYCHAN: u16 = 473;
/// Banned from channel.
pub const ERR_BANNEDFROMCHAN: u16 = 474;
/// Wrong channel key.
pub const ERR_BADCHANNELKEY: u16 = 475;
/// Bad channel mask.
pub const ERR_BADCHANMASK: u16 = 476;

const CTCP_DELIM: char = '\u{1}';

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Registration completed (001, 376 or 422).
    Welcome {
        /// Numeric code.
        code: u16,
        /// Server text.
        text: String,
    },

    /// Requested nickname is taken.
    NickInUse {
        /// Rejected nickname.
        nick: String,
    },

    /// Error numeric aimed at a channel.
    JoinFailed {
        /// Numeric code.
        code: u16,
        /// Channel the error refers to.
        channel: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Any other numeric, shown as information.
    Numeric {
        /// Numeric code.
        code: u16,
        /// Parameters after our own nickname, joined by spaces.
        text: String,
    },

    /// NAMES fragment (353).
    Names {
        /// Channel being listed.
        channel: String,
        /// Members with their mode prefixes.
        members: Vec<String>,
    },

    /// End of NAMES (366).
    NamesEnd {
        /// Channel whose listing finished.
        channel: String,
    },

    /// Channel or private message.
    Privmsg {
        /// Sending nickname.
        sender: String,
        /// Channel or our own nickname.
        target: String,
        /// Message text (CTCP framing removed for actions).
        body: String,
        /// CTCP ACTION (`/me`).
        action: bool,
    },

    /// Notice from a user or the server.
    Notice {
        /// Sending nickname, or the server name.
        sender: String,
        /// Channel, our nickname, or `*` before registration.
        target: String,
        /// Notice text.
        body: String,
        /// True if the prefix names a user rather than a server.
        from_user: bool,
    },

    /// Someone (possibly us) joined a channel.
    Join {
        /// Joining nickname.
        nick: String,
        /// Channel joined.
        channel: String,
    },

    /// Someone left a channel.
    Part {
        /// Departing nickname.
        nick: String,
        /// Channel left.
        channel: String,
        /// Optional part message.
        reason: Option<String>,
    },

    /// Someone was kicked from a channel.
    Kick {
        /// Channel.
        channel: String,
        /// Kicked nickname.
        nick: String,
        /// Kicking nickname.
        by: String,
        /// Optional kick reason.
        reason: Option<String>,
    },

    /// Someone disconnected from the network.
    Quit {
        /// Departing nickname.
        nick: String,
        /// Optional quit message.
        reason: Option<String>,
    },

    /// Nickname change.
    Nick {
        /// Previous nickname.
        old: String,
        /// New nickname.
        new: String,
    },

    /// Keepalive that must be answered with `PONG`.
    Ping {
        /// Token to echo back.
        token: String,
    },

    /// Server is closing the link.
    ServerError {
        /// Server text.
        message: String,
    },
}

/// Classify one line. Returns `None` if no rule matches.
pub fn classify(raw: &str) -> Option<Inbound> {
    let line = Line::parse(raw)?;

    if let Some(code) = line.numeric() {
        return classify_numeric(&line, code);
    }

    if line.is("PRIVMSG") {
        return classify_privmsg(&line);
    }
    if line.is("NOTICE") {
        return classify_notice(&line);
    }
    if line.is("JOIN") {
        let nick = line.nick()?;
        let channel = line.param(0)?;
        return Some(Inbound::Join { nick: nick.to_string(), channel: channel.to_string() });
    }
    if line.is("PART") {
        let nick = line.nick()?;
        let channel = line.param(0)?;
        return Some(Inbound::Part {
            nick: nick.to_string(),
            channel: channel.to_string(),
            reason: non_empty(line.param(1)),
        });
    }
    if line.is("KICK") {
        let by = line.nick()?;
        let channel = line.param(0)?;
        let nick = line.param(1)?;
        return Some(Inbound::Kick {
            channel: channel.to_string(),
            nick: nick.to_string(),
            by: by.to_string(),
            reason: non_empty(line.param(2)),
        });
    }
    if line.is("QUIT") {
        let nick = line.nick()?;
        return Some(Inbound::Quit { nick: nick.to_string(), reason: non_empty(line.param(0)) });
    }
    if line.is("NICK") {
        let old = line.nick()?;
        let new = line.param(0)?;
        return Some(Inbound::Nick { old: old.to_string(), new: new.to_string() });
    }
    if line.is("PING") {
        return Some(Inbound::Ping { token: line.param(0).unwrap_or_default().to_string() });
    }
    if line.is("ERROR") {
        return Some(Inbound::ServerError {
            message: line.trailing().unwrap_or("closing link").to_string(),
        });
    }

    None
}

fn classify_numeric(line: &Line<'_>, code: u16) -> Option<Inbound> {
    // params[0] is always our own nickname (or `*` before registration).
    let args = line.params.get(1..).unwrap_or_default();

    if (400..600).contains(&code) {
        if let Some(channel) = args.first().filter(|a| is_channel(a)) {
            let reason = join_failure_reason(code)
                .map(str::to_string)
                .or_else(|| args.get(1..).map(|rest| rest.join(" ")))
                .unwrap_or_default();
            return Some(Inbound::JoinFailed { code, channel: (*channel).to_string(), reason });
        }
    }

    match code {
        RPL_WELCOME | RPL_ENDOFMOTD | ERR_NOMOTD => {
            Some(Inbound::Welcome { code, text: args.join(" ") })
        },
        ERR_NICKNAMEINUSE => Some(Inbound::NickInUse { nick: args.first()?.to_string() }),
        RPL_NAMREPLY => {
            // `353 me = #chan :a b c`; the channel-type symbol is optional.
            let (list, head) = args.split_last()?;
            let channel = head.iter().find(|a| is_channel(a))?;
            Some(Inbound::Names {
                channel: (*channel).to_string(),
                members: list.split_whitespace().map(str::to_string).collect(),
            })
        },
        RPL_ENDOFNAMES => Some(Inbound::NamesEnd { channel: args.first()?.to_string() }),
        _ => Some(Inbound::Numeric { code, text: args.join(" ") }),
    }
}

fn classify_privmsg(line: &Line<'_>) -> Option<Inbound> {
    let sender = line.nick()?;
    let target = line.param(0)?;
    let text = line.param(1)?;

    let (body, action) = match text.strip_prefix(CTCP_DELIM).and_then(|t| t.strip_prefix("ACTION")) {
        Some(rest) => (rest.trim_start_matches(' ').trim_end_matches(CTCP_DELIM), true),
        None => (text, false),
    };

    Some(Inbound::Privmsg {
        sender: sender.to_string(),
        target: target.to_string(),
        body: body.to_string(),
        action,
    })
}

fn classify_notice(line: &Line<'_>) -> Option<Inbound> {
    let target = line.param(0)?;
    let body = line.param(1)?;
    let sender = line.nick().unwrap_or("server");

    Some(Inbound::Notice {
        sender: sender.to_string(),
        target: target.to_string(),
        body: body.to_string(),
        from_user: line.is_from_user(),
    })
}

/// Returns true for channel names.
pub fn is_channel(name: &str) -> bool {
    name.starts_with('#')
}

/// Fixed description for the well-known join failures.
pub fn join_failure_reason(code: u16) -> Option<&'static str> {
    match code {
        ERR_CHANNELISFULL => Some("channel is full"),
        ERR_INVITEONLYCHAN => Some("channel is invite-only"),
        ERR_BANNEDFROMCHAN => Some("you are banned from this channel"),
        ERR_BADCHANNELKEY => Some("wrong channel key"),
        ERR_BADCHANMASK => Some("bad channel mask"),
        _ => None,
    }
}

fn non_empty(param: Option<&str>) -> Option<String> {
    param.filter(|p| !p.is_empty()).map(str::to_string)
}
