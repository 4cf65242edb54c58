//! IRC line tokenizer.
//!
//! Borrows from the input: a [`Line`] is a view over one protocol line with
//! the optional prefix, the command, and its parameters split out.
//!
//! ```text
//! [@tags ][:prefix ]COMMAND[ middle ...][ :trailing]
//! ```
//!
//! IRCv3 tags are tolerated and skipped; capability negotiation is out of
//! scope for this client.

/// One tokenized IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    /// Source prefix without the leading `:`. `None` for server-less lines.
    pub prefix: Option<&'a str>,
    /// Command word or three-digit numeric.
    pub command: &'a str,
    /// Middle parameters followed by the trailing parameter, if any.
    pub params: Vec<&'a str>,
}

impl<'a> Line<'a> {
    /// Tokenize a single line. Returns `None` for empty or truncated input.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let mut rest = raw.trim_end_matches(['\r', '\n']).trim_start_matches(' ');
        if rest.is_empty() {
            return None;
        }

        if rest.starts_with('@') {
            let (_, after) = rest.split_once(' ')?;
            rest = after.trim_start_matches(' ');
        }

        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let (prefix, after) = stripped.split_once(' ')?;
            if prefix.is_empty() {
                return None;
            }
            rest = after.trim_start_matches(' ');
            Some(prefix)
        } else {
            None
        };

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, after)) => (command, after),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing);
                break;
            }
            match rest.split_once(' ') {
                Some((middle, after)) => {
                    params.push(middle);
                    rest = after;
                },
                None => {
                    params.push(rest);
                    break;
                },
            }
        }

        Some(Self { prefix, command, params })
    }

    /// Nickname portion of the prefix (text before `!`).
    pub fn nick(&self) -> Option<&'a str> {
        let prefix = self.prefix?;
        let nick = prefix.split('!').next().unwrap_or(prefix);
        if nick.is_empty() { None } else { Some(nick) }
    }

    /// Returns true if the prefix identifies a user (`nick!user@host`).
    pub fn is_from_user(&self) -> bool {
        self.prefix.is_some_and(|p| p.contains('!'))
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&'a str> {
        self.params.get(index).copied()
    }

    /// Last parameter, conventionally the human-readable text.
    pub fn trailing(&self) -> Option<&'a str> {
        self.params.last().copied()
    }

    /// Numeric reply code. `None` for named commands.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Case-insensitive command comparison.
    pub fn is(&self, command: &str) -> bool {
        self.command.eq_ignore_ascii_case(command)
    }
}

/// Split a decrypted payload into individual lines.
///
/// The relay may coalesce several CRLF-terminated lines into one frame. Bare
/// LF terminators are accepted as well. Blank lines are skipped.
pub fn split_lines(payload: &str) -> impl Iterator<Item = &str> {
    payload.split('\n').map(|line| line.trim_end_matches('\r')).filter(|line| !line.trim().is_empty())
}
