//! Channel member lists.
//!
//! Members are stored exactly as the server lists them, mode prefix included
//! (`@op`, `+voice`). Identity comparisons strip the prefix first, so `@alice`
//! and `alice` are the same member.
//!
//! A roster filled from NAMES fragments is only authoritative once
//! [`Roster::finalize`] has run for the end-of-NAMES marker.

/// Mode prefix characters stripped before comparing identifiers.
///
/// Nicknames that legitimately begin with one of these are compared without
/// it as well.
pub const MODE_PREFIXES: &[char] = &['~', '&', '@', '%', '+'];

/// Identifier with any leading mode prefixes removed.
pub fn strip_mode_prefix(raw: &str) -> &str {
    raw.trim_start_matches(MODE_PREFIXES)
}

/// One channel member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    raw: String,
}

impl Member {
    /// Wrap an identifier as listed by the server.
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Identifier without mode prefix.
    pub fn nick(&self) -> &str {
        strip_mode_prefix(&self.raw)
    }

    /// Mode prefix characters, possibly empty.
    pub fn prefix(&self) -> &str {
        &self.raw[..self.raw.len() - self.nick().len()]
    }

    /// Identifier as stored, prefix included.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn is(&self, nick: &str) -> bool {
        self.nick().eq_ignore_ascii_case(strip_mode_prefix(nick))
    }
}

/// Ordered, duplicate-free member list of one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    members: Vec<Member>,
    complete: bool,
}

impl Roster {
    /// Empty roster, not yet authoritative.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member unless already present. Returns true if added.
    ///
    /// An authoritative roster stays sorted; one being rebuilt is sorted by
    /// [`Roster::finalize`].
    pub fn insert(&mut self, raw: &str) -> bool {
        if strip_mode_prefix(raw).is_empty() || self.contains(raw) {
            return false;
        }
        let member = Member::new(raw);
        if self.complete {
            let key = sort_key(&member);
            let index = self.members.partition_point(|m| sort_key(m) <= key);
            self.members.insert(index, member);
        } else {
            self.members.push(member);
        }
        true
    }

    /// Remove a member. Returns true if it was present.
    pub fn remove(&mut self, nick: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| !m.is(nick));
        self.members.len() != before
    }

    /// Rename a member, keeping its mode prefix. Returns true if present.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        let Some(index) = self.members.iter().position(|m| m.is(old)) else {
            return false;
        };

        let renamed = format!("{}{}", self.members[index].prefix(), new);
        self.members.remove(index);
        if !self.contains(new) {
            self.members.insert(index, Member::new(renamed));
        }
        if self.complete {
            self.sort();
        }
        true
    }

    /// Returns true if `nick` (prefix ignored) is a member.
    pub fn contains(&self, nick: &str) -> bool {
        self.members.iter().any(|m| m.is(nick))
    }

    /// Drop all members and mark the roster as being rebuilt.
    pub fn clear(&mut self) {
        self.members.clear();
        self.complete = false;
    }

    /// Mark the roster authoritative and sort it.
    pub fn finalize(&mut self) {
        self.sort();
        self.complete = true;
    }

    /// Whether the last NAMES exchange has finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Members in display order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn sort(&mut self) {
        self.members.sort_by_cached_key(sort_key);
    }
}

fn sort_key(member: &Member) -> String {
    member.nick().to_lowercase()
}
