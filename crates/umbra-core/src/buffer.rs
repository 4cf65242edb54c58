//! Conversation buffers.
//!
//! The [`BufferStore`] maps targets (`Status`, `#channel`, nickname) to
//! ordered message logs, tracks which buffer is current and which have unread
//! messages, and owns the per-channel [`Roster`]s.
//!
//! # Invariants
//!
//! - Exactly one buffer is current; the `Status` buffer always exists.
//! - Selecting a buffer clears its unread flag.
//! - Messages are never mutated after they are appended.
//! - A channel awaiting a fresh NAMES reply has its roster cleared before the
//!   next fragment is applied, so a rejoin never shows members from before.

use std::collections::{HashMap, HashSet};

use crate::roster::Roster;

/// Name of the always-present server buffer.
pub const STATUS_BUFFER: &str = "Status";

/// What a message represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Regular chat text.
    Chat,
    /// CTCP ACTION (`/me`).
    Action,
    /// Membership change (join, part, quit, kick, nick).
    Event,
    /// Informational server text.
    Info,
    /// Error shown to the user.
    Error,
}

/// A single line in a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sender: String,
    body: String,
    timestamp: u64,
    kind: MessageKind,
    notice: bool,
    private: bool,
}

impl Message {
    /// Create a message of the given kind.
    pub fn new(
        kind: MessageKind,
        sender: impl Into<String>,
        body: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            timestamp,
            kind,
            notice: false,
            private: false,
        }
    }

    /// Chat message from `sender`.
    pub fn chat(sender: impl Into<String>, body: impl Into<String>, timestamp: u64) -> Self {
        Self::new(MessageKind::Chat, sender, body, timestamp)
    }

    /// Status line without a sender.
    pub fn status(kind: MessageKind, body: impl Into<String>, timestamp: u64) -> Self {
        Self::new(kind, "*", body, timestamp)
    }

    /// Mark as a notice.
    #[must_use]
    pub fn with_notice(mut self, notice: bool) -> Self {
        self.notice = notice;
        self
    }

    /// Mark as a private (direct) message.
    #[must_use]
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Sending nickname, or `*` for status lines.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Message text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Unix timestamp (seconds) at which the message was received or sent.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Message kind.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Whether this was a NOTICE.
    pub fn is_notice(&self) -> bool {
        self.notice
    }

    /// Whether this was addressed to us directly.
    pub fn is_private(&self) -> bool {
        self.private
    }
}

/// A named conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    name: String,
    messages: Vec<Message>,
    unread: bool,
}

impl Buffer {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), messages: Vec::new(), unread: false }
    }

    /// Target name (`Status`, `#channel` or nickname).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether messages arrived since the buffer was last selected.
    pub fn is_unread(&self) -> bool {
        self.unread
    }

    /// Whether this buffer is a channel.
    pub fn is_channel(&self) -> bool {
        umbra_proto::inbound::is_channel(&self.name)
    }
}

/// All buffers and rosters of one client.
#[derive(Debug, Clone)]
pub struct BufferStore {
    buffers: Vec<Buffer>,
    current: usize,
    rosters: HashMap<String, Roster>,
    awaiting_names: HashSet<String>,
}

impl Default for BufferStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferStore {
    /// Store containing only the current `Status` buffer.
    pub fn new() -> Self {
        Self {
            buffers: vec![Buffer::new(STATUS_BUFFER)],
            current: 0,
            rosters: HashMap::new(),
            awaiting_names: HashSet::new(),
        }
    }

    /// Drop every buffer and roster, leaving a fresh `Status` buffer.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// All buffers in creation order.
    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    /// Buffer by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Buffer> {
        self.position(name).map(|i| &self.buffers[i])
    }

    /// The current buffer.
    pub fn current(&self) -> &Buffer {
        &self.buffers[self.current]
    }

    /// Name of the current buffer.
    pub fn current_name(&self) -> &str {
        &self.buffers[self.current].name
    }

    /// Names of buffers with unread messages.
    pub fn unread(&self) -> Vec<&str> {
        self.buffers.iter().filter(|b| b.unread).map(|b| b.name.as_str()).collect()
    }

    /// Make `name` current, creating it if needed, and clear its unread flag.
    pub fn select(&mut self, name: &str) {
        let index = self.ensure(name);
        self.current = index;
        self.buffers[index].unread = false;
    }

    /// Append to `name`, creating it if needed. Non-current buffers become
    /// unread.
    pub fn append(&mut self, name: &str, message: Message) {
        let index = self.ensure(name);
        if index != self.current {
            self.buffers[index].unread = true;
        }
        self.buffers[index].messages.push(message);
    }

    /// Append to the current buffer.
    pub fn append_current(&mut self, message: Message) {
        self.buffers[self.current].messages.push(message);
    }

    /// Append to `Status`.
    pub fn append_status(&mut self, message: Message) {
        self.append(STATUS_BUFFER, message);
    }

    /// Roster of `channel`, if known.
    pub fn roster(&self, channel: &str) -> Option<&Roster> {
        self.rosters.get(&key(channel))
    }

    /// Roster of the current buffer, if it is a channel with a roster.
    pub fn current_roster(&self) -> Option<&Roster> {
        self.roster(self.current_name())
    }

    /// Whether `channel` is waiting for a fresh NAMES reply.
    pub fn is_awaiting_names(&self, channel: &str) -> bool {
        self.awaiting_names.contains(&key(channel))
    }

    /// Clear the roster of `channel` and wait for a fresh NAMES reply.
    pub fn expect_names(&mut self, channel: &str) {
        let key = key(channel);
        self.rosters.entry(key.clone()).or_default().clear();
        self.awaiting_names.insert(key);
    }

    /// Apply one NAMES fragment.
    ///
    /// The first fragment of an exchange (the channel was awaiting NAMES, or
    /// its previous listing had finished) replaces the roster; later fragments
    /// accumulate.
    pub fn apply_names(&mut self, channel: &str, members: &[String]) {
        let key = key(channel);
        let fresh = self.awaiting_names.remove(&key);
        let roster = self.rosters.entry(key).or_default();
        if fresh || roster.is_complete() {
            roster.clear();
        }
        for member in members {
            roster.insert(member);
        }
    }

    /// End of NAMES: sort the roster and mark it authoritative.
    pub fn finish_names(&mut self, channel: &str) {
        let key = key(channel);
        self.awaiting_names.remove(&key);
        self.rosters.entry(key).or_default().finalize();
    }

    /// Add `nick` to `channel` if absent. Returns true if added.
    pub fn add_member(&mut self, channel: &str, nick: &str) -> bool {
        self.rosters.entry(key(channel)).or_default().insert(nick)
    }

    /// Remove `nick` from `channel` only. Returns true if it was present.
    pub fn remove_member(&mut self, channel: &str, nick: &str) -> bool {
        self.rosters.get_mut(&key(channel)).is_some_and(|r| r.remove(nick))
    }

    /// Forget the roster of a channel we are no longer in.
    pub fn drop_roster(&mut self, channel: &str) {
        let key = key(channel);
        self.rosters.remove(&key);
        self.awaiting_names.remove(&key);
    }

    /// Remove `nick` from every roster. Returns true if any roster changed.
    pub fn remove_everywhere(&mut self, nick: &str) -> bool {
        let mut changed = false;
        for roster in self.rosters.values_mut() {
            changed |= roster.remove(nick);
        }
        changed
    }

    /// Rename `old` to `new` in every roster. Returns true if any changed.
    pub fn rename_everywhere(&mut self, old: &str, new: &str) -> bool {
        let mut changed = false;
        for roster in self.rosters.values_mut() {
            changed |= roster.rename(old, new);
        }
        changed
    }

    fn ensure(&mut self, name: &str) -> usize {
        if let Some(index) = self.position(name) {
            return index;
        }
        self.buffers.push(Buffer::new(name));
        self.buffers.len() - 1
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.buffers.iter().position(|b| b.name.eq_ignore_ascii_case(name))
    }
}

fn key(channel: &str) -> String {
    channel.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn roster_of(store: &BufferStore, channel: &str) -> Vec<String> {
        store
            .roster(channel)
            .map(|r| r.members().iter().map(|m| m.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn starts_with_current_status() {
        let store = BufferStore::new();
        assert_eq!(store.current_name(), STATUS_BUFFER);
        assert_eq!(store.buffers().len(), 1);
        assert!(store.unread().is_empty());
    }

    #[test]
    fn append_marks_background_buffers_unread() {
        let mut store = BufferStore::new();
        store.append("#room", Message::chat("alice", "hi", 1));
        store.append_status(Message::status(MessageKind::Info, "motd", 1));

        assert_eq!(store.unread(), vec!["#room"]);
        assert_eq!(store.get("#ROOM").map(|b| b.messages().len()), Some(1));

        store.select("#room");
        assert!(store.unread().is_empty());
        assert_eq!(store.current_name(), "#room");
    }

    #[test]
    fn select_creates_lazily() {
        let mut store = BufferStore::new();
        store.select("carol");
        assert_eq!(store.current_name(), "carol");
        assert!(store.get("carol").is_some_and(|b| !b.is_channel()));
    }

    #[test]
    fn names_fragments_accumulate_until_end() {
        let mut store = BufferStore::new();
        store.apply_names("#c", &names(&["b", "@a"]));
        store.apply_names("#c", &names(&["c", "a"]));
        assert!(!store.roster("#c").is_some_and(Roster::is_complete));

        store.finish_names("#c");
        assert_eq!(roster_of(&store, "#c"), vec!["@a", "b", "c"]);
        assert!(store.roster("#c").is_some_and(Roster::is_complete));
    }

    #[test]
    fn awaiting_names_clears_stale_roster() {
        let mut store = BufferStore::new();
        store.apply_names("#c", &names(&["ghost", "alice"]));
        store.finish_names("#c");

        store.expect_names("#c");
        assert!(store.is_awaiting_names("#c"));
        assert!(store.roster("#c").is_some_and(Roster::is_empty));

        store.apply_names("#c", &names(&["alice", "bob"]));
        store.finish_names("#c");
        assert_eq!(roster_of(&store, "#c"), vec!["alice", "bob"]);
        assert!(!store.is_awaiting_names("#c"));
    }

    #[test]
    fn new_exchange_after_completion_rebuilds() {
        let mut store = BufferStore::new();
        store.apply_names("#c", &names(&["old"]));
        store.finish_names("#c");

        store.apply_names("#c", &names(&["new"]));
        store.finish_names("#c");
        assert_eq!(roster_of(&store, "#c"), vec!["new"]);
    }

    #[test]
    fn member_changes_are_scoped() {
        let mut store = BufferStore::new();
        store.apply_names("#a", &names(&["bob", "carol"]));
        store.apply_names("#b", &names(&["@bob"]));

        assert!(store.remove_member("#a", "bob"));
        assert_eq!(roster_of(&store, "#b"), vec!["@bob"]);

        assert!(store.remove_everywhere("bob"));
        assert!(store.roster("#b").is_some_and(Roster::is_empty));
        assert!(!store.remove_everywhere("bob"));

        assert!(store.rename_everywhere("carol", "caroline"));
        assert_eq!(roster_of(&store, "#a"), vec!["caroline"]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut store = BufferStore::new();
        store.select("#room");
        store.add_member("#room", "x");
        store.clear();

        assert_eq!(store.current_name(), STATUS_BUFFER);
        assert!(store.roster("#room").is_none());
        assert_eq!(store.buffers().len(), 1);
    }
}
