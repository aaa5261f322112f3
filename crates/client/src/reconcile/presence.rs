// Ephemeral per-user presence state.
//
// Derived solely from user_presence / typing_indicator / cursor_position
// events. Keyed by user, last-value-wins, never persisted, never merged
// into cached resources.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cahier_common::types::{CursorPosition, PresenceStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub status: PresenceStatus,
    pub last_seen_at: DateTime<Utc>,
    /// Block the user is currently typing in, if any.
    pub typing_in: Option<Uuid>,
    pub cursor: Option<CursorPosition>,
}

impl PresenceEntry {
    fn new(at: DateTime<Utc>) -> Self {
        Self { status: PresenceStatus::Online, last_seen_at: at, typing_in: None, cursor: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PresenceMap {
    entries: HashMap<Uuid, PresenceEntry>,
}

impl PresenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: Uuid) -> Option<&PresenceEntry> {
        self.entries.get(&user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &PresenceEntry)> {
        self.entries.iter()
    }

    /// An `offline` status removes the entry entirely.
    pub fn set_status(&mut self, user_id: Uuid, status: PresenceStatus, at: DateTime<Utc>) {
        if status == PresenceStatus::Offline {
            self.entries.remove(&user_id);
            return;
        }
        let entry = self.entries.entry(user_id).or_insert_with(|| PresenceEntry::new(at));
        entry.status = status;
        entry.last_seen_at = at;
    }

    pub fn set_typing(&mut self, user_id: Uuid, block_id: Uuid, is_typing: bool, at: DateTime<Utc>) {
        let entry = self.entries.entry(user_id).or_insert_with(|| PresenceEntry::new(at));
        entry.typing_in = is_typing.then_some(block_id);
        entry.last_seen_at = at;
    }

    pub fn set_cursor(&mut self, user_id: Uuid, cursor: CursorPosition, at: DateTime<Utc>) {
        let entry = self.entries.entry(user_id).or_insert_with(|| PresenceEntry::new(at));
        entry.cursor = Some(cursor);
        entry.last_seen_at = at;
    }

    /// Drop all entries, e.g. on channel disconnect or view teardown.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
