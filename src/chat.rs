//! Conversation and its message window.
//!
//! A `Conversation` exclusively owns the loaded window of messages for one
//! buyer/seller pairing around a listing. All mutating operations keep the
//! window sorted by `(at, id)` ascending and free of duplicate identifiers,
//! and refresh the cached fields the conversation list is derived from.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Size of the most-recent-N window fetched on conversation open.
pub const MESSAGE_WINDOW: usize = 200;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Conversation {
    pub id: String,
    /// Cleared by the backend once the listing is deleted.
    pub listing_id: Option<String>,
    pub buyer_id: String,
    pub seller_id: String,
    /// Unix milliseconds.
    pub created_at: u64,
    /// Unix milliseconds; advanced on every new message.
    pub last_activity: u64,
    /// Cached newest message, kept for conversations whose window is not
    /// loaded. Refreshed on every window mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    /// The counterpart's read receipt for the cached last message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart_read_at: Option<u64>,
    /// The loaded message window, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(
        id: impl Into<String>,
        listing_id: Option<String>,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id: id.into(),
            listing_id,
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            created_at,
            last_activity: created_at,
            last_message: None,
            counterpart_read_at: None,
            messages: Vec::new(),
        }
    }

    /// The participant who is not the viewer.
    pub fn counterpart_of(&self, viewer_id: &str) -> &str {
        if self.buyer_id == viewer_id {
            &self.seller_id
        } else {
            &self.buyer_id
        }
    }

    /// Get the last message timestamp of the loaded window.
    pub fn last_message_time(&self) -> Option<u64> {
        self.messages.last().map(|msg| msg.at)
    }

    /// Get a message by ID.
    pub fn get_message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|msg| msg.id == id)
    }

    /// Get a mutable message by ID.
    pub fn get_message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|msg| msg.id == id)
    }

    /// Replace the window with a sorted, deduplicated copy of a bulk-load
    /// snapshot.
    pub fn load_messages(&mut self, snapshot: Vec<Message>) {
        self.messages.clear();
        for message in snapshot {
            if self.get_message(&message.id).is_none() {
                self.insert_sorted(message);
            }
        }
        self.refresh_cache();
    }

    /// Insert a message, or replace the entry already carrying its
    /// identifier. A confirmed remote record that echoes a still-pending
    /// provisional entry replaces that entry instead of duplicating it, so
    /// a provisional identifier never coexists with its durable counterpart.
    ///
    /// Returns whether the window changed.
    pub fn upsert_message(&mut self, message: Message) -> bool {
        if let Some(position) = self.messages.iter().position(|m| m.id == message.id) {
            if self.messages[position] == message {
                // Message is already known by the state
                return false;
            }
            self.messages.remove(position);
            self.insert_sorted(message);
            self.refresh_cache();
            return true;
        }

        if !message.is_provisional() {
            if let Some(position) = self.messages.iter().position(|m| m.matches_echo(&message)) {
                // The optimistic entry and this record are the same logical
                // message; the durable record wins, carrying over the local
                // receipt so the sender never sees their own message unread.
                let provisional = self.messages.remove(position);
                let mut message = message;
                if message.read_at.is_none() {
                    message.read_at = provisional.read_at;
                }
                self.insert_sorted(message);
                self.refresh_cache();
                return true;
            }
        }

        self.insert_sorted(message);
        self.refresh_cache();
        true
    }

    /// Remove a message by ID (remote delete events). Returns whether an
    /// entry was removed.
    pub fn remove_message(&mut self, id: &str) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        let removed = self.messages.len() != before;
        if removed {
            self.refresh_cache();
        }
        removed
    }

    /// Insert keeping the window sorted by `(at, id)` ascending. The tie
    /// break on identifier keeps ordering deterministic for equal
    /// timestamps.
    fn insert_sorted(&mut self, message: Message) {
        let key = (message.at, message.id.clone());

        // Fast path for common cases: newest or oldest messages
        if self.messages.is_empty() {
            self.messages.push(message);
        } else if self
            .messages
            .last()
            .map(|m| (m.at, m.id.as_str()) <= (key.0, key.1.as_str()))
            .unwrap_or(true)
        {
            // Common case 1: Latest message (append to end)
            self.messages.push(message);
        } else if self
            .messages
            .first()
            .map(|m| (m.at, m.id.as_str()) >= (key.0, key.1.as_str()))
            .unwrap_or(true)
        {
            // Common case 2: Oldest message (insert at beginning)
            self.messages.insert(0, message);
        } else {
            // Less common case: Message belongs somewhere in the middle
            let index = self
                .messages
                .binary_search_by(|m| (m.at, m.id.as_str()).cmp(&(key.0, key.1.as_str())))
                .unwrap_or_else(|idx| idx);
            self.messages.insert(index, message);
        }
    }

    /// Recompute the cached fields the conversation list reads: the newest
    /// message and the last-activity timestamp.
    pub(crate) fn refresh_cache(&mut self) {
        match self.messages.last() {
            Some(last) => {
                if last.at > self.last_activity {
                    self.last_activity = last.at;
                }
                self.last_message = Some(last.clone());
            }
            // Only window mutations land here, so an empty window really
            // means no messages remain.
            None => self.last_message = None,
        }
    }
}
