//! Message types and helpers.

use serde::{Deserialize, Serialize};

/// Identifier prefix for locally-created messages awaiting confirmation.
pub const PROVISIONAL_PREFIX: &str = "pending-";

/// Tolerance, in milliseconds, when matching a server echo of a message
/// against a still-pending provisional entry. The local clock stamps the
/// provisional entry and the server stamps the durable record, so the two
/// creation timestamps are close but never identical.
pub const ECHO_MATCH_WINDOW_MS: u64 = 5_000;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub body: String,
    /// Creation timestamp, Unix milliseconds.
    pub at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<u64>,
    #[serde(default)]
    pub deleted: bool,
    /// Read receipt of the viewing user only, Unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<u64>,
    /// Awaiting transport confirmation (local-only).
    #[serde(default)]
    pub pending: bool,
    /// The transport rejected the send; the body is kept for retry (local-only).
    #[serde(default)]
    pub failed: bool,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            id: String::new(),
            conversation_id: String::new(),
            sender: String::new(),
            body: String::new(),
            at: 0,
            edited_at: None,
            deleted: false,
            read_at: None,
            pending: false,
            failed: false,
        }
    }
}

impl Message {
    /// Build the provisional entry inserted on submit, before the transport
    /// call resolves. The sender's own message is read at creation time by
    /// convention, so it can never show as unread to them.
    pub(crate) fn provisional(conversation_id: &str, sender: &str, body: &str, at: u64) -> Self {
        Self {
            id: format!("{}{}", PROVISIONAL_PREFIX, crate::util::now_nanos()),
            conversation_id: conversation_id.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
            at,
            read_at: Some(at),
            pending: true,
            ..Default::default()
        }
    }

    /// Whether this entry carries a locally-generated identifier.
    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_PREFIX)
    }

    /// True iff someone else sent this and no receipt is recorded. The
    /// viewer's own messages are never unread to them.
    pub fn is_unread(&self, viewer_id: &str) -> bool {
        self.sender != viewer_id && self.read_at.is_none()
    }

    /// Whether `incoming` (a confirmed remote record) is the server echo of
    /// this still-pending entry: same sender, same trimmed body, creation
    /// timestamps within [`ECHO_MATCH_WINDOW_MS`].
    pub fn matches_echo(&self, incoming: &Message) -> bool {
        self.pending
            && self.sender == incoming.sender
            && self.body.trim() == incoming.body.trim()
            && self.at.abs_diff(incoming.at) <= ECHO_MATCH_WINDOW_MS
    }

    /// Overwrite the mutable fields from a remote update event, preserving
    /// identifier and creation timestamp. Last write wins.
    pub fn apply_update(&mut self, incoming: &Message) {
        self.body = incoming.body.clone();
        self.edited_at = incoming.edited_at;
        self.deleted = incoming.deleted;
        if incoming.read_at.is_some() {
            self.read_at = incoming.read_at;
        }
        self.pending = false;
        self.failed = false;
    }
}
