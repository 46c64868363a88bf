//! Push events and the reducer that merges them into a conversation.
//!
//! Events are classified by an explicit `kind` field on the wire — never
//! inferred by diffing — and the reducer is a pure function over
//! `(conversation, event)` so it can be tested without a live transport.

use serde::{Deserialize, Serialize};

use crate::chat::Conversation;
use crate::message::Message;

/// One change streamed from the push feed of a conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEvent {
    Insert {
        message: Message,
    },
    Update {
        message: Message,
    },
    Delete {
        conversation_id: String,
        id: String,
    },
}

impl ChatEvent {
    /// Parse a feed payload.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// The conversation this event is scoped to.
    pub fn conversation_id(&self) -> &str {
        match self {
            ChatEvent::Insert { message } | ChatEvent::Update { message } => {
                &message.conversation_id
            }
            ChatEvent::Delete {
                conversation_id, ..
            } => conversation_id,
        }
    }

    /// The sender of the affected message, when the event carries one.
    pub fn sender(&self) -> Option<&str> {
        match self {
            ChatEvent::Insert { message } | ChatEvent::Update { message } => {
                Some(message.sender.as_str())
            }
            ChatEvent::Delete { .. } => None,
        }
    }

    /// The identifier of the affected message, when the event carries one.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            ChatEvent::Insert { message } | ChatEvent::Update { message } => {
                Some(message.id.as_str())
            }
            ChatEvent::Delete { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Inserted,
    Updated,
    Removed,
    /// Duplicate insert, update for an unknown identifier, or delete of an
    /// absent entry.
    Ignored,
}

/// Merge one push event into a conversation's window. Pure — no I/O; the
/// caller decides what receipt or subscription work follows.
pub fn apply_event(conversation: &mut Conversation, event: ChatEvent) -> EventOutcome {
    match event {
        ChatEvent::Insert { message } => {
            if conversation.upsert_message(message) {
                EventOutcome::Inserted
            } else {
                EventOutcome::Ignored
            }
        }
        ChatEvent::Update { message } => {
            let updated = match conversation.get_message_mut(&message.id) {
                Some(existing) => {
                    existing.apply_update(&message);
                    true
                }
                None => false,
            };
            if updated {
                conversation.refresh_cache();
                EventOutcome::Updated
            } else {
                log::debug!(
                    "update for unknown message {} in {}",
                    message.id,
                    conversation.id
                );
                EventOutcome::Ignored
            }
        }
        ChatEvent::Delete { id, .. } => {
            if conversation.remove_message(&id) {
                EventOutcome::Removed
            } else {
                EventOutcome::Ignored
            }
        }
    }
}
