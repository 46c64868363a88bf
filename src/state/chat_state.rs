//! ChatState and the conversation-list projection.

use std::collections::HashMap;

use serde::Serialize;

use crate::chat::Conversation;
use crate::message::Message;
use crate::profile::Profile;

/// Conversations known to the session, plus the bookkeeping that guards
/// against late results landing after a conversation switch.
#[derive(Clone, Debug, Default)]
pub struct ChatState {
    pub(crate) conversations: Vec<Conversation>,
    /// The conversation whose thread is on screen, if any.
    pub(crate) active_conversation: Option<String>,
    /// Bumped on every conversation open; a bulk load is applied only if
    /// the generation it started under is still current.
    pub(crate) load_generation: u64,
}

/// One row of the conversation list, derived — never a source of truth.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub listing_id: Option<String>,
    pub counterpart_id: String,
    /// Cached profile, if the cache has one; callers run
    /// [`crate::profile::ProfileCache::ensure`] separately.
    pub counterpart: Option<Profile>,
    pub last_message: Option<Message>,
    pub last_activity: u64,
    pub unread_count: usize,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a conversation by ID.
    pub fn get_conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Get a mutable conversation by ID.
    pub fn get_conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    /// Merge a conversation fetched from the backend. Fresh metadata wins,
    /// but an already-loaded message window (and the cache derived from it)
    /// is kept.
    pub fn upsert_conversation(&mut self, incoming: Conversation) {
        match self.get_conversation_mut(&incoming.id) {
            Some(existing) => {
                existing.listing_id = incoming.listing_id;
                existing.counterpart_read_at = incoming.counterpart_read_at;
                if incoming.last_activity > existing.last_activity {
                    existing.last_activity = incoming.last_activity;
                }
                if existing.messages.is_empty() {
                    existing.last_message = incoming.last_message;
                }
            }
            None => self.conversations.push(incoming),
        }
    }

    /// Project the conversation list for the viewer: counterpart resolved as
    /// "the participant who is not the viewer", cached profile attached when
    /// present, sorted by last activity descending with the conversation id
    /// as deterministic tie-break. Pure — identical inputs give identical
    /// output, and no I/O happens here.
    pub fn project(
        &self,
        viewer_id: &str,
        profiles: &HashMap<String, Profile>,
    ) -> Vec<ConversationSummary> {
        let mut rows: Vec<ConversationSummary> = self
            .conversations
            .iter()
            .map(|convo| {
                let counterpart_id = convo.counterpart_of(viewer_id).to_string();
                ConversationSummary {
                    id: convo.id.clone(),
                    listing_id: convo.listing_id.clone(),
                    counterpart: profiles.get(&counterpart_id).cloned(),
                    counterpart_id,
                    last_message: convo.last_message.clone(),
                    last_activity: convo.last_activity,
                    unread_count: Self::unread_in(convo, viewer_id),
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| a.id.cmp(&b.id))
        });
        rows
    }

    /// Count unread messages across all conversations.
    pub fn count_unread(&self, viewer_id: &str) -> usize {
        self.conversations
            .iter()
            .map(|c| Self::unread_in(c, viewer_id))
            .sum()
    }

    fn unread_in(conversation: &Conversation, viewer_id: &str) -> usize {
        if conversation.messages.is_empty() {
            // Window not loaded; the cached last message is all we know.
            return conversation
                .last_message
                .as_ref()
                .map(|m| usize::from(m.is_unread(viewer_id)))
                .unwrap_or(0);
        }
        conversation
            .messages
            .iter()
            .filter(|m| m.is_unread(viewer_id))
            .count()
    }
}
