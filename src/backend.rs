//! Contract with the marketplace backend.
//!
//! The synchronizer only consumes these operations; authentication, storage
//! and the push channel itself belong to the surrounding application. All
//! transport failures surface as [`ChatError::Transport`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::chat::Conversation;
use crate::message::Message;
use crate::profile::Profile;
use crate::services::ChatEvent;
use crate::shared::ChatError;

/// Identifies one live push channel. Returned by [`MarketBackend::subscribe`],
/// consumed by [`MarketBackend::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub conversation_id: String,
}

#[async_trait]
pub trait MarketBackend: Send + Sync {
    /// All conversations the viewer participates in, without message
    /// windows; `last_message` and `counterpart_read_at` come pre-seeded.
    async fn list_conversations(&self, viewer_id: &str) -> Result<Vec<Conversation>, ChatError>;

    /// The most recent `limit` messages of a conversation, oldest first.
    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, ChatError>;

    /// Persist a message and return the durable record.
    async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
        sender_id: &str,
    ) -> Result<Message, ChatError>;

    /// Record read receipts. Callers treat this as best-effort.
    async fn mark_read(&self, message_ids: &[String], viewer_id: &str) -> Result<(), ChatError>;

    /// The viewer's recorded receipts for the given messages; identifiers
    /// with no receipt are absent from the map.
    async fn fetch_read_timestamps(
        &self,
        message_ids: &[String],
        viewer_id: &str,
    ) -> Result<HashMap<String, u64>, ChatError>;

    /// Display metadata for a user; `Ok(None)` when the user is unknown.
    async fn resolve_profile(&self, user_id: &str) -> Result<Option<Profile>, ChatError>;

    /// Open a push channel scoped to one conversation. Events flow through
    /// the returned receiver until [`MarketBackend::unsubscribe`] is called
    /// with the handle.
    async fn subscribe(
        &self,
        conversation_id: &str,
    ) -> Result<(SubscriptionHandle, UnboundedReceiver<ChatEvent>), ChatError>;

    /// Tear down a push channel.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), ChatError>;
}
