//! Per-sign-in context that ties the pieces together.
//!
//! A [`ChatSession`] is constructed when a user signs in and dropped on
//! sign-out; it owns the backend handle, the conversation state, the
//! profile cache, and the current push subscription. All mutations to one
//! conversation's window are serialized through the state lock — the only
//! two writers are the optimistic send pipeline and the realtime
//! reconciler, which agree through the identifier/echo matching rule rather
//! than through locking.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;

use crate::backend::{MarketBackend, SubscriptionHandle};
use crate::chat::MESSAGE_WINDOW;
use crate::profile::ProfileCache;
use crate::receipts;
use crate::services::{apply_event, ChatEvent, EventOutcome};
use crate::shared::ChatError;
use crate::state::{ChatState, ConversationSummary};
use crate::util;

pub struct ChatSession<B: MarketBackend> {
    pub(crate) backend: Arc<B>,
    pub(crate) viewer_id: String,
    pub(crate) state: Mutex<ChatState>,
    pub(crate) profiles: ProfileCache,
    pub(crate) subscription: Mutex<Option<SubscriptionHandle>>,
}

impl<B: MarketBackend> ChatSession<B> {
    pub fn new(backend: Arc<B>, viewer_id: impl Into<String>) -> Self {
        Self {
            backend,
            viewer_id: viewer_id.into(),
            state: Mutex::new(ChatState::new()),
            profiles: ProfileCache::new(),
            subscription: Mutex::new(None),
        }
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn profiles(&self) -> &ProfileCache {
        &self.profiles
    }

    /// Fetch the viewer's conversations and fill the profile cache for
    /// their counterparts.
    pub async fn load_conversations(&self) -> Result<(), ChatError> {
        let conversations = self.backend.list_conversations(&self.viewer_id).await?;
        let counterparts: Vec<String> = conversations
            .iter()
            .map(|c| c.counterpart_of(&self.viewer_id).to_string())
            .collect();

        {
            let mut state = self.state.lock().await;
            for conversation in conversations {
                state.upsert_conversation(conversation);
            }
        }

        self.profiles
            .ensure(self.backend.as_ref(), &counterparts)
            .await;
        Ok(())
    }

    /// Open a conversation: tear down the previous push channel, bulk-load
    /// the message window, merge the viewer's receipts, acknowledge what is
    /// now on screen, and subscribe to the conversation's feed.
    ///
    /// Returns the event receiver for the caller's UI loop to pump into
    /// [`ChatSession::handle_event`], or `Ok(None)` when a later open
    /// superseded this one while its load was in flight — the late result
    /// is discarded rather than applied to the wrong window.
    pub async fn open_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<UnboundedReceiver<ChatEvent>>, ChatError> {
        let generation = {
            let mut state = self.state.lock().await;
            if state.get_conversation(conversation_id).is_none() {
                return Err(ChatError::UnknownConversation(conversation_id.to_string()));
            }
            state.active_conversation = Some(conversation_id.to_string());
            state.load_generation += 1;
            state.load_generation
        };

        // Unsubscribe the previous channel before subscribing the new one,
        // so no event is delivered twice.
        if let Some(handle) = self.subscription.lock().await.take() {
            if let Err(e) = self.backend.unsubscribe(handle).await {
                log::warn!("failed to unsubscribe previous channel: {}", e);
            }
        }

        let mut snapshot = self
            .backend
            .list_messages(conversation_id, MESSAGE_WINDOW)
            .await?;

        // Receipts are best-effort; a failed fetch must not block display.
        let ids: Vec<String> = snapshot.iter().map(|m| m.id.clone()).collect();
        let receipts_by_id = match self
            .backend
            .fetch_read_timestamps(&ids, &self.viewer_id)
            .await
        {
            Ok(map) => map,
            Err(e) => {
                log::warn!("fetching read receipts for {} failed: {}", conversation_id, e);
                Default::default()
            }
        };
        for message in &mut snapshot {
            if let Some(at) = receipts_by_id.get(&message.id) {
                message.read_at = Some(*at);
            } else if message.sender == self.viewer_id {
                // Own messages are read at creation by convention.
                message.read_at.get_or_insert(message.at);
            }
        }

        let to_acknowledge = {
            let mut state = self.state.lock().await;
            if state.load_generation != generation
                || state.active_conversation.as_deref() != Some(conversation_id)
            {
                log::debug!("discarding stale window load for {}", conversation_id);
                return Ok(None);
            }
            match state.get_conversation_mut(conversation_id) {
                Some(conversation) => {
                    conversation.load_messages(snapshot);
                    receipts::eligible_for_receipt(&conversation.messages, &self.viewer_id)
                }
                None => return Ok(None),
            }
        };

        // The thread is on screen now; acknowledge what the viewer can see.
        self.mark_read_ids(conversation_id, &to_acknowledge).await;

        let (handle, receiver) = self.backend.subscribe(conversation_id).await?;
        let superseded = {
            let state = self.state.lock().await;
            state.load_generation != generation
        };
        if superseded {
            if let Err(e) = self.backend.unsubscribe(handle).await {
                log::warn!("failed to unsubscribe superseded channel: {}", e);
            }
            return Ok(None);
        }
        *self.subscription.lock().await = Some(handle);
        Ok(Some(receiver))
    }

    /// Merge one push event into the active conversation. Events addressed
    /// to any other conversation — stale channels, switch races — are
    /// dropped. When the applied event came from the counterpart, the
    /// message is acknowledged immediately: the viewer is looking at this
    /// thread right now.
    pub async fn handle_event(&self, event: ChatEvent) {
        let conversation_id = event.conversation_id().to_string();
        let from_counterpart = event
            .sender()
            .map(|sender| sender != self.viewer_id)
            .unwrap_or(false);
        let message_id = event.message_id().map(str::to_string);

        let acknowledge = {
            let mut state = self.state.lock().await;
            if state.active_conversation.as_deref() != Some(conversation_id.as_str()) {
                log::debug!("dropping event for inactive conversation {}", conversation_id);
                return;
            }
            let Some(conversation) = state.get_conversation_mut(&conversation_id) else {
                return;
            };
            let outcome = apply_event(conversation, event);
            match outcome {
                EventOutcome::Inserted | EventOutcome::Updated => {
                    from_counterpart
                        && message_id
                            .as_deref()
                            .and_then(|id| conversation.get_message(id))
                            .map(|m| m.is_unread(&self.viewer_id))
                            .unwrap_or(false)
                }
                EventOutcome::Removed | EventOutcome::Ignored => false,
            }
        };

        if acknowledge {
            if let Some(id) = message_id {
                self.mark_read_ids(&conversation_id, &[id]).await;
            }
        }
    }

    /// Acknowledge every unread counterpart message in a conversation.
    /// Best-effort, like all receipt work.
    pub async fn mark_conversation_read(&self, conversation_id: &str) {
        let eligible = {
            let state = self.state.lock().await;
            match state.get_conversation(conversation_id) {
                Some(conversation) => {
                    receipts::eligible_for_receipt(&conversation.messages, &self.viewer_id)
                }
                None => return,
            }
        };
        self.mark_read_ids(conversation_id, &eligible).await;
    }

    /// Record receipts for the given messages. Failures are logged and
    /// swallowed — marking read never blocks or breaks message display.
    pub(crate) async fn mark_read_ids(&self, conversation_id: &str, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        match self.backend.mark_read(ids, &self.viewer_id).await {
            Ok(()) => {
                let now = util::now_ms();
                let mut state = self.state.lock().await;
                if let Some(conversation) = state.get_conversation_mut(conversation_id) {
                    for id in ids {
                        if let Some(message) = conversation.get_message_mut(id) {
                            message.read_at.get_or_insert(now);
                        }
                    }
                }
            }
            Err(e) => log::warn!("marking {} messages read in {} failed: {}", ids.len(), conversation_id, e),
        }
    }

    /// The conversation list for the viewer, most recently active first.
    pub async fn project(&self) -> Vec<ConversationSummary> {
        let profiles = self.profiles.snapshot().await;
        let state = self.state.lock().await;
        state.project(&self.viewer_id, &profiles)
    }

    /// Total unread messages across all conversations.
    pub async fn unread_count(&self) -> usize {
        self.state.lock().await.count_unread(&self.viewer_id)
    }

    /// Drop a failed provisional message so the composer can resubmit it.
    /// Returns whether an entry was removed.
    pub async fn discard_failed_message(&self, conversation_id: &str, message_id: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.get_conversation_mut(conversation_id) {
            Some(conversation) => match conversation.get_message(message_id) {
                Some(message) if message.failed => conversation.remove_message(message_id),
                _ => false,
            },
            None => false,
        }
    }

    /// Tear down the live channel. Used on sign-out.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().await;
            state.active_conversation = None;
            state.load_generation += 1;
        }
        if let Some(handle) = self.subscription.lock().await.take() {
            if let Err(e) = self.backend.unsubscribe(handle).await {
                log::warn!("failed to unsubscribe on close: {}", e);
            }
        }
    }
}
