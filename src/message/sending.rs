//! Optimistic send pipeline.
//!
//! Each outgoing message moves through `composing → pending → confirmed`
//! or `composing → pending → failed`. A provisional entry appears in the
//! window immediately on submit; the transport outcome then reconciles it
//! against whatever the realtime feed delivered in the meantime, leaving at
//! most one entry per logical message.
//!
//! The pipeline assumes one outstanding send per compose surface — the
//! caller disables the composer while a send is in flight; two concurrently
//! pending sends for the same conversation are not merged here.

use crate::backend::MarketBackend;
use crate::message::Message;
use crate::session::ChatSession;
use crate::shared::ChatError;
use crate::util;

/// Upper bound on the trimmed body, in characters.
pub const MAX_BODY_LENGTH: usize = 2_000;

impl<B: MarketBackend> ChatSession<B> {
    /// Submit a message to a conversation.
    ///
    /// Validation happens before any I/O. On transport failure the
    /// provisional entry is kept — flagged failed, body preserved verbatim —
    /// so the viewer's typed content is never silently lost.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
    ) -> Result<Message, ChatError> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyBody);
        }
        let length = trimmed.chars().count();
        if length > MAX_BODY_LENGTH {
            return Err(ChatError::BodyTooLong {
                length,
                max: MAX_BODY_LENGTH,
            });
        }

        // The message appears immediately, pending confirmation.
        let provisional =
            Message::provisional(conversation_id, &self.viewer_id, trimmed, util::now_ms());
        {
            let mut state = self.state.lock().await;
            let Some(conversation) = state.get_conversation_mut(conversation_id) else {
                return Err(ChatError::UnknownConversation(conversation_id.to_string()));
            };
            conversation.upsert_message(provisional.clone());
        }

        match self
            .backend
            .send_message(conversation_id, trimmed, &self.viewer_id)
            .await
        {
            Ok(mut durable) => {
                durable.pending = false;
                durable.failed = false;
                if durable.read_at.is_none() {
                    durable.read_at = Some(durable.at);
                }

                let mut state = self.state.lock().await;
                if let Some(conversation) = state.get_conversation_mut(conversation_id) {
                    if conversation.get_message(&durable.id).is_some() {
                        // The realtime echo won the race; keep the remote
                        // entry and drop ours.
                        conversation.remove_message(&provisional.id);
                        if let Some(existing) = conversation.get_message_mut(&durable.id) {
                            existing.pending = false;
                            existing.read_at.get_or_insert(durable.at);
                        }
                    } else {
                        // Replace the provisional entry with the durable
                        // record; identifier and creation timestamp are now
                        // authoritative. (If the echo already consumed the
                        // provisional id, this remove is a no-op and the
                        // upsert is the identity.)
                        conversation.remove_message(&provisional.id);
                        conversation.upsert_message(durable.clone());
                    }
                }
                Ok(durable)
            }
            Err(e) => {
                let mut state = self.state.lock().await;
                if let Some(conversation) = state.get_conversation_mut(conversation_id) {
                    if let Some(message) = conversation.get_message_mut(&provisional.id) {
                        message.failed = true;
                    }
                }
                Err(e)
            }
        }
    }
}
