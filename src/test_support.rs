//! Scriptable in-memory backend for tests: records every call, can be told
//! to fail specific operations, and can hold an operation open on a gate so
//! tests can interleave a racing event or a conversation switch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;

use crate::backend::{MarketBackend, SubscriptionHandle};
use crate::chat::Conversation;
use crate::message::Message;
use crate::profile::Profile;
use crate::services::ChatEvent;
use crate::shared::ChatError;
use crate::util;

pub(crate) struct MockBackend {
    conversations: Mutex<Vec<Conversation>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    profiles: Mutex<HashMap<String, Profile>>,
    read_timestamps: Mutex<HashMap<String, u64>>,

    fail_send: Mutex<bool>,
    fail_mark_read: Mutex<bool>,
    fail_profiles: Mutex<bool>,

    send_gate: Mutex<Option<Arc<Notify>>>,
    profile_gate: Mutex<Option<Arc<Notify>>>,
    list_gates: Mutex<HashMap<String, Arc<Notify>>>,

    profile_fetches: Mutex<Vec<String>>,
    send_calls: Mutex<Vec<(String, String)>>,
    mark_read_calls: Mutex<Vec<Vec<String>>>,
    channel_log: Mutex<Vec<String>>,

    senders: Mutex<HashMap<u64, UnboundedSender<ChatEvent>>>,
    next_subscription: AtomicU64,
    next_message: AtomicU64,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            conversations: Mutex::new(Vec::new()),
            messages: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            read_timestamps: Mutex::new(HashMap::new()),
            fail_send: Mutex::new(false),
            fail_mark_read: Mutex::new(false),
            fail_profiles: Mutex::new(false),
            send_gate: Mutex::new(None),
            profile_gate: Mutex::new(None),
            list_gates: Mutex::new(HashMap::new()),
            profile_fetches: Mutex::new(Vec::new()),
            send_calls: Mutex::new(Vec::new()),
            mark_read_calls: Mutex::new(Vec::new()),
            channel_log: Mutex::new(Vec::new()),
            senders: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            next_message: AtomicU64::new(1),
        }
    }

    pub(crate) fn add_conversation(&self, conversation: Conversation) {
        self.conversations.lock().unwrap().push(conversation);
    }

    pub(crate) fn seed_messages(&self, conversation_id: &str, messages: Vec<Message>) {
        self.messages
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), messages);
    }

    pub(crate) fn seed_read_timestamp(&self, message_id: &str, at: u64) {
        self.read_timestamps
            .lock()
            .unwrap()
            .insert(message_id.to_string(), at);
    }

    pub(crate) fn add_profile(&self, id: &str, name: &str) {
        self.profiles.lock().unwrap().insert(
            id.to_string(),
            Profile {
                id: id.to_string(),
                name: name.to_string(),
                email: format!("{}@campus.edu", id),
                avatar_url: None,
            },
        );
    }

    pub(crate) fn set_fail_send(&self, fail: bool) {
        *self.fail_send.lock().unwrap() = fail;
    }

    pub(crate) fn set_fail_mark_read(&self, fail: bool) {
        *self.fail_mark_read.lock().unwrap() = fail;
    }

    pub(crate) fn set_fail_profiles(&self, fail: bool) {
        *self.fail_profiles.lock().unwrap() = fail;
    }

    /// Hold every following `send_message` open until the gate is notified.
    pub(crate) fn gate_sends(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.send_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Hold every following `resolve_profile` open until notified.
    pub(crate) fn gate_profile_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.profile_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Hold `list_messages` for one conversation open until notified.
    pub(crate) fn gate_list_messages(&self, conversation_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.list_gates
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), Arc::clone(&gate));
        gate
    }

    pub(crate) fn profile_fetches(&self) -> Vec<String> {
        self.profile_fetches.lock().unwrap().clone()
    }

    pub(crate) fn send_calls(&self) -> Vec<(String, String)> {
        self.send_calls.lock().unwrap().clone()
    }

    pub(crate) fn mark_read_calls(&self) -> Vec<Vec<String>> {
        self.mark_read_calls.lock().unwrap().clone()
    }

    /// Subscribe/unsubscribe operations in call order, as
    /// `"subscribe:<id>"` / `"unsubscribe:<id>"`.
    pub(crate) fn channel_log(&self) -> Vec<String> {
        self.channel_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketBackend for MockBackend {
    async fn list_conversations(&self, viewer_id: &str) -> Result<Vec<Conversation>, ChatError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.buyer_id == viewer_id || c.seller_id == viewer_id)
            .cloned()
            .collect())
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, ChatError> {
        let gate = self.list_gates.lock().unwrap().get(conversation_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let messages = self
            .messages
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
        sender_id: &str,
    ) -> Result<Message, ChatError> {
        self.send_calls
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), body.to_string()));
        let gate = self.send_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if *self.fail_send.lock().unwrap() {
            return Err(ChatError::Transport("send refused".to_string()));
        }
        Ok(Message {
            id: format!("m-{}", self.next_message.fetch_add(1, Ordering::SeqCst)),
            conversation_id: conversation_id.to_string(),
            sender: sender_id.to_string(),
            body: body.to_string(),
            at: util::now_ms(),
            ..Default::default()
        })
    }

    async fn mark_read(&self, message_ids: &[String], _viewer_id: &str) -> Result<(), ChatError> {
        self.mark_read_calls
            .lock()
            .unwrap()
            .push(message_ids.to_vec());
        if *self.fail_mark_read.lock().unwrap() {
            return Err(ChatError::Transport("receipts unavailable".to_string()));
        }
        Ok(())
    }

    async fn fetch_read_timestamps(
        &self,
        message_ids: &[String],
        _viewer_id: &str,
    ) -> Result<HashMap<String, u64>, ChatError> {
        let stored = self.read_timestamps.lock().unwrap();
        Ok(message_ids
            .iter()
            .filter_map(|id| stored.get(id).map(|at| (id.clone(), *at)))
            .collect())
    }

    async fn resolve_profile(&self, user_id: &str) -> Result<Option<Profile>, ChatError> {
        self.profile_fetches
            .lock()
            .unwrap()
            .push(user_id.to_string());
        let gate = self.profile_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if *self.fail_profiles.lock().unwrap() {
            return Err(ChatError::Transport("profile service down".to_string()));
        }
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    async fn subscribe(
        &self,
        conversation_id: &str,
    ) -> Result<(SubscriptionHandle, UnboundedReceiver<ChatEvent>), ChatError> {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = unbounded_channel();
        self.senders.lock().unwrap().insert(id, sender);
        self.channel_log
            .lock()
            .unwrap()
            .push(format!("subscribe:{}", conversation_id));
        Ok((
            SubscriptionHandle {
                id,
                conversation_id: conversation_id.to_string(),
            },
            receiver,
        ))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), ChatError> {
        self.senders.lock().unwrap().remove(&handle.id);
        self.channel_log
            .lock()
            .unwrap()
            .push(format!("unsubscribe:{}", handle.conversation_id));
        Ok(())
    }
}
