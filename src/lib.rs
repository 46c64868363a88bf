//! Realtime conversation synchronizer for the UMarket student marketplace.
//!
//! Keeps a buyer's and a seller's view of a chat thread converged across
//! three independently-arriving sources of truth about the same message
//! window: the bulk load on conversation open, locally-originated
//! optimistic sends, and the push feed of remote inserts/updates/deletes.
//! There is no central sequence number — the optimistic path and the
//! realtime path reconcile through identifier substitution and the echo
//! matching rule on (sender, body, timestamp proximity).
//!
//! This crate is a library consumed by a presentation layer; the backend
//! (auth, storage, the push channel itself) is abstracted behind
//! [`MarketBackend`]. A [`ChatSession`] is built per signed-in user and
//! dropped on sign-out.

pub mod backend;
pub mod chat;
pub mod message;
pub mod profile;
pub mod receipts;
pub mod services;
pub mod session;
pub mod shared;
pub mod state;

mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{MarketBackend, SubscriptionHandle};
pub use chat::{Conversation, MESSAGE_WINDOW};
pub use message::{Message, ECHO_MATCH_WINDOW_MS, MAX_BODY_LENGTH, PROVISIONAL_PREFIX};
pub use profile::{Profile, ProfileCache};
pub use services::{apply_event, ChatEvent, EventOutcome};
pub use session::ChatSession;
pub use shared::ChatError;
pub use state::{ChatState, ConversationSummary};
