//! Session state: known conversations and the derived conversation list.

mod chat_state;

pub use chat_state::{ChatState, ConversationSummary};
