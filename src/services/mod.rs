//! Realtime reconciliation: the push event types and the pure reducer that
//! merges them into conversation state.

pub mod event_handler;

pub use event_handler::{apply_event, ChatEvent, EventOutcome};
