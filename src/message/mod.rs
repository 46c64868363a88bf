//! Messages: the data type and the optimistic send pipeline.

mod sending;
mod types;

pub use sending::MAX_BODY_LENGTH;
pub use types::{Message, ECHO_MATCH_WINDOW_MS, PROVISIONAL_PREFIX};
