//! Error taxonomy for the conversation synchronizer.
//!
//! Validation errors are raised before any I/O; transport errors are
//! per-operation failures. Best-effort work (receipt marking, profile
//! fetches) never produces a value of this type — those paths log and
//! carry on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The message body was empty after trimming. Raised before any I/O.
    #[error("message body is empty")]
    EmptyBody,

    /// The message body exceeds the allowed length. Raised before any I/O.
    #[error("message body is too long ({length} > {max} characters)")]
    BodyTooLong { length: usize, max: usize },

    /// The backend failed to complete an operation. For sends, the
    /// provisional message is kept and flagged failed rather than dropped.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The caller addressed a conversation the session has never loaded.
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),
}
