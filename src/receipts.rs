//! Read-receipt rules.
//!
//! Marking read is best-effort and must never block message display: the
//! transport call lives on [`crate::session::ChatSession`], which logs
//! failures instead of raising them. The eligibility rules here are pure.

use crate::message::Message;

/// Identifiers of loaded messages the viewer should acknowledge: messages
/// authored by someone else with no receipt recorded. The viewer's own
/// messages are read at creation time by convention and never eligible.
pub fn eligible_for_receipt(messages: &[Message], viewer_id: &str) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.is_unread(viewer_id))
        .map(|m| m.id.clone())
        .collect()
}
