//! Deterministic fingerprints identifying one logical event across its
//! redundant per-agent deliveries.

use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::fleet_event::FleetEvent;

/// Fingerprint shared by every redundant delivery of the same logical event.
///
/// This is a deduplication key, not a security boundary: SHA-256 over the
/// event's stable triple is collision-resistant far beyond what a chat
/// workload needs, and the digest never includes the receiving agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey([u8; 32]);

impl EventKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for EventKey {
    /// Renders the first eight digest bytes as hex, enough to tell keys
    /// apart in an operational log without flooding it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Malformed-event cases where no coordination fingerprint can exist.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventKeyError {
    #[error("event has a blank conversation id")]
    BlankConversationId,
    #[error("event has a blank subject id")]
    BlankSubjectId,
}

/// Derives the coordination fingerprint from an event's stable triple.
///
/// Two deliveries yield the same key exactly when they carry the same
/// `(conversation_id, sequence, subject_id)` triple. Callers that receive
/// an error must fail open and process the delivery as a unique, unshared
/// event rather than drop it.
///
/// # Examples
///
/// ```
/// use roost_core::{derive_event_key, FleetEvent};
///
/// let event = FleetEvent {
///     conversation_id: "lobby".to_string(),
///     sequence: 1_700_000_000,
///     subject_id: "user-7".to_string(),
///     sender_id: "user-7".to_string(),
///     body: "!score".to_string(),
///     mentioned_agents: Vec::new(),
/// };
///
/// let key = derive_event_key(&event)?;
/// assert_eq!(key, derive_event_key(&event)?);
/// # Ok::<(), roost_core::EventKeyError>(())
/// ```
pub fn derive_event_key(event: &FleetEvent) -> Result<EventKey, EventKeyError> {
    let conversation = event.conversation_id.trim();
    if conversation.is_empty() {
        return Err(EventKeyError::BlankConversationId);
    }
    let subject = event.subject_id.trim();
    if subject.is_empty() {
        return Err(EventKeyError::BlankSubjectId);
    }

    // Length-prefix the variable fields so ("ab", "c") and ("a", "bc")
    // cannot collide.
    let mut hasher = Sha256::new();
    hasher.update((conversation.len() as u64).to_be_bytes());
    hasher.update(conversation.as_bytes());
    hasher.update(event.sequence.to_be_bytes());
    hasher.update((subject.len() as u64).to_be_bytes());
    hasher.update(subject.as_bytes());
    Ok(EventKey(hasher.finalize().into()))
}
