//! Inbound chat event model shared by every transport connection in the fleet.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one independently-authenticated bot account in the fleet.
///
/// # Examples
///
/// ```
/// use roost_core::AgentId;
///
/// let id = AgentId::new("quizmaster");
/// assert_eq!(id.as_str(), "quizmaster");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// One chat-platform occurrence as observed by a single agent connection.
///
/// The `conversation_id` / `sequence` / `subject_id` triple is identical
/// across every redundant delivery of the same occurrence; the remaining
/// fields describe the occurrence itself and may be empty depending on the
/// event kind (a membership change has no `body`, for example).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetEvent {
    pub conversation_id: String,
    /// Platform sequence number or timestamp for the occurrence.
    pub sequence: u64,
    /// Sender or affected member, whichever the occurrence is about.
    pub subject_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub body: String,
    /// Fleet agents explicitly @-mentioned in the message, if any.
    #[serde(default)]
    pub mentioned_agents: Vec<AgentId>,
}

/// One (agent, event) delivery handed to the coordination pipeline.
///
/// The transport layer produces exactly one of these per connected agent
/// for each occurrence that agent witnessed.
#[derive(Debug, Clone)]
pub struct EventDelivery {
    pub receiver: AgentId,
    /// Whether the occurrence was directed at the receiving agent
    /// specifically (direct mention or direct message).
    pub addressed_to_receiver: bool,
    pub event: FleetEvent,
}
