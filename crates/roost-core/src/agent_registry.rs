//! Process-wide roster of the fleet's currently-connected agent identities.

use std::collections::HashSet;
use std::sync::RwLock;

use crate::fleet_event::AgentId;

/// Shared roster of connected agents.
///
/// The transport layer's connect/disconnect hooks are the only writers.
/// Coordination reads the roster both for the fleet-sender check and to
/// decide when a record is fully drained, so membership is always the
/// current roster, never a snapshot: an agent that disconnects mid-flight
/// stops being expected, and one that connects mid-flight becomes expected.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    connected: RwLock<HashSet<AgentId>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly-opened agent connection. Returns `false` when the
    /// identity was already registered.
    pub fn agent_connected(&self, id: AgentId) -> bool {
        self.connected
            .write()
            .expect("agent registry lock poisoned")
            .insert(id)
    }

    /// Records a closed agent connection. Returns `false` when the identity
    /// was not registered.
    pub fn agent_disconnected(&self, id: &AgentId) -> bool {
        self.connected
            .write()
            .expect("agent registry lock poisoned")
            .remove(id)
    }

    pub fn is_connected(&self, id: &AgentId) -> bool {
        self.connected
            .read()
            .expect("agent registry lock poisoned")
            .contains(id)
    }

    /// Whether a raw platform sender id belongs to one of the fleet's own
    /// connected agents.
    pub fn is_connected_sender(&self, sender_id: &str) -> bool {
        self.connected
            .read()
            .expect("agent registry lock poisoned")
            .iter()
            .any(|agent| agent.as_str() == sender_id)
    }

    pub fn current_agents(&self) -> HashSet<AgentId> {
        self.connected
            .read()
            .expect("agent registry lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.connected
            .read()
            .expect("agent registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
