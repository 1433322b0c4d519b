//! Pre-dispatch admission decisions for one (agent, event) delivery.

use roost_core::{AgentRegistry, EventDelivery};

/// Why a delivery was kept away from command dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The sender is one of the fleet's own agents; agents never react to
    /// each other.
    FleetSender,
    /// The message @-mentions a different fleet agent and was not addressed
    /// to this one, so only the addressed agent attempts it.
    MentionForOtherAgent,
    /// Another agent already produced the visible response for this event.
    AlreadyProcessed,
}

/// Unconditional suppression checks that run before any coordination state
/// is touched. A fleet-sender suppression skips coordination entirely
/// (every agent suppresses the delivery, so no record ever exists); a
/// mention suppression still counts as this agent's pass so the mentioned
/// agent's record can drain.
pub(crate) fn precheck_delivery(
    registry: &AgentRegistry,
    delivery: &EventDelivery,
) -> Option<SuppressReason> {
    if registry.is_connected_sender(&delivery.event.sender_id) {
        return Some(SuppressReason::FleetSender);
    }
    if mention_targets_other_agent(registry, delivery) {
        return Some(SuppressReason::MentionForOtherAgent);
    }
    None
}

fn mention_targets_other_agent(registry: &AgentRegistry, delivery: &EventDelivery) -> bool {
    if delivery.addressed_to_receiver {
        return false;
    }
    let mentions_receiver = delivery
        .event
        .mentioned_agents
        .iter()
        .any(|id| *id == delivery.receiver);
    if mentions_receiver {
        return false;
    }
    delivery
        .event
        .mentioned_agents
        .iter()
        .any(|id| registry.is_connected(id))
}
