//! Core fleet primitives for Roost: the inbound event model, event-key
//! derivation, and the process-wide agent registry.
//!
//! Every agent in a Roost fleet holds its own connection to the chat
//! platform, so one user action arrives as several redundant deliveries.
//! The types here give those deliveries a shared identity (`EventKey`) and
//! track which agent identities are currently connected (`AgentRegistry`);
//! the coordination logic built on top lives in `roost-coordination`.

mod agent_registry;
mod event_key;
mod fleet_event;

pub use agent_registry::AgentRegistry;
pub use event_key::{derive_event_key, EventKey, EventKeyError};
pub use fleet_event::{AgentId, EventDelivery, FleetEvent};
