//! Multi-agent response coordination for a Roost fleet.
//!
//! Every connected agent receives its own copy of each conversation event,
//! so N agents yield N concurrent deliveries of one logical occurrence.
//! Left alone, every agent would answer the same request. This crate
//! serializes those deliveries per event fingerprint and guarantees at most
//! one visible response, while still allowing fail-over: an agent that
//! cannot fulfil a request hands the event to the next agent waiting on the
//! same gate.
//!
//! The pipeline for one (agent, event) delivery is:
//! admission gate → command dispatch (the caller's [`DeliveryHandler`]) →
//! outcome classification → release & reclaim. [`FleetCoordinator`] runs
//! the whole pipeline through [`FleetCoordinator::run_delivery_pass`].
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use roost_core::{AgentId, AgentRegistry, EventDelivery, FleetEvent};
//! use roost_coordination::{
//!     DeliveryHandler, DeliveryPassReport, DispatchControl, FleetCoordinator,
//! };
//!
//! struct EchoHandler;
//!
//! #[async_trait]
//! impl DeliveryHandler for EchoHandler {
//!     async fn dispatch(&self, _delivery: &EventDelivery) -> DispatchControl {
//!         DispatchControl::Completed
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = Arc::new(AgentRegistry::new());
//! let coordinator = FleetCoordinator::new(registry);
//! coordinator.agent_connected(AgentId::new("alpha"));
//!
//! let delivery = EventDelivery {
//!     receiver: AgentId::new("alpha"),
//!     addressed_to_receiver: false,
//!     event: FleetEvent {
//!         conversation_id: "lobby".to_string(),
//!         sequence: 1,
//!         subject_id: "user-1".to_string(),
//!         sender_id: "user-1".to_string(),
//!         body: "!score".to_string(),
//!         mentioned_agents: Vec::new(),
//!     },
//! };
//!
//! let report = coordinator.run_delivery_pass(&delivery, &EchoHandler).await;
//! assert_eq!(
//!     report,
//!     DeliveryPassReport::Dispatched(DispatchControl::Completed)
//! );
//! # }
//! ```

mod coordination_admission;
mod coordination_record;
mod coordination_store;
mod delivery_pipeline;

pub use coordination_admission::SuppressReason;
pub use coordination_record::CoordinationState;
pub use coordination_store::CoordinationStore;
pub use delivery_pipeline::{
    DeliveryHandler, DeliveryPassReport, DispatchControl, FleetCoordinator,
};
