//! Delivery entry point: admission gate, command dispatch, outcome
//! classification, and release & reclaim for one (agent, event) pass.

use std::sync::Arc;

use async_trait::async_trait;
use roost_core::{derive_event_key, AgentId, AgentRegistry, EventDelivery, EventKey};
use tokio::sync::OwnedMutexGuard;

use crate::coordination_admission::{precheck_delivery, SuppressReason};
use crate::coordination_record::{CoordinationBody, CoordinationRecord, CoordinationState};
use crate::coordination_store::CoordinationStore;

/// Control signal a command handler returns to the coordination pipeline.
///
/// These are flow-control verdicts about multi-agent coordination, not
/// error reporting: a handler whose business logic fails internally still
/// returns `Completed` (it ran to completion and owns whatever it surfaced)
/// unless a *different agent* should take the event instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchControl {
    /// Dispatch ran to completion, whether or not any command matched. The
    /// visible outcome, if any, came from this agent.
    Completed,
    /// This agent refuses the event and considers the refusal final.
    Declined,
    /// This agent cannot fulfil the request (e.g. a capability its
    /// identity lacks); the next agent waiting on the gate should get a
    /// full, fresh attempt.
    RetryElsewhere,
}

/// Command matching and business handling for admitted deliveries.
///
/// Implementations live entirely outside this crate; the coordinator only
/// cares about the returned [`DispatchControl`].
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn dispatch(&self, delivery: &EventDelivery) -> DispatchControl;
}

/// What one pass through the pipeline did with its delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPassReport {
    /// The delivery never reached command dispatch.
    Suppressed(SuppressReason),
    /// The delivery was admitted and dispatched under the gate.
    Dispatched(DispatchControl),
    /// The event key could not be derived (or the store was corrupt), so
    /// dispatch ran without coordination rather than dropping a
    /// user-visible interaction.
    DispatchedUncoordinated(DispatchControl),
}

/// Owns the coordination store and runs the full per-delivery pipeline.
///
/// One coordinator is shared by every agent connection in the process; the
/// transport layer calls [`FleetCoordinator::run_delivery_pass`] once per
/// (agent, event) delivery and the connect/disconnect hooks as connections
/// open and close.
pub struct FleetCoordinator {
    registry: Arc<AgentRegistry>,
    store: CoordinationStore,
}

impl FleetCoordinator {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            store: CoordinationStore::new(),
        }
    }

    pub fn with_store(registry: Arc<AgentRegistry>, store: CoordinationStore) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn store(&self) -> &CoordinationStore {
        &self.store
    }

    /// Connect hook; must run before any delivery from this agent's
    /// connection enters the pipeline.
    pub fn agent_connected(&self, id: AgentId) {
        if self.registry.agent_connected(id.clone()) {
            tracing::info!(agent = %id, fleet_size = self.registry.len(), "agent connected");
        }
    }

    /// Disconnect hook. Events the departed agent never passed through stop
    /// counting it as expected, so reclaim of their records can still
    /// complete.
    pub fn agent_disconnected(&self, id: &AgentId) {
        if self.registry.agent_disconnected(id) {
            tracing::info!(agent = %id, fleet_size = self.registry.len(), "agent disconnected");
        }
    }

    /// Runs one (agent, event) delivery through admission, dispatch,
    /// outcome classification, and release & reclaim.
    ///
    /// For a fixed event fingerprint, concurrent passes are totally ordered
    /// by gate acquisition; dispatch runs while the gate is held, so at
    /// most one agent is attempting a given event at any moment, and once
    /// one attempt completes successfully every later pass is suppressed.
    #[tracing::instrument(
        name = "roost_coordination.delivery_pass",
        skip(self, delivery, handler),
        fields(
            agent = %delivery.receiver,
            conversation = %delivery.event.conversation_id,
            sequence = delivery.event.sequence
        )
    )]
    pub async fn run_delivery_pass(
        &self,
        delivery: &EventDelivery,
        handler: &dyn DeliveryHandler,
    ) -> DeliveryPassReport {
        if let Some(reason) = precheck_delivery(&self.registry, delivery) {
            tracing::debug!(?reason, "delivery suppressed before dispatch");
            if reason == SuppressReason::MentionForOtherAgent {
                // This agent still witnessed the event; without its pass in
                // `seen`, the mentioned agent's record would wait forever
                // for agents that will never arrive. Fleet-sender events
                // need no accounting: every agent suppresses them and none
                // ever creates a record.
                self.account_suppressed_pass(delivery).await;
            }
            return DeliveryPassReport::Suppressed(reason);
        }

        let key = match derive_event_key(&delivery.event) {
            Ok(key) => key,
            Err(error) => {
                tracing::warn!(%error, "event key derivation failed; dispatching uncoordinated");
                return DeliveryPassReport::DispatchedUncoordinated(
                    handler.dispatch(delivery).await,
                );
            }
        };

        let (record, mut body) = match self.acquire_gate(key).await {
            Ok(acquired) => acquired,
            Err(error) => {
                tracing::warn!(event_key = %key, %error, "coordination store unavailable; dispatching uncoordinated");
                return DeliveryPassReport::DispatchedUncoordinated(
                    handler.dispatch(delivery).await,
                );
            }
        };

        if body.state == CoordinationState::Processed {
            tracing::debug!(event_key = %key, "delivery suppressed; event already processed");
            self.release_and_reclaim(&record, &mut body, &delivery.receiver);
            return DeliveryPassReport::Suppressed(SuppressReason::AlreadyProcessed);
        }

        // Admitted: dispatch runs while this pass holds the gate.
        let control = handler.dispatch(delivery).await;
        body.state = match control {
            DispatchControl::Completed => CoordinationState::Processed,
            DispatchControl::Declined => CoordinationState::Declined,
            DispatchControl::RetryElsewhere => CoordinationState::RetryRequested,
        };
        tracing::debug!(event_key = %key, ?control, "dispatch finished");

        self.release_and_reclaim(&record, &mut body, &delivery.receiver);
        DeliveryPassReport::Dispatched(control)
    }

    /// Completes the release-and-reclaim bookkeeping for a delivery that
    /// never reaches dispatch: acquire the gate, record the agent in
    /// `seen`, and run the drain check. Keyless or storeless deliveries
    /// have nothing to account.
    async fn account_suppressed_pass(&self, delivery: &EventDelivery) {
        let key = match derive_event_key(&delivery.event) {
            Ok(key) => key,
            Err(error) => {
                tracing::warn!(%error, "event key derivation failed; nothing to account for suppressed delivery");
                return;
            }
        };
        match self.acquire_gate(key).await {
            Ok((record, mut body)) => {
                self.release_and_reclaim(&record, &mut body, &delivery.receiver);
            }
            Err(error) => {
                tracing::warn!(event_key = %key, %error, "coordination store unavailable; skipping suppressed-pass accounting");
            }
        }
    }

    /// Looks up or lazily creates the record for `key` and awaits its gate.
    ///
    /// A record can be reclaimed between our shard lookup and our turn at
    /// the gate; such a record surfaces as `retired` and we start over
    /// against a fresh one.
    async fn acquire_gate(
        &self,
        key: EventKey,
    ) -> anyhow::Result<(Arc<CoordinationRecord>, OwnedMutexGuard<CoordinationBody>)> {
        loop {
            let record = self.store.get_or_insert(key)?;
            let body = record.acquire().await;
            if body.retired {
                continue;
            }
            return Ok((record, body));
        }
    }

    /// Release & reclaim, run after every coordinated pass whether it was
    /// admitted or suppressed.
    ///
    /// Accounts for `agent` in `seen`; when the event has a terminal
    /// visible outcome and every currently-registered agent is accounted
    /// for, the record is retired and removed while the gate is still held
    /// so no late waiter can resurrect it. In every other case the gate is
    /// simply released when the caller drops the guard, waking the next
    /// waiting pass.
    fn release_and_reclaim(
        &self,
        record: &CoordinationRecord,
        body: &mut OwnedMutexGuard<CoordinationBody>,
        agent: &AgentId,
    ) {
        body.seen.insert(agent.clone());

        if body.state != CoordinationState::Processed {
            return;
        }
        let outstanding = self
            .registry
            .current_agents()
            .into_iter()
            .filter(|expected| !body.seen.contains(expected))
            .count();
        if outstanding > 0 {
            return;
        }

        body.retired = true;
        if let Err(error) = self.store.remove(&record.key()) {
            tracing::warn!(event_key = %record.key(), %error, "failed to reclaim drained coordination record");
            return;
        }
        tracing::debug!(
            event_key = %record.key(),
            drained_agents = body.seen.len(),
            "coordination record drained and reclaimed"
        );
    }
}
