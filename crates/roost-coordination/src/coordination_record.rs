//! Per-event coordination state shared by every delivery of one logical
//! event.

use std::collections::HashSet;
use std::sync::Arc;

use roost_core::{AgentId, EventKey};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Progress of one logical event toward a visible response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinationState {
    /// No agent has completed a dispatch attempt yet.
    Pending,
    /// An agent produced the terminal, visible outcome. Every later
    /// delivery for this event is suppressed at the admission gate.
    Processed,
    /// An agent declined the event outright. Terminal for that agent, but
    /// later agents still get a fresh dispatch attempt; only `Processed`
    /// suppresses (long-standing fleet behavior, kept as-is).
    Declined,
    /// The last attempting agent asked for fail-over, usually because the
    /// request needs a capability that identity lacks.
    RetryRequested,
}

/// Mutable coordination bookkeeping, only ever touched while holding the
/// record's gate.
#[derive(Debug)]
pub(crate) struct CoordinationBody {
    pub(crate) state: CoordinationState,
    /// Agents that have completed their release-and-reclaim pass.
    pub(crate) seen: HashSet<AgentId>,
    /// Set by the last drainer just before the record leaves the store, so
    /// a waiter that acquires the gate afterwards knows to start over
    /// against a fresh record.
    pub(crate) retired: bool,
}

/// The per-event "lock": a capacity-1 gate serializing passes for one
/// fingerprint, plus the bookkeeping the gate protects.
///
/// The gate is a tokio mutex, so waiters park in FIFO order and a pass
/// whose task is cancelled or panics releases the gate when its guard
/// drops instead of stranding every later agent.
#[derive(Debug)]
pub(crate) struct CoordinationRecord {
    key: EventKey,
    gate: Arc<Mutex<CoordinationBody>>,
}

impl CoordinationRecord {
    pub(crate) fn new(key: EventKey) -> Arc<Self> {
        Arc::new(Self {
            key,
            gate: Arc::new(Mutex::new(CoordinationBody {
                state: CoordinationState::Pending,
                seen: HashSet::new(),
                retired: false,
            })),
        })
    }

    pub(crate) fn key(&self) -> EventKey {
        self.key
    }

    /// Blocks the calling task until any previous holder for this event
    /// releases the gate.
    pub(crate) async fn acquire(&self) -> OwnedMutexGuard<CoordinationBody> {
        Arc::clone(&self.gate).lock_owned().await
    }

    /// Non-blocking probe used by tests and store diagnostics.
    pub(crate) fn try_acquire(&self) -> Option<OwnedMutexGuard<CoordinationBody>> {
        Arc::clone(&self.gate).try_lock_owned().ok()
    }
}
