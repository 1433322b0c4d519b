//! End-to-end fleet scenarios: redundant deliveries, capability fail-over,
//! and record reclaim under concurrency.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::future::join_all;
use roost_coordination::{
    DeliveryHandler, DeliveryPassReport, DispatchControl, FleetCoordinator, SuppressReason,
};
use roost_core::{AgentId, AgentRegistry, EventDelivery, FleetEvent};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fleet_of(agents: &[&str]) -> Arc<FleetCoordinator> {
    let coordinator = Arc::new(FleetCoordinator::new(Arc::new(AgentRegistry::new())));
    for agent in agents {
        coordinator.agent_connected(AgentId::new(*agent));
    }
    coordinator
}

fn delivery(agent: &str, conversation: &str, sequence: u64, sender: &str) -> EventDelivery {
    EventDelivery {
        receiver: AgentId::new(agent),
        addressed_to_receiver: false,
        event: FleetEvent {
            conversation_id: conversation.to_string(),
            sequence,
            subject_id: sender.to_string(),
            sender_id: sender.to_string(),
            body: "!trivia start".to_string(),
            mentioned_agents: Vec::new(),
        },
    }
}

/// Records which agent dispatched which conversation/sequence pair.
#[derive(Default)]
struct RecordingHandler {
    dispatches: Mutex<Vec<(AgentId, String, u64)>>,
}

impl RecordingHandler {
    fn dispatches(&self) -> Vec<(AgentId, String, u64)> {
        self.dispatches.lock().expect("dispatch log lock").clone()
    }
}

#[async_trait]
impl DeliveryHandler for RecordingHandler {
    async fn dispatch(&self, delivery: &EventDelivery) -> DispatchControl {
        self.dispatches.lock().expect("dispatch log lock").push((
            delivery.receiver.clone(),
            delivery.event.conversation_id.clone(),
            delivery.event.sequence,
        ));
        DispatchControl::Completed
    }
}

/// Fails over unless the receiving agent is in the capable set.
struct CapabilityHandler {
    capable: HashSet<AgentId>,
    attempts: Mutex<Vec<AgentId>>,
}

impl CapabilityHandler {
    fn new(capable: &[&str]) -> Self {
        Self {
            capable: capable.iter().map(|id| AgentId::new(*id)).collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> Vec<AgentId> {
        self.attempts.lock().expect("attempt log lock").clone()
    }
}

#[async_trait]
impl DeliveryHandler for CapabilityHandler {
    async fn dispatch(&self, delivery: &EventDelivery) -> DispatchControl {
        self.attempts
            .lock()
            .expect("attempt log lock")
            .push(delivery.receiver.clone());
        if self.capable.contains(&delivery.receiver) {
            DispatchControl::Completed
        } else {
            DispatchControl::RetryElsewhere
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_concurrent_fleet_answers_each_event_exactly_once() {
    init_tracing();
    let agents = ["alpha", "beta", "gamma", "delta"];
    let coordinator = fleet_of(&agents);
    let handler = Arc::new(RecordingHandler::default());

    // Every agent witnesses every one of 20 occurrences spread over two
    // conversations; 80 deliveries race through the pipeline.
    let mut passes = Vec::new();
    for sequence in 0..20u64 {
        let conversation = if sequence % 2 == 0 { "lobby" } else { "arena" };
        for agent in agents {
            let coordinator = Arc::clone(&coordinator);
            let handler = Arc::clone(&handler);
            let delivery = delivery(agent, conversation, sequence, "user-7");
            passes.push(tokio::spawn(async move {
                coordinator.run_delivery_pass(&delivery, &*handler).await
            }));
        }
    }
    for report in join_all(passes).await {
        report.expect("pass task");
    }

    let dispatches = handler.dispatches();
    assert_eq!(dispatches.len(), 20);
    let mut seen_events = HashSet::new();
    for (_, conversation, sequence) in &dispatches {
        assert!(
            seen_events.insert((conversation.clone(), *sequence)),
            "event ({conversation}, {sequence}) answered more than once"
        );
    }
    assert!(coordinator.store().is_empty());
}

#[tokio::test]
async fn integration_failover_walks_agents_until_one_is_capable() {
    init_tracing();
    let coordinator = fleet_of(&["alpha", "beta", "gamma", "delta"]);
    let handler = CapabilityHandler::new(&["gamma", "delta"]);

    let reports = [
        coordinator
            .run_delivery_pass(&delivery("alpha", "lobby", 5, "user-1"), &handler)
            .await,
        coordinator
            .run_delivery_pass(&delivery("beta", "lobby", 5, "user-1"), &handler)
            .await,
        coordinator
            .run_delivery_pass(&delivery("gamma", "lobby", 5, "user-1"), &handler)
            .await,
        coordinator
            .run_delivery_pass(&delivery("delta", "lobby", 5, "user-1"), &handler)
            .await,
    ];

    assert_eq!(
        reports,
        [
            DeliveryPassReport::Dispatched(DispatchControl::RetryElsewhere),
            DeliveryPassReport::Dispatched(DispatchControl::RetryElsewhere),
            DeliveryPassReport::Dispatched(DispatchControl::Completed),
            DeliveryPassReport::Suppressed(SuppressReason::AlreadyProcessed),
        ]
    );
    assert_eq!(
        handler.attempts(),
        vec![
            AgentId::new("alpha"),
            AgentId::new("beta"),
            AgentId::new("gamma")
        ]
    );
    // All four agents passed through, so the drained record is gone.
    assert!(coordinator.store().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_concurrent_failover_yields_one_visible_response() {
    init_tracing();
    let agents = ["alpha", "beta", "gamma", "delta"];
    let coordinator = fleet_of(&agents);
    let handler = Arc::new(CapabilityHandler::new(&["delta"]));

    let mut passes = Vec::new();
    for agent in agents {
        let coordinator = Arc::clone(&coordinator);
        let handler = Arc::clone(&handler);
        let delivery = delivery(agent, "arena", 99, "user-3");
        passes.push(tokio::spawn(async move {
            coordinator.run_delivery_pass(&delivery, &*handler).await
        }));
    }

    let mut completed = 0;
    for pass in join_all(passes).await {
        if let DeliveryPassReport::Dispatched(DispatchControl::Completed) =
            pass.expect("pass task")
        {
            completed += 1;
        }
    }

    assert_eq!(completed, 1);
    let attempts = handler.attempts();
    assert_eq!(
        attempts.last(),
        Some(&AgentId::new("delta")),
        "the capable agent produces the terminal outcome"
    );
}

#[tokio::test]
async fn integration_agents_never_react_to_each_other() {
    init_tracing();
    let agents = ["alpha", "beta", "gamma"];
    let coordinator = fleet_of(&agents);
    let handler = RecordingHandler::default();

    // Alpha posts a message; every agent (alpha included) receives a copy.
    for agent in agents {
        let report = coordinator
            .run_delivery_pass(&delivery(agent, "lobby", 12, "alpha"), &handler)
            .await;
        assert_eq!(
            report,
            DeliveryPassReport::Suppressed(SuppressReason::FleetSender)
        );
    }
    assert!(handler.dispatches().is_empty());
    assert!(coordinator.store().is_empty());
}

#[tokio::test]
async fn integration_mention_directed_request_is_answered_by_the_mentioned_agent() {
    init_tracing();
    let coordinator = fleet_of(&["alpha", "beta"]);
    let handler = RecordingHandler::default();

    let mut for_alpha = delivery("alpha", "lobby", 30, "user-2");
    for_alpha.event.mentioned_agents = vec![AgentId::new("beta")];
    let mut for_beta = delivery("beta", "lobby", 30, "user-2");
    for_beta.event.mentioned_agents = vec![AgentId::new("beta")];

    assert_eq!(
        coordinator.run_delivery_pass(&for_alpha, &handler).await,
        DeliveryPassReport::Suppressed(SuppressReason::MentionForOtherAgent)
    );
    assert_eq!(
        coordinator.run_delivery_pass(&for_beta, &handler).await,
        DeliveryPassReport::Dispatched(DispatchControl::Completed)
    );

    let dispatches = handler.dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].0, AgentId::new("beta"));
    // Alpha's suppressed pass still counts toward the drain, so the record
    // does not outlive the fleet's interest in the event.
    assert!(coordinator.store().is_empty());
}

#[tokio::test]
async fn integration_reclaim_accounts_for_roster_changes_mid_flight() {
    init_tracing();
    let coordinator = fleet_of(&["alpha", "beta", "gamma"]);
    let handler = RecordingHandler::default();

    coordinator
        .run_delivery_pass(&delivery("alpha", "lobby", 77, "user-8"), &handler)
        .await;

    // Gamma's connection drops before it ever sees the event; the fleet
    // must still drain the record without it.
    coordinator.agent_disconnected(&AgentId::new("gamma"));
    coordinator
        .run_delivery_pass(&delivery("beta", "lobby", 77, "user-8"), &handler)
        .await;

    assert!(coordinator.store().is_empty());
    assert_eq!(handler.dispatches().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_unrelated_events_do_not_serialize_through_one_gate() {
    init_tracing();
    let coordinator = fleet_of(&["alpha"]);
    let handler = Arc::new(RecordingHandler::default());

    // A single agent handling many distinct events concurrently: every one
    // is admitted, none waits on another's gate.
    let mut passes = Vec::new();
    for sequence in 0..50u64 {
        let coordinator = Arc::clone(&coordinator);
        let handler = Arc::clone(&handler);
        let delivery = delivery("alpha", "lobby", sequence, "user-9");
        passes.push(tokio::spawn(async move {
            coordinator.run_delivery_pass(&delivery, &*handler).await
        }));
    }
    for pass in join_all(passes).await {
        assert_eq!(
            pass.expect("pass task"),
            DeliveryPassReport::Dispatched(DispatchControl::Completed)
        );
    }

    assert_eq!(handler.dispatches().len(), 50);
    assert!(coordinator.store().is_empty());
}

#[derive(Default)]
struct HashMapCountingHandler {
    counts: Mutex<HashMap<u64, usize>>,
}

#[async_trait]
impl DeliveryHandler for HashMapCountingHandler {
    async fn dispatch(&self, delivery: &EventDelivery) -> DispatchControl {
        *self
            .counts
            .lock()
            .expect("count lock")
            .entry(delivery.event.sequence)
            .or_default() += 1;
        DispatchControl::Completed
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_storm_over_many_keys_dispatches_each_once() {
    init_tracing();
    let agents = ["alpha", "beta", "gamma"];
    let coordinator = fleet_of(&agents);
    let handler = Arc::new(HashMapCountingHandler::default());

    let mut passes = Vec::new();
    for sequence in 0..30u64 {
        for agent in agents {
            let coordinator = Arc::clone(&coordinator);
            let handler = Arc::clone(&handler);
            let delivery = delivery(agent, "arena", sequence, "user-4");
            passes.push(tokio::spawn(async move {
                coordinator.run_delivery_pass(&delivery, &*handler).await
            }));
        }
    }
    for pass in join_all(passes).await {
        pass.expect("pass task");
    }

    let counts = handler.counts.lock().expect("count lock").clone();
    assert_eq!(counts.len(), 30);
    assert!(counts.values().all(|count| *count == 1));
    assert!(coordinator.store().is_empty());
}
