#![no_main]

use libfuzzer_sys::fuzz_target;
use roost_core::{derive_event_key, AgentId, FleetEvent};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let mut parts = raw.splitn(3, '\n');
    let conversation_id = parts.next().unwrap_or_default().to_string();
    let subject_id = parts.next().unwrap_or_default().to_string();
    let body = parts.next().unwrap_or_default().to_string();
    let sequence = data.len() as u64;

    let event = FleetEvent {
        conversation_id,
        sequence,
        subject_id,
        sender_id: "fuzz-sender".to_string(),
        body,
        mentioned_agents: Vec::new(),
    };

    match derive_event_key(&event) {
        Ok(key) => {
            // Deterministic, and blind to everything outside the stable
            // triple.
            let mut redecorated = event.clone();
            redecorated.sender_id = "other-sender".to_string();
            redecorated.body.push('!');
            redecorated.mentioned_agents = vec![AgentId::new("fuzz-agent")];
            assert_eq!(key, derive_event_key(&redecorated).expect("stable triple unchanged"));

            let mut bumped = event.clone();
            bumped.sequence = bumped.sequence.wrapping_add(1);
            assert_ne!(key, derive_event_key(&bumped).expect("stable triple intact"));
        }
        Err(_) => {
            // Only blank identifiers are malformed.
            assert!(
                event.conversation_id.trim().is_empty() || event.subject_id.trim().is_empty()
            );
        }
    }
});
