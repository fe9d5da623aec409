//! Shared helpers for room bridge integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use rvoip_room_bridge::{
    LoopbackConversations, ParticipantHandle, RoomBridgeConfig, RoomBridgeHandle, RoomBridgeService, RoomEvent,
    SignalingMessage,
};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestBridge {
    pub control: LoopbackConversations,
    pub handle: RoomBridgeHandle,
    pub events: broadcast::Receiver<RoomEvent>,
    pub task: JoinHandle<()>,
}

pub fn start() -> TestBridge {
    start_with(RoomBridgeConfig::default())
}

/// Route coordinator logs to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn start_with(config: RoomBridgeConfig) -> TestBridge {
    init_tracing();
    let control = LoopbackConversations::new();
    let (handle, task) = RoomBridgeService::start(config, Arc::new(control.clone())).unwrap();
    let events = handle.subscribe();
    TestBridge {
        control,
        handle,
        events,
        task,
    }
}

pub fn invite(room: &str, call_id: &str) -> SignalingMessage {
    SignalingMessage::invite(
        format!("sip:{}@conf.example.com", room),
        call_id,
        format!("sip:{}@example.com", call_id),
    )
}

impl TestBridge {
    /// Admit a caller and confirm its media, like an INVITE followed by ACK
    pub async fn join(&self, room: &str) -> ParticipantHandle {
        let participant = self.control.admit_remote();
        let message = invite(room, &format!("call-{}", participant));
        self.handle
            .incoming_participant(participant, message.clone(), true)
            .await
            .unwrap();
        self.handle.connected_confirmed(participant, message).await.unwrap();
        participant
    }

    /// Skip events until one matches, failing the test after a timeout
    pub async fn wait_for<F>(&mut self, mut matches: F) -> RoomEvent
    where
        F: FnMut(&RoomEvent) -> bool,
    {
        let events = &mut self.events;
        tokio::time::timeout(EVENT_TIMEOUT, async {
            loop {
                match events.recv().await {
                    Ok(event) if matches(&event) => return event,
                    Ok(_) => continue,
                    Err(e) => panic!("event stream failed: {}", e),
                }
            }
        })
        .await
        .expect("timed out waiting for room event")
    }
}
