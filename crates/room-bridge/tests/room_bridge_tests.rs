//! End-to-end tests of the room bridge service over the loopback conversation manager

mod common;

use std::time::Duration;

use rvoip_room_bridge::{
    EmptyRoomPolicy, EndpointOp, RoomBridgeConfig, RoomBridgeError, RoomEvent, RoomId,
};

use common::{invite, start, start_with};

#[tokio::test]
async fn test_two_callers_in_one_room_are_bridged() {
    let mut bridge = start();

    let alice = bridge.join("blue").await;
    bridge
        .wait_for(|event| matches!(event, RoomEvent::ParticipantWaiting { participant, .. } if *participant == alice))
        .await;

    let bob = bridge.join("blue").await;
    let established = bridge
        .wait_for(|event| matches!(event, RoomEvent::BridgeEstablished { .. }))
        .await;
    assert_eq!(
        established,
        RoomEvent::BridgeEstablished {
            room: RoomId::from("blue"),
            newcomer: bob,
            peer: alice,
        }
    );

    let report = bridge.handle.status().await.unwrap();
    assert_eq!(report.conversations.len(), 1);
    assert_eq!(report.rooms[0].bridged, vec![alice, bob]);
}

#[tokio::test]
async fn test_callers_in_different_rooms_stay_apart() {
    let mut bridge = start();

    let red = bridge.join("red").await;
    bridge
        .wait_for(|event| matches!(event, RoomEvent::ParticipantWaiting { participant, .. } if *participant == red))
        .await;
    let green = bridge.join("green").await;
    bridge
        .wait_for(|event| matches!(event, RoomEvent::ParticipantWaiting { participant, .. } if *participant == green))
        .await;

    let report = bridge.handle.status().await.unwrap();
    assert_eq!(report.conversations.len(), 2);
    assert_eq!(report.rooms.len(), 2);
    assert!(report.rooms.iter().all(|room| room.waiting.len() == 1 && room.bridged.is_empty()));
    assert!(!bridge
        .control
        .journal()
        .iter()
        .any(|planned| matches!(planned.op, EndpointOp::Connect { .. })));
}

#[tokio::test]
async fn test_room_is_created_once() {
    let mut bridge = start();
    for _ in 0..3 {
        bridge.join("blue").await;
    }
    bridge
        .wait_for(|event| matches!(event, RoomEvent::ParticipantRejected { .. }))
        .await;

    let report = bridge.handle.status().await.unwrap();
    assert_eq!(report.conversations.len(), 1);
    assert_eq!(report.rooms.len(), 1);
    assert_eq!(report.local_participants.len(), 1);
}

#[tokio::test]
async fn test_third_caller_is_rejected() {
    let mut bridge = start();
    bridge.join("blue").await;
    bridge.join("blue").await;
    let carol = bridge.join("blue").await;

    let rejected = bridge
        .wait_for(|event| matches!(event, RoomEvent::ParticipantRejected { .. }))
        .await;
    assert_eq!(
        rejected,
        RoomEvent::ParticipantRejected {
            room: RoomId::from("blue"),
            participant: carol,
            engaged: 3,
        }
    );
    bridge
        .wait_for(|event| matches!(event, RoomEvent::BridgeEstablished { .. }))
        .await;

    let report = bridge.handle.status().await.unwrap();
    assert_eq!(report.rooms[0].rejected, vec![carol]);
    assert!(!bridge.control.journal().iter().any(|planned| planned.target == carol));
}

#[tokio::test]
async fn test_survivor_waits_then_bridges_with_next_caller() {
    let mut bridge = start();
    let alice = bridge.join("blue").await;
    let bob = bridge.join("blue").await;
    bridge
        .wait_for(|event| matches!(event, RoomEvent::BridgeEstablished { .. }))
        .await;

    bridge.control.hang_up(alice);
    bridge.handle.participant_terminated(alice, 200).await.unwrap();
    bridge
        .wait_for(|event| matches!(event, RoomEvent::PeerReturnedToWaiting { participant, .. } if *participant == bob))
        .await;
    assert!(bridge.control.endpoint_state(bob).unwrap().waiting);

    let carol = bridge.join("blue").await;
    let established = bridge
        .wait_for(|event| matches!(event, RoomEvent::BridgeEstablished { .. }))
        .await;
    assert_eq!(
        established,
        RoomEvent::BridgeEstablished {
            room: RoomId::from("blue"),
            newcomer: carol,
            peer: bob,
        }
    );
}

#[tokio::test]
async fn test_bridge_survives_slow_endpoints() {
    let mut bridge = start();
    bridge.control.set_step_delay(Duration::from_millis(5));

    let alice = bridge.join("blue").await;
    let bob = bridge.join("blue").await;
    bridge
        .wait_for(|event| matches!(event, RoomEvent::BridgeEstablished { .. }))
        .await;

    assert_eq!(bridge.control.endpoint_state(alice).unwrap().linked_to, Some(bob));
    assert_eq!(bridge.control.endpoint_state(bob).unwrap().linked_to, Some(alice));
    let report = bridge.handle.status().await.unwrap();
    assert_eq!(report.rooms[0].pending_sequences, 0);
}

#[tokio::test]
async fn test_auto_answer_disabled_ignores_arrivals() {
    let config = RoomBridgeConfig {
        auto_answer: false,
        ..RoomBridgeConfig::default()
    };
    let mut bridge = start_with(config);
    let alice = bridge.control.admit_remote();
    bridge
        .handle
        .incoming_participant(alice, invite("blue", "call-1"), true)
        .await
        .unwrap();

    bridge
        .wait_for(|event| matches!(event, RoomEvent::ParticipantIgnored { participant } if *participant == alice))
        .await;
    assert!(!bridge.control.is_answered(alice));
    assert!(bridge.handle.status().await.unwrap().conversations.is_empty());
}

#[tokio::test]
async fn test_reclaimed_room_gets_a_fresh_conversation() {
    let config = RoomBridgeConfig {
        empty_room_policy: EmptyRoomPolicy::Reclaim,
        ..RoomBridgeConfig::default()
    };
    let mut bridge = start_with(config);

    let alice = bridge.join("blue").await;
    let first = match bridge
        .wait_for(|event| matches!(event, RoomEvent::RoomCreated { .. }))
        .await
    {
        RoomEvent::RoomCreated { conversation, .. } => conversation,
        other => panic!("unexpected event {:?}", other),
    };
    bridge
        .wait_for(|event| matches!(event, RoomEvent::ParticipantWaiting { .. }))
        .await;

    bridge.control.hang_up(alice);
    bridge.handle.participant_terminated(alice, 200).await.unwrap();
    bridge
        .wait_for(|event| matches!(event, RoomEvent::RoomClosed { conversation, .. } if *conversation == first))
        .await;

    bridge.join("blue").await;
    let created = bridge
        .wait_for(|event| matches!(event, RoomEvent::RoomCreated { .. }))
        .await;
    assert!(matches!(created, RoomEvent::RoomCreated { conversation, .. } if conversation != first));
}

#[tokio::test]
async fn test_status_report_display() {
    let mut bridge = start();
    let alice = bridge.join("blue").await;
    bridge
        .wait_for(|event| matches!(event, RoomEvent::ParticipantWaiting { .. }))
        .await;

    let text = bridge.handle.status().await.unwrap().to_string();
    assert!(text.contains("Active conversation handles: 1"));
    assert!(text.contains(&format!("Remote Participant handles: {}", alice)));
    assert!(text.contains(&format!("Room blue (conversation 1): waiting: {};", alice)));
    assert!(!text.contains("Media Participant handles"));

    let report = bridge.handle.status().await.unwrap();
    assert_eq!(report.rooms[0].waiting, vec![alice]);
    assert!(report.rooms[0].bridged.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_the_service() {
    let bridge = start();
    bridge.handle.shutdown().await.unwrap();
    bridge.task.await.unwrap();

    assert!(matches!(
        bridge.handle.status().await,
        Err(RoomBridgeError::ServiceStopped)
    ));
}
