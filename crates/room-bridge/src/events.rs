//! Signals consumed from the conversation manager and events published by the room bridge

use serde::Serialize;

use crate::types::{ConversationHandle, ParticipantHandle, RoomId, SignalingMessage};

/// Callback from the conversation manager, delivered to the coordinator in order
#[derive(Debug, Clone)]
pub enum ConversationSignal {
    /// New inbound call leg
    IncomingParticipant {
        participant: ParticipantHandle,
        message: SignalingMessage,
        /// Per-call auto-answer hint from the signaling layer
        auto_answer: bool,
    },
    /// Media for the participant is up (ACK received)
    ConnectedConfirmed {
        participant: ParticipantHandle,
        message: SignalingMessage,
    },
    ParticipantTerminated {
        participant: ParticipantHandle,
        status_code: u16,
    },
    /// A remote participant object was built; endpoint settings apply now
    RemoteParticipantConstructed { participant: ParticipantHandle },
    ConversationDestroyed { conversation: ConversationHandle },
    ParticipantDestroyed { participant: ParticipantHandle },
    Dtmf {
        participant: ParticipantHandle,
        tone: u8,
        duration_ms: u32,
        up: bool,
    },
    OutgoingParticipantRequested {
        participant: ParticipantHandle,
        message: SignalingMessage,
    },
    Proceeding {
        participant: ParticipantHandle,
        message: SignalingMessage,
    },
    Alerting {
        participant: ParticipantHandle,
        message: SignalingMessage,
    },
    Connected {
        participant: ParticipantHandle,
        message: SignalingMessage,
    },
    RelatedConversation {
        related_conversation: ConversationHandle,
        related_participant: ParticipantHandle,
        original_conversation: ConversationHandle,
        original_participant: ParticipantHandle,
    },
    RedirectSuccess { participant: ParticipantHandle },
    RedirectFailure {
        participant: ParticipantHandle,
        status_code: u16,
    },
    RequestedHold {
        participant: ParticipantHandle,
        held: bool,
    },
}

/// Outcome notifications, broadcast to every subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RoomEvent {
    RoomCreated {
        room: RoomId,
        conversation: ConversationHandle,
    },
    ParticipantAdmitted {
        room: RoomId,
        conversation: ConversationHandle,
        participant: ParticipantHandle,
    },
    /// Arrival left to another handler because auto-answer is off
    ParticipantIgnored { participant: ParticipantHandle },
    /// Participant sits alone on the holding element
    ParticipantWaiting {
        room: RoomId,
        participant: ParticipantHandle,
    },
    BridgeStarted {
        room: RoomId,
        newcomer: ParticipantHandle,
        peer: ParticipantHandle,
    },
    BridgeEstablished {
        room: RoomId,
        newcomer: ParticipantHandle,
        peer: ParticipantHandle,
    },
    ParticipantRejected {
        room: RoomId,
        participant: ParticipantHandle,
        engaged: usize,
    },
    EndpointNotReady {
        room: RoomId,
        participant: ParticipantHandle,
    },
    /// Survivor of a bridge is back on the holding element
    PeerReturnedToWaiting {
        room: RoomId,
        participant: ParticipantHandle,
    },
    EndpointReleased {
        room: RoomId,
        participant: ParticipantHandle,
    },
    /// A step failed or timed out; the sequence was abandoned
    SequenceFailed {
        room: RoomId,
        sequence: &'static str,
        participant: ParticipantHandle,
        reason: String,
    },
    /// Internal-consistency failure without a conversation to blame
    ConsistencyFailure {
        participant: ParticipantHandle,
        reason: String,
    },
    /// Internal-consistency failure; the conversation was torn down
    ConversationFailed {
        room: RoomId,
        conversation: ConversationHandle,
        reason: String,
    },
    RoomClosed {
        room: RoomId,
        conversation: ConversationHandle,
    },
}
