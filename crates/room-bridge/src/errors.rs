//! Error types for the room bridge

use thiserror::Error;

use crate::types::{ConversationHandle, ParticipantHandle, RoomId};

/// Result type for room bridge operations
pub type Result<T> = std::result::Result<T, RoomBridgeError>;

/// Errors raised while routing, bridging or unwinding participants
#[derive(Debug, Clone, Error)]
pub enum RoomBridgeError {
    /// A confirmed participant names a room the router never created
    #[error("No room '{room}' registered for confirmed participant {participant}")]
    RoomNotFound {
        room: RoomId,
        participant: ParticipantHandle,
    },

    /// The conversation manager no longer knows a conversation the directory points at
    #[error("Conversation {conversation} for room '{room}' is unknown to the conversation manager")]
    ConversationNotFound {
        room: RoomId,
        conversation: ConversationHandle,
    },

    /// Two engaged participants were counted but no bridgeable peer is recorded
    #[error("No bridgeable peer for participant {participant} in conversation {conversation}")]
    PeerMissing {
        conversation: ConversationHandle,
        participant: ParticipantHandle,
    },

    /// Room already holds a bridged pair
    #[error("Room '{room}' is full ({engaged} engaged participants)")]
    CapacityExceeded { room: RoomId, engaged: usize },

    /// Participant has no negotiated media endpoint yet
    #[error("Endpoint for participant {0} is not ready")]
    EndpointNotReady(ParticipantHandle),

    /// Media endpoint rejected an operation
    #[error("Endpoint operation {operation} failed for participant {participant}: {reason}")]
    Endpoint {
        participant: ParticipantHandle,
        operation: String,
        reason: String,
    },

    /// Media endpoint did not complete an operation in time
    #[error("Endpoint operation {operation} for participant {participant} timed out after {millis}ms")]
    Timeout {
        participant: ParticipantHandle,
        operation: String,
        millis: u64,
    },

    /// Conversation manager call failed
    #[error("Conversation manager error: {message}")]
    Control { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The coordinator task is no longer running
    #[error("Room bridge service has stopped")]
    ServiceStopped,
}

impl RoomBridgeError {
    /// Create a conversation manager error
    pub fn control(message: impl Into<String>) -> Self {
        Self::Control {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an endpoint operation error
    pub fn endpoint(participant: ParticipantHandle, operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Endpoint {
            participant,
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Internal-consistency failures. These abort the affected conversation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RoomBridgeError::RoomNotFound { .. }
                | RoomBridgeError::ConversationNotFound { .. }
                | RoomBridgeError::PeerMissing { .. }
        )
    }

    /// Failures that leave every room intact and may succeed on a later event
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RoomBridgeError::CapacityExceeded { .. }
                | RoomBridgeError::EndpointNotReady(_)
                | RoomBridgeError::Endpoint { .. }
                | RoomBridgeError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let fatal = RoomBridgeError::PeerMissing {
            conversation: ConversationHandle(1),
            participant: ParticipantHandle(2),
        };
        assert!(fatal.is_fatal());
        assert!(!fatal.is_recoverable());

        let not_ready = RoomBridgeError::EndpointNotReady(ParticipantHandle(4));
        assert!(not_ready.is_recoverable());
        assert!(!not_ready.is_fatal());

        assert!(!RoomBridgeError::ServiceStopped.is_fatal());
        assert!(!RoomBridgeError::ServiceStopped.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = RoomBridgeError::RoomNotFound {
            room: RoomId::from("blue"),
            participant: ParticipantHandle(9),
        };
        assert_eq!(err.to_string(), "No room 'blue' registered for confirmed participant 9");
    }
}
