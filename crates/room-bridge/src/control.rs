//! Seams to the external collaborators
//!
//! The conversation manager owns conversations, participants and SIP
//! signaling; the media endpoint owns the negotiated media transport. The room
//! bridge only drives them through these two traits.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::config::EndpointSettings;
use crate::errors::Result;
use crate::types::{ConversationHandle, ParticipantHandle, ParticipantKind};

/// Negotiated media path of one remote participant.
///
/// Every operation completes asynchronously; the future resolving is the
/// completion callback.
#[async_trait]
pub trait MediaEndpoint: Send + Sync + fmt::Debug {
    /// Participant owning this endpoint
    fn participant(&self) -> ParticipantHandle;

    /// Attach to the local holding element that loops tone or silence back
    async fn enter_waiting_mode(&self) -> Result<()>;

    /// Detach from the holding element
    async fn leave_waiting_mode(&self) -> Result<()>;

    /// Drop the current media link to a peer
    async fn disconnect(&self) -> Result<()>;

    /// Send this endpoint's media into `sink`
    async fn connect(&self, sink: Arc<dyn MediaEndpoint>) -> Result<()>;

    /// Ask the remote side of the peer link for a fresh keyframe
    async fn request_keyframe_from_peer(&self) -> Result<()>;

    /// Release the endpoint's media resources
    async fn release(&self) -> Result<()>;
}

/// Conversation/participant lifecycle manager
#[async_trait]
pub trait ConversationControl: Send + Sync {
    /// Whether the media stack can mix local audio
    fn supports_local_audio(&self) -> bool;

    async fn create_conversation(&self) -> Result<ConversationHandle>;

    async fn destroy_conversation(&self, conversation: ConversationHandle) -> Result<()>;

    /// Create the local audio anchor participant
    async fn create_local_participant(&self) -> Result<ParticipantHandle>;

    async fn add_participant(&self, conversation: ConversationHandle, participant: ParticipantHandle) -> Result<()>;

    async fn answer_participant(&self, participant: ParticipantHandle) -> Result<()>;

    /// Live conversation handles
    fn conversations(&self) -> BTreeSet<ConversationHandle>;

    fn has_conversation(&self, conversation: ConversationHandle) -> bool {
        self.conversations().contains(&conversation)
    }

    /// Live participant handles of one kind, across all conversations
    fn participants_by_kind(&self, kind: ParticipantKind) -> BTreeSet<ParticipantHandle>;

    /// Remote participants currently in a conversation, `None` if it is unknown
    fn remote_participants(&self, conversation: ConversationHandle) -> Option<BTreeSet<ParticipantHandle>>;

    /// Media endpoint of a remote participant, `None` until it is negotiated
    fn endpoint(&self, participant: ParticipantHandle) -> Option<Arc<dyn MediaEndpoint>>;

    /// Push endpoint settings to a freshly constructed remote participant
    fn apply_endpoint_settings(&self, participant: ParticipantHandle, settings: &EndpointSettings);
}
