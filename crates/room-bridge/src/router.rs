//! Incoming-Participant Router
//!
//! Resolves the room of a new call leg, creates the room's conversation on
//! first use, makes sure the shared local anchor exists, then attaches and
//! answers the participant.

use tracing::{debug, info};

use crate::control::ConversationControl;
use crate::directory::RoomDirectory;
use crate::errors::Result;
use crate::types::{ConversationHandle, ParticipantHandle, ParticipantKind, RoomId, SignalingMessage};

/// Result of routing one arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Auto-answer is disabled; another handler owns this participant
    Ignored,
    Admitted {
        room: RoomId,
        conversation: ConversationHandle,
        /// The room did not exist before this arrival
        created: bool,
        /// A local anchor participant was created for this arrival
        local_anchor: Option<ParticipantHandle>,
    },
}

/// Route a newly arrived participant into its room
pub async fn route_incoming(
    directory: &mut RoomDirectory,
    control: &dyn ConversationControl,
    auto_answer_enabled: bool,
    participant: ParticipantHandle,
    message: &SignalingMessage,
) -> Result<RouteOutcome> {
    if !auto_answer_enabled {
        debug!("Auto-answer disabled, leaving participant {} unhandled", participant);
        return Ok(RouteOutcome::Ignored);
    }

    let room = message.room_id();
    let mut local_anchor = None;

    let (conversation, created) = match directory.get(&room) {
        Some(conversation) => {
            info!("found Conversation {} for room: {}", conversation, room);
            (conversation, false)
        }
        None => {
            info!("creating Conversation for room: {}", room);
            let conversation = control.create_conversation().await?;
            directory.insert(room.clone(), conversation);

            // One local anchor serves every room
            if control.supports_local_audio() && control.participants_by_kind(ParticipantKind::Local).is_empty() {
                let anchor = control.create_local_participant().await?;
                debug!("Created local anchor participant {}", anchor);
                local_anchor = Some(anchor);
            }
            (conversation, true)
        }
    };

    control.add_participant(conversation, participant).await?;
    control.answer_participant(participant).await?;

    Ok(RouteOutcome::Admitted {
        room,
        conversation,
        created,
        local_anchor,
    })
}
