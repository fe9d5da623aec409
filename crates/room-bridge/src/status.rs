//! Status Reporter
//!
//! Point-in-time snapshot of live conversations, participant handles by kind
//! and per-room occupancy. Only non-empty categories are printed.

use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::control::ConversationControl;
use crate::types::{ConversationHandle, ParticipantHandle, ParticipantKind, RoomId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStatus {
    pub room: RoomId,
    pub conversation: ConversationHandle,
    pub waiting: Vec<ParticipantHandle>,
    pub bridging: Vec<ParticipantHandle>,
    pub bridged: Vec<ParticipantHandle>,
    pub unwinding: Vec<ParticipantHandle>,
    pub rejected: Vec<ParticipantHandle>,
    /// Sequences running or queued in the room
    pub pending_sequences: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub conversations: Vec<ConversationHandle>,
    pub local_participants: Vec<ParticipantHandle>,
    pub remote_participants: Vec<ParticipantHandle>,
    pub media_participants: Vec<ParticipantHandle>,
    pub rooms: Vec<RoomStatus>,
}

/// Build a report from the conversation manager's view plus the room records
pub fn collect(control: &dyn ConversationControl, rooms: Vec<RoomStatus>) -> StatusReport {
    StatusReport {
        conversations: control.conversations().into_iter().collect(),
        local_participants: control.participants_by_kind(ParticipantKind::Local).into_iter().collect(),
        remote_participants: control.participants_by_kind(ParticipantKind::Remote).into_iter().collect(),
        media_participants: control
            .participants_by_kind(ParticipantKind::MediaResource)
            .into_iter()
            .collect(),
        rooms,
    }
}

fn handle_line<T: fmt::Display>(label: &str, handles: &[T]) -> Option<String> {
    if handles.is_empty() {
        return None;
    }
    let mut line = format!("{}:", label);
    for handle in handles {
        line.push(' ');
        line.push_str(&handle.to_string());
    }
    Some(line)
}

fn room_line(room: &RoomStatus) -> String {
    let mut line = format!("Room {} (conversation {}):", room.room, room.conversation);
    for (label, handles) in [
        ("waiting", &room.waiting),
        ("bridging", &room.bridging),
        ("bridged", &room.bridged),
        ("unwinding", &room.unwinding),
        ("rejected", &room.rejected),
    ] {
        if let Some(part) = handle_line(label, handles) {
            line.push(' ');
            line.push_str(&part);
            line.push(';');
        }
    }
    if room.pending_sequences > 0 {
        line.push_str(&format!(" pending={}", room.pending_sequences));
    }
    line
}

impl StatusReport {
    pub fn lines(&self) -> Vec<String> {
        [
            handle_line("Active conversation handles", &self.conversations),
            handle_line("Local Participant handles", &self.local_participants),
            handle_line("Remote Participant handles", &self.remote_participants),
            handle_line("Media Participant handles", &self.media_participants),
        ]
        .into_iter()
        .flatten()
        .chain(self.rooms.iter().map(room_line))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
            && self.local_participants.is_empty()
            && self.remote_participants.is_empty()
            && self.media_participants.is_empty()
            && self.rooms.is_empty()
    }

    pub fn log(&self) {
        for line in self.lines() {
            info!("{}", line);
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackConversations;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_only_non_empty_categories_are_listed() {
        let control = LoopbackConversations::new();
        let conversation = control.create_conversation().await.unwrap();
        let caller = control.admit_remote();
        control.add_participant(conversation, caller).await.unwrap();

        let report = collect(&control, Vec::new());
        assert_eq!(
            report.lines(),
            vec![
                "Active conversation handles: 1".to_string(),
                "Remote Participant handles: 1".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_report_prints_nothing() {
        let report = collect(&LoopbackConversations::new(), Vec::new());
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "");
    }

    #[test]
    fn test_room_line() {
        let room = RoomStatus {
            room: RoomId::from("blue"),
            conversation: ConversationHandle(2),
            waiting: Vec::new(),
            bridging: Vec::new(),
            bridged: vec![ParticipantHandle(4), ParticipantHandle(5)],
            unwinding: Vec::new(),
            rejected: vec![ParticipantHandle(6)],
            pending_sequences: 0,
        };
        assert_eq!(room_line(&room), "Room blue (conversation 2): bridged: 4 5; rejected: 6;");
    }

    #[test]
    fn test_report_serializes() {
        let report = collect(&LoopbackConversations::new(), Vec::new());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["conversations"], serde_json::json!([]));
    }
}
