//! Core identifiers and value types shared by every module of the room bridge.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a conversation owned by the external conversation manager.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ConversationHandle(pub u32);

impl fmt::Display for ConversationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a participant (a call leg, local anchor or media resource).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ParticipantHandle(pub u32);

impl fmt::Display for ParticipantHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier taken from the user part of a request URI.
///
/// Any string is a valid room, including the empty string. Two rooms are the
/// same room only when their identifiers match exactly.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Extract the room from a request URI such as `sip:lobby@conf.example.com`.
    ///
    /// URIs without a user part map to the empty room.
    pub fn from_request_uri(uri: &str) -> Self {
        let uri = uri.trim().trim_start_matches('<').trim_end_matches('>');
        let rest = match uri.split_once(':') {
            Some((scheme, rest)) if is_uri_scheme(scheme) => rest,
            _ => uri,
        };
        let user = match rest.rsplit_once('@') {
            Some((user, _host)) => user,
            None => "",
        };
        Self(user.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_uri_scheme(candidate: &str) -> bool {
    matches!(candidate.to_ascii_lowercase().as_str(), "sip" | "sips" | "tel")
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Concrete participant kind as exposed by the conversation manager
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ParticipantKind {
    /// Local audio anchor, shared by every room
    Local,
    /// Remote call leg with a negotiated media endpoint
    Remote,
    /// Media resource such as a tone or prompt player
    MediaResource,
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantKind::Local => write!(f, "local"),
            ParticipantKind::Remote => write!(f, "remote"),
            ParticipantKind::MediaResource => write!(f, "media"),
        }
    }
}

/// Role of a remote participant inside its room
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ParticipantRole {
    /// Alone, endpoint looped back to the holding element
    Waiting,
    /// Bridge sequence queued or running
    Bridging,
    /// Endpoint connected to exactly one peer
    Bridged,
    /// Peer left, returning to the holding element
    Unwinding,
    /// Arrived when the room was full, left connected but unbridged
    Rejected,
}

impl ParticipantRole {
    /// Whether the participant counts toward the two-party capacity
    pub fn is_engaged(&self) -> bool {
        !matches!(self, ParticipantRole::Rejected)
    }
}

/// Summary of the SIP request that created or confirmed a participant.
///
/// The SIP stack owns parsing; only the parts the router needs are carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingMessage {
    pub method: String,
    pub request_uri: String,
    pub call_id: String,
    pub from: String,
}

impl SignalingMessage {
    pub fn new(
        method: impl Into<String>,
        request_uri: impl Into<String>,
        call_id: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            request_uri: request_uri.into(),
            call_id: call_id.into(),
            from: from.into(),
        }
    }

    /// INVITE addressed to `request_uri`
    pub fn invite(request_uri: impl Into<String>, call_id: impl Into<String>, from: impl Into<String>) -> Self {
        Self::new("INVITE", request_uri, call_id, from)
    }

    /// Room named by the request target
    pub fn room_id(&self) -> RoomId {
        RoomId::from_request_uri(&self.request_uri)
    }

    /// One-line description for logs
    pub fn brief(&self) -> String {
        format!("{} {} call-id={} from={}", self.method, self.request_uri, self.call_id, self.from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_from_request_uri() {
        assert_eq!(RoomId::from_request_uri("sip:lobby@conf.example.com").as_str(), "lobby");
        assert_eq!(RoomId::from_request_uri("sips:1234@10.0.0.1:5061;transport=tls").as_str(), "1234");
        assert_eq!(RoomId::from_request_uri("<sip:room-7@host>").as_str(), "room-7");
        assert_eq!(RoomId::from_request_uri("SIP:Mixed@host").as_str(), "Mixed");
    }

    #[test]
    fn test_room_without_user_part_is_empty() {
        assert_eq!(RoomId::from_request_uri("sip:conf.example.com").as_str(), "");
        assert_eq!(RoomId::from_request_uri("").as_str(), "");
    }

    #[test]
    fn test_room_identity_is_exact() {
        assert_ne!(RoomId::from("Lobby"), RoomId::from("lobby"));
        assert_eq!(RoomId::from("lobby"), RoomId::new(String::from("lobby")));
    }

    #[test]
    fn test_message_brief_and_room() {
        let msg = SignalingMessage::invite("sip:blue@conf", "abc123", "sip:alice@example.com");
        assert_eq!(msg.room_id(), RoomId::from("blue"));
        assert_eq!(msg.brief(), "INVITE sip:blue@conf call-id=abc123 from=sip:alice@example.com");
    }
}
