//! # Room Bridge - Two-Party Media Bridging for SIP Conversations
//!
//! Callers dialing the same request-URI user part land in the same room. The
//! first confirmed caller is parked on a local holding element; the second is
//! bridged to it with a fixed endpoint protocol; anyone after that is left
//! alone. When one side of a bridge hangs up the other goes back to waiting.
//!
//! The crate does not speak SIP or move media itself. It drives an external
//! conversation manager and its media endpoints through the
//! [`ConversationControl`] and [`MediaEndpoint`] traits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_room_bridge::{LoopbackConversations, RoomBridgeConfig, RoomBridgeService, SignalingMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let control = LoopbackConversations::new();
//!     let (bridge, _task) = RoomBridgeService::start(RoomBridgeConfig::default(), Arc::new(control.clone()))?;
//!
//!     let invite = SignalingMessage::invite("sip:blue@conf.example.com", "call-1", "sip:alice@example.com");
//!     let alice = control.admit_remote();
//!     bridge.incoming_participant(alice, invite.clone(), true).await?;
//!     bridge.connected_confirmed(alice, invite).await?;
//!
//!     println!("{}", bridge.status().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`router`]: resolves the room of an arrival and attaches it to the room's conversation
//! - [`coordinator`]: decides roles and drives the bridge and unwind step machines
//! - [`sequence`]: the step machines themselves
//! - [`service`]: runs the coordinator as a single task fed by a command channel

pub mod config;
pub mod control;
pub mod coordinator;
pub mod directory;
pub mod errors;
pub mod events;
pub mod logging;
pub mod loopback;
pub mod occupancy;
pub mod router;
pub mod sequence;
pub mod service;
pub mod status;
pub mod types;

pub use config::{EmptyRoomPolicy, EndpointSettings, LoggingSettings, RoomBridgeConfig};
pub use control::{ConversationControl, MediaEndpoint};
pub use coordinator::{BridgeCoordinator, BridgeDecision, DepartureOutcome, StepCompletion};
pub use directory::RoomDirectory;
pub use errors::{Result, RoomBridgeError};
pub use events::{ConversationSignal, RoomEvent};
pub use logging::{setup_logging, LoggingConfig};
pub use loopback::{EndpointState, Fault, LoopbackConversations};
pub use occupancy::{BridgePair, RoomOccupancy};
pub use router::RouteOutcome;
pub use sequence::{EndpointOp, PlannedOp, Sequence, SequenceId};
pub use service::{RoomBridgeHandle, RoomBridgeService};
pub use status::{RoomStatus, StatusReport};
pub use types::{ConversationHandle, ParticipantHandle, ParticipantKind, ParticipantRole, RoomId, SignalingMessage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
