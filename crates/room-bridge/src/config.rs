//! Configuration for the room bridge
//!
//! Values come from an optional TOML file layered with `ROOM_BRIDGE__*`
//! environment variables, e.g. `ROOM_BRIDGE__ENDPOINT__REUSE_SDP_ANSWER=true`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{Result, RoomBridgeError};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ROOM_BRIDGE";

/// What happens to a room once its last participant departs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyRoomPolicy {
    /// Keep the room and its conversation for the next arrival.
    /// The directory grows with every distinct room id ever dialed.
    Retain,
    /// Destroy the conversation and forget the room
    Reclaim,
}

impl Default for EmptyRoomPolicy {
    fn default() -> Self {
        EmptyRoomPolicy::Retain
    }
}

/// Settings pushed to every remote participant's media endpoint when it is constructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    /// Strip media descriptors beyond the first audio and video lines
    pub remove_extra_media_descriptors: bool,
    /// Use an RTP endpoint (as opposed to a WebRTC endpoint)
    pub sip_rtp_endpoint: bool,
    /// Reuse the previous SDP answer on re-offers
    pub reuse_sdp_answer: bool,
    /// Accept keyframe requests arriving over the signaling channel
    pub websocket_accepts_keyframe_requests: bool,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            remove_extra_media_descriptors: false,
            sip_rtp_endpoint: true,
            reuse_sdp_answer: false,
            websocket_accepts_keyframe_requests: true,
        }
    }
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    /// Include source file and line in each record
    pub file_info: bool,
    /// Log span enter and exit
    pub spans: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            spans: false,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomBridgeConfig {
    /// Route and answer incoming participants. When false, arrivals are left to another handler.
    pub auto_answer: bool,
    pub empty_room_policy: EmptyRoomPolicy,
    /// Upper bound for one bridge step; 0 waits forever
    pub endpoint_operation_timeout_ms: u64,
    /// Capacity of the signal channel and the room event broadcast
    pub event_channel_capacity: usize,
    pub endpoint: EndpointSettings,
    pub logging: LoggingSettings,
}

impl Default for RoomBridgeConfig {
    fn default() -> Self {
        Self {
            auto_answer: true,
            empty_room_policy: EmptyRoomPolicy::default(),
            endpoint_operation_timeout_ms: 10_000,
            event_channel_capacity: 256,
            endpoint: EndpointSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RoomBridgeConfig {
    /// Load from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| RoomBridgeError::config(format!("Failed to read configuration: {}", e)))?;
        Self::from_settings(settings)
    }

    /// Parse a TOML document, ignoring the environment
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .map_err(|e| RoomBridgeError::config(format!("Failed to parse configuration: {}", e)))?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> Result<Self> {
        let config: Self = settings
            .try_deserialize()
            .map_err(|e| RoomBridgeError::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(RoomBridgeError::config("event_channel_capacity must be greater than zero"));
        }
        crate::logging::parse_log_level(&self.logging.level)?;
        Ok(())
    }

    /// Step timeout, `None` when disabled
    pub fn endpoint_operation_timeout(&self) -> Option<Duration> {
        match self.endpoint_operation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
