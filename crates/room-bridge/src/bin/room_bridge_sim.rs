//! Room bridge simulator
//!
//! Drives the room bridge with the in-process loopback conversation manager:
//! fills a few rooms with callers, prints the status, hangs up the first
//! caller of every room and prints the status again.
//!
//! ```text
//! room-bridge-sim --rooms 2 --callers-per-room 3 --step-delay-ms 10
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use rvoip_room_bridge::{
    setup_logging, ConversationSignal, LoggingConfig, LoopbackConversations, ParticipantHandle, RoomBridgeConfig, RoomBridgeHandle,
    RoomBridgeService, RoomEvent, SignalingMessage, StatusReport,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate callers meeting in room bridge rooms")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit logs and status reports as JSON
    #[arg(long)]
    json_logs: bool,

    /// Number of rooms to fill
    #[arg(short, long, default_value = "2")]
    rooms: usize,

    /// Callers dialing each room
    #[arg(short = 'n', long, default_value = "3")]
    callers_per_room: usize,

    /// Artificial latency of every media endpoint operation
    #[arg(short = 'd', long, default_value = "0")]
    step_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = RoomBridgeConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.json = true;
    }
    setup_logging(LoggingConfig::from_settings(&config.logging, "room-bridge-sim")?)?;

    let control = LoopbackConversations::new();
    control.set_step_delay(Duration::from_millis(args.step_delay_ms));
    let settle_timeout = config
        .endpoint_operation_timeout()
        .unwrap_or(Duration::from_secs(10))
        .saturating_mul(8);

    let (bridge, task) = RoomBridgeService::start(config, Arc::new(control.clone()))?;
    let mut events = bridge.subscribe();

    let mut first_callers = Vec::new();
    for room in 0..args.rooms {
        let room = format!("room{}", room + 1);
        for caller in 0..args.callers_per_room {
            let participant = control.admit_remote();
            let message = SignalingMessage::invite(
                format!("sip:{}@bridge.example.com", room),
                format!("{}-call-{}", room, caller + 1),
                format!("sip:caller{}@example.com", participant),
            );
            bridge
                .signal(ConversationSignal::RemoteParticipantConstructed { participant })
                .await?;
            bridge.incoming_participant(participant, message.clone(), true).await?;
            bridge.connected_confirmed(participant, message).await?;
            if caller == 0 {
                first_callers.push(participant);
            }
        }
    }

    let expected_bridges = if args.callers_per_room >= 2 { args.rooms } else { 0 };
    wait_for_events(&mut events, expected_bridges, settle_timeout, |event| {
        matches!(event, RoomEvent::BridgeEstablished { .. })
    })
    .await;
    print_status(&bridge, args.json_logs).await?;

    hang_up_all(&bridge, &control, &first_callers).await?;
    let expected_returns = if args.callers_per_room >= 2 { first_callers.len() } else { 0 };
    wait_for_events(&mut events, expected_returns, settle_timeout, |event| {
        matches!(event, RoomEvent::PeerReturnedToWaiting { .. })
    })
    .await;
    print_status(&bridge, args.json_logs).await?;

    bridge.shutdown().await?;
    task.await.context("coordinator task panicked")?;
    Ok(())
}

async fn hang_up_all(
    bridge: &RoomBridgeHandle,
    control: &LoopbackConversations,
    participants: &[ParticipantHandle],
) -> Result<()> {
    for participant in participants {
        info!("Hanging up participant {}", participant);
        control.hang_up(*participant);
        bridge.participant_terminated(*participant, 200).await?;
    }
    Ok(())
}

async fn wait_for_events<F>(
    events: &mut broadcast::Receiver<RoomEvent>,
    expected: usize,
    limit: Duration,
    mut matches: F,
) where
    F: FnMut(&RoomEvent) -> bool,
{
    let waited = tokio::time::timeout(limit, async {
        let mut seen = 0;
        while seen < expected {
            match events.recv().await {
                Ok(event) if matches(&event) => seen += 1,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {} room events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
    .await;
    if waited.is_err() {
        warn!("Timed out after {:?} waiting for room events", limit);
    }
}

async fn print_status(bridge: &RoomBridgeHandle, json: bool) -> Result<()> {
    let report: StatusReport = bridge.status().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.log();
    }
    Ok(())
}
