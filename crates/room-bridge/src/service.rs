//! Room bridge service
//!
//! Runs the [`BridgeCoordinator`] on its own task. Conversation signals,
//! status queries and step completions all funnel into that one task, which
//! gives every room a single ordered timeline.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::RoomBridgeConfig;
use crate::control::ConversationControl;
use crate::coordinator::{BridgeCoordinator, StepCompletion};
use crate::errors::{Result, RoomBridgeError};
use crate::events::{ConversationSignal, RoomEvent};
use crate::status::StatusReport;
use crate::types::{ConversationHandle, ParticipantHandle, SignalingMessage};

enum Command {
    Signal(ConversationSignal),
    Status(oneshot::Sender<StatusReport>),
    Shutdown,
}

/// Cloneable handle to a running room bridge
#[derive(Clone)]
pub struct RoomBridgeHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<RoomEvent>,
}

pub struct RoomBridgeService;

impl RoomBridgeService {
    /// Validate the configuration and spawn the coordinator task
    pub fn start(
        config: RoomBridgeConfig,
        control: Arc<dyn ConversationControl>,
    ) -> Result<(RoomBridgeHandle, JoinHandle<()>)> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(config.event_channel_capacity);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);

        let coordinator = BridgeCoordinator::new(config, control, completion_tx, event_tx.clone());
        let task = tokio::spawn(run(coordinator, command_rx, completion_rx));

        Ok((
            RoomBridgeHandle {
                commands: command_tx,
                events: event_tx,
            },
            task,
        ))
    }
}

async fn run(
    mut coordinator: BridgeCoordinator,
    mut commands: mpsc::Receiver<Command>,
    mut completions: mpsc::UnboundedReceiver<StepCompletion>,
) {
    info!("Room bridge coordinator started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Signal(signal)) => coordinator.handle_signal(signal).await,
                Some(Command::Status(reply)) => {
                    if reply.send(coordinator.status_report()).is_err() {
                        debug!("Status requester went away");
                    }
                }
                Some(Command::Shutdown) | None => break,
            },
            Some(completion) = completions.recv() => {
                coordinator.handle_completion(completion).await;
            }
        }
    }
    info!("Room bridge coordinator stopped");
}

impl RoomBridgeHandle {
    /// Deliver one conversation-manager callback
    pub async fn signal(&self, signal: ConversationSignal) -> Result<()> {
        self.commands
            .send(Command::Signal(signal))
            .await
            .map_err(|_| RoomBridgeError::ServiceStopped)
    }

    pub async fn incoming_participant(
        &self,
        participant: ParticipantHandle,
        message: SignalingMessage,
        auto_answer: bool,
    ) -> Result<()> {
        self.signal(ConversationSignal::IncomingParticipant {
            participant,
            message,
            auto_answer,
        })
        .await
    }

    pub async fn connected_confirmed(&self, participant: ParticipantHandle, message: SignalingMessage) -> Result<()> {
        self.signal(ConversationSignal::ConnectedConfirmed { participant, message })
            .await
    }

    pub async fn participant_terminated(&self, participant: ParticipantHandle, status_code: u16) -> Result<()> {
        self.signal(ConversationSignal::ParticipantTerminated {
            participant,
            status_code,
        })
        .await
    }

    pub async fn remote_participant_constructed(&self, participant: ParticipantHandle) -> Result<()> {
        self.signal(ConversationSignal::RemoteParticipantConstructed { participant })
            .await
    }

    pub async fn conversation_destroyed(&self, conversation: ConversationHandle) -> Result<()> {
        self.signal(ConversationSignal::ConversationDestroyed { conversation })
            .await
    }

    /// Subscribe to room events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Snapshot taken after every signal sent before this call was handled
    pub async fn status(&self) -> Result<StatusReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Status(reply_tx))
            .await
            .map_err(|_| RoomBridgeError::ServiceStopped)?;
        reply_rx.await.map_err(|_| RoomBridgeError::ServiceStopped)
    }

    /// Stop the coordinator task; in-flight endpoint operations are abandoned
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| RoomBridgeError::ServiceStopped)
    }
}
