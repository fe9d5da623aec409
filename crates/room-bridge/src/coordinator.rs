//! Bridging Coordinator
//!
//! Owns the Room Directory and every room's occupancy record. Signals from
//! the conversation manager and step completions from media endpoints are
//! fed in one at a time by the service loop, so no two handlers ever touch
//! the same room concurrently.
//!
//! Each room runs at most one [`Sequence`] at a time; later sequences queue
//! behind it. A departing participant cancels the queued sequences that name
//! it and fences the active one: its completion arrives with a sequence id
//! the room no longer expects and is dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{EmptyRoomPolicy, RoomBridgeConfig};
use crate::control::{ConversationControl, MediaEndpoint};
use crate::directory::RoomDirectory;
use crate::errors::{Result, RoomBridgeError};
use crate::events::{ConversationSignal, RoomEvent};
use crate::occupancy::RoomOccupancy;
use crate::router::{self, RouteOutcome};
use crate::sequence::{EndpointOp, PlannedOp, Sequence, SequenceId, SequenceKind};
use crate::status::{self, RoomStatus, StatusReport};
use crate::types::{ConversationHandle, ParticipantHandle, ParticipantRole, RoomId, SignalingMessage};

/// Completion of one step, posted back by the task that ran it
#[derive(Debug)]
pub struct StepCompletion {
    pub conversation: ConversationHandle,
    pub sequence: SequenceId,
    pub result: Result<()>,
}

/// What the coordinator decided for a connected-confirmed participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeDecision {
    /// First in the room, heading to the holding element
    Waiting,
    /// Second in the room, bridge queued with `peer`
    Bridging { peer: ParticipantHandle },
    /// Participant was already tracked; nothing to do
    AlreadyTracked(ParticipantRole),
}

/// What the departure handler did for a terminated participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartureOutcome {
    /// Participant was not in any room's record
    NotTracked,
    /// Rejected participant dropped, no endpoint touched
    Dropped { room: RoomId },
    /// Bridged peer sent back to the holding element
    PeerUnwinding { room: RoomId, peer: ParticipantHandle },
    /// Solitary participant's endpoint released
    Released { room: RoomId },
}

#[derive(Debug)]
struct RoomState {
    room: RoomId,
    occupancy: RoomOccupancy,
    active: Option<Sequence>,
    /// Cancelled sequence whose in-flight step has not reported back yet
    draining: Option<SequenceId>,
    queue: VecDeque<Sequence>,
}

impl RoomState {
    fn new(room: RoomId) -> Self {
        Self {
            room,
            occupancy: RoomOccupancy::new(),
            active: None,
            draining: None,
            queue: VecDeque::new(),
        }
    }

    fn is_idle(&self) -> bool {
        self.active.is_none() && self.draining.is_none() && self.queue.is_empty()
    }

    /// Start the next queued sequence unless one is running or still draining
    fn start_next(&mut self, dispatcher: &Dispatcher) {
        if self.active.is_some() || self.draining.is_some() {
            return;
        }
        if let Some(sequence) = self.queue.pop_front() {
            debug!(
                "Room {}: starting {} sequence {} for participant {}",
                self.room,
                sequence.label(),
                sequence.id,
                sequence.subject()
            );
            dispatcher.dispatch(&sequence);
            self.active = Some(sequence);
        }
    }

    /// Drop every pending sequence that moves `participant`.
    ///
    /// The step already issued for the active sequence cannot be recalled, so
    /// the sequence drains: nothing else starts in the room until that step
    /// reports back, and the sequence never advances past it.
    fn cancel_involving(&mut self, participant: ParticipantHandle) {
        self.queue.retain(|sequence| !sequence.involves(participant));
        if self.active.as_ref().map_or(false, |sequence| sequence.involves(participant)) {
            if let Some(fenced) = self.active.take() {
                debug!(
                    "Room {}: fencing {} sequence {} after participant {} left",
                    self.room,
                    fenced.label(),
                    fenced.id,
                    participant
                );
                self.draining = Some(fenced.id);
            }
        }
    }

    fn to_status(&self, conversation: ConversationHandle) -> RoomStatus {
        RoomStatus {
            room: self.room.clone(),
            conversation,
            waiting: self.occupancy.participants_with(ParticipantRole::Waiting),
            bridging: self.occupancy.participants_with(ParticipantRole::Bridging),
            bridged: self.occupancy.participants_with(ParticipantRole::Bridged),
            unwinding: self.occupancy.participants_with(ParticipantRole::Unwinding),
            rejected: self.occupancy.participants_with(ParticipantRole::Rejected),
            pending_sequences: self.queue.len()
                + usize::from(self.active.is_some())
                + usize::from(self.draining.is_some()),
        }
    }
}

/// Endpoint operation with its endpoints resolved for this step
struct ResolvedOp {
    planned: PlannedOp,
    endpoint: Arc<dyn MediaEndpoint>,
    sink: Option<Arc<dyn MediaEndpoint>>,
}

impl ResolvedOp {
    /// Run the operation, giving up once the step deadline has passed
    async fn run(self, deadline: Option<(Instant, Duration)>) -> Result<()> {
        let participant = self.planned.target;
        let operation = self.planned.op.name();
        let work = self.execute();
        match deadline {
            Some((deadline, limit)) => {
                tokio::time::timeout_at(deadline, work)
                    .await
                    .map_err(|_| RoomBridgeError::Timeout {
                        participant,
                        operation: operation.to_string(),
                        millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    })?
            }
            None => work.await,
        }
    }

    async fn execute(self) -> Result<()> {
        match self.planned.op {
            EndpointOp::EnterWaitingMode => self.endpoint.enter_waiting_mode().await,
            EndpointOp::LeaveWaitingMode => self.endpoint.leave_waiting_mode().await,
            EndpointOp::Disconnect => self.endpoint.disconnect().await,
            EndpointOp::Connect { sink } => match self.sink {
                Some(sink_endpoint) => self.endpoint.connect(sink_endpoint).await,
                None => Err(RoomBridgeError::EndpointNotReady(sink)),
            },
            EndpointOp::RequestKeyframe => self.endpoint.request_keyframe_from_peer().await,
            EndpointOp::Release => self.endpoint.release().await,
        }
    }
}

/// Issues the operations of a sequence's current step and reports the completion
struct Dispatcher {
    control: Arc<dyn ConversationControl>,
    completions: mpsc::UnboundedSender<StepCompletion>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    fn dispatch(&self, sequence: &Sequence) {
        // Endpoints are looked up again for every step; a participant that
        // vanished in between fails the step instead of being driven blindly.
        let mut resolved = Vec::new();
        let mut failure = None;
        for planned in sequence.current_ops() {
            match self.resolve(planned) {
                Ok(Some(op)) => resolved.push(op),
                Ok(None) => debug!("No endpoint left to release for participant {}", planned.target),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let completions = self.completions.clone();
        let conversation = sequence.conversation;
        let id = sequence.id;
        let timeout = self.timeout;
        tokio::spawn(async move {
            let result = match failure {
                Some(e) => Err(e),
                None => run_step(resolved, timeout).await,
            };
            if completions
                .send(StepCompletion {
                    conversation,
                    sequence: id,
                    result,
                })
                .is_err()
            {
                debug!("Coordinator gone, dropping completion of {}", id);
            }
        });
    }

    fn resolve(&self, planned: PlannedOp) -> Result<Option<ResolvedOp>> {
        let endpoint = match self.control.endpoint(planned.target) {
            Some(endpoint) => endpoint,
            None if planned.op == EndpointOp::Release => return Ok(None),
            None => return Err(RoomBridgeError::EndpointNotReady(planned.target)),
        };
        let sink = match planned.op {
            EndpointOp::Connect { sink } => Some(
                self.control
                    .endpoint(sink)
                    .ok_or(RoomBridgeError::EndpointNotReady(sink))?,
            ),
            _ => None,
        };
        Ok(Some(ResolvedOp {
            planned,
            endpoint,
            sink,
        }))
    }
}

/// Run a step's operations in order; `timeout` bounds the step as a whole
async fn run_step(ops: Vec<ResolvedOp>, timeout: Option<Duration>) -> Result<()> {
    let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
    for op in ops {
        op.run(deadline).await?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct SequenceIds {
    last: u64,
}

impl SequenceIds {
    fn next(&mut self) -> SequenceId {
        self.last += 1;
        SequenceId(self.last)
    }
}

/// Decides each participant's role and drives the endpoint step machines
pub struct BridgeCoordinator {
    config: RoomBridgeConfig,
    control: Arc<dyn ConversationControl>,
    directory: RoomDirectory,
    rooms: HashMap<ConversationHandle, RoomState>,
    ids: SequenceIds,
    dispatcher: Dispatcher,
    events: broadcast::Sender<RoomEvent>,
}

impl BridgeCoordinator {
    pub fn new(
        config: RoomBridgeConfig,
        control: Arc<dyn ConversationControl>,
        completions: mpsc::UnboundedSender<StepCompletion>,
        events: broadcast::Sender<RoomEvent>,
    ) -> Self {
        let dispatcher = Dispatcher {
            control: control.clone(),
            completions,
            timeout: config.endpoint_operation_timeout(),
        };
        Self {
            config,
            control,
            directory: RoomDirectory::new(),
            rooms: HashMap::new(),
            ids: SequenceIds::default(),
            dispatcher,
            events,
        }
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Role of a participant in whichever room tracks it
    pub fn role_of(&self, participant: ParticipantHandle) -> Option<ParticipantRole> {
        self.rooms.values().find_map(|state| state.occupancy.role(participant))
    }

    /// Whether any room still has a sequence running or queued
    pub fn has_pending_sequences(&self) -> bool {
        self.rooms.values().any(|state| !state.is_idle())
    }

    fn publish(&self, event: RoomEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Handle one callback from the conversation manager
    pub async fn handle_signal(&mut self, signal: ConversationSignal) {
        match signal {
            ConversationSignal::IncomingParticipant {
                participant,
                message,
                auto_answer,
            } => {
                info!(
                    "onIncomingParticipant: handle={} auto={} msg={}",
                    participant,
                    auto_answer,
                    message.brief()
                );
                if let Err(e) = self.on_incoming_participant(participant, &message).await {
                    error!("Failed to route participant {}: {}", participant, e);
                }
            }
            ConversationSignal::ConnectedConfirmed { participant, message } => {
                info!(
                    "onParticipantConnectedConfirmed: handle={} msg={}",
                    participant,
                    message.brief()
                );
                if let Err(e) = self.on_connected_confirmed(participant, &message).await {
                    self.handle_bridge_error(participant, &message, e).await;
                }
            }
            ConversationSignal::ParticipantTerminated {
                participant,
                status_code,
            } => {
                info!("onParticipantTerminated: handle={} status={}", participant, status_code);
                self.on_participant_terminated(participant).await;
            }
            ConversationSignal::RemoteParticipantConstructed { participant } => {
                debug!("onRemoteParticipantConstructed: handle={}", participant);
                self.control
                    .apply_endpoint_settings(participant, &self.config.endpoint);
            }
            ConversationSignal::ConversationDestroyed { conversation } => {
                info!("onConversationDestroyed: handle={}", conversation);
                self.on_conversation_destroyed(conversation);
            }
            ConversationSignal::ParticipantDestroyed { participant } => {
                info!("onParticipantDestroyed: handle={}", participant);
            }
            ConversationSignal::Dtmf {
                participant,
                tone,
                duration_ms,
                up,
            } => {
                info!(
                    "onDtmfEvent: handle={} tone={} dur={} up={}",
                    participant, tone, duration_ms, up
                );
            }
            ConversationSignal::OutgoingParticipantRequested { participant, message } => {
                info!(
                    "onRequestOutgoingParticipant: handle={} msg={}",
                    participant,
                    message.brief()
                );
            }
            ConversationSignal::Proceeding { participant, message } => {
                info!("onParticipantProceeding: handle={} msg={}", participant, message.brief());
            }
            ConversationSignal::Alerting { participant, message } => {
                info!("onParticipantAlerting: handle={} msg={}", participant, message.brief());
            }
            ConversationSignal::Connected { participant, message } => {
                info!("onParticipantConnected: handle={} msg={}", participant, message.brief());
            }
            ConversationSignal::RelatedConversation {
                related_conversation,
                related_participant,
                original_conversation,
                original_participant,
            } => {
                info!(
                    "onRelatedConversation: relatedConvHandle={} relatedPartHandle={} origConvHandle={} origPartHandle={}",
                    related_conversation, related_participant, original_conversation, original_participant
                );
            }
            ConversationSignal::RedirectSuccess { participant } => {
                info!("onParticipantRedirectSuccess: handle={}", participant);
            }
            ConversationSignal::RedirectFailure {
                participant,
                status_code,
            } => {
                info!(
                    "onParticipantRedirectFailure: handle={} statusCode={}",
                    participant, status_code
                );
            }
            ConversationSignal::RequestedHold { participant, held } => {
                info!("onParticipantRequestedHold: handle={} held={}", participant, held);
            }
        }
    }

    /// Route a new arrival into its room
    pub async fn on_incoming_participant(
        &mut self,
        participant: ParticipantHandle,
        message: &SignalingMessage,
    ) -> Result<RouteOutcome> {
        let outcome = router::route_incoming(
            &mut self.directory,
            self.control.as_ref(),
            self.config.auto_answer,
            participant,
            message,
        )
        .await?;

        match &outcome {
            RouteOutcome::Ignored => self.publish(RoomEvent::ParticipantIgnored { participant }),
            RouteOutcome::Admitted {
                room,
                conversation,
                created,
                ..
            } => {
                self.rooms
                    .entry(*conversation)
                    .or_insert_with(|| RoomState::new(room.clone()));
                if *created {
                    self.publish(RoomEvent::RoomCreated {
                        room: room.clone(),
                        conversation: *conversation,
                    });
                }
                self.publish(RoomEvent::ParticipantAdmitted {
                    room: room.clone(),
                    conversation: *conversation,
                    participant,
                });
            }
        }
        Ok(outcome)
    }

    /// Decide the role of a participant whose media just came up
    pub async fn on_connected_confirmed(
        &mut self,
        participant: ParticipantHandle,
        message: &SignalingMessage,
    ) -> Result<BridgeDecision> {
        let room = message.room_id();
        let conversation = self
            .directory
            .get(&room)
            .ok_or_else(|| RoomBridgeError::RoomNotFound {
                room: room.clone(),
                participant,
            })?;
        if !self.control.has_conversation(conversation) {
            return Err(RoomBridgeError::ConversationNotFound { room, conversation });
        }

        let state = self
            .rooms
            .entry(conversation)
            .or_insert_with(|| RoomState::new(room.clone()));

        if let Some(role) = state.occupancy.role(participant) {
            debug!("Participant {} already {:?} in room {}", participant, role, room);
            return Ok(BridgeDecision::AlreadyTracked(role));
        }

        let engaged = state.occupancy.engaged_count() + 1;

        if engaged < 2 {
            if self.control.endpoint(participant).is_none() {
                return Err(RoomBridgeError::EndpointNotReady(participant));
            }
            debug!("we are first in the conversation");
            state.occupancy.set_role(participant, ParticipantRole::Waiting);
            state
                .queue
                .push_back(Sequence::wait(self.ids.next(), conversation, participant));
            state.start_next(&self.dispatcher);
            return Ok(BridgeDecision::Waiting);
        }

        if engaged > 2 {
            warn!(
                "participants already here, can't join, room={} engaged={}",
                room, engaged
            );
            state.occupancy.set_role(participant, ParticipantRole::Rejected);
            return Err(RoomBridgeError::CapacityExceeded { room, engaged });
        }

        debug!("joining a Conversation with an existing Participant");
        if self.control.endpoint(participant).is_none() {
            return Err(RoomBridgeError::EndpointNotReady(participant));
        }
        let peer = state
            .occupancy
            .bridge_candidate(participant)
            .ok_or(RoomBridgeError::PeerMissing {
                conversation,
                participant,
            })?;

        let pair = state.occupancy.begin_bridge(participant, peer);
        state
            .queue
            .push_back(Sequence::bridge(self.ids.next(), conversation, pair));
        state.start_next(&self.dispatcher);

        info!("Room {}: bridging participant {} with {}", room, participant, peer);
        self.publish(RoomEvent::BridgeStarted {
            room,
            newcomer: participant,
            peer,
        });
        Ok(BridgeDecision::Bridging { peer })
    }

    async fn handle_bridge_error(
        &mut self,
        participant: ParticipantHandle,
        message: &SignalingMessage,
        error: RoomBridgeError,
    ) {
        match error {
            RoomBridgeError::CapacityExceeded { room, engaged } => {
                self.publish(RoomEvent::ParticipantRejected {
                    room,
                    participant,
                    engaged,
                });
            }
            RoomBridgeError::EndpointNotReady(_) => {
                error!("our endpoint is not initialized, participant={}", participant);
                self.publish(RoomEvent::EndpointNotReady {
                    room: message.room_id(),
                    participant,
                });
            }
            RoomBridgeError::RoomNotFound { .. } => {
                error!("invalid room! {}", error);
                self.publish(RoomEvent::ConsistencyFailure {
                    participant,
                    reason: error.to_string(),
                });
            }
            RoomBridgeError::ConversationNotFound { conversation, .. }
            | RoomBridgeError::PeerMissing { conversation, .. } => {
                self.fail_conversation(conversation, &error).await;
            }
            other if other.is_recoverable() => {
                warn!("Could not bridge participant {}: {}", participant, other);
            }
            other => error!("Failed to handle confirmed participant {}: {}", participant, other),
        }
    }

    /// Tear down one conversation after an internal-consistency failure
    async fn fail_conversation(&mut self, conversation: ConversationHandle, error: &RoomBridgeError) {
        let room = self
            .rooms
            .remove(&conversation)
            .map(|state| state.room)
            .or_else(|| self.directory.room_of(conversation).cloned());
        let Some(room) = room else {
            error!("Consistency failure in unknown conversation {}: {}", conversation, error);
            return;
        };

        error!("Room {}: terminating conversation {}: {}", room, conversation, error);
        self.directory.remove(&room);
        if let Err(e) = self.control.destroy_conversation(conversation).await {
            warn!("Failed to destroy conversation {}: {}", conversation, e);
        }
        self.publish(RoomEvent::ConversationFailed {
            room,
            conversation,
            reason: error.to_string(),
        });
    }

    /// Departure Handler: find the room holding `participant` and unwind its bridge
    pub async fn on_participant_terminated(&mut self, participant: ParticipantHandle) -> DepartureOutcome {
        let rooms = &self.rooms;
        let found = self
            .directory
            .find_first(|conversation| {
                rooms
                    .get(&conversation)
                    .map_or(false, |state| state.occupancy.contains(participant))
            })
            .map(|(room, conversation)| (room.clone(), conversation));

        let Some((room, conversation)) = found else {
            debug!("Participant {} not tracked by any room", participant);
            return DepartureOutcome::NotTracked;
        };
        let Some(state) = self.rooms.get_mut(&conversation) else {
            return DepartureOutcome::NotTracked;
        };
        debug!("found participant {} in room {}", participant, room);

        state.cancel_involving(participant);
        let Some(departure) = state.occupancy.depart(participant) else {
            return DepartureOutcome::NotTracked;
        };

        let outcome = if departure.role == ParticipantRole::Rejected {
            DepartureOutcome::Dropped { room: room.clone() }
        } else if let Some(peer) = departure.peer {
            state.occupancy.set_role(peer, ParticipantRole::Unwinding);
            state
                .queue
                .push_back(Sequence::unwind(self.ids.next(), conversation, peer));
            info!("Room {}: participant {} left, returning {} to waiting", room, participant, peer);
            DepartureOutcome::PeerUnwinding { room: room.clone(), peer }
        } else {
            state
                .queue
                .push_back(Sequence::release(self.ids.next(), conversation, participant));
            DepartureOutcome::Released { room: room.clone() }
        };
        state.start_next(&self.dispatcher);

        if matches!(outcome, DepartureOutcome::Dropped { .. }) {
            self.maybe_reclaim(conversation, participant).await;
        }
        outcome
    }

    fn on_conversation_destroyed(&mut self, conversation: ConversationHandle) {
        let Some(room) = self.directory.room_of(conversation).cloned() else {
            return;
        };
        self.directory.remove(&room);
        self.rooms.remove(&conversation);
        info!("Room {} closed with its conversation {}", room, conversation);
        self.publish(RoomEvent::RoomClosed { room, conversation });
    }

    /// Drop an empty room when the policy asks for it
    async fn maybe_reclaim(&mut self, conversation: ConversationHandle, departed: ParticipantHandle) {
        if self.config.empty_room_policy != EmptyRoomPolicy::Reclaim {
            return;
        }
        let Some(state) = self.rooms.get(&conversation) else {
            return;
        };
        if !state.occupancy.is_empty() || !state.is_idle() {
            return;
        }
        let others = self
            .control
            .remote_participants(conversation)
            .map_or(0, |members| members.iter().filter(|p| **p != departed).count());
        if others > 0 {
            debug!(
                "Room {} has {} unconfirmed participants, keeping it",
                state.room, others
            );
            return;
        }

        let room = state.room.clone();
        self.rooms.remove(&conversation);
        self.directory.remove(&room);
        if let Err(e) = self.control.destroy_conversation(conversation).await {
            warn!("Failed to destroy conversation {}: {}", conversation, e);
        }
        info!("Room {} reclaimed", room);
        self.publish(RoomEvent::RoomClosed { room, conversation });
    }

    /// Advance the step machine whose step just completed
    pub async fn handle_completion(&mut self, completion: StepCompletion) {
        let StepCompletion {
            conversation,
            sequence: id,
            result,
        } = completion;

        let Some(state) = self.rooms.get_mut(&conversation) else {
            debug!("Ignoring completion of {} for closed conversation {}", id, conversation);
            return;
        };
        if state.draining == Some(id) {
            debug!("Room {}: fenced sequence {} drained", state.room, id);
            state.draining = None;
            state.start_next(&self.dispatcher);
            return;
        }
        if state.active.as_ref().map(|sequence| sequence.id) != Some(id) {
            debug!("Ignoring stale completion of {} in room {}", id, state.room);
            return;
        }
        let Some(mut sequence) = state.active.take() else {
            return;
        };

        let released = match sequence.kind {
            SequenceKind::Release { participant, .. } => Some(participant),
            _ => None,
        };
        let event = match result {
            Ok(()) => {
                if !sequence.advance() {
                    debug!("Room {}: {} sequence {} advancing", state.room, sequence.label(), id);
                    self.dispatcher.dispatch(&sequence);
                    state.active = Some(sequence);
                    return;
                }
                Self::finish(state, &sequence)
            }
            Err(e) => {
                Self::abandon(state, &mut self.ids, &sequence, &e);
                warn!(
                    "Room {}: {} sequence {} failed: {}",
                    state.room,
                    sequence.label(),
                    id,
                    e
                );
                RoomEvent::SequenceFailed {
                    room: state.room.clone(),
                    sequence: sequence.label(),
                    participant: sequence.subject(),
                    reason: e.to_string(),
                }
            }
        };
        state.start_next(&self.dispatcher);
        self.publish(event);

        if let Some(participant) = released {
            self.maybe_reclaim(conversation, participant).await;
        }
    }

    /// Apply a completed sequence to the occupancy record
    fn finish(state: &mut RoomState, sequence: &Sequence) -> RoomEvent {
        let room = state.room.clone();
        match sequence.kind {
            SequenceKind::Wait { participant, .. } => {
                info!("Room {}: participant {} waiting", room, participant);
                RoomEvent::ParticipantWaiting { room, participant }
            }
            SequenceKind::Bridge { pair, .. } => {
                state.occupancy.complete_bridge(pair);
                info!("Room {}: participants {} and {} bridged", room, pair.first, pair.second);
                RoomEvent::BridgeEstablished {
                    room,
                    newcomer: pair.first,
                    peer: pair.second,
                }
            }
            SequenceKind::Unwind { survivor, .. } => {
                if state.occupancy.role(survivor) == Some(ParticipantRole::Unwinding) {
                    state.occupancy.set_role(survivor, ParticipantRole::Waiting);
                }
                info!("Room {}: participant {} back to waiting", room, survivor);
                RoomEvent::PeerReturnedToWaiting {
                    room,
                    participant: survivor,
                }
            }
            SequenceKind::Release { participant, .. } => RoomEvent::EndpointReleased { room, participant },
        }
    }

    /// Undo the record changes of a failed sequence
    fn abandon(state: &mut RoomState, ids: &mut SequenceIds, sequence: &Sequence, error: &RoomBridgeError) {
        match sequence.kind {
            SequenceKind::Wait { participant, .. } => {
                // Untracked again; the next confirmation retries
                if state.occupancy.role(participant) == Some(ParticipantRole::Waiting) {
                    state.occupancy.forget(participant);
                }
            }
            SequenceKind::Bridge { pair, .. } => {
                if state.occupancy.pair() == Some(pair) {
                    state.occupancy.dissolve_pair();
                }
                state.occupancy.forget(pair.first);
                state.occupancy.set_role(pair.second, ParticipantRole::Waiting);
                state
                    .queue
                    .push_front(Sequence::wait(ids.next(), sequence.conversation, pair.second));
            }
            SequenceKind::Unwind { survivor, .. } => {
                if state.occupancy.role(survivor) == Some(ParticipantRole::Unwinding) {
                    state.occupancy.set_role(survivor, ParticipantRole::Waiting);
                }
            }
            SequenceKind::Release { participant, .. } => {
                debug!("Release of {} failed: {}", participant, error);
            }
        }
    }

    /// Snapshot for the Status Reporter
    pub fn status_report(&self) -> StatusReport {
        let mut rooms: Vec<RoomStatus> = self
            .directory
            .iter()
            .filter_map(|(_, conversation)| {
                self.rooms
                    .get(&conversation)
                    .map(|state| state.to_status(conversation))
            })
            .collect();
        rooms.sort_by(|a, b| a.room.cmp(&b.room));
        status::collect(self.control.as_ref(), rooms)
    }
}
