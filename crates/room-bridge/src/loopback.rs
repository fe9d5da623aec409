//! In-process conversation manager with recording media endpoints
//!
//! Used by the simulator binary and the tests. Endpoints keep just enough
//! state to reject out-of-order operations (connecting while still on the
//! holding element, asking for a keyframe without a peer link), and every
//! operation is journaled in issue order.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EndpointSettings;
use crate::control::{ConversationControl, MediaEndpoint};
use crate::errors::{Result, RoomBridgeError};
use crate::sequence::{EndpointOp, PlannedOp};
use crate::types::{ConversationHandle, ParticipantHandle, ParticipantKind};

/// Injected misbehavior for one participant's operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Complete with an error
    Fail,
    /// Never complete
    Stall,
}

#[derive(Debug)]
struct ParticipantEntry {
    kind: ParticipantKind,
    conversation: Option<ConversationHandle>,
    answered: bool,
    endpoint: Option<Arc<LoopbackEndpoint>>,
    settings: Option<EndpointSettings>,
}

impl ParticipantEntry {
    fn new(kind: ParticipantKind) -> Self {
        Self {
            kind,
            conversation: None,
            answered: false,
            endpoint: None,
            settings: None,
        }
    }
}

#[derive(Debug, Default)]
struct LoopbackState {
    next_conversation: u32,
    next_participant: u32,
    conversations: BTreeMap<ConversationHandle, BTreeSet<ParticipantHandle>>,
    participants: BTreeMap<ParticipantHandle, ParticipantEntry>,
}

impl LoopbackState {
    fn allocate_participant(&mut self, kind: ParticipantKind) -> ParticipantHandle {
        self.next_participant += 1;
        let handle = ParticipantHandle(self.next_participant);
        self.participants.insert(handle, ParticipantEntry::new(kind));
        handle
    }
}

/// State shared by every endpoint of one manager
#[derive(Debug, Default)]
struct EndpointShared {
    journal: Mutex<Vec<PlannedOp>>,
    faults: Mutex<HashMap<(ParticipantHandle, &'static str), Fault>>,
    step_delay: Mutex<Duration>,
}

/// Conversation manager living entirely in process
#[derive(Debug, Clone)]
pub struct LoopbackConversations {
    state: Arc<Mutex<LoopbackState>>,
    shared: Arc<EndpointShared>,
    local_audio: bool,
}

impl LoopbackConversations {
    /// Manager whose media stack supports local audio
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LoopbackState::default())),
            shared: Arc::new(EndpointShared::default()),
            local_audio: true,
        }
    }

    pub fn without_local_audio() -> Self {
        Self {
            local_audio: false,
            ..Self::new()
        }
    }

    /// Delay every endpoint operation, making bridge steps observable
    pub fn set_step_delay(&self, delay: Duration) {
        *self.shared.step_delay.lock() = delay;
    }

    /// New remote call leg with a negotiated endpoint, not yet in any conversation
    pub fn admit_remote(&self) -> ParticipantHandle {
        let participant = self.admit_remote_without_endpoint();
        self.attach_endpoint(participant);
        participant
    }

    /// New remote call leg whose media is not negotiated yet
    pub fn admit_remote_without_endpoint(&self) -> ParticipantHandle {
        self.state.lock().allocate_participant(ParticipantKind::Remote)
    }

    /// Finish media negotiation for a participant
    pub fn attach_endpoint(&self, participant: ParticipantHandle) {
        let endpoint = Arc::new(LoopbackEndpoint::new(participant, self.shared.clone()));
        if let Some(entry) = self.state.lock().participants.get_mut(&participant) {
            entry.endpoint = Some(endpoint);
        }
    }

    /// Drop a participant as the signaling stack would after BYE
    pub fn hang_up(&self, participant: ParticipantHandle) {
        let mut state = self.state.lock();
        if let Some(entry) = state.participants.remove(&participant) {
            if let Some(conversation) = entry.conversation {
                if let Some(members) = state.conversations.get_mut(&conversation) {
                    members.remove(&participant);
                }
            }
        }
    }

    pub fn is_answered(&self, participant: ParticipantHandle) -> bool {
        self.state
            .lock()
            .participants
            .get(&participant)
            .map_or(false, |entry| entry.answered)
    }

    pub fn applied_settings(&self, participant: ParticipantHandle) -> Option<EndpointSettings> {
        self.state
            .lock()
            .participants
            .get(&participant)
            .and_then(|entry| entry.settings.clone())
    }

    /// Snapshot of the state of a participant's endpoint
    pub fn endpoint_state(&self, participant: ParticipantHandle) -> Option<EndpointState> {
        let endpoint = self.state.lock().participants.get(&participant)?.endpoint.clone()?;
        let state = *endpoint.state.lock();
        Some(state)
    }

    /// Every endpoint operation issued so far, in issue order
    pub fn journal(&self) -> Vec<PlannedOp> {
        self.shared.journal.lock().clone()
    }

    pub fn clear_journal(&self) {
        self.shared.journal.lock().clear();
    }

    pub fn inject_fault(&self, participant: ParticipantHandle, op: EndpointOp, fault: Fault) {
        self.shared.faults.lock().insert((participant, op.name()), fault);
    }

    pub fn clear_faults(&self) {
        self.shared.faults.lock().clear();
    }
}

impl Default for LoopbackConversations {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationControl for LoopbackConversations {
    fn supports_local_audio(&self) -> bool {
        self.local_audio
    }

    async fn create_conversation(&self) -> Result<ConversationHandle> {
        let mut state = self.state.lock();
        state.next_conversation += 1;
        let handle = ConversationHandle(state.next_conversation);
        state.conversations.insert(handle, BTreeSet::new());
        Ok(handle)
    }

    async fn destroy_conversation(&self, conversation: ConversationHandle) -> Result<()> {
        let mut state = self.state.lock();
        let members = state
            .conversations
            .remove(&conversation)
            .ok_or_else(|| RoomBridgeError::control(format!("Unknown conversation {}", conversation)))?;
        for participant in members {
            if let Some(entry) = state.participants.get_mut(&participant) {
                entry.conversation = None;
            }
        }
        Ok(())
    }

    async fn create_local_participant(&self) -> Result<ParticipantHandle> {
        Ok(self.state.lock().allocate_participant(ParticipantKind::Local))
    }

    async fn add_participant(&self, conversation: ConversationHandle, participant: ParticipantHandle) -> Result<()> {
        let mut state = self.state.lock();
        if !state.participants.contains_key(&participant) {
            return Err(RoomBridgeError::control(format!("Unknown participant {}", participant)));
        }
        state
            .conversations
            .get_mut(&conversation)
            .ok_or_else(|| RoomBridgeError::control(format!("Unknown conversation {}", conversation)))?
            .insert(participant);
        if let Some(entry) = state.participants.get_mut(&participant) {
            entry.conversation = Some(conversation);
        }
        Ok(())
    }

    async fn answer_participant(&self, participant: ParticipantHandle) -> Result<()> {
        let mut state = self.state.lock();
        let entry = state
            .participants
            .get_mut(&participant)
            .ok_or_else(|| RoomBridgeError::control(format!("Unknown participant {}", participant)))?;
        entry.answered = true;
        Ok(())
    }

    fn conversations(&self) -> BTreeSet<ConversationHandle> {
        self.state.lock().conversations.keys().copied().collect()
    }

    fn participants_by_kind(&self, kind: ParticipantKind) -> BTreeSet<ParticipantHandle> {
        self.state
            .lock()
            .participants
            .iter()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn remote_participants(&self, conversation: ConversationHandle) -> Option<BTreeSet<ParticipantHandle>> {
        let state = self.state.lock();
        let members = state.conversations.get(&conversation)?;
        Some(
            members
                .iter()
                .filter(|handle| {
                    state
                        .participants
                        .get(handle)
                        .map_or(false, |entry| entry.kind == ParticipantKind::Remote)
                })
                .copied()
                .collect(),
        )
    }

    fn endpoint(&self, participant: ParticipantHandle) -> Option<Arc<dyn MediaEndpoint>> {
        let endpoint = self.state.lock().participants.get(&participant)?.endpoint.clone()?;
        Some(endpoint as Arc<dyn MediaEndpoint>)
    }

    fn apply_endpoint_settings(&self, participant: ParticipantHandle, settings: &EndpointSettings) {
        if let Some(entry) = self.state.lock().participants.get_mut(&participant) {
            entry.settings = Some(settings.clone());
        }
    }
}

/// Observable state of a loopback endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointState {
    pub waiting: bool,
    pub linked_to: Option<ParticipantHandle>,
    pub released: bool,
}

#[derive(Debug)]
pub struct LoopbackEndpoint {
    participant: ParticipantHandle,
    state: Mutex<EndpointState>,
    shared: Arc<EndpointShared>,
}

impl LoopbackEndpoint {
    fn new(participant: ParticipantHandle, shared: Arc<EndpointShared>) -> Self {
        Self {
            participant,
            state: Mutex::new(EndpointState {
                waiting: false,
                linked_to: None,
                released: false,
            }),
            shared,
        }
    }

    /// Journal the operation, apply the configured delay and fault, then check the endpoint is usable
    async fn begin(&self, op: EndpointOp) -> Result<()> {
        self.shared.journal.lock().push(PlannedOp {
            target: self.participant,
            op,
        });

        let delay = *self.shared.step_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let fault = self.shared.faults.lock().get(&(self.participant, op.name())).copied();
        match fault {
            Some(Fault::Fail) => return Err(RoomBridgeError::endpoint(self.participant, op.name(), "injected failure")),
            Some(Fault::Stall) => std::future::pending::<()>().await,
            None => {}
        }

        if self.state.lock().released {
            return Err(RoomBridgeError::endpoint(self.participant, op.name(), "endpoint released"));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaEndpoint for LoopbackEndpoint {
    fn participant(&self) -> ParticipantHandle {
        self.participant
    }

    async fn enter_waiting_mode(&self) -> Result<()> {
        self.begin(EndpointOp::EnterWaitingMode).await?;
        let mut state = self.state.lock();
        state.linked_to = None;
        state.waiting = true;
        Ok(())
    }

    async fn leave_waiting_mode(&self) -> Result<()> {
        self.begin(EndpointOp::LeaveWaitingMode).await?;
        self.state.lock().waiting = false;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.begin(EndpointOp::Disconnect).await?;
        self.state.lock().linked_to = None;
        Ok(())
    }

    async fn connect(&self, sink: Arc<dyn MediaEndpoint>) -> Result<()> {
        let op = EndpointOp::Connect {
            sink: sink.participant(),
        };
        self.begin(op).await?;
        let mut state = self.state.lock();
        if state.waiting {
            return Err(RoomBridgeError::endpoint(
                self.participant,
                op.name(),
                "still attached to the holding element",
            ));
        }
        state.linked_to = Some(sink.participant());
        Ok(())
    }

    async fn request_keyframe_from_peer(&self) -> Result<()> {
        self.begin(EndpointOp::RequestKeyframe).await?;
        if self.state.lock().linked_to.is_none() {
            return Err(RoomBridgeError::endpoint(
                self.participant,
                EndpointOp::RequestKeyframe.name(),
                "no peer link",
            ));
        }
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.begin(EndpointOp::Release).await?;
        let mut state = self.state.lock();
        state.released = true;
        state.waiting = false;
        state.linked_to = None;
        Ok(())
    }
}
