//! Endpoint step machines
//!
//! Every media change in a room is a [`Sequence`]: an ordered list of steps,
//! each made of one or more endpoint operations. The coordinator issues the
//! operations of the current step, waits for their single completion, then
//! calls [`Sequence::advance`]. No step starts before the previous one
//! completed.

use serde::Serialize;
use std::fmt;

use crate::occupancy::BridgePair;
use crate::types::{ConversationHandle, ParticipantHandle};

/// Unique id of a sequence, used to fence stale completions
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct SequenceId(pub u64);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq-{}", self.0)
    }
}

/// Operation on one participant's endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointOp {
    EnterWaitingMode,
    LeaveWaitingMode,
    Disconnect,
    /// Send the target's media into `sink`'s endpoint
    Connect { sink: ParticipantHandle },
    RequestKeyframe,
    Release,
}

impl EndpointOp {
    pub fn name(&self) -> &'static str {
        match self {
            EndpointOp::EnterWaitingMode => "enter_waiting_mode",
            EndpointOp::LeaveWaitingMode => "leave_waiting_mode",
            EndpointOp::Disconnect => "disconnect",
            EndpointOp::Connect { .. } => "connect",
            EndpointOp::RequestKeyframe => "request_keyframe_from_peer",
            EndpointOp::Release => "release",
        }
    }
}

/// An operation bound to the participant whose endpoint runs it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedOp {
    pub target: ParticipantHandle,
    pub op: EndpointOp,
}

impl PlannedOp {
    fn new(target: ParticipantHandle, op: EndpointOp) -> Self {
        Self { target, op }
    }
}

/// Steps of the two-party bridge protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BridgeStep {
    /// Newly confirmed participant leaves the holding element
    DisconnectNew,
    /// Waiting peer leaves the holding element
    DisconnectOther,
    /// Peer's media into the newcomer
    ConnectForward,
    /// Newcomer's media into the peer
    ConnectReverse,
    /// Both sides ask for a fresh keyframe
    Keyframe,
    Done,
}

impl BridgeStep {
    pub fn next(self) -> Self {
        match self {
            BridgeStep::DisconnectNew => BridgeStep::DisconnectOther,
            BridgeStep::DisconnectOther => BridgeStep::ConnectForward,
            BridgeStep::ConnectForward => BridgeStep::ConnectReverse,
            BridgeStep::ConnectReverse => BridgeStep::Keyframe,
            BridgeStep::Keyframe | BridgeStep::Done => BridgeStep::Done,
        }
    }
}

/// Steps returning a survivor to the holding element after its peer left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnwindStep {
    DisconnectPeer,
    EnterWaiting,
    Done,
}

impl UnwindStep {
    pub fn next(self) -> Self {
        match self {
            UnwindStep::DisconnectPeer => UnwindStep::EnterWaiting,
            UnwindStep::EnterWaiting | UnwindStep::Done => UnwindStep::Done,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceKind {
    /// First participant of a room goes to the holding element
    Wait { participant: ParticipantHandle, done: bool },
    /// `pair.first` is the newcomer, `pair.second` the waiting peer
    Bridge { pair: BridgePair, step: BridgeStep },
    Unwind { survivor: ParticipantHandle, step: UnwindStep },
    /// Departing participant with no peer gives back its endpoint
    Release { participant: ParticipantHandle, done: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub id: SequenceId,
    pub conversation: ConversationHandle,
    pub kind: SequenceKind,
}

impl Sequence {
    pub fn wait(id: SequenceId, conversation: ConversationHandle, participant: ParticipantHandle) -> Self {
        Self {
            id,
            conversation,
            kind: SequenceKind::Wait { participant, done: false },
        }
    }

    pub fn bridge(id: SequenceId, conversation: ConversationHandle, pair: BridgePair) -> Self {
        Self {
            id,
            conversation,
            kind: SequenceKind::Bridge {
                pair,
                step: BridgeStep::DisconnectNew,
            },
        }
    }

    pub fn unwind(id: SequenceId, conversation: ConversationHandle, survivor: ParticipantHandle) -> Self {
        Self {
            id,
            conversation,
            kind: SequenceKind::Unwind {
                survivor,
                step: UnwindStep::DisconnectPeer,
            },
        }
    }

    pub fn release(id: SequenceId, conversation: ConversationHandle, participant: ParticipantHandle) -> Self {
        Self {
            id,
            conversation,
            kind: SequenceKind::Release { participant, done: false },
        }
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            SequenceKind::Wait { .. } => "wait",
            SequenceKind::Bridge { .. } => "bridge",
            SequenceKind::Unwind { .. } => "unwind",
            SequenceKind::Release { .. } => "release",
        }
    }

    /// Whether `participant` is one of the parties this sequence moves
    pub fn involves(&self, participant: ParticipantHandle) -> bool {
        match self.kind {
            SequenceKind::Wait { participant: p, .. } | SequenceKind::Release { participant: p, .. } => p == participant,
            SequenceKind::Bridge { pair, .. } => pair.contains(participant),
            SequenceKind::Unwind { survivor, .. } => survivor == participant,
        }
    }

    /// Participant the sequence is primarily about, for logs and events
    pub fn subject(&self) -> ParticipantHandle {
        match self.kind {
            SequenceKind::Wait { participant, .. } | SequenceKind::Release { participant, .. } => participant,
            SequenceKind::Bridge { pair, .. } => pair.first,
            SequenceKind::Unwind { survivor, .. } => survivor,
        }
    }

    pub fn is_done(&self) -> bool {
        match self.kind {
            SequenceKind::Wait { done, .. } | SequenceKind::Release { done, .. } => done,
            SequenceKind::Bridge { step, .. } => step == BridgeStep::Done,
            SequenceKind::Unwind { step, .. } => step == UnwindStep::Done,
        }
    }

    /// Operations of the current step, in issue order. Empty once done.
    pub fn current_ops(&self) -> Vec<PlannedOp> {
        match self.kind {
            SequenceKind::Wait { participant, done: false } => {
                vec![PlannedOp::new(participant, EndpointOp::EnterWaitingMode)]
            }
            SequenceKind::Release { participant, done: false } => {
                vec![PlannedOp::new(participant, EndpointOp::Release)]
            }
            SequenceKind::Wait { done: true, .. } | SequenceKind::Release { done: true, .. } => Vec::new(),
            SequenceKind::Bridge { pair, step } => {
                let (newcomer, peer) = (pair.first, pair.second);
                match step {
                    BridgeStep::DisconnectNew => vec![PlannedOp::new(newcomer, EndpointOp::LeaveWaitingMode)],
                    BridgeStep::DisconnectOther => vec![PlannedOp::new(peer, EndpointOp::LeaveWaitingMode)],
                    BridgeStep::ConnectForward => {
                        vec![PlannedOp::new(peer, EndpointOp::Connect { sink: newcomer })]
                    }
                    BridgeStep::ConnectReverse => {
                        vec![PlannedOp::new(newcomer, EndpointOp::Connect { sink: peer })]
                    }
                    BridgeStep::Keyframe => vec![
                        PlannedOp::new(newcomer, EndpointOp::RequestKeyframe),
                        PlannedOp::new(peer, EndpointOp::RequestKeyframe),
                    ],
                    BridgeStep::Done => Vec::new(),
                }
            }
            SequenceKind::Unwind { survivor, step } => match step {
                UnwindStep::DisconnectPeer => vec![PlannedOp::new(survivor, EndpointOp::Disconnect)],
                UnwindStep::EnterWaiting => vec![PlannedOp::new(survivor, EndpointOp::EnterWaitingMode)],
                UnwindStep::Done => Vec::new(),
            },
        }
    }

    /// Move past the current step after its completion. Returns true when done.
    pub fn advance(&mut self) -> bool {
        match &mut self.kind {
            SequenceKind::Wait { done, .. } | SequenceKind::Release { done, .. } => *done = true,
            SequenceKind::Bridge { step, .. } => *step = step.next(),
            SequenceKind::Unwind { step, .. } => *step = step.next(),
        }
        self.is_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NEW: ParticipantHandle = ParticipantHandle(7);
    const OTHER: ParticipantHandle = ParticipantHandle(3);

    fn drain(mut sequence: Sequence) -> Vec<PlannedOp> {
        let mut issued = Vec::new();
        while !sequence.is_done() {
            issued.extend(sequence.current_ops());
            sequence.advance();
        }
        issued
    }

    #[test]
    fn test_bridge_protocol_order() {
        let sequence = Sequence::bridge(SequenceId(1), ConversationHandle(1), BridgePair::new(NEW, OTHER));
        assert_eq!(
            drain(sequence),
            vec![
                PlannedOp::new(NEW, EndpointOp::LeaveWaitingMode),
                PlannedOp::new(OTHER, EndpointOp::LeaveWaitingMode),
                PlannedOp::new(OTHER, EndpointOp::Connect { sink: NEW }),
                PlannedOp::new(NEW, EndpointOp::Connect { sink: OTHER }),
                PlannedOp::new(NEW, EndpointOp::RequestKeyframe),
                PlannedOp::new(OTHER, EndpointOp::RequestKeyframe),
            ]
        );
    }

    #[test]
    fn test_bridge_advances_one_step_per_completion() {
        let mut sequence = Sequence::bridge(SequenceId(1), ConversationHandle(1), BridgePair::new(NEW, OTHER));
        let mut steps = Vec::new();
        loop {
            if let SequenceKind::Bridge { step, .. } = sequence.kind {
                steps.push(step);
            }
            if sequence.is_done() {
                break;
            }
            sequence.advance();
        }
        assert_eq!(
            steps,
            vec![
                BridgeStep::DisconnectNew,
                BridgeStep::DisconnectOther,
                BridgeStep::ConnectForward,
                BridgeStep::ConnectReverse,
                BridgeStep::Keyframe,
                BridgeStep::Done,
            ]
        );
        assert!(sequence.current_ops().is_empty());
        assert!(sequence.advance());
    }

    #[test]
    fn test_unwind_order() {
        let sequence = Sequence::unwind(SequenceId(2), ConversationHandle(1), OTHER);
        assert_eq!(
            drain(sequence),
            vec![
                PlannedOp::new(OTHER, EndpointOp::Disconnect),
                PlannedOp::new(OTHER, EndpointOp::EnterWaitingMode),
            ]
        );
    }

    #[test]
    fn test_single_step_sequences() {
        let mut wait = Sequence::wait(SequenceId(3), ConversationHandle(1), NEW);
        assert_eq!(wait.current_ops(), vec![PlannedOp::new(NEW, EndpointOp::EnterWaitingMode)]);
        assert!(wait.advance());

        let release = Sequence::release(SequenceId(4), ConversationHandle(1), NEW);
        assert_eq!(drain(release), vec![PlannedOp::new(NEW, EndpointOp::Release)]);
    }

    #[test]
    fn test_involves() {
        let bridge = Sequence::bridge(SequenceId(1), ConversationHandle(1), BridgePair::new(NEW, OTHER));
        assert!(bridge.involves(NEW));
        assert!(bridge.involves(OTHER));
        assert!(!bridge.involves(ParticipantHandle(99)));
        assert_eq!(bridge.subject(), NEW);
        assert_eq!(bridge.label(), "bridge");
    }
}
