//! Per-conversation occupancy record
//!
//! Tracks the role of every remote participant the coordinator has seen
//! confirmed, and the single bridging pair of the room. The pair is updated
//! when a bridge is planned and when it is torn down, so finding "the other
//! participant" never needs a scan of the conversation.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{ParticipantHandle, ParticipantRole};

/// Symmetric pairing of two bridged participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BridgePair {
    pub first: ParticipantHandle,
    pub second: ParticipantHandle,
}

impl BridgePair {
    pub fn new(first: ParticipantHandle, second: ParticipantHandle) -> Self {
        Self { first, second }
    }

    pub fn contains(&self, participant: ParticipantHandle) -> bool {
        self.first == participant || self.second == participant
    }

    pub fn peer_of(&self, participant: ParticipantHandle) -> Option<ParticipantHandle> {
        if self.first == participant {
            Some(self.second)
        } else if self.second == participant {
            Some(self.first)
        } else {
            None
        }
    }
}

/// What the record knew about a participant when it departed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub role: ParticipantRole,
    /// Paired participant, if the departing one was bridging or bridged
    pub peer: Option<ParticipantHandle>,
}

#[derive(Debug, Default, Clone)]
pub struct RoomOccupancy {
    roles: BTreeMap<ParticipantHandle, ParticipantRole>,
    pair: Option<BridgePair>,
}

impl RoomOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(&self, participant: ParticipantHandle) -> Option<ParticipantRole> {
        self.roles.get(&participant).copied()
    }

    pub fn contains(&self, participant: ParticipantHandle) -> bool {
        self.roles.contains_key(&participant)
    }

    pub fn set_role(&mut self, participant: ParticipantHandle, role: ParticipantRole) {
        self.roles.insert(participant, role);
    }

    /// Forget a participant without touching the pair
    pub fn forget(&mut self, participant: ParticipantHandle) -> Option<ParticipantRole> {
        self.roles.remove(&participant)
    }

    pub fn pair(&self) -> Option<BridgePair> {
        self.pair
    }

    /// Participants counting toward the two-party capacity
    pub fn engaged_count(&self) -> usize {
        self.roles.values().filter(|role| role.is_engaged()).count()
    }

    /// Unpaired participant that can be bridged with `newcomer`.
    ///
    /// An unwinding participant qualifies: its unwind runs before any bridge
    /// queued behind it.
    pub fn bridge_candidate(&self, newcomer: ParticipantHandle) -> Option<ParticipantHandle> {
        self.roles
            .iter()
            .filter(|(participant, _)| **participant != newcomer)
            .filter(|(participant, _)| !self.pair.map_or(false, |pair| pair.contains(**participant)))
            .find(|(_, role)| matches!(role, ParticipantRole::Waiting | ParticipantRole::Unwinding))
            .map(|(participant, _)| *participant)
    }

    /// Pair two participants and mark both as bridging
    pub fn begin_bridge(&mut self, newcomer: ParticipantHandle, peer: ParticipantHandle) -> BridgePair {
        let pair = BridgePair::new(newcomer, peer);
        self.pair = Some(pair);
        self.roles.insert(newcomer, ParticipantRole::Bridging);
        self.roles.insert(peer, ParticipantRole::Bridging);
        pair
    }

    /// Promote the current pair to bridged. Returns false if `pair` is no longer current.
    pub fn complete_bridge(&mut self, pair: BridgePair) -> bool {
        if self.pair != Some(pair) {
            return false;
        }
        self.roles.insert(pair.first, ParticipantRole::Bridged);
        self.roles.insert(pair.second, ParticipantRole::Bridged);
        true
    }

    /// Dissolve the pair, if any, without removing either participant
    pub fn dissolve_pair(&mut self) -> Option<BridgePair> {
        self.pair.take()
    }

    /// Remove a departing participant, dissolving its pair
    pub fn depart(&mut self, participant: ParticipantHandle) -> Option<Departure> {
        let role = self.roles.remove(&participant)?;
        let peer = match self.pair {
            Some(pair) if pair.contains(participant) => {
                self.pair = None;
                pair.peer_of(participant)
            }
            _ => None,
        };
        Some(Departure { role, peer })
    }

    pub fn participants_with(&self, role: ParticipantRole) -> Vec<ParticipantHandle> {
        self.roles
            .iter()
            .filter(|(_, r)| **r == role)
            .map(|(participant, _)| *participant)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticipantHandle, ParticipantRole)> + '_ {
        self.roles.iter().map(|(participant, role)| (*participant, *role))
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ParticipantHandle = ParticipantHandle(1);
    const B: ParticipantHandle = ParticipantHandle(2);
    const C: ParticipantHandle = ParticipantHandle(3);

    #[test]
    fn test_pair_is_symmetric() {
        let pair = BridgePair::new(A, B);
        assert_eq!(pair.peer_of(A), Some(B));
        assert_eq!(pair.peer_of(B), Some(A));
        assert_eq!(pair.peer_of(C), None);
    }

    #[test]
    fn test_bridge_lifecycle() {
        let mut occupancy = RoomOccupancy::new();
        occupancy.set_role(A, ParticipantRole::Waiting);
        assert_eq!(occupancy.bridge_candidate(B), Some(A));
        assert_eq!(occupancy.bridge_candidate(A), None);

        let pair = occupancy.begin_bridge(B, A);
        assert_eq!(occupancy.role(A), Some(ParticipantRole::Bridging));
        assert_eq!(occupancy.role(B), Some(ParticipantRole::Bridging));
        assert_eq!(occupancy.bridge_candidate(C), None);
        assert_eq!(occupancy.engaged_count(), 2);

        assert!(occupancy.complete_bridge(pair));
        assert_eq!(occupancy.participants_with(ParticipantRole::Bridged), vec![A, B]);
    }

    #[test]
    fn test_rejected_do_not_count() {
        let mut occupancy = RoomOccupancy::new();
        occupancy.begin_bridge(A, B);
        occupancy.set_role(C, ParticipantRole::Rejected);
        assert_eq!(occupancy.engaged_count(), 2);
        assert_eq!(occupancy.bridge_candidate(ParticipantHandle(4)), None);
    }

    #[test]
    fn test_depart_dissolves_pair() {
        let mut occupancy = RoomOccupancy::new();
        let pair = occupancy.begin_bridge(A, B);
        occupancy.complete_bridge(pair);

        let departure = occupancy.depart(A).unwrap();
        assert_eq!(departure.role, ParticipantRole::Bridged);
        assert_eq!(departure.peer, Some(B));
        assert!(occupancy.pair().is_none());
        assert!(!occupancy.complete_bridge(pair));
        assert!(occupancy.depart(A).is_none());

        let departure = occupancy.depart(B).unwrap();
        assert_eq!(departure.peer, None);
        assert!(occupancy.is_empty());
    }

    #[test]
    fn test_unwinding_participant_is_a_candidate() {
        let mut occupancy = RoomOccupancy::new();
        occupancy.set_role(B, ParticipantRole::Unwinding);
        assert_eq!(occupancy.bridge_candidate(C), Some(B));
    }
}
