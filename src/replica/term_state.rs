use crate::commitlog::Position;
use crate::transport::{SessionId, TransportPosition, NO_SESSION_ID};
use std::fmt;

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash)]
pub struct Term(u64);

impl Term {
    pub fn new(term: u64) -> Self {
        Term(term)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn incr(&mut self) {
        self.0 += 1;
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// TermState is this node's view of the current leadership term and how far the replicated log
/// has progressed locally.
///
/// Positions are logical log positions:
/// `last_applied_position <= commit_position <= received_position`. Only `received_position` may
/// move backwards, and never below `commit_position`.
#[derive(Clone, Debug)]
pub struct TermState {
    leadership_term: Term,
    leader_session_id: SessionId,
    previous_leader_session_id: SessionId,
    received_position: Position,
    last_applied_position: Position,
    commit_position: Position,
    transport_position_delta: i64,
    transport_start_position: TransportPosition,
}

impl TermState {
    pub(crate) fn new() -> Self {
        TermState {
            leadership_term: Term::new(0),
            leader_session_id: NO_SESSION_ID,
            previous_leader_session_id: NO_SESSION_ID,
            received_position: 0,
            last_applied_position: 0,
            commit_position: 0,
            transport_position_delta: 0,
            transport_start_position: 0,
        }
    }

    pub fn leadership_term(&self) -> Term {
        self.leadership_term
    }

    pub(crate) fn set_leadership_term(&mut self, term: Term) -> &mut Self {
        assert!(
            term >= self.leadership_term,
            "Leadership term must not go backwards: {:?} -> {:?}",
            self.leadership_term,
            term
        );
        self.leadership_term = term;
        self
    }

    pub(crate) fn incr_leadership_term(&mut self) -> Term {
        self.leadership_term.incr();
        self.leadership_term
    }

    pub fn leader_session_id(&self) -> SessionId {
        self.leader_session_id
    }

    pub(crate) fn set_leader_session_id(&mut self, session_id: SessionId) -> &mut Self {
        self.leader_session_id = session_id;
        self
    }

    pub fn previous_leader_session_id(&self) -> SessionId {
        self.previous_leader_session_id
    }

    pub fn has_leader(&self) -> bool {
        self.leader_session_id != NO_SESSION_ID
    }

    pub(crate) fn no_leader(&mut self) -> &mut Self {
        if self.has_leader() {
            self.previous_leader_session_id = self.leader_session_id;
        }
        self.leader_session_id = NO_SESSION_ID;
        self
    }

    pub fn received_position(&self) -> Position {
        self.received_position
    }

    pub(crate) fn advance_received_position(&mut self, bytes: u64) -> &mut Self {
        self.received_position = self
            .received_position
            .checked_add(bytes)
            .expect("received position overflowed");
        self
    }

    /// Forgets received but uncommitted bytes past `position`.
    pub(crate) fn rewind_received_position(&mut self, position: Position) -> &mut Self {
        assert!(
            self.commit_position <= position && position <= self.received_position,
            "Cannot rewind received position {} to {} with commit position {}",
            self.received_position,
            position,
            self.commit_position
        );
        self.received_position = position;
        self
    }

    pub fn commit_position(&self) -> Position {
        self.commit_position
    }

    /// Raises the commit position to `position`, capped at what has been received locally. Never
    /// lowers it.
    pub(crate) fn ratchet_fwd_commit_position(&mut self, position: Position) -> bool {
        let new_commit_position = position.min(self.received_position);
        if new_commit_position > self.commit_position {
            self.commit_position = new_commit_position;
            true
        } else {
            false
        }
    }

    pub fn last_applied_position(&self) -> Position {
        self.last_applied_position
    }

    pub(crate) fn ratchet_fwd_last_applied_position(&mut self, position: Position) -> &mut Self {
        assert!(
            position <= self.commit_position,
            "Applied position {} is ahead of commit position {}",
            position,
            self.commit_position
        );
        self.last_applied_position = self.last_applied_position.max(position);
        self
    }

    /// Used at startup, when every cursor agrees.
    pub(crate) fn all_positions(&mut self, position: Position) -> &mut Self {
        self.received_position = position;
        self.commit_position = position;
        self.last_applied_position = position;
        self
    }

    pub fn transport_position_delta(&self) -> i64 {
        self.transport_position_delta
    }

    pub(crate) fn set_transport_position_delta(&mut self, delta: i64) -> &mut Self {
        self.transport_position_delta = delta;
        self
    }

    pub fn transport_start_position(&self) -> TransportPosition {
        self.transport_start_position
    }

    pub(crate) fn set_transport_start_position(&mut self, position: TransportPosition) -> &mut Self {
        self.transport_start_position = position;
        self
    }
}
