use crate::replica::ElectionStateChangeListener;
use crate::replica::ElectionStateSnapshot;
use crate::replica::NodeId;

/// An event that happened, as observed by the local replicator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// An event of leader election or timeout. Consuming this event type is subtle. It doesn't queue
    /// intermediate events. If there are multiple events between when application awaits the next event,
    /// those events will be clobbered into only the most recent event.
    Election(ElectionEvent),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ElectionEvent {
    Leader,
    Candidate,
    Follower(FollowerEventData),
    FollowerNoLeader,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FollowerEventData {
    pub leader_id: NodeId,
}

pub struct EventListener {
    election_state_change_listener: ElectionStateChangeListener,
}

impl EventListener {
    pub(crate) fn new(election_state_change_listener: ElectionStateChangeListener) -> Self {
        EventListener {
            election_state_change_listener,
        }
    }

    /// `next_event()` returns the next event that the local replicator observes, or None once the
    /// replicator has been dropped.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.election_state_change_listener
            .next()
            .await
            .map(|election_state| Event::Election(ElectionEvent::from(election_state)))
    }

    /// The most recent election state, without waiting.
    pub fn current_election_state(&self) -> ElectionEvent {
        ElectionEvent::from(self.election_state_change_listener.latest())
    }
}

// ------- Conversions --------

impl From<ElectionStateSnapshot> for ElectionEvent {
    fn from(election_state: ElectionStateSnapshot) -> Self {
        match election_state {
            ElectionStateSnapshot::Leader => ElectionEvent::Leader,
            ElectionStateSnapshot::Candidate => ElectionEvent::Candidate,
            ElectionStateSnapshot::Follower(leader_id) => ElectionEvent::Follower(FollowerEventData { leader_id }),
            ElectionStateSnapshot::FollowerNoLeader => ElectionEvent::FollowerNoLeader,
        }
    }
}
