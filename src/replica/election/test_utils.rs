use crate::api::NoOpNodeStateHandler;
use crate::commitlog::{InMemoryByteLog, Position};
use crate::protocol::{
    AcknowledgementStatus, ConsensusHeartbeat, ControlMessage, MessageAcknowledgement, RaftPublication, ReplyVote,
    RequestVote, Vote,
};
use crate::replica::acknowledgement::QuorumAcknowledgementStrategy;
use crate::replica::archiver::RaftArchiver;
use crate::replica::election::context::RoleContext;
use crate::replica::peers::{ClusterMembers, NodeId};
use crate::replica::term_state::{Term, TermState};
use crate::transport::{
    ControlledAction, InMemoryBus, InMemoryPublication, InMemorySubscription, Publication, SessionId, StreamId,
    Subscription, Switch,
};
use bytes::Bytes;
use std::time::Instant;

const CONTROL: StreamId = StreamId(1);
const DATA: StreamId = StreamId(2);

pub(crate) const ME: NodeId = NodeId(2);

/// TestNode wires a single node's `RoleContext` onto an in-memory bus. The test plays the rest of
/// the cluster: it injects control messages from a peer, owns an external leader's data stream, and
/// reads back whatever the node published on the control stream.
pub(crate) struct TestNode {
    pub(crate) start: Instant,
    pub(crate) ctx: RoleContext,
    pub(crate) control_subscription: InMemorySubscription,
    pub(crate) control_back_pressure: Switch,
    pub(crate) data_back_pressure: Switch,
    pub(crate) data_frame_loss: Switch,
    pub(crate) leader_data: InMemoryPublication,
    bus: InMemoryBus,
    peer_control: InMemoryPublication,
    observer: InMemorySubscription,
    own_control_session: SessionId,
}

impl TestNode {
    pub(crate) fn new() -> Self {
        Self::with_log(InMemoryByteLog::new())
    }

    pub(crate) fn with_log(log: InMemoryByteLog) -> Self {
        let bus = InMemoryBus::new();
        let logger = slog::Logger::root(slog::Discard, slog::o!());

        let control_subscription = bus.add_subscription(CONTROL);
        let observer = bus.add_subscription(CONTROL);
        let control_publication = bus.add_publication(CONTROL);
        let control_back_pressure = control_publication.back_pressure();
        let own_control_session = control_publication.session_id();
        let peer_control = bus.add_publication(CONTROL);

        let data_subscription = bus.add_subscription(DATA);
        let data_frame_loss = data_subscription.frame_loss();
        let data_publication = bus.add_publication(DATA);
        let data_back_pressure = data_publication.back_pressure();
        let leader_data = bus.add_publication(DATA);

        let ctx = RoleContext::new(
            logger.clone(),
            ClusterMembers::new(ME, vec![NodeId(1), ME, NodeId(3)]),
            TermState::new(),
            RaftArchiver::new(logger, Box::new(log), Box::new(data_subscription)),
            RaftPublication::new(Box::new(control_publication)),
            Box::new(data_publication),
            Box::new(QuorumAcknowledgementStrategy),
            Bytes::from_static(b"node-2 state"),
            Box::new(NoOpNodeStateHandler),
        );

        TestNode {
            start: Instant::now(),
            ctx,
            control_subscription,
            control_back_pressure,
            data_back_pressure,
            data_frame_loss,
            leader_data,
            bus,
            peer_control,
            observer,
            own_control_session,
        }
    }

    pub(crate) fn logger(&self) -> slog::Logger {
        self.ctx.logger.clone()
    }

    /// Session of the external leader's data stream.
    pub(crate) fn leader_session(&self) -> SessionId {
        self.leader_data.session_id()
    }

    /// A data stream for some other node that takes over as leader.
    pub(crate) fn new_leader_data(&self) -> InMemoryPublication {
        self.bus.add_publication(DATA)
    }

    pub(crate) fn inject(&mut self, message: ControlMessage) {
        self.peer_control.offer(&message.encode()).unwrap();
    }

    /// Control messages the node published since the last call.
    pub(crate) fn published(&mut self) -> Vec<ControlMessage> {
        let own_session = self.own_control_session;
        let mut messages = vec![];
        self.observer.controlled_poll(
            &mut |frame| {
                if frame.session_id == own_session {
                    messages.push(ControlMessage::decode(frame.payload()).unwrap());
                }
                ControlledAction::Continue
            },
            usize::MAX,
        );

        messages
    }
}

pub(crate) fn request_vote(candidate_id: NodeId, term: u64, candidate_position: Position) -> ControlMessage {
    ControlMessage::RequestVote(RequestVote {
        candidate_id,
        candidate_session_id: SessionId(100 + candidate_id.0 as i32),
        term: Term::new(term),
        candidate_position,
    })
}

pub(crate) fn reply_vote(sender_id: NodeId, candidate_id: NodeId, term: u64, vote: Vote) -> ControlMessage {
    ControlMessage::ReplyVote(ReplyVote {
        sender_id,
        candidate_id,
        term: Term::new(term),
        vote,
        node_state: Bytes::new(),
        sender_session_id: SessionId(100 + sender_id.0 as i32),
    })
}

pub(crate) fn heartbeat(
    leader_id: NodeId,
    term: u64,
    position: Position,
    transport_position: i64,
    leader_session_id: SessionId,
) -> ControlMessage {
    heartbeat_in_stream(leader_id, term, position, transport_position, leader_session_id, 0, 0)
}

/// A heartbeat from a leader whose term began at log position `term_start_position`, when its data
/// stream stood at `transport_start_position`.
pub(crate) fn heartbeat_in_stream(
    leader_id: NodeId,
    term: u64,
    position: Position,
    transport_position: i64,
    leader_session_id: SessionId,
    transport_start_position: i64,
    term_start_position: Position,
) -> ControlMessage {
    ControlMessage::ConsensusHeartbeat(ConsensusHeartbeat {
        leader_id,
        term: Term::new(term),
        position,
        transport_start_position,
        transport_position,
        leader_session_id,
        term_start_position,
    })
}

pub(crate) fn acknowledgement(
    node_id: NodeId,
    position: Position,
    status: AcknowledgementStatus,
    term: u64,
) -> ControlMessage {
    ControlMessage::MessageAcknowledgement(MessageAcknowledgement {
        position,
        node_id,
        status,
        term: Term::new(term),
    })
}
