use crate::api::NodeStateHandler;
use crate::commitlog::Position;
use crate::protocol::{ConsensusHeartbeat, ControlMessage, RaftPublication, ReplyVote};
use crate::replica::acknowledgement::AcknowledgementStrategy;
use crate::replica::archiver::RaftArchiver;
use crate::replica::peers::{ClusterMembers, NodeId};
use crate::replica::position;
use crate::replica::term_state::TermState;
use crate::transport::{ControlledAction, Frame, Publication, SessionId, Subscription};
use bytes::Bytes;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Transition {
    ToFollower { leader: Option<NodeId> },
    ToCandidate,
    ToLeader,
}

/// RoleContext is everything a node owns that outlives a single role. The active role borrows it
/// mutably for the duration of each call, and asks for role changes through `request_transition`.
pub(crate) struct RoleContext {
    pub(crate) logger: slog::Logger,
    pub(crate) cluster: ClusterMembers,
    pub(crate) term_state: TermState,
    pub(crate) archiver: RaftArchiver,
    pub(crate) control_publication: RaftPublication,
    pub(crate) data_publication: Box<dyn Publication>,
    pub(crate) acknowledgement_strategy: Box<dyn AcknowledgementStrategy>,
    pub(crate) node_state: Bytes,
    pub(crate) node_state_handler: Box<dyn NodeStateHandler>,
    transition: Option<Transition>,
}

impl RoleContext {
    pub(crate) fn new(
        logger: slog::Logger,
        cluster: ClusterMembers,
        term_state: TermState,
        archiver: RaftArchiver,
        control_publication: RaftPublication,
        data_publication: Box<dyn Publication>,
        acknowledgement_strategy: Box<dyn AcknowledgementStrategy>,
        node_state: Bytes,
        node_state_handler: Box<dyn NodeStateHandler>,
    ) -> Self {
        RoleContext {
            logger,
            cluster,
            term_state,
            archiver,
            control_publication,
            data_publication,
            acknowledgement_strategy,
            node_state,
            node_state_handler,
            transition: None,
        }
    }

    pub(crate) fn my_node_id(&self) -> NodeId {
        self.cluster.my_node_id()
    }

    /// The session followers attach to when this node leads.
    pub(crate) fn data_session_id(&self) -> SessionId {
        self.data_publication.session_id()
    }

    /// First request in a tick wins. The node applies it before the role is called again.
    pub(crate) fn request_transition(&mut self, transition: Transition) {
        if self.transition.is_none() {
            self.transition = Some(transition);
        }
    }

    pub(crate) fn has_pending_transition(&self) -> bool {
        self.transition.is_some()
    }

    pub(crate) fn take_transition(&mut self) -> Option<Transition> {
        self.transition.take()
    }

    pub(crate) fn forward_node_state(&mut self, reply: &ReplyVote) {
        if reply.sender_id != self.my_node_id() {
            self.node_state_handler
                .on_new_node_state(reply.sender_id, reply.sender_session_id, &reply.node_state);
        }
    }
}

/// Decodes control frames and hands them to `handler`. Undecodable frames are dropped.
pub(crate) fn poll_control_messages(
    subscription: &mut dyn Subscription,
    fragment_limit: usize,
    logger: &slog::Logger,
    handler: &mut dyn FnMut(ControlMessage) -> ControlledAction,
) -> usize {
    subscription.controlled_poll(
        &mut |frame: &Frame| match ControlMessage::decode(frame.payload()) {
            Ok(message) => {
                slog::trace!(logger, "Received {:?}", message);
                handler(message)
            }
            Err(e) => {
                slog::debug!(
                    logger,
                    "Dropping undecodable control frame from session {:?} at {}: {}",
                    frame.session_id,
                    frame.position,
                    e
                );
                ControlledAction::Continue
            }
        },
        fragment_limit,
    )
}

/// The delta between the leader's data stream and the log for the heartbeat's term. `None` when the
/// heartbeat's positions cannot describe a real stream, or cannot be mapped onto a log that ends at
/// `log_position`.
pub(crate) fn heartbeat_delta(heartbeat: &ConsensusHeartbeat, log_position: Position) -> Option<i64> {
    if heartbeat.transport_start_position < 0 || heartbeat.transport_position < heartbeat.transport_start_position {
        return None;
    }

    let delta =
        position::checked_transport_position_delta(heartbeat.transport_start_position, heartbeat.term_start_position)?;
    position::checked_transport_to_logical(heartbeat.transport_position, delta)?;
    position::checked_logical_to_transport(log_position, delta)?;

    Some(delta)
}

/// Converts a handler's verdict so that a consumed message which triggered a transition also
/// stops the poll.
pub(crate) fn stop_on_transition(ctx: &RoleContext, action: ControlledAction) -> ControlledAction {
    match action {
        ControlledAction::Continue if ctx.has_pending_transition() => ControlledAction::Break,
        other => other,
    }
}
