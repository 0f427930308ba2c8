use crate::commitlog::{Position, StorageError};
use crate::protocol::{
    AcknowledgementStatus, ConsensusHeartbeat, ControlMessage, MessageAcknowledgement, RequestVote, Vote,
};
use crate::replica::election::context::{self, RoleContext, Transition};
use crate::replica::peers::NodeId;
use crate::replica::position;
use crate::transport::{self, ControlledAction, OfferError, Subscription};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("this node is not the leader")]
    NotLeader,
    #[error("frame of {length} bytes exceeds the maximum of {max}")]
    PayloadTooLarge { length: usize, max: usize },
    #[error("archive has no room left for the frame")]
    ArchiveFull,
    #[error("data publication refused the frame")]
    Offer(#[from] OfferError),
    #[error("frame was published but could not be archived")]
    Storage(#[from] StorageError),
}

pub(crate) struct Leader {
    logger: slog::Logger,
    heartbeat_interval: Duration,
    next_heartbeat_time: Instant,
    max_resend_length: usize,
    acknowledged_positions: HashMap<NodeId, Position>,
    acknowledged_position: Position,
}

impl Leader {
    pub(crate) fn new(
        logger: slog::Logger,
        heartbeat_interval: Duration,
        max_resend_length: usize,
        now: Instant,
    ) -> Self {
        Leader {
            logger,
            heartbeat_interval,
            next_heartbeat_time: now,
            max_resend_length,
            acknowledged_positions: HashMap::new(),
            acknowledged_position: 0,
        }
    }

    pub(crate) fn gets_elected(&mut self, ctx: &mut RoleContext, now: Instant) {
        let data_session_id = ctx.data_session_id();
        let transport_start_position = ctx.data_publication.position();
        let received_position = ctx.term_state.received_position();
        ctx.term_state
            .set_leader_session_id(data_session_id)
            .set_transport_position_delta(position::transport_position_delta(
                transport_start_position,
                received_position,
            ))
            .set_transport_start_position(transport_start_position);
        ctx.archiver.on_authoring();

        slog::info!(
            self.logger,
            "Leading term {:?} from position {} on session {:?}",
            ctx.term_state.leadership_term(),
            received_position,
            data_session_id
        );

        self.acknowledged_positions.clear();
        self.acknowledged_positions.insert(ctx.my_node_id(), received_position);
        self.acknowledged_position = 0;
        self.update_commit_position(ctx);
        self.heartbeat(ctx, now);
    }

    fn heartbeat(&mut self, ctx: &mut RoleContext, now: Instant) {
        let term_state = &ctx.term_state;
        let transport_start_position = term_state.transport_start_position();
        let result = ctx.control_publication.save_consensus_heartbeat(
            ctx.cluster.my_node_id(),
            term_state.leadership_term(),
            term_state.commit_position(),
            transport_start_position,
            ctx.data_publication.position(),
            term_state.leader_session_id(),
            position::transport_to_logical(transport_start_position, term_state.transport_position_delta()),
        );

        self.next_heartbeat_time = match result {
            Ok(_) => now + self.heartbeat_interval,
            Err(_) => now,
        };
    }

    // Returns true if the commit position moved.
    fn update_commit_position(&mut self, ctx: &mut RoleContext) -> bool {
        let acknowledged_position = ctx
            .acknowledgement_strategy
            .find_acked_position(ctx.cluster.size(), &self.acknowledged_positions);
        if acknowledged_position <= self.acknowledged_position {
            return false;
        }

        self.acknowledged_position = acknowledged_position;
        ctx.term_state.ratchet_fwd_commit_position(acknowledged_position)
    }

    pub(crate) fn poll_commands(
        &mut self,
        ctx: &mut RoleContext,
        subscription: &mut dyn Subscription,
        fragment_limit: usize,
        now: Instant,
    ) -> usize {
        let logger = ctx.logger.clone();
        context::poll_control_messages(subscription, fragment_limit, &logger, &mut |message| {
            let action = self.on_message(ctx, message, now);
            context::stop_on_transition(ctx, action)
        })
    }

    pub(crate) fn check_conditions(&mut self, ctx: &mut RoleContext, now: Instant) -> usize {
        if now >= self.next_heartbeat_time {
            self.heartbeat(ctx, now);
            return 1;
        }

        0
    }

    pub(crate) fn write_data(
        &mut self,
        ctx: &mut RoleContext,
        payload: &[u8],
        now: Instant,
    ) -> Result<Position, WriteError> {
        let frame_length = transport::aligned_frame_length(payload.len());
        if frame_length > self.max_resend_length {
            return Err(WriteError::PayloadTooLarge {
                length: frame_length,
                max: self.max_resend_length,
            });
        }
        if !ctx.archiver.can_append(frame_length) {
            return Err(WriteError::ArchiveFull);
        }

        ctx.data_publication.offer(payload)?;
        let frame = transport::encode_frame(ctx.data_session_id(), payload);
        let position = ctx.archiver.end_position();
        if let Err(e) = ctx.archiver.append(&frame) {
            slog::error!(
                self.logger,
                "Frame at {} is on the data stream but not in the archive: {}",
                position,
                e
            );
            return Err(e.into());
        }

        let received_position = ctx.term_state.advance_received_position(frame.len() as u64).received_position();
        self.acknowledged_positions.insert(ctx.my_node_id(), received_position);
        if self.update_commit_position(ctx) {
            self.heartbeat(ctx, now);
        }

        Ok(position)
    }

    pub(crate) fn close_streams(&mut self, ctx: &mut RoleContext) {
        ctx.data_publication.close();
    }

    fn on_message(&mut self, ctx: &mut RoleContext, message: ControlMessage, now: Instant) -> ControlledAction {
        match message {
            ControlMessage::RequestVote(request) => self.on_request_vote(ctx, request),
            ControlMessage::ReplyVote(reply) => {
                ctx.forward_node_state(&reply);
                ControlledAction::Continue
            }
            ControlMessage::ConsensusHeartbeat(heartbeat) => self.on_consensus_heartbeat(ctx, heartbeat),
            ControlMessage::Resend(_) => ControlledAction::Continue,
            ControlMessage::MessageAcknowledgement(ack) => self.on_message_acknowledgement(ctx, ack, now),
        }
    }

    fn on_request_vote(&mut self, ctx: &mut RoleContext, request: RequestVote) -> ControlledAction {
        let my_node_id = ctx.my_node_id();
        if request.candidate_id == my_node_id {
            return ControlledAction::Continue;
        }

        let data_session_id = ctx.data_session_id();
        let result = ctx.control_publication.save_reply_vote(
            my_node_id,
            request.candidate_id,
            request.term,
            Vote::Against,
            ctx.node_state.clone(),
            data_session_id,
        );

        match result {
            Ok(_) => ControlledAction::Continue,
            Err(_) => ControlledAction::Abort,
        }
    }

    fn on_consensus_heartbeat(&mut self, ctx: &mut RoleContext, heartbeat: ConsensusHeartbeat) -> ControlledAction {
        if heartbeat.leader_id == ctx.my_node_id() || heartbeat.term <= ctx.term_state.leadership_term() {
            return ControlledAction::Continue;
        }
        let delta = match context::heartbeat_delta(&heartbeat, ctx.term_state.received_position()) {
            Some(delta) => delta,
            None => {
                slog::debug!(self.logger, "Dropping heartbeat with unusable positions {:?}", heartbeat);
                return ControlledAction::Continue;
            }
        };

        slog::info!(
            self.logger,
            "Stepping down, {:?} leads newer term {:?}",
            heartbeat.leader_id,
            heartbeat.term
        );
        ctx.term_state
            .set_leadership_term(heartbeat.term)
            .set_leader_session_id(heartbeat.leader_session_id)
            .set_transport_position_delta(delta)
            .set_transport_start_position(heartbeat.transport_start_position);
        ctx.request_transition(Transition::ToFollower {
            leader: Some(heartbeat.leader_id),
        });

        ControlledAction::Continue
    }

    fn on_message_acknowledgement(
        &mut self,
        ctx: &mut RoleContext,
        ack: MessageAcknowledgement,
        now: Instant,
    ) -> ControlledAction {
        // Acknowledgements of an earlier leadership say nothing about this term's log.
        if !ctx.cluster.is_peer(ack.node_id) || ack.term != ctx.term_state.leadership_term() {
            return ControlledAction::Continue;
        }

        if ack.status == AcknowledgementStatus::MissingLogEntries && ack.position < ctx.term_state.received_position() {
            if let Err(action) = self.resend(ctx, ack.position) {
                return action;
            }
        }

        let is_newer = match self.acknowledged_positions.get(&ack.node_id) {
            Some(&acknowledged) => ack.position > acknowledged,
            None => true,
        };
        if is_newer {
            slog::trace!(self.logger, "{:?} acknowledged {}", ack.node_id, ack.position);
            self.acknowledged_positions.insert(ack.node_id, ack.position);
            if self.update_commit_position(ctx) {
                self.heartbeat(ctx, now);
            }
        }

        ControlledAction::Continue
    }

    fn resend(&mut self, ctx: &mut RoleContext, start_position: Position) -> Result<(), ControlledAction> {
        let body = match ctx.archiver.read_frames(start_position, self.max_resend_length) {
            Ok(body) if !body.is_empty() => body,
            Ok(_) => return Ok(()),
            Err(e) => {
                slog::warn!(self.logger, "Unable to read resend at {}: {}", start_position, e);
                return Ok(());
            }
        };

        let length = body.len();
        let result = ctx.control_publication.save_resend(
            ctx.term_state.leader_session_id(),
            ctx.term_state.leadership_term(),
            start_position,
            body,
        );
        match result {
            Ok(_) => {
                slog::debug!(self.logger, "Resent [{}, {})", start_position, start_position + length as u64);
                Ok(())
            }
            Err(_) => Err(ControlledAction::Abort),
        }
    }
}
