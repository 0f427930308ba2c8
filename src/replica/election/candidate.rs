use crate::protocol::{ConsensusHeartbeat, ControlMessage, ReplyVote, RequestVote, Vote};
use crate::replica::election::context::{self, RoleContext, Transition};
use crate::replica::peers::NodeId;
use crate::replica::timeout::RandomTimeout;
use crate::transport::{ControlledAction, Subscription};
use std::collections::HashSet;
use std::time::{Duration, Instant};

pub(crate) struct Candidate {
    logger: slog::Logger,
    vote_timeout: RandomTimeout,
    votes_for: HashSet<NodeId>,
    votes_against: HashSet<NodeId>,
    request_vote_pending: bool,
}

impl Candidate {
    pub(crate) fn new(logger: slog::Logger, reply_timeout: Duration, now: Instant, seed: u64) -> Self {
        Candidate {
            logger,
            vote_timeout: RandomTimeout::new(reply_timeout, now, seed),
            votes_for: HashSet::new(),
            votes_against: HashSet::new(),
            request_vote_pending: false,
        }
    }

    /// Bumps the term, votes for self, and asks every peer for a vote.
    pub(crate) fn start_new_election(&mut self, ctx: &mut RoleContext, now: Instant) {
        let term = ctx.term_state.incr_leadership_term();
        ctx.term_state.no_leader();
        ctx.archiver.on_no_leader();
        slog::info!(
            self.logger,
            "Starting election for term {:?} at position {}",
            term,
            ctx.term_state.received_position()
        );

        self.votes_for.clear();
        self.votes_against.clear();
        self.votes_for.insert(ctx.my_node_id());
        self.vote_timeout.on_keep_alive(now);
        self.request_vote_pending = !self.save_request_vote(ctx);

        self.check_votes(ctx);
    }

    fn save_request_vote(&self, ctx: &mut RoleContext) -> bool {
        let my_node_id = ctx.my_node_id();
        let data_session_id = ctx.data_session_id();
        ctx.control_publication
            .save_request_vote(
                my_node_id,
                data_session_id,
                ctx.term_state.leadership_term(),
                ctx.term_state.received_position(),
            )
            .is_ok()
    }

    fn check_votes(&self, ctx: &mut RoleContext) {
        let majority = ctx.cluster.majority();
        if self.votes_for.len() >= majority {
            slog::info!(
                self.logger,
                "Won election for term {:?} with {} votes",
                ctx.term_state.leadership_term(),
                self.votes_for.len()
            );
            ctx.request_transition(Transition::ToLeader);
        } else if self.votes_against.len() >= majority {
            slog::info!(
                self.logger,
                "Lost election for term {:?}",
                ctx.term_state.leadership_term()
            );
            ctx.request_transition(Transition::ToFollower { leader: None });
        }
    }

    pub(crate) fn poll_commands(
        &mut self,
        ctx: &mut RoleContext,
        subscription: &mut dyn Subscription,
        fragment_limit: usize,
    ) -> usize {
        let logger = ctx.logger.clone();
        context::poll_control_messages(subscription, fragment_limit, &logger, &mut |message| {
            let action = self.on_message(ctx, message);
            context::stop_on_transition(ctx, action)
        })
    }

    pub(crate) fn check_conditions(&mut self, ctx: &mut RoleContext, now: Instant) -> usize {
        if self.vote_timeout.has_timed_out(now) {
            self.start_new_election(ctx, now);
            return 1;
        }

        if self.request_vote_pending && self.save_request_vote(ctx) {
            self.request_vote_pending = false;
            return 1;
        }

        0
    }

    fn on_message(&mut self, ctx: &mut RoleContext, message: ControlMessage) -> ControlledAction {
        match message {
            ControlMessage::RequestVote(request) => self.on_request_vote(ctx, request),
            ControlMessage::ReplyVote(reply) => self.on_reply_vote(ctx, reply),
            ControlMessage::ConsensusHeartbeat(heartbeat) => self.on_consensus_heartbeat(ctx, heartbeat),
            ControlMessage::Resend(_) | ControlMessage::MessageAcknowledgement(_) => ControlledAction::Continue,
        }
    }

    fn on_request_vote(&mut self, ctx: &mut RoleContext, request: RequestVote) -> ControlledAction {
        if !ctx.cluster.is_peer(request.candidate_id) {
            return ControlledAction::Continue;
        }

        if request.term > ctx.term_state.leadership_term()
            && request.candidate_position >= ctx.term_state.received_position()
        {
            // Leave the request unconsumed so the follower answers it.
            slog::info!(
                self.logger,
                "Standing down for {:?} in term {:?}",
                request.candidate_id,
                request.term
            );
            ctx.request_transition(Transition::ToFollower { leader: None });
            return ControlledAction::Abort;
        }

        let my_node_id = ctx.my_node_id();
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

    fn on_reply_vote(&mut self, ctx: &mut RoleContext, reply: ReplyVote) -> ControlledAction {
        ctx.forward_node_state(&reply);

        if reply.candidate_id != ctx.my_node_id()
            || reply.term != ctx.term_state.leadership_term()
            || !ctx.cluster.is_peer(reply.sender_id)
        {
            return ControlledAction::Continue;
        }

        slog::debug!(self.logger, "{:?} voted {:?} in term {:?}", reply.sender_id, reply.vote, reply.term);
        match reply.vote {
            Vote::For => self.votes_for.insert(reply.sender_id),
            Vote::Against => self.votes_against.insert(reply.sender_id),
        };
        self.check_votes(ctx);

        ControlledAction::Continue
    }

    fn on_consensus_heartbeat(&mut self, ctx: &mut RoleContext, heartbeat: ConsensusHeartbeat) -> ControlledAction {
        if heartbeat.leader_id == ctx.my_node_id() || heartbeat.term < ctx.term_state.leadership_term() {
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
            "Found leader {:?} for term {:?} while campaigning",
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
}
