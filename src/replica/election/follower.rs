use crate::commitlog::Position;
use crate::protocol::{AcknowledgementStatus, ConsensusHeartbeat, ControlMessage, RequestVote, Resend, Vote};
use crate::replica::election::context::{self, RoleContext, Transition};
use crate::replica::peers::NodeId;
use crate::replica::position;
use crate::replica::term_state::Term;
use crate::replica::timeout::RandomTimeout;
use crate::transport::{ControlledAction, Subscription};
use std::time::{Duration, Instant};

pub(crate) struct Follower {
    logger: slog::Logger,
    leader: Option<NodeId>,
    reply_timeout: RandomTimeout,
    // Term the vote was cast in, and who for. Casting a vote doesn't move our own term forward.
    voted_for: Option<(Term, NodeId)>,
    // Commit position last announced by the leader. May be ahead of what we have received.
    consensus_position: Position,
    // Logical position of the furthest gap we have already asked the leader to fill.
    missing_acked_position: Position,
    requires_acknowledgement_resend: bool,
}

impl Follower {
    pub(crate) fn new(
        logger: slog::Logger,
        leader: Option<NodeId>,
        reply_timeout: Duration,
        now: Instant,
        seed: u64,
    ) -> Self {
        Follower {
            logger,
            leader,
            reply_timeout: RandomTimeout::new(reply_timeout, now, seed),
            voted_for: None,
            consensus_position: 0,
            missing_acked_position: 0,
            requires_acknowledgement_resend: false,
        }
    }

    pub(crate) fn leader(&self) -> Option<NodeId> {
        self.leader
    }

    /// (Re-)enter following for the term currently held in `TermState`.
    pub(crate) fn follow(&mut self, ctx: &mut RoleContext, now: Instant) {
        self.reply_timeout.on_keep_alive(now);
        // A vote cast in a later term than the one being followed still binds that term.
        let term = ctx.term_state.leadership_term();
        self.voted_for = self.voted_for.filter(|&(voted_term, _)| voted_term > term);
        self.missing_acked_position = 0;
        self.check_leader_change(ctx);
    }

    fn check_leader_change(&mut self, ctx: &mut RoleContext) {
        if !ctx.term_state.has_leader() {
            self.leader = None;
            ctx.archiver.on_no_leader();
            return;
        }

        // Nothing past the commit position is known to be on the new leader's log.
        let commit_position = ctx.term_state.commit_position();
        let received_position = ctx.term_state.received_position();
        if received_position > commit_position {
            if let Err(e) = ctx.archiver.truncate(commit_position) {
                slog::error!(
                    self.logger,
                    "Failed to drop uncommitted entries [{}, {}): {}",
                    commit_position,
                    received_position,
                    e
                );
                // The next heartbeat from the leader retries.
                ctx.term_state.no_leader();
                self.leader = None;
                ctx.archiver.on_no_leader();
                return;
            }
            ctx.term_state.rewind_received_position(commit_position);
            slog::info!(
                self.logger,
                "Dropped uncommitted entries [{}, {}) on leader change",
                commit_position,
                received_position
            );
        }

        self.missing_acked_position = 0;
        ctx.archiver.on_leader(ctx.term_state.leader_session_id());
    }

    pub(crate) fn poll_commands(
        &mut self,
        ctx: &mut RoleContext,
        subscription: &mut dyn Subscription,
        fragment_limit: usize,
        now: Instant,
    ) -> usize {
        let logger = ctx.logger.clone();
        let read = context::poll_control_messages(subscription, fragment_limit, &logger, &mut |message| {
            let action = self.on_message(ctx, message, now);
            context::stop_on_transition(ctx, action)
        });

        // Any traffic on the control stream means the cluster is alive.
        if read > 0 {
            self.reply_timeout.on_keep_alive(now);
        }

        read
    }

    pub(crate) fn check_conditions(&mut self, ctx: &mut RoleContext, now: Instant) -> usize {
        if self.reply_timeout.has_timed_out(now) {
            slog::info!(
                self.logger,
                "No word from the cluster in term {:?}, becoming candidate",
                ctx.term_state.leadership_term()
            );
            ctx.term_state.no_leader();
            ctx.request_transition(Transition::ToCandidate);
            return 1;
        }

        0
    }

    pub(crate) fn read_data(&mut self, ctx: &mut RoleContext, fragment_limit: usize, now: Instant) -> usize {
        if ctx.archiver.check_leader_archiver() {
            return 0;
        }

        let delta = ctx.term_state.transport_position_delta();
        let received_position = ctx.term_state.received_position();
        let image_position = position::transport_to_logical(ctx.archiver.archived_transport_position(delta), delta);
        if image_position > received_position && image_position > self.missing_acked_position {
            let result = ctx.control_publication.save_message_acknowledgement(
                received_position,
                ctx.my_node_id(),
                AcknowledgementStatus::MissingLogEntries,
                ctx.term_state.leadership_term(),
            );
            if result.is_ok() {
                slog::debug!(
                    self.logger,
                    "Missing log entries [{}, {}), asked leader to resend",
                    received_position,
                    image_position
                );
                self.missing_acked_position = image_position;
            }
            return 1;
        }

        match ctx.archiver.poll(delta, fragment_limit) {
            Ok(bytes_read) => {
                if bytes_read > 0 || self.requires_acknowledgement_resend {
                    ctx.term_state.advance_received_position(bytes_read as u64);
                    ctx.term_state.ratchet_fwd_commit_position(self.consensus_position);
                    self.save_ok_acknowledgement(ctx, now);
                }
                bytes_read
            }
            Err(e) => {
                slog::warn!(self.logger, "Failed to archive leader's stream: {}", e);
                0
            }
        }
    }

    fn save_ok_acknowledgement(&mut self, ctx: &mut RoleContext, now: Instant) {
        let result = ctx.control_publication.save_message_acknowledgement(
            ctx.term_state.received_position(),
            ctx.my_node_id(),
            AcknowledgementStatus::Ok,
            ctx.term_state.leadership_term(),
        );

        match result {
            Ok(_) => {
                self.requires_acknowledgement_resend = false;
                self.reply_timeout.on_keep_alive(now);
            }
            Err(_) => self.requires_acknowledgement_resend = true,
        }
    }

    fn on_message(&mut self, ctx: &mut RoleContext, message: ControlMessage, now: Instant) -> ControlledAction {
        match message {
            ControlMessage::RequestVote(request) => self.on_request_vote(ctx, request, now),
            ControlMessage::ReplyVote(reply) => {
                ctx.forward_node_state(&reply);
                ControlledAction::Continue
            }
            ControlMessage::ConsensusHeartbeat(heartbeat) => self.on_consensus_heartbeat(ctx, heartbeat, now),
            ControlMessage::Resend(resend) => self.on_resend(ctx, resend, now),
            ControlMessage::MessageAcknowledgement(_) => ControlledAction::Continue,
        }
    }

    fn can_vote_for(&self, candidate_id: NodeId, term: Term) -> bool {
        match self.voted_for {
            None => true,
            Some((voted_term, voted_for)) => voted_for == candidate_id || term > voted_term,
        }
    }

    fn on_request_vote(&mut self, ctx: &mut RoleContext, request: RequestVote, now: Instant) -> ControlledAction {
        let my_node_id = ctx.my_node_id();
        if !ctx.cluster.is_peer(request.candidate_id) {
            return ControlledAction::Continue;
        }

        // > If votedFor is null or candidateId, and candidate’s log is at least as up-to-date as
        // > receiver’s log, grant vote
        let safe_to_vote = request.candidate_position >= ctx.term_state.received_position()
            && request.term > ctx.term_state.leadership_term();
        let vote = if safe_to_vote && self.can_vote_for(request.candidate_id, request.term) {
            Vote::For
        } else {
            Vote::Against
        };

        let result = ctx.control_publication.save_reply_vote(
            my_node_id,
            request.candidate_id,
            request.term,
            vote,
            ctx.node_state.clone(),
            ctx.data_session_id(),
        );
        if let Err(e) = result {
            slog::debug!(self.logger, "Vote reply to {:?} not sent, will retry: {}", request.candidate_id, e);
            return ControlledAction::Abort;
        }

        if vote == Vote::For {
            slog::info!(
                self.logger,
                "Voted for {:?} in term {:?}",
                request.candidate_id,
                request.term
            );
            self.voted_for = Some((request.term, request.candidate_id));
            self.reply_timeout.on_keep_alive(now);
        } else {
            slog::debug!(
                self.logger,
                "Voted against {:?} in term {:?} at position {}",
                request.candidate_id,
                request.term,
                request.candidate_position
            );
        }

        ControlledAction::Continue
    }

    fn on_consensus_heartbeat(
        &mut self,
        ctx: &mut RoleContext,
        heartbeat: ConsensusHeartbeat,
        now: Instant,
    ) -> ControlledAction {
        if heartbeat.leader_id == ctx.my_node_id() {
            return ControlledAction::Continue;
        }
        let current_term = ctx.term_state.leadership_term();
        if heartbeat.term < current_term {
            return ControlledAction::Continue;
        }

        let delta = match context::heartbeat_delta(&heartbeat, ctx.term_state.received_position()) {
            Some(delta) => delta,
            None => {
                slog::debug!(self.logger, "Dropping heartbeat with unusable positions {:?}", heartbeat);
                return ControlledAction::Continue;
            }
        };

        let session_changed = heartbeat.leader_session_id != ctx.term_state.leader_session_id();
        ctx.term_state
            .set_leadership_term(heartbeat.term)
            .set_leader_session_id(heartbeat.leader_session_id)
            .set_transport_position_delta(delta)
            .set_transport_start_position(heartbeat.transport_start_position);
        self.leader = Some(heartbeat.leader_id);

        if heartbeat.term > current_term {
            slog::info!(
                self.logger,
                "Following {:?} in term {:?}",
                heartbeat.leader_id,
                heartbeat.term
            );
            self.consensus_position = heartbeat.position;
            self.follow(ctx, now);
        } else {
            self.consensus_position = self.consensus_position.max(heartbeat.position);
            if session_changed {
                slog::info!(
                    self.logger,
                    "Found leader {:?} for term {:?}",
                    heartbeat.leader_id,
                    heartbeat.term
                );
                self.check_leader_change(ctx);
            }
            self.reply_timeout.on_keep_alive(now);
        }

        ctx.term_state.ratchet_fwd_commit_position(self.consensus_position);
        ctx.archiver.note_transport_position(heartbeat.transport_position);

        ControlledAction::Continue
    }

    fn on_resend(&mut self, ctx: &mut RoleContext, resend: Resend, now: Instant) -> ControlledAction {
        let term_state = &ctx.term_state;
        let matches_our_log = resend.start_position == term_state.received_position()
            && resend.leader_session_id == term_state.leader_session_id()
            && resend.term == term_state.leadership_term();
        if !matches_our_log || ctx.archiver.check_leader_archiver() {
            slog::trace!(
                self.logger,
                "Ignoring resend at {} for term {:?}",
                resend.start_position,
                resend.term
            );
            return ControlledAction::Continue;
        }

        match ctx.archiver.patch(resend.start_position, &resend.body) {
            Ok(()) => {
                ctx.term_state.advance_received_position(resend.body.len() as u64);
                ctx.term_state.ratchet_fwd_commit_position(self.consensus_position);
                // A gap still beyond the new received position is worth asking about again.
                self.missing_acked_position = ctx.term_state.received_position();
                self.save_ok_acknowledgement(ctx, now);
            }
            Err(e) => slog::warn!(self.logger, "Failed to apply resend at {}: {}", resend.start_position, e),
        }

        ControlledAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageAcknowledgement, ReplyVote};
    use crate::replica::election::test_utils::{heartbeat, heartbeat_in_stream, request_vote, TestNode, ME};
    use crate::transport::{self, encode_frame, Publication, SessionId};
    use bytes::Bytes;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn follower(node: &mut TestNode) -> Follower {
        let mut follower = Follower::new(node.logger(), None, TIMEOUT, node.start, 11);
        follower.follow(&mut node.ctx, node.start);
        follower
    }

    fn poll(follower: &mut Follower, node: &mut TestNode, now: Instant) -> usize {
        let TestNode {
            ctx, control_subscription, ..
        } = node;
        follower.poll_commands(ctx, control_subscription, 10, now)
    }

    fn vote_replies(node: &mut TestNode) -> Vec<ReplyVote> {
        node.published()
            .into_iter()
            .filter_map(|m| match m {
                ControlMessage::ReplyVote(reply) => Some(reply),
                _ => None,
            })
            .collect()
    }

    fn acknowledgements(node: &mut TestNode) -> Vec<MessageAcknowledgement> {
        node.published()
            .into_iter()
            .filter_map(|m| match m {
                ControlMessage::MessageAcknowledgement(ack) => Some(ack),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn votes_only_for_newer_terms_from_up_to_date_candidates() {
        let mut node = TestNode::new();
        let now = node.start;
        node.ctx.term_state.set_leadership_term(Term::new(1));
        node.ctx.term_state.all_positions(40);
        let mut follower = follower(&mut node);

        node.inject(request_vote(NodeId(1), 1, 40));
        assert_eq!(poll(&mut follower, &mut node, now), 1);
        let replies = vote_replies(&mut node);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].vote, Vote::Against);
        assert_eq!(replies[0].candidate_id, NodeId(1));
        assert_eq!(replies[0].sender_id, ME);

        // Not as far along as we are.
        node.inject(request_vote(NodeId(1), 2, 39));
        poll(&mut follower, &mut node, now);
        assert_eq!(vote_replies(&mut node)[0].vote, Vote::Against);

        node.inject(request_vote(NodeId(1), 2, 40));
        poll(&mut follower, &mut node, now);
        let replies = vote_replies(&mut node);
        assert_eq!(replies[0].vote, Vote::For);
        assert_eq!(replies[0].term, Term::new(2));
        assert_eq!(replies[0].node_state, node.ctx.node_state);
        assert_eq!(replies[0].sender_session_id, node.ctx.data_session_id());
    }

    #[test]
    fn never_votes_twice_in_one_term() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);

        node.inject(request_vote(NodeId(1), 1, 0));
        node.inject(request_vote(NodeId(3), 1, 0));
        // Same candidate asking again gets the same answer.
        node.inject(request_vote(NodeId(1), 1, 0));
        poll(&mut follower, &mut node, now);

        let votes: Vec<(NodeId, Vote)> = vote_replies(&mut node)
            .into_iter()
            .map(|r| (r.candidate_id, r.vote))
            .collect();
        assert_eq!(
            votes,
            vec![(NodeId(1), Vote::For), (NodeId(3), Vote::Against), (NodeId(1), Vote::For)]
        );

        // A later term is a new election.
        node.inject(request_vote(NodeId(3), 2, 0));
        poll(&mut follower, &mut node, now);
        assert_eq!(vote_replies(&mut node)[0].vote, Vote::For);
    }

    #[test]
    fn stale_heartbeat_does_not_reopen_a_later_vote() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);

        node.inject(request_vote(NodeId(1), 3, 0));
        // Term 2's leader, heard only after the term 3 vote.
        node.inject(heartbeat(NodeId(3), 2, 0, 0, SessionId(77)));
        node.inject(request_vote(NodeId(3), 3, 0));
        assert_eq!(poll(&mut follower, &mut node, now), 3);

        assert_eq!(node.ctx.term_state.leadership_term(), Term::new(2));
        assert_eq!(follower.leader(), Some(NodeId(3)));
        let votes: Vec<(NodeId, Term, Vote)> = vote_replies(&mut node)
            .into_iter()
            .map(|r| (r.candidate_id, r.term, r.vote))
            .collect();
        assert_eq!(
            votes,
            vec![
                (NodeId(1), Term::new(3), Vote::For),
                (NodeId(3), Term::new(3), Vote::Against)
            ]
        );
        assert_eq!(follower.voted_for, Some((Term::new(3), NodeId(1))));

        // Following the term the vote was cast in releases it.
        node.inject(heartbeat(NodeId(1), 3, 0, 0, SessionId(78)));
        poll(&mut follower, &mut node, now);
        assert_eq!(follower.voted_for, None);
    }

    #[test]
    fn ignores_vote_requests_from_self_and_strangers() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);

        node.inject(request_vote(ME, 5, 0));
        node.inject(request_vote(NodeId(9), 5, 0));
        assert_eq!(poll(&mut follower, &mut node, now), 2);
        assert!(vote_replies(&mut node).is_empty());
    }

    #[test]
    fn back_pressured_vote_is_retried_not_recorded() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);

        node.control_back_pressure.turn_on();
        node.inject(request_vote(NodeId(1), 1, 0));
        assert_eq!(poll(&mut follower, &mut node, now), 0);
        assert!(follower.voted_for.is_none());

        node.control_back_pressure.turn_off();
        assert_eq!(poll(&mut follower, &mut node, now), 1);
        assert_eq!(vote_replies(&mut node)[0].vote, Vote::For);
        assert_eq!(follower.voted_for, Some((Term::new(1), NodeId(1))));
    }

    #[test]
    fn times_out_into_candidate_unless_kept_alive() {
        let mut node = TestNode::new();
        let mut follower = follower(&mut node);

        let t1 = node.start + TIMEOUT * 3 / 2;
        node.inject(heartbeat(NodeId(1), 1, 0, 0, node.leader_session()));
        poll(&mut follower, &mut node, t1);
        assert!(node.ctx.term_state.has_leader());

        assert_eq!(follower.check_conditions(&mut node.ctx, t1 + TIMEOUT / 2), 0);
        assert!(!node.ctx.has_pending_transition());

        assert_eq!(follower.check_conditions(&mut node.ctx, t1 + TIMEOUT * 2), 1);
        assert_eq!(node.ctx.take_transition(), Some(Transition::ToCandidate));
        assert!(!node.ctx.term_state.has_leader());
        assert_eq!(node.ctx.term_state.previous_leader_session_id(), node.leader_session());
    }

    #[test]
    fn heartbeat_adopts_newer_term_and_ignores_stale_ones() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);
        let session = node.leader_session();

        // Positions that no stream can have are dropped whatever the term.
        node.inject(heartbeat_in_stream(NodeId(1), 4, 0, 0, session, 0, u64::MAX));
        node.inject(heartbeat(NodeId(1), 4, 0, -16, session));
        poll(&mut follower, &mut node, now);
        assert_eq!(node.ctx.term_state.leadership_term(), Term::new(0));
        assert!(!node.ctx.term_state.has_leader());

        node.inject(heartbeat(NodeId(1), 3, 0, 0, session));
        poll(&mut follower, &mut node, now);
        assert_eq!(node.ctx.term_state.leadership_term(), Term::new(3));
        assert_eq!(node.ctx.term_state.leader_session_id(), session);
        assert_eq!(follower.leader(), Some(NodeId(1)));
        assert!(!node.ctx.archiver.check_leader_archiver());

        node.inject(heartbeat(NodeId(3), 2, 0, 0, SessionId(77)));
        node.inject(heartbeat(ME, 9, 0, 0, SessionId(78)));
        poll(&mut follower, &mut node, now);
        assert_eq!(node.ctx.term_state.leadership_term(), Term::new(3));
        assert_eq!(node.ctx.term_state.leader_session_id(), session);
    }

    #[test]
    fn replicates_and_acknowledges_leader_stream() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);
        let session = node.leader_session();
        node.inject(heartbeat(NodeId(1), 1, 0, 0, session));
        poll(&mut follower, &mut node, now);
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 0);

        node.leader_data.offer(b"first").unwrap();
        node.leader_data.offer(b"second").unwrap();
        // The heartbeat can overtake the frames it describes.
        node.inject(heartbeat(NodeId(1), 1, 0, 32, session));
        poll(&mut follower, &mut node, now);
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 32);
        assert_eq!(node.ctx.term_state.received_position(), 32);
        assert_eq!(node.ctx.term_state.commit_position(), 0);

        let acks = acknowledgements(&mut node);
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].position, 32);
        assert_eq!(acks[0].status, AcknowledgementStatus::Ok);
        assert_eq!(acks[0].term, Term::new(1));

        // Nothing new: nothing changes, nothing sent.
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 0);
        assert_eq!(node.ctx.term_state.received_position(), 32);
        assert!(acknowledgements(&mut node).is_empty());

        // Leader commits part of it.
        node.inject(heartbeat(NodeId(1), 1, 16, 32, session));
        poll(&mut follower, &mut node, now);
        assert_eq!(node.ctx.term_state.commit_position(), 16);
    }

    #[test]
    fn back_pressured_acknowledgement_is_resent() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);
        node.inject(heartbeat(NodeId(1), 1, 0, 0, node.leader_session()));
        poll(&mut follower, &mut node, now);

        node.control_back_pressure.turn_on();
        node.leader_data.offer(b"data").unwrap();
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 16);
        node.control_back_pressure.turn_off();
        assert!(acknowledgements(&mut node).is_empty());

        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 0);
        let acks = acknowledgements(&mut node);
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].position, 16);
        assert_eq!(node.ctx.term_state.received_position(), 16);
    }

    #[test]
    fn gap_is_reported_and_filled_by_matching_resend_only() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);
        let session = node.leader_session();
        node.inject(heartbeat(NodeId(1), 1, 0, 0, session));
        poll(&mut follower, &mut node, now);

        node.leader_data.offer(b"a").unwrap();
        node.data_frame_loss.turn_on();
        node.leader_data.offer(b"b").unwrap();
        node.data_frame_loss.turn_off();
        node.leader_data.offer(b"c").unwrap();

        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 16);
        acknowledgements(&mut node);

        // Next read notices the gap.
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 1);
        let acks = acknowledgements(&mut node);
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].status, AcknowledgementStatus::MissingLogEntries);
        assert_eq!(acks[0].position, 16);
        assert_eq!(acks[0].term, Term::new(1));
        // Only asked once.
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 0);
        assert!(acknowledgements(&mut node).is_empty());

        let mut body = encode_frame(session, b"b").to_vec();
        body.extend_from_slice(&encode_frame(session, b"c"));
        let body = Bytes::from(body);

        // Wrong position, session or term: ignored.
        for resend in vec![
            Resend {
                leader_session_id: session,
                term: Term::new(1),
                start_position: 0,
                body: body.clone(),
            },
            Resend {
                leader_session_id: SessionId(1234),
                term: Term::new(1),
                start_position: 16,
                body: body.clone(),
            },
            Resend {
                leader_session_id: session,
                term: Term::new(2),
                start_position: 16,
                body: body.clone(),
            },
        ] {
            node.inject(ControlMessage::Resend(resend));
            poll(&mut follower, &mut node, now);
            assert_eq!(node.ctx.term_state.received_position(), 16);
            assert!(acknowledgements(&mut node).is_empty());
        }

        node.inject(ControlMessage::Resend(Resend {
            leader_session_id: session,
            term: Term::new(1),
            start_position: 16,
            body,
        }));
        poll(&mut follower, &mut node, now);
        assert_eq!(node.ctx.term_state.received_position(), 48);
        let acks = acknowledgements(&mut node);
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].status, AcknowledgementStatus::Ok);
        assert_eq!(acks[0].position, 48);

        // Stream carries on without duplicates.
        node.leader_data.offer(b"d").unwrap();
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 16);
        assert_eq!(node.ctx.term_state.received_position(), 64);
    }

    #[test]
    fn heartbeat_reveals_tail_loss_before_anything_commits() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);
        let session = node.leader_session();
        node.inject(heartbeat(NodeId(1), 1, 0, 0, session));
        poll(&mut follower, &mut node, now);

        node.data_frame_loss.turn_on();
        node.leader_data.offer(b"lost").unwrap();
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 0);

        // Commit can't move without us, but the stream position shows what we lack.
        node.inject(heartbeat(NodeId(1), 1, 0, 16, session));
        poll(&mut follower, &mut node, now);
        assert_eq!(node.ctx.term_state.commit_position(), 0);

        // The stream is drained first in case the frames are merely late.
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 0);
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 1);
        let acks = acknowledgements(&mut node);
        assert_eq!(acks[0].status, AcknowledgementStatus::MissingLogEntries);
        assert_eq!(acks[0].position, 0);
    }

    #[test]
    fn new_leader_discards_uncommitted_entries() {
        let mut node = TestNode::new();
        let now = node.start;
        let mut follower = follower(&mut node);
        let old_session = node.leader_session();
        node.inject(heartbeat(NodeId(1), 1, 0, 0, old_session));
        poll(&mut follower, &mut node, now);

        node.leader_data.offer(b"committed").unwrap(); // [0, 24)
        node.leader_data.offer(b"dropped").unwrap(); // [24, 40)
        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 40);
        node.inject(heartbeat(NodeId(1), 1, 24, 40, old_session));
        poll(&mut follower, &mut node, now);
        assert_eq!(node.ctx.term_state.commit_position(), 24);

        // Node 3 won term 2 with a log ending at 24, and writes from a fresh stream.
        let mut new_leader = node.new_leader_data();
        let new_session = new_leader.session_id();
        new_leader.offer(b"replacement").unwrap(); // transport [0, 24), log [24, 48)
        node.inject(heartbeat_in_stream(NodeId(3), 2, 24, 24, new_session, 0, 24));
        poll(&mut follower, &mut node, now);
        assert_eq!(node.ctx.term_state.received_position(), 24);
        assert_eq!(node.ctx.term_state.commit_position(), 24);
        assert_eq!(node.ctx.archiver.end_position(), 24);
        acknowledgements(&mut node);

        assert_eq!(follower.read_data(&mut node.ctx, 10, now), 24);
        assert_eq!(node.ctx.term_state.received_position(), 48);
        let acks = acknowledgements(&mut node);
        assert_eq!(acks.len(), 1);
        assert_eq!((acks[0].position, acks[0].term), (48, Term::new(2)));

        let block = node.ctx.archiver.read(0, 48).unwrap();
        let payloads: Vec<&[u8]> = transport::payloads(&block).collect();
        assert_eq!(payloads, vec![&b"committed"[..], &b"replacement"[..]]);
    }
}
