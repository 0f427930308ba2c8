use crate::api::ReplicationHandler;
use crate::commitlog::Position;
use crate::replica::election::{ElectionState, ElectionStateSnapshot, RoleContext, WriteError};
use crate::replica::peers::NodeId;
use crate::replica::term_state::TermState;
use crate::transport::Subscription;
use std::time::Instant;

/// Replicator is one node of the replication cluster. It is driven entirely by the caller:
/// every call to `poll()` does whatever work is available right now and returns without blocking.
pub struct Replicator {
    logger: slog::Logger,
    ctx: RoleContext,
    election_state: ElectionState,
    control_subscription: Box<dyn Subscription>,
    replication_handler: Box<dyn ReplicationHandler>,
    closed: bool,
}

impl Replicator {
    pub(crate) fn new(
        logger: slog::Logger,
        ctx: RoleContext,
        election_state: ElectionState,
        control_subscription: Box<dyn Subscription>,
        replication_handler: Box<dyn ReplicationHandler>,
    ) -> Self {
        Replicator {
            logger,
            ctx,
            election_state,
            control_subscription,
            replication_handler,
            closed: false,
        }
    }

    /// Runs one tick: drain control messages, archive the leader's data, check timeouts, then hand
    /// newly committed bytes to the replication handler. Returns the amount of work done; zero
    /// means nothing changed.
    pub fn poll(&mut self, fragment_limit: usize, now: Instant) -> usize {
        if self.closed {
            return 0;
        }

        let mut work_count = self.election_state.poll_commands(
            &mut self.ctx,
            self.control_subscription.as_mut(),
            fragment_limit,
            now,
        );
        work_count += self.apply_requested_transition(now);

        work_count += self.election_state.read_data(&mut self.ctx, fragment_limit, now);
        work_count += self.apply_requested_transition(now);

        work_count += self.election_state.check_conditions(&mut self.ctx, now);
        work_count += self.apply_requested_transition(now);

        work_count += self.deliver_committed();
        self.election_state.notify_if_changed();

        work_count
    }

    fn apply_requested_transition(&mut self, now: Instant) -> usize {
        if self.election_state.apply_requested_transition(&mut self.ctx, now) {
            1
        } else {
            0
        }
    }

    fn deliver_committed(&mut self) -> usize {
        let term_state = &self.ctx.term_state;
        let last_applied_position = term_state.last_applied_position();
        let commit_position = term_state.commit_position();
        if commit_position <= last_applied_position {
            return 0;
        }

        let length = (commit_position - last_applied_position) as usize;
        match self.ctx.archiver.read(last_applied_position, length) {
            Ok(block) => {
                slog::trace!(
                    self.logger,
                    "Delivering committed [{}, {})",
                    last_applied_position,
                    commit_position
                );
                self.replication_handler.on_committed(last_applied_position, &block);
                self.ctx.term_state.ratchet_fwd_last_applied_position(commit_position);
                1
            }
            Err(e) => {
                slog::warn!(
                    self.logger,
                    "Unable to read committed [{}, {}): {}",
                    last_applied_position,
                    commit_position,
                    e
                );
                0
            }
        }
    }

    /// Appends `payload` to the replicated log. Only the leader accepts writes. Returns the log
    /// position the payload's frame starts at.
    pub fn offer(&mut self, payload: &[u8], now: Instant) -> Result<Position, WriteError> {
        if self.closed {
            return Err(WriteError::NotLeader);
        }

        self.election_state.write_data(&mut self.ctx, payload, now)
    }

    /// Closes every stream this node owns. The node does no more work afterwards.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        slog::info!(self.logger, "Closing as {:?}", self.election_state);
        self.election_state.close_streams(&mut self.ctx);
        self.ctx.data_publication.close();
        self.ctx.control_publication.close();
        self.ctx.archiver.close();
        self.control_subscription.close();
        self.closed = true;
    }

    pub fn is_leader(&self) -> bool {
        !self.closed && self.election_state.is_leader()
    }

    pub fn term_state(&self) -> &TermState {
        &self.ctx.term_state
    }

    pub fn role_name(&self) -> &'static str {
        self.election_state.role_name()
    }

    pub fn node_id(&self) -> NodeId {
        self.ctx.my_node_id()
    }

    /// The leader this node currently follows, if known.
    pub fn leader_id(&self) -> Option<NodeId> {
        match self.election_state.current_state() {
            ElectionStateSnapshot::Leader => Some(self.node_id()),
            ElectionStateSnapshot::Follower(leader_id) => Some(leader_id),
            ElectionStateSnapshot::Candidate | ElectionStateSnapshot::FollowerNoLeader => None,
        }
    }
}
