use crate::commitlog::Position;
use crate::replica::election::candidate::Candidate;
use crate::replica::election::context::{RoleContext, Transition};
use crate::replica::election::follower::Follower;
use crate::replica::election::leader::{Leader, WriteError};
use crate::replica::election::state_change_listener::{
    self, ElectionStateChangeListener, ElectionStateChangeNotifier, ElectionStateSnapshot,
};
use crate::replica::peers::NodeId;
use crate::transport::Subscription;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub(crate) struct ElectionConfig {
    pub heartbeat_interval: Duration,
    pub reply_timeout: Duration,
    pub max_resend_length: usize,
    pub random_seed: Option<u64>,
}

/// ElectionState holds the active role and swaps it when the role asks for a transition. Its
/// methods only dispatch: "what" each role does lives in the role itself.
pub(crate) struct ElectionState {
    logger: slog::Logger,
    state: State,
    config: ElectionConfig,
    // Every timeout gets its own seed from here so a seeded node is reproducible.
    seeds: StdRng,
    state_change_notifier: ElectionStateChangeNotifier,
    last_notified_state: ElectionStateSnapshot,
}

enum State {
    Leader(Leader),
    Candidate(Candidate),
    Follower(Follower),
}

impl ElectionState {
    /// `new_follower()` creates a new ElectionState instance that starts out as a follower without
    /// a leader.
    pub(crate) fn new_follower(
        logger: slog::Logger,
        config: ElectionConfig,
        ctx: &mut RoleContext,
        now: Instant,
    ) -> (Self, ElectionStateChangeListener) {
        let mut seeds = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut follower = Follower::new(logger.clone(), None, config.reply_timeout, now, seeds.gen());
        follower.follow(ctx, now);

        let initial_state = State::Follower(follower);
        let snapshot = Self::current_state_impl(&initial_state);
        let (notifier, listener) = state_change_listener::new(snapshot.clone());

        let election_state = ElectionState {
            logger,
            state: initial_state,
            config,
            seeds,
            state_change_notifier: notifier,
            last_notified_state: snapshot,
        };

        (election_state, listener)
    }

    /// Swaps roles until no transition is pending. Returns true if the role changed.
    pub(crate) fn apply_requested_transition(&mut self, ctx: &mut RoleContext, now: Instant) -> bool {
        let mut transitioned = false;
        while let Some(transition) = ctx.take_transition() {
            transitioned = true;
            match transition {
                Transition::ToFollower { leader } => self.transition_to_follower(ctx, leader, now),
                Transition::ToCandidate => self.transition_to_candidate(ctx, now),
                Transition::ToLeader => self.transition_to_leader(ctx, now),
            }
        }

        transitioned
    }

    fn transition_to_follower(&mut self, ctx: &mut RoleContext, leader: Option<NodeId>, now: Instant) {
        slog::info!(
            self.logger,
            "{:?} -> Follower(Leader={:?}) in term {:?}",
            self,
            leader,
            ctx.term_state.leadership_term()
        );
        let mut follower = Follower::new(
            self.logger.clone(),
            leader,
            self.config.reply_timeout,
            now,
            self.seeds.gen(),
        );
        follower.follow(ctx, now);
        self.state = State::Follower(follower);
    }

    fn transition_to_candidate(&mut self, ctx: &mut RoleContext, now: Instant) {
        slog::info!(self.logger, "{:?} -> Candidate", self);
        let mut candidate = Candidate::new(self.logger.clone(), self.config.reply_timeout, now, self.seeds.gen());
        candidate.start_new_election(ctx, now);
        self.state = State::Candidate(candidate);
    }

    fn transition_to_leader(&mut self, ctx: &mut RoleContext, now: Instant) {
        slog::info!(
            self.logger,
            "{:?} -> Leader in term {:?}",
            self,
            ctx.term_state.leadership_term()
        );
        let mut leader = Leader::new(
            self.logger.clone(),
            self.config.heartbeat_interval,
            self.config.max_resend_length,
            now,
        );
        leader.gets_elected(ctx, now);
        self.state = State::Leader(leader);
    }

    pub(crate) fn poll_commands(
        &mut self,
        ctx: &mut RoleContext,
        subscription: &mut dyn Subscription,
        fragment_limit: usize,
        now: Instant,
    ) -> usize {
        match &mut self.state {
            State::Leader(leader) => leader.poll_commands(ctx, subscription, fragment_limit, now),
            State::Candidate(candidate) => candidate.poll_commands(ctx, subscription, fragment_limit),
            State::Follower(follower) => follower.poll_commands(ctx, subscription, fragment_limit, now),
        }
    }

    pub(crate) fn read_data(&mut self, ctx: &mut RoleContext, fragment_limit: usize, now: Instant) -> usize {
        match &mut self.state {
            State::Follower(follower) => follower.read_data(ctx, fragment_limit, now),
            State::Leader(_) | State::Candidate(_) => 0,
        }
    }

    pub(crate) fn check_conditions(&mut self, ctx: &mut RoleContext, now: Instant) -> usize {
        match &mut self.state {
            State::Leader(leader) => leader.check_conditions(ctx, now),
            State::Candidate(candidate) => candidate.check_conditions(ctx, now),
            State::Follower(follower) => follower.check_conditions(ctx, now),
        }
    }

    pub(crate) fn write_data(
        &mut self,
        ctx: &mut RoleContext,
        payload: &[u8],
        now: Instant,
    ) -> Result<Position, WriteError> {
        match &mut self.state {
            State::Leader(leader) => leader.write_data(ctx, payload, now),
            State::Candidate(_) | State::Follower(_) => Err(WriteError::NotLeader),
        }
    }

    pub(crate) fn close_streams(&mut self, ctx: &mut RoleContext) {
        if let State::Leader(leader) = &mut self.state {
            leader.close_streams(ctx);
        }
    }

    pub(crate) fn is_leader(&self) -> bool {
        matches!(self.state, State::Leader(_))
    }

    pub(crate) fn role_name(&self) -> &'static str {
        match self.state {
            State::Leader(_) => "Leader",
            State::Candidate(_) => "Candidate",
            State::Follower(_) => "Follower",
        }
    }

    pub(crate) fn current_state(&self) -> ElectionStateSnapshot {
        Self::current_state_impl(&self.state)
    }

    fn current_state_impl(state: &State) -> ElectionStateSnapshot {
        match state {
            State::Leader(_) => ElectionStateSnapshot::Leader,
            State::Candidate(_) => ElectionStateSnapshot::Candidate,
            State::Follower(follower) => match follower.leader() {
                Some(leader_id) => ElectionStateSnapshot::Follower(leader_id),
                None => ElectionStateSnapshot::FollowerNoLeader,
            },
        }
    }

    /// Publishes the snapshot to listeners if it differs from the last one published.
    pub(crate) fn notify_if_changed(&mut self) {
        let current_state = self.current_state();
        if current_state != self.last_notified_state {
            self.state_change_notifier.notify_new_state(current_state.clone());
            self.last_notified_state = current_state;
        }
    }
}

impl fmt::Debug for ElectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Leader(_) => write!(f, "Leader"),
            State::Candidate(_) => write!(f, "Candidate"),
            State::Follower(follower) => match follower.leader() {
                Some(leader_id) => write!(f, "Follower(Leader={:?})", leader_id),
                None => write!(f, "Follower(Leader=None)"),
            },
        }
    }
}
