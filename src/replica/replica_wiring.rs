use crate::api::{NodeStateHandler, ReplicationHandler};
use crate::commitlog::ByteLog;
use crate::protocol::RaftPublication;
use crate::replica::acknowledgement::AcknowledgementStrategy;
use crate::replica::archiver::RaftArchiver;
use crate::replica::election::{ElectionConfig, ElectionState, ElectionStateChangeListener, RoleContext};
use crate::replica::peers::ClusterMembers;
use crate::replica::replicator::Replicator;
use crate::replica::term_state::TermState;
use crate::transport::{Publication, Subscription};
use bytes::Bytes;
use std::time::Instant;

pub(crate) struct ReplicatorParts {
    pub logger: slog::Logger,
    pub cluster: ClusterMembers,
    pub election_config: ElectionConfig,
    pub acknowledgement_strategy: Box<dyn AcknowledgementStrategy>,
    pub control_publication: Box<dyn Publication>,
    pub control_subscription: Box<dyn Subscription>,
    pub data_publication: Box<dyn Publication>,
    pub data_subscription: Box<dyn Subscription>,
    pub log: Box<dyn ByteLog>,
    pub replication_handler: Box<dyn ReplicationHandler>,
    pub node_state: Bytes,
    pub node_state_handler: Box<dyn NodeStateHandler>,
}

pub(crate) fn create_replicator(parts: ReplicatorParts, now: Instant) -> (Replicator, ElectionStateChangeListener) {
    let logger = parts.logger;

    let mut term_state = TermState::new();
    term_state.all_positions(parts.log.end_position());

    let archiver = RaftArchiver::new(logger.clone(), parts.log, parts.data_subscription);

    let mut ctx = RoleContext::new(
        logger.clone(),
        parts.cluster,
        term_state,
        archiver,
        RaftPublication::new(parts.control_publication),
        parts.data_publication,
        parts.acknowledgement_strategy,
        parts.node_state,
        parts.node_state_handler,
    );

    let (election_state, election_state_change_listener) =
        ElectionState::new_follower(logger.clone(), parts.election_config, &mut ctx, now);

    let replicator = Replicator::new(
        logger,
        ctx,
        election_state,
        parts.control_subscription,
        parts.replication_handler,
    );

    (replicator, election_state_change_listener)
}
