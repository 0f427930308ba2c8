use crate::api::event_bus::EventListener;
use crate::api::options::ReplicatorOptionsValidated;
use crate::api::{NodeStateHandler, ReplicationHandler, ReplicatorOptions};
use crate::commitlog::{ByteLog, Position};
use crate::replica::{
    self, AcknowledgementStrategy, ClusterMembers, ElectionConfig, NodeId, Replicator, ReplicatorParts,
};
use crate::transport::{Publication, StreamId, Subscription};
use bytes::Bytes;
use std::collections::HashSet;
use std::convert::TryFrom;
use std::time::Instant;

/// Stream carrying votes, heartbeats, resends and acknowledgements.
pub const CONTROL_STREAM_ID: StreamId = StreamId(1);
/// Stream carrying the leader's log frames.
pub const DATA_STREAM_ID: StreamId = StreamId(2);

pub struct ReplicatorConfig {
    pub node_id: NodeId,
    pub cluster_members: Vec<NodeId>,
    pub info_logger: slog::Logger,
    pub options: ReplicatorOptions,
    pub acknowledgement_strategy: Box<dyn AcknowledgementStrategy>,
    pub control_publication: Box<dyn Publication>,
    pub control_subscription: Box<dyn Subscription>,
    pub data_publication: Box<dyn Publication>,
    pub data_subscription: Box<dyn Subscription>,
    // Must be empty.
    pub log: Box<dyn ByteLog>,
    pub replication_handler: Box<dyn ReplicationHandler>,
    /// Opaque bytes attached to every vote reply this node sends.
    pub node_state: Bytes,
    pub node_state_handler: Box<dyn NodeStateHandler>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicatorCreationError {
    // We will need to relax this later when adding membership changes.
    #[error("my node ID not in cluster config")]
    MeNotInCluster,
    #[error("{0:?} is listed more than once in cluster config")]
    DuplicateClusterMember(NodeId),
    #[error("Illegal options for configuring replicator: {0}")]
    IllegalOptions(String),
    #[error("log must start empty, but ends at {end_position}")]
    NonEmptyLog { end_position: Position },
}

/// Creates a replicator that starts out as a follower with no leader. The config is consumed; a
/// replicator owns its streams and log exclusively.
pub fn try_create_replicator(
    config: ReplicatorConfig,
    now: Instant,
) -> Result<(Replicator, EventListener), ReplicatorCreationError> {
    let options = ReplicatorOptionsValidated::try_from(config.options)
        .map_err(|e| ReplicatorCreationError::IllegalOptions(e.to_string()))?;

    let cluster = cluster_members(config.node_id, config.cluster_members)?;

    let end_position = config.log.end_position();
    if end_position != 0 {
        return Err(ReplicatorCreationError::NonEmptyLog { end_position });
    }

    let logger = config
        .info_logger
        .new(slog::o!("NodeId" => format!("{:?}", config.node_id)));
    slog::info!(logger, "Joining cluster of {} members", cluster.size());

    let (replicator, election_state_change_listener) = replica::create_replicator(
        ReplicatorParts {
            logger,
            cluster,
            election_config: ElectionConfig {
                heartbeat_interval: options.heartbeat_interval,
                reply_timeout: options.reply_timeout,
                max_resend_length: options.max_resend_length,
                random_seed: options.random_seed,
            },
            acknowledgement_strategy: config.acknowledgement_strategy,
            control_publication: config.control_publication,
            control_subscription: config.control_subscription,
            data_publication: config.data_publication,
            data_subscription: config.data_subscription,
            log: config.log,
            replication_handler: config.replication_handler,
            node_state: config.node_state,
            node_state_handler: config.node_state_handler,
        },
        now,
    );

    Ok((replicator, EventListener::new(election_state_change_listener)))
}

fn cluster_members(my_node_id: NodeId, members: Vec<NodeId>) -> Result<ClusterMembers, ReplicatorCreationError> {
    let mut seen = HashSet::with_capacity(members.len());
    for member in members.iter() {
        if !seen.insert(*member) {
            return Err(ReplicatorCreationError::DuplicateClusterMember(*member));
        }
    }
    if !seen.contains(&my_node_id) {
        return Err(ReplicatorCreationError::MeNotInCluster);
    }

    Ok(ClusterMembers::new(my_node_id, members))
}
