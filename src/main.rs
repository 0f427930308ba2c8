use bytes::Bytes;
use replicator::{
    payloads, try_create_replicator, ByteLog, EventListener, FileByteLog, InMemoryBus, InMemoryByteLog,
    NoOpNodeStateHandler, NodeId, Position, QuorumAcknowledgementStrategy, ReplicationHandler, Replicator,
    ReplicatorConfig, ReplicatorOptions, StorageConfig, CONTROL_STREAM_ID, DATA_STREAM_ID,
};
use slog::Drain;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tokio::time::Duration;

const NUM_MESSAGES: usize = 10;

/// Runs a three node cluster over an in-memory bus, writes a handful of messages through whichever
/// node wins the election, and logs them as each node sees them committed. Pass a directory to
/// keep each node's log on disk.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let root_logger = create_root_logger_for_stdout();
    let log_directory = std::env::args().nth(1).map(PathBuf::from);

    let bus = InMemoryBus::new();
    let cluster_members = vec![NodeId(1), NodeId(2), NodeId(3)];
    let start = Instant::now();

    let mut nodes: Vec<(Replicator, EventListener)> = Vec::with_capacity(cluster_members.len());
    for &node_id in cluster_members.iter() {
        let log: Box<dyn ByteLog> = match &log_directory {
            Some(directory) => Box::new(FileByteLog::open(StorageConfig {
                directory: directory.join(format!("node-{}", node_id.0)),
                capacity: None,
            })?),
            None => Box::new(InMemoryByteLog::new()),
        };

        let config = ReplicatorConfig {
            node_id,
            cluster_members: cluster_members.clone(),
            info_logger: root_logger.clone(),
            options: ReplicatorOptions {
                heartbeat_interval: Some(Duration::from_millis(50)),
                reply_timeout: Some(Duration::from_millis(300)),
                ..ReplicatorOptions::default()
            },
            acknowledgement_strategy: Box::new(QuorumAcknowledgementStrategy),
            control_publication: Box::new(bus.add_publication(CONTROL_STREAM_ID)),
            control_subscription: Box::new(bus.add_subscription(CONTROL_STREAM_ID)),
            data_publication: Box::new(bus.add_publication(DATA_STREAM_ID)),
            data_subscription: Box::new(bus.add_subscription(DATA_STREAM_ID)),
            log,
            replication_handler: Box::new(LoggingReplicationHandler {
                logger: root_logger.new(slog::o!("NodeId" => node_id.0)),
            }),
            node_state: Bytes::from(format!("node-{} says hi", node_id.0)),
            node_state_handler: Box::new(NoOpNodeStateHandler),
        };
        nodes.push(try_create_replicator(config, start)?);
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(5));
    let mut written = 0;
    loop {
        ticker.tick().await;
        let now = Instant::now();
        for (replicator, _) in nodes.iter_mut() {
            replicator.poll(10, now);
        }

        let leader = match nodes.iter_mut().find(|(replicator, _)| replicator.is_leader()) {
            Some((leader, _)) => leader,
            None => continue,
        };
        if written < NUM_MESSAGES {
            match leader.offer(format!("message {}", written).as_bytes(), now) {
                Ok(position) => {
                    slog::info!(
                        root_logger,
                        "Wrote message {} at {} via {:?}",
                        written,
                        position,
                        leader.node_id()
                    );
                    written += 1;
                }
                Err(e) => slog::warn!(root_logger, "Write failed, will retry: {}", e),
            }
            continue;
        }

        let end_position = leader.term_state().received_position();
        if nodes
            .iter()
            .all(|(replicator, _)| replicator.term_state().last_applied_position() == end_position)
        {
            break;
        }
    }

    for (replicator, events) in nodes.iter_mut() {
        slog::info!(
            root_logger,
            "{:?} finished as {} ({:?}) in term {:?}",
            replicator.node_id(),
            replicator.role_name(),
            events.current_election_state(),
            replicator.term_state().leadership_term()
        );
        replicator.close();
    }

    Ok(())
}

struct LoggingReplicationHandler {
    logger: slog::Logger,
}

impl ReplicationHandler for LoggingReplicationHandler {
    fn on_committed(&mut self, position: Position, block: &[u8]) {
        for payload in payloads(block) {
            slog::info!(self.logger, "Committed at {}: {}", position, String::from_utf8_lossy(payload));
        }
    }
}

fn create_root_logger_for_stdout() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}
