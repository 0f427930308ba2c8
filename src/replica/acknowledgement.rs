use crate::commitlog::Position;
use crate::replica::peers::NodeId;
use std::collections::HashMap;

/// AcknowledgementStrategy decides which log position counts as acknowledged by the cluster, given
/// the highest position each node has acknowledged so far in the current term.
///
/// Implementations must be pure functions of their inputs. Nodes that have not acknowledged
/// anything yet are absent from `acknowledged_positions`.
pub trait AcknowledgementStrategy {
    fn find_acked_position(&self, cluster_size: usize, acknowledged_positions: &HashMap<NodeId, Position>) -> Position;
}

/// Position is acknowledged once every cluster member has acknowledged it.
pub struct EntireClusterAcknowledgementStrategy;

impl AcknowledgementStrategy for EntireClusterAcknowledgementStrategy {
    fn find_acked_position(&self, cluster_size: usize, acknowledged_positions: &HashMap<NodeId, Position>) -> Position {
        if acknowledged_positions.len() < cluster_size {
            return 0;
        }

        acknowledged_positions.values().copied().min().unwrap_or(0)
    }
}

/// Position is acknowledged once a strict majority of cluster members has acknowledged it.
pub struct QuorumAcknowledgementStrategy;

impl AcknowledgementStrategy for QuorumAcknowledgementStrategy {
    fn find_acked_position(&self, cluster_size: usize, acknowledged_positions: &HashMap<NodeId, Position>) -> Position {
        let majority = cluster_size / 2 + 1;
        if acknowledged_positions.len() < majority {
            return 0;
        }

        let mut positions: Vec<Position> = acknowledged_positions.values().copied().collect();
        positions.sort_unstable_by(|a, b| b.cmp(a));

        // The `majority`th highest position has been reached by at least `majority` nodes.
        positions[majority - 1]
    }
}
