use crate::commitlog::Position;
use crate::replica::NodeId;
use crate::transport::SessionId;

/// ReplicationHandler is the application specific view of the replicated log.
pub trait ReplicationHandler {
    /// on_committed is called only once `block` is guaranteed to be committed (i.e. acknowledged
    /// by a qualifying set of nodes). Blocks are delivered exactly once, in log order, without gaps:
    /// each block starts where the previous one ended. `position` is the block's start.
    ///
    /// Blocks are whole transport frames; use `payloads()` to iterate what was written.
    fn on_committed(&mut self, position: Position, block: &[u8]);
}

/// NodeStateHandler receives the opaque node state other cluster members attach to their vote
/// replies, e.g. an address clients can be redirected to.
pub trait NodeStateHandler {
    fn on_new_node_state(&mut self, node_id: NodeId, session_id: SessionId, node_state: &[u8]);
}

pub struct NoOpReplicationHandler;

impl ReplicationHandler for NoOpReplicationHandler {
    fn on_committed(&mut self, _: Position, _: &[u8]) {}
}

pub struct NoOpNodeStateHandler;

impl NodeStateHandler for NoOpNodeStateHandler {
    fn on_new_node_state(&mut self, _: NodeId, _: SessionId, _: &[u8]) {}
}
