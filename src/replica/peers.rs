use std::fmt;

/// NodeId identifies one member of the replication cluster.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NodeId(pub u16);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// ClusterMembers is the fixed membership of the cluster, this node included.
#[derive(Clone, Debug)]
pub(crate) struct ClusterMembers {
    my_node_id: NodeId,
    members: Vec<NodeId>,
}

impl ClusterMembers {
    /// Caller has already checked that `members` contains `my_node_id` exactly once and has no
    /// duplicates.
    pub(crate) fn new(my_node_id: NodeId, members: Vec<NodeId>) -> Self {
        ClusterMembers { my_node_id, members }
    }

    pub(crate) fn my_node_id(&self) -> NodeId {
        self.my_node_id
    }

    pub(crate) fn contains(&self, node_id: NodeId) -> bool {
        self.members.contains(&node_id)
    }

    pub(crate) fn is_peer(&self, node_id: NodeId) -> bool {
        node_id != self.my_node_id && self.contains(node_id)
    }

    pub(crate) fn size(&self) -> usize {
        self.members.len()
    }

    /// Smallest number of members that makes a strict majority.
    pub(crate) fn majority(&self) -> usize {
        self.size() / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_sizes() {
        let cluster = |n: u16| ClusterMembers::new(NodeId(0), (0..n).map(NodeId).collect());

        assert_eq!(cluster(1).majority(), 1);
        assert_eq!(cluster(2).majority(), 2);
        assert_eq!(cluster(3).majority(), 2);
        assert_eq!(cluster(4).majority(), 3);
        assert_eq!(cluster(5).majority(), 3);
    }

    #[test]
    fn peers_exclude_self() {
        let cluster = ClusterMembers::new(NodeId(2), vec![NodeId(1), NodeId(2), NodeId(3)]);

        assert!(cluster.is_peer(NodeId(1)));
        assert!(!cluster.is_peer(NodeId(2)));
        assert!(!cluster.is_peer(NodeId(4)));
        assert!(cluster.contains(NodeId(2)));
    }
}
