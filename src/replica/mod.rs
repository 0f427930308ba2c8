mod acknowledgement;
mod archiver;
mod election;
mod peers;
mod position;
mod replica_wiring;
mod replicator;
mod term_state;
mod timeout;

pub use acknowledgement::AcknowledgementStrategy;
pub use acknowledgement::EntireClusterAcknowledgementStrategy;
pub use acknowledgement::QuorumAcknowledgementStrategy;
pub(crate) use election::ElectionConfig;
pub(crate) use election::ElectionStateChangeListener;
pub(crate) use election::ElectionStateSnapshot;
pub use election::WriteError;
pub(crate) use peers::ClusterMembers;
pub use peers::NodeId;
pub(crate) use replica_wiring::create_replicator;
pub(crate) use replica_wiring::ReplicatorParts;
pub use replicator::Replicator;
pub use term_state::Term;
pub use term_state::TermState;
