mod api;
mod commitlog;
mod protocol;
mod replica;
mod transport;

pub use api::try_create_replicator;
pub use api::ElectionEvent;
pub use api::Event;
pub use api::EventListener;
pub use api::FollowerEventData;
pub use api::NoOpNodeStateHandler;
pub use api::NoOpReplicationHandler;
pub use api::NodeStateHandler;
pub use api::ReplicationHandler;
pub use api::ReplicatorConfig;
pub use api::ReplicatorCreationError;
pub use api::ReplicatorOptions;
pub use api::CONTROL_STREAM_ID;
pub use api::DATA_STREAM_ID;
pub use commitlog::ByteLog;
pub use commitlog::FileByteLog;
pub use commitlog::InMemoryByteLog;
pub use commitlog::Position;
pub use commitlog::StorageConfig;
pub use commitlog::StorageError;
pub use replica::AcknowledgementStrategy;
pub use replica::EntireClusterAcknowledgementStrategy;
pub use replica::NodeId;
pub use replica::QuorumAcknowledgementStrategy;
pub use replica::Replicator;
pub use replica::Term;
pub use replica::TermState;
pub use replica::WriteError;
pub use transport::aligned_frame_length;
pub use transport::encode_frame;
pub use transport::payloads;
pub use transport::ControlledAction;
pub use transport::Frame;
pub use transport::FramePayloads;
pub use transport::InMemoryBus;
pub use transport::InMemoryPublication;
pub use transport::InMemorySubscription;
pub use transport::OfferError;
pub use transport::Publication;
pub use transport::SessionId;
pub use transport::StreamId;
pub use transport::Subscription;
pub use transport::Switch;
pub use transport::TransportPosition;
pub use transport::FRAME_ALIGNMENT;
pub use transport::FRAME_HEADER_LENGTH;
pub use transport::NO_SESSION_ID;

// Module roots hold only private `mod` lines and `pub use` exports, so each module's internal
// layout can change without touching its callers.
