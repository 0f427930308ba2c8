//! This mod is meant to hold most of the code for the library's client-facing API.
mod event_bus;
mod handlers;
mod options;
mod wiring;

pub use event_bus::ElectionEvent;
pub use event_bus::Event;
pub use event_bus::EventListener;
pub use event_bus::FollowerEventData;
pub use handlers::NoOpNodeStateHandler;
pub use handlers::NoOpReplicationHandler;
pub use handlers::NodeStateHandler;
pub use handlers::ReplicationHandler;
pub use options::ReplicatorOptions;
pub use wiring::try_create_replicator;
pub use wiring::ReplicatorConfig;
pub use wiring::ReplicatorCreationError;
pub use wiring::CONTROL_STREAM_ID;
pub use wiring::DATA_STREAM_ID;
