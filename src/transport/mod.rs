mod api;
mod frame;
mod in_memory;

pub use api::ControlledAction;
pub use api::Frame;
pub use api::OfferError;
pub use api::Publication;
pub use api::SessionId;
pub use api::StreamId;
pub use api::Subscription;
pub use api::TransportPosition;
pub use api::NO_SESSION_ID;
pub(crate) use frame::aligned_prefix_length;
pub use frame::aligned_frame_length;
pub use frame::encode_frame;
pub use frame::payloads;
pub use frame::FramePayloads;
pub use frame::FRAME_ALIGNMENT;
pub use frame::FRAME_HEADER_LENGTH;
pub use in_memory::InMemoryBus;
pub use in_memory::InMemoryPublication;
pub use in_memory::InMemorySubscription;
pub use in_memory::Switch;
