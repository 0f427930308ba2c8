use crate::transport::frame;
use bytes::Bytes;
use std::fmt;

/// TransportPosition is a byte offset within one publication's stream. Like the streams it
/// describes, it is signed: a position computed for a point before a stream began is negative.
pub type TransportPosition = i64;

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct StreamId(pub i32);

/// SessionId identifies one publication on a stream. Every publication gets a distinct one.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SessionId(pub i32);

pub const NO_SESSION_ID: SessionId = SessionId(-1);

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One transport frame, header included, as delivered to a subscription.
#[derive(Clone, Debug)]
pub struct Frame {
    pub session_id: SessionId,
    /// Position of the first header byte within the publishing session's stream.
    pub position: TransportPosition,
    pub data: Bytes,
}

impl Frame {
    pub fn end_position(&self) -> TransportPosition {
        self.position + self.data.len() as i64
    }

    pub fn payload(&self) -> &[u8] {
        frame::frame_payload(&self.data)
    }
}

/// What a controlled poll handler wants done with the frame it was just handed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlledAction {
    /// Consume the frame and keep polling.
    Continue,
    /// Consume the frame and stop polling.
    Break,
    /// Do not consume the frame. It is redelivered by the next poll.
    Abort,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum OfferError {
    #[error("publication is back pressured")]
    BackPressured,
    #[error("publication is closed")]
    Closed,
}

pub trait Publication {
    /// Frames `payload` and publishes it. Returns the stream position after the frame.
    fn offer(&mut self, payload: &[u8]) -> Result<TransportPosition, OfferError>;

    fn session_id(&self) -> SessionId;

    /// The position the next offered frame will start at.
    fn position(&self) -> TransportPosition;

    fn close(&mut self);
}

pub trait Subscription {
    /// Hands up to `fragment_limit` frames to `handler`, in stream order. Returns the number of
    /// frames consumed.
    fn controlled_poll(
        &mut self,
        handler: &mut dyn FnMut(&Frame) -> ControlledAction,
        fragment_limit: usize,
    ) -> usize;

    /// True while a publication with `session_id` is open on this subscription's stream.
    fn has_image(&self, session_id: SessionId) -> bool;

    fn close(&mut self);
}
