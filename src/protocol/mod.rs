mod control;
mod messages;
mod publication;

pub(crate) use control::AcknowledgementStatus;
pub(crate) use control::ConsensusHeartbeat;
pub(crate) use control::ControlMessage;
pub(crate) use control::MessageAcknowledgement;
pub(crate) use control::ReplyVote;
pub(crate) use control::RequestVote;
pub(crate) use control::Resend;
pub(crate) use control::Vote;
pub(crate) use publication::RaftPublication;
