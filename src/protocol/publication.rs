use crate::commitlog::Position;
use crate::protocol::control::{
    AcknowledgementStatus, ConsensusHeartbeat, ControlMessage, MessageAcknowledgement, ReplyVote, RequestVote, Resend,
    Vote,
};
use crate::replica::{NodeId, Term};
use crate::transport::{OfferError, Publication, SessionId, TransportPosition};
use bytes::Bytes;

/// RaftPublication publishes typed control messages onto the control stream.
///
/// Every `save_*` either publishes the whole message or nothing, so callers may retry a failed
/// save without risk of a partial message.
pub(crate) struct RaftPublication {
    publication: Box<dyn Publication>,
}

impl RaftPublication {
    pub(crate) fn new(publication: Box<dyn Publication>) -> Self {
        RaftPublication { publication }
    }

    pub(crate) fn save_request_vote(
        &mut self,
        candidate_id: NodeId,
        candidate_session_id: SessionId,
        term: Term,
        candidate_position: Position,
    ) -> Result<TransportPosition, OfferError> {
        self.save(ControlMessage::RequestVote(RequestVote {
            candidate_id,
            candidate_session_id,
            term,
            candidate_position,
        }))
    }

    pub(crate) fn save_reply_vote(
        &mut self,
        sender_id: NodeId,
        candidate_id: NodeId,
        term: Term,
        vote: Vote,
        node_state: Bytes,
        sender_session_id: SessionId,
    ) -> Result<TransportPosition, OfferError> {
        self.save(ControlMessage::ReplyVote(ReplyVote {
            sender_id,
            candidate_id,
            term,
            vote,
            node_state,
            sender_session_id,
        }))
    }

    pub(crate) fn save_consensus_heartbeat(
        &mut self,
        leader_id: NodeId,
        term: Term,
        position: Position,
        transport_start_position: TransportPosition,
        transport_position: TransportPosition,
        leader_session_id: SessionId,
        term_start_position: Position,
    ) -> Result<TransportPosition, OfferError> {
        self.save(ControlMessage::ConsensusHeartbeat(ConsensusHeartbeat {
            leader_id,
            term,
            position,
            transport_start_position,
            transport_position,
            leader_session_id,
            term_start_position,
        }))
    }

    pub(crate) fn save_resend(
        &mut self,
        leader_session_id: SessionId,
        term: Term,
        start_position: Position,
        body: Bytes,
    ) -> Result<TransportPosition, OfferError> {
        self.save(ControlMessage::Resend(Resend {
            leader_session_id,
            term,
            start_position,
            body,
        }))
    }

    pub(crate) fn save_message_acknowledgement(
        &mut self,
        position: Position,
        node_id: NodeId,
        status: AcknowledgementStatus,
        term: Term,
    ) -> Result<TransportPosition, OfferError> {
        self.save(ControlMessage::MessageAcknowledgement(MessageAcknowledgement {
            position,
            node_id,
            status,
            term,
        }))
    }

    pub(crate) fn close(&mut self) {
        self.publication.close();
    }

    fn save(&mut self, message: ControlMessage) -> Result<TransportPosition, OfferError> {
        self.publication.offer(&message.encode())
    }
}
