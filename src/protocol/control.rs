use crate::commitlog::Position;
use crate::protocol::messages::{
    proto_control_envelope, ProtoAcknowledgementStatus, ProtoConsensusHeartbeat, ProtoControlEnvelope,
    ProtoMessageAcknowledgement, ProtoReplyVote, ProtoRequestVote, ProtoResend, ProtoVote,
};
use crate::replica::{NodeId, Term};
use crate::transport::{SessionId, TransportPosition};
use bytes::Bytes;
use prost::Message;
use std::convert::TryFrom;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Vote {
    For,
    Against,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum AcknowledgementStatus {
    Ok,
    MissingLogEntries,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RequestVote {
    pub(crate) candidate_id: NodeId,
    pub(crate) candidate_session_id: SessionId,
    pub(crate) term: Term,
    pub(crate) candidate_position: Position,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ReplyVote {
    pub(crate) sender_id: NodeId,
    pub(crate) candidate_id: NodeId,
    pub(crate) term: Term,
    pub(crate) vote: Vote,
    pub(crate) node_state: Bytes,
    pub(crate) sender_session_id: SessionId,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ConsensusHeartbeat {
    pub(crate) leader_id: NodeId,
    pub(crate) term: Term,
    /// Leader's commit position.
    pub(crate) position: Position,
    /// Where the leader's data stream began this term.
    pub(crate) transport_start_position: TransportPosition,
    /// How far the leader has published on its data stream.
    pub(crate) transport_position: TransportPosition,
    pub(crate) leader_session_id: SessionId,
    /// Log position that `transport_start_position` maps onto.
    pub(crate) term_start_position: Position,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Resend {
    pub(crate) leader_session_id: SessionId,
    pub(crate) term: Term,
    pub(crate) start_position: Position,
    pub(crate) body: Bytes,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct MessageAcknowledgement {
    pub(crate) position: Position,
    pub(crate) node_id: NodeId,
    pub(crate) status: AcknowledgementStatus,
    /// Term of the leader being acknowledged.
    pub(crate) term: Term,
}

/// Everything that travels on the control stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ControlMessage {
    RequestVote(RequestVote),
    ReplyVote(ReplyVote),
    ConsensusHeartbeat(ConsensusHeartbeat),
    Resend(Resend),
    MessageAcknowledgement(MessageAcknowledgement),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum DecodeError {
    #[error("malformed protobuf")]
    Malformed(#[from] prost::DecodeError),
    #[error("envelope has no message")]
    EmptyEnvelope,
    #[error("unknown {field} value {value}")]
    UnknownEnumValue { field: &'static str, value: i32 },
    #[error("node id {0} out of range")]
    NodeIdOutOfRange(u32),
}

impl ControlMessage {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let envelope = ProtoControlEnvelope::from(self.clone());
        let mut buf = Vec::with_capacity(envelope.encoded_len());
        // Vec grows on demand, so encoding cannot run out of space.
        let _ = envelope.encode(&mut buf);

        buf
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let envelope = ProtoControlEnvelope::decode(bytes)?;
        ControlMessage::try_from(envelope)
    }
}

// ------- Conversions --------

impl From<ControlMessage> for ProtoControlEnvelope {
    fn from(message: ControlMessage) -> Self {
        use proto_control_envelope::Message as M;

        let message = match message {
            ControlMessage::RequestVote(m) => M::RequestVote(ProtoRequestVote {
                candidate_id: m.candidate_id.0 as u32,
                candidate_session_id: m.candidate_session_id.0,
                term: m.term.as_u64(),
                candidate_position: m.candidate_position,
            }),
            ControlMessage::ReplyVote(m) => M::ReplyVote(ProtoReplyVote {
                sender_id: m.sender_id.0 as u32,
                candidate_id: m.candidate_id.0 as u32,
                term: m.term.as_u64(),
                vote: (match m.vote {
                    Vote::For => ProtoVote::For,
                    Vote::Against => ProtoVote::Against,
                }) as i32,
                node_state: m.node_state.to_vec(),
                sender_session_id: m.sender_session_id.0,
            }),
            ControlMessage::ConsensusHeartbeat(m) => M::ConsensusHeartbeat(ProtoConsensusHeartbeat {
                leader_id: m.leader_id.0 as u32,
                term: m.term.as_u64(),
                position: m.position,
                transport_start_position: m.transport_start_position,
                transport_position: m.transport_position,
                leader_session_id: m.leader_session_id.0,
                term_start_position: m.term_start_position,
            }),
            ControlMessage::Resend(m) => M::Resend(ProtoResend {
                leader_session_id: m.leader_session_id.0,
                term: m.term.as_u64(),
                start_position: m.start_position,
                body: m.body.to_vec(),
            }),
            ControlMessage::MessageAcknowledgement(m) => M::MessageAcknowledgement(ProtoMessageAcknowledgement {
                position: m.position,
                node_id: m.node_id.0 as u32,
                status: (match m.status {
                    AcknowledgementStatus::Ok => ProtoAcknowledgementStatus::Ok,
                    AcknowledgementStatus::MissingLogEntries => ProtoAcknowledgementStatus::MissingLogEntries,
                }) as i32,
                term: m.term.as_u64(),
            }),
        };

        ProtoControlEnvelope { message: Some(message) }
    }
}

impl TryFrom<ProtoControlEnvelope> for ControlMessage {
    type Error = DecodeError;

    fn try_from(envelope: ProtoControlEnvelope) -> Result<Self, Self::Error> {
        use proto_control_envelope::Message as M;

        let message = match envelope.message.ok_or(DecodeError::EmptyEnvelope)? {
            M::RequestVote(m) => ControlMessage::RequestVote(RequestVote {
                candidate_id: node_id(m.candidate_id)?,
                candidate_session_id: SessionId(m.candidate_session_id),
                term: Term::new(m.term),
                candidate_position: m.candidate_position,
            }),
            M::ReplyVote(m) => ControlMessage::ReplyVote(ReplyVote {
                sender_id: node_id(m.sender_id)?,
                candidate_id: node_id(m.candidate_id)?,
                term: Term::new(m.term),
                vote: match ProtoVote::from_i32(m.vote) {
                    Some(ProtoVote::For) => Vote::For,
                    Some(ProtoVote::Against) => Vote::Against,
                    None => {
                        return Err(DecodeError::UnknownEnumValue {
                            field: "vote",
                            value: m.vote,
                        })
                    }
                },
                node_state: Bytes::from(m.node_state),
                sender_session_id: SessionId(m.sender_session_id),
            }),
            M::ConsensusHeartbeat(m) => ControlMessage::ConsensusHeartbeat(ConsensusHeartbeat {
                leader_id: node_id(m.leader_id)?,
                term: Term::new(m.term),
                position: m.position,
                transport_start_position: m.transport_start_position,
                transport_position: m.transport_position,
                leader_session_id: SessionId(m.leader_session_id),
                term_start_position: m.term_start_position,
            }),
            M::Resend(m) => ControlMessage::Resend(Resend {
                leader_session_id: SessionId(m.leader_session_id),
                term: Term::new(m.term),
                start_position: m.start_position,
                body: Bytes::from(m.body),
            }),
            M::MessageAcknowledgement(m) => ControlMessage::MessageAcknowledgement(MessageAcknowledgement {
                position: m.position,
                node_id: node_id(m.node_id)?,
                status: match ProtoAcknowledgementStatus::from_i32(m.status) {
                    Some(ProtoAcknowledgementStatus::Ok) => AcknowledgementStatus::Ok,
                    Some(ProtoAcknowledgementStatus::MissingLogEntries) => AcknowledgementStatus::MissingLogEntries,
                    None => {
                        return Err(DecodeError::UnknownEnumValue {
                            field: "status",
                            value: m.status,
                        })
                    }
                },
                term: Term::new(m.term),
            }),
        };

        Ok(message)
    }
}

fn node_id(value: u32) -> Result<NodeId, DecodeError> {
    u16::try_from(value)
        .map(NodeId)
        .map_err(|_| DecodeError::NodeIdOutOfRange(value))
}
