// Wire representation of the control protocol, laid out the way prost-build would generate it
// from this schema:
//
// message ProtoRequestVote {
//   uint32 candidate_id = 1; sint32 candidate_session_id = 2; uint64 term = 3;
//   uint64 candidate_position = 4;
// }
// enum ProtoVote { FOR = 0; AGAINST = 1; }
// message ProtoReplyVote {
//   uint32 sender_id = 1; uint32 candidate_id = 2; uint64 term = 3; ProtoVote vote = 4;
//   bytes node_state = 5; sint32 sender_session_id = 6;
// }
// message ProtoConsensusHeartbeat {
//   uint32 leader_id = 1; uint64 term = 2; uint64 position = 3;
//   sint64 transport_start_position = 4; sint64 transport_position = 5; sint32 leader_session_id = 6;
//   uint64 term_start_position = 7;
// }
// message ProtoResend { sint32 leader_session_id = 1; uint64 term = 2; uint64 start_position = 3; bytes body = 4; }
// enum ProtoAcknowledgementStatus { OK = 0; MISSING_LOG_ENTRIES = 1; }
// message ProtoMessageAcknowledgement {
//   uint64 position = 1; uint32 node_id = 2; ProtoAcknowledgementStatus status = 3; uint64 term = 4;
// }
// message ProtoControlEnvelope {
//   oneof message { ProtoRequestVote request_vote = 1; ProtoReplyVote reply_vote = 2;
//     ProtoConsensusHeartbeat consensus_heartbeat = 3; ProtoResend resend = 4;
//     ProtoMessageAcknowledgement message_acknowledgement = 5; }
// }

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRequestVote {
    #[prost(uint32, tag = "1")]
    pub candidate_id: u32,
    #[prost(sint32, tag = "2")]
    pub candidate_session_id: i32,
    #[prost(uint64, tag = "3")]
    pub term: u64,
    #[prost(uint64, tag = "4")]
    pub candidate_position: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoReplyVote {
    #[prost(uint32, tag = "1")]
    pub sender_id: u32,
    #[prost(uint32, tag = "2")]
    pub candidate_id: u32,
    #[prost(uint64, tag = "3")]
    pub term: u64,
    #[prost(enumeration = "ProtoVote", tag = "4")]
    pub vote: i32,
    #[prost(bytes, tag = "5")]
    pub node_state: ::std::vec::Vec<u8>,
    #[prost(sint32, tag = "6")]
    pub sender_session_id: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoConsensusHeartbeat {
    #[prost(uint32, tag = "1")]
    pub leader_id: u32,
    #[prost(uint64, tag = "2")]
    pub term: u64,
    #[prost(uint64, tag = "3")]
    pub position: u64,
    #[prost(sint64, tag = "4")]
    pub transport_start_position: i64,
    #[prost(sint64, tag = "5")]
    pub transport_position: i64,
    #[prost(sint32, tag = "6")]
    pub leader_session_id: i32,
    #[prost(uint64, tag = "7")]
    pub term_start_position: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoResend {
    #[prost(sint32, tag = "1")]
    pub leader_session_id: i32,
    #[prost(uint64, tag = "2")]
    pub term: u64,
    #[prost(uint64, tag = "3")]
    pub start_position: u64,
    #[prost(bytes, tag = "4")]
    pub body: ::std::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoMessageAcknowledgement {
    #[prost(uint64, tag = "1")]
    pub position: u64,
    #[prost(uint32, tag = "2")]
    pub node_id: u32,
    #[prost(enumeration = "ProtoAcknowledgementStatus", tag = "3")]
    pub status: i32,
    #[prost(uint64, tag = "4")]
    pub term: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoControlEnvelope {
    #[prost(oneof = "proto_control_envelope::Message", tags = "1, 2, 3, 4, 5")]
    pub message: ::std::option::Option<proto_control_envelope::Message>,
}

pub mod proto_control_envelope {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Message {
        #[prost(message, tag = "1")]
        RequestVote(super::ProtoRequestVote),
        #[prost(message, tag = "2")]
        ReplyVote(super::ProtoReplyVote),
        #[prost(message, tag = "3")]
        ConsensusHeartbeat(super::ProtoConsensusHeartbeat),
        #[prost(message, tag = "4")]
        Resend(super::ProtoResend),
        #[prost(message, tag = "5")]
        MessageAcknowledgement(super::ProtoMessageAcknowledgement),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoVote {
    For = 0,
    Against = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoAcknowledgementStatus {
    Ok = 0,
    MissingLogEntries = 1,
}
