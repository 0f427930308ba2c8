use crate::transport::api::SessionId;
use bytes::{BufMut, Bytes, BytesMut};
use std::convert::TryInto;

// Frame layout, little endian:
//
// 0..4 : frame length (header + payload, before alignment padding)
// 4..8 : session id
// 8..  : payload
// ..   : zero padding up to FRAME_ALIGNMENT
pub const FRAME_HEADER_LENGTH: usize = 8;
pub const FRAME_ALIGNMENT: usize = 8;

pub fn aligned_frame_length(payload_length: usize) -> usize {
    align(FRAME_HEADER_LENGTH + payload_length)
}

fn align(length: usize) -> usize {
    (length + FRAME_ALIGNMENT - 1) & !(FRAME_ALIGNMENT - 1)
}

pub fn encode_frame(session_id: SessionId, payload: &[u8]) -> Bytes {
    let frame_length = FRAME_HEADER_LENGTH + payload.len();
    let aligned_length = align(frame_length);

    let mut buf = BytesMut::with_capacity(aligned_length);
    buf.put_u32_le(frame_length as u32);
    buf.put_i32_le(session_id.0);
    buf.put_slice(payload);
    buf.resize(aligned_length, 0);

    buf.freeze()
}

/// Unpadded length declared by the header at the start of `bytes`.
fn declared_length(bytes: &[u8]) -> Option<usize> {
    let header: [u8; 4] = bytes.get(0..4)?.try_into().ok()?;
    let length = u32::from_le_bytes(header) as usize;
    if length < FRAME_HEADER_LENGTH {
        return None;
    }

    Some(length)
}

pub(crate) fn frame_payload(frame: &[u8]) -> &[u8] {
    match declared_length(frame) {
        Some(length) if length <= frame.len() => &frame[FRAME_HEADER_LENGTH..length],
        _ => &[],
    }
}

/// Length of the longest prefix of `block` made of whole frames that fits in `max_length`.
/// `block` must start on a frame boundary.
pub(crate) fn aligned_prefix_length(block: &[u8], max_length: usize) -> usize {
    let mut offset = 0;
    while let Some(length) = declared_length(&block[offset..]) {
        let next = offset + align(length);
        if next > block.len() || next > max_length {
            break;
        }
        offset = next;
    }

    offset
}

/// Iterates the payloads of the whole frames in a block of log bytes, such as a committed block
/// handed to a `ReplicationHandler`.
pub fn payloads(block: &[u8]) -> FramePayloads<'_> {
    FramePayloads { block, offset: 0 }
}

pub struct FramePayloads<'a> {
    block: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for FramePayloads<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.block[self.offset..];
        let length = declared_length(remaining)?;
        let aligned_length = align(length);
        if aligned_length > remaining.len() {
            return None;
        }

        self.offset += aligned_length;
        Some(&remaining[FRAME_HEADER_LENGTH..length])
    }
}
