use crate::commitlog::{ByteLog, Position, StorageError};
use crate::replica::position;
use crate::transport::{self, ControlledAction, Frame, SessionId, Subscription, TransportPosition};
use bytes::Bytes;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Mode {
    NoLeader,
    /// Leader is known but its stream is not visible on the data subscription yet.
    AwaitingImage(SessionId),
    Following(SessionId),
    /// This node is the leader and appends its own frames.
    Authoring,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ArchiverError {
    #[error("bytes for position {position} do not line up with archive end {end}")]
    Misaligned { position: Position, end: Position },
    #[error("archive storage failure")]
    Storage(#[from] StorageError),
}

/// RaftArchiver copies the current leader's data stream into the local log.
///
/// The archive's end is always the node's received position. Bytes are appended at the end, whether
/// they arrive on the data stream, through a resend patch, or (on the leader) straight from the
/// writer. The only other change is `truncate`, which drops an uncommitted suffix.
pub(crate) struct RaftArchiver {
    logger: slog::Logger,
    log: Box<dyn ByteLog>,
    data_subscription: Box<dyn Subscription>,
    mode: Mode,
    // Furthest end of a leader frame that was seen but could not be archived.
    observed_transport_position: Option<TransportPosition>,
    // Stream end announced by the leader. Counts as observed once a poll finds nothing to archive.
    announced_transport_position: Option<TransportPosition>,
}

impl RaftArchiver {
    pub(crate) fn new(logger: slog::Logger, log: Box<dyn ByteLog>, data_subscription: Box<dyn Subscription>) -> Self {
        RaftArchiver {
            logger,
            log,
            data_subscription,
            mode: Mode::NoLeader,
            observed_transport_position: None,
            announced_transport_position: None,
        }
    }

    pub(crate) fn on_leader(&mut self, leader_session_id: SessionId) {
        slog::debug!(self.logger, "Archiver following session {:?}", leader_session_id);
        self.mode = Mode::AwaitingImage(leader_session_id);
        self.forget_stream_positions();
    }

    pub(crate) fn on_no_leader(&mut self) {
        self.mode = Mode::NoLeader;
        self.forget_stream_positions();
    }

    pub(crate) fn on_authoring(&mut self) {
        self.mode = Mode::Authoring;
        self.forget_stream_positions();
    }

    fn forget_stream_positions(&mut self) {
        self.observed_transport_position = None;
        self.announced_transport_position = None;
    }

    /// Tries to attach to the leader's stream. Returns true while there is no leader stream to
    /// archive from: no leader, its image isn't available yet, or this node is the leader.
    pub(crate) fn check_leader_archiver(&mut self) -> bool {
        if let Mode::AwaitingImage(session_id) = self.mode {
            if self.data_subscription.has_image(session_id) {
                slog::debug!(self.logger, "Archiver attached to session {:?}", session_id);
                self.mode = Mode::Following(session_id);
            }
        }

        !matches!(self.mode, Mode::Following(_))
    }

    /// Furthest transport position known to exist on the followed stream. Ahead of the archive end
    /// when frames were lost.
    pub(crate) fn archived_transport_position(&self, delta: i64) -> TransportPosition {
        let archived = position::logical_to_transport(self.log.end_position(), delta);
        match self.observed_transport_position {
            Some(observed) => observed.max(archived),
            None => archived,
        }
    }

    /// Records that the followed stream is known to extend to at least `transport_position`. The
    /// frames may still be in flight, so this only shows up as a gap after a poll that archives
    /// nothing.
    pub(crate) fn note_transport_position(&mut self, transport_position: TransportPosition) {
        if let Mode::Following(_) = self.mode {
            let announced = self.announced_transport_position.get_or_insert(transport_position);
            *announced = (*announced).max(transport_position);
        }
    }

    /// Archives frames from the followed stream that continue the log. Returns bytes archived.
    pub(crate) fn poll(&mut self, delta: i64, fragment_limit: usize) -> Result<usize, ArchiverError> {
        let session_id = match self.mode {
            Mode::Following(session_id) => session_id,
            _ => return Ok(0),
        };

        let logger = &self.logger;
        let log = &mut self.log;
        let observed = &mut self.observed_transport_position;
        let mut bytes_read = 0;
        let mut failure = None;

        self.data_subscription.controlled_poll(
            &mut |frame: &Frame| {
                if frame.session_id != session_id {
                    return ControlledAction::Continue;
                }

                let expected = position::logical_to_transport(log.end_position(), delta);
                if frame.end_position() <= expected {
                    // Already archived, e.g. through a resend.
                    return ControlledAction::Continue;
                }
                if frame.position > expected {
                    // Gap. Leave it to a resend.
                    let end = frame.end_position();
                    *observed = Some(observed.map_or(end, |o| o.max(end)));
                    return ControlledAction::Continue;
                }

                if frame.position < expected {
                    // The archive ends inside this frame. Only whole frames may land in the log.
                    slog::warn!(
                        logger,
                        "Skipping frame [{}, {}) straddling archive end {}",
                        frame.position,
                        frame.end_position(),
                        expected
                    );
                    return ControlledAction::Continue;
                }

                match log.append(&frame.data) {
                    Ok(_) => {
                        bytes_read += frame.data.len();
                        ControlledAction::Continue
                    }
                    Err(e) => {
                        failure = Some(e);
                        ControlledAction::Abort
                    }
                }
            },
            fragment_limit,
        );

        match failure {
            Some(e) if bytes_read == 0 => Err(e.into()),
            Some(e) => {
                slog::warn!(self.logger, "Archived {} bytes before storage failure: {}", bytes_read, e);
                Ok(bytes_read)
            }
            None => {
                if bytes_read == 0 {
                    if let Some(announced) = self.announced_transport_position.take() {
                        let observed = self.observed_transport_position.get_or_insert(announced);
                        *observed = (*observed).max(announced);
                    }
                }
                Ok(bytes_read)
            }
        }
    }

    /// Fills the log from a resend. `position` must be the current end of the archive.
    pub(crate) fn patch(&mut self, position: Position, body: &[u8]) -> Result<(), ArchiverError> {
        let end = self.log.end_position();
        if position != end {
            return Err(ArchiverError::Misaligned { position, end });
        }

        self.log.append(body)?;
        Ok(())
    }

    /// Drops archived bytes at or after `position`. Whatever was observed past the old end is
    /// forgotten along with them.
    pub(crate) fn truncate(&mut self, position: Position) -> Result<(), ArchiverError> {
        self.log.truncate(position)?;
        self.forget_stream_positions();
        Ok(())
    }

    /// Leader-side append of a frame this node just published.
    pub(crate) fn append(&mut self, frame: &[u8]) -> Result<Position, StorageError> {
        self.log.append(frame)
    }

    pub(crate) fn can_append(&self, length: usize) -> bool {
        match self.log.remaining_capacity() {
            Some(remaining) => length as u64 <= remaining,
            None => true,
        }
    }

    /// Whole frames starting at `position`, at most `max_length` bytes of them.
    pub(crate) fn read_frames(&self, position: Position, max_length: usize) -> Result<Bytes, ArchiverError> {
        let end = self.log.end_position();
        if position >= end {
            return Ok(Bytes::new());
        }

        let available = (end - position).min(max_length as u64) as usize;
        let chunk = self.log.read(position, available)?;
        let aligned_length = transport::aligned_prefix_length(&chunk, max_length);

        Ok(chunk.slice(0..aligned_length))
    }

    pub(crate) fn read(&self, position: Position, length: usize) -> Result<Bytes, ArchiverError> {
        Ok(self.log.read(position, length)?)
    }

    pub(crate) fn end_position(&self) -> Position {
        self.log.end_position()
    }

    pub(crate) fn close(&mut self) {
        self.data_subscription.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitlog::InMemoryByteLog;
    use crate::transport::{encode_frame, InMemoryBus, InMemoryPublication, Publication, StreamId, Switch};

    const DATA: StreamId = StreamId(2);

    struct Setup {
        archiver: RaftArchiver,
        leader: InMemoryPublication,
        frame_loss: Switch,
    }

    fn setup(log: InMemoryByteLog) -> Setup {
        let bus = InMemoryBus::new();
        let subscription = bus.add_subscription(DATA);
        let frame_loss = subscription.frame_loss();
        let leader = bus.add_publication(DATA);
        let logger = slog::Logger::root(slog::Discard, slog::o!());

        Setup {
            archiver: RaftArchiver::new(logger, Box::new(log), Box::new(subscription)),
            leader,
            frame_loss,
        }
    }

    #[test]
    fn follows_leader_stream() {
        let Setup {
            mut archiver, mut leader, ..
        } = setup(InMemoryByteLog::new());

        assert!(archiver.check_leader_archiver());
        assert_eq!(archiver.poll(0, 10).unwrap(), 0);

        archiver.on_leader(leader.session_id());
        assert!(!archiver.check_leader_archiver());

        leader.offer(b"one").unwrap();
        leader.offer(b"two").unwrap();
        assert_eq!(archiver.poll(0, 10).unwrap(), 32);
        assert_eq!(archiver.end_position(), 32);
        assert_eq!(archiver.archived_transport_position(0), 32);

        // Nothing new: no progress, nothing changes.
        assert_eq!(archiver.poll(0, 10).unwrap(), 0);
        assert_eq!(archiver.end_position(), 32);

        let block = archiver.read(0, 32).unwrap();
        let payloads: Vec<&[u8]> = transport::payloads(&block).collect();
        assert_eq!(payloads, vec![&b"one"[..], &b"two"[..]]);
    }

    #[test]
    fn ignores_other_sessions_and_waits_for_image() {
        let bus = InMemoryBus::new();
        let subscription = bus.add_subscription(DATA);
        let mut old_leader = bus.add_publication(DATA);
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let mut archiver = RaftArchiver::new(logger, Box::new(InMemoryByteLog::new()), Box::new(subscription));

        archiver.on_leader(crate::transport::SessionId(999));
        assert!(archiver.check_leader_archiver());

        let mut new_leader = bus.add_publication(DATA);
        archiver.on_leader(new_leader.session_id());
        assert!(!archiver.check_leader_archiver());

        old_leader.offer(b"stale").unwrap();
        new_leader.offer(b"fresh").unwrap();
        assert_eq!(archiver.poll(0, 10).unwrap(), 16);
        let block = archiver.read(0, 16).unwrap();
        assert_eq!(transport::payloads(&block).next(), Some(&b"fresh"[..]));
    }

    #[test]
    fn gap_is_observed_then_patched() {
        let Setup {
            mut archiver,
            mut leader,
            frame_loss,
        } = setup(InMemoryByteLog::new());
        archiver.on_leader(leader.session_id());
        assert!(!archiver.check_leader_archiver());

        leader.offer(b"a").unwrap();
        frame_loss.turn_on();
        leader.offer(b"b").unwrap();
        frame_loss.turn_off();
        leader.offer(b"c").unwrap();

        assert_eq!(archiver.poll(0, 10).unwrap(), 16);
        assert_eq!(archiver.end_position(), 16);
        assert_eq!(archiver.archived_transport_position(0), 48);

        // Patch must start at the archive end.
        let missing = encode_frame(leader.session_id(), b"b");
        assert!(matches!(
            archiver.patch(0, &missing),
            Err(ArchiverError::Misaligned { position: 0, end: 16 })
        ));
        let mut resend = missing.to_vec();
        resend.extend_from_slice(&encode_frame(leader.session_id(), b"c"));
        archiver.patch(16, &resend).unwrap();
        assert_eq!(archiver.end_position(), 48);

        // Stream continues after the patched region without duplicating it.
        leader.offer(b"d").unwrap();
        assert_eq!(archiver.poll(0, 10).unwrap(), 16);
        let block = archiver.read(0, 64).unwrap();
        let payloads: Vec<&[u8]> = transport::payloads(&block).collect();
        assert_eq!(payloads, vec![&b"a"[..], &b"b"[..], &b"c"[..], &b"d"[..]]);
    }

    #[test]
    fn delta_maps_stream_onto_log_end() {
        let bus = InMemoryBus::new();
        let subscription = bus.add_subscription(DATA);
        let mut leader = bus.add_publication_at(DATA, 1000);
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let mut log = InMemoryByteLog::new();
        log.append(&encode_frame(SessionId(1), b"earlier term")).unwrap(); // 24 bytes
        let mut archiver = RaftArchiver::new(logger, Box::new(log), Box::new(subscription));

        let delta = position::transport_position_delta(1000, 24);
        archiver.on_leader(leader.session_id());
        assert!(!archiver.check_leader_archiver());

        leader.offer(b"x").unwrap();
        assert_eq!(archiver.poll(delta, 10).unwrap(), 16);
        assert_eq!(archiver.end_position(), 40);
        assert_eq!(archiver.archived_transport_position(delta), 1016);
    }

    #[test]
    fn storage_exhaustion_leaves_frame_for_retry() {
        let Setup {
            mut archiver, mut leader, ..
        } = setup(InMemoryByteLog::with_capacity_limit(20));
        archiver.on_leader(leader.session_id());
        assert!(!archiver.check_leader_archiver());

        leader.offer(b"fits").unwrap();
        leader.offer(b"does not fit").unwrap();

        assert_eq!(archiver.poll(0, 10).unwrap(), 16);
        assert!(matches!(archiver.poll(0, 10), Err(ArchiverError::Storage(StorageError::Full { .. }))));
        assert!(matches!(archiver.poll(0, 10), Err(ArchiverError::Storage(_))));
        assert_eq!(archiver.end_position(), 16);
        assert!(!archiver.can_append(8));
        assert!(archiver.can_append(4));
    }

    #[test]
    fn frame_straddling_archive_end_is_not_archived() {
        let Setup {
            mut archiver, mut leader, ..
        } = setup(InMemoryByteLog::new());
        archiver.append(&[0u8; 8]).unwrap();
        archiver.on_leader(leader.session_id());
        assert!(!archiver.check_leader_archiver());

        leader.offer(b"straddle").unwrap(); // [0, 16)
        leader.offer(b"next").unwrap(); // [16, 32)

        assert_eq!(archiver.poll(0, 10).unwrap(), 0);
        assert_eq!(archiver.end_position(), 8);
        assert_eq!(archiver.read(0, 8).unwrap(), Bytes::from_static(&[0u8; 8]));
        // The whole frame after it is a gap, not a continuation.
        assert_eq!(archiver.archived_transport_position(0), 32);
    }

    #[test]
    fn truncate_then_follow_new_leader() {
        let bus = InMemoryBus::new();
        let subscription = bus.add_subscription(DATA);
        let mut old_leader = bus.add_publication(DATA);
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let mut archiver = RaftArchiver::new(logger, Box::new(InMemoryByteLog::new()), Box::new(subscription));

        archiver.on_leader(old_leader.session_id());
        assert!(!archiver.check_leader_archiver());
        old_leader.offer(b"committed").unwrap(); // 24
        old_leader.offer(b"dropped").unwrap(); // 16
        assert_eq!(archiver.poll(0, 10).unwrap(), 40);
        archiver.note_transport_position(64);

        archiver.truncate(24).unwrap();
        assert_eq!(archiver.end_position(), 24);
        assert!(matches!(
            archiver.truncate(25),
            Err(ArchiverError::Storage(StorageError::OutOfRange { .. }))
        ));

        // New leader's stream starts at transport 0, which maps onto logical 24.
        let mut new_leader = bus.add_publication(DATA);
        let delta = position::transport_position_delta(0, 24);
        archiver.on_leader(new_leader.session_id());
        assert!(!archiver.check_leader_archiver());
        new_leader.offer(b"fresh").unwrap();

        assert_eq!(archiver.poll(delta, 10).unwrap(), 16);
        assert_eq!(archiver.archived_transport_position(delta), 16);
        let block = archiver.read(0, 40).unwrap();
        let payloads: Vec<&[u8]> = transport::payloads(&block).collect();
        assert_eq!(payloads, vec![&b"committed"[..], &b"fresh"[..]]);
    }

    #[test]
    fn read_frames_never_splits_a_frame() {
        let Setup {
            mut archiver, mut leader, ..
        } = setup(InMemoryByteLog::new());
        archiver.on_leader(leader.session_id());
        assert!(!archiver.check_leader_archiver());
        leader.offer(b"12345678").unwrap(); // 16
        leader.offer(b"123456789").unwrap(); // 24
        archiver.poll(0, 10).unwrap();

        assert_eq!(archiver.read_frames(0, 100).unwrap().len(), 40);
        assert_eq!(archiver.read_frames(0, 30).unwrap().len(), 16);
        assert_eq!(archiver.read_frames(16, 30).unwrap().len(), 24);
        assert_eq!(archiver.read_frames(40, 30).unwrap().len(), 0);
    }

    #[test]
    fn heartbeat_reveals_tail_loss() {
        let Setup {
            mut archiver,
            mut leader,
            frame_loss,
        } = setup(InMemoryByteLog::new());
        archiver.on_leader(leader.session_id());
        assert!(!archiver.check_leader_archiver());

        // Announced frames that are still on the stream are archived, not reported missing.
        leader.offer(b"sent").unwrap();
        archiver.note_transport_position(16);
        assert_eq!(archiver.poll(0, 10).unwrap(), 16);
        assert_eq!(archiver.poll(0, 10).unwrap(), 0);
        assert_eq!(archiver.archived_transport_position(0), 16);

        frame_loss.turn_on();
        leader.offer(b"lost").unwrap();
        assert_eq!(archiver.poll(0, 10).unwrap(), 0);
        assert_eq!(archiver.archived_transport_position(0), 16);

        archiver.note_transport_position(32);
        assert_eq!(archiver.archived_transport_position(0), 16);
        assert_eq!(archiver.poll(0, 10).unwrap(), 0);
        assert_eq!(archiver.archived_transport_position(0), 32);

        archiver.on_no_leader();
        assert!(archiver.check_leader_archiver());
        assert_eq!(archiver.archived_transport_position(0), 16);
    }
}
