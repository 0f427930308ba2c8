use crate::transport::api::{
    ControlledAction, Frame, OfferError, Publication, SessionId, StreamId, Subscription, TransportPosition,
};
use crate::transport::frame;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Switch is a shared on/off flag. Tests hold one end to inject faults into the bus while a
/// node holds the publication or subscription it controls.
#[derive(Clone, Default)]
pub struct Switch {
    flag: Arc<AtomicBool>,
}

impl Switch {
    pub fn turn_on(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn turn_off(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_on(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// InMemoryBus is a multicast medium shared by every node of a local cluster. Each stream keeps
/// every frame ever published; each subscription has its own cursor into its stream. Frames are
/// delivered to every subscription on the stream, including the publisher's own.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    state: Arc<Mutex<BusState>>,
}

#[derive(Default)]
struct BusState {
    streams: HashMap<StreamId, StreamLog>,
    subscribers: HashMap<u64, Subscriber>,
    next_subscriber_id: u64,
    next_session_id: i32,
}

#[derive(Default)]
struct StreamLog {
    frames: Vec<StoredFrame>,
    open_sessions: HashSet<SessionId>,
}

struct StoredFrame {
    frame: Frame,
    // Subscribers that had frame loss switched on when this frame was published.
    lost_by: Vec<u64>,
}

struct Subscriber {
    stream_id: StreamId,
    cursor: usize,
    frame_loss: Switch,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_publication(&self, stream_id: StreamId) -> InMemoryPublication {
        self.add_publication_at(stream_id, 0)
    }

    /// A publication whose first frame starts at `initial_position`.
    pub fn add_publication_at(&self, stream_id: StreamId, initial_position: TransportPosition) -> InMemoryPublication {
        let mut state = self.lock();
        state.next_session_id += 1;
        let session_id = SessionId(state.next_session_id);
        state
            .streams
            .entry(stream_id)
            .or_default()
            .open_sessions
            .insert(session_id);

        InMemoryPublication {
            bus: self.clone(),
            stream_id,
            session_id,
            position: initial_position,
            back_pressure: Switch::default(),
            closed: false,
        }
    }

    /// A subscription that receives frames published from now on.
    pub fn add_subscription(&self, stream_id: StreamId) -> InMemorySubscription {
        let mut state = self.lock();
        let cursor = state.streams.entry(stream_id).or_default().frames.len();
        let subscriber_id = state.next_subscriber_id;
        state.next_subscriber_id += 1;

        let frame_loss = Switch::default();
        state.subscribers.insert(
            subscriber_id,
            Subscriber {
                stream_id,
                cursor,
                frame_loss: frame_loss.clone(),
            },
        );

        InMemorySubscription {
            bus: self.clone(),
            subscriber_id,
            stream_id,
            frame_loss,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().expect("InMemoryBus mutex guard poison")
    }
}

pub struct InMemoryPublication {
    bus: InMemoryBus,
    stream_id: StreamId,
    session_id: SessionId,
    position: TransportPosition,
    back_pressure: Switch,
    closed: bool,
}

impl InMemoryPublication {
    /// While the returned switch is on, every offer fails with `OfferError::BackPressured`.
    pub fn back_pressure(&self) -> Switch {
        self.back_pressure.clone()
    }
}

impl Publication for InMemoryPublication {
    fn offer(&mut self, payload: &[u8]) -> Result<TransportPosition, OfferError> {
        if self.closed {
            return Err(OfferError::Closed);
        }
        if self.back_pressure.is_on() {
            return Err(OfferError::BackPressured);
        }

        let data = frame::encode_frame(self.session_id, payload);
        let frame = Frame {
            session_id: self.session_id,
            position: self.position,
            data,
        };
        self.position = frame.end_position();

        let mut state = self.bus.lock();
        let lost_by = state
            .subscribers
            .iter()
            .filter(|(_, s)| s.stream_id == self.stream_id && s.frame_loss.is_on())
            .map(|(id, _)| *id)
            .collect();
        state
            .streams
            .entry(self.stream_id)
            .or_default()
            .frames
            .push(StoredFrame { frame, lost_by });

        Ok(self.position)
    }

    fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn position(&self) -> TransportPosition {
        self.position
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(stream) = self.bus.lock().streams.get_mut(&self.stream_id) {
            stream.open_sessions.remove(&self.session_id);
        }
    }
}

pub struct InMemorySubscription {
    bus: InMemoryBus,
    subscriber_id: u64,
    stream_id: StreamId,
    frame_loss: Switch,
}

impl InMemorySubscription {
    /// While the returned switch is on, frames published to this subscription's stream are lost
    /// for this subscription (and only this one).
    pub fn frame_loss(&self) -> Switch {
        self.frame_loss.clone()
    }

    // Copies out the next deliverable frames so the handler runs without the bus lock held; the
    // handler commonly publishes on the same bus.
    fn next_frames(&self, fragment_limit: usize) -> (Vec<(usize, Frame)>, usize) {
        let state = self.bus.lock();
        let subscriber = match state.subscribers.get(&self.subscriber_id) {
            Some(subscriber) => subscriber,
            None => return (vec![], 0),
        };
        let frames = match state.streams.get(&self.stream_id) {
            Some(stream) => &stream.frames,
            None => return (vec![], subscriber.cursor),
        };

        let mut deliverable = Vec::with_capacity(fragment_limit.min(frames.len()));
        let mut scan_end = subscriber.cursor;
        while scan_end < frames.len() && deliverable.len() < fragment_limit {
            let stored = &frames[scan_end];
            if !stored.lost_by.contains(&self.subscriber_id) {
                deliverable.push((scan_end, stored.frame.clone()));
            }
            scan_end += 1;
        }

        (deliverable, scan_end)
    }
}

impl Subscription for InMemorySubscription {
    fn controlled_poll(
        &mut self,
        handler: &mut dyn FnMut(&Frame) -> ControlledAction,
        fragment_limit: usize,
    ) -> usize {
        let (frames, scan_end) = self.next_frames(fragment_limit);

        let mut consumed = 0;
        let mut new_cursor = scan_end;
        for (index, frame) in frames {
            match handler(&frame) {
                ControlledAction::Continue => consumed += 1,
                ControlledAction::Break => {
                    consumed += 1;
                    new_cursor = index + 1;
                    break;
                }
                ControlledAction::Abort => {
                    new_cursor = index;
                    break;
                }
            }
        }

        if let Some(subscriber) = self.bus.lock().subscribers.get_mut(&self.subscriber_id) {
            subscriber.cursor = new_cursor;
        }

        consumed
    }

    fn has_image(&self, session_id: SessionId) -> bool {
        self.bus
            .lock()
            .streams
            .get(&self.stream_id)
            .map(|stream| stream.open_sessions.contains(&session_id))
            .unwrap_or(false)
    }

    fn close(&mut self) {
        self.bus.lock().subscribers.remove(&self.subscriber_id);
    }
}
