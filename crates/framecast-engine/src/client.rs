//! Remote frame sinks and event sources.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use framecast_encoder::EncodedFrame;
use framecast_events::{Codec, CodecOptions, Event};

use crate::wait::Wakeup;

/// Identity of a client for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pending codec change.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecRequest {
    pub codec: Codec,
    pub options: CodecOptions,
}

/// An inbound event stamped with its sender and arrival time.
#[derive(Debug, Clone)]
pub struct ClientEvent {
    pub client: ClientId,
    pub timestamp: Instant,
    pub event: Event,
}

/// State shared by every client implementation.
///
/// Liveness and play state are independent flags: a client receives frames
/// only while both are set, and once dead it never comes back.
#[derive(Debug)]
pub struct ClientCore {
    id: ClientId,
    alive: AtomicBool,
    playing: AtomicBool,
    owns_input_token: AtomicBool,
    requested_codec: Mutex<Option<CodecRequest>>,
    events: Mutex<Vec<ClientEvent>>,
    wakeup: OnceLock<Arc<Wakeup>>,
}

impl ClientCore {
    pub fn new() -> Self {
        Self {
            id: ClientId::new(),
            alive: AtomicBool::new(true),
            playing: AtomicBool::new(false),
            owns_input_token: AtomicBool::new(false),
            requested_codec: Mutex::new(None),
            events: Mutex::new(Vec::new()),
            wakeup: OnceLock::new(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Alive and playing.
    pub fn is_active(&self) -> bool {
        self.is_alive() && self.is_playing()
    }

    pub fn owns_input_token(&self) -> bool {
        self.owns_input_token.load(Ordering::Acquire)
    }

    /// Ask to be moved to another encoder on the next tick.
    ///
    /// A later request replaces an earlier one that has not been applied yet.
    pub fn switch_codec(&self, codec: Codec, options: CodecOptions) {
        *self.requested_codec.lock() = Some(CodecRequest { codec, options });
        self.notify();
    }

    /// Mark the client dead. It is removed on the next tick.
    pub fn die(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            debug!(client = %self.id, "Client died");
            self.notify();
        }
    }

    /// Queue an inbound event. Ignored once the client is dead.
    pub fn add_event(&self, event: Event) -> bool {
        if !self.is_alive() {
            trace!(client = %self.id, %event, "Ignoring event from dead client");
            return false;
        }

        {
            let mut events = self.events.lock();
            events.push(ClientEvent {
                client: self.id,
                timestamp: Instant::now(),
                event,
            });
        }
        self.notify();
        true
    }

    pub(crate) fn take_codec_request(&self) -> Option<CodecRequest> {
        self.requested_codec.lock().take()
    }

    pub(crate) fn drain_events(&self, out: &mut Vec<ClientEvent>) {
        out.append(&mut self.events.lock());
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub(crate) fn set_input_token(&self, owns: bool) {
        self.owns_input_token.store(owns, Ordering::Release);
    }

    pub(crate) fn attach_wakeup(&self, wakeup: Arc<Wakeup>) {
        let _ = self.wakeup.set(wakeup);
    }

    fn notify(&self) {
        if let Some(wakeup) = self.wakeup.get() {
            wakeup.notify();
        }
    }
}

impl Default for ClientCore {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected remote peer, implemented once per transport.
///
/// Callbacks run on pipeline threads: `on_frame_encoded` on an encoder
/// thread, the rest on the tick thread. They must not call back into the
/// pipeline or tick the client set. Inserting new clients is fine.
pub trait Client: Send + Sync {
    fn core(&self) -> &ClientCore;

    /// A frame is ready. The view is only valid during the call.
    fn on_frame_encoded(&self, frame: &EncodedFrame<'_>);

    /// The client now receives frames from a `codec` encoder.
    fn on_codec_switched(&self, codec: Codec, options: &CodecOptions);

    /// Send an event to the remote peer.
    fn send_event(&self, event: &Event);

    fn id(&self) -> ClientId {
        self.core().id()
    }

    /// Deliver a frame if the client is active; otherwise drop it.
    fn push_frame(&self, frame: &EncodedFrame<'_>) {
        if self.core().is_active() {
            self.on_frame_encoded(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_requires_alive_and_playing() {
        let core = ClientCore::new();
        assert!(core.is_alive());
        assert!(!core.is_active());

        core.set_playing(true);
        assert!(core.is_active());

        core.die();
        assert!(!core.is_active());
        assert!(core.is_playing());
    }

    #[test]
    fn test_codec_request_last_write_wins() {
        let core = ClientCore::new();
        core.switch_codec(Codec::Raw, CodecOptions::new());
        core.switch_codec(Codec::H264, CodecOptions::new().with("width", 640));

        let request = core.take_codec_request().unwrap();
        assert_eq!(request.codec, Codec::H264);
        assert_eq!(request.options.get_int("width"), Some(640));
        assert!(core.take_codec_request().is_none());
    }

    #[test]
    fn test_events_are_fifo_and_stamped() {
        let core = ClientCore::new();
        assert!(core.add_event(Event::Play));
        assert!(core.add_event(Event::Stop));

        let mut events = Vec::new();
        core.drain_events(&mut events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, Event::Play);
        assert_eq!(events[1].event, Event::Stop);
        assert_eq!(events[0].client, core.id());
        assert!(events[0].timestamp <= events[1].timestamp);

        let mut again = Vec::new();
        core.drain_events(&mut again);
        assert!(again.is_empty());
    }

    #[test]
    fn test_dead_client_drops_events() {
        let core = ClientCore::new();
        core.die();
        assert!(!core.add_event(Event::Play));

        let mut events = Vec::new();
        core.drain_events(&mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn test_client_ids_are_unique() {
        assert_ne!(ClientId::new(), ClientId::new());
    }
}
