//! Client ownership and the coordination tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use framecast_events::Event;

use crate::client::{Client, ClientEvent, ClientId};
use crate::encoding_pipeline::EncodingPipeline;
use crate::error::EngineError;
use crate::input::InputProcessor;
use crate::wait::{WaitStrategy, Wakeup};
use crate::EngineResult;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub codec_switches: usize,
    pub events: usize,
    pub pruned: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.codec_switches == 0 && self.events == 0 && self.pruned == 0
    }
}

#[derive(Default)]
struct Registry {
    clients: Vec<Arc<dyn Client>>,
    input_holder: Option<ClientId>,
}

impl Registry {
    fn find(&self, id: ClientId) -> Option<&Arc<dyn Client>> {
        self.clients.iter().find(|client| client.id() == id)
    }
}

struct Shared {
    /// Serializes ticks. Held across client callbacks, unlike `registry`.
    tick_lock: Mutex<()>,
    registry: Mutex<Registry>,
    input_processor: RwLock<Option<Arc<dyn InputProcessor>>>,
    pipeline: Arc<EncodingPipeline>,
    wakeup: Arc<Wakeup>,
    should_stop: AtomicBool,
}

/// Owns every connected client and merges their events into one stream.
///
/// Each tick applies pending codec switches, drains and time-orders the
/// events of all clients, dispatches them, and removes dead clients.
pub struct ClientSet {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ClientSet {
    pub fn new(pipeline: Arc<EncodingPipeline>, strategy: WaitStrategy) -> Self {
        Self {
            shared: Arc::new(Shared {
                tick_lock: Mutex::new(()),
                registry: Mutex::new(Registry::default()),
                input_processor: RwLock::new(None),
                pipeline,
                wakeup: Arc::new(Wakeup::new(strategy)),
                should_stop: AtomicBool::new(false),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Start the tick loop on its own thread. Calling it again does nothing.
    pub fn start(&self) -> EngineResult<()> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("client-set".to_string())
            .spawn(move || tick_loop(shared))
            .map_err(|source| EngineError::ThreadSpawn {
                name: "client-set".to_string(),
                source,
            })?;
        *thread = Some(handle);
        Ok(())
    }

    /// Take ownership of a newly connected client.
    pub fn insert(&self, client: Arc<dyn Client>) {
        client.core().attach_wakeup(Arc::clone(&self.shared.wakeup));
        let id = client.id();
        let mut registry = self.shared.registry.lock();
        registry.clients.push(client);
        info!(client = %id, clients = registry.clients.len(), "Client connected");
        drop(registry);
        self.shared.wakeup.notify();
    }

    /// Replace the input processor, returning the previous one.
    pub fn set_input_processor(
        &self,
        processor: Option<Arc<dyn InputProcessor>>,
    ) -> Option<Arc<dyn InputProcessor>> {
        std::mem::replace(&mut *self.shared.input_processor.write(), processor)
    }

    /// Tell every client that the stream configuration changed.
    pub fn on_stream_config_changed(&self) {
        let clients = self.shared.snapshot();
        debug!(clients = clients.len(), "Broadcasting stream config change");
        for client in &clients {
            client.send_event(&Event::StreamConfigChanged);
        }
    }

    /// Run one coordination pass.
    pub fn tick(&self) -> TickReport {
        self.shared.tick()
    }

    pub fn len(&self) -> usize {
        self.shared.registry.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The client currently holding the input token.
    pub fn input_holder(&self) -> Option<ClientId> {
        self.shared.registry.lock().input_holder
    }

    pub fn pipeline(&self) -> &Arc<EncodingPipeline> {
        &self.shared.pipeline
    }
}

impl Drop for ClientSet {
    fn drop(&mut self) {
        self.shared.should_stop.store(true, Ordering::Release);
        self.shared.wakeup.notify();
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

fn tick_loop(shared: Arc<Shared>) {
    debug!("Client set loop started");
    loop {
        let seen = shared.wakeup.epoch();
        if shared.should_stop.load(Ordering::Acquire) {
            break;
        }

        if shared.tick().is_idle() {
            shared.wakeup.wait(seen);
        }
    }
    debug!("Client set loop stopped");
}

impl Shared {
    /// A copy of the client list, so callbacks run without the registry lock.
    fn snapshot(&self) -> Vec<Arc<dyn Client>> {
        self.registry.lock().clients.clone()
    }

    fn tick(&self) -> TickReport {
        let _ticking = self.tick_lock.lock();
        let clients = self.snapshot();
        let mut report = TickReport::default();

        report.codec_switches = self.apply_codec_switches(&clients);

        let mut events: Vec<ClientEvent> = Vec::new();
        for client in &clients {
            client.core().drain_events(&mut events);
        }
        // Stable, so events from one client keep their queue order on ties.
        events.sort_by_key(|event| event.timestamp);
        report.events = events.len();

        for event in events {
            self.dispatch(&clients, event);
        }

        report.pruned = self.prune();
        report
    }

    fn apply_codec_switches(&self, clients: &[Arc<dyn Client>]) -> usize {
        let mut switches = 0;
        for client in clients {
            if !client.core().is_alive() {
                continue;
            }
            let Some(request) = client.core().take_codec_request() else {
                continue;
            };
            switches += 1;

            self.pipeline.deregister_client(client.id());
            match self
                .pipeline
                .register_client(client, request.codec, &request.options)
            {
                Ok(()) => {
                    info!(
                        client = %client.id(),
                        codec = %request.codec,
                        options = %request.options,
                        "Codec switched"
                    );
                    if client.core().is_alive() {
                        client.on_codec_switched(request.codec, &request.options);
                    }
                }
                Err(e) => {
                    warn!(
                        client = %client.id(),
                        codec = %request.codec,
                        error = %e,
                        "Codec switch failed"
                    );
                }
            }
        }
        switches
    }

    #[instrument(name = "dispatch", skip_all, fields(client = %event.client))]
    fn dispatch(&self, clients: &[Arc<dyn Client>], event: ClientEvent) {
        let ClientEvent { client: id, event, .. } = event;
        let Some(client) = clients.iter().find(|client| client.id() == id) else {
            return;
        };
        debug!(%event, "Dispatching event");

        match event {
            Event::AcquireInput => {
                let mut registry = self.registry.lock();
                if let Some(previous) = registry.input_holder.replace(id) {
                    if previous != id {
                        if let Some(previous) = registry.find(previous) {
                            previous.core().set_input_token(false);
                        }
                        debug!(%previous, "Input token revoked");
                    }
                }
                client.core().set_input_token(true);
            }
            Event::ReleaseInput => {
                let mut registry = self.registry.lock();
                if registry.input_holder == Some(id) {
                    registry.input_holder = None;
                    client.core().set_input_token(false);
                }
            }
            Event::Play => client.core().set_playing(true),
            Event::Stop => client.core().set_playing(false),
            Event::ChangeCodec { codec, options } => client.core().switch_codec(codec, options),
            event @ (Event::MouseInput(_) | Event::KeyboardInput(_)) => {
                if self.registry.lock().input_holder != Some(id) {
                    return;
                }
                let processor = self.input_processor.read().clone();
                if let (Some(processor), Some(input)) = (processor, event.into_input()) {
                    processor.push_event(input);
                }
            }
            Event::StreamConfigChanged => {}
            Event::Unknown => debug!("Ignoring unknown event"),
        }
    }

    fn prune(&self) -> usize {
        let mut dead = Vec::new();
        let remaining = {
            let mut registry = self.registry.lock();
            registry.clients.retain(|client| {
                if client.core().is_alive() {
                    true
                } else {
                    dead.push(client.id());
                    false
                }
            });
            if let Some(holder) = registry.input_holder {
                if dead.contains(&holder) {
                    registry.input_holder = None;
                }
            }
            registry.clients.len()
        };

        for id in &dead {
            self.pipeline.deregister_client(*id);
            info!(client = %id, clients = remaining, "Client removed");
        }
        dead.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientCore;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use framecast_encoder::EncodedFrame;
    use framecast_events::{
        Codec, CodecOptions, InputEvent, MouseAction, MouseButton, MouseButtons, MouseInput,
    };
    use std::time::Duration;

    /// Blocks inside `push_event` until released.
    struct Gate {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl InputProcessor for Gate {
        fn push_event(&self, _event: InputEvent) {
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(5));
        }
    }

    struct Silent {
        core: ClientCore,
    }

    impl Client for Silent {
        fn core(&self) -> &ClientCore {
            &self.core
        }
        fn on_frame_encoded(&self, _frame: &EncodedFrame<'_>) {}
        fn on_codec_switched(&self, _codec: Codec, _options: &CodecOptions) {}
        fn send_event(&self, _event: &Event) {}
    }

    fn client_set() -> ClientSet {
        let pipeline = Arc::new(EncodingPipeline::new(WaitStrategy::Spin).unwrap());
        ClientSet::new(pipeline, WaitStrategy::Spin)
    }

    fn silent() -> Arc<Silent> {
        Arc::new(Silent {
            core: ClientCore::new(),
        })
    }

    #[test]
    fn test_play_and_stop() {
        let set = client_set();
        let client = silent();
        set.insert(client.clone());

        client.core.add_event(Event::Play);
        let report = set.tick();
        assert_eq!(report.events, 1);
        assert!(client.core.is_active());

        client.core.add_event(Event::Stop);
        set.tick();
        assert!(!client.core.is_playing());
    }

    #[test]
    fn test_release_by_non_holder_is_ignored() {
        let set = client_set();
        let a = silent();
        let b = silent();
        set.insert(a.clone());
        set.insert(b.clone());

        a.core.add_event(Event::AcquireInput);
        set.tick();
        b.core.add_event(Event::ReleaseInput);
        set.tick();

        assert_eq!(set.input_holder(), Some(a.core.id()));
        assert!(a.core.owns_input_token());

        a.core.add_event(Event::ReleaseInput);
        set.tick();
        assert_eq!(set.input_holder(), None);
        assert!(!a.core.owns_input_token());
    }

    #[test]
    fn test_idle_tick() {
        let set = client_set();
        assert!(set.tick().is_idle());
        assert!(set.is_empty());
    }

    #[test]
    fn test_insert_while_input_processor_blocks() {
        let set = Arc::new(client_set());
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        set.set_input_processor(Some(Arc::new(Gate {
            entered: entered_tx,
            release: release_rx,
        })));

        let holder = silent();
        set.insert(holder.clone());
        holder.core.add_event(Event::AcquireInput);
        holder.core.add_event(Event::MouseInput(MouseInput::new(
            MouseAction::Move,
            MouseButton::Primary,
            MouseButtons::empty(),
            0.5,
            0.5,
        )));

        let ticking = {
            let set = Arc::clone(&set);
            thread::spawn(move || set.tick())
        };
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        set.insert(silent());
        set.on_stream_config_changed();
        assert_eq!(set.len(), 2);
        assert_eq!(set.input_holder(), Some(holder.core.id()));

        release_tx.send(()).unwrap();
        assert_eq!(ticking.join().unwrap().events, 2);
    }
}
