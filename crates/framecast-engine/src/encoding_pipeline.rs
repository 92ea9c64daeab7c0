//! Frame hand-off from the producer to a pool of concurrently running encoders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, trace, warn};

use framecast_encoder::{CompatibilityCheck, EncodedFrame, Encoder, EncoderFactory, FrameBuffer};
use framecast_events::{Codec, CodecOptions};

use crate::buffers::TripleBuffer;
use crate::client::{Client, ClientId};
use crate::error::EngineError;
use crate::metrics::{PipelineMetrics, PipelineStats};
use crate::wait::{WaitStrategy, Wakeup};
use crate::EngineResult;

/// Snapshot of one live encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderInfo {
    pub codec: Codec,
    pub name: &'static str,
    pub options: CodecOptions,
    pub clients: usize,

    /// How long the encoder has had no clients, if it has none.
    pub idle_for: Option<Duration>,
}

struct Shared {
    buffers: TripleBuffer,
    factories: RwLock<HashMap<Codec, Arc<dyn EncoderFactory>>>,
    workers: Mutex<Vec<Arc<EncoderWorker>>>,
    metrics: PipelineMetrics,
    pushed: Wakeup,
    published: Wakeup,
    should_stop: AtomicBool,
}

/// Owns the frame buffers, the codec registry and one thread per encoder.
///
/// [`push_frame`](Self::push_frame) never waits for encoding. A swap thread
/// publishes the newest pushed frame and every encoder thread encodes each
/// published frame at most once, so under overload frames are dropped rather
/// than queued.
pub struct EncodingPipeline {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl EncodingPipeline {
    /// Create a pipeline and start its swap thread.
    #[instrument(name = "pipeline_new", skip_all)]
    pub fn new(strategy: WaitStrategy) -> EngineResult<Self> {
        let shared = Arc::new(Shared {
            buffers: TripleBuffer::new(),
            factories: RwLock::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
            metrics: PipelineMetrics::new(),
            pushed: Wakeup::new(strategy),
            published: Wakeup::new(strategy),
            should_stop: AtomicBool::new(false),
        });

        let swap_shared = Arc::clone(&shared);
        let swap_thread = spawn("frame-swap", move || swap_loop(swap_shared))?;
        debug!(?strategy, "Encoding pipeline started");

        Ok(Self {
            shared,
            threads: Mutex::new(vec![swap_thread]),
        })
    }

    /// Make `codec` available. Each codec takes exactly one factory.
    pub fn register_encoder_factory(&self, factory: Arc<dyn EncoderFactory>) -> EngineResult<()> {
        let codec = factory.codec();
        let mut factories = self.shared.factories.write();
        if factories.contains_key(&codec) {
            return Err(EngineError::FactoryAlreadyRegistered(codec));
        }

        factories.insert(codec, factory);
        info!(%codec, "Registered encoder factory");
        Ok(())
    }

    /// Codecs with a registered factory.
    pub fn codecs(&self) -> Vec<Codec> {
        let mut codecs: Vec<_> = self.shared.factories.read().keys().copied().collect();
        codecs.sort();
        codecs
    }

    /// Attach `client` to an encoder producing `codec` with `options`.
    ///
    /// Reuses a running encoder of the same codec whose options are
    /// compatible; otherwise creates one through the codec's factory and
    /// starts its thread. On error nothing is registered.
    #[instrument(name = "register_client", skip_all, fields(client = %client.id(), codec = %codec))]
    pub fn register_client(
        &self,
        client: &Arc<dyn Client>,
        codec: Codec,
        options: &CodecOptions,
    ) -> EngineResult<()> {
        let mut workers = self.shared.workers.lock();

        if let Some(worker) = workers
            .iter()
            .find(|worker| worker.codec == codec && worker.is_compatible(options))
        {
            worker.register(client);
            debug!(encoder = worker.name, "Joined existing encoder");
            return Ok(());
        }

        let factory = self
            .shared
            .factories
            .read()
            .get(&codec)
            .cloned()
            .ok_or(EngineError::NoFactory(codec))?;

        let encoder = factory.create_encoder(options)?;
        let worker = Arc::new(EncoderWorker::new(encoder));
        worker.register(client);

        let shared = Arc::clone(&self.shared);
        let thread_worker = Arc::clone(&worker);
        let handle = spawn(&format!("encoder-{}", codec.name()), move || {
            encoder_loop(shared, thread_worker)
        })?;

        info!(
            encoder = worker.name,
            options = %worker.options,
            encoders = workers.len() + 1,
            "Started encoder"
        );
        workers.push(worker);
        self.threads.lock().push(handle);
        Ok(())
    }

    /// Detach `client` from every encoder. Does nothing if it is not attached.
    pub fn deregister_client(&self, client: ClientId) {
        for worker in self.shared.workers.lock().iter() {
            if worker.deregister(client) {
                debug!(%client, encoder = worker.name, "Left encoder");
            }
        }
    }

    /// Copy a frame in for encoding.
    ///
    /// `data` holds `height` rows of `width` RGB pixels, each row padded to a
    /// multiple of 4 bytes. With `flip_vertically` the rows are given
    /// bottom-up. A buffer of the wrong size is rejected before anything is
    /// copied. Dimensions whose byte size overflows `usize` are reported
    /// as expecting `usize::MAX` bytes.
    pub fn push_frame(
        &self,
        width: u32,
        height: u32,
        data: &[u8],
        flip_vertically: bool,
    ) -> EngineResult<()> {
        let expected = FrameBuffer::size_for(width, height);
        if expected != Some(data.len()) {
            return Err(EngineError::FrameSizeMismatch {
                expected: expected.unwrap_or(usize::MAX),
                actual: data.len(),
            });
        }

        let generation = self
            .shared
            .buffers
            .push(width, height, data, flip_vertically)?;
        self.shared.metrics.record_push();
        self.shared.pushed.notify();

        trace!(generation, width, height, "Frame pushed");
        Ok(())
    }

    /// Running encoders.
    pub fn encoders(&self) -> Vec<EncoderInfo> {
        self.shared
            .workers
            .lock()
            .iter()
            .map(|worker| worker.info())
            .collect()
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.metrics.snapshot()
    }
}

impl Drop for EncodingPipeline {
    fn drop(&mut self) {
        self.shared.should_stop.store(true, Ordering::Release);
        self.shared.pushed.notify();
        self.shared.published.notify();

        for handle in self.threads.lock().drain(..) {
            let _ = handle.join();
        }
        debug!("Encoding pipeline stopped");
    }
}

fn spawn<F>(name: &str, body: F) -> EngineResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|source| EngineError::ThreadSpawn {
            name: name.to_string(),
            source,
        })
}

fn swap_loop(shared: Arc<Shared>) {
    loop {
        let seen = shared.pushed.epoch();
        if shared.should_stop.load(Ordering::Acquire) {
            break;
        }

        match shared.buffers.swap() {
            Some(swapped) => {
                shared.metrics.record_publish(swapped.dropped);
                shared.published.notify();
                if swapped.dropped > 0 {
                    trace!(dropped = swapped.dropped, "Frames overwritten before publish");
                }
            }
            None => shared.pushed.wait(seen),
        }
    }
}

fn encoder_loop(shared: Arc<Shared>, worker: Arc<EncoderWorker>) {
    let mut last_generation = 0;

    loop {
        let seen = shared.published.epoch();
        if shared.should_stop.load(Ordering::Acquire) {
            break;
        }

        if shared.buffers.published_generation() == last_generation {
            shared.published.wait(seen);
            continue;
        }

        last_generation = worker.encode_published(&shared, last_generation);
    }

    debug!(encoder = worker.name, "Encoder thread exiting");
}

struct ClientList {
    entries: Vec<(ClientId, Weak<dyn Client>)>,
    has_new_client: bool,
    idle_since: Option<Instant>,
}

impl ClientList {
    fn any_active(&self) -> bool {
        self.entries
            .iter()
            .filter_map(|(_, client)| client.upgrade())
            .any(|client| client.core().is_active())
    }
}

/// One encoder, the clients it serves and the state its thread needs.
///
/// The encoder mutex is held for a whole encode. Anything the register path
/// needs is copied out at creation so it never waits on that mutex.
struct EncoderWorker {
    codec: Codec,
    name: &'static str,
    options: CodecOptions,
    compatibility: CompatibilityCheck,
    encoder: Mutex<Box<dyn Encoder>>,
    clients: Mutex<ClientList>,
}

impl EncoderWorker {
    fn new(encoder: Box<dyn Encoder>) -> Self {
        Self {
            codec: encoder.codec(),
            name: encoder.name(),
            options: encoder.options().clone(),
            compatibility: encoder.compatibility(),
            encoder: Mutex::new(encoder),
            clients: Mutex::new(ClientList {
                entries: Vec::new(),
                has_new_client: false,
                idle_since: Some(Instant::now()),
            }),
        }
    }

    fn is_compatible(&self, options: &CodecOptions) -> bool {
        (self.compatibility)(options)
    }

    /// Every registration asks for a keyframe so the newcomer can start decoding.
    fn register(&self, client: &Arc<dyn Client>) {
        let id = client.id();
        let mut clients = self.clients.lock();
        if !clients.entries.iter().any(|(entry, _)| *entry == id) {
            clients.entries.push((id, Arc::downgrade(client)));
        }
        clients.has_new_client = true;
        clients.idle_since = None;
    }

    fn deregister(&self, client: ClientId) -> bool {
        let mut clients = self.clients.lock();
        let before = clients.entries.len();
        clients.entries.retain(|(id, _)| *id != client);
        let removed = clients.entries.len() != before;

        if clients.entries.is_empty() && clients.idle_since.is_none() {
            clients.idle_since = Some(Instant::now());
        }
        removed
    }

    /// Encode the published frame and fan it out. Returns the generation
    /// that was handled.
    fn encode_published(&self, shared: &Shared, last_generation: u64) -> u64 {
        let force_keyframe = {
            let mut clients = self.clients.lock();
            if !clients.any_active() {
                return shared.buffers.published_generation();
            }
            std::mem::take(&mut clients.has_new_client)
        };

        let mut encoder = self.encoder.lock();
        let frame = shared.buffers.read();
        let generation = frame.generation();
        if generation == last_generation {
            if force_keyframe {
                self.clients.lock().has_new_client = true;
            }
            return generation;
        }

        let (width, height) = (frame.buffer().width(), frame.buffer().height());
        let result = encoder.encode_frame(frame.buffer(), force_keyframe);
        drop(frame);

        let encoded = match result {
            Ok(encoded) => {
                shared.metrics.record_encode(encoded.len());
                encoded
            }
            Err(e) => {
                warn!(encoder = self.name, generation, error = %e, "Encoding failed");
                shared.metrics.record_encode_failure();
                if force_keyframe {
                    self.clients.lock().has_new_client = true;
                }
                EncodedFrame::empty(width, height)
            }
        };

        trace!(encoder = self.name, generation, bytes = encoded.len(), "Fanning out frame");
        let clients = self.clients.lock();
        for (_, client) in &clients.entries {
            if let Some(client) = client.upgrade() {
                client.push_frame(&encoded);
            }
        }

        generation
    }

    fn info(&self) -> EncoderInfo {
        let clients = self.clients.lock();
        EncoderInfo {
            codec: self.codec,
            name: self.name,
            options: self.options.clone(),
            clients: clients.entries.len(),
            idle_for: clients.idle_since.map(|since| since.elapsed()),
        }
    }
}
