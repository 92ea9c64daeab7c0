//! Top-level entry point wiring the pipeline, the clients and the codecs together.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, instrument};

use framecast_encoder::{EncoderFactory, RawEncoderFactory};

use crate::client::Client;
use crate::client_set::ClientSet;
use crate::config::StreamerConfig;
use crate::encoding_pipeline::{EncoderInfo, EncodingPipeline};
use crate::input::InputProcessor;
use crate::metrics::PipelineStats;
use crate::stream_config::StreamConfig;
use crate::EngineResult;

/// A running streamer.
///
/// Owns the encoding pipeline and the client set; dropping it stops all
/// pipeline threads.
pub struct Streamer {
    config: StreamerConfig,
    stream_config: RwLock<StreamConfig>,
    // Declared before `pipeline` so the tick loop stops first.
    clients: ClientSet,
    pipeline: Arc<EncodingPipeline>,
}

impl Streamer {
    /// Build a streamer with the built-in codecs and start its threads.
    #[instrument(name = "streamer_new", skip_all)]
    pub fn new(config: StreamerConfig) -> EngineResult<Self> {
        let pipeline = Arc::new(EncodingPipeline::new(config.scheduling)?);
        let clients = ClientSet::new(Arc::clone(&pipeline), config.scheduling);

        let streamer = Self {
            config,
            stream_config: RwLock::new(StreamConfig::default()),
            clients,
            pipeline,
        };

        streamer.register_encoder_factory(Arc::new(RawEncoderFactory))?;
        streamer.register_builtin_h264()?;
        streamer.clients.start()?;

        info!(codecs = ?streamer.pipeline.codecs(), "Streamer started");
        Ok(streamer)
    }

    #[cfg(feature = "x264")]
    fn register_builtin_h264(&self) -> EngineResult<()> {
        let h264 = &self.config.codecs.h264;
        if !h264.enabled {
            return Ok(());
        }
        self.register_encoder_factory(Arc::new(framecast_encoder::H264EncoderFactory::new(
            h264.bitrate_kbps,
            h264.display_modes.clone(),
        )))
    }

    #[cfg(not(feature = "x264"))]
    fn register_builtin_h264(&self) -> EngineResult<()> {
        if self.config.codecs.h264.enabled {
            tracing::debug!("H.264 requested but built without the x264 feature");
        }
        Ok(())
    }

    /// Add a codec and tell connected clients about it.
    pub fn register_encoder_factory(&self, factory: Arc<dyn EncoderFactory>) -> EngineResult<()> {
        let codec = factory.codec();
        let capabilities = factory.capabilities();
        self.pipeline.register_encoder_factory(factory)?;
        self.stream_config.write().set_codec(codec, capabilities);
        self.clients.on_stream_config_changed();
        Ok(())
    }

    /// Route token-holder input to `processor`, returning the previous processor.
    pub fn register_input_processor(
        &self,
        processor: Arc<dyn InputProcessor>,
    ) -> Option<Arc<dyn InputProcessor>> {
        self.clients.set_input_processor(Some(processor))
    }

    /// Stop forwarding input, returning the processor that was removed.
    pub fn deregister_input_processor(&self) -> Option<Arc<dyn InputProcessor>> {
        self.clients.set_input_processor(None)
    }

    /// Hand a rendered frame to the pipeline. See [`EncodingPipeline::push_frame`].
    pub fn push_frame(
        &self,
        width: u32,
        height: u32,
        data: &[u8],
        flip_vertically: bool,
    ) -> EngineResult<()> {
        self.pipeline.push_frame(width, height, data, flip_vertically)
    }

    /// Take ownership of a newly connected client.
    pub fn insert_client(&self, client: Arc<dyn Client>) {
        self.clients.insert(client);
    }

    pub fn stream_config(&self) -> StreamConfig {
        self.stream_config.read().clone()
    }

    pub fn stream_config_json(&self) -> EngineResult<String> {
        self.stream_config.read().to_json()
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    pub fn clients(&self) -> &ClientSet {
        &self.clients
    }

    pub fn pipeline(&self) -> &Arc<EncodingPipeline> {
        &self.pipeline
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    pub fn encoders(&self) -> Vec<EncoderInfo> {
        self.pipeline.encoders()
    }
}
