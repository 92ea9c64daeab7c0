//! Live frame distribution to many clients with per-client codecs.
//!
//! A producer pushes raster frames into the [`EncodingPipeline`], which hands
//! the newest frame to one thread per running encoder through a triple
//! buffer. Connected [`Client`]s live in a [`ClientSet`], whose tick merges
//! their control and input events, moves them between encoders and removes
//! the dead. [`Streamer`] wires both together from a [`StreamerConfig`].

mod buffers;
mod channel_client;
mod client;
mod client_set;
mod config;
mod encoding_pipeline;
mod error;
mod input;
mod metrics;
mod stream_config;
mod streamer;
mod wait;

pub use buffers::{PublishedFrame, Swapped, TripleBuffer};
pub use channel_client::{ChannelClient, ClientOutput};
pub use client::{Client, ClientCore, ClientEvent, ClientId, CodecRequest};
pub use client_set::{ClientSet, TickReport};
pub use config::{CodecsConfig, H264Config, StreamerConfig, CONFIG_FILE_NAME};
pub use encoding_pipeline::{EncoderInfo, EncodingPipeline};
pub use error::EngineError;
pub use input::{
    AsynchronousInputProcessor, InputHandler, InputProcessor, SynchronousInputProcessor,
    INPUT_QUEUE_CAPACITY,
};
pub use metrics::{PipelineMetrics, PipelineStats};
pub use stream_config::StreamConfig;
pub use streamer::Streamer;
pub use wait::{WaitStrategy, Wakeup};

pub use framecast_encoder as encoder;
pub use framecast_events as events;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
