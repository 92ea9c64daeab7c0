//! Error types for the streaming engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use framecast_encoder::EncoderError;
use framecast_events::Codec;

/// Errors that can occur in the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A second factory was offered for a codec that already has one.
    #[error("encoder factory already registered for {0}")]
    FactoryAlreadyRegistered(Codec),

    /// No factory serves the requested codec.
    #[error("no encoder factory registered for {0}")]
    NoFactory(Codec),

    /// The factory rejected the requested options.
    #[error(transparent)]
    Encoder(#[from] EncoderError),

    /// Pushed pixel data does not match the declared frame geometry.
    ///
    /// `expected` is `usize::MAX` when the geometry itself overflows.
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },

    /// Configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration JSON is malformed.
    #[error("configuration JSON error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: io::Error,
    },
}
