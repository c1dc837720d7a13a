//! Error types for the playback engine

use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("open failed: {0}")]
    Open(#[from] OpenError),

    #[error("playback stream error: {0}")]
    Stream(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by `AudioPlayback::open`
///
/// All variants are fatal to that `open` call; no partial state is retained
/// and a later `open` may be attempted again.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("engine is already open")]
    AlreadyOpen,

    #[error("no default output device")]
    NoOutputDevice,

    #[error("jitter buffer capacity overflows usize")]
    CapacityOverflow,

    #[error("failed to build output stream: {0}")]
    DeviceInit(String),

    #[error("failed to start output stream: {0}")]
    DeviceStart(String),
}

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;
