//! # Remote Audio Playback
//!
//! Jitter-buffered playback engine for decoded remote-session audio.
//!
//! A remote-session client hands this crate raw PCM bytes as they arrive off
//! the network; the engine absorbs the irregular delivery timing in a
//! power-of-two ring buffer and feeds a hardware playback stream at a fixed
//! period, never blocking and never allocating on the real-time path.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────┐        ┌─────────────────────────────┐
//! │ Session client   │        │ AudioPlayback               │
//! │ (decoder thread) │        │                             │
//! │                  │ add_   │  ┌───────────────────────┐  │
//! │  decoded PCM ────┼───────►│  │ RingBuffer (SPSC,     │  │
//! │  stream start ───┼─samples│  │ power-of-two bytes)   │  │
//! │  /stop notify    │        │  └──────────┬────────────┘  │
//! └──────────────────┘        │             │ pull          │
//!                             │  ┌──────────▼────────────┐  │
//!                             │  │ cpal output stream    │  │
//!                             │  │ (20 ms period)        │  │
//!                             │  └──────────┬────────────┘  │
//!                             └─────────────┼───────────────┘
//!                                           ▼
//!                                     audio hardware
//! ```
//!
//! The producer side (`add_samples`, stream start/stop notifications) runs on
//! whatever thread the session client delivers audio from. The consumer side
//! is the device's real-time callback. The two meet only in the lock-free
//! ring buffer; there is no mutex anywhere on the audio path.

pub mod buffer;
pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod playback;

pub use buffer::RingBuffer;
pub use config::PlaybackConfig;
pub use error::{Error, OpenError, Result};
pub use format::{SampleFormat, StreamFormat};
pub use playback::{AudioPlayback, PlaybackStats};

/// Engine-wide constants
pub mod constants {
    /// Default maximum expected network jitter in milliseconds.
    ///
    /// The ring buffer is sized to hold several times this much audio so a
    /// delivery stall of up to this length never starves the device.
    pub const MAX_NETWORK_JITTER_MS: u32 = 1000;

    /// Sizing factor applied to the jitter window when computing the
    /// ring buffer capacity.
    pub const JITTER_SIZING_FACTOR: u32 = 4;

    /// Fixed playback device period in milliseconds.
    pub const DEVICE_PERIOD_MS: u32 = 20;

    /// Base silence pre-roll injected on stream start, in milliseconds.
    /// `PlaybackConfig::extra_delay_ms` is added on top.
    pub const PREROLL_SILENCE_MS: u32 = 20;

    /// Number of device periods of queued audio beyond which `add_samples`
    /// sheds its input instead of growing latency.
    pub const OVERRUN_SHED_PERIODS: usize = 5;

    /// Default session sample rate
    pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Capacity of the stream-error channel between the device callback
    /// thread and `check_errors`
    pub const ERROR_CHANNEL_CAPACITY: usize = 16;
}
