//! Jitter-buffered playback controller
//!
//! `AudioPlayback` owns the ring buffer and the device stream for one
//! playback session. The session client feeds it decoded PCM bytes from its
//! delivery thread; the device pulls on its own real-time thread. The
//! controller sizes the ring from the configured maximum network jitter,
//! injects a short silence pre-roll when streaming starts, and sheds input
//! under sustained overrun instead of letting latency grow.

use cpal::traits::StreamTrait;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::buffer::RingBuffer;
use crate::config::PlaybackConfig;
use crate::constants::{
    ERROR_CHANNEL_CAPACITY, JITTER_SIZING_FACTOR, MAX_NETWORK_JITTER_MS, OVERRUN_SHED_PERIODS,
    PREROLL_SILENCE_MS,
};
use crate::device;
use crate::error::{Error, OpenError};
use crate::format::StreamFormat;

/// Drop/underrun counters for one open session.
///
/// Purely observational: overrun drops and underruns are normal operating
/// conditions for this engine, never errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackStats {
    /// Payload bytes discarded by the overrun guard or buffer truncation
    pub bytes_dropped: usize,
    /// `add_samples` calls shed whole by the overrun guard
    pub sheds: usize,
    /// Device pulls that found the buffer empty
    pub underruns: usize,
}

/// State shared between the producer thread and the device callback.
///
/// Everything in here is wait-free. The ring carries the audio bytes; the
/// counters are relaxed atomics safe to bump from the real-time path.
pub(crate) struct StreamShared {
    ring: RingBuffer,
    frame_bytes: usize,
    silence: u8,

    /// Byte size of the most recent device pull, sizing the overrun guard.
    /// Zero until the first pull; the guard is inactive until then so the
    /// pre-roll and first real samples are never shed at startup.
    last_pull_bytes: AtomicUsize,

    bytes_dropped: AtomicUsize,
    sheds: AtomicUsize,
    underruns: AtomicUsize,
}

impl StreamShared {
    fn new(ring: RingBuffer, format: &StreamFormat) -> Self {
        Self {
            ring,
            frame_bytes: format.frame_bytes(),
            silence: format.sample_format.silence_byte(),
            last_pull_bytes: AtomicUsize::new(0),
            bytes_dropped: AtomicUsize::new(0),
            sheds: AtomicUsize::new(0),
            underruns: AtomicUsize::new(0),
        }
    }

    /// Producer side: queue decoded PCM bytes.
    ///
    /// Always reports the full input length as accepted. If more than
    /// `OVERRUN_SHED_PERIODS` device periods of audio are already queued the
    /// whole call is shed; otherwise whatever exceeds the ring's free space
    /// is dropped. Continuity beats completeness here: a dropped network
    /// burst glitches once, unbounded queueing lags the whole session.
    fn add_samples(&self, data: &[u8]) -> usize {
        let last_pull = self.last_pull_bytes.load(Ordering::Relaxed);
        if last_pull != 0 && self.ring.unsubmitted_bytes() > OVERRUN_SHED_PERIODS * last_pull {
            self.sheds.fetch_add(1, Ordering::Relaxed);
            self.bytes_dropped.fetch_add(data.len(), Ordering::Relaxed);
            return data.len();
        }

        let written = self.ring.write(data);
        if written < data.len() {
            self.bytes_dropped
                .fetch_add(data.len() - written, Ordering::Relaxed);
        }
        data.len()
    }

    /// Producer side: queue `frames` frames of silence.
    fn add_silent_frames(&self, frames: usize) -> usize {
        self.ring.write_silence(frames * self.frame_bytes, self.silence) / self.frame_bytes
    }

    /// Consumer side: fill `out` from the ring, invoked by the device
    /// callback on every period.
    ///
    /// Returns the number of bytes written. When the ring is empty this
    /// returns 0 immediately and leaves `out` untouched; silence fill on
    /// starvation is the device layer's job. Wait-free, no allocation.
    pub(crate) fn pull(&self, out: &mut [u8]) -> usize {
        if self.ring.is_empty() {
            self.underruns.fetch_add(1, Ordering::Relaxed);
            return 0;
        }
        self.last_pull_bytes.store(out.len(), Ordering::Relaxed);
        self.ring.read(out)
    }

    fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            sheds: self.sheds.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}

/// Resources that exist only while the engine is open
struct OpenState {
    shared: Arc<StreamShared>,
    /// Dropping the stream stops the device callback before the shared
    /// state (and the ring storage inside it) can go away.
    stream: cpal::Stream,
    error_rx: Receiver<Error>,
}

/// Playback engine for one remote-session audio stream
///
/// Lifecycle: `Unopened → Open → Unopened` via [`open`](Self::open) and
/// [`close`](Self::close). Within `Open`, priming versus streaming is implied
/// by buffer occupancy; there is no explicit sub-state.
pub struct AudioPlayback {
    format: StreamFormat,
    max_jitter_ms: u32,
    extra_delay_ms: u32,
    available: bool,
    open_state: Option<OpenState>,
}

impl AudioPlayback {
    /// Create an engine for the given fixed session format.
    ///
    /// Probes for a default output device once; the result is reported by
    /// [`is_available`](Self::is_available) for the engine's lifetime.
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            max_jitter_ms: MAX_NETWORK_JITTER_MS,
            extra_delay_ms: 0,
            available: device::have_output_device(),
            open_state: None,
        }
    }

    /// Create an engine from a configuration
    pub fn from_config(config: &PlaybackConfig) -> Self {
        let mut engine = Self::new(config.stream_format());
        engine.max_jitter_ms = config.max_jitter_ms;
        engine.extra_delay_ms = config.extra_delay_ms;
        engine
    }

    /// Additional pre-roll delay added to the base silence pad on stream
    /// start. Takes effect on the next `on_stream_start`.
    pub fn set_extra_delay_ms(&mut self, millis: u32) {
        self.extra_delay_ms = millis;
    }

    /// Allocate the jitter buffer and start the playback device.
    ///
    /// All-or-nothing: on any failure no state is retained and `open` may be
    /// retried. Calling `open` on an already-open engine fails with
    /// [`OpenError::AlreadyOpen`].
    pub fn open(&mut self) -> Result<(), OpenError> {
        if self.open_state.is_some() {
            return Err(OpenError::AlreadyOpen);
        }
        if !self.available {
            return Err(OpenError::NoOutputDevice);
        }

        // Four jitter windows of audio, rounded up to a power of two in
        // frames and again in bytes so the ring mask holds for any frame
        // size.
        let jitter_frames = (JITTER_SIZING_FACTOR as usize)
            .checked_mul(self.max_jitter_ms as usize)
            .and_then(|n| n.checked_mul(self.format.sample_rate as usize))
            .map(|n| n / 1000)
            .ok_or(OpenError::CapacityOverflow)?;
        let min_bytes = jitter_frames
            .next_power_of_two()
            .checked_mul(self.format.frame_bytes())
            .ok_or(OpenError::CapacityOverflow)?;

        let shared = Arc::new(StreamShared::new(
            RingBuffer::with_min_len(min_bytes),
            &self.format,
        ));

        let (error_tx, error_rx) = bounded::<Error>(ERROR_CHANNEL_CAPACITY);
        let stream = device::build_playback_stream(&self.format, shared.clone(), error_tx)?;
        stream
            .play()
            .map_err(|e| OpenError::DeviceStart(e.to_string()))?;

        tracing::info!(
            sample_rate = self.format.sample_rate,
            channels = self.format.channels,
            buffer_bytes = shared.ring.capacity(),
            max_jitter_ms = self.max_jitter_ms,
            "playback engine opened"
        );

        self.open_state = Some(OpenState {
            shared,
            stream,
            error_rx,
        });
        Ok(())
    }

    /// Stop the playback device and release the jitter buffer.
    ///
    /// Safe to call on a never-opened or already-closed engine. The device
    /// stream is torn down before the buffer storage can be freed, so no
    /// in-flight pull ever touches released memory.
    pub fn close(&mut self) {
        if let Some(state) = self.open_state.take() {
            // Stop the callback first; the ring is freed when the last Arc
            // (held by the callback closure) goes away with the stream.
            drop(state.stream);
            tracing::info!(stats = ?state.shared.stats(), "playback engine closed");
        }
    }

    /// Notification that network audio delivery has begun.
    ///
    /// Queues `PREROLL_SILENCE_MS + extra_delay_ms` worth of silence ahead of
    /// the first real samples so the first device periods have something to
    /// consume while the network pipeline ramps up. No-op when closed.
    pub fn on_stream_start(&mut self) {
        if let Some(state) = &self.open_state {
            let frames = self
                .format
                .frames_for_millis(PREROLL_SILENCE_MS + self.extra_delay_ms);
            let queued = state.shared.add_silent_frames(frames);
            tracing::debug!(frames = queued, "queued stream-start pre-roll");
        }
    }

    /// Notification that network audio delivery has stopped.
    ///
    /// Remaining queued audio drains naturally through the device; nothing
    /// is discarded.
    pub fn on_stream_stop(&mut self) {
        if self.open_state.is_some() {
            tracing::debug!("stream stopped, draining remaining audio");
        }
    }

    /// Queue decoded PCM bytes for playback (producer thread only).
    ///
    /// Always returns `data.len()`: overrun shedding is invisible to the
    /// caller by design, and a closed engine swallows input the same way.
    pub fn add_samples(&self, data: &[u8]) -> usize {
        match &self.open_state {
            Some(state) => state.shared.add_samples(data),
            None => data.len(),
        }
    }

    /// Queue `frames` frames of silence (producer thread only).
    /// No-op when closed.
    pub fn add_silent_samples(&self, frames: usize) {
        if let Some(state) = &self.open_state {
            state.shared.add_silent_frames(frames);
        }
    }

    /// Whether a playback device was present when the engine was created
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Whether the buffer is allocated and the device is pulling
    pub fn is_open(&self) -> bool {
        self.open_state.is_some()
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn sample_format(&self) -> crate::format::SampleFormat {
        self.format.sample_format
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    /// Bytes per frame of the session format
    pub fn sample_size(&self) -> usize {
        self.format.frame_bytes()
    }

    /// Drop/underrun counters for the current open session.
    /// Zeroed by `close`/`open`.
    pub fn stats(&self) -> PlaybackStats {
        self.open_state
            .as_ref()
            .map(|s| s.shared.stats())
            .unwrap_or_default()
    }

    /// Buffer occupancy as a fraction of capacity, for monitoring.
    /// Zero when closed.
    pub fn fill_level(&self) -> f32 {
        self.open_state
            .as_ref()
            .map(|s| s.shared.ring.fill_level())
            .unwrap_or(0.0)
    }

    /// Asynchronous stream errors reported by the device since the last call
    pub fn check_errors(&self) -> Option<Error> {
        self.open_state
            .as_ref()
            .and_then(|s| s.error_rx.try_recv().ok())
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.close();
    }
}
