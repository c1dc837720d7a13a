//! Platform playback device layer
//!
//! Thin wrapper over cpal that opens the default output device at the fixed
//! engine period and registers the real-time pull callback. The callback owns
//! an `Arc` of the shared stream state captured in its closure; there is no
//! global instance and no raw user-data pointer anywhere.
//!
//! Underrun policy: the engine's `pull` leaves the output untouched when the
//! ring is empty, so this layer fills whatever `pull` did not write with the
//! format's silence byte — cpal hands us a buffer that must not be left with
//! stale data.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BufferSize, SizedSample, StreamConfig};
use crossbeam_channel::Sender;
use std::sync::Arc;

use crate::constants::DEVICE_PERIOD_MS;
use crate::error::{Error, OpenError};
use crate::format::{SampleFormat, StreamFormat};
use crate::playback::StreamShared;

/// Whether a default output device is present at all
pub fn have_output_device() -> bool {
    cpal::default_host().default_output_device().is_some()
}

/// Build (but do not start) a playback stream on the default output device.
///
/// The stream pulls from `shared` on every device period and reports
/// asynchronous stream errors over `error_tx` without blocking.
pub(crate) fn build_playback_stream(
    format: &StreamFormat,
    shared: Arc<StreamShared>,
    error_tx: Sender<Error>,
) -> Result<cpal::Stream, OpenError> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or(OpenError::NoOutputDevice)?;

    let period_frames = format.frames_for_millis(DEVICE_PERIOD_MS) as cpal::FrameCount;
    let config = StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: BufferSize::Fixed(period_frames),
    };

    let silence = format.sample_format.silence_byte();
    match format.sample_format {
        SampleFormat::U8 => build_stream_for::<u8>(&device, &config, silence, shared, error_tx),
        SampleFormat::S8 => build_stream_for::<i8>(&device, &config, silence, shared, error_tx),
        SampleFormat::U16 => build_stream_for::<u16>(&device, &config, silence, shared, error_tx),
        SampleFormat::S16 => build_stream_for::<i16>(&device, &config, silence, shared, error_tx),
        SampleFormat::U32 => build_stream_for::<u32>(&device, &config, silence, shared, error_tx),
        SampleFormat::S32 => build_stream_for::<i32>(&device, &config, silence, shared, error_tx),
    }
}

/// Build an output stream for one concrete sample type.
///
/// The engine is byte-oriented, so the typed cpal buffer is reinterpreted as
/// its raw bytes before handing it to `pull`. The callback does no allocation
/// and takes no lock.
fn build_stream_for<T: SizedSample + 'static>(
    device: &cpal::Device,
    config: &StreamConfig,
    silence: u8,
    shared: Arc<StreamShared>,
    error_tx: Sender<Error>,
) -> Result<cpal::Stream, OpenError> {
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Safety: T is a plain PCM sample type; viewing its buffer as
                // bytes is exact and alignment only ever decreases.
                let bytes = unsafe {
                    std::slice::from_raw_parts_mut(
                        data.as_mut_ptr() as *mut u8,
                        std::mem::size_of_val(data),
                    )
                };
                let filled = shared.pull(bytes);
                bytes[filled..].fill(silence);
            },
            move |err| {
                let _ = error_tx.try_send(Error::Stream(err.to_string()));
            },
            None,
        )
        .map_err(|e| OpenError::DeviceInit(e.to_string()))
}
