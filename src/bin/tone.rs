//! Tone Demo
//!
//! Stands in for the remote-session collaborator: generates a 440 Hz stereo
//! tone in 10 ms bursts with deliberately uneven delivery timing and feeds it
//! through the playback engine's boundary API for a few seconds.

use anyhow::Result;
use std::f32::consts::TAU;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remote_audio_playback::{AudioPlayback, PlaybackConfig};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match PlaybackConfig::default_path() {
        Some(path) => PlaybackConfig::load(&path)?,
        None => PlaybackConfig::default(),
    };

    let mut engine = AudioPlayback::from_config(&config);
    if !engine.is_available() {
        anyhow::bail!("no playback device available");
    }

    engine.open()?;
    engine.on_stream_start();

    let sample_rate = engine.sample_rate();
    let channels = engine.channels() as usize;
    let burst_frames = (sample_rate / 100) as usize; // 10 ms per burst
    let mut phase: f32 = 0.0;
    let step = 440.0 * TAU / sample_rate as f32;

    tracing::info!(sample_rate, channels, "streaming 3 seconds of tone");

    let bursts = 300;
    let mut bytes = Vec::with_capacity(burst_frames * channels * 2);
    for i in 0..bursts {
        bytes.clear();
        for _ in 0..burst_frames {
            let sample = (phase.sin() * 0.25 * i16::MAX as f32) as i16;
            phase = (phase + step) % TAU;
            for _ in 0..channels {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
        }
        engine.add_samples(&bytes);

        if let Some(err) = engine.check_errors() {
            tracing::warn!(%err, "stream error");
        }
        if i % 100 == 0 {
            tracing::info!(fill = engine.fill_level(), stats = ?engine.stats(), "buffer");
        }

        // Uneven pacing: every eighth burst arrives late, like a network
        // delivery stall the jitter buffer has to ride out.
        let pause = if i % 8 == 7 { 35 } else { 7 };
        std::thread::sleep(Duration::from_millis(pause));
    }

    engine.on_stream_stop();
    // Let the queued tail drain before tearing the device down.
    std::thread::sleep(Duration::from_millis(200));
    tracing::info!(stats = ?engine.stats(), "done");
    engine.close();

    Ok(())
}
