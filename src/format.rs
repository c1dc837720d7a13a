//! PCM stream format description
//!
//! The session negotiates one fixed format up front; everything downstream of
//! the decoder treats samples as opaque bytes, so the only things the engine
//! needs from the format are the frame size and the silence fill value.

use serde::{Deserialize, Serialize};

/// PCM sample format of the decoded session audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
}

impl SampleFormat {
    /// Size of one sample of this format in bytes
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::S8 => 1,
            SampleFormat::U16 | SampleFormat::S16 => 2,
            SampleFormat::U32 | SampleFormat::S32 => 4,
        }
    }

    /// Byte value that renders as silence when repeated across a sample.
    ///
    /// 0x80 is the unsigned 8-bit midpoint. Wider unsigned formats have no
    /// single-byte midpoint representation, so they get zero like the signed
    /// formats.
    pub fn silence_byte(self) -> u8 {
        match self {
            SampleFormat::U8 => 0x80,
            _ => 0x00,
        }
    }

}

/// Fixed output format of one playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
}

impl StreamFormat {
    pub fn new(sample_format: SampleFormat, channels: u16, sample_rate: u32) -> Self {
        Self {
            sample_format,
            channels,
            sample_rate,
        }
    }

    /// Bytes per frame (one sample per channel at a single instant)
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    /// Number of frames covering `millis` milliseconds of audio
    pub fn frames_for_millis(&self, millis: u32) -> usize {
        (millis as usize * self.sample_rate as usize) / 1000
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_format: SampleFormat::S16,
            channels: crate::constants::DEFAULT_CHANNELS,
            sample_rate: crate::constants::DEFAULT_SAMPLE_RATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bytes() {
        let stereo_s16 = StreamFormat::new(SampleFormat::S16, 2, 22050);
        assert_eq!(stereo_s16.frame_bytes(), 4);

        let mono_u8 = StreamFormat::new(SampleFormat::U8, 1, 8000);
        assert_eq!(mono_u8.frame_bytes(), 1);

        let quad_s32 = StreamFormat::new(SampleFormat::S32, 4, 48000);
        assert_eq!(quad_s32.frame_bytes(), 16);
    }

    #[test]
    fn test_frames_for_millis() {
        let fmt = StreamFormat::new(SampleFormat::S16, 2, 22050);
        // 20 ms at 22050 Hz
        assert_eq!(fmt.frames_for_millis(20), 441);
        assert_eq!(fmt.frames_for_millis(0), 0);
        assert_eq!(fmt.frames_for_millis(1000), 22050);
    }

    #[test]
    fn test_silence_byte() {
        assert_eq!(SampleFormat::U8.silence_byte(), 0x80);
        assert_eq!(SampleFormat::S16.silence_byte(), 0x00);
        assert_eq!(SampleFormat::U16.silence_byte(), 0x00);
    }
}
