use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sample representation inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// 32-bit IEEE float, nominal range [-1.0, 1.0].
    F32,
    /// 16-bit signed little-endian PCM.
    I16,
    /// 24-bit signed little-endian PCM, packed in 3 bytes.
    I24,
    /// 32-bit signed little-endian PCM container. 24-in-32 streams use this
    /// with `StreamFormat::valid_bits` set to 24.
    I32,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::I16 => 2,
            Self::I24 => 3,
            Self::F32 | Self::I32 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32)
    }
}

/// Negotiated stream format shared by the loopback and the mirror stream.
///
/// Taken from the source endpoint's mix format when capture opens. The mirror
/// render stream is opened with exactly this format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
    /// Speaker position mask; 0 when the platform left it unspecified.
    pub channel_mask: u32,
    /// Significant bits per sample. Equals the container width unless the
    /// platform pads samples (24 valid bits in a 32-bit container).
    pub valid_bits: u16,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
            channel_mask: 0,
            valid_bits: sample_format.bits_per_sample(),
        }
    }

    pub fn with_channel_mask(mut self, mask: u32) -> Self {
        self.channel_mask = mask;
        self
    }

    pub fn with_valid_bits(mut self, bits: u16) -> Self {
        self.valid_bits = bits;
        self
    }

    /// Bytes per frame (one sample for every channel).
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.block_align()
    }

    /// Whole-frame byte count covering `duration` of audio.
    pub fn bytes_for_duration(&self, duration: Duration) -> usize {
        let frames = (self.sample_rate as f64 * duration.as_secs_f64()) as usize;
        frames * self.block_align()
    }

    pub fn frames_in(&self, bytes: usize) -> usize {
        match self.block_align() {
            0 => 0,
            align => bytes / align,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.channels == 0 {
            return Err("channel count must be positive".into());
        }
        let container = self.sample_format.bits_per_sample();
        if self.valid_bits == 0 || self.valid_bits > container {
            return Err(format!(
                "{} valid bits do not fit a {}-bit sample",
                self.valid_bits, container
            ));
        }
        Ok(())
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {:?}",
            self.sample_rate, self.channels, self.sample_format
        )?;
        if self.valid_bits != self.sample_format.bits_per_sample() {
            write!(f, " ({} valid bits)", self.valid_bits)?;
        }
        Ok(())
    }
}
