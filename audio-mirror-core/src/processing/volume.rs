use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::models::format::SampleFormat;

/// Volume scalar shared between the control thread and the render callback.
///
/// Stored as raw `f32` bits in an atomic so the render thread reads it
/// without locking. A store is visible to the next render callback.
#[derive(Debug, Clone)]
pub struct SharedVolume(Arc<AtomicU32>);

impl SharedVolume {
    pub fn new(volume: f32) -> Self {
        Self(Arc::new(AtomicU32::new(volume.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, volume: f32) {
        self.0.store(volume.to_bits(), Ordering::Release);
    }
}

/// Scales interleaved samples in place.
///
/// Integer formats saturate at their limits. Trailing bytes that do not form
/// a whole sample are left untouched.
pub fn apply_volume(data: &mut [u8], format: SampleFormat, volume: f32) {
    if volume == 1.0 {
        return;
    }
    if volume <= 0.0 {
        data.fill(0);
        return;
    }

    match format {
        SampleFormat::F32 => {
            for sample in data.chunks_exact_mut(4) {
                let v = f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
                sample.copy_from_slice(&(v * volume).to_le_bytes());
            }
        }
        SampleFormat::I16 => {
            for sample in data.chunks_exact_mut(2) {
                let v = i16::from_le_bytes([sample[0], sample[1]]) as f32;
                let scaled = (v * volume).round();
                let scaled = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                sample.copy_from_slice(&scaled.to_le_bytes());
            }
        }
        SampleFormat::I24 => {
            const I24_MIN: f32 = -8_388_608.0;
            const I24_MAX: f32 = 8_388_607.0;
            for sample in data.chunks_exact_mut(3) {
                // sign-extend through the top byte of an i32
                let v = i32::from_le_bytes([0, sample[0], sample[1], sample[2]]) >> 8;
                let scaled = ((v as f32) * volume).round().clamp(I24_MIN, I24_MAX) as i32;
                let bytes = scaled.to_le_bytes();
                sample.copy_from_slice(&bytes[..3]);
            }
        }
        SampleFormat::I32 => {
            for sample in data.chunks_exact_mut(4) {
                let v = i32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]) as f64;
                let scaled = (v * volume as f64)
                    .round()
                    .clamp(i32::MIN as f64, i32::MAX as f64) as i32;
                sample.copy_from_slice(&scaled.to_le_bytes());
            }
        }
    }
}
