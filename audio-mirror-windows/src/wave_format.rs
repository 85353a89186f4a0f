//! Translation between WASAPI `WAVEFORMATEX` descriptors and `StreamFormat`.

use windows::core::GUID;
use windows::Win32::Media::Audio::{
    IAudioClient, WAVEFORMATEX, WAVEFORMATEXTENSIBLE, WAVEFORMATEXTENSIBLE_0,
};
use windows::Win32::System::Com::CoTaskMemFree;

use audio_mirror_core::models::format::{SampleFormat, StreamFormat};

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Size of the extension that follows `WAVEFORMATEX` in `WAVEFORMATEXTENSIBLE`.
const EXTENSIBLE_CB_SIZE: u16 = 22;

const KSDATAFORMAT_SUBTYPE_PCM: GUID = GUID::from_u128(0x00000001_0000_0010_8000_00aa00389b71);
const KSDATAFORMAT_SUBTYPE_IEEE_FLOAT: GUID =
    GUID::from_u128(0x00000003_0000_0010_8000_00aa00389b71);

const SPEAKER_FRONT_LEFT: u32 = 0x1;
const SPEAKER_FRONT_RIGHT: u32 = 0x2;
const SPEAKER_FRONT_CENTER: u32 = 0x4;

/// Shared-mode mix format of an audio client, freed on drop.
pub(crate) struct MixFormat {
    ptr: *mut WAVEFORMATEX,
}

impl MixFormat {
    pub(crate) fn query(client: &IAudioClient) -> windows::core::Result<Self> {
        let ptr = unsafe { client.GetMixFormat()? };
        Ok(Self { ptr })
    }

    pub(crate) fn as_ptr(&self) -> *const WAVEFORMATEX {
        self.ptr
    }

    pub(crate) fn stream_format(&self) -> Result<StreamFormat, String> {
        unsafe { from_wave_format(self.ptr) }
    }
}

impl Drop for MixFormat {
    fn drop(&mut self) {
        unsafe {
            CoTaskMemFree(Some(self.ptr as *const _));
        }
    }
}

/// Reads a mix format returned by `IAudioClient::GetMixFormat`.
///
/// # Safety
/// `ptr` must point to a valid `WAVEFORMATEX`, followed by the extensible
/// part when `wFormatTag` is `WAVE_FORMAT_EXTENSIBLE`.
pub(crate) unsafe fn from_wave_format(ptr: *const WAVEFORMATEX) -> Result<StreamFormat, String> {
    // packed structs: copy fields out before using them
    let base = std::ptr::read_unaligned(ptr);
    let tag = base.wFormatTag;
    let channels = base.nChannels;
    let sample_rate = base.nSamplesPerSec;
    let bits = base.wBitsPerSample;
    let cb_size = base.cbSize;

    let (is_float, channel_mask, valid_bits) = match tag {
        WAVE_FORMAT_IEEE_FLOAT => (true, 0, bits),
        WAVE_FORMAT_PCM => (false, 0, bits),
        WAVE_FORMAT_EXTENSIBLE if cb_size >= EXTENSIBLE_CB_SIZE => {
            let ext = std::ptr::read_unaligned(ptr as *const WAVEFORMATEXTENSIBLE);
            let sub_format = ext.SubFormat;
            let mask = ext.dwChannelMask;
            let raw_valid = ext.Samples.wValidBitsPerSample;
            // 0 means the driver left it unset: every container bit is valid
            let valid = if raw_valid == 0 { bits } else { raw_valid };
            if sub_format == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT {
                (true, mask, valid)
            } else if sub_format == KSDATAFORMAT_SUBTYPE_PCM {
                (false, mask, valid)
            } else {
                return Err(format!("unsupported sub-format {:?}", sub_format));
            }
        }
        other => return Err(format!("unsupported format tag {:#06x}", other)),
    };

    let sample_format = match (is_float, bits) {
        (true, 32) => SampleFormat::F32,
        (false, 16) => SampleFormat::I16,
        (false, 24) => SampleFormat::I24,
        (false, 32) => SampleFormat::I32,
        (float, bits) => {
            return Err(format!(
                "unsupported sample layout: {} bits {}",
                bits,
                if float { "float" } else { "integer" }
            ))
        }
    };

    let format = StreamFormat::new(sample_rate, channels, sample_format)
        .with_channel_mask(channel_mask)
        .with_valid_bits(valid_bits);
    format.validate()?;
    Ok(format)
}

/// Builds the descriptor used to open the mirror stream in exactly `format`.
pub(crate) fn to_wave_format(format: &StreamFormat) -> WAVEFORMATEXTENSIBLE {
    let bits = format.sample_format.bits_per_sample();
    let channel_mask = if format.channel_mask != 0 {
        format.channel_mask
    } else {
        default_channel_mask(format.channels)
    };

    WAVEFORMATEXTENSIBLE {
        Format: WAVEFORMATEX {
            wFormatTag: WAVE_FORMAT_EXTENSIBLE,
            nChannels: format.channels,
            nSamplesPerSec: format.sample_rate,
            nAvgBytesPerSec: format.bytes_per_second() as u32,
            nBlockAlign: format.block_align() as u16,
            wBitsPerSample: bits,
            cbSize: EXTENSIBLE_CB_SIZE,
        },
        Samples: WAVEFORMATEXTENSIBLE_0 {
            wValidBitsPerSample: format.valid_bits,
        },
        dwChannelMask: channel_mask,
        SubFormat: if format.sample_format.is_float() {
            KSDATAFORMAT_SUBTYPE_IEEE_FLOAT
        } else {
            KSDATAFORMAT_SUBTYPE_PCM
        },
    }
}

fn default_channel_mask(channels: u16) -> u32 {
    match channels {
        1 => SPEAKER_FRONT_CENTER,
        2 => SPEAKER_FRONT_LEFT | SPEAKER_FRONT_RIGHT,
        _ => 0,
    }
}
