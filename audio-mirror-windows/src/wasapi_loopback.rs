//! WASAPI loopback capture of a render endpoint.
//!
//! Opens the source endpoint with `AUDCLNT_STREAMFLAGS_LOOPBACK`, which taps
//! the mix the system is playing to that device. No special permissions are
//! needed; DRM-protected audio arrives silenced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::CLSCTX_ALL;

use audio_mirror_core::models::chunk::AudioChunk;
use audio_mirror_core::models::config::RouterSettings;
use audio_mirror_core::models::endpoint::EndpointId;
use audio_mirror_core::models::error::RouterError;
use audio_mirror_core::models::format::StreamFormat;
use audio_mirror_core::traits::backend::{ChunkCallback, LoopbackStream, StoppedCallback};

use crate::com::{create_enumerator, device_by_id, reference_time, stream_failure, ComScope};
use crate::stream_thread::{PollLoop, StreamThread};
use crate::wave_format::MixFormat;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Loopback tap on one render endpoint.
///
/// The mix format is read when the stream is opened; the audio client
/// itself lives only on the capture thread.
pub struct WasapiLoopbackStream {
    endpoint: EndpointId,
    format: StreamFormat,
    buffer_duration: Duration,
    thread: StreamThread,
}

impl WasapiLoopbackStream {
    /// Resolves `endpoint` and reads its mix format.
    pub fn open(endpoint: &EndpointId, settings: &RouterSettings) -> Result<Self, RouterError> {
        let _com = ComScope::enter()?;
        let client = activate_client(endpoint)?;
        let mix = MixFormat::query(&client).map_err(|e| {
            RouterError::open_failure(endpoint, format!("GetMixFormat failed: {}", e))
        })?;
        let format = mix
            .stream_format()
            .map_err(|reason| RouterError::open_failure(endpoint, reason))?;

        log::info!("loopback source {} mix format: {}", endpoint, format);
        Ok(Self {
            endpoint: endpoint.clone(),
            format,
            buffer_duration: settings.capture_buffer_duration,
            thread: StreamThread::new("wasapi-loopback-capture"),
        })
    }
}

impl LoopbackStream for WasapiLoopbackStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(
        &mut self,
        on_chunk: ChunkCallback,
        on_stopped: StoppedCallback,
    ) -> Result<(), RouterError> {
        let endpoint = self.endpoint.clone();
        let format = self.format;
        let buffer_duration = self.buffer_duration;

        self.thread.start(
            move || open_capture(endpoint, format, buffer_duration, on_chunk),
            on_stopped,
        )
    }

    fn stop(&mut self) -> Result<(), RouterError> {
        self.thread.stop()
    }
}

fn activate_client(endpoint: &EndpointId) -> Result<IAudioClient, RouterError> {
    let enumerator = create_enumerator()?;
    let device = device_by_id(&enumerator, endpoint)
        .map_err(|e| RouterError::open_failure(endpoint, format!("device not found: {}", e)))?;
    unsafe {
        device
            .Activate(CLSCTX_ALL, None)
            .map_err(|e| RouterError::open_failure(endpoint, format!("Activate failed: {}", e)))
    }
}

/// Capture-thread setup:
/// 1. Activate IAudioClient on the source endpoint
/// 2. Check the mix format still matches what `open` reported
/// 3. Initialize with the LOOPBACK flag in shared mode
/// 4. Get IAudioCaptureClient and start
fn open_capture(
    endpoint: EndpointId,
    format: StreamFormat,
    buffer_duration: Duration,
    mut on_chunk: ChunkCallback,
) -> Result<PollLoop, RouterError> {
    let client = activate_client(&endpoint)?;
    let mix = MixFormat::query(&client)
        .map_err(|e| RouterError::open_failure(&endpoint, format!("GetMixFormat failed: {}", e)))?;

    if mix.stream_format().ok() != Some(format) {
        return Err(RouterError::open_failure(
            &endpoint,
            "mix format changed since the stream was opened",
        ));
    }

    let capture_client: IAudioCaptureClient = unsafe {
        client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_NOPERSIST,
                reference_time(buffer_duration),
                0,
                mix.as_ptr(),
                None,
            )
            .map_err(|e| {
                RouterError::open_failure(&endpoint, format!("Initialize (loopback) failed: {}", e))
            })?;

        let capture_client = client
            .GetService()
            .map_err(|e| {
                RouterError::open_failure(&endpoint, format!("GetService failed: {}", e))
            })?;

        client
            .Start()
            .map_err(|e| RouterError::open_failure(&endpoint, format!("Start failed: {}", e)))?;
        capture_client
    };

    log::debug!("loopback capture on {} started", endpoint);
    let block_align = format.block_align();

    Ok(Box::new(move |running: &AtomicBool| {
        let result = capture_loop(
            &capture_client,
            &endpoint,
            block_align,
            running,
            &mut on_chunk,
        );
        unsafe {
            let _ = client.Stop();
        }
        result
    }))
}

/// Drains every pending packet each poll interval.
fn capture_loop(
    capture_client: &IAudioCaptureClient,
    endpoint: &EndpointId,
    block_align: usize,
    running: &AtomicBool,
    on_chunk: &mut ChunkCallback,
) -> Result<(), RouterError> {
    while running.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);

        unsafe {
            let mut packet_length = capture_client
                .GetNextPacketSize()
                .map_err(|e| stream_failure(endpoint, "GetNextPacketSize", e))?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                capture_client
                    .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                    .map_err(|e| stream_failure(endpoint, "GetBuffer", e))?;

                if num_frames > 0 && !buffer_ptr.is_null() {
                    let len = num_frames as usize * block_align;
                    let data = std::slice::from_raw_parts(buffer_ptr, len);
                    if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                        on_chunk(AudioChunk::silent(data, num_frames));
                    } else {
                        on_chunk(AudioChunk::new(data, num_frames));
                    }
                }

                capture_client
                    .ReleaseBuffer(num_frames)
                    .map_err(|e| stream_failure(endpoint, "ReleaseBuffer", e))?;

                packet_length = capture_client
                    .GetNextPacketSize()
                    .map_err(|e| stream_failure(endpoint, "GetNextPacketSize", e))?;
            }
        }
    }

    Ok(())
}
