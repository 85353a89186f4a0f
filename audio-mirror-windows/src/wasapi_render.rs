//! WASAPI shared-mode render stream on the mirror endpoint.
//!
//! Opened in exactly the source's mix format. The endpoint must accept that
//! format natively in shared mode; no conversion is requested from the
//! audio engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use windows::Win32::Foundation::S_OK;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::{CoTaskMemFree, CLSCTX_ALL};

use audio_mirror_core::models::config::RouterSettings;
use audio_mirror_core::models::endpoint::EndpointId;
use audio_mirror_core::models::error::RouterError;
use audio_mirror_core::models::format::StreamFormat;
use audio_mirror_core::traits::backend::{RenderCallback, RenderStream, StoppedCallback};

use crate::com::{create_enumerator, device_by_id, reference_time, stream_failure, ComScope};
use crate::stream_thread::{PollLoop, StreamThread};
use crate::wave_format::to_wave_format;

/// Render stream feeding one playback endpoint from a pull callback.
pub struct WasapiRenderStream {
    endpoint: EndpointId,
    format: StreamFormat,
    latency: Duration,
    thread: StreamThread,
}

impl WasapiRenderStream {
    /// Resolves `endpoint` and checks it takes `format` as-is.
    pub fn open(
        endpoint: &EndpointId,
        format: &StreamFormat,
        settings: &RouterSettings,
    ) -> Result<Self, RouterError> {
        let _com = ComScope::enter()?;
        let client = activate_client(endpoint)?;
        check_format_supported(&client, endpoint, format)?;

        log::info!(
            "mirror {} opened: {} ({} ms latency)",
            endpoint,
            format,
            settings.render_latency.as_millis()
        );
        Ok(Self {
            endpoint: endpoint.clone(),
            format: *format,
            latency: settings.render_latency,
            thread: StreamThread::new("wasapi-render"),
        })
    }
}

impl RenderStream for WasapiRenderStream {
    fn start(
        &mut self,
        on_render: RenderCallback,
        on_stopped: StoppedCallback,
    ) -> Result<(), RouterError> {
        let endpoint = self.endpoint.clone();
        let format = self.format;
        let latency = self.latency;

        self.thread.start(
            move || open_render(endpoint, format, latency, on_render),
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

fn check_format_supported(
    client: &IAudioClient,
    endpoint: &EndpointId,
    format: &StreamFormat,
) -> Result<(), RouterError> {
    let wfx = to_wave_format(format);
    let mut closest: *mut WAVEFORMATEX = std::ptr::null_mut();

    let hr = unsafe {
        client.IsFormatSupported(
            AUDCLNT_SHAREMODE_SHARED,
            &wfx as *const _ as *const WAVEFORMATEX,
            Some(&mut closest as *mut _),
        )
    };
    if !closest.is_null() {
        unsafe {
            CoTaskMemFree(Some(closest as *const _));
        }
    }

    if hr == S_OK {
        Ok(())
    } else {
        Err(RouterError::open_failure(
            endpoint,
            format!("device does not accept {} in shared mode", format),
        ))
    }
}

/// Render-thread setup: Initialize in the source format, pre-roll a buffer
/// of silence, then Start.
fn open_render(
    endpoint: EndpointId,
    format: StreamFormat,
    latency: Duration,
    mut on_render: RenderCallback,
) -> Result<PollLoop, RouterError> {
    let client = activate_client(&endpoint)?;
    let wfx = to_wave_format(&format);

    let (render_client, buffer_frames): (IAudioRenderClient, u32) = unsafe {
        client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_NOPERSIST,
                reference_time(latency),
                0,
                &wfx as *const _ as *const WAVEFORMATEX,
                None,
            )
            .map_err(|e| {
                RouterError::open_failure(&endpoint, format!("Initialize (render) failed: {}", e))
            })?;

        let buffer_frames = client
            .GetBufferSize()
            .map_err(|e| {
                RouterError::open_failure(&endpoint, format!("GetBufferSize failed: {}", e))
            })?;

        let render_client: IAudioRenderClient = client
            .GetService()
            .map_err(|e| {
                RouterError::open_failure(&endpoint, format!("GetService failed: {}", e))
            })?;

        render_client
            .GetBuffer(buffer_frames)
            .and_then(|_| {
                render_client.ReleaseBuffer(buffer_frames, AUDCLNT_BUFFERFLAGS_SILENT.0 as u32)
            })
            .map_err(|e| RouterError::open_failure(&endpoint, format!("pre-roll failed: {}", e)))?;

        client
            .Start()
            .map_err(|e| RouterError::open_failure(&endpoint, format!("Start failed: {}", e)))?;

        (render_client, buffer_frames)
    };

    log::debug!(
        "render on {} started ({} frame buffer)",
        endpoint,
        buffer_frames
    );
    let block_align = format.block_align();
    let poll_interval = (latency / 2).max(Duration::from_millis(1));

    Ok(Box::new(move |running: &AtomicBool| {
        let result = render_loop(
            &client,
            &render_client,
            &endpoint,
            RenderGeometry {
                buffer_frames,
                block_align,
                poll_interval,
            },
            running,
            &mut on_render,
        );
        unsafe {
            let _ = client.Stop();
        }
        result
    }))
}

struct RenderGeometry {
    buffer_frames: u32,
    block_align: usize,
    poll_interval: Duration,
}

/// Tops the endpoint buffer up to full every poll interval.
fn render_loop(
    client: &IAudioClient,
    render_client: &IAudioRenderClient,
    endpoint: &EndpointId,
    geometry: RenderGeometry,
    running: &AtomicBool,
    on_render: &mut RenderCallback,
) -> Result<(), RouterError> {
    while running.load(Ordering::SeqCst) {
        thread::sleep(geometry.poll_interval);

        unsafe {
            let padding = client
                .GetCurrentPadding()
                .map_err(|e| stream_failure(endpoint, "GetCurrentPadding", e))?;

            let writable = geometry.buffer_frames.saturating_sub(padding);
            if writable == 0 {
                continue;
            }

            let buffer_ptr = render_client
                .GetBuffer(writable)
                .map_err(|e| stream_failure(endpoint, "GetBuffer", e))?;

            let len = writable as usize * geometry.block_align;
            let out = std::slice::from_raw_parts_mut(buffer_ptr, len);
            on_render(out);

            render_client
                .ReleaseBuffer(writable, 0)
                .map_err(|e| stream_failure(endpoint, "ReleaseBuffer", e))?;
        }
    }

    Ok(())
}
