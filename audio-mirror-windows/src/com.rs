//! COM apartment scoping and small MMDevice helpers shared by the backend.

use std::time::Duration;

use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_mirror_core::models::endpoint::EndpointId;
use audio_mirror_core::models::error::RouterError;

/// Joins the multithreaded apartment for the current thread and leaves it on drop.
///
/// If the thread already lives in an STA (a UI thread, say), COM is usable
/// as-is and nothing is undone on drop. Declare it before any COM interface so
/// it drops last.
pub(crate) struct ComScope {
    initialized: bool,
}

impl ComScope {
    pub(crate) fn enter() -> Result<Self, RouterError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { initialized: false });
        }
        hr.ok()
            .map_err(|e| RouterError::Platform(format!("CoInitializeEx failed: {}", e)))?;
        Ok(Self { initialized: true })
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

pub(crate) fn create_enumerator() -> Result<IMMDeviceEnumerator, RouterError> {
    unsafe {
        CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
            .map_err(|e| RouterError::Platform(format!("failed to create enumerator: {}", e)))
    }
}

/// Looks up an endpoint by its MMDevice id string.
pub(crate) fn device_by_id(
    enumerator: &IMMDeviceEnumerator,
    id: &EndpointId,
) -> windows::core::Result<IMMDevice> {
    let wide_id: Vec<u16> = id
        .as_str()
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();
    unsafe { enumerator.GetDevice(PCWSTR(wide_id.as_ptr())) }
}

/// Reads the id of a device, freeing the COM-allocated string.
pub(crate) fn device_id(device: &IMMDevice) -> windows::core::Result<String> {
    unsafe {
        let raw: PWSTR = device.GetId()?;
        let id = raw.to_string().unwrap_or_default();
        CoTaskMemFree(Some(raw.0 as *const _));
        Ok(id)
    }
}

/// Maps a failure on a running stream: device removal gets its own wording.
pub(crate) fn stream_failure(
    endpoint: &EndpointId,
    call: &str,
    e: windows::core::Error,
) -> RouterError {
    if e.code() == AUDCLNT_E_DEVICE_INVALIDATED {
        RouterError::device_lost(
            endpoint,
            format!("device removed or disabled ({} failed)", call),
        )
    } else {
        RouterError::device_lost(endpoint, format!("{} failed: {}", call, e))
    }
}

/// Converts a duration to WASAPI `REFERENCE_TIME` (100 ns units).
pub(crate) fn reference_time(duration: Duration) -> i64 {
    (duration.as_nanos() / 100).min(i64::MAX as u128) as i64
}
