//! Render endpoint directory via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list active render (speaker/headphone)
//! endpoints with friendly names and transport types, resolve the default
//! render endpoint, and read or change an endpoint's master volume.

use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Foundation::E_NOTFOUND;
use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::UI::Shell::PropertiesSystem::IPropertyStore;

use audio_mirror_core::models::config::validate_volume;
use audio_mirror_core::models::endpoint::{
    AudioEndpointRef, AudioTransportType, EndpointDirection, EndpointId, EndpointState,
};
use audio_mirror_core::models::error::RouterError;
use audio_mirror_core::traits::device_catalog::{DeviceCatalog, EndpointVolumeControl};

use crate::com::{create_enumerator, device_by_id, device_id, ComScope};

/// Render device directory backed by the Windows MMDevice API.
///
/// Holds no COM state: every call joins the MTA, creates a fresh enumerator,
/// and queries the platform, so hot-plugged devices show up immediately and
/// the catalog can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasapiDeviceCatalog;

impl WasapiDeviceCatalog {
    pub fn new() -> Self {
        Self
    }

    fn endpoint_volume_interface(
        &self,
        id: &EndpointId,
    ) -> Result<IAudioEndpointVolume, RouterError> {
        let enumerator = create_enumerator()?;
        let device = device_by_id(&enumerator, id)
            .map_err(|e| RouterError::Platform(format!("device {} not found: {}", id, e)))?;
        unsafe {
            device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| {
                    RouterError::Platform(format!(
                        "endpoint volume unavailable for {}: {}",
                        id, e
                    ))
                })
        }
    }
}

impl DeviceCatalog for WasapiDeviceCatalog {
    fn list_render_devices(&self) -> Result<Vec<AudioEndpointRef>, RouterError> {
        let _com = ComScope::enter()?;
        let enumerator = create_enumerator()?;

        unsafe {
            let collection = enumerator
                .EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE)
                .map_err(|e| RouterError::Platform(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| RouterError::Platform(format!("GetCount failed: {}", e)))?;

            // Get default device ID for comparison
            let default_id = enumerator
                .GetDefaultAudioEndpoint(eRender, eMultimedia)
                .ok()
                .and_then(|d| device_id(&d).ok());

            let mut devices = Vec::with_capacity(count as usize);

            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(e) => {
                        log::debug!("skipping render endpoint {}: {}", i, e);
                        continue;
                    }
                };

                let id = match device_id(&device) {
                    Ok(id) => id,
                    Err(_) => continue,
                };

                let store = device.OpenPropertyStore(STGM_READ).ok();
                let name = store
                    .as_ref()
                    .and_then(friendly_name)
                    .unwrap_or_else(|| format!("Device {}", i));
                let transport = store
                    .as_ref()
                    .map(detect_transport_type)
                    .unwrap_or(AudioTransportType::Unknown);

                devices.push(AudioEndpointRef {
                    is_default: default_id.as_deref() == Some(id.as_str()),
                    id: EndpointId::new(id),
                    name,
                    direction: EndpointDirection::Render,
                    state: EndpointState::Active,
                    transport_type: Some(transport),
                });
            }

            log::debug!("found {} active render endpoints", devices.len());
            Ok(devices)
        }
    }

    fn default_render_device_id(&self) -> Result<Option<EndpointId>, RouterError> {
        let _com = ComScope::enter()?;
        let enumerator = create_enumerator()?;

        let device = match unsafe { enumerator.GetDefaultAudioEndpoint(eRender, eMultimedia) } {
            Ok(d) => d,
            Err(e) if e.code() == E_NOTFOUND => return Ok(None),
            Err(e) => {
                return Err(RouterError::Platform(format!(
                    "GetDefaultAudioEndpoint failed: {}",
                    e
                )))
            }
        };

        let id = device_id(&device)
            .map_err(|e| RouterError::Platform(format!("GetId failed: {}", e)))?;
        Ok(Some(EndpointId::new(id)))
    }
}

impl EndpointVolumeControl for WasapiDeviceCatalog {
    fn endpoint_volume(&self, id: &EndpointId) -> Result<f32, RouterError> {
        let _com = ComScope::enter()?;
        let volume = self.endpoint_volume_interface(id)?;
        unsafe {
            volume
                .GetMasterVolumeLevelScalar()
                .map_err(|e| {
                    RouterError::Platform(format!("GetMasterVolumeLevelScalar failed: {}", e))
                })
        }
    }

    fn set_endpoint_volume(&self, id: &EndpointId, volume: f32) -> Result<(), RouterError> {
        let level = validate_volume(volume)?;
        let _com = ComScope::enter()?;
        let endpoint_volume = self.endpoint_volume_interface(id)?;
        unsafe {
            endpoint_volume
                .SetMasterVolumeLevelScalar(level, std::ptr::null())
                .map_err(|e| {
                    RouterError::Platform(format!("SetMasterVolumeLevelScalar failed: {}", e))
                })?;
        }
        log::debug!("endpoint volume of {} set to {:.2}", id, level);
        Ok(())
    }
}

fn friendly_name(store: &IPropertyStore) -> Option<String> {
    let value = unsafe { store.GetValue(&PKEY_Device_FriendlyName) }.ok()?;
    non_empty(value.to_string())
}

fn enumerator_name(store: &IPropertyStore) -> Option<String> {
    let value = unsafe { store.GetValue(&PKEY_Device_EnumeratorName) }.ok()?;
    non_empty(value.to_string())
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Classify the bus a device hangs off from `PKEY_Device_EnumeratorName`.
fn detect_transport_type(store: &IPropertyStore) -> AudioTransportType {
    let Some(name) = enumerator_name(store) else {
        return AudioTransportType::Unknown;
    };

    if name.contains("BTHLEENUM") {
        AudioTransportType::BluetoothLE
    } else if name.contains("BTHENUM") {
        AudioTransportType::Bluetooth
    } else if name.contains("USB") {
        AudioTransportType::Usb
    } else if name.contains("SWD") || name.contains("ROOT") {
        AudioTransportType::Virtual
    } else {
        AudioTransportType::BuiltIn
    }
}
