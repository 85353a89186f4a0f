use audio_mirror_core::models::config::RouterSettings;
use audio_mirror_core::models::endpoint::{AudioEndpointRef, EndpointId};
use audio_mirror_core::models::error::RouterError;
use audio_mirror_core::models::format::StreamFormat;
use audio_mirror_core::traits::backend::AudioBackend;
use audio_mirror_core::traits::device_catalog::{DeviceCatalog, EndpointVolumeControl};

use crate::device_catalog::WasapiDeviceCatalog;
use crate::wasapi_loopback::WasapiLoopbackStream;
use crate::wasapi_render::WasapiRenderStream;

/// WASAPI runtime for `AudioRouter`: MMDevice catalog, loopback capture on
/// the source and shared-mode rendering on the mirror.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasapiBackend {
    catalog: WasapiDeviceCatalog,
}

impl WasapiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(&self) -> &WasapiDeviceCatalog {
        &self.catalog
    }
}

impl DeviceCatalog for WasapiBackend {
    fn list_render_devices(&self) -> Result<Vec<AudioEndpointRef>, RouterError> {
        self.catalog.list_render_devices()
    }

    fn default_render_device_id(&self) -> Result<Option<EndpointId>, RouterError> {
        self.catalog.default_render_device_id()
    }
}

impl EndpointVolumeControl for WasapiBackend {
    fn endpoint_volume(&self, id: &EndpointId) -> Result<f32, RouterError> {
        self.catalog.endpoint_volume(id)
    }

    fn set_endpoint_volume(&self, id: &EndpointId, volume: f32) -> Result<(), RouterError> {
        self.catalog.set_endpoint_volume(id, volume)
    }
}

impl AudioBackend for WasapiBackend {
    type Loopback = WasapiLoopbackStream;
    type Render = WasapiRenderStream;

    fn open_loopback(
        &self,
        source: &EndpointId,
        settings: &RouterSettings,
    ) -> Result<WasapiLoopbackStream, RouterError> {
        WasapiLoopbackStream::open(source, settings)
    }

    fn open_render(
        &self,
        mirror: &EndpointId,
        format: &StreamFormat,
        settings: &RouterSettings,
    ) -> Result<WasapiRenderStream, RouterError> {
        WasapiRenderStream::open(mirror, format, settings)
    }
}
