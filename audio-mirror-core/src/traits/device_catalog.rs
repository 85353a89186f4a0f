use crate::models::endpoint::{AudioEndpointRef, EndpointId};
use crate::models::error::RouterError;

/// Read-only view of the platform's render endpoints.
///
/// Every call re-queries the platform; devices can be hot-plugged between
/// calls, so nothing is cached.
pub trait DeviceCatalog: Send + Sync {
    /// All active render endpoints, in platform order. An empty list is not an error.
    fn list_render_devices(&self) -> Result<Vec<AudioEndpointRef>, RouterError>;

    /// Id of the current default render endpoint, or `None` if none is configured.
    fn default_render_device_id(&self) -> Result<Option<EndpointId>, RouterError>;
}

/// Master volume of an endpoint, as shown in the system mixer.
pub trait EndpointVolumeControl: Send + Sync {
    fn endpoint_volume(&self, id: &EndpointId) -> Result<f32, RouterError>;

    fn set_endpoint_volume(&self, id: &EndpointId, volume: f32) -> Result<(), RouterError>;
}

/// Initial source/mirror pick for a device list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSelection {
    pub source: Option<AudioEndpointRef>,
    pub mirror: Option<AudioEndpointRef>,
}

impl DeviceSelection {
    pub fn is_complete(&self) -> bool {
        self.source.is_some() && self.mirror.is_some()
    }
}

/// Source is the default device when listed, otherwise the first one.
/// Mirror is the first device that is not the source.
pub fn suggest_selection(
    devices: &[AudioEndpointRef],
    default_id: Option<&EndpointId>,
) -> DeviceSelection {
    let source = default_id
        .and_then(|id| devices.iter().find(|d| &d.id == id))
        .or_else(|| devices.first())
        .cloned();

    let mirror = source
        .as_ref()
        .and_then(|src| devices.iter().find(|d| d.id != src.id))
        .cloned();

    DeviceSelection { source, mirror }
}
