use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Platform identifier of an audio endpoint.
///
/// Captured by value when a device is selected, so equality never depends on
/// which wrapper object the directory service handed out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EndpointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Data-flow direction of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointDirection {
    Render,
    Capture,
}

/// Whether the endpoint is currently usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointState {
    Active,
    Inactive,
}

/// Transport type for an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioTransportType {
    BuiltIn,
    Bluetooth,
    BluetoothLE,
    Usb,
    Virtual,
    Unknown,
}

/// Immutable snapshot of an audio endpoint as reported by the device catalog.
///
/// Equality and hashing look at `id` only: two snapshots of the same device
/// taken at different times compare equal even if the friendly name changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEndpointRef {
    pub id: EndpointId,
    pub name: String,
    pub direction: EndpointDirection,
    pub state: EndpointState,
    pub is_default: bool,
    pub transport_type: Option<AudioTransportType>,
}

impl AudioEndpointRef {
    /// Snapshot of an active render endpoint.
    pub fn render(id: impl Into<EndpointId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            direction: EndpointDirection::Render,
            state: EndpointState::Active,
            is_default: false,
            transport_type: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == EndpointState::Active
    }

    pub fn is_render(&self) -> bool {
        self.direction == EndpointDirection::Render
    }
}

impl PartialEq for AudioEndpointRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AudioEndpointRef {}

impl Hash for AudioEndpointRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for AudioEndpointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({})", self.name, self.id)
    }
}
