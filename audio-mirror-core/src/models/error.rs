use thiserror::Error;

use super::endpoint::EndpointId;

/// Errors surfaced by the router, its sessions, and the platform backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The operation is not valid in the router's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Bad device selection, settings, or out-of-range volume.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `start` was called before both devices were set.
    #[error("source and mirror devices must be set before starting")]
    NotConfigured,

    /// The platform refused to open a capture or render stream.
    #[error("failed to open endpoint {endpoint}: {reason}")]
    DeviceOpenFailure { endpoint: EndpointId, reason: String },

    /// A running stream failed (device removed, driver reset).
    #[error("device lost ({endpoint}): {reason}")]
    DeviceLost { endpoint: EndpointId, reason: String },

    /// Device directory or other platform service failure.
    #[error("platform error: {0}")]
    Platform(String),
}

impl RouterError {
    pub fn open_failure(endpoint: &EndpointId, reason: impl Into<String>) -> Self {
        Self::DeviceOpenFailure {
            endpoint: endpoint.clone(),
            reason: reason.into(),
        }
    }

    pub fn device_lost(endpoint: &EndpointId, reason: impl Into<String>) -> Self {
        Self::DeviceLost {
            endpoint: endpoint.clone(),
            reason: reason.into(),
        }
    }

    /// The endpoint this error is attributed to, if any.
    pub fn endpoint(&self) -> Option<&EndpointId> {
        match self {
            Self::DeviceOpenFailure { endpoint, .. } | Self::DeviceLost { endpoint, .. } => {
                Some(endpoint)
            }
            _ => None,
        }
    }
}
