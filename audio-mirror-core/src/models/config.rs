use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::endpoint::AudioEndpointRef;
use super::error::RouterError;

/// Volume a freshly constructed router plays the mirror at.
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Device selection and output level for the router.
///
/// Source and mirror can only change while the router is idle. Volume can
/// change at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub source: Option<AudioEndpointRef>,
    pub mirror: Option<AudioEndpointRef>,
    pub volume: f32,
}

impl RouterConfig {
    pub fn is_configured(&self) -> bool {
        self.source.is_some() && self.mirror.is_some()
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            source: None,
            mirror: None,
            volume: DEFAULT_VOLUME,
        }
    }
}

/// Checks a volume scalar against [0.0, 1.0]. NaN is rejected.
pub fn validate_volume(volume: f32) -> Result<f32, RouterError> {
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(RouterError::InvalidConfig(format!(
            "volume must be within 0.0..=1.0, got {}",
            volume
        )))
    }
}

/// Tuning for the capture → buffer → render pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Amount of audio the bridge can hold before it starts dropping (default: 5 s).
    pub buffer_duration: Duration,

    /// Requested render buffer duration on the mirror (default: 20 ms).
    pub render_latency: Duration,

    /// Requested loopback buffer duration on the source (default: 100 ms).
    pub capture_buffer_duration: Duration,

    /// Volume the router starts with (default: 0.8).
    pub initial_volume: f32,
}

impl RouterSettings {
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.buffer_duration.is_zero() {
            return Err(RouterError::InvalidConfig("buffer duration must be positive".into()));
        }
        if self.render_latency.is_zero() {
            return Err(RouterError::InvalidConfig("render latency must be positive".into()));
        }
        if self.capture_buffer_duration.is_zero() {
            return Err(RouterError::InvalidConfig(
                "capture buffer duration must be positive".into(),
            ));
        }
        if self.render_latency >= self.buffer_duration {
            return Err(RouterError::InvalidConfig(format!(
                "render latency {:?} must be shorter than the buffer duration {:?}",
                self.render_latency, self.buffer_duration
            )));
        }
        validate_volume(self.initial_volume)?;
        Ok(())
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            buffer_duration: Duration::from_secs(5),
            render_latency: Duration::from_millis(20),
            capture_buffer_duration: Duration::from_millis(100),
            initial_volume: DEFAULT_VOLUME,
        }
    }
}
