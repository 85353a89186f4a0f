use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::endpoint::EndpointId;
use super::error::RouterError;
use super::format::StreamFormat;

/// Router lifecycle state as seen from outside.
///
/// ```text
/// Idle ──start──▶ Running
///  ▲                 │
///  └──stop / device lost
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterStatus {
    Idle,
    Running,
}

impl RouterStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Why a running session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called (or the router was dropped).
    Requested,
    /// A stream failed while running.
    Failed(RouterError),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Identity of one Running period, from `start()` to teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub source: EndpointId,
    pub mirror: EndpointId,
    pub format: StreamFormat,
}

impl SessionInfo {
    pub fn new(source: EndpointId, mirror: EndpointId, format: StreamFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            source,
            mirror,
            format,
        }
    }
}
