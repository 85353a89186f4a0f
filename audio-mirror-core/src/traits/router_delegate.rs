use crate::models::error::RouterError;
use crate::models::state::StopReason;

/// Event delegate for router notifications.
///
/// Methods may be called from a background thread, not the thread that
/// called `start()`. Implementations should marshal to the UI thread if needed.
pub trait RouterDelegate: Send + Sync {
    /// Called after a running session has been torn down and the router is idle.
    fn on_stopped(&self, reason: &StopReason);

    /// Called once per failed session, after `on_stopped`, when a stream died
    /// while running. The router is already idle.
    fn on_device_lost(&self, error: &RouterError);
}
