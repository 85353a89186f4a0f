use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Pipeline counters shared by the capture and render threads.
///
/// Updated with relaxed atomics from the callbacks; read as a snapshot via
/// [`PipelineCounters::snapshot`].
#[derive(Debug, Default)]
pub struct PipelineCounters {
    capture_callbacks: AtomicU64,
    render_callbacks: AtomicU64,
    bytes_captured: AtomicU64,
    bytes_dropped: AtomicU64,
    bytes_rendered: AtomicU64,
    silence_bytes: AtomicU64,
}

impl PipelineCounters {
    pub fn record_capture(&self, accepted: usize, dropped: usize) {
        self.capture_callbacks.fetch_add(1, Ordering::Relaxed);
        self.bytes_captured.fetch_add(accepted as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.bytes_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    pub fn record_render(&self, from_buffer: usize, silence: usize) {
        self.render_callbacks.fetch_add(1, Ordering::Relaxed);
        self.bytes_rendered.fetch_add(from_buffer as u64, Ordering::Relaxed);
        if silence > 0 {
            self.silence_bytes.fetch_add(silence as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> RouterDiagnostics {
        let bytes_captured = self.bytes_captured.load(Ordering::Relaxed);
        let bytes_rendered = self.bytes_rendered.load(Ordering::Relaxed);
        RouterDiagnostics {
            capture_callbacks: self.capture_callbacks.load(Ordering::Relaxed),
            render_callbacks: self.render_callbacks.load(Ordering::Relaxed),
            bytes_captured,
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            bytes_rendered,
            silence_bytes: self.silence_bytes.load(Ordering::Relaxed),
            // Every accepted byte is eventually rendered, so the difference is
            // what currently sits in the bridge.
            buffered_bytes: bytes_captured.saturating_sub(bytes_rendered),
        }
    }
}

/// Diagnostics for debugging a mirroring session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouterDiagnostics {
    pub capture_callbacks: u64,
    pub render_callbacks: u64,
    /// Bytes accepted into the bridge.
    pub bytes_captured: u64,
    /// Bytes discarded because the bridge was full.
    pub bytes_dropped: u64,
    /// Bytes copied out of the bridge to the mirror.
    pub bytes_rendered: u64,
    /// Bytes of silence written because the bridge ran dry.
    pub silence_bytes: u64,
    pub buffered_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = PipelineCounters::default();
        counters.record_capture(960, 0);
        counters.record_capture(480, 480);
        counters.record_render(640, 320);

        let snap = counters.snapshot();
        assert_eq!(snap.capture_callbacks, 2);
        assert_eq!(snap.bytes_captured, 1440);
        assert_eq!(snap.bytes_dropped, 480);
        assert_eq!(snap.render_callbacks, 1);
        assert_eq!(snap.bytes_rendered, 640);
        assert_eq!(snap.silence_bytes, 320);
        assert_eq!(snap.buffered_bytes, 800);
    }
}
