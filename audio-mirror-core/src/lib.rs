//! # audio-mirror-core
//!
//! Platform-agnostic core for mirroring one playback device onto another.
//!
//! Provides the capture → buffer → render bridge and the router that owns it.
//! Platform backends (Windows WASAPI) implement the `AudioBackend` trait and
//! plug into the generic `AudioRouter`.
//!
//! ## Architecture
//!
//! ```text
//! audio-mirror-core (this crate)
//! ├── traits/       ← AudioBackend, LoopbackStream, RenderStream, DeviceCatalog,
//! │                   RouterDelegate
//! ├── models/       ← RouterError, RouterConfig, RouterSettings, StreamFormat,
//! │                   AudioEndpointRef, etc.
//! ├── processing/   ← lock-free RingBuffer, software volume
//! └── session/      ← CaptureSession, PlaybackSession, AudioRouter (orchestrator)
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::chunk::AudioChunk;
pub use models::config::{RouterConfig, RouterSettings, DEFAULT_VOLUME};
pub use models::diagnostics::RouterDiagnostics;
pub use models::endpoint::{
    AudioEndpointRef, AudioTransportType, EndpointDirection, EndpointId, EndpointState,
};
pub use models::error::RouterError;
pub use models::format::{SampleFormat, StreamFormat};
pub use models::state::{RouterStatus, SessionInfo, StopReason};
pub use processing::ring_buffer::{RingBuffer, RingConsumer, RingProducer};
pub use processing::volume::SharedVolume;
pub use session::capture::CaptureSession;
pub use session::playback::PlaybackSession;
pub use session::router::AudioRouter;
pub use traits::backend::{
    AudioBackend, ChunkCallback, LoopbackStream, RenderCallback, RenderStream, StoppedCallback,
};
pub use traits::device_catalog::{
    suggest_selection, DeviceCatalog, DeviceSelection, EndpointVolumeControl,
};
pub use traits::router_delegate::RouterDelegate;
