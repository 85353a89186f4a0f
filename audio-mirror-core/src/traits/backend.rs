use crate::models::chunk::AudioChunk;
use crate::models::config::RouterSettings;
use crate::models::endpoint::EndpointId;
use crate::models::error::RouterError;
use crate::models::format::StreamFormat;
use crate::traits::device_catalog::DeviceCatalog;

/// Invoked on the capture thread for every buffer the platform delivers.
pub type ChunkCallback = Box<dyn FnMut(AudioChunk<'_>) + Send + 'static>;

/// Invoked on the render thread to fill the whole output buffer it is handed.
pub type RenderCallback = Box<dyn FnMut(&mut [u8]) + Send + 'static>;

/// Invoked exactly once when a stream halts: `None` when the halt was
/// requested through `stop()`, `Some(error)` when the stream failed.
pub type StoppedCallback = Box<dyn FnOnce(Option<RouterError>) + Send + 'static>;

/// A loopback tap on a render endpoint.
///
/// Implemented by:
/// - `WasapiLoopbackStream` (Windows)
pub trait LoopbackStream: Send {
    /// Mix format the stream delivers. Known once the stream is opened.
    fn format(&self) -> StreamFormat;

    /// Start delivering buffers to `on_chunk` on a dedicated audio thread.
    ///
    /// Returns once the platform stream is running, or with the error that
    /// kept it from starting.
    fn start(
        &mut self,
        on_chunk: ChunkCallback,
        on_stopped: StoppedCallback,
    ) -> Result<(), RouterError>;

    /// Halt the stream. Returns after the audio thread has exited and
    /// `on_stopped` has run. Calling it on a stopped stream is a no-op.
    fn stop(&mut self) -> Result<(), RouterError>;
}

/// A render stream on a playback endpoint.
///
/// Implemented by:
/// - `WasapiRenderStream` (Windows)
pub trait RenderStream: Send {
    /// Start pulling buffers through `on_render` on a dedicated audio thread.
    fn start(
        &mut self,
        on_render: RenderCallback,
        on_stopped: StoppedCallback,
    ) -> Result<(), RouterError>;

    /// Same contract as [`LoopbackStream::stop`].
    fn stop(&mut self) -> Result<(), RouterError>;
}

/// Platform audio runtime: the device directory plus stream factories.
pub trait AudioBackend: DeviceCatalog + Send + Sync + 'static {
    type Loopback: LoopbackStream + 'static;
    type Render: RenderStream + 'static;

    /// Open (without starting) a loopback tap on `source`.
    fn open_loopback(
        &self,
        source: &EndpointId,
        settings: &RouterSettings,
    ) -> Result<Self::Loopback, RouterError>;

    /// Open (without starting) a render stream on `mirror` in exactly `format`.
    fn open_render(
        &self,
        mirror: &EndpointId,
        format: &StreamFormat,
        settings: &RouterSettings,
    ) -> Result<Self::Render, RouterError>;
}
