use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::Mutex;

use crate::models::config::{validate_volume, RouterConfig, RouterSettings};
use crate::models::diagnostics::{PipelineCounters, RouterDiagnostics};
use crate::models::endpoint::{AudioEndpointRef, EndpointId};
use crate::models::error::RouterError;
use crate::models::state::{RouterStatus, SessionInfo, StopReason};
use crate::processing::ring_buffer::RingBuffer;
use crate::processing::volume::SharedVolume;
use crate::session::capture::CaptureSession;
use crate::session::playback::PlaybackSession;
use crate::traits::backend::{AudioBackend, StoppedCallback};
use crate::traits::router_delegate::RouterDelegate;

/// Both sessions of one Running period.
struct ActiveSessions<B: AudioBackend> {
    info: SessionInfo,
    generation: u64,
    capture: CaptureSession<B::Loopback>,
    playback: PlaybackSession<B::Render>,
}

/// Either no sessions or both of them; there is no half-open state.
enum RouterState<B: AudioBackend> {
    Idle,
    Running(Box<ActiveSessions<B>>),
}

struct RouterInner<B: AudioBackend> {
    config: RouterConfig,
    state: RouterState<B>,
    /// Bumped on every start so late failure notifications from an old
    /// session cannot tear down a newer one.
    generation: u64,
    counters: Arc<PipelineCounters>,
}

struct Shared<B: AudioBackend> {
    backend: B,
    settings: RouterSettings,
    volume: SharedVolume,
    inner: Mutex<RouterInner<B>>,
    delegate: Mutex<Option<Arc<dyn RouterDelegate>>>,
}

/// Mirrors everything played on a source render endpoint to a second render
/// endpoint.
///
/// Data flow while running:
/// ```text
/// [Loopback on source] → CaptureFeed → [RingBuffer]
///     → RenderFeed × volume → [Render on mirror]
/// ```
///
/// All lifecycle operations serialize on one mutex, shared with the teardown
/// that follows a stream failure. Sessions are moved out of the state under
/// that mutex, so a stream is closed at most once no matter who gets there
/// first.
pub struct AudioRouter<B: AudioBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: AudioBackend> AudioRouter<B> {
    pub fn new(backend: B) -> Self {
        Self::build(backend, RouterSettings::default())
    }

    pub fn with_settings(backend: B, settings: RouterSettings) -> Result<Self, RouterError> {
        settings.validate()?;
        Ok(Self::build(backend, settings))
    }

    fn build(backend: B, settings: RouterSettings) -> Self {
        let config = RouterConfig {
            volume: settings.initial_volume,
            ..Default::default()
        };
        Self {
            shared: Arc::new(Shared {
                backend,
                volume: SharedVolume::new(config.volume),
                settings,
                inner: Mutex::new(RouterInner {
                    config,
                    state: RouterState::Idle,
                    generation: 0,
                    counters: Arc::new(PipelineCounters::default()),
                }),
                delegate: Mutex::new(None),
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn RouterDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.shared.settings
    }

    /// Active render endpoints, freshly queried from the platform.
    pub fn list_render_devices(&self) -> Result<Vec<AudioEndpointRef>, RouterError> {
        self.shared.backend.list_render_devices()
    }

    pub fn default_render_device_id(&self) -> Result<Option<EndpointId>, RouterError> {
        self.shared.backend.default_render_device_id()
    }

    pub fn config(&self) -> RouterConfig {
        self.shared.inner.lock().config.clone()
    }

    pub fn status(&self) -> RouterStatus {
        match self.shared.inner.lock().state {
            RouterState::Idle => RouterStatus::Idle,
            RouterState::Running(_) => RouterStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    /// Details of the current Running period, if any.
    pub fn session_info(&self) -> Option<SessionInfo> {
        match &self.shared.inner.lock().state {
            RouterState::Running(sessions) => Some(sessions.info.clone()),
            RouterState::Idle => None,
        }
    }

    /// Counters of the current session, or of the last one once stopped.
    pub fn diagnostics(&self) -> RouterDiagnostics {
        self.shared.inner.lock().counters.snapshot()
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume.get()
    }

    /// Selects the source and mirror endpoints. Only allowed while idle.
    pub fn set_devices(
        &self,
        source: &AudioEndpointRef,
        mirror: &AudioEndpointRef,
    ) -> Result<(), RouterError> {
        let mut inner = self.shared.inner.lock();
        if let RouterState::Running(_) = inner.state {
            return Err(RouterError::InvalidState(
                "cannot change devices while running".into(),
            ));
        }
        if source.id == mirror.id {
            return Err(RouterError::InvalidConfig(format!(
                "source and mirror must be different devices (both are {})",
                source.id
            )));
        }

        log::info!("devices set: source {}, mirror {}", source, mirror);
        inner.config.source = Some(source.clone());
        inner.config.mirror = Some(mirror.clone());
        Ok(())
    }

    /// Sets the mirror volume. Applied on the next render callback when
    /// running, kept for the next start otherwise.
    pub fn set_volume(&self, volume: f32) -> Result<(), RouterError> {
        let volume = validate_volume(volume)?;
        let mut inner = self.shared.inner.lock();
        match &inner.state {
            RouterState::Running(sessions) => sessions.playback.set_volume(volume)?,
            RouterState::Idle => self.shared.volume.set(volume),
        }
        inner.config.volume = volume;
        log::debug!("mirror volume set to {:.2}", volume);
        Ok(())
    }

    /// Opens both streams and starts mirroring.
    ///
    /// The mirror starts rendering before the loopback starts capturing so the
    /// first captured chunk already has somewhere to go. On any failure the
    /// streams opened so far are closed and the router stays idle.
    pub fn start(&self) -> Result<(), RouterError> {
        let mut inner = self.shared.inner.lock();
        if let RouterState::Running(_) = inner.state {
            return Err(RouterError::InvalidState("already running".into()));
        }
        let (source, mirror) = match (&inner.config.source, &inner.config.mirror) {
            (Some(source), Some(mirror)) => (source.id.clone(), mirror.id.clone()),
            _ => return Err(RouterError::NotConfigured),
        };

        inner.generation += 1;
        let generation = inner.generation;
        let counters = Arc::new(PipelineCounters::default());

        match Shared::open_sessions(&self.shared, generation, source, mirror, &counters) {
            Ok(sessions) => {
                log::info!(
                    "mirroring session {} started: {} -> {} ({})",
                    sessions.info.id,
                    sessions.info.source,
                    sessions.info.mirror,
                    sessions.info.format
                );
                inner.counters = counters;
                inner.state = RouterState::Running(Box::new(sessions));
                Ok(())
            }
            Err(e) => {
                log::error!("failed to start mirroring: {}", e);
                Err(e)
            }
        }
    }

    /// Stops mirroring. A no-op when already idle.
    ///
    /// Halts the loopback first, waits for its thread to finish, then closes
    /// the mirror stream.
    pub fn stop(&self) -> Result<(), RouterError> {
        let info = {
            let mut inner = self.shared.inner.lock();
            let RouterState::Running(sessions) =
                std::mem::replace(&mut inner.state, RouterState::Idle)
            else {
                return Ok(());
            };
            let info = sessions.info.clone();
            Shared::teardown(*sessions);
            info
        };

        log::info!("mirroring session {} stopped", info.id);
        self.shared.notify(|d| d.on_stopped(&StopReason::Requested));
        Ok(())
    }
}

impl<B: AudioBackend> Drop for AudioRouter<B> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("error stopping router on drop: {}", e);
        }
    }
}

impl<B: AudioBackend> Shared<B> {
    fn open_sessions(
        this: &Arc<Self>,
        generation: u64,
        source: EndpointId,
        mirror: EndpointId,
        counters: &Arc<PipelineCounters>,
    ) -> Result<ActiveSessions<B>, RouterError> {
        let settings = &this.settings;

        let loopback = this.backend.open_loopback(&source, settings)?;
        let mut capture = CaptureSession::new(loopback, source.clone())?;
        let format = capture.format();

        let render = match this.backend.open_render(&mirror, &format, settings) {
            Ok(render) => render,
            Err(e) => {
                close_quietly("capture", capture.stop());
                return Err(e);
            }
        };
        let mut playback =
            PlaybackSession::new(render, mirror.clone(), format, this.volume.clone());

        let ring = RingBuffer::for_format(&format, settings.buffer_duration);
        log::debug!(
            "bridge buffer: {} bytes ({:?} at {})",
            ring.capacity(),
            settings.buffer_duration,
            format
        );
        let (producer, consumer) = ring.split();

        if let Err(e) = playback.start(
            consumer,
            Arc::clone(counters),
            Self::failure_hook(this, generation),
        ) {
            close_quietly("playback", playback.stop());
            close_quietly("capture", capture.stop());
            return Err(e);
        }

        if let Err(e) = capture.start(
            producer,
            Arc::clone(counters),
            Self::failure_hook(this, generation),
        ) {
            close_quietly("capture", capture.stop());
            close_quietly("playback", playback.stop());
            return Err(e);
        }

        Ok(ActiveSessions {
            info: SessionInfo::new(source, mirror, format),
            generation,
            capture,
            playback,
        })
    }

    /// Stopped-callback for a stream of session `generation`.
    ///
    /// Runs on the stream's own thread, which the teardown has to join, so
    /// the teardown is handed to a separate thread.
    fn failure_hook(this: &Arc<Self>, generation: u64) -> StoppedCallback {
        let weak: Weak<Self> = Arc::downgrade(this);
        Box::new(move |error| {
            let Some(error) = error else {
                return;
            };
            let Some(shared) = weak.upgrade() else {
                return;
            };
            log::error!("stream failed while mirroring: {}", error);

            let spawned = thread::Builder::new()
                .name("audio-router-teardown".into())
                .spawn(move || shared.handle_failure(generation, error));
            if let Err(e) = spawned {
                log::error!("failed to spawn teardown thread: {}", e);
            }
        })
    }

    fn handle_failure(&self, generation: u64, error: RouterError) {
        let info = {
            let mut inner = self.inner.lock();
            match &inner.state {
                RouterState::Running(sessions) if sessions.generation == generation => {}
                _ => {
                    log::debug!(
                        "ignoring failure from finished session (generation {})",
                        generation
                    );
                    return;
                }
            }
            let RouterState::Running(sessions) =
                std::mem::replace(&mut inner.state, RouterState::Idle)
            else {
                return;
            };
            let info = sessions.info.clone();
            Self::teardown(*sessions);
            info
        };

        log::warn!("mirroring session {} ended: {}", info.id, error);
        self.notify(|d| {
            d.on_stopped(&StopReason::Failed(error.clone()));
            d.on_device_lost(&error);
        });
    }

    /// Capture first, then playback. Errors are logged; both get closed.
    fn teardown(mut sessions: ActiveSessions<B>) {
        close_quietly("capture", sessions.capture.stop());
        close_quietly("playback", sessions.playback.stop());
    }

    fn notify(&self, f: impl FnOnce(&dyn RouterDelegate)) {
        let delegate = self.delegate.lock().clone();
        if let Some(delegate) = delegate {
            f(delegate.as_ref());
        }
    }
}

fn close_quietly(what: &str, result: Result<(), RouterError>) {
    if let Err(e) = result {
        log::warn!("error closing {} stream: {}", what, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunk::AudioChunk;
    use crate::models::format::{SampleFormat, StreamFormat};
    use crate::traits::backend::{ChunkCallback, LoopbackStream, RenderCallback, RenderStream};
    use crate::traits::device_catalog::{suggest_selection, DeviceCatalog};
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    const FORMAT: StreamFormat = StreamFormat {
        sample_rate: 48000,
        channels: 2,
        sample_format: SampleFormat::F32,
        channel_mask: 0x3,
        valid_bits: 32,
    };

    /// Callback slots and an event log shared between the mock streams and the test.
    #[derive(Default)]
    struct MockHandles {
        on_chunk: Mutex<Option<ChunkCallback>>,
        capture_stopped: Mutex<Option<StoppedCallback>>,
        on_render: Mutex<Option<RenderCallback>>,
        render_stopped: Mutex<Option<StoppedCallback>>,
        events: Mutex<Vec<&'static str>>,
        fail_open_render: AtomicBool,
        fail_start_capture: AtomicBool,
        fail_start_render: AtomicBool,
    }

    impl MockHandles {
        fn log(&self, event: &'static str) {
            self.events.lock().push(event);
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().clone()
        }

        fn count(&self, event: &str) -> usize {
            self.events.lock().iter().filter(|e| **e == event).count()
        }

        fn deliver(&self, data: &[u8]) {
            if let Some(cb) = self.on_chunk.lock().as_mut() {
                cb(AudioChunk::new(data, (data.len() / FORMAT.block_align()) as u32));
            }
        }

        fn render(&self, len: usize) -> Vec<u8> {
            let mut out = vec![0xAA; len];
            if let Some(cb) = self.on_render.lock().as_mut() {
                cb(&mut out);
            }
            out
        }

        /// Behaves like a capture thread that hit a device error and exits.
        fn fail_capture(&self, reason: &str) {
            self.on_chunk.lock().take();
            let stopped = self.capture_stopped.lock().take();
            if let Some(stopped) = stopped {
                stopped(Some(RouterError::device_lost(&EndpointId::new("B"), reason)));
            }
        }

        /// Same for the render thread on the mirror.
        fn fail_render(&self, reason: &str) {
            self.on_render.lock().take();
            let stopped = self.render_stopped.lock().take();
            if let Some(stopped) = stopped {
                stopped(Some(RouterError::device_lost(&EndpointId::new("A"), reason)));
            }
        }
    }

    struct MockLoopback {
        handles: Arc<MockHandles>,
    }

    impl LoopbackStream for MockLoopback {
        fn format(&self) -> StreamFormat {
            FORMAT
        }

        fn start(
            &mut self,
            on_chunk: ChunkCallback,
            on_stopped: StoppedCallback,
        ) -> Result<(), RouterError> {
            if self.handles.fail_start_capture.load(Ordering::SeqCst) {
                return Err(RouterError::open_failure(&EndpointId::new("B"), "start refused"));
            }
            *self.handles.on_chunk.lock() = Some(on_chunk);
            *self.handles.capture_stopped.lock() = Some(on_stopped);
            self.handles.log("capture.start");
            Ok(())
        }

        fn stop(&mut self) -> Result<(), RouterError> {
            self.handles.on_chunk.lock().take();
            let stopped = self.handles.capture_stopped.lock().take();
            if let Some(stopped) = stopped {
                stopped(None);
            }
            self.handles.log("capture.stop");
            Ok(())
        }
    }

    struct MockRender {
        handles: Arc<MockHandles>,
    }

    impl RenderStream for MockRender {
        fn start(
            &mut self,
            on_render: RenderCallback,
            on_stopped: StoppedCallback,
        ) -> Result<(), RouterError> {
            if self.handles.fail_start_render.load(Ordering::SeqCst) {
                return Err(RouterError::open_failure(&EndpointId::new("A"), "start refused"));
            }
            *self.handles.on_render.lock() = Some(on_render);
            *self.handles.render_stopped.lock() = Some(on_stopped);
            self.handles.log("render.start");
            Ok(())
        }

        fn stop(&mut self) -> Result<(), RouterError> {
            self.handles.on_render.lock().take();
            let stopped = self.handles.render_stopped.lock().take();
            if let Some(stopped) = stopped {
                stopped(None);
            }
            self.handles.log("render.stop");
            Ok(())
        }
    }

    struct MockBackend {
        handles: Arc<MockHandles>,
    }

    impl DeviceCatalog for MockBackend {
        fn list_render_devices(&self) -> Result<Vec<AudioEndpointRef>, RouterError> {
            Ok(vec![
                AudioEndpointRef::render("A", "Speakers"),
                AudioEndpointRef::render("B", "Headphones"),
                AudioEndpointRef::render("C", "HDMI"),
            ])
        }

        fn default_render_device_id(&self) -> Result<Option<EndpointId>, RouterError> {
            Ok(Some(EndpointId::new("B")))
        }
    }

    impl AudioBackend for MockBackend {
        type Loopback = MockLoopback;
        type Render = MockRender;

        fn open_loopback(
            &self,
            _source: &EndpointId,
            _settings: &RouterSettings,
        ) -> Result<MockLoopback, RouterError> {
            self.handles.log("capture.open");
            Ok(MockLoopback {
                handles: Arc::clone(&self.handles),
            })
        }

        fn open_render(
            &self,
            mirror: &EndpointId,
            format: &StreamFormat,
            _settings: &RouterSettings,
        ) -> Result<MockRender, RouterError> {
            assert_eq!(*format, FORMAT);
            if self.handles.fail_open_render.load(Ordering::SeqCst) {
                return Err(RouterError::open_failure(mirror, "format not supported"));
            }
            self.handles.log("render.open");
            Ok(MockRender {
                handles: Arc::clone(&self.handles),
            })
        }
    }

    #[derive(Default)]
    struct RecordingDelegate {
        stopped: Mutex<Vec<StopReason>>,
        lost: Mutex<Vec<RouterError>>,
        lost_tx: Mutex<Option<mpsc::Sender<()>>>,
    }

    impl RouterDelegate for RecordingDelegate {
        fn on_stopped(&self, reason: &StopReason) {
            self.stopped.lock().push(reason.clone());
        }

        fn on_device_lost(&self, error: &RouterError) {
            self.lost.lock().push(error.clone());
            if let Some(tx) = self.lost_tx.lock().as_ref() {
                let _ = tx.send(());
            }
        }
    }

    fn router() -> (AudioRouter<MockBackend>, Arc<MockHandles>) {
        let handles = Arc::new(MockHandles::default());
        let backend = MockBackend {
            handles: Arc::clone(&handles),
        };
        (AudioRouter::new(backend), handles)
    }

    fn configured_router() -> (AudioRouter<MockBackend>, Arc<MockHandles>) {
        let (router, handles) = router();
        let devices = router.list_render_devices().unwrap();
        let default_id = router.default_render_device_id().unwrap();
        let selection = suggest_selection(&devices, default_id.as_ref());
        router
            .set_devices(&selection.source.unwrap(), &selection.mirror.unwrap())
            .unwrap();
        (router, handles)
    }

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn first_sample(data: &[u8]) -> f32 {
        f32::from_le_bytes([data[0], data[1], data[2], data[3]])
    }

    #[test]
    fn same_device_for_source_and_mirror_is_rejected() {
        let (router, _) = router();
        for id in ["A", "B", "{0.0.0.00000000}.{1234}"] {
            let a = AudioEndpointRef::render(id, "one wrapper");
            let b = AudioEndpointRef::render(id, "another wrapper");
            assert!(matches!(
                router.set_devices(&a, &b),
                Err(RouterError::InvalidConfig(_))
            ));
        }
        assert!(router.config().source.is_none());
    }

    #[test]
    fn start_before_set_devices_is_not_configured() {
        let (router, handles) = router();
        assert_eq!(router.start(), Err(RouterError::NotConfigured));
        assert!(!router.is_running());
        assert!(handles.events().is_empty());
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let (router, handles) = router();
        assert_eq!(router.stop(), Ok(()));
        assert!(handles.events().is_empty());
    }

    #[test]
    fn mirror_starts_before_capture_and_stops_after_it() {
        let (router, handles) = configured_router();
        router.start().unwrap();
        assert!(router.is_running());
        router.stop().unwrap();
        assert!(!router.is_running());

        assert_eq!(
            handles.events(),
            vec![
                "capture.open",
                "render.open",
                "render.start",
                "capture.start",
                "capture.stop",
                "render.stop",
            ]
        );
    }

    #[test]
    fn full_session_scenario() {
        let (router, handles) = configured_router();
        let config = router.config();
        assert_eq!(config.source.unwrap().id.as_str(), "B");
        assert_eq!(config.mirror.unwrap().id.as_str(), "A");

        router.start().unwrap();
        assert!(router.is_running());
        let info = router.session_info().unwrap();
        assert_eq!(info.format, FORMAT);
        assert_eq!(info.source.as_str(), "B");

        handles.deliver(&f32_bytes(&[1.0, 1.0, 1.0, 1.0]));
        let out = handles.render(8);
        assert_relative_eq!(first_sample(&out), 0.8);

        router.set_volume(0.5).unwrap();
        let out = handles.render(8);
        assert_relative_eq!(first_sample(&out), 0.5);

        // drained: next callback is silence
        assert_eq!(handles.render(8), vec![0; 8]);

        let diag = router.diagnostics();
        assert_eq!(diag.bytes_captured, 16);
        assert_eq!(diag.bytes_rendered, 16);
        assert_eq!(diag.silence_bytes, 8);

        router.stop().unwrap();
        assert!(!router.is_running());
        assert!(router.session_info().is_none());
    }

    #[test]
    fn set_devices_while_running_is_invalid_state() {
        let (router, _) = configured_router();
        router.start().unwrap();

        let a = AudioEndpointRef::render("A", "Speakers");
        let c = AudioEndpointRef::render("C", "HDMI");
        assert!(matches!(
            router.set_devices(&c, &a),
            Err(RouterError::InvalidState(_))
        ));
        assert!(matches!(router.start(), Err(RouterError::InvalidState(_))));
    }

    #[test]
    fn volume_is_validated_and_kept_across_runs() {
        let (router, _) = configured_router();
        assert_relative_eq!(router.volume(), 0.8);
        assert!(matches!(router.set_volume(1.5), Err(RouterError::InvalidConfig(_))));
        assert!(router.set_volume(f32::NAN).is_err());

        router.set_volume(0.3).unwrap();
        router.start().unwrap();
        router.stop().unwrap();
        assert_relative_eq!(router.config().volume, 0.3);
        assert_relative_eq!(router.volume(), 0.3);
    }

    #[test]
    fn render_open_failure_rolls_back_capture() {
        let (router, handles) = configured_router();
        handles.fail_open_render.store(true, Ordering::SeqCst);

        let err = router.start().unwrap_err();
        assert_eq!(err.endpoint().map(|e| e.as_str()), Some("A"));
        assert!(!router.is_running());
        assert_eq!(handles.events(), vec!["capture.open", "capture.stop"]);

        handles.fail_open_render.store(false, Ordering::SeqCst);
        router.start().unwrap();
        assert!(router.is_running());
    }

    #[test]
    fn capture_start_failure_stops_render() {
        let (router, handles) = configured_router();
        handles.fail_start_capture.store(true, Ordering::SeqCst);

        assert!(matches!(router.start(), Err(RouterError::DeviceOpenFailure { .. })));
        assert!(!router.is_running());
        assert_eq!(handles.count("render.start"), 1);
        assert_eq!(handles.count("render.stop"), 1);
        assert!(handles.on_render.lock().is_none());
    }

    #[test]
    fn render_start_failure_closes_both_streams() {
        let (router, handles) = configured_router();
        handles.fail_start_render.store(true, Ordering::SeqCst);

        let err = router.start().unwrap_err();
        assert!(matches!(err, RouterError::DeviceOpenFailure { .. }));
        assert_eq!(err.endpoint().map(|e| e.as_str()), Some("A"));
        assert!(!router.is_running());
        assert!(router.session_info().is_none());
        assert_eq!(
            handles.events(),
            vec!["capture.open", "render.open", "render.stop", "capture.stop"]
        );
        assert!(handles.on_chunk.lock().is_none());

        handles.fail_start_render.store(false, Ordering::SeqCst);
        router.start().unwrap();
        assert!(router.is_running());
    }

    #[test]
    fn mirror_device_lost_tears_down_and_allows_restart() {
        let (router, handles) = configured_router();
        let delegate = Arc::new(RecordingDelegate::default());
        let (tx, rx) = mpsc::channel();
        *delegate.lost_tx.lock() = Some(tx);
        router.set_delegate(delegate.clone());

        router.start().unwrap();
        handles.fail_render("mirror unplugged");

        rx.recv_timeout(Duration::from_secs(5)).expect("device lost notification");
        assert!(!router.is_running());
        let lost = delegate.lost.lock().clone();
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].endpoint().map(|e| e.as_str()), Some("A"));
        assert!(matches!(lost[0], RouterError::DeviceLost { .. }));
        assert_eq!(handles.count("capture.stop"), 1);
        assert_eq!(handles.count("render.stop"), 1);
        assert!(handles.on_chunk.lock().is_none());

        router.start().unwrap();
        assert!(router.is_running());
        router.stop().unwrap();
        assert_eq!(delegate.lost.lock().len(), 1);
    }

    #[test]
    fn device_lost_tears_down_and_allows_restart() {
        let (router, handles) = configured_router();
        let delegate = Arc::new(RecordingDelegate::default());
        let (tx, rx) = mpsc::channel();
        *delegate.lost_tx.lock() = Some(tx);
        router.set_delegate(delegate.clone());

        router.start().unwrap();
        handles.fail_capture("device unplugged");

        rx.recv_timeout(Duration::from_secs(5)).expect("device lost notification");
        assert!(!router.is_running());
        assert_eq!(delegate.lost.lock().len(), 1);
        assert!(matches!(delegate.lost.lock()[0], RouterError::DeviceLost { .. }));
        assert_eq!(delegate.stopped.lock().len(), 1);
        assert!(delegate.stopped.lock()[0].is_failure());
        assert_eq!(handles.count("capture.stop"), 1);
        assert_eq!(handles.count("render.stop"), 1);

        router.start().unwrap();
        assert!(router.is_running());
        router.stop().unwrap();

        assert_eq!(delegate.lost.lock().len(), 1);
        assert_eq!(delegate.stopped.lock().last(), Some(&StopReason::Requested));
    }

    #[test]
    fn stop_racing_failure_closes_each_stream_once() {
        let (router, handles) = configured_router();
        let delegate = Arc::new(RecordingDelegate::default());
        router.set_delegate(delegate.clone());
        router.start().unwrap();

        handles.fail_capture("driver reset");
        router.stop().unwrap();

        // give a losing teardown thread time to run and bail out
        thread::sleep(Duration::from_millis(100));
        assert!(!router.is_running());
        assert_eq!(handles.count("capture.stop"), 1);
        assert_eq!(handles.count("render.stop"), 1);
        assert!(delegate.lost.lock().len() <= 1);
        assert_eq!(delegate.stopped.lock().len(), 1);
    }

    #[test]
    fn stale_failure_does_not_touch_new_session() {
        let (router, handles) = configured_router();
        router.start().unwrap();

        // keep the first session's stopped callback, restart, then fire it
        let stale = handles.capture_stopped.lock().take().unwrap();
        router.stop().unwrap();
        router.start().unwrap();

        stale(Some(RouterError::device_lost(&EndpointId::new("B"), "late")));
        thread::sleep(Duration::from_millis(100));
        assert!(router.is_running());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let handles = Arc::new(MockHandles::default());
        let settings = RouterSettings {
            initial_volume: 2.0,
            ..Default::default()
        };
        let result = AudioRouter::with_settings(MockBackend { handles }, settings);
        assert!(matches!(result, Err(RouterError::InvalidConfig(_))));
    }

    #[test]
    fn drop_stops_running_router() {
        let (router, handles) = configured_router();
        router.start().unwrap();
        drop(router);
        assert_eq!(handles.count("capture.stop"), 1);
        assert_eq!(handles.count("render.stop"), 1);
    }
}
