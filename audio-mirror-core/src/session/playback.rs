use std::sync::Arc;

use crate::models::config::validate_volume;
use crate::models::diagnostics::PipelineCounters;
use crate::models::endpoint::EndpointId;
use crate::models::error::RouterError;
use crate::models::format::{SampleFormat, StreamFormat};
use crate::processing::ring_buffer::RingConsumer;
use crate::processing::volume::{apply_volume, SharedVolume};
use crate::traits::backend::{RenderStream, StoppedCallback};

/// Render-thread side of the bridge: drains the ring buffer into the output.
pub struct RenderFeed {
    consumer: RingConsumer,
    volume: SharedVolume,
    sample_format: SampleFormat,
    counters: Arc<PipelineCounters>,
}

impl RenderFeed {
    pub fn new(
        consumer: RingConsumer,
        volume: SharedVolume,
        sample_format: SampleFormat,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            consumer,
            volume,
            sample_format,
            counters,
        }
    }

    /// Fills `out` completely: buffered audio scaled by the current volume,
    /// then zeros for whatever the buffer could not supply.
    pub fn fill(&mut self, out: &mut [u8]) {
        let filled = self.consumer.pop(out);
        apply_volume(&mut out[..filled], self.sample_format, self.volume.get());
        out[filled..].fill(0);
        self.counters.record_render(filled, out.len() - filled);
    }
}

/// Render stream on the mirror endpoint.
pub struct PlaybackSession<R: RenderStream> {
    stream: R,
    endpoint: EndpointId,
    format: StreamFormat,
    volume: SharedVolume,
    started: bool,
}

impl<R: RenderStream> PlaybackSession<R> {
    pub fn new(
        stream: R,
        endpoint: EndpointId,
        format: StreamFormat,
        volume: SharedVolume,
    ) -> Self {
        Self {
            stream,
            endpoint,
            format,
            volume,
            started: false,
        }
    }

    /// Takes effect on the next render callback.
    pub fn set_volume(&self, volume: f32) -> Result<(), RouterError> {
        self.volume.set(validate_volume(volume)?);
        Ok(())
    }

    /// Starts rendering whatever arrives in `consumer`.
    pub fn start(
        &mut self,
        consumer: RingConsumer,
        counters: Arc<PipelineCounters>,
        on_stopped: StoppedCallback,
    ) -> Result<(), RouterError> {
        if self.started {
            return Err(RouterError::InvalidState("playback session already started".into()));
        }

        let mut feed = RenderFeed::new(
            consumer,
            self.volume.clone(),
            self.format.sample_format,
            counters,
        );
        self.stream
            .start(Box::new(move |out| feed.fill(out)), on_stopped)?;
        self.started = true;
        log::debug!("mirror render on {} started", self.endpoint);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), RouterError> {
        self.started = false;
        self.stream.stop()
    }
}
