use std::sync::Arc;

use crate::models::chunk::AudioChunk;
use crate::models::diagnostics::PipelineCounters;
use crate::models::endpoint::EndpointId;
use crate::models::error::RouterError;
use crate::models::format::StreamFormat;
use crate::processing::ring_buffer::RingProducer;
use crate::traits::backend::{LoopbackStream, StoppedCallback};

/// Capture-thread side of the bridge: copies each chunk into the ring buffer.
///
/// Never blocks. When the buffer is full the chunk (or its tail) is dropped.
pub struct CaptureFeed {
    producer: RingProducer,
    counters: Arc<PipelineCounters>,
}

impl CaptureFeed {
    pub fn new(producer: RingProducer, counters: Arc<PipelineCounters>) -> Self {
        Self { producer, counters }
    }

    pub fn push(&mut self, chunk: AudioChunk<'_>) {
        if chunk.is_empty() {
            return;
        }
        let accepted = if chunk.silent {
            self.producer.push_silence(chunk.len())
        } else {
            self.producer.push(chunk.data)
        };
        self.counters.record_capture(accepted, chunk.len() - accepted);
    }
}

/// Loopback capture on the source endpoint.
///
/// Owns the platform stream for one Running period; never reused across starts.
pub struct CaptureSession<L: LoopbackStream> {
    stream: L,
    endpoint: EndpointId,
    format: StreamFormat,
    started: bool,
}

impl<L: LoopbackStream> CaptureSession<L> {
    /// Wraps an opened loopback stream and reads its negotiated format.
    pub fn new(stream: L, endpoint: EndpointId) -> Result<Self, RouterError> {
        let format = stream.format();
        format
            .validate()
            .map_err(|reason| RouterError::open_failure(&endpoint, reason))?;

        log::debug!("loopback on {} opened: {}", endpoint, format);
        Ok(Self {
            stream,
            endpoint,
            format,
            started: false,
        })
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Starts delivering captured buffers into `producer`.
    pub fn start(
        &mut self,
        producer: RingProducer,
        counters: Arc<PipelineCounters>,
        on_stopped: StoppedCallback,
    ) -> Result<(), RouterError> {
        if self.started {
            return Err(RouterError::InvalidState("capture session already started".into()));
        }

        let mut feed = CaptureFeed::new(producer, counters);
        self.stream
            .start(Box::new(move |chunk| feed.push(chunk)), on_stopped)?;
        self.started = true;
        log::debug!("loopback capture on {} started", self.endpoint);
        Ok(())
    }

    /// Halts the stream and waits for its thread to exit.
    pub fn stop(&mut self) -> Result<(), RouterError> {
        self.started = false;
        self.stream.stop()
    }
}
