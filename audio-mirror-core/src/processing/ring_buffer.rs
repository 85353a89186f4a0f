use std::time::Duration;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::models::format::StreamFormat;

/// Zero block used to push silence without allocating on the capture thread.
const SILENCE_BLOCK: [u8; 1024] = [0; 1024];

/// Bounded single-producer/single-consumer byte FIFO bridging the capture
/// thread and the render thread.
///
/// Lock-free: neither side ever waits on the other. Overflow behavior is
/// discard-on-overflow: when a push does not fit, the newest bytes are
/// dropped and everything already buffered is kept. Only whole frames are
/// accepted, so a drop never leaves half a sample in the queue.
pub struct RingBuffer {
    inner: HeapRb<u8>,
    block_align: usize,
}

impl RingBuffer {
    /// Creates a buffer holding up to `capacity` bytes, rounded down to a
    /// whole number of `block_align`-sized frames (at least one frame).
    pub fn new(capacity: usize, block_align: usize) -> Self {
        let block_align = block_align.max(1);
        let frames = (capacity / block_align).max(1);
        Self {
            inner: HeapRb::new(frames * block_align),
            block_align,
        }
    }

    /// Creates a buffer sized for `duration` of audio in `format`.
    pub fn for_format(format: &StreamFormat, duration: Duration) -> Self {
        Self::new(format.bytes_for_duration(duration), format.block_align())
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    pub fn block_align(&self) -> usize {
        self.block_align
    }

    /// Splits into the capture-side producer and the render-side consumer.
    pub fn split(self) -> (RingProducer, RingConsumer) {
        let block_align = self.block_align;
        let (producer, consumer) = self.inner.split();
        (
            RingProducer {
                inner: producer,
                block_align,
            },
            RingConsumer { inner: consumer },
        )
    }
}

/// Capture-side handle. Owned by the capture callback.
pub struct RingProducer {
    inner: HeapProd<u8>,
    block_align: usize,
}

impl RingProducer {
    /// Pushes as many whole frames of `bytes` as fit and returns the number of
    /// bytes accepted. The remainder is dropped.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let fit = self.fit(bytes.len());
        if fit == 0 {
            return 0;
        }
        self.inner.push_slice(&bytes[..fit])
    }

    /// Pushes `len` bytes of silence, subject to the same overflow policy as
    /// [`RingProducer::push`].
    pub fn push_silence(&mut self, len: usize) -> usize {
        let mut remaining = self.fit(len);
        let mut pushed = 0;
        while remaining > 0 {
            let n = remaining.min(SILENCE_BLOCK.len());
            let written = self.inner.push_slice(&SILENCE_BLOCK[..n]);
            pushed += written;
            remaining -= written;
            if written < n {
                break;
            }
        }
        pushed
    }

    /// Free space in bytes.
    pub fn vacant(&self) -> usize {
        self.inner.vacant_len()
    }

    fn fit(&self, len: usize) -> usize {
        let fit = len.min(self.inner.vacant_len());
        fit - fit % self.block_align
    }
}

/// Render-side handle. Owned by the render callback.
pub struct RingConsumer {
    inner: HeapCons<u8>,
}

impl RingConsumer {
    /// Copies up to `out.len()` bytes into `out`, oldest first, and returns the
    /// count. Returns 0 when empty; never blocks.
    pub fn pop(&mut self, out: &mut [u8]) -> usize {
        self.inner.pop_slice(out)
    }

    /// Bytes currently buffered.
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::SampleFormat;
    use std::thread;

    fn bytes(range: std::ops::Range<u32>) -> Vec<u8> {
        range.map(|i| i as u8).collect()
    }

    #[test]
    fn push_then_pop_preserves_order() {
        let (mut tx, mut rx) = RingBuffer::new(64, 1).split();
        let input = bytes(0..48);

        assert_eq!(tx.push(&input), 48);
        assert_eq!(rx.available(), 48);

        let mut out = vec![0u8; 48];
        assert_eq!(rx.pop(&mut out), 48);
        assert_eq!(out, input);
        assert!(rx.is_empty());
    }

    #[test]
    fn overflow_keeps_oldest_and_drops_newest() {
        let (mut tx, mut rx) = RingBuffer::new(16, 1).split();
        let input = bytes(0..24);

        assert_eq!(tx.push(&input), 16);

        let mut out = vec![0u8; 24];
        assert_eq!(rx.pop(&mut out), 16);
        assert_eq!(&out[..16], &input[..16]);
    }

    #[test]
    fn overflow_on_partially_filled_buffer() {
        let (mut tx, mut rx) = RingBuffer::new(8, 1).split();
        tx.push(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(tx.push(&[7, 8, 9, 10]), 2);

        let mut out = [0u8; 8];
        assert_eq!(rx.pop(&mut out), 8);
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn overflow_never_splits_a_frame() {
        // 3 frames of 4 bytes
        let (mut tx, mut rx) = RingBuffer::new(12, 4).split();
        assert_eq!(tx.push(&bytes(0..8)), 8);

        // 1.5 frames offered, one frame of room: only the whole frame goes in.
        assert_eq!(tx.push(&bytes(100..106)), 4);
        assert_eq!(tx.vacant(), 0);

        let mut out = vec![0u8; 12];
        assert_eq!(rx.pop(&mut out), 12);
        assert_eq!(&out[..8], &bytes(0..8)[..]);
        assert_eq!(&out[8..], &bytes(100..104)[..]);
    }

    #[test]
    fn capacity_rounds_down_to_whole_frames() {
        let rb = RingBuffer::new(100, 8);
        assert_eq!(rb.capacity(), 96);
        assert_eq!(rb.block_align(), 8);

        // never smaller than one frame
        assert_eq!(RingBuffer::new(3, 8).capacity(), 8);
    }

    #[test]
    fn sized_from_format_and_duration() {
        let format = StreamFormat::new(48000, 2, SampleFormat::F32);
        let rb = RingBuffer::for_format(&format, Duration::from_secs(5));
        assert_eq!(rb.capacity(), 48000 * 5 * 8);
        assert_eq!(rb.block_align(), 8);
    }

    #[test]
    fn underflow_returns_what_is_available() {
        let (mut tx, mut rx) = RingBuffer::new(32, 1).split();

        let mut out = [0xAAu8; 16];
        assert_eq!(rx.pop(&mut out), 0);

        tx.push(&[9, 8, 7]);
        assert_eq!(rx.pop(&mut out), 3);
        assert_eq!(&out[..3], &[9, 8, 7]);
        // untouched beyond what was popped
        assert_eq!(out[3], 0xAA);
    }

    #[test]
    fn wraparound() {
        let (mut tx, mut rx) = RingBuffer::new(8, 2).split();
        let mut out = [0u8; 8];

        tx.push(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(rx.pop(&mut out[..4]), 4);

        assert_eq!(tx.push(&[7, 8, 9, 10, 11, 12]), 6);
        assert_eq!(rx.pop(&mut out), 8);
        assert_eq!(out, [5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn silence_push_respects_capacity() {
        let (mut tx, mut rx) = RingBuffer::new(4096, 4).split();
        tx.push(&[1; 8]);

        assert_eq!(tx.push_silence(5000), 4088);
        assert_eq!(tx.vacant(), 0);

        let mut out = vec![0xFFu8; 4096];
        assert_eq!(rx.pop(&mut out), 4096);
        assert!(out[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn concurrent_producer_and_consumer_keep_fifo_order() {
        const TOTAL: usize = 64 * 1024;
        let (mut tx, mut rx) = RingBuffer::new(1024, 1).split();

        let producer = thread::spawn(move || {
            let data: Vec<u8> = (0..TOTAL).map(|i| (i % 251) as u8).collect();
            let mut sent = 0;
            while sent < TOTAL {
                let end = (sent + 100).min(TOTAL);
                sent += tx.push(&data[sent..end]);
                thread::yield_now();
            }
        });

        let mut received = Vec::with_capacity(TOTAL);
        let mut buf = [0u8; 333];
        while received.len() < TOTAL {
            let n = rx.pop(&mut buf);
            received.extend_from_slice(&buf[..n]);
            if n == 0 {
                thread::yield_now();
            }
        }
        producer.join().unwrap();

        for (i, &b) in received.iter().enumerate() {
            assert_eq!(b, (i % 251) as u8);
        }
    }
}
