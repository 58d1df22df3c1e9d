//! Lock-free ring buffer for audio frames
//!
//! Single-producer single-consumer buffer between the controller's chunk
//! writes and the audio output callback.
//!
//! Design:
//! - Producer (controller): fills the buffer as chunks arrive
//! - Consumer (audio callback): reads frames without any locks
//! - Overrun (buffer full) and underrun (buffer empty) are counted and
//!   logged with throttling; both are recoverable

use crate::audio::types::AudioFrame;
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Lock-free ring buffer for audio frames
pub struct FrameRingBuffer {
    buffer: HeapRb<AudioFrame>,
    underruns: Arc<AtomicU64>,
    overruns: Arc<AtomicU64>,
}

impl FrameRingBuffer {
    /// Create a new ring buffer holding `capacity` frames
    pub fn new(capacity: usize) -> Self {
        debug!("Creating audio ring buffer with capacity: {} frames", capacity);

        Self {
            buffer: HeapRb::new(capacity),
            underruns: Arc::new(AtomicU64::new(0)),
            overruns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Split into producer and consumer halves
    ///
    /// Producer is used by the sink writer, consumer by the audio callback.
    /// Each half can be moved to a different thread safely.
    pub fn split(self) -> (FrameProducer, FrameConsumer) {
        let (prod, cons) = self.buffer.split();

        let producer = FrameProducer {
            producer: prod,
            overruns: Arc::clone(&self.overruns),
        };

        let consumer = FrameConsumer {
            consumer: cons,
            underruns: Arc::clone(&self.underruns),
        };

        (producer, consumer)
    }
}

/// Producer half of the ring buffer (used by the sink writer)
pub struct FrameProducer {
    producer: ringbuf::HeapProd<AudioFrame>,
    overruns: Arc<AtomicU64>,
}

impl FrameProducer {
    /// Push a slice of frames, returning how many were accepted
    ///
    /// Frames that do not fit are dropped by the caller; ordering of the
    /// accepted prefix is preserved. Lock-free.
    pub fn write_frames(&mut self, frames: &[AudioFrame]) -> usize {
        let written = self.producer.push_slice(frames);

        if written < frames.len() {
            let dropped = (frames.len() - written) as u64;
            let total = self.overruns.fetch_add(dropped, Ordering::Relaxed) + dropped;
            trace!(
                "Audio ring buffer full, dropped {} frames (total overrun: {})",
                dropped,
                total
            );
        }

        written
    }

    /// Get current buffer fill level in frames
    pub fn occupied_len(&self) -> usize {
        self.producer.occupied_len()
    }

    /// Get buffer capacity in frames
    pub fn capacity(&self) -> usize {
        self.producer.capacity().into()
    }
}

/// Consumer half of the ring buffer (used by the audio callback)
pub struct FrameConsumer {
    consumer: ringbuf::HeapCons<AudioFrame>,
    underruns: Arc<AtomicU64>,
}

impl FrameConsumer {
    /// Pop one frame, or None if the buffer is empty (underrun)
    ///
    /// The caller outputs silence on underrun. Underruns are expected while
    /// paused, before the first chunk arrives, and on transient network
    /// stalls; they are counted and logged sparsely.
    pub fn pop(&mut self) -> Option<AudioFrame> {
        match self.consumer.try_pop() {
            Some(frame) => Some(frame),
            None => {
                let count = self.underruns.fetch_add(1, Ordering::Relaxed) + 1;
                if count % 100_000 == 0 {
                    trace!("Audio ring buffer underrun (total: {})", count);
                }
                None
            }
        }
    }

    /// Get current buffer fill level in frames
    pub fn occupied_len(&self) -> usize {
        self.consumer.occupied_len()
    }
}
