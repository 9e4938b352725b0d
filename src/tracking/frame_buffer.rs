//! Lock-Free Frame Buffer
//!
//! SPSC hand-off between the tracking source thread and the tick thread.
//!
//! Architecture:
//! - Producer (tracking source): never blocks, pushes frames at the device rate
//! - Consumer (tick driver): drains once per tick and keeps only the newest frame
//!
//! Uses the `rtrb` crate for the ring itself; this module adds sequence
//! numbering and the counters the service reports in its logs.

use super::types::HandFrame;
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default frame buffer capacity (must be power of 2)
pub const DEFAULT_CAPACITY: usize = 256;

/// A frame tagged with its push order
#[derive(Debug, Clone)]
pub struct FrameSlot {
    pub frame: HandFrame,
    pub sequence: u64,
}

/// Frame buffer statistics for monitoring
#[derive(Debug, Default)]
pub struct FrameBufferStats {
    /// Total frames pushed
    pub frames_pushed: AtomicU64,
    /// Frames dropped because the buffer was full
    pub frames_dropped: AtomicU64,
    /// Frames handed to the tick thread
    pub frames_consumed: AtomicU64,
    /// Frames discarded because a newer one was already queued
    pub frames_skipped: AtomicU64,
    /// Peak buffer occupancy
    pub peak_occupancy: AtomicU64,
}

/// Lock-free ring buffer carrying tracking frames
pub struct FrameBuffer {
    producer: Producer<FrameSlot>,
    consumer: Consumer<FrameSlot>,
    stats: Arc<FrameBufferStats>,
    capacity: usize,
}

impl FrameBuffer {
    /// Create a frame buffer with default capacity
    pub fn new() -> Self {
        let (producer, consumer) = RingBuffer::new(DEFAULT_CAPACITY);
        Self {
            producer,
            consumer,
            stats: Arc::new(FrameBufferStats::default()),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Create a frame buffer with the given capacity, which must be a power of 2
    pub fn with_capacity(capacity: usize) -> crate::Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(crate::Error::Tracking(format!(
                "frame buffer capacity must be a power of 2, got {}",
                capacity
            )));
        }

        let (producer, consumer) = RingBuffer::new(capacity);
        Ok(Self {
            producer,
            consumer,
            stats: Arc::new(FrameBufferStats::default()),
            capacity,
        })
    }

    /// Split into the source-side producer and tick-side consumer
    pub fn split(self) -> (FrameProducer, FrameConsumer) {
        (
            FrameProducer {
                inner: self.producer,
                sequence: 0,
                stats: Arc::clone(&self.stats),
                capacity: self.capacity,
            },
            FrameConsumer {
                inner: self.consumer,
                stats: self.stats,
            },
        )
    }

    /// Get statistics
    pub fn stats(&self) -> Arc<FrameBufferStats> {
        Arc::clone(&self.stats)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer half (tracking source thread)
pub struct FrameProducer {
    inner: Producer<FrameSlot>,
    sequence: u64,
    stats: Arc<FrameBufferStats>,
    capacity: usize,
}

impl FrameProducer {
    /// Push a frame. Never blocks; returns false if the frame was dropped.
    #[inline]
    pub fn push(&mut self, frame: HandFrame) -> bool {
        let slot = FrameSlot {
            frame,
            sequence: self.sequence,
        };

        match self.inner.push(slot) {
            Ok(()) => {
                self.sequence += 1;
                self.stats.frames_pushed.fetch_add(1, Ordering::Relaxed);

                let occupied = (self.capacity - self.inner.slots()) as u64;
                self.stats
                    .peak_occupancy
                    .fetch_max(occupied, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    /// True once the consumer half has been dropped
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}

/// Consumer half (tick thread)
pub struct FrameConsumer {
    inner: Consumer<FrameSlot>,
    stats: Arc<FrameBufferStats>,
}

impl FrameConsumer {
    /// Pop the oldest queued frame
    #[inline]
    pub fn pop(&mut self) -> Option<FrameSlot> {
        match self.inner.pop() {
            Ok(slot) => {
                self.stats.frames_consumed.fetch_add(1, Ordering::Relaxed);
                Some(slot)
            }
            Err(_) => None,
        }
    }

    /// Drain everything queued and return only the newest frame.
    ///
    /// Older frames are counted as skipped; the tick only ever needs the
    /// current state of the hands.
    pub fn pop_latest(&mut self) -> Option<FrameSlot> {
        let mut latest = self.pop()?;
        while let Ok(newer) = self.inner.pop() {
            self.stats.frames_skipped.fetch_add(1, Ordering::Relaxed);
            latest = newer;
        }
        Some(latest)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of frames waiting
    #[inline]
    pub fn available(&self) -> usize {
        self.inner.slots()
    }

    pub fn stats(&self) -> Arc<FrameBufferStats> {
        Arc::clone(&self.stats)
    }
}
