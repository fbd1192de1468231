use crate::acquisition::Sample;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

struct Ring {
    samples: VecDeque<Sample>,
    capacity: usize,
    total_pushed: u64,
    watermark: Option<u64>,
}

/// Bounded FIFO of the most recent samples, shared by one producer and the
/// compute side.
///
/// Every push and every snapshot holds the same lock for its whole duration,
/// so a snapshot is always some prefix of the pushed stream, trimmed to the
/// newest `k` samples.
pub struct SampleBuffer {
    inner: Mutex<Ring>,
    closed: AtomicBool,
    ready: Notify,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Ring {
                samples: VecDeque::with_capacity(capacity),
                capacity,
                total_pushed: 0,
                watermark: None,
            }),
            closed: AtomicBool::new(false),
            ready: Notify::new(),
        }
    }

    fn ring(&self) -> MutexGuard<'_, Ring> {
        // A panicking holder cannot leave a half-written sample behind, the
        // ring is only mutated through push_back/pop_front.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends one sample, evicting the oldest at capacity. Returns `false`
    /// only after [`SampleBuffer::close`].
    pub fn push(&self, sample: Sample) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        let reached_watermark = {
            let mut ring = self.ring();
            while ring.samples.len() >= ring.capacity {
                ring.samples.pop_front();
            }
            ring.samples.push_back(sample);
            ring.total_pushed += 1;
            match ring.watermark {
                Some(mark) if ring.total_pushed >= mark => {
                    ring.watermark = None;
                    true
                }
                _ => false,
            }
        };

        if reached_watermark {
            self.ready.notify_one();
        }
        true
    }

    /// Ordered copy of the newest `min(window_len, len)` samples.
    pub fn snapshot(&self, window_len: usize) -> Vec<Sample> {
        self.snapshot_with_total(window_len).0
    }

    /// Like [`SampleBuffer::snapshot`], also returning how many samples had
    /// ever been pushed at the instant of the copy.
    pub fn snapshot_with_total(&self, window_len: usize) -> (Vec<Sample>, u64) {
        let ring = self.ring();
        let take = window_len.min(ring.samples.len());
        let skip = ring.samples.len() - take;
        let samples = ring.samples.iter().skip(skip).copied().collect();
        (samples, ring.total_pushed)
    }

    pub fn len(&self) -> usize {
        self.ring().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring().capacity
    }

    pub fn total_pushed(&self) -> u64 {
        self.ring().total_pushed
    }

    /// Changes the capacity; shrinking drops the oldest samples first.
    pub fn set_capacity(&self, capacity: usize) {
        let mut ring = self.ring();
        ring.capacity = capacity.max(1);
        while ring.samples.len() > ring.capacity {
            ring.samples.pop_front();
        }
    }

    /// Requests a wake-up on [`SampleBuffer::ready`] once `total_pushed`
    /// reaches `mark`. Fires immediately if it already has.
    pub fn arm_watermark(&self, mark: u64) {
        let already_reached = {
            let mut ring = self.ring();
            if ring.total_pushed >= mark {
                ring.watermark = None;
                true
            } else {
                ring.watermark = Some(mark);
                false
            }
        };
        if already_reached {
            self.ready.notify_one();
        }
    }

    pub fn ready(&self) -> &Notify {
        &self.ready
    }

    /// Stops accepting samples. Held samples stay readable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.ready.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn sample(sequence: u64) -> Sample {
        Sample::from_axes(sequence, 0.0, 0.0, sequence as f64)
    }

    #[test]
    fn overflow_keeps_last_capacity_samples_in_order() {
        let buffer = SampleBuffer::with_capacity(5);
        for seq in 0..23 {
            assert!(buffer.push(sample(seq)));
        }
        assert_eq!(buffer.len(), 5);
        let sequences: Vec<u64> = buffer.snapshot(100).iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![18, 19, 20, 21, 22]);
        assert_eq!(buffer.total_pushed(), 23);
    }

    #[test]
    fn snapshot_never_exceeds_request_or_contents() {
        let buffer = SampleBuffer::with_capacity(10);
        assert!(buffer.snapshot(4).is_empty());
        for seq in 0..3 {
            buffer.push(sample(seq));
        }
        assert_eq!(buffer.snapshot(8).len(), 3);
        let last_two = buffer.snapshot(2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].sequence, 1);
        assert_eq!(last_two[1].sequence, 2);
    }

    #[test]
    fn shrinking_capacity_evicts_oldest() {
        let buffer = SampleBuffer::with_capacity(6);
        for seq in 0..6 {
            buffer.push(sample(seq));
        }
        buffer.set_capacity(2);
        let sequences: Vec<u64> = buffer.snapshot(6).iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![4, 5]);
        assert_eq!(buffer.capacity(), 2);
    }

    #[test]
    fn closed_buffer_rejects_pushes_but_keeps_contents() {
        let buffer = SampleBuffer::with_capacity(4);
        buffer.push(sample(0));
        buffer.close();
        assert!(!buffer.push(sample(1)));
        assert!(buffer.is_closed());
        assert_eq!(buffer.snapshot(4).len(), 1);
    }

    #[test]
    fn concurrent_snapshots_are_contiguous() {
        let buffer = Arc::new(SampleBuffer::with_capacity(64));
        let producer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for seq in 0..20_000 {
                    buffer.push(sample(seq));
                }
            })
        };

        let mut last_total = 0;
        for _ in 0..2_000 {
            let (samples, total) = buffer.snapshot_with_total(32);
            assert!(total >= last_total);
            last_total = total;
            for pair in samples.windows(2) {
                assert_eq!(pair[1].sequence, pair[0].sequence + 1);
                assert_eq!(pair[1].magnitude, pair[1].sequence as f64);
            }
            if let Some(newest) = samples.last() {
                assert_eq!(newest.sequence + 1, total);
            }
        }
        producer.join().unwrap();
        assert_eq!(buffer.total_pushed(), 20_000);
    }

    #[tokio::test]
    async fn watermark_wakes_waiting_consumer() {
        let buffer = Arc::new(SampleBuffer::with_capacity(16));
        buffer.arm_watermark(3);

        let producer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for seq in 0..3 {
                    thread::sleep(Duration::from_millis(5));
                    buffer.push(sample(seq));
                }
            })
        };

        tokio::time::timeout(Duration::from_secs(5), buffer.ready().notified())
            .await
            .expect("watermark notification");
        assert!(buffer.total_pushed() >= 3);
        producer.join().unwrap();
    }
}
