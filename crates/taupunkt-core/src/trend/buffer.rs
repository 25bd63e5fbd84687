//! Two-tier sample storage for one metric.
//!
//! The recent tier is a FIFO ring at full resolution; once it reaches its
//! logical capacity, evicted samples are folded into the long-term tier in
//! groups of `compression_ratio` (averaged), so a bounded amount of memory
//! still covers a long history at coarse resolution.

use heapless::{Deque, Vec};

use super::{MAX_COMPACTED_POINTS, MAX_DATA_POINTS, TrendSample, WINDOW_CAPACITY};

/// Largest supported compaction group.
const COMPACTION_GROUP_MAX: usize = 32;

pub(super) struct MetricBuffer {
    recent: Deque<TrendSample, MAX_DATA_POINTS>,
    compacted: Deque<TrendSample, MAX_COMPACTED_POINTS>,
    pending: Vec<TrendSample, COMPACTION_GROUP_MAX>,
    /// Logical ring capacity, `<= MAX_DATA_POINTS`.
    capacity: usize,
    /// Group size for the long-term tier; 1 disables compaction.
    compression_ratio: usize,
}

impl MetricBuffer {
    pub(super) fn new(capacity: usize, compression_ratio: usize) -> Self {
        Self {
            recent: Deque::new(),
            compacted: Deque::new(),
            pending: Vec::new(),
            capacity: capacity.clamp(1, MAX_DATA_POINTS),
            compression_ratio: compression_ratio.clamp(1, COMPACTION_GROUP_MAX),
        }
    }

    /// Append a sample, evicting FIFO once the logical capacity is reached.
    pub(super) fn push(&mut self, sample: TrendSample) {
        while self.recent.len() >= self.capacity {
            if let Some(evicted) = self.recent.pop_front() {
                self.compact(evicted);
            }
        }
        let _ = self.recent.push_back(sample);
    }

    fn compact(&mut self, evicted: TrendSample) {
        if self.compression_ratio <= 1 {
            return;
        }
        let _ = self.pending.push(evicted);
        if self.pending.len() < self.compression_ratio {
            return;
        }

        let count = self.pending.len() as f32;
        let value = self.pending.iter().map(|(_, v)| v).sum::<f32>() / count;
        // The group keeps its earliest timestamp, same as a rollup window.
        let ts = self.pending[0].0;

        if self.compacted.is_full() {
            self.compacted.pop_front();
        }
        let _ = self.compacted.push_back((ts, value));
        self.pending.clear();
    }

    /// Samples within the window, oldest first, compacted tier included.
    pub(super) fn window_samples(
        &self,
        now_secs: u32,
        window_secs: u32,
    ) -> Vec<TrendSample, WINDOW_CAPACITY> {
        let window_start = now_secs.saturating_sub(window_secs);

        self.compacted
            .iter()
            .chain(self.recent.iter())
            .filter(|(ts, _)| *ts >= window_start)
            .copied()
            .collect()
    }

    pub(super) fn len(&self) -> usize {
        self.recent.len()
    }

    pub(super) fn oldest_timestamp(&self) -> Option<u32> {
        self.recent.front().map(|(ts, _)| *ts)
    }

    pub(super) fn compacted_len(&self) -> usize {
        self.compacted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_eviction_at_logical_capacity() {
        let mut buffer = MetricBuffer::new(4, 1);
        for i in 0..5u32 {
            buffer.push((i * 10, i as f32));
        }
        assert_eq!(buffer.len(), 4);
        // Earliest timestamp (0) was dropped, 10 is now the oldest.
        assert_eq!(buffer.oldest_timestamp(), Some(10));
    }

    #[test]
    fn evicted_samples_are_compacted_in_groups() {
        let mut buffer = MetricBuffer::new(4, 2);
        for i in 0..8u32 {
            buffer.push((i * 10, i as f32));
        }
        // 4 evictions → 2 compacted points
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.compacted_len(), 2);

        let all = buffer.window_samples(70, 1000);
        // Compacted points carry their group's first timestamp and average.
        assert_eq!(all[0], (0, 0.5));
        assert_eq!(all[1], (20, 2.5));
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn window_filters_old_samples() {
        let mut buffer = MetricBuffer::new(8, 1);
        for i in 0..6u32 {
            buffer.push((i * 60, 1.0));
        }
        let recent = buffer.window_samples(300, 120);
        assert_eq!(recent.len(), 3); // 180, 240, 300
    }
}
