//! Bounded historical series and multi-window trend derivation.
//!
//! Each metric (temperature, humidity, margin, per sensor) keeps its own
//! two-tier ring buffer and a direction tracker. Slopes come from a
//! least-squares fit over the samples inside the configured short/medium/
//! long-term windows; the direction tracker debounces sensor noise with the
//! confirmation-point rule so a single spike never flips the classification.

mod buffer;

use embassy_time::Instant;

use crate::config::{AnalysisPeriods, TrendDetection, TrendsConfig};
use crate::sensors::SensorId;

use buffer::MetricBuffer;

/// Hard capacity of the high-resolution ring per metric; the configured
/// `max_data_points` is the logical capacity within it.
pub const MAX_DATA_POINTS: usize = 128;
/// Capacity of the compacted long-term tier per metric.
pub const MAX_COMPACTED_POINTS: usize = 64;
/// Scratch capacity for window queries across both tiers.
pub const WINDOW_CAPACITY: usize = MAX_DATA_POINTS + MAX_COMPACTED_POINTS;

/// One stored sample: seconds timestamp and value.
pub type TrendSample = (u32, f32);

/// What a metric series tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Temperature,
    Humidity,
    /// Margin between ambient temperature and dew point.
    Margin,
}

impl MetricKind {
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        match self {
            Self::Temperature => 0,
            Self::Humidity => 1,
            Self::Margin => 2,
        }
    }
}

/// A (sensor, metric) pair addressing one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricId {
    pub sensor: SensorId,
    pub kind: MetricKind,
}

impl MetricId {
    pub const fn new(sensor: SensorId, kind: MetricKind) -> Self {
        Self { sensor, kind }
    }

    const fn index(self) -> usize {
        self.sensor.index() * MetricKind::COUNT + self.kind.index()
    }
}

const METRIC_COUNT: usize = SensorId::COUNT * MetricKind::COUNT;

/// Analysis window selector, resolved through `analysis_periods`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendWindow {
    Short,
    Medium,
    Long,
}

impl TrendWindow {
    fn secs(self, periods: &AnalysisPeriods) -> u32 {
        let minutes = match self {
            Self::Short => periods.short_term_min,
            Self::Medium => periods.medium_term_min,
            Self::Long => periods.long_term_min,
        };
        minutes as u32 * 60
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendDirection {
    Rising,
    Falling,
    #[default]
    Stable,
}

impl TrendDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Stable => "stable",
        }
    }
}

/// Snapshot of one metric's trend state, as embedded in log records.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrendSummary {
    pub direction: TrendDirection,
    pub confirmed: bool,
    pub rapid: bool,
    /// Least-squares slopes in value units per minute, per window.
    pub slope_short: Option<f32>,
    pub slope_medium: Option<f32>,
    pub slope_long: Option<f32>,
    pub samples: u32,
}

impl TrendSummary {
    /// CSV label compatible with the historic log format.
    pub fn label(&self, confirmation_points: u8) -> &'static str {
        if self.samples <= confirmation_points as u32 {
            "initializing"
        } else if self.confirmed {
            self.direction.label()
        } else {
            "stable"
        }
    }
}

/// Debounce state: a trend only counts once enough consecutive
/// sample-to-sample changes point the same way.
#[derive(Debug, Clone, Copy, Default)]
struct DirectionTracker {
    last: Option<f32>,
    direction: TrendDirection,
    run: u8,
    rapid_run: u8,
    samples: u32,
}

impl DirectionTracker {
    fn update(&mut self, value: f32, detection: &TrendDetection) {
        self.samples = self.samples.saturating_add(1);

        if let Some(prev) = self.last {
            let delta = value - prev;
            if delta.abs() >= detection.min_change_threshold {
                let direction = if delta > 0.0 {
                    TrendDirection::Rising
                } else {
                    TrendDirection::Falling
                };
                if direction == self.direction {
                    self.run = self.run.saturating_add(1);
                } else {
                    self.direction = direction;
                    self.run = 1;
                    self.rapid_run = 0;
                }
                if delta.abs() >= detection.rapid_change_threshold {
                    self.rapid_run = self.rapid_run.saturating_add(1);
                } else {
                    self.rapid_run = 0;
                }
            } else {
                self.direction = TrendDirection::Stable;
                self.run = 0;
                self.rapid_run = 0;
            }
        }

        self.last = Some(value);
    }
}

pub struct TrendAnalyzer {
    buffers: [MetricBuffer; METRIC_COUNT],
    trackers: [DirectionTracker; METRIC_COUNT],
    periods: AnalysisPeriods,
    detection: TrendDetection,
}

impl TrendAnalyzer {
    pub fn new(cfg: &TrendsConfig) -> Self {
        let capacity = cfg.storage.max_data_points;
        let ratio = cfg.storage.compression_ratio as usize;
        Self {
            buffers: core::array::from_fn(|_| MetricBuffer::new(capacity, ratio)),
            trackers: [DirectionTracker::default(); METRIC_COUNT],
            periods: cfg.analysis_periods,
            detection: cfg.detection,
        }
    }

    /// Append a sample for a metric.
    pub fn record(&mut self, metric: MetricId, value: f32, now: Instant) {
        let i = metric.index();
        self.buffers[i].push((now.as_secs() as u32, value));
        self.trackers[i].update(value, &self.detection);
    }

    /// Rate of change over the window, in value units per minute.
    ///
    /// `None` until at least two samples fall inside the window.
    pub fn slope(&self, metric: MetricId, window: TrendWindow, now: Instant) -> Option<f32> {
        let samples = self.buffers[metric.index()]
            .window_samples(now.as_secs() as u32, window.secs(&self.periods));
        if samples.len() < 2 {
            return None;
        }

        let t0 = samples[0].0;
        let n = samples.len() as f32;
        let mut sum_x = 0.0f32;
        let mut sum_y = 0.0f32;
        let mut sum_xx = 0.0f32;
        let mut sum_xy = 0.0f32;
        for (ts, value) in samples.iter() {
            let x = (ts - t0) as f32 / 60.0;
            sum_x += x;
            sum_y += value;
            sum_xx += x * x;
            sum_xy += x * value;
        }

        let denom = n * sum_xx - sum_x * sum_x;
        if denom.abs() < 1e-6 {
            return None;
        }
        Some((n * sum_xy - sum_x * sum_y) / denom)
    }

    /// Plain average over the window, `None` when empty.
    pub fn average(&self, metric: MetricId, window: TrendWindow, now: Instant) -> Option<f32> {
        let samples = self.buffers[metric.index()]
            .window_samples(now.as_secs() as u32, window.secs(&self.periods));
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().map(|(_, v)| v).sum::<f32>() / samples.len() as f32)
    }

    /// Current debounced direction: `(direction, confirmed, rapid)`.
    pub fn direction(&self, metric: MetricId) -> (TrendDirection, bool, bool) {
        let tracker = &self.trackers[metric.index()];
        let points = self.detection.trend_confirmation_points;
        (
            tracker.direction,
            tracker.run >= points,
            tracker.rapid_run >= points,
        )
    }

    pub fn summary(&self, metric: MetricId, now: Instant) -> TrendSummary {
        let (direction, confirmed, rapid) = self.direction(metric);
        TrendSummary {
            direction,
            confirmed,
            rapid,
            slope_short: self.slope(metric, TrendWindow::Short, now),
            slope_medium: self.slope(metric, TrendWindow::Medium, now),
            slope_long: self.slope(metric, TrendWindow::Long, now),
            samples: self.trackers[metric.index()].samples,
        }
    }

    pub fn len(&self, metric: MetricId) -> usize {
        self.buffers[metric.index()].len()
    }

    pub fn is_empty(&self, metric: MetricId) -> bool {
        self.len(metric) == 0
    }

    pub fn oldest_timestamp(&self, metric: MetricId) -> Option<u32> {
        self.buffers[metric.index()].oldest_timestamp()
    }

    pub fn confirmation_points(&self) -> u8 {
        self.detection.trend_confirmation_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendStorage;

    const METRIC: MetricId = MetricId::new(SensorId::Indoor, MetricKind::Temperature);

    fn config(max_data_points: usize, compression_ratio: u8) -> TrendsConfig {
        TrendsConfig {
            analysis_periods: AnalysisPeriods {
                short_term_min: 5,
                medium_term_min: 15,
                long_term_min: 60,
            },
            detection: TrendDetection {
                min_change_threshold: 0.5,
                rapid_change_threshold: 2.0,
                trend_confirmation_points: 3,
            },
            storage: TrendStorage {
                max_data_points,
                compression_ratio,
            },
        }
    }

    fn at(secs: u64) -> Instant {
        Instant::from_secs(secs)
    }

    #[test]
    fn ring_buffer_evicts_fifo() {
        let mut trends = TrendAnalyzer::new(&config(8, 1));
        for i in 0..9u64 {
            trends.record(METRIC, i as f32, at(i * 60));
        }
        assert_eq!(trends.len(METRIC), 8);
        // The earliest timestamp (0) is gone.
        assert_eq!(trends.oldest_timestamp(METRIC), Some(60));
    }

    #[test]
    fn three_rapid_rises_confirm_a_trend() {
        let mut trends = TrendAnalyzer::new(&config(32, 1));
        trends.record(METRIC, 10.0, at(0));
        trends.record(METRIC, 12.5, at(60));
        trends.record(METRIC, 15.0, at(120));
        let (_, confirmed, _) = trends.direction(METRIC);
        assert!(!confirmed, "two qualifying rises must not confirm");

        trends.record(METRIC, 17.5, at(180));
        let (direction, confirmed, rapid) = trends.direction(METRIC);
        assert_eq!(direction, TrendDirection::Rising);
        assert!(confirmed);
        assert!(rapid);
    }

    #[test]
    fn sub_threshold_changes_reset_the_run() {
        let mut trends = TrendAnalyzer::new(&config(32, 1));
        trends.record(METRIC, 10.0, at(0));
        trends.record(METRIC, 12.5, at(60));
        trends.record(METRIC, 15.0, at(120));
        trends.record(METRIC, 15.1, at(180)); // below min_change_threshold
        trends.record(METRIC, 17.6, at(240));
        let (_, confirmed, _) = trends.direction(METRIC);
        assert!(!confirmed);
    }

    #[test]
    fn direction_flip_restarts_counting() {
        let mut trends = TrendAnalyzer::new(&config(32, 1));
        trends.record(METRIC, 10.0, at(0));
        trends.record(METRIC, 13.0, at(60));
        trends.record(METRIC, 16.0, at(120));
        trends.record(METRIC, 13.0, at(180)); // falls
        let (direction, confirmed, _) = trends.direction(METRIC);
        assert_eq!(direction, TrendDirection::Falling);
        assert!(!confirmed);
    }

    #[test]
    fn slow_drift_confirms_without_rapid_flag() {
        let mut trends = TrendAnalyzer::new(&config(32, 1));
        for i in 0..5u64 {
            trends.record(METRIC, 10.0 + i as f32 * 0.6, at(i * 60));
        }
        let (direction, confirmed, rapid) = trends.direction(METRIC);
        assert_eq!(direction, TrendDirection::Rising);
        assert!(confirmed);
        assert!(!rapid);
    }

    #[test]
    fn slope_is_least_squares_per_minute() {
        let mut trends = TrendAnalyzer::new(&config(32, 1));
        // 1 °C per minute, exactly linear.
        for i in 0..5u64 {
            trends.record(METRIC, i as f32, at(i * 60));
        }
        let slope = trends.slope(METRIC, TrendWindow::Short, at(240)).unwrap();
        assert!((slope - 1.0).abs() < 1e-4, "slope {slope}");
    }

    #[test]
    fn slope_needs_two_samples_in_window() {
        let mut trends = TrendAnalyzer::new(&config(32, 1));
        assert_eq!(trends.slope(METRIC, TrendWindow::Short, at(0)), None);

        trends.record(METRIC, 1.0, at(0));
        assert_eq!(trends.slope(METRIC, TrendWindow::Short, at(0)), None);

        // Second sample is outside the 5-minute short window.
        trends.record(METRIC, 2.0, at(1000));
        assert_eq!(trends.slope(METRIC, TrendWindow::Short, at(1000)), None);
    }

    #[test]
    fn average_respects_the_window() {
        let mut trends = TrendAnalyzer::new(&config(64, 1));
        trends.record(METRIC, 100.0, at(0)); // outside the short window later
        for i in 0..3u64 {
            trends.record(METRIC, 10.0, at(3600 + i * 60));
        }
        let avg = trends.average(METRIC, TrendWindow::Short, at(3720)).unwrap();
        assert_eq!(avg, 10.0);
    }

    #[test]
    fn long_window_sees_compacted_history() {
        let mut trends = TrendAnalyzer::new(&config(8, 2));
        // 16 samples a minute apart; half get evicted and compacted.
        for i in 0..16u64 {
            trends.record(METRIC, 5.0, at(i * 60));
        }
        let avg = trends.average(METRIC, TrendWindow::Long, at(900)).unwrap();
        assert_eq!(avg, 5.0);
        let samples_seen = trends.len(METRIC);
        assert_eq!(samples_seen, 8);
    }
}
