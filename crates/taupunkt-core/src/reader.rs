//! Sensor polling with retry, hard timeout, staleness and health tracking.
//!
//! The reader never blocks the pipeline: every poll returns a
//! [`SensorReading`], valid or not, within the configured deadline. Transport
//! errors are retried (the driver owns its backoff); out-of-range values are
//! discarded without retry; a timeout aborts the poll outright. Health
//! checking runs on its own path and latches independently of measurements,
//! so a sensor that answers garbage and one that answers nothing both end up
//! escalated the same way.

use embassy_time::{Duration, Instant, with_timeout};

use crate::config::MeasurementConfig;
use crate::sensors::{RawMeasurement, Sensor, SensorId, validate_range};

/// Consecutive failed probes before the health latch trips.
const HEALTH_FAILURE_LIMIT: u8 = 2;

/// Slack added to `warm_up_time_sec` for the per-attempt deadline.
const READ_GRACE: Duration = Duration::from_secs(1);

/// Result of one poll cycle. Immutable once produced.
///
/// When `valid` is false the values and timestamp are those of the last
/// successful read (NaN / `None` if there has never been one), so consumers
/// can still display last-known-good data with its age.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub sensor_id: SensorId,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub timestamp: Option<Instant>,
    pub valid: bool,
}

/// Health/freshness classification for display and log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    Ok,
    /// Last valid reading is older than `max_sensor_age_sec`.
    Stale,
    /// Health latch tripped or no valid reading was ever produced.
    Failed,
}

impl SensorStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Stale => "stale",
            Self::Failed => "failed",
        }
    }
}

pub struct SensorReader<S> {
    sensor: S,
    id: SensorId,
    retry_count: u8,
    read_timeout: Duration,
    max_age: Duration,
    health_check_enabled: bool,
    last_valid: Option<(RawMeasurement, Instant)>,
    health_failures: u8,
    healthy: bool,
}

impl<S: Sensor> SensorReader<S> {
    pub fn new(id: SensorId, sensor: S, cfg: &MeasurementConfig) -> Self {
        Self {
            sensor,
            id,
            retry_count: cfg.retry_count.max(1),
            read_timeout: Duration::from_secs(cfg.warm_up_time_sec as u64) + READ_GRACE,
            max_age: Duration::from_secs(cfg.max_sensor_age_sec as u64),
            health_check_enabled: cfg.enable_sensor_health_check,
            last_valid: None,
            health_failures: 0,
            healthy: true,
        }
    }

    pub const fn id(&self) -> SensorId {
        self.id
    }

    /// Poll the sensor once. Always returns within the configured deadline.
    pub async fn poll(&mut self, now: Instant) -> SensorReading {
        for attempt in 1..=self.retry_count {
            match with_timeout(self.read_timeout, self.sensor.read()).await {
                Err(_timed_out) => {
                    // Aborting beats wedging the whole pipeline behind a dead bus.
                    log::warn!("{}: poll timed out, giving up this cycle", self.id.label());
                    return self.invalid_reading();
                }
                Ok(Ok(raw)) => match validate_range(self.id.label(), raw) {
                    Ok(raw) => {
                        self.last_valid = Some((raw, now));
                        return SensorReading {
                            sensor_id: self.id,
                            temperature_c: raw.temperature_c,
                            humidity_pct: raw.humidity_pct,
                            timestamp: Some(now),
                            valid: true,
                        };
                    }
                    Err(e) => {
                        // A retry would re-read the same implausible airmass.
                        log::warn!("{}: discarding reading: {}", self.id.label(), e);
                        return self.invalid_reading();
                    }
                },
                Ok(Err(e)) => {
                    log::warn!(
                        "{}: read attempt {}/{} failed: {}",
                        self.id.label(),
                        attempt,
                        self.retry_count,
                        e
                    );
                }
            }
        }

        self.invalid_reading()
    }

    fn invalid_reading(&self) -> SensorReading {
        match self.last_valid {
            Some((raw, ts)) => SensorReading {
                sensor_id: self.id,
                temperature_c: raw.temperature_c,
                humidity_pct: raw.humidity_pct,
                timestamp: Some(ts),
                valid: false,
            },
            None => SensorReading {
                sensor_id: self.id,
                temperature_c: f32::NAN,
                humidity_pct: f32::NAN,
                timestamp: None,
                valid: false,
            },
        }
    }

    /// Age-based staleness, independent of the last poll's validity.
    pub fn is_stale(&self, now: Instant) -> bool {
        match self.last_valid {
            Some((_, ts)) => now - ts > self.max_age,
            None => true,
        }
    }

    pub fn status(&self, now: Instant) -> SensorStatus {
        if !self.healthy || self.last_valid.is_none() {
            SensorStatus::Failed
        } else if self.is_stale(now) {
            SensorStatus::Stale
        } else {
            SensorStatus::Ok
        }
    }

    /// Run the health probe and update the latch.
    ///
    /// A single flaky probe is forgiven; [`HEALTH_FAILURE_LIMIT`] consecutive
    /// failures trip the latch, and one success resets it.
    pub async fn check_health(&mut self) -> bool {
        if !self.health_check_enabled {
            return self.healthy;
        }
        if self.sensor.health_check().await {
            self.health_failures = 0;
            self.healthy = true;
        } else {
            self.health_failures = self.health_failures.saturating_add(1);
            if self.health_failures >= HEALTH_FAILURE_LIMIT {
                if self.healthy {
                    log::error!("{}: health check latched failed", self.id.label());
                }
                self.healthy = false;
            }
        }
        self.healthy
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }
}
