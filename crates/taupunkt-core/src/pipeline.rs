//! The measurement-to-alarm pipeline.
//!
//! [`Monitor`] owns every stage (readers, calibrators, dew-point
//! calculator, trend analyzer, risk evaluator, alarm manager) and steps
//! them once per measurement tick. Outbound alarm events and log records are
//! published to a pub-sub channel so the buzzer task, display and CSV logger
//! can each subscribe without coupling to the pipeline.
//!
//! Risk evaluation runs on its own cadence and always consumes whatever was
//! most recently recorded; it never waits for a fresh reading. A sensor that
//! stops delivering degrades to stale data and a `sensor_failure` alarm, it
//! never stalls the other sensor's path.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{PubSubChannel, Publisher, Subscriber};
use embassy_time::{Duration, Instant};

use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::alarm::{
    AlarmEvent, AlarmInputs, AlarmKind, AlarmManager, AlarmPhase, AlarmTransition, SnoozeError,
    TimeOfDay,
};
use crate::calibration::Calibrator;
use crate::config::Config;
use crate::dewpoint::{DewPointCalculator, DewPointResult};
use crate::error::ConfigError;
use crate::reader::{SensorReader, SensorReading, SensorStatus};
use crate::risk::{RiskEvaluator, RiskLevel};
use crate::sensors::{Sensor, SensorId};
use crate::trend::{MetricId, MetricKind, TrendAnalyzer, TrendSummary, TrendWindow};

/// Channel capacity for pub-sub events.
/// Sized to hold a full cycle's worth of transitions without blocking.
pub const EVENT_CHANNEL_CAPACITY: usize = 8;

/// Number of subscribers that can listen to monitor events
/// - Subscriber 0: buzzer/LED driver
/// - Subscriber 1: display / CSV logger
pub const EVENT_SUBSCRIBERS: usize = 2;

/// Number of publishers (just the monitor).
pub const EVENT_PUBLISHERS: usize = 1;

pub type MonitorChannel = PubSubChannel<
    CriticalSectionRawMutex,
    MonitorEvent,
    EVENT_CHANNEL_CAPACITY,
    EVENT_SUBSCRIBERS,
    EVENT_PUBLISHERS,
>;

pub type MonitorPublisher<'a> = Publisher<
    'a,
    CriticalSectionRawMutex,
    MonitorEvent,
    EVENT_CHANNEL_CAPACITY,
    EVENT_SUBSCRIBERS,
    EVENT_PUBLISHERS,
>;

pub type MonitorSubscriber<'a> = Subscriber<
    'a,
    CriticalSectionRawMutex,
    MonitorEvent,
    EVENT_CHANNEL_CAPACITY,
    EVENT_SUBSCRIBERS,
    EVENT_PUBLISHERS,
>;

/// Events published by the monitor for external collaborators.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// An alarm was raised or resumed; start pattern playback.
    Alarm(AlarmEvent),
    /// An alarm was snoozed; cancel playback, the alarm stays pending.
    AlarmSilenced(AlarmKind),
    /// An alarm returned to idle; cancel playback.
    AlarmCleared(AlarmKind),
    /// Periodic record for the CSV logger.
    Log(LogRecord),
}

/// Per-sensor slice of a log record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub dew_point_c: Option<f32>,
    pub margin_c: Option<f32>,
    /// The dew point could not be refreshed this cycle and is carried over.
    pub dew_point_stale: bool,
    pub status: SensorStatus,
    pub trend: TrendSummary,
    pub trend_label: &'static str,
    /// Short-window temperature average.
    pub temperature_avg_c: Option<f32>,
}

/// One line of the measurement log, consumed by the external CSV logger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRecord {
    pub timestamp_secs: u64,
    pub sensors: [SensorFrame; SensorId::COUNT],
    pub risk: Option<RiskLevel>,
}

impl LogRecord {
    pub const CSV_HEADER: &'static str = "timestamp,temp_in,hum_in,dp_in,temp_out,hum_out,\
dp_out,temp_in_avg,temp_out_avg,risk,trend_in,trend_out,status_in,status_out";

    /// Render in the historic column layout. Missing values stay empty.
    pub fn to_csv_line(&self) -> String<256> {
        fn field(line: &mut String<256>, value: Option<f32>) {
            if let Some(v) = value {
                let _ = write!(line, "{v:.2}");
            }
            let _ = line.push(',');
        }

        let mut line = String::new();
        let _ = write!(line, "{},", self.timestamp_secs);
        for frame in &self.sensors {
            field(&mut line, frame.temperature_c);
            field(&mut line, frame.humidity_pct);
            field(&mut line, frame.dew_point_c);
        }
        field(&mut line, self.sensors[0].temperature_avg_c);
        field(&mut line, self.sensors[1].temperature_avg_c);
        let _ = write!(
            line,
            "{},{},{},{},{}",
            self.risk.map_or("unknown", RiskLevel::label),
            self.sensors[0].trend_label,
            self.sensors[1].trend_label,
            self.sensors[0].status.label(),
            self.sensors[1].status.label(),
        );
        line
    }
}

pub struct Monitor<'a, S1, S2> {
    config: &'a Config,
    indoor: SensorReader<S1>,
    outdoor: SensorReader<S2>,
    calibrators: [Calibrator; SensorId::COUNT],
    dew_point: DewPointCalculator,
    trends: TrendAnalyzer,
    risk: RiskEvaluator,
    alarms: AlarmManager,
    publisher: MonitorPublisher<'a>,

    last_reading: [Option<SensorReading>; SensorId::COUNT],
    last_dew: [Option<DewPointResult>; SensorId::COUNT],
    dew_stale: [bool; SensorId::COUNT],
    last_risk: Option<RiskLevel>,
    last_health_check: Option<Instant>,
    last_log: Option<Instant>,
}

impl<'a, S1: Sensor, S2: Sensor> Monitor<'a, S1, S2> {
    /// Build the pipeline from a validated configuration snapshot.
    pub fn new(
        config: &'a Config,
        indoor: S1,
        outdoor: S2,
        publisher: MonitorPublisher<'a>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            indoor: SensorReader::new(SensorId::Indoor, indoor, &config.measurement),
            outdoor: SensorReader::new(SensorId::Outdoor, outdoor, &config.measurement),
            calibrators: [
                Calibrator::new(config.calibration.indoor),
                Calibrator::new(config.calibration.outdoor),
            ],
            dew_point: DewPointCalculator::new(config.dew_point.precision_digits),
            trends: TrendAnalyzer::new(&config.trends),
            risk: RiskEvaluator::new(&config.dew_point),
            alarms: AlarmManager::new(&config.alarms),
            publisher,
            last_reading: [None; SensorId::COUNT],
            last_dew: [None; SensorId::COUNT],
            dew_stale: [false; SensorId::COUNT],
            last_risk: None,
            last_health_check: None,
            last_log: None,
            config,
        })
    }

    /// One measurement tick: poll, calibrate, compute, record, evaluate,
    /// alarm, log. Returns the events it also published.
    pub async fn run_cycle(
        &mut self,
        now: Instant,
        local: TimeOfDay,
    ) -> Vec<MonitorEvent, EVENT_CHANNEL_CAPACITY> {
        self.acquire(SensorId::Indoor, now).await;
        self.acquire(SensorId::Outdoor, now).await;
        self.check_health(now).await;
        self.evaluate_risk(now);

        let mut events: Vec<MonitorEvent, EVENT_CHANNEL_CAPACITY> = Vec::new();

        let inputs = AlarmInputs {
            risk: self.last_risk,
            sensor_failure: self.sensor_failure_condition(now),
            system_error: false,
        };
        for transition in self.alarms.update(now, local, &inputs) {
            let event = match transition {
                AlarmTransition::Raised(alarm) => MonitorEvent::Alarm(alarm),
                AlarmTransition::Cleared(kind) => MonitorEvent::AlarmCleared(kind),
            };
            let _ = events.push(event);
        }

        if self.log_due(now) {
            let _ = events.push(MonitorEvent::Log(self.log_record(now)));
        }

        for event in events.iter() {
            self.publisher.publish(event.clone()).await;
        }
        events
    }

    /// Poll one sensor and push everything derivable from it.
    async fn acquire(&mut self, id: SensorId, now: Instant) {
        let i = id.index();
        if !self.port_enabled(id) {
            return;
        }

        let reading = match id {
            SensorId::Indoor => self.indoor.poll(now).await,
            SensorId::Outdoor => self.outdoor.poll(now).await,
        };
        self.last_reading[i] = Some(reading);

        if !reading.valid {
            self.dew_stale[i] = true;
            return;
        }

        let calibrated = match self.calibrators[i].calibrate(&reading) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("{}: calibration rejected reading: {}", id.label(), e);
                self.dew_stale[i] = true;
                return;
            }
        };

        self.trends.record(
            MetricId::new(id, MetricKind::Temperature),
            calibrated.temperature_c,
            now,
        );
        self.trends.record(
            MetricId::new(id, MetricKind::Humidity),
            calibrated.humidity_pct,
            now,
        );

        match self.dew_point.compute(&calibrated) {
            Ok(result) => {
                self.trends
                    .record(MetricId::new(id, MetricKind::Margin), result.margin_c, now);
                self.last_dew[i] = Some(result);
                self.dew_stale[i] = false;
            }
            Err(e) => {
                // Keep the previous dew point; risk evaluation sees it as
                // stale via the flag, the cycle goes on.
                log::warn!("{}: dew point not computed: {}", id.label(), e);
                self.dew_stale[i] = true;
            }
        }
    }

    async fn check_health(&mut self, now: Instant) {
        if !self.config.measurement.enable_sensor_health_check {
            return;
        }
        let interval =
            Duration::from_secs(self.config.measurement.health_check_interval_sec as u64);
        if matches!(self.last_health_check, Some(last) if now - last < interval) {
            return;
        }
        self.last_health_check = Some(now);

        if self.port_enabled(SensorId::Indoor) {
            self.indoor.check_health().await;
        }
        if self.port_enabled(SensorId::Outdoor) {
            self.outdoor.check_health().await;
        }
    }

    /// Cadence-gated risk evaluation over the worst current margin.
    fn evaluate_risk(&mut self, now: Instant) {
        if !self.risk.poll_due(now) {
            return;
        }

        // The sensor closest to condensation drives the assessment.
        let worst = SensorId::ALL
            .iter()
            .copied()
            .filter(|id| self.port_enabled(*id))
            .filter_map(|id| self.last_dew[id.index()].map(|dew| (id, dew)))
            .min_by(|(_, a), (_, b)| {
                a.margin_c
                    .partial_cmp(&b.margin_c)
                    .unwrap_or(core::cmp::Ordering::Equal)
            });

        let Some((id, dew)) = worst else {
            self.last_risk = None;
            return;
        };

        let margin_metric = MetricId::new(id, MetricKind::Margin);
        let slope = self.trends.slope(margin_metric, TrendWindow::Short, now);
        let history = self.trends.average(margin_metric, TrendWindow::Long, now);

        let level = self.risk.evaluate(dew.margin_c, slope, history);
        if self.last_risk != Some(level) {
            log::info!(
                "risk level {} (margin {:.2} °C at {})",
                level.label(),
                dew.margin_c,
                id.label()
            );
        }
        self.last_risk = Some(level);
    }

    /// Health latch or a fully stale measurement path arm the
    /// `sensor_failure` alarm candidate.
    fn sensor_failure_condition(&self, now: Instant) -> bool {
        let mut any_enabled = false;
        let mut all_stale = true;
        let mut any_unhealthy = false;

        for id in SensorId::ALL {
            if !self.port_enabled(id) {
                continue;
            }
            any_enabled = true;
            let (healthy, stale) = match id {
                SensorId::Indoor => (self.indoor.is_healthy(), self.indoor.is_stale(now)),
                SensorId::Outdoor => (self.outdoor.is_healthy(), self.outdoor.is_stale(now)),
            };
            any_unhealthy |= !healthy;
            all_stale &= stale;
        }

        any_unhealthy || (any_enabled && all_stale)
    }

    fn log_due(&mut self, now: Instant) -> bool {
        let interval = Duration::from_secs(self.config.logging.log_interval_sec as u64);
        match self.last_log {
            Some(last) if now - last < interval => false,
            _ => {
                self.last_log = Some(now);
                true
            }
        }
    }

    fn port_enabled(&self, id: SensorId) -> bool {
        match id {
            SensorId::Indoor => self.config.sensors.indoor.enabled,
            SensorId::Outdoor => self.config.sensors.outdoor.enabled,
        }
    }

    /// Current per-sensor view, also used for log records and displays.
    pub fn frames(&self, now: Instant) -> [SensorFrame; SensorId::COUNT] {
        SensorId::ALL.map(|id| {
            let i = id.index();
            let status = match id {
                SensorId::Indoor => self.indoor.status(now),
                SensorId::Outdoor => self.outdoor.status(now),
            };
            let reading = self.last_reading[i].filter(|r| r.timestamp.is_some());
            let dew = self.last_dew[i];
            let trend = self
                .trends
                .summary(MetricId::new(id, MetricKind::Temperature), now);

            SensorFrame {
                temperature_c: reading.map(|r| r.temperature_c),
                humidity_pct: reading.map(|r| r.humidity_pct),
                dew_point_c: dew.map(|d| d.dew_point_c),
                margin_c: dew.map(|d| d.margin_c),
                dew_point_stale: self.dew_stale[i],
                status,
                trend,
                trend_label: trend.label(self.trends.confirmation_points()),
                temperature_avg_c: self.trends.average(
                    MetricId::new(id, MetricKind::Temperature),
                    TrendWindow::Short,
                    now,
                ),
            }
        })
    }

    fn log_record(&self, now: Instant) -> LogRecord {
        LogRecord {
            timestamp_secs: now.as_secs(),
            sensors: self.frames(now),
            risk: self.last_risk,
        }
    }

    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.last_risk
    }

    pub fn alarm_phase(&self, kind: AlarmKind) -> AlarmPhase {
        self.alarms.phase(kind)
    }

    /// Snooze an alarm on behalf of the user; playback cancellation is
    /// signalled to subscribers immediately.
    pub async fn snooze(&mut self, kind: AlarmKind, now: Instant) -> Result<(), SnoozeError> {
        self.alarms.snooze(kind, now)?;
        self.publisher.publish(MonitorEvent::AlarmSilenced(kind)).await;
        Ok(())
    }

    /// Manually acknowledge an alarm.
    pub async fn clear(&mut self, kind: AlarmKind) {
        self.alarms.clear(kind);
        self.publisher.publish(MonitorEvent::AlarmCleared(kind)).await;
    }
}
