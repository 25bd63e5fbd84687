//! Immutable configuration snapshot.
//!
//! The surrounding application loads and deserializes this once at startup
//! (from JSON, postcard, whatever its storage speaks; not our concern),
//! calls [`Config::validate`], and hands the value to every component by
//! reference. Nothing in the core mutates it.
//!
//! Field names follow the on-disk schema of the device configuration, so the
//! serde derives double as the schema documentation.

use serde::{Deserialize, Serialize};

use crate::alarm::{BuzzerPattern, TimeOfDay};
use crate::error::ConfigError;
use crate::sensors::SensorKind;
use crate::trend::MAX_DATA_POINTS;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub measurement: MeasurementConfig,
    pub sensors: SensorsConfig,
    pub calibration: CalibrationConfig,
    pub dew_point: DewPointConfig,
    pub trends: TrendsConfig,
    pub alarms: AlarmsConfig,
    pub logging: LoggingConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MeasurementConfig {
    /// Seconds between measurement cycles.
    pub interval_sec: u32,
    /// Readings older than this count as stale regardless of validity.
    pub max_sensor_age_sec: u32,
    /// Upper bound on a single driver read, including conversion time.
    pub warm_up_time_sec: u32,
    /// Transport-failure attempts per poll.
    pub retry_count: u8,
    pub enable_sensor_health_check: bool,
    /// Seconds between health probes when enabled.
    pub health_check_interval_sec: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SensorsConfig {
    pub indoor: SensorPortConfig,
    pub outdoor: SensorPortConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SensorPortConfig {
    pub kind: SensorKind,
    pub address: u8,
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConfig {
    pub indoor: SensorOffsets,
    pub outdoor: SensorOffsets,
}

/// Additive per-sensor corrections.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorOffsets {
    pub temperature_offset: f32,
    pub humidity_offset: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DewPointConfig {
    /// Decimal places kept on computed dew points and margins.
    pub precision_digits: u8,
    pub thresholds: RiskThresholds,
    pub risk_evaluation: RiskEvaluationConfig,
}

/// Margin thresholds in °C, strictly decreasing.
///
/// The margin is ambient temperature minus dew point; the smaller it gets,
/// the closer surfaces are to condensation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub safety_margin_c: f32,
    pub warning_c: f32,
    pub critical_c: f32,
    pub alarm_c: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RiskEvaluationConfig {
    /// Risk is evaluated on this cadence, not per reading.
    pub update_interval_sec: u32,
    pub trend_weight: f32,
    pub history_weight: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrendsConfig {
    pub analysis_periods: AnalysisPeriods,
    pub detection: TrendDetection,
    pub storage: TrendStorage,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AnalysisPeriods {
    pub short_term_min: u16,
    pub medium_term_min: u16,
    pub long_term_min: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrendDetection {
    /// Smallest sample-to-sample change that counts toward a trend.
    pub min_change_threshold: f32,
    /// Change that additionally flags the trend as rapid.
    pub rapid_change_threshold: f32,
    /// Consecutive qualifying changes before a trend is confirmed.
    pub trend_confirmation_points: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrendStorage {
    /// Logical capacity of the high-resolution ring per metric.
    pub max_data_points: usize,
    /// Samples averaged into one long-term point on eviction; 1 disables
    /// compaction.
    pub compression_ratio: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AlarmsConfig {
    pub condensation: AlarmRule,
    pub sensor_failure: AlarmRule,
    pub system_error: AlarmRule,
    pub general: AlarmGeneral,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AlarmRule {
    pub enabled: bool,
    pub buzzer_frequency_hz: u16,
    pub buzzer_pattern: BuzzerPattern,
    /// Return to idle on a timer instead of latching until cleared.
    pub auto_reset: bool,
    /// Auto-reset deadline while the alarm stays active (0 = none).
    pub max_duration_min: u16,
    /// Idle delay after the underlying condition clears (0 = latch).
    pub reset_delay_min: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AlarmGeneral {
    pub snooze_duration_min: u16,
    pub max_snooze_count: u8,
    pub night_mode_start: TimeOfDay,
    pub night_mode_end: TimeOfDay,
    /// Buzzer volume in percent while night mode applies.
    pub night_mode_volume: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LoggingConfig {
    /// Seconds between emitted log records.
    pub log_interval_sec: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            measurement: MeasurementConfig {
                interval_sec: 60,
                max_sensor_age_sec: 300,
                warm_up_time_sec: 2,
                retry_count: 3,
                enable_sensor_health_check: true,
                health_check_interval_sec: 300,
            },
            sensors: SensorsConfig {
                indoor: SensorPortConfig {
                    kind: SensorKind::Sht41,
                    address: SensorKind::Sht41.default_address(),
                    enabled: true,
                },
                outdoor: SensorPortConfig {
                    kind: SensorKind::Aht20,
                    address: SensorKind::Aht20.default_address(),
                    enabled: true,
                },
            },
            calibration: CalibrationConfig {
                indoor: SensorOffsets::default(),
                outdoor: SensorOffsets::default(),
            },
            dew_point: DewPointConfig {
                precision_digits: 2,
                thresholds: RiskThresholds {
                    safety_margin_c: 5.0,
                    warning_c: 3.0,
                    critical_c: 2.0,
                    alarm_c: 1.0,
                },
                risk_evaluation: RiskEvaluationConfig {
                    update_interval_sec: 60,
                    trend_weight: 0.3,
                    history_weight: 0.2,
                },
            },
            trends: TrendsConfig {
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
                    max_data_points: 96,
                    compression_ratio: 4,
                },
            },
            alarms: AlarmsConfig {
                condensation: AlarmRule {
                    enabled: true,
                    buzzer_frequency_hz: 1500,
                    buzzer_pattern: BuzzerPattern::Continuous,
                    auto_reset: false,
                    max_duration_min: 0,
                    reset_delay_min: 0,
                },
                sensor_failure: AlarmRule {
                    enabled: true,
                    buzzer_frequency_hz: 2500,
                    buzzer_pattern: BuzzerPattern::Intermittent,
                    auto_reset: true,
                    max_duration_min: 0,
                    reset_delay_min: 5,
                },
                system_error: AlarmRule {
                    enabled: true,
                    buzzer_frequency_hz: 2000,
                    buzzer_pattern: BuzzerPattern::TripleBeep,
                    auto_reset: true,
                    max_duration_min: 10,
                    reset_delay_min: 0,
                },
                general: AlarmGeneral {
                    snooze_duration_min: 10,
                    max_snooze_count: 3,
                    night_mode_start: TimeOfDay::new(22, 0),
                    night_mode_end: TimeOfDay::new(6, 0),
                    night_mode_volume: 30,
                },
            },
            logging: LoggingConfig {
                log_interval_sec: 3600,
            },
        }
    }
}

impl Config {
    /// Reject snapshots the pipeline cannot run on. Fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.dew_point.thresholds;
        if !(t.safety_margin_c > t.warning_c
            && t.warning_c > t.critical_c
            && t.critical_c > t.alarm_c)
        {
            return Err(ConfigError::ThresholdOrdering);
        }

        let p = &self.trends.analysis_periods;
        if !(p.short_term_min < p.medium_term_min && p.medium_term_min < p.long_term_min) {
            return Err(ConfigError::PeriodOrdering);
        }

        for (value, field) in [
            (self.measurement.interval_sec, "measurement.interval_sec"),
            (
                self.measurement.max_sensor_age_sec,
                "measurement.max_sensor_age_sec",
            ),
            (
                self.dew_point.risk_evaluation.update_interval_sec,
                "dew_point.risk_evaluation.update_interval_sec",
            ),
            (self.logging.log_interval_sec, "logging.log_interval_sec"),
            (p.short_term_min as u32, "trends.analysis_periods.short_term_min"),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroValue { field });
            }
        }
        if self.measurement.retry_count == 0 {
            return Err(ConfigError::ZeroValue {
                field: "measurement.retry_count",
            });
        }
        if self.trends.detection.trend_confirmation_points == 0 {
            return Err(ConfigError::ZeroValue {
                field: "trends.detection.trend_confirmation_points",
            });
        }
        if self.trends.storage.compression_ratio == 0 {
            return Err(ConfigError::ZeroValue {
                field: "trends.storage.compression_ratio",
            });
        }
        if self.trends.storage.max_data_points == 0 {
            return Err(ConfigError::ZeroValue {
                field: "trends.storage.max_data_points",
            });
        }
        if self.trends.storage.max_data_points > MAX_DATA_POINTS {
            return Err(ConfigError::HistoryCapacity {
                requested: self.trends.storage.max_data_points,
                capacity: MAX_DATA_POINTS,
            });
        }

        let g = &self.alarms.general;
        for tod in [g.night_mode_start, g.night_mode_end] {
            if !tod.is_valid() {
                return Err(ConfigError::InvalidTimeOfDay {
                    hour: tod.hour,
                    minute: tod.minute,
                });
            }
        }
        if g.night_mode_volume > 100 {
            return Err(ConfigError::VolumeOutOfRange(g.night_mode_volume));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn threshold_ordering_is_enforced() {
        let mut config = Config::default();
        config.dew_point.thresholds.warning_c = 6.0; // above safety_margin_c
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOrdering));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let mut config = Config::default();
        config.measurement.interval_sec = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroValue {
                field: "measurement.interval_sec"
            })
        ));
    }

    #[test]
    fn history_capacity_is_bounded() {
        let mut config = Config::default();
        config.trends.storage.max_data_points = MAX_DATA_POINTS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HistoryCapacity { .. })
        ));
    }

    #[test]
    fn night_mode_times_are_checked() {
        let mut config = Config::default();
        config.alarms.general.night_mode_end = TimeOfDay::new(24, 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeOfDay { hour: 24, .. })
        ));
    }
}
