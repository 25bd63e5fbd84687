//! Error types shared across the pipeline.
//!
//! Sensor transport errors live with the drivers in [`crate::sensors`];
//! here are the calculation and configuration failures. Calculation errors
//! are recovered locally (the previous valid dew point is retained with a
//! staleness flag); configuration errors are fatal at startup.

use thiserror_no_std::Error;

/// Invalid input to a dew-point or calibration computation.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CalculationError {
    /// Relative humidity outside the Magnus domain.
    #[error("relative humidity {0}% outside (0, 100]")]
    HumidityOutOfRange(f32),
    /// A NaN or infinite value reached the computation.
    #[error("non-finite {0}")]
    NotFinite(&'static str),
    /// The reading was marked invalid upstream and carries no usable values.
    #[error("reading is invalid")]
    InvalidReading,
    /// The result would violate dew_point <= temperature.
    #[error("result violates dew point <= temperature")]
    NotPhysical,
}

/// Configuration snapshot rejected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("dew point thresholds must strictly decrease: safety > warning > critical > alarm")]
    ThresholdOrdering,
    #[error("trend analysis periods must strictly increase: short < medium < long")]
    PeriodOrdering,
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
    #[error("max_data_points {requested} exceeds buffer capacity {capacity}")]
    HistoryCapacity { requested: usize, capacity: usize },
    #[error("invalid time of day {hour:02}:{minute:02}")]
    InvalidTimeOfDay { hour: u8, minute: u8 },
    #[error("night_mode_volume {0}% exceeds 100%")]
    VolumeOutOfRange(u8),
}
