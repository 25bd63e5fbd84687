//! Sensor capability layer.
//!
//! Every physical sensor is reduced to the same small capability: produce a
//! temperature/humidity pair, and answer a health probe. Concrete I²C
//! drivers live in submodules behind feature flags; the reader and the
//! simulator only ever see the [`Sensor`] trait, and hardware dispatch is
//! tagged through [`SensorDriver`] rather than dynamic.

#[cfg(feature = "sensor-aht20")]
mod aht20;
#[cfg(feature = "sensor-sht41")]
mod sht41;

#[cfg(feature = "sensor-aht20")]
pub use aht20::Aht20Sensor;
#[cfg(feature = "sensor-sht41")]
pub use sht41::Sht41Sensor;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Physical plausibility window for temperature readings (°C).
pub const TEMPERATURE_RANGE_C: (f32, f32) = (-40.0, 85.0);
/// Physical plausibility window for relative humidity readings (%).
pub const HUMIDITY_RANGE_PCT: (f32, f32) = (0.0, 100.0);

/// Failure while talking to or validating a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SensorError {
    /// Bus-level failure; the reader retries these.
    #[error("{sensor}: {operation} failed: {details}")]
    Transport {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    /// Value outside the physical range; discarded without retry.
    #[error("{sensor}: {value} {unit} outside [{min}, {max}]")]
    OutOfRange {
        sensor: &'static str,
        unit: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    /// The hard poll deadline elapsed before the driver answered.
    #[error("sensor read timed out")]
    Timeout,
}

/// One raw temperature/humidity pair as delivered by a driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMeasurement {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Logical position of a sensor in the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorId {
    Indoor,
    Outdoor,
}

impl SensorId {
    pub const COUNT: usize = 2;

    pub const ALL: [SensorId; Self::COUNT] = [SensorId::Indoor, SensorId::Outdoor];

    pub const fn index(self) -> usize {
        match self {
            Self::Indoor => 0,
            Self::Outdoor => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Indoor => "indoor",
            Self::Outdoor => "outdoor",
        }
    }
}

/// Supported sensor chip types, as named in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Sht41,
    Aht20,
}

impl SensorKind {
    /// Factory-default I²C address for this chip.
    pub const fn default_address(self) -> u8 {
        match self {
            Self::Sht41 => 0x44,
            Self::Aht20 => 0x38,
        }
    }
}

/// Capability every sensor source must provide.
///
/// `read` suspends for however long the part needs (conversion delays are the
/// driver's business); `health_check` is a cheap liveness probe that must not
/// disturb an in-flight measurement.
pub trait Sensor {
    fn read(&mut self) -> impl Future<Output = Result<RawMeasurement, SensorError>>;

    fn health_check(&mut self) -> impl Future<Output = bool>;
}

/// Tagged dispatch over the built-in I²C drivers.
///
/// Which variant to build comes from the configuration (`SensorKind` plus
/// address); keeping this an enum means no vtables and no surprises about
/// which driver code is live in the image.
pub enum SensorDriver<I> {
    #[cfg(feature = "sensor-sht41")]
    Sht41(Sht41Sensor<I>),
    #[cfg(feature = "sensor-aht20")]
    Aht20(Aht20Sensor<I>),
}

#[cfg(any(feature = "sensor-sht41", feature = "sensor-aht20"))]
impl<I: embedded_hal_async::i2c::I2c> Sensor for SensorDriver<I> {
    async fn read(&mut self) -> Result<RawMeasurement, SensorError> {
        match self {
            #[cfg(feature = "sensor-sht41")]
            Self::Sht41(s) => s.read().await,
            #[cfg(feature = "sensor-aht20")]
            Self::Aht20(s) => s.read().await,
        }
    }

    async fn health_check(&mut self) -> bool {
        match self {
            #[cfg(feature = "sensor-sht41")]
            Self::Sht41(s) => s.health_check().await,
            #[cfg(feature = "sensor-aht20")]
            Self::Aht20(s) => s.health_check().await,
        }
    }
}

/// Reject values a real airmass cannot produce.
///
/// Kept outside the drivers so every source, including simulator mocks, goes
/// through the same plausibility gate.
pub fn validate_range(
    sensor: &'static str,
    m: RawMeasurement,
) -> Result<RawMeasurement, SensorError> {
    if !m.temperature_c.is_finite()
        || m.temperature_c < TEMPERATURE_RANGE_C.0
        || m.temperature_c > TEMPERATURE_RANGE_C.1
    {
        return Err(SensorError::OutOfRange {
            sensor,
            unit: "°C",
            value: m.temperature_c,
            min: TEMPERATURE_RANGE_C.0,
            max: TEMPERATURE_RANGE_C.1,
        });
    }
    if !m.humidity_pct.is_finite()
        || m.humidity_pct < HUMIDITY_RANGE_PCT.0
        || m.humidity_pct > HUMIDITY_RANGE_PCT.1
    {
        return Err(SensorError::OutOfRange {
            sensor,
            unit: "%RH",
            value: m.humidity_pct,
            min: HUMIDITY_RANGE_PCT.0,
            max: HUMIDITY_RANGE_PCT.1,
        });
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plausible_measurement_passes() {
        let m = RawMeasurement {
            temperature_c: 21.4,
            humidity_pct: 55.0,
        };
        assert_eq!(validate_range("test", m), Ok(m));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let too_cold = RawMeasurement {
            temperature_c: -60.0,
            humidity_pct: 50.0,
        };
        assert!(matches!(
            validate_range("test", too_cold),
            Err(SensorError::OutOfRange { unit: "°C", .. })
        ));

        let soaked = RawMeasurement {
            temperature_c: 20.0,
            humidity_pct: 104.0,
        };
        assert!(matches!(
            validate_range("test", soaked),
            Err(SensorError::OutOfRange { unit: "%RH", .. })
        ));

        let broken = RawMeasurement {
            temperature_c: f32::NAN,
            humidity_pct: 50.0,
        };
        assert!(validate_range("test", broken).is_err());
    }
}
