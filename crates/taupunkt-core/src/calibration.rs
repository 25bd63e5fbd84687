//! Per-sensor offset calibration.
//!
//! Pure value transformation: add the configured offsets, clamp humidity to
//! its physical range, reject anything non-finite. The output is a distinct
//! type so a reading cannot be run through calibration twice.

use embassy_time::Instant;

use crate::config::SensorOffsets;
use crate::error::CalculationError;
use crate::reader::SensorReading;
use crate::sensors::SensorId;

/// A reading with offsets applied. Only [`Calibrator::calibrate`] makes these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedReading {
    pub sensor_id: SensorId,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct Calibrator {
    offsets: SensorOffsets,
}

impl Calibrator {
    pub const fn new(offsets: SensorOffsets) -> Self {
        Self { offsets }
    }

    pub fn calibrate(&self, reading: &SensorReading) -> Result<CalibratedReading, CalculationError> {
        let Some(timestamp) = reading.timestamp else {
            return Err(CalculationError::InvalidReading);
        };
        if !reading.valid {
            return Err(CalculationError::InvalidReading);
        }
        if !reading.temperature_c.is_finite() {
            return Err(CalculationError::NotFinite("temperature"));
        }
        if !reading.humidity_pct.is_finite() {
            return Err(CalculationError::NotFinite("humidity"));
        }

        Ok(CalibratedReading {
            sensor_id: reading.sensor_id,
            temperature_c: reading.temperature_c + self.offsets.temperature_offset,
            humidity_pct: (reading.humidity_pct + self.offsets.humidity_offset).clamp(0.0, 100.0),
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(t: f32, h: f32) -> SensorReading {
        SensorReading {
            sensor_id: SensorId::Indoor,
            temperature_c: t,
            humidity_pct: h,
            timestamp: Some(Instant::from_secs(10)),
            valid: true,
        }
    }

    #[test]
    fn offsets_are_additive() {
        let cal = Calibrator::new(SensorOffsets {
            temperature_offset: 1.0,
            humidity_offset: -2.0,
        });
        let out = cal.calibrate(&reading(20.0, 50.0)).unwrap();
        assert_eq!(out.temperature_c, 21.0);
        assert_eq!(out.humidity_pct, 48.0);
        assert_eq!(out.timestamp, Instant::from_secs(10));
    }

    #[test]
    fn humidity_is_clamped_at_both_rails() {
        let up = Calibrator::new(SensorOffsets {
            temperature_offset: 0.0,
            humidity_offset: 10.0,
        });
        assert_eq!(up.calibrate(&reading(20.0, 95.0)).unwrap().humidity_pct, 100.0);

        let down = Calibrator::new(SensorOffsets {
            temperature_offset: 0.0,
            humidity_offset: -10.0,
        });
        assert_eq!(down.calibrate(&reading(20.0, 5.0)).unwrap().humidity_pct, 0.0);
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let cal = Calibrator::new(SensorOffsets::default());
        assert_eq!(
            cal.calibrate(&reading(f32::NAN, 50.0)),
            Err(CalculationError::NotFinite("temperature"))
        );
        assert_eq!(
            cal.calibrate(&reading(20.0, f32::INFINITY)),
            Err(CalculationError::NotFinite("humidity"))
        );
    }

    #[test]
    fn invalid_readings_are_rejected() {
        let cal = Calibrator::new(SensorOffsets::default());
        let mut r = reading(20.0, 50.0);
        r.valid = false;
        assert_eq!(cal.calibrate(&r), Err(CalculationError::InvalidReading));
    }
}
