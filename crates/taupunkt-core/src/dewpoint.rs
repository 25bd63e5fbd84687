//! Dew-point computation via the Magnus approximation.
//!
//! ```text
//! α = (a·T)/(b+T) + ln(RH/100)
//! dew_point = (b·α)/(a−α)
//! ```
//!
//! Physics guarantees `dew_point <= T` for any valid (T, RH) pair; the
//! formula is exact at saturation (RH = 100% ⇒ dew point = T). Inputs that
//! would break the invariant are an upstream error and are rejected, never
//! clamped into a self-consistent-looking lie.

use crate::calibration::CalibratedReading;
use crate::error::CalculationError;
use crate::math;
use crate::sensors::SensorId;

/// Magnus coefficients for water over a plane surface, −45 °C to +60 °C.
pub const MAGNUS_A: f32 = 17.62;
pub const MAGNUS_B_C: f32 = 243.12;

/// Slack for float noise around saturation before a result counts as
/// physically impossible.
const SATURATION_TOLERANCE_C: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DewPointResult {
    pub sensor_id: SensorId,
    pub dew_point_c: f32,
    /// Distance from ambient temperature down to the dew point; the primary
    /// condensation-risk signal.
    pub margin_c: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct DewPointCalculator {
    precision_digits: u8,
}

impl DewPointCalculator {
    pub const fn new(precision_digits: u8) -> Self {
        Self { precision_digits }
    }

    pub fn compute(&self, reading: &CalibratedReading) -> Result<DewPointResult, CalculationError> {
        let t = reading.temperature_c;
        let rh = reading.humidity_pct;

        if !t.is_finite() {
            return Err(CalculationError::NotFinite("temperature"));
        }
        if !rh.is_finite() {
            return Err(CalculationError::NotFinite("humidity"));
        }
        if rh <= 0.0 || rh > 100.0 {
            return Err(CalculationError::HumidityOutOfRange(rh));
        }

        let alpha = (MAGNUS_A * t) / (MAGNUS_B_C + t) + math::ln(rh / 100.0);
        let denom = MAGNUS_A - alpha;
        if denom <= 0.0 {
            // Temperature outside the coefficient domain for this humidity.
            return Err(CalculationError::NotPhysical);
        }

        let mut dew_point = (MAGNUS_B_C * alpha) / denom;
        if dew_point > t + SATURATION_TOLERANCE_C {
            return Err(CalculationError::NotPhysical);
        }
        // Exact at saturation up to float noise; snap that noise out.
        if dew_point > t {
            dew_point = t;
        }

        let dew_point_c = math::round_to(dew_point, self.precision_digits);
        let margin_c = math::round_to(t - dew_point, self.precision_digits);

        Ok(DewPointResult {
            sensor_id: reading.sensor_id,
            dew_point_c,
            margin_c,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_time::Instant;

    fn reading(t: f32, rh: f32) -> CalibratedReading {
        CalibratedReading {
            sensor_id: SensorId::Indoor,
            temperature_c: t,
            humidity_pct: rh,
            timestamp: Instant::from_secs(0),
        }
    }

    #[test]
    fn magnus_reference_point() {
        // 20 °C at 50 %RH is the textbook check: ~9.26 °C.
        let calc = DewPointCalculator::new(2);
        let result = calc.compute(&reading(20.0, 50.0)).unwrap();
        assert!(
            (result.dew_point_c - 9.26).abs() <= 0.1,
            "dew point {} too far from 9.26",
            result.dew_point_c
        );
        assert!((result.margin_c - (20.0 - result.dew_point_c)).abs() <= 0.011);
    }

    #[test]
    fn dew_point_never_exceeds_temperature() {
        // Dense grid over the whole operating envelope.
        let calc = DewPointCalculator::new(2);
        let mut t = -20.0f32;
        while t <= 50.0 {
            let mut rh = 1.0f32;
            while rh <= 100.0 {
                let result = calc
                    .compute(&reading(t, rh))
                    .unwrap_or_else(|e| panic!("compute({t}, {rh}) failed: {e:?}"));
                assert!(
                    result.dew_point_c <= t + 0.005,
                    "dew point {} above temperature {t} at {rh}%",
                    result.dew_point_c
                );
                assert!(result.margin_c >= 0.0);
                rh += 1.0;
            }
            t += 0.5;
        }
    }

    #[test]
    fn saturation_pins_margin_to_zero() {
        let calc = DewPointCalculator::new(2);
        let result = calc.compute(&reading(15.0, 100.0)).unwrap();
        assert_eq!(result.margin_c, 0.0);
        assert_eq!(result.dew_point_c, 15.0);
    }

    #[test]
    fn invalid_humidity_is_rejected() {
        let calc = DewPointCalculator::new(2);
        assert_eq!(
            calc.compute(&reading(25.0, 0.0)),
            Err(CalculationError::HumidityOutOfRange(0.0))
        );
        assert_eq!(
            calc.compute(&reading(25.0, 150.0)),
            Err(CalculationError::HumidityOutOfRange(150.0))
        );
        assert!(matches!(
            calc.compute(&reading(25.0, f32::NAN)),
            Err(CalculationError::NotFinite(_))
        ));
    }

    #[test]
    fn precision_is_applied() {
        let calc = DewPointCalculator::new(0);
        let result = calc.compute(&reading(20.0, 50.0)).unwrap();
        assert_eq!(result.dew_point_c, 9.0);
    }
}
