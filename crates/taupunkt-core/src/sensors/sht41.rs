use embedded_hal_async::i2c::I2c;
use sht4x::Sht4xAsync;

use super::{RawMeasurement, Sensor, SensorError};

/// SHT41 temperature/humidity sensor.
///
/// Thin wrapper around the `sht4x` driver; the chip family shares one
/// protocol, so this also covers SHT40/SHT45 parts on the same address.
pub struct Sht41Sensor<I> {
    sensor: Sht4xAsync<I, embassy_time::Delay>,
}

impl<I: I2c> Sht41Sensor<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            sensor: Sht4xAsync::<I, embassy_time::Delay>::new(i2c),
        }
    }
}

impl<I: I2c> Sensor for Sht41Sensor<I> {
    async fn read(&mut self) -> Result<RawMeasurement, SensorError> {
        let measurement = self
            .sensor
            .measure(sht4x::Precision::High, &mut embassy_time::Delay)
            .await
            .map_err(|e| {
                log::error!("SHT41 measurement failed: {:?}", e);
                SensorError::Transport {
                    sensor: "SHT41",
                    operation: "measure temperature/humidity",
                    details: "I2C communication error or sensor not responding",
                }
            })?;

        Ok(RawMeasurement {
            temperature_c: measurement.temperature_celsius().to_num::<f32>(),
            humidity_pct: measurement.humidity_percent().to_num::<f32>(),
        })
    }

    async fn health_check(&mut self) -> bool {
        // The serial number read is the cheapest command that proves the chip
        // is powered, addressed and answering.
        self.sensor
            .serial_number(&mut embassy_time::Delay)
            .await
            .is_ok()
    }
}
