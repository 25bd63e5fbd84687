use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;

use super::{RawMeasurement, Sensor, SensorError};

const CMD_INIT: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];
const CMD_STATUS: [u8; 1] = [0x71];

const STATUS_BUSY: u8 = 0x80;
const STATUS_CALIBRATED: u8 = 0x08;

/// Conversion time per the datasheet, with headroom.
const MEASUREMENT_DELAY_MS: u64 = 80;
const INIT_DELAY_MS: u64 = 10;

/// AHT20 temperature/humidity sensor, raw protocol.
///
/// The part wants a one-time calibration-init after power-up, then each
/// measurement is trigger, wait, read 7 bytes (status + 20-bit humidity +
/// 20-bit temperature + CRC).
pub struct Aht20Sensor<I> {
    i2c: I,
    address: u8,
    initialized: bool,
}

impl<I: I2c> Aht20Sensor<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            initialized: false,
        }
    }

    async fn ensure_initialized(&mut self) -> Result<(), SensorError> {
        if self.initialized {
            return Ok(());
        }
        self.i2c
            .write(self.address, &CMD_INIT)
            .await
            .map_err(|_| SensorError::Transport {
                sensor: "AHT20",
                operation: "calibration init",
                details: "I2C write rejected",
            })?;
        Timer::after_millis(INIT_DELAY_MS).await;
        self.initialized = true;
        Ok(())
    }
}

impl<I: I2c> Sensor for Aht20Sensor<I> {
    async fn read(&mut self) -> Result<RawMeasurement, SensorError> {
        self.ensure_initialized().await?;

        self.i2c
            .write(self.address, &CMD_TRIGGER)
            .await
            .map_err(|_| SensorError::Transport {
                sensor: "AHT20",
                operation: "trigger measurement",
                details: "I2C write rejected",
            })?;

        Timer::after_millis(MEASUREMENT_DELAY_MS).await;

        let mut data = [0u8; 7];
        self.i2c
            .read(self.address, &mut data)
            .await
            .map_err(|_| SensorError::Transport {
                sensor: "AHT20",
                operation: "read measurement",
                details: "I2C read rejected",
            })?;

        if data[0] & STATUS_BUSY != 0 {
            log::warn!("AHT20 still busy after {} ms", MEASUREMENT_DELAY_MS);
            return Err(SensorError::Transport {
                sensor: "AHT20",
                operation: "read measurement",
                details: "conversion not finished",
            });
        }

        let hum_raw = ((data[1] as u32) << 16 | (data[2] as u32) << 8 | data[3] as u32) >> 4;
        let temp_raw = ((data[3] as u32 & 0x0F) << 16) | (data[4] as u32) << 8 | data[5] as u32;

        Ok(RawMeasurement {
            temperature_c: temp_raw as f32 * 200.0 / 1_048_576.0 - 50.0,
            humidity_pct: hum_raw as f32 * 100.0 / 1_048_576.0,
        })
    }

    async fn health_check(&mut self) -> bool {
        let mut status = [0u8; 1];
        match self
            .i2c
            .write_read(self.address, &CMD_STATUS, &mut status)
            .await
        {
            Ok(()) => status[0] & STATUS_CALIBRATED != 0,
            Err(_) => false,
        }
    }
}
