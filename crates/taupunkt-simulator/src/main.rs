//! Desktop simulator for the taupunkt-rs condensation monitor.
//!
//! Drives the core pipeline with synthetic sensor data so the whole
//! measurement-to-alarm path (calibration, dew points, trends, risk,
//! alarms) can be exercised without hardware. The simulated indoor air
//! gradually saturates until the condensation alarm fires, gets snoozed
//! once, and eventually recovers.
//!
//! Simulated time runs fast: one measurement cycle per loop iteration, a few
//! wall-clock milliseconds each. CSV log records go to stdout, everything
//! else to the logger.

use std::thread;
use std::time::Duration as StdDuration;

use embassy_futures::block_on;
use embassy_time::Instant;
use log::{info, warn};

use taupunkt_core::alarm::{AlarmKind, AlarmPhase, PatternPlayback, TimeOfDay};
use taupunkt_core::config::Config;
use taupunkt_core::pipeline::{LogRecord, Monitor, MonitorChannel, MonitorEvent};
use taupunkt_core::sensors::{RawMeasurement, Sensor, SensorError};

/// Simulated measurement cycles to run (one per `interval_sec`).
const SIMULATED_CYCLES: u64 = 240;

/// Wall-clock pacing per simulated cycle.
const REAL_TIME_PER_CYCLE: StdDuration = StdDuration::from_millis(20);

/// Wall-clock hour the simulation starts at.
const START_HOUR: u8 = 20;

// ---------------------------------------------------------------------------
// Synthetic sensors
// ---------------------------------------------------------------------------

/// Generates slowly varying readings; the humidity ramp drives the indoor
/// air toward saturation and back, so every risk level gets visited.
struct SyntheticSensor {
    base_temperature_c: f64,
    base_humidity_pct: f64,
    /// Peak extra humidity added by the ramp.
    humidity_swing_pct: f64,
    cycle: u64,
}

impl SyntheticSensor {
    fn new(base_temperature_c: f64, base_humidity_pct: f64, humidity_swing_pct: f64) -> Self {
        Self {
            base_temperature_c,
            base_humidity_pct,
            humidity_swing_pct,
            cycle: 0,
        }
    }
}

impl Sensor for SyntheticSensor {
    async fn read(&mut self) -> Result<RawMeasurement, SensorError> {
        let t = self.cycle as f64;
        self.cycle += 1;

        // Temperature: gentle sinusoidal wander around the base.
        let temperature = self.base_temperature_c + 0.8 * (t / 37.0).sin();

        // Humidity: slow half-sine ramp up and back down over the whole run,
        // plus a little noise-like ripple.
        let ramp = (core::f64::consts::PI * t / SIMULATED_CYCLES as f64).sin();
        let humidity = (self.base_humidity_pct + self.humidity_swing_pct * ramp
            + 1.5 * (t / 11.0).cos())
        .clamp(1.0, 99.9);

        Ok(RawMeasurement {
            temperature_c: temperature as f32,
            humidity_pct: humidity as f32,
        })
    }

    async fn health_check(&mut self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Simulated wall clock
// ---------------------------------------------------------------------------

fn local_time(sim_secs: u64) -> TimeOfDay {
    let minutes = (START_HOUR as u64 * 60 + sim_secs / 60) % (24 * 60);
    TimeOfDay::new((minutes / 60) as u8, (minutes % 60) as u8)
}

/// Render the first two seconds of a pattern as an on/off strip.
fn waveform_preview(playback: &PatternPlayback, start: Instant) -> String {
    (0..20)
        .map(|i| {
            let at = start + embassy_time::Duration::from_millis(i * 100);
            match playback.level_at(at) {
                Some(true) => '#',
                _ => '_',
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting taupunkt-rs simulator");

    let config = Config::default();
    let interval = config.measurement.interval_sec as u64;

    let channel = MonitorChannel::new();
    let mut events = channel.subscriber().expect("subscriber slot available");

    let indoor = SyntheticSensor::new(21.0, 62.0, 36.0);
    let outdoor = SyntheticSensor::new(9.0, 55.0, 5.0);

    let mut monitor = Monitor::new(
        &config,
        indoor,
        outdoor,
        channel.publisher().expect("publisher slot available"),
    )
    .expect("default configuration is valid");

    println!("{}", LogRecord::CSV_HEADER);

    let mut snoozed_once = false;

    for cycle in 0..SIMULATED_CYCLES {
        let sim_secs = cycle * interval;
        let now = Instant::from_secs(sim_secs);
        let local = local_time(sim_secs);

        block_on(monitor.run_cycle(now, local));

        while let Some(event) = events.try_next_message_pure() {
            match event {
                MonitorEvent::Alarm(alarm) => {
                    let playback = PatternPlayback::new(alarm.pattern, now);
                    warn!(
                        "[{:02}:{:02}] {} alarm: {} @ {} Hz, volume {}%  |{}|",
                        local.hour,
                        local.minute,
                        alarm.kind.label(),
                        alarm.pattern.label(),
                        alarm.frequency_hz,
                        alarm.volume_pct,
                        waveform_preview(&playback, now),
                    );
                }
                MonitorEvent::AlarmSilenced(kind) => {
                    info!("{} snoozed, playback cancelled", kind.label());
                }
                MonitorEvent::AlarmCleared(kind) => {
                    info!("{} cleared", kind.label());
                }
                MonitorEvent::Log(record) => {
                    println!("{}", record.to_csv_line());
                }
            }
        }

        // Exercise the snooze path once the condensation alarm shows up.
        if !snoozed_once
            && matches!(
                monitor.alarm_phase(AlarmKind::Condensation),
                AlarmPhase::Active { .. }
            )
        {
            block_on(monitor.snooze(AlarmKind::Condensation, now))
                .expect("first snooze within the budget");
            while let Some(event) = events.try_next_message_pure() {
                if let MonitorEvent::AlarmSilenced(kind) = event {
                    info!("{} snoozed, playback cancelled", kind.label());
                }
            }
            snoozed_once = true;
        }

        thread::sleep(REAL_TIME_PER_CYCLE);
    }

    if let Some(level) = monitor.risk_level() {
        info!("Simulation finished at risk level {}", level.label());
    }
}
