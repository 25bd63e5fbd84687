//! Buzzer patterns as pure functions of elapsed time.
//!
//! The playback task samples [`BuzzerPattern::is_on`] on its own cadence and
//! drives the PWM pin; nothing here blocks or sleeps. Cancellation is a flag
//! flip, so no partial waveform survives a snooze or clear.

use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};

/// Intermittent duty: 500 ms on, 500 ms off.
const INTERMITTENT_PERIOD_MS: u64 = 1000;
const INTERMITTENT_ON_MS: u64 = 500;

/// Triple beep: three short pulses, then silence to the end of the cycle.
const TRIPLE_CYCLE_MS: u64 = 2000;
const TRIPLE_PULSE_MS: u64 = 150;
const TRIPLE_GAP_MS: u64 = 150;

/// Closed set of buzzer patterns; serde names match the configuration
/// strings (`continuous`, `intermittent`, `triple_beep`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuzzerPattern {
    Continuous,
    Intermittent,
    TripleBeep,
}

impl BuzzerPattern {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Intermittent => "intermittent",
            Self::TripleBeep => "triple_beep",
        }
    }

    /// Waveform level at `elapsed` since playback start.
    pub fn is_on(self, elapsed: Duration) -> bool {
        let ms = elapsed.as_millis();
        match self {
            Self::Continuous => true,
            Self::Intermittent => ms % INTERMITTENT_PERIOD_MS < INTERMITTENT_ON_MS,
            Self::TripleBeep => {
                let t = ms % TRIPLE_CYCLE_MS;
                let slot = TRIPLE_PULSE_MS + TRIPLE_GAP_MS;
                t < 3 * slot && t % slot < TRIPLE_PULSE_MS
            }
        }
    }
}

/// One playback run of a pattern, cancellable at any instant.
#[derive(Debug, Clone, Copy)]
pub struct PatternPlayback {
    pattern: BuzzerPattern,
    started_at: Instant,
    cancelled: bool,
}

impl PatternPlayback {
    pub const fn new(pattern: BuzzerPattern, now: Instant) -> Self {
        Self {
            pattern,
            started_at: now,
            cancelled: false,
        }
    }

    /// Buzzer level at `now`, or `None` once cancelled.
    pub fn level_at(&self, now: Instant) -> Option<bool> {
        if self.cancelled {
            None
        } else {
            Some(self.pattern.is_on(now - self.started_at))
        }
    }

    /// Takes effect immediately; no further waveform is produced.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub const fn pattern(&self) -> BuzzerPattern {
        self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn continuous_is_always_on() {
        for t in [0, 17, 500, 12_345] {
            assert!(BuzzerPattern::Continuous.is_on(ms(t)));
        }
    }

    #[test]
    fn intermittent_has_half_second_duty() {
        let p = BuzzerPattern::Intermittent;
        assert!(p.is_on(ms(0)));
        assert!(p.is_on(ms(499)));
        assert!(!p.is_on(ms(500)));
        assert!(!p.is_on(ms(999)));
        assert!(p.is_on(ms(1000)));
    }

    #[test]
    fn triple_beep_pulses_then_rests() {
        let p = BuzzerPattern::TripleBeep;
        // Three pulses at 0, 300 and 600 ms...
        assert!(p.is_on(ms(0)));
        assert!(!p.is_on(ms(200)));
        assert!(p.is_on(ms(300)));
        assert!(p.is_on(ms(600)));
        // ...then silence until the cycle repeats.
        assert!(!p.is_on(ms(900)));
        assert!(!p.is_on(ms(1999)));
        assert!(p.is_on(ms(2000)));
    }

    #[test]
    fn cancellation_is_immediate() {
        let start = Instant::from_secs(10);
        let mut playback = PatternPlayback::new(BuzzerPattern::Continuous, start);
        assert_eq!(playback.level_at(Instant::from_secs(11)), Some(true));

        playback.cancel();
        assert_eq!(playback.level_at(Instant::from_secs(11)), None);
        assert!(playback.is_cancelled());
    }
}
