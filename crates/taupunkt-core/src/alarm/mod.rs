//! Alarm state machine.
//!
//! One record per alarm kind, stepping `Idle → Active → Snoozed → Idle`.
//! Timed auto-reset and the post-clear delay are sub-states of `Active`
//! (`clear_pending_since`), night mode is a cross-cutting modifier applied
//! when events are emitted, and evaluation itself is total; bad input
//! escalates fail-safe instead of panicking.

mod night;
mod pattern;

pub use night::{NightWindow, TimeOfDay};
pub use pattern::{BuzzerPattern, PatternPlayback};

use embassy_time::{Duration, Instant};
use heapless::Vec;
use thiserror_no_std::Error;

use crate::config::{AlarmGeneral, AlarmRule, AlarmsConfig};
use crate::risk::RiskLevel;

/// Volume outside the night window.
const FULL_VOLUME_PCT: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    Condensation,
    SensorFailure,
    SystemError,
}

impl AlarmKind {
    pub const COUNT: usize = 3;

    pub const ALL: [AlarmKind; Self::COUNT] = [
        AlarmKind::Condensation,
        AlarmKind::SensorFailure,
        AlarmKind::SystemError,
    ];

    pub const fn index(self) -> usize {
        match self {
            Self::Condensation => 0,
            Self::SensorFailure => 1,
            Self::SystemError => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Condensation => "condensation",
            Self::SensorFailure => "sensor_failure",
            Self::SystemError => "system_error",
        }
    }
}

/// What the buzzer/LED driver needs to start playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmEvent {
    pub kind: AlarmKind,
    pub pattern: BuzzerPattern,
    pub frequency_hz: u16,
    pub volume_pct: u8,
}

/// Lifecycle of one alarm record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPhase {
    Idle,
    Active {
        since: Instant,
        /// Set while the underlying condition has cleared and the reset
        /// delay is running.
        clear_pending_since: Option<Instant>,
    },
    Snoozed {
        since: Instant,
        until: Instant,
    },
}

/// State change produced by one `update` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmTransition {
    /// Raised for the first time or resumed after a snooze; playback starts.
    Raised(AlarmEvent),
    /// Returned to idle; playback stops.
    Cleared(AlarmKind),
}

/// Snapshot of the pipeline signals the alarms react to.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlarmInputs {
    pub risk: Option<RiskLevel>,
    pub sensor_failure: bool,
    pub system_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SnoozeError {
    #[error("alarm is not active")]
    NotActive,
    #[error("snooze limit reached")]
    LimitReached,
}

struct AlarmSlot {
    kind: AlarmKind,
    rule: AlarmRule,
    phase: AlarmPhase,
    snooze_count: u8,
}

pub struct AlarmManager {
    slots: [AlarmSlot; AlarmKind::COUNT],
    general: AlarmGeneral,
    night: NightWindow,
}

impl AlarmManager {
    pub fn new(cfg: &AlarmsConfig) -> Self {
        let rule_for = |kind: AlarmKind| match kind {
            AlarmKind::Condensation => cfg.condensation,
            AlarmKind::SensorFailure => cfg.sensor_failure,
            AlarmKind::SystemError => cfg.system_error,
        };
        Self {
            slots: AlarmKind::ALL.map(|kind| AlarmSlot {
                kind,
                rule: rule_for(kind),
                phase: AlarmPhase::Idle,
                snooze_count: 0,
            }),
            general: cfg.general,
            night: NightWindow::new(cfg.general.night_mode_start, cfg.general.night_mode_end),
        }
    }

    pub fn phase(&self, kind: AlarmKind) -> AlarmPhase {
        self.slots[kind.index()].phase
    }

    pub fn is_active(&self, kind: AlarmKind) -> bool {
        matches!(self.phase(kind), AlarmPhase::Active { .. })
    }

    pub fn snooze_count(&self, kind: AlarmKind) -> u8 {
        self.slots[kind.index()].snooze_count
    }

    /// Step every alarm record. Must never panic: unexpected input maps to
    /// the most severe applicable kind instead.
    pub fn update(
        &mut self,
        now: Instant,
        local: TimeOfDay,
        inputs: &AlarmInputs,
    ) -> Vec<AlarmTransition, { AlarmKind::COUNT }> {
        // A missing risk level with nothing wrong at the sensors means the
        // pipeline itself failed; fail toward the system-error alarm.
        let system_error =
            inputs.system_error || (inputs.risk.is_none() && !inputs.sensor_failure);

        let night = self.night.contains(local);
        let general = self.general;
        let mut transitions = Vec::new();

        for slot in &mut self.slots {
            let condition = match slot.kind {
                AlarmKind::Condensation => {
                    matches!(inputs.risk, Some(level) if level >= RiskLevel::Critical)
                }
                AlarmKind::SensorFailure => inputs.sensor_failure,
                AlarmKind::SystemError => system_error,
            };

            match slot.phase {
                AlarmPhase::Idle => {
                    if condition && slot.rule.enabled {
                        slot.phase = AlarmPhase::Active {
                            since: now,
                            clear_pending_since: None,
                        };
                        slot.snooze_count = 0;
                        log::warn!("{} alarm raised", slot.kind.label());
                        let _ = transitions
                            .push(AlarmTransition::Raised(event_for(slot, night, &general)));
                    }
                }
                AlarmPhase::Active {
                    since,
                    clear_pending_since,
                } => {
                    let clear_pending = if condition {
                        None
                    } else if slot.rule.reset_delay_min > 0 && clear_pending_since.is_none() {
                        Some(now)
                    } else {
                        clear_pending_since
                    };

                    let reset_delay = minutes(slot.rule.reset_delay_min);
                    let delay_elapsed =
                        matches!(clear_pending, Some(cp) if now - cp >= reset_delay);

                    let duration_elapsed = slot.rule.auto_reset
                        && slot.rule.max_duration_min > 0
                        && now - since >= minutes(slot.rule.max_duration_min);

                    if delay_elapsed || duration_elapsed {
                        slot.phase = AlarmPhase::Idle;
                        slot.snooze_count = 0;
                        log::info!("{} alarm auto-reset", slot.kind.label());
                        let _ = transitions.push(AlarmTransition::Cleared(slot.kind));
                    } else {
                        slot.phase = AlarmPhase::Active {
                            since,
                            clear_pending_since: clear_pending,
                        };
                    }
                }
                AlarmPhase::Snoozed { since, until } => {
                    if !condition {
                        // The reason went away while silenced; no point
                        // waking anyone up again.
                        slot.phase = AlarmPhase::Idle;
                        slot.snooze_count = 0;
                        let _ = transitions.push(AlarmTransition::Cleared(slot.kind));
                    } else if now >= until {
                        slot.phase = AlarmPhase::Active {
                            since,
                            clear_pending_since: None,
                        };
                        log::warn!("{} alarm resumed after snooze", slot.kind.label());
                        let _ = transitions
                            .push(AlarmTransition::Raised(event_for(slot, night, &general)));
                    }
                }
            }
        }

        transitions
    }

    /// Silence an active alarm, count-limited. Rejection leaves it active.
    pub fn snooze(&mut self, kind: AlarmKind, now: Instant) -> Result<(), SnoozeError> {
        let max = self.general.max_snooze_count;
        let duration = minutes(self.general.snooze_duration_min);
        let slot = &mut self.slots[kind.index()];

        match slot.phase {
            AlarmPhase::Active { since, .. } => {
                if slot.snooze_count >= max {
                    log::info!("{} snooze rejected, limit reached", kind.label());
                    return Err(SnoozeError::LimitReached);
                }
                slot.snooze_count += 1;
                slot.phase = AlarmPhase::Snoozed {
                    since,
                    until: now + duration,
                };
                log::info!(
                    "{} snoozed ({}/{})",
                    kind.label(),
                    slot.snooze_count,
                    max
                );
                Ok(())
            }
            _ => Err(SnoozeError::NotActive),
        }
    }

    /// Manual acknowledgement; destroys the record regardless of phase.
    pub fn clear(&mut self, kind: AlarmKind) {
        let slot = &mut self.slots[kind.index()];
        if slot.phase != AlarmPhase::Idle {
            log::info!("{} alarm cleared", kind.label());
        }
        slot.phase = AlarmPhase::Idle;
        slot.snooze_count = 0;
    }
}

fn minutes(m: u16) -> Duration {
    Duration::from_secs(m as u64 * 60)
}

/// Apply the night-mode overlay at emission time.
///
/// Condensation keeps its configured pattern at reduced volume; the other
/// kinds are softened to the triple beep.
fn event_for(slot: &AlarmSlot, night: bool, general: &AlarmGeneral) -> AlarmEvent {
    let (pattern, volume_pct) = if night {
        let pattern = match slot.kind {
            AlarmKind::Condensation => slot.rule.buzzer_pattern,
            _ => BuzzerPattern::TripleBeep,
        };
        (pattern, general.night_mode_volume)
    } else {
        (slot.rule.buzzer_pattern, FULL_VOLUME_PCT)
    };

    AlarmEvent {
        kind: slot.kind,
        pattern,
        frequency_hz: slot.rule.buzzer_frequency_hz,
        volume_pct,
    }
}
