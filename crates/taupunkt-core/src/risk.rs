//! Condensation-risk evaluation.
//!
//! The margin-vs-threshold ladder is the non-negotiable floor; trend and
//! history can only push the level up, never below what the instantaneous
//! margin already demands. Boundary cases round toward the more severe
//! level: when in doubt, wake somebody up.

use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};

use crate::config::{DewPointConfig, RiskThresholds};

/// Worsening slope that counts as "full scale" when normalizing the trend
/// contribution: the margin collapsing at 0.5 °C per minute.
const SLOPE_FULL_SCALE_C_PER_MIN: f32 = 0.5;

/// Margin deficit against the historical average that counts as full scale.
const HISTORY_FULL_SCALE_C: f32 = 5.0;

/// Discrete risk level, ordered by severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Ok,
    Warning,
    Critical,
    Alarm,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Alarm => "alarm",
        }
    }

    const fn from_index(index: u8) -> Self {
        match index {
            0 => Self::Ok,
            1 => Self::Warning,
            2 => Self::Critical,
            _ => Self::Alarm,
        }
    }
}

pub struct RiskEvaluator {
    thresholds: RiskThresholds,
    trend_weight: f32,
    history_weight: f32,
    update_interval: Duration,
    last_evaluation: Option<Instant>,
}

impl RiskEvaluator {
    pub fn new(cfg: &DewPointConfig) -> Self {
        Self {
            thresholds: cfg.thresholds,
            trend_weight: cfg.risk_evaluation.trend_weight,
            history_weight: cfg.risk_evaluation.history_weight,
            update_interval: Duration::from_secs(cfg.risk_evaluation.update_interval_sec as u64),
            last_evaluation: None,
        }
    }

    /// Cadence gate: true when an evaluation is due at `now`.
    ///
    /// Risk runs on its own fixed interval so a burst of sensor retries
    /// cannot skew update timing or chatter the alarms.
    pub fn poll_due(&mut self, now: Instant) -> bool {
        match self.last_evaluation {
            Some(last) if now - last < self.update_interval => false,
            _ => {
                self.last_evaluation = Some(now);
                true
            }
        }
    }

    /// Margin-only baseline against the threshold ladder.
    pub fn base_level(&self, margin_c: f32) -> RiskLevel {
        let t = &self.thresholds;
        if margin_c <= t.alarm_c {
            RiskLevel::Alarm
        } else if margin_c <= t.critical_c {
            RiskLevel::Critical
        } else if margin_c <= t.warning_c {
            RiskLevel::Warning
        } else {
            RiskLevel::Ok
        }
    }

    /// Continuous severity 0‥3, piecewise-linear across the four thresholds.
    fn severity_score(&self, margin_c: f32) -> f32 {
        let t = &self.thresholds;
        if margin_c >= t.safety_margin_c {
            0.0
        } else if margin_c >= t.warning_c {
            (t.safety_margin_c - margin_c) / (t.safety_margin_c - t.warning_c)
        } else if margin_c >= t.critical_c {
            1.0 + (t.warning_c - margin_c) / (t.warning_c - t.critical_c)
        } else if margin_c >= t.alarm_c {
            2.0 + (t.critical_c - margin_c) / (t.critical_c - t.alarm_c)
        } else {
            3.0
        }
    }

    /// Combine margin, trend and history into a level.
    ///
    /// `margin_slope` is the margin series' rate of change in °C/min
    /// (negative = shrinking margin); `historical_average` is the margin's
    /// average over the long window. A missing signal contributes nothing.
    pub fn evaluate(
        &self,
        margin_c: f32,
        margin_slope: Option<f32>,
        historical_average: Option<f32>,
    ) -> RiskLevel {
        let base = self.base_level(margin_c);

        let trend_term = margin_slope
            .map(|slope| ((-slope) / SLOPE_FULL_SCALE_C_PER_MIN).clamp(0.0, 1.0))
            .unwrap_or(0.0);
        let history_term = historical_average
            .map(|avg| ((avg - margin_c) / HISTORY_FULL_SCALE_C).clamp(0.0, 1.0))
            .unwrap_or(0.0);

        let score = self.severity_score(margin_c)
            * (1.0 + self.trend_weight * trend_term + self.history_weight * history_term);

        // Half-way scores round toward severity.
        let weighted = RiskLevel::from_index((score + 0.5) as u8).min(RiskLevel::Alarm);

        weighted.max(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RiskEvaluationConfig};

    fn evaluator() -> RiskEvaluator {
        // Default thresholds: safety 5.0 > warning 3.0 > critical 2.0 > alarm 1.0
        RiskEvaluator::new(&Config::default().dew_point)
    }

    #[test]
    fn levels_are_ordered() {
        assert!(RiskLevel::Ok < RiskLevel::Warning);
        assert!(RiskLevel::Warning < RiskLevel::Critical);
        assert!(RiskLevel::Critical < RiskLevel::Alarm);
    }

    #[test]
    fn baseline_follows_the_threshold_ladder() {
        let eval = evaluator();
        assert_eq!(eval.evaluate(10.0, None, None), RiskLevel::Ok);
        assert_eq!(eval.evaluate(2.75, None, None), RiskLevel::Warning);
        assert_eq!(eval.evaluate(1.75, None, None), RiskLevel::Critical);
        assert_eq!(eval.evaluate(0.9, None, None), RiskLevel::Alarm);
        assert_eq!(eval.evaluate(-1.0, None, None), RiskLevel::Alarm);
    }

    #[test]
    fn early_warning_zone_below_safety_margin() {
        let eval = evaluator();
        // Above the safety margin everything is quiet; well inside it the
        // rounded score already says Warning even though the warning
        // threshold itself has not been crossed (fail-safe bias).
        assert_eq!(eval.evaluate(5.0, None, None), RiskLevel::Ok);
        assert_eq!(eval.evaluate(4.6, None, None), RiskLevel::Ok);
        assert_eq!(eval.evaluate(3.5, None, None), RiskLevel::Warning);
    }

    #[test]
    fn exact_threshold_ties_break_toward_severity() {
        let eval = evaluator();
        // Margin exactly at the critical threshold must be at least Critical.
        assert!(eval.evaluate(2.0, None, None) >= RiskLevel::Critical);
        assert!(eval.evaluate(1.0, None, None) >= RiskLevel::Alarm);
        assert!(eval.evaluate(3.0, None, None) >= RiskLevel::Warning);
    }

    #[test]
    fn worsening_trend_escalates() {
        let eval = evaluator();
        // Margin in the Warning band; a fast collapse pushes it to Critical.
        let calm = eval.evaluate(2.75, None, None);
        let collapsing = eval.evaluate(2.75, Some(-0.5), None);
        assert_eq!(calm, RiskLevel::Warning);
        assert_eq!(collapsing, RiskLevel::Critical);
    }

    #[test]
    fn improving_trend_never_lowers_the_baseline() {
        let eval = evaluator();
        // A strongly improving slope must not soften an instantaneous
        // Critical margin (positive slopes contribute nothing).
        let level = eval.evaluate(1.5, Some(2.0), None);
        assert!(level >= RiskLevel::Critical);
        assert_eq!(level, eval.evaluate(1.5, None, None));
    }

    #[test]
    fn history_deficit_contributes_upward() {
        let eval = evaluator();
        // Margin used to hover at 7.5 °C; now it sits at 2.75 and keeps
        // shrinking, worse than trend alone suggests.
        let without = eval.evaluate(2.75, None, None);
        let with = eval.evaluate(2.75, Some(-0.4), Some(7.5));
        assert_eq!(without, RiskLevel::Warning);
        assert_eq!(with, RiskLevel::Critical);
    }

    #[test]
    fn missing_signals_fall_back_to_margin_only() {
        let eval = evaluator();
        assert_eq!(
            eval.evaluate(4.0, None, None),
            eval.evaluate(4.0, Some(0.0), Some(4.0))
        );
    }

    #[test]
    fn cadence_gate_enforces_interval() {
        let mut eval = RiskEvaluator::new(&crate::config::DewPointConfig {
            precision_digits: 2,
            thresholds: Config::default().dew_point.thresholds,
            risk_evaluation: RiskEvaluationConfig {
                update_interval_sec: 60,
                trend_weight: 0.3,
                history_weight: 0.2,
            },
        });

        assert!(eval.poll_due(Instant::from_secs(0)));
        assert!(!eval.poll_due(Instant::from_secs(30)));
        assert!(eval.poll_due(Instant::from_secs(60)));
        assert!(!eval.poll_due(Instant::from_secs(90)));
    }
}
