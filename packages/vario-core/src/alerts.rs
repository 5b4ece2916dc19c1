//! alerts.rs — threshold alerts over `FlightData`
//!
//! Rules are checked in list order and the first enabled rule whose
//! condition holds wins the tick; later rules are not evaluated at all for
//! that tick. Timing state belongs to the evaluator, not to individual rules.
//!
//! ALTITUDE_LOW is instantaneous: `0 < altitude < threshold`. Altitude 0 is
//! treated as "no fix" and never alerts.
//!
//! SINK_RATE is a latch:
//!   idle ──(vario < threshold)──▶ timing(start = now)
//!   timing ──(vario > threshold)──▶ idle
//!   timing ──(now - start > duration)──▶ fires every tick until recovery
//! Vario exactly at the threshold neither starts nor clears the timer.
//!
//! The audible repeat throttle is layered on top in `tick`: the visual alert
//! is reported every tick, the sound at most once per repeat interval.

use tracing::{debug, info};
use vario_types::{ActiveAlert, AlertConfig, AlertKind, AlertRule, AlertSound, FlightData};

/// Minimum spacing between audible alerts (ms).
pub const ALERT_REPEAT_MS: u64 = 2000;

/// Outcome of one evaluation tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlertDecision {
    /// Alert to display this tick.
    pub active: Option<ActiveAlert>,
    /// Sound to play, when the throttle allows it.
    pub audible: Option<AlertSound>,
}

#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    repeat_ms: u64,
    /// When the current excursion below the sink threshold began
    sink_start_ms: Option<u64>,
    /// When an alert was last made audible
    last_alert_ms: Option<u64>,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(ALERT_REPEAT_MS)
    }
}

impl AlertEvaluator {
    pub fn new(repeat_ms: u64) -> Self {
        Self { repeat_ms, sink_start_ms: None, last_alert_ms: None }
    }

    /// Evaluate rules and apply the audible throttle.
    pub fn tick(&mut self, alerts: &[AlertConfig], data: &FlightData, now_ms: u64) -> AlertDecision {
        let active = self.evaluate(alerts, data, now_ms);

        let audible = match &active {
            Some(alert) if self.may_sound(now_ms) => {
                info!("⚠ {} [{}]", alert.message, alert.alert_id);
                self.last_alert_ms = Some(now_ms);
                Some(alert.sound)
            }
            _ => None,
        };

        AlertDecision { active, audible }
    }

    /// Evaluate rules only; returns the first alert that holds.
    pub fn evaluate(&mut self, alerts: &[AlertConfig], data: &FlightData, now_ms: u64) -> Option<ActiveAlert> {
        // A sink timer with no enabled sink rule left to feed it is dropped,
        // so re-enabling starts a fresh excursion.
        let sink_rule_enabled = alerts.iter().any(|a| a.enabled && a.kind() == AlertKind::SinkRate);
        if !sink_rule_enabled && self.sink_start_ms.take().is_some() {
            debug!("Sink timer cleared: no enabled sink-rate alert");
        }

        for alert in alerts.iter().filter(|a| a.enabled) {
            let fired = match alert.rule {
                AlertRule::AltitudeLow { threshold } => {
                    let altitude = f64::from(data.altitude);
                    (altitude > 0.0 && altitude < threshold)
                        .then(|| format!("LOW ALTITUDE (< {threshold}m)"))
                }
                AlertRule::SinkRate { threshold, duration } => {
                    self.check_sink(data.vario, threshold, duration.unwrap_or(0.0), now_ms)
                        .then(|| format!("SINK ALARM ({:.1} m/s)", data.vario))
                }
            };

            if let Some(message) = fired {
                return Some(ActiveAlert {
                    alert_id: alert.id.clone(),
                    kind: alert.kind(),
                    message,
                    sound: alert.sound,
                });
            }
        }
        None
    }

    pub fn sink_timer_start(&self) -> Option<u64> {
        self.sink_start_ms
    }

    fn check_sink(&mut self, vario: f64, threshold: f64, duration_s: f64, now_ms: u64) -> bool {
        if vario < threshold {
            match self.sink_start_ms {
                None => {
                    debug!("Sink below {threshold} m/s, timer started");
                    self.sink_start_ms = Some(now_ms);
                    false
                }
                Some(start) => {
                    let elapsed_s = now_ms.saturating_sub(start) as f64 / 1000.0;
                    elapsed_s > duration_s
                }
            }
        } else {
            if vario > threshold {
                self.sink_start_ms = None;
            }
            false
        }
    }

    fn may_sound(&self, now_ms: u64) -> bool {
        self.last_alert_ms
            .map_or(true, |last| now_ms.saturating_sub(last) > self.repeat_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_rule(threshold: f64, duration: Option<f64>) -> AlertConfig {
        AlertConfig {
            id: "sink_alarm".into(),
            enabled: true,
            rule: AlertRule::SinkRate { threshold, duration },
            sound: AlertSound::Siren,
        }
    }

    fn low_alt_rule(threshold: f64) -> AlertConfig {
        AlertConfig {
            id: "low_alt".into(),
            enabled: true,
            rule: AlertRule::AltitudeLow { threshold },
            sound: AlertSound::Beep,
        }
    }

    fn vario(v: f64) -> FlightData {
        FlightData { vario: v, altitude: 1500, ..Default::default() }
    }

    fn altitude(alt: i32) -> FlightData {
        FlightData { altitude: alt, ..Default::default() }
    }

    #[test]
    fn sink_rate_requires_sustained_duration() {
        let rules = [sink_rule(-2.5, Some(5.0))];
        let mut ev = AlertEvaluator::default();

        assert_eq!(ev.evaluate(&rules, &vario(-3.0), 0), None);
        assert_eq!(ev.sink_timer_start(), Some(0));
        assert_eq!(ev.evaluate(&rules, &vario(-3.0), 4_900), None);

        let alert = ev.evaluate(&rules, &vario(-3.0), 5_100).expect("sink alert");
        assert_eq!(alert.kind, AlertKind::SinkRate);
        assert_eq!(alert.message, "SINK ALARM (-3.0 m/s)");
        assert_eq!(alert.sound, AlertSound::Siren);

        // keeps firing while the sink persists
        assert!(ev.evaluate(&rules, &vario(-3.2), 5_600).is_some());
    }

    #[test]
    fn recovery_restarts_the_sink_window() {
        let rules = [sink_rule(-2.5, Some(5.0))];
        let mut ev = AlertEvaluator::default();

        ev.evaluate(&rules, &vario(-3.0), 0);
        ev.evaluate(&rules, &vario(-3.0), 3_000);
        ev.evaluate(&rules, &vario(-1.0), 3_500);
        assert_eq!(ev.sink_timer_start(), None);

        ev.evaluate(&rules, &vario(-3.0), 4_000);
        assert_eq!(ev.evaluate(&rules, &vario(-3.0), 5_100), None);
        assert_eq!(ev.evaluate(&rules, &vario(-3.0), 8_900), None);
        assert!(ev.evaluate(&rules, &vario(-3.0), 9_100).is_some());
    }

    #[test]
    fn vario_exactly_at_threshold_neither_starts_nor_clears() {
        let rules = [sink_rule(-2.5, Some(5.0))];
        let mut ev = AlertEvaluator::default();

        ev.evaluate(&rules, &vario(-2.5), 0);
        assert_eq!(ev.sink_timer_start(), None);

        ev.evaluate(&rules, &vario(-3.0), 1_000);
        ev.evaluate(&rules, &vario(-2.5), 2_000);
        assert_eq!(ev.sink_timer_start(), Some(1_000));
        assert!(ev.evaluate(&rules, &vario(-3.0), 6_100).is_some());
    }

    #[test]
    fn missing_duration_fires_on_the_next_tick_below_threshold() {
        let rules = [sink_rule(-2.0, None)];
        let mut ev = AlertEvaluator::default();
        assert_eq!(ev.evaluate(&rules, &vario(-2.5), 10_000), None);
        assert!(ev.evaluate(&rules, &vario(-2.5), 11_000).is_some());
    }

    #[test]
    fn low_altitude_is_strict_and_ignores_no_fix() {
        let rules = [low_alt_rule(1000.0)];
        let mut ev = AlertEvaluator::default();

        let alert = ev.evaluate(&rules, &altitude(999), 0).expect("low altitude");
        assert_eq!(alert.message, "LOW ALTITUDE (< 1000m)");
        assert_eq!(alert.alert_id, "low_alt");

        assert_eq!(ev.evaluate(&rules, &altitude(0), 0), None);
        assert_eq!(ev.evaluate(&rules, &altitude(-20), 0), None);
        assert_eq!(ev.evaluate(&rules, &altitude(1000), 0), None);
    }

    #[test]
    fn first_matching_rule_wins() {
        let data = FlightData { altitude: 500, vario: -4.0, ..Default::default() };
        let mut ev = AlertEvaluator::default();
        let sink_first = [sink_rule(-2.5, Some(0.0)), low_alt_rule(1000.0)];
        ev.evaluate(&sink_first, &data, 0);
        let alert = ev.evaluate(&sink_first, &data, 1_000).unwrap();
        assert_eq!(alert.kind, AlertKind::SinkRate);

        let low_first = [low_alt_rule(1000.0), sink_rule(-2.5, Some(0.0))];
        let alert = ev.evaluate(&low_first, &data, 2_000).unwrap();
        assert_eq!(alert.kind, AlertKind::AltitudeLow);
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut rule = low_alt_rule(1000.0);
        rule.enabled = false;
        let mut ev = AlertEvaluator::default();
        assert_eq!(ev.evaluate(&[rule], &altitude(10), 0), None);
    }

    #[test]
    fn disabling_sink_rule_clears_its_timer() {
        let mut rules = [sink_rule(-2.5, Some(5.0))];
        let mut ev = AlertEvaluator::default();

        ev.evaluate(&rules, &vario(-3.0), 0);
        rules[0].enabled = false;
        ev.evaluate(&rules, &vario(-3.0), 3_000);
        assert_eq!(ev.sink_timer_start(), None);

        rules[0].enabled = true;
        ev.evaluate(&rules, &vario(-3.0), 4_000);
        assert_eq!(ev.sink_timer_start(), Some(4_000));
        assert_eq!(ev.evaluate(&rules, &vario(-3.0), 8_000), None);
        assert!(ev.evaluate(&rules, &vario(-3.0), 9_100).is_some());
    }

    #[test]
    fn audible_alert_is_throttled_but_visual_is_not() {
        let rules = [low_alt_rule(1000.0)];
        let mut ev = AlertEvaluator::default();

        let sounds: Vec<_> = (0..8)
            .map(|i| {
                let decision = ev.tick(&rules, &altitude(500), i * 500);
                assert!(decision.active.is_some());
                decision.audible
            })
            .collect();

        // t = 0 and t = 2500 only (strictly more than 2000 ms apart)
        let expected = [Some(AlertSound::Beep), None, None, None, None, Some(AlertSound::Beep), None, None];
        assert_eq!(sounds, expected);
    }

    #[test]
    fn no_alert_means_no_sound() {
        let mut ev = AlertEvaluator::default();
        let decision = ev.tick(&[low_alt_rule(1000.0)], &altitude(2000), 0);
        assert_eq!(decision, AlertDecision::default());
    }
}
