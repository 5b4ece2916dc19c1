//! scenarios.rs — Injectable flight and receiver conditions
//!
//! Each scenario reproduces something a real instrument has to cope with:
//! strong sink that should trip the sink alarm, a receiver that drops fixes,
//! a fix that never gets good enough to latch takeoff, or a feed with no
//! altitude at all.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioType {
    /// Alternating thermal climbs and glides (the default day)
    Thermals,
    /// Glides sink 3× harder; long enough to trip a sink alarm
    StrongSink,
    /// Receiver periodically goes silent for a few fixes
    GpsDropout,
    /// Accuracy never settles below the takeoff gate
    PoorFix,
    /// Fixes carry position but no altitude
    NoAltitude,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub active: Vec<ScenarioType>,
    /// Glide sink multiplier under StrongSink
    pub sink_multiplier: f64,
    /// Fixes dropped per dropout cycle
    pub dropout_len: u32,
    /// Fixes delivered between dropouts
    pub dropout_gap: u32,
    /// Reported accuracy floor under PoorFix (m)
    pub poor_fix_accuracy_m: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            active: vec![ScenarioType::Thermals],
            sink_multiplier: 3.0,
            dropout_len: 4,
            dropout_gap: 20,
            poor_fix_accuracy_m: 35.0,
        }
    }
}

impl ScenarioConfig {
    pub fn has(&self, s: ScenarioType) -> bool {
        self.active.contains(&s)
    }

    /// Whether fix number `fix_counter` is lost to a dropout.
    pub fn is_dropped(&self, fix_counter: u32) -> bool {
        if !self.has(ScenarioType::GpsDropout) || self.dropout_len == 0 {
            return false;
        }
        let cycle = self.dropout_gap + self.dropout_len;
        fix_counter % cycle >= self.dropout_gap
    }

    pub fn glide_sink_multiplier(&self) -> f64 {
        if self.has(ScenarioType::StrongSink) { self.sink_multiplier } else { 1.0 }
    }
}

/// Scenario presets selectable from the command line
pub fn preset(kind: ScenarioType) -> ScenarioConfig {
    match kind {
        ScenarioType::Thermals => ScenarioConfig::default(),
        other => ScenarioConfig {
            active: vec![ScenarioType::Thermals, other],
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropout_cycle() {
        let sc = preset(ScenarioType::GpsDropout);
        let dropped: Vec<u32> = (0..48).filter(|&i| sc.is_dropped(i)).collect();
        assert_eq!(dropped, vec![20, 21, 22, 23, 44, 45, 46, 47]);
    }

    #[test]
    fn default_day_has_no_faults() {
        let sc = ScenarioConfig::default();
        assert!(!(0..100).any(|i| sc.is_dropped(i)));
        assert_eq!(sc.glide_sink_multiplier(), 1.0);
    }

    #[test]
    fn strong_sink_preset_keeps_thermals() {
        let sc = preset(ScenarioType::StrongSink);
        assert!(sc.has(ScenarioType::Thermals));
        assert_eq!(sc.glide_sink_multiplier(), 3.0);
    }
}
