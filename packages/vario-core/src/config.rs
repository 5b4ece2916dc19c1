//! config.rs — pipeline tuning, loaded from TOML
//!
//! Every field has a default, so an empty file (or none at all) gives the
//! stock instrument:
//!
//! ```toml
//! vario_window_ms = 2000
//! takeoff_max_accuracy_m = 20.0
//! alert_repeat_ms = 2000
//! min_logged_flight_s = 60.0
//!
//! [filter]
//! r = 1.0
//! q = 30.0
//!
//! [[alerts]]
//! id = "sink_alarm"
//! enabled = true
//! type = "SINK_RATE"
//! threshold = -2.5
//! duration = 5.0
//! sound = "siren"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vario_types::{AlertConfig, AlertRule, AlertSound};

use crate::alerts::ALERT_REPEAT_MS;
use crate::computer::{TAKEOFF_MAX_ACCURACY_M, VARIO_WINDOW_MS};
use crate::error::{Result, VarioError};
use crate::kalman::KalmanConfig;
use crate::session::MIN_LOGGED_FLIGHT_S;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarioConfig {
    pub filter: KalmanConfig,
    /// Regression window for vario (ms)
    pub vario_window_ms: u64,
    /// Takeoff reference latches on the first fix better than this (m)
    pub takeoff_max_accuracy_m: f64,
    /// Minimum spacing between audible alerts (ms)
    pub alert_repeat_ms: u64,
    /// Flights must be longer than this to be logged (s)
    pub min_logged_flight_s: f64,
    /// Alert list used until a client supplies its own
    pub alerts: Vec<AlertConfig>,
}

impl Default for VarioConfig {
    fn default() -> Self {
        Self {
            filter: KalmanConfig::default(),
            vario_window_ms: VARIO_WINDOW_MS,
            takeoff_max_accuracy_m: TAKEOFF_MAX_ACCURACY_M,
            alert_repeat_ms: ALERT_REPEAT_MS,
            min_logged_flight_s: MIN_LOGGED_FLIGHT_S,
            alerts: default_alerts(),
        }
    }
}

impl VarioConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| VarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;

        if self.vario_window_ms == 0 {
            return Err(VarioError::InvalidConfig("vario_window_ms must be positive".into()));
        }
        if !self.takeoff_max_accuracy_m.is_finite() {
            return Err(VarioError::InvalidConfig("takeoff_max_accuracy_m must be finite".into()));
        }
        if !self.min_logged_flight_s.is_finite() || self.min_logged_flight_s < 0.0 {
            return Err(VarioError::InvalidConfig(
                "min_logged_flight_s must be a non-negative number".into(),
            ));
        }

        let mut ids = HashSet::new();
        for alert in &self.alerts {
            if !ids.insert(alert.id.as_str()) {
                return Err(VarioError::InvalidConfig(format!("duplicate alert id '{}'", alert.id)));
            }
            if !alert.rule.threshold().is_finite() {
                return Err(VarioError::InvalidConfig(format!("alert '{}' has a non-finite threshold", alert.id)));
            }
        }
        Ok(())
    }
}

/// Stock alerts: low altitude (off) and sustained sink (on).
pub fn default_alerts() -> Vec<AlertConfig> {
    vec![
        AlertConfig {
            id: "low_alt".into(),
            enabled: false,
            rule: AlertRule::AltitudeLow { threshold: 1000.0 },
            sound: AlertSound::Beep,
        },
        AlertConfig {
            id: "sink_alarm".into(),
            enabled: true,
            rule: AlertRule::SinkRate { threshold: -2.5, duration: Some(5.0) },
            sound: AlertSound::Siren,
        },
    ]
}
