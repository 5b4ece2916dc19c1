//! gps_noise.rs — GPS receiver model
//!
//! Turns glider ground truth into the fixes a phone receiver would report:
//! 1. Altitude jitter (Gaussian, σ from config)
//! 2. Accuracy that starts poor and settles over a warm-up period, so the
//!    first fixes do not pass the takeoff accuracy gate
//! 3. Scenario faults: poor fix floor, missing altitude

use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use serde::Deserialize;
use vario_types::PositionSample;

use crate::glider_sim::GliderState;
use crate::scenarios::{ScenarioConfig, ScenarioType};

#[derive(Debug, Clone, Deserialize)]
pub struct GpsConfig {
    pub sigma_altitude_m: f64,
    pub warmup_s: f64,
    pub initial_accuracy_m: f64,
    pub settled_accuracy_m: f64,
}

pub struct GpsReceiver {
    cfg: GpsConfig,
    altitude_noise: Normal<f64>,
}

impl GpsReceiver {
    pub fn new(cfg: GpsConfig) -> Result<Self, NormalError> {
        let altitude_noise = Normal::new(0.0, cfg.sigma_altitude_m)?;
        Ok(Self { cfg, altitude_noise })
    }

    /// Reported horizontal accuracy after `elapsed_s` seconds of tracking.
    pub fn accuracy_at(&self, elapsed_s: f64) -> f64 {
        if self.cfg.warmup_s <= 0.0 || elapsed_s >= self.cfg.warmup_s {
            return self.cfg.settled_accuracy_m;
        }
        let frac = elapsed_s.max(0.0) / self.cfg.warmup_s;
        self.cfg.initial_accuracy_m + (self.cfg.settled_accuracy_m - self.cfg.initial_accuracy_m) * frac
    }

    pub fn observe<R: Rng + ?Sized>(
        &self,
        truth: &GliderState,
        timestamp: u64,
        scenario: &ScenarioConfig,
        rng: &mut R,
    ) -> PositionSample {
        let mut accuracy = self.accuracy_at(truth.elapsed_s);
        if scenario.has(ScenarioType::PoorFix) {
            accuracy = accuracy.max(scenario.poor_fix_accuracy_m);
        }

        let altitude = (!scenario.has(ScenarioType::NoAltitude))
            .then(|| truth.altitude_m + self.altitude_noise.sample(rng));

        PositionSample {
            latitude: Some(truth.lat),
            longitude: Some(truth.lon),
            altitude,
            speed: Some(truth.ground_speed_mps),
            heading: Some(truth.heading_deg),
            accuracy: Some(accuracy),
            timestamp,
        }
    }
}
