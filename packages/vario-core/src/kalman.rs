//! kalman.rs — one-dimensional Kalman filter
//!
//! Scalar model:
//!   x_k = A·x_{k-1} + B·u_k + w,   w ~ 𝒩(0, R)
//!   z_k = C·x_k + v,               v ~ 𝒩(0, Q)
//!
//! Note the naming: R is the *process* noise and Q the *measurement* noise.
//! Default tuning (R=1, Q=30) is for GPS altitude.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VarioError};

// ── Parameters ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Process noise covariance
    pub r: f64,
    /// Measurement noise covariance
    pub q: f64,
    /// State transition coefficient
    pub a: f64,
    /// Control coefficient
    pub b: f64,
    /// Measurement coefficient
    pub c: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self::new(1.0, 30.0)
    }
}

impl KalmanConfig {
    /// Random-walk model (A=1, B=0, C=1) with the given noise covariances.
    pub fn new(r: f64, q: f64) -> Self {
        Self { r, q, a: 1.0, b: 0.0, c: 1.0 }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("R", self.r), ("Q", self.q), ("A", self.a), ("B", self.b), ("C", self.c)] {
            if !value.is_finite() {
                return Err(VarioError::NonFiniteParameter { name, value });
            }
        }
        if self.r < 0.0 || self.q < 0.0 {
            return Err(VarioError::InvalidConfig(format!(
                "noise covariances must be non-negative (R={}, Q={})",
                self.r, self.q
            )));
        }
        // The seed divides by C, and the gain denominator C²·P + Q needs one
        // of the two noise terms to keep it away from zero.
        if self.c == 0.0 || (self.r == 0.0 && self.q == 0.0) {
            return Err(VarioError::DegenerateFilter);
        }
        Ok(())
    }
}

// ── Filter ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KalmanState {
    Uninitialized,
    Seeded { x: f64, cov: f64 },
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    config: KalmanConfig,
    state: KalmanState,
}

impl Default for KalmanFilter {
    /// Altitude tuning (R=1, Q=30); known valid, so no validation pass.
    fn default() -> Self {
        Self { config: KalmanConfig::default(), state: KalmanState::Uninitialized }
    }
}

impl KalmanFilter {
    pub fn new(config: KalmanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, state: KalmanState::Uninitialized })
    }

    /// Fuse one measurement `z` (with optional control `u`) and return the
    /// new estimate. The first call after construction or `reset` seeds the
    /// state directly from the measurement.
    pub fn filter(&mut self, z: f64, u: f64) -> f64 {
        let KalmanConfig { r, q, a, b, c } = self.config;

        let (x, cov) = match self.state {
            KalmanState::Uninitialized => (z / c, q / (c * c)),
            KalmanState::Seeded { x, cov } => {
                // Prediction
                let pred_x = a * x + b * u;
                let pred_cov = a * cov * a + r;

                // Update
                let k = pred_cov * c / (c * pred_cov * c + q);
                (pred_x + k * (z - c * pred_x), pred_cov - k * c * pred_cov)
            }
        };

        self.state = KalmanState::Seeded { x, cov };
        x
    }

    pub fn reset(&mut self) {
        self.state = KalmanState::Uninitialized;
    }

    pub fn state(&self) -> KalmanState {
        self.state
    }

    pub fn estimate(&self) -> Option<f64> {
        match self.state {
            KalmanState::Seeded { x, .. } => Some(x),
            KalmanState::Uninitialized => None,
        }
    }

    pub fn config(&self) -> &KalmanConfig {
        &self.config
    }
}
