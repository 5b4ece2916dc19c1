//! vario-core — altitude filtering, vario estimation and alerting
//!
//! Pipeline per sample:
//!   PositionSample → FlightComputer → FlightData → AlertEvaluator → FlightSession
//!
//! `FlightInstrument` owns one of each per flight. All timing comes from the
//! sample timestamps (ms); nothing here reads the wall clock.

pub mod alerts;
pub mod computer;
pub mod config;
pub mod error;
pub mod instrument;
pub mod kalman;
pub mod session;
pub mod tone;

pub use alerts::{AlertDecision, AlertEvaluator};
pub use computer::FlightComputer;
pub use config::{default_alerts, VarioConfig};
pub use error::{Result, VarioError};
pub use instrument::FlightInstrument;
pub use kalman::{KalmanConfig, KalmanFilter, KalmanState};
pub use session::FlightSession;
pub use tone::vario_tone;
