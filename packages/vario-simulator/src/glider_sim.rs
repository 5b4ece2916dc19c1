//! glider_sim.rs — Paraglider flight physics
//!
//! Ground truth for one glider:
//! - Alternates between thermalling (circling, climbing) and gliding
//!   (straight, sinking)
//! - Position integrated on a flat-earth approximation around the launch
//! - Lands (and stays landed) on reaching ground altitude
//!
//! Pure math, no I/O. The GPS model turns this into noisy fixes.

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::scenarios::ScenarioConfig;

/// Meters per degree of latitude.
const M_PER_DEG_LAT: f64 = 111_320.0;

// ── Config (populated from config.toml) ───────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LaunchConfig {
    pub device_id: String,
    pub launch_lat: f64,
    pub launch_lon: f64,
    pub launch_altitude_m: f64,
    pub ground_altitude_m: f64,
    pub duration_s: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GliderConfig {
    pub airspeed_mps: f64,
    pub glide_sink_mps: f64,
    pub thermal_climb_mps: f64,
    pub thermal_climb_spread_mps: f64,
    pub thermal_duration_s: f64,
    pub glide_duration_s: f64,
    pub turn_rate_deg_s: f64,
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Phase {
    Thermal { remaining_s: f64, climb_mps: f64 },
    Glide { remaining_s: f64 },
    Landed,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GliderState {
    pub lat: f64,
    pub lon: f64,
    /// True altitude MSL (m)
    pub altitude_m: f64,
    /// Track, degrees from north
    pub heading_deg: f64,
    pub ground_speed_mps: f64,
    pub vertical_mps: f64,
    pub elapsed_s: f64,
}

pub struct GliderSim {
    pub state: GliderState,
    pub phase: Phase,
    cfg: GliderConfig,
    ground_altitude_m: f64,
    sink_multiplier: f64,
}

impl GliderSim {
    /// Launches straight into the first thermal.
    pub fn new(launch: &LaunchConfig, cfg: &GliderConfig, scenario: &ScenarioConfig) -> Self {
        Self {
            state: GliderState {
                lat: launch.launch_lat,
                lon: launch.launch_lon,
                altitude_m: launch.launch_altitude_m,
                heading_deg: 0.0,
                ground_speed_mps: cfg.airspeed_mps,
                vertical_mps: 0.0,
                elapsed_s: 0.0,
            },
            phase: Phase::Thermal { remaining_s: cfg.thermal_duration_s, climb_mps: cfg.thermal_climb_mps },
            cfg: cfg.clone(),
            ground_altitude_m: launch.ground_altitude_m,
            sink_multiplier: scenario.glide_sink_multiplier(),
        }
    }

    pub fn is_landed(&self) -> bool {
        self.phase == Phase::Landed
    }

    /// Advance by dt seconds.
    pub fn tick<R: Rng + ?Sized>(&mut self, dt: f64, rng: &mut R) {
        let s = &mut self.state;
        s.elapsed_s += dt;

        let (vertical, turn) = match &mut self.phase {
            Phase::Landed => {
                s.ground_speed_mps = 0.0;
                s.vertical_mps = 0.0;
                return;
            }
            Phase::Thermal { remaining_s, climb_mps } => {
                *remaining_s -= dt;
                (*climb_mps, self.cfg.turn_rate_deg_s)
            }
            Phase::Glide { remaining_s } => {
                *remaining_s -= dt;
                (self.cfg.glide_sink_mps * self.sink_multiplier, 0.0)
            }
        };

        s.heading_deg = (s.heading_deg + turn * dt).rem_euclid(360.0);
        s.vertical_mps = vertical;
        s.ground_speed_mps = self.cfg.airspeed_mps;
        s.altitude_m += vertical * dt;

        let hdg = s.heading_deg.to_radians();
        let dist = s.ground_speed_mps * dt;
        s.lat += dist * hdg.cos() / M_PER_DEG_LAT;
        s.lon += dist * hdg.sin() / (M_PER_DEG_LAT * s.lat.to_radians().cos());

        if s.altitude_m <= self.ground_altitude_m {
            s.altitude_m = self.ground_altitude_m;
            s.vertical_mps = 0.0;
            s.ground_speed_mps = 0.0;
            self.phase = Phase::Landed;
            return;
        }

        self.phase = match self.phase {
            Phase::Thermal { remaining_s, .. } if remaining_s <= 0.0 => {
                Phase::Glide { remaining_s: self.cfg.glide_duration_s }
            }
            Phase::Glide { remaining_s } if remaining_s <= 0.0 => {
                let spread = self.cfg.thermal_climb_spread_mps.abs();
                let climb_mps = if spread > 0.0 {
                    let centre = self.cfg.thermal_climb_mps;
                    Uniform::new(centre - spread, centre + spread).sample(rng)
                } else {
                    self.cfg.thermal_climb_mps
                };
                Phase::Thermal { remaining_s: self.cfg.thermal_duration_s, climb_mps }
            }
            unchanged => unchanged,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{preset, ScenarioType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn launch() -> LaunchConfig {
        LaunchConfig {
            device_id: "test".into(),
            launch_lat: 46.0,
            launch_lon: 7.0,
            launch_altitude_m: 1500.0,
            ground_altitude_m: 400.0,
            duration_s: 600.0,
        }
    }

    fn glider() -> GliderConfig {
        GliderConfig {
            airspeed_mps: 10.0,
            glide_sink_mps: -1.0,
            thermal_climb_mps: 2.0,
            thermal_climb_spread_mps: 0.0,
            thermal_duration_s: 10.0,
            glide_duration_s: 10.0,
            turn_rate_deg_s: 18.0,
        }
    }

    #[test]
    fn thermal_then_glide() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut sim = GliderSim::new(&launch(), &glider(), &ScenarioConfig::default());

        for _ in 0..10 {
            sim.tick(1.0, &mut rng);
        }
        assert!((sim.state.altitude_m - 1520.0).abs() < 1e-9);
        assert!(matches!(sim.phase, Phase::Glide { .. }));

        for _ in 0..5 {
            sim.tick(1.0, &mut rng);
        }
        assert!((sim.state.altitude_m - 1515.0).abs() < 1e-9);
    }

    #[test]
    fn strong_sink_scales_glide() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut sim = GliderSim::new(&launch(), &glider(), &preset(ScenarioType::StrongSink));
        for _ in 0..11 {
            sim.tick(1.0, &mut rng);
        }
        assert_eq!(sim.state.vertical_mps, -3.0);
    }

    #[test]
    fn lands_at_ground_and_stays() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cfg = glider();
        cfg.thermal_duration_s = 0.5;
        cfg.glide_sink_mps = -200.0;
        let mut sim = GliderSim::new(&launch(), &cfg, &ScenarioConfig::default());

        for _ in 0..20 {
            sim.tick(1.0, &mut rng);
        }
        assert!(sim.is_landed());
        assert_eq!(sim.state.altitude_m, 400.0);
        assert_eq!(sim.state.ground_speed_mps, 0.0);
    }

    #[test]
    fn gliding_north_moves_latitude_only() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cfg = glider();
        cfg.thermal_duration_s = 0.0;
        cfg.turn_rate_deg_s = 0.0;
        let mut sim = GliderSim::new(&launch(), &cfg, &ScenarioConfig::default());

        sim.tick(1.0, &mut rng);
        sim.tick(1.0, &mut rng);
        assert!((sim.state.lat - (46.0 + 20.0 / M_PER_DEG_LAT)).abs() < 1e-12);
        assert!((sim.state.lon - 7.0).abs() < 1e-12);
    }
}
