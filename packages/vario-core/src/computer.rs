//! computer.rs — raw position samples → `FlightData`
//!
//! Per sample:
//!   1. Substitute 0 for missing/non-finite sensor fields
//!   2. Smooth altitude through the Kalman filter
//!   3. Latch the takeoff reference on the first good fix
//!   4. Keep a 2 s window of (time, smoothed altitude)
//!   5. Vario = least-squares slope of that window
//!   6. Glide ratio while sinking with ground speed
//!
//! One instance per flight. Nothing here can fail or emit NaN.

use std::collections::VecDeque;

use tracing::{debug, info};
use vario_types::{FlightData, PositionSample};

use crate::config::VarioConfig;
use crate::error::Result;
use crate::kalman::KalmanFilter;

// ── Constants ─────────────────────────────────────────────────────────────────

pub const VARIO_WINDOW_MS: u64 = 2000;
/// A fix must be better than this to latch the takeoff reference (meters).
pub const TAKEOFF_MAX_ACCURACY_M: f64 = 20.0;
/// Glide ratio is only defined while sinking faster than this (m/s)...
const GLIDE_MIN_SINK_MPS: f64 = -0.5;
/// ...and moving faster than this over the ground (km/h).
const GLIDE_MIN_SPEED_KMH: f64 = 5.0;
const MPS_TO_KMH: f64 = 3.6;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct AltitudePoint {
    time_ms: u64,
    altitude_m: f64,
}

/// Last raw fix seen by the computer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastFix {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: u64,
}

pub struct FlightComputer {
    filter: KalmanFilter,
    window_ms: u64,
    takeoff_max_accuracy_m: f64,
    takeoff_altitude: Option<f64>,
    history: VecDeque<AltitudePoint>,
    last_fix: Option<LastFix>,
}

impl Default for FlightComputer {
    fn default() -> Self {
        Self::with_filter(KalmanFilter::default())
    }
}

impl FlightComputer {
    pub fn new(config: &VarioConfig) -> Result<Self> {
        let filter = KalmanFilter::new(config.filter)?;
        Ok(Self {
            window_ms: config.vario_window_ms,
            takeoff_max_accuracy_m: config.takeoff_max_accuracy_m,
            ..Self::with_filter(filter)
        })
    }

    pub fn with_filter(filter: KalmanFilter) -> Self {
        Self {
            filter,
            window_ms: VARIO_WINDOW_MS,
            takeoff_max_accuracy_m: TAKEOFF_MAX_ACCURACY_M,
            takeoff_altitude: None,
            history: VecDeque::new(),
            last_fix: None,
        }
    }

    pub fn process(&mut self, sample: &PositionSample) -> FlightData {
        let raw_alt = reading(sample.altitude);
        let speed_kmh = reading(sample.speed) * MPS_TO_KMH;
        let heading = reading(sample.heading);
        let accuracy = reading(sample.accuracy);
        let timestamp = sample.timestamp;

        let filtered_alt = self.smooth(raw_alt);

        if self.takeoff_altitude.is_none() && accuracy < self.takeoff_max_accuracy_m && raw_alt != 0.0 {
            info!("🛫 Takeoff reference latched at {filtered_alt:.1}m (accuracy {accuracy:.0}m)");
            self.takeoff_altitude = Some(filtered_alt);
        }

        let window_ms = self.window_ms;
        self.history.retain(|p| timestamp.saturating_sub(p.time_ms) < window_ms);
        self.history.push_back(AltitudePoint { time_ms: timestamp, altitude_m: filtered_alt });

        let vario = regression_slope(&self.history);

        let glide = if vario < GLIDE_MIN_SINK_MPS && speed_kmh > GLIDE_MIN_SPEED_KMH {
            (speed_kmh / MPS_TO_KMH / vario).abs()
        } else {
            0.0
        };

        let latitude = sample.latitude.filter(|v| v.is_finite());
        let longitude = sample.longitude.filter(|v| v.is_finite());
        self.last_fix = Some(LastFix { latitude, longitude, timestamp });

        let relative = self.takeoff_altitude.map_or(0.0, |takeoff| filtered_alt - takeoff);

        FlightData {
            altitude: round_int(filtered_alt),
            relative_altitude: round_int(relative),
            vario: round_tenth(vario),
            speed: round_int(speed_kmh),
            heading: round_int(heading),
            glide_ratio: round_tenth(glide),
            accuracy: round_int(accuracy),
            latitude,
            longitude,
        }
    }

    /// Re-anchor the takeoff reference to the latest smoothed altitude
    /// (0 before any sample). The filter state is left untouched.
    pub fn reset_takeoff(&mut self) {
        let altitude = self.history.back().map_or(0.0, |p| p.altitude_m);
        info!("↺ Takeoff reference reset to {altitude:.1}m");
        self.takeoff_altitude = Some(altitude);
    }

    pub fn takeoff_altitude(&self) -> Option<f64> {
        self.takeoff_altitude
    }

    pub fn last_fix(&self) -> Option<LastFix> {
        self.last_fix
    }

    pub fn window_len(&self) -> usize {
        self.history.len()
    }

    /// Filtered altitude, falling back to the last good estimate if the
    /// filter ever produced a non-finite value.
    fn smooth(&mut self, raw_alt: f64) -> f64 {
        let prior = self.filter.estimate();
        let filtered = self.filter.filter(raw_alt, 0.0);
        if filtered.is_finite() {
            return filtered;
        }
        debug!("Kalman estimate went non-finite, reseeding from {raw_alt}");
        self.filter.reset();
        let reseeded = self.filter.filter(raw_alt, 0.0);
        if reseeded.is_finite() {
            reseeded
        } else {
            prior.unwrap_or(0.0)
        }
    }
}

// ── Numerics ──────────────────────────────────────────────────────────────────

/// Ordinary least-squares slope (m/s) of altitude against time.
///
/// Time is measured in seconds from the oldest point to keep sums small.
/// Fewer than two points, a zero denominator (identical timestamps) or a
/// non-finite result all yield 0.
fn regression_slope(history: &VecDeque<AltitudePoint>) -> f64 {
    let n = history.len();
    if n < 2 {
        return 0.0;
    }
    let t0 = history[0].time_ms;

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for p in history {
        let x = p.time_ms.saturating_sub(t0) as f64 / 1000.0;
        let y = p.altitude_m;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let n = n as f64;
    let denom = n * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        return 0.0;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    if slope.is_finite() { slope } else { 0.0 }
}

fn reading(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0)
}

fn round_int(v: f64) -> i32 {
    // `as` saturates and maps NaN to 0
    v.round() as i32
}

fn round_tenth(v: f64) -> f64 {
    let r = (v * 10.0).round() / 10.0;
    if r == 0.0 || !r.is_finite() { 0.0 } else { r }
}
