//! session.rs — per-flight extrema and a decimated position trail
//!
//! Independent of the filter and alert state: it only reads each
//! `FlightData` snapshot.

use tracing::{debug, info};
use uuid::Uuid;
use vario_types::{FlightData, FlightLog};

/// Flights this short (seconds) or shorter are not logged.
pub const MIN_LOGGED_FLIGHT_S: f64 = 60.0;
/// Combined |Δlat| + |Δlon| needed before a new trail point is kept (degrees).
/// A cheap decimation filter, not a distance.
pub const TRAIL_MIN_DELTA_DEG: f64 = 0.0001;
/// Logbook distance credited per trail point (km). An approximation only.
pub const KM_PER_TRAIL_POINT: f64 = 0.05;
/// Starting value for the altitude high-water mark.
const MAX_ALTITUDE_FLOOR: i32 = -9999;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone)]
pub struct FlightSession {
    start_ms: u64,
    min_logged_s: f64,
    max_altitude: i32,
    max_climb: f64,
    max_sink: f64,
    trail: Vec<TrailPoint>,
}

impl FlightSession {
    pub fn start(now_ms: u64) -> Self {
        Self::with_min_duration(now_ms, MIN_LOGGED_FLIGHT_S)
    }

    pub fn with_min_duration(now_ms: u64, min_logged_s: f64) -> Self {
        Self {
            start_ms: now_ms,
            min_logged_s,
            max_altitude: MAX_ALTITUDE_FLOOR,
            max_climb: 0.0,
            max_sink: 0.0,
            trail: Vec::new(),
        }
    }

    pub fn update(&mut self, data: &FlightData) {
        self.max_altitude = self.max_altitude.max(data.altitude);
        self.max_climb = self.max_climb.max(data.vario);
        self.max_sink = self.max_sink.min(data.vario);

        if let (Some(lat), Some(lon)) = (data.latitude, data.longitude) {
            let moved = self
                .trail
                .last()
                .map_or(true, |last| (last.lat - lat).abs() + (last.lon - lon).abs() > TRAIL_MIN_DELTA_DEG);
            if moved {
                self.trail.push(TrailPoint { lat, lon });
            }
        }
    }

    /// Close the session. Returns a log entry only for flights longer than
    /// the minimum duration.
    pub fn finish(self, now_ms: u64) -> Option<FlightLog> {
        let duration_seconds = now_ms.saturating_sub(self.start_ms) as f64 / 1000.0;
        if duration_seconds <= self.min_logged_s {
            debug!("Discarding {duration_seconds:.0}s flight (minimum {}s)", self.min_logged_s);
            return None;
        }

        let log = FlightLog {
            id: Uuid::new_v4().to_string(),
            date: self.start_ms,
            duration_seconds,
            max_altitude: self.max_altitude,
            max_climb: self.max_climb,
            max_sink: self.max_sink,
            distance_km: self.distance_km(),
        };
        info!(
            "🪂 Flight logged: {:.0}s, max alt {}m, climb {:.1}, sink {:.1}, ~{:.2}km",
            log.duration_seconds, log.max_altitude, log.max_climb, log.max_sink, log.distance_km
        );
        Some(log)
    }

    /// Trail-point count × 0.05 km; a single point covers no distance.
    pub fn distance_km(&self) -> f64 {
        if self.trail.len() > 1 {
            self.trail.len() as f64 * KM_PER_TRAIL_POINT
        } else {
            0.0
        }
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn max_altitude(&self) -> i32 {
        self.max_altitude
    }

    pub fn max_climb(&self) -> f64 {
        self.max_climb
    }

    pub fn max_sink(&self) -> f64 {
        self.max_sink
    }

    pub fn trail(&self) -> &[TrailPoint] {
        &self.trail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lon: f64) -> FlightData {
        FlightData { latitude: Some(lat), longitude: Some(lon), ..Default::default() }
    }

    #[test]
    fn short_flight_is_not_logged() {
        let session = FlightSession::start(1_000);
        assert!(session.finish(46_000).is_none());

        // exactly the minimum is still too short
        assert!(FlightSession::start(0).finish(60_000).is_none());
    }

    #[test]
    fn logged_flight_reports_distance_from_trail() {
        let mut session = FlightSession::start(10_000);
        session.update(&at(46.0, 7.0));
        session.update(&at(46.001, 7.0));
        session.update(&at(46.002, 7.001));

        let log = session.finish(75_000).expect("65 s flight is logged");
        assert_eq!(log.date, 10_000);
        assert_eq!(log.duration_seconds, 65.0);
        assert!((log.distance_km - 0.15).abs() < 1e-12);
        assert!(Uuid::parse_str(&log.id).is_ok());
    }

    #[test]
    fn trail_skips_points_within_decimation_delta() {
        let mut session = FlightSession::start(0);
        session.update(&at(46.0, 7.0));
        session.update(&at(46.00004, 7.00004)); // 0.00008 combined
        session.update(&FlightData::default()); // no position
        assert_eq!(session.trail().len(), 1);
        assert_eq!(session.distance_km(), 0.0);

        session.update(&at(46.00008, 7.00004)); // 0.00012 from the first point
        assert_eq!(session.trail().len(), 2);
        assert!((session.distance_km() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn tracks_extrema() {
        let mut session = FlightSession::start(0);
        assert_eq!(session.max_altitude(), -9999);

        for (altitude, vario) in [(1200, 1.5), (1350, 3.2), (1300, -4.1), (1250, -1.0)] {
            session.update(&FlightData { altitude, vario, ..Default::default() });
        }
        assert_eq!(session.max_altitude(), 1350);
        assert_eq!(session.max_climb(), 3.2);
        assert_eq!(session.max_sink(), -4.1);
    }

    #[test]
    fn climb_and_sink_marks_start_at_zero() {
        let mut session = FlightSession::start(0);
        session.update(&FlightData { vario: -0.5, ..Default::default() });
        assert_eq!(session.max_climb(), 0.0);
        session.update(&FlightData { vario: 0.7, ..Default::default() });
        assert_eq!(session.max_sink(), -0.5);
    }
}
