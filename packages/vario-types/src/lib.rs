//! # vario-types
//!
//! Shared flight-instrument structures for the AeroVario variometer.
//!
//! These types are used by:
//! - `vario-core`: the filtering, vario and alerting pipeline
//! - `vario-simulator`: producing `PositionSample`s for the UDP hub
//! - `backend-rust`: WebSocket / UDP wire formats and logbook persistence
//!
//! ## Units
//!
//! - Altitude: meters above mean sea level
//! - Vario: m/s, positive = climbing
//! - Sample speed: m/s; `FlightData::speed`: km/h
//! - Timestamps: milliseconds, monotonically non-decreasing per device
//!
//! JSON field names are camelCase to match the browser client.

use serde::{Deserialize, Serialize};

// ── Sensor Input ──────────────────────────────────────────────────────────────

/// One positioning fix from the external sensor feed.
///
/// Every field except the timestamp may be missing; the flight computer
/// substitutes 0 for anything absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Meters MSL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Ground speed, m/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Track over ground, degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Horizontal accuracy radius, meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Fix time in milliseconds
    pub timestamp: u64,
}

impl PositionSample {
    pub fn at(timestamp: u64) -> Self {
        Self { timestamp, ..Default::default() }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed = Some(speed_mps);
        self
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

// ── UDP Hub Wire Format ───────────────────────────────────────────────────────

/// A sample as sent to the backend hub by a device or the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleEnvelope {
    pub device_id: String,
    /// Monotonically increasing per-device sequence number.
    /// Hub rejects duplicates and large backward jumps.
    pub seq_num: u32,
    #[serde(flatten)]
    pub sample: PositionSample,
}

/// Datagram accepted by the backend UDP hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HubMessage {
    Sample(SampleEnvelope),
    /// The device ended its flight; the hub finishes and logs the session.
    EndFlight { device_id: String },
}

// ── Flight Snapshot ───────────────────────────────────────────────────────────

/// Output of the flight computer for one sample. Never contains NaN/Infinity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightData {
    /// Filtered MSL altitude, meters
    pub altitude: i32,
    /// Meters above the takeoff reference; 0 until one is latched
    pub relative_altitude: i32,
    /// Vertical speed, m/s, one decimal
    pub vario: f64,
    /// Ground speed, km/h
    pub speed: i32,
    /// Heading, degrees
    pub heading: i32,
    /// L/D, one decimal; 0 when undefined
    pub glide_ratio: f64,
    /// GPS accuracy, meters
    pub accuracy: i32,
    /// Raw passthrough for trail recording
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

// ── Alerts ────────────────────────────────────────────────────────────────────

/// Audible signature attached to an alert. Synthesis is up to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSound {
    /// Older stored settings carry no sound and fall back to the siren.
    #[default]
    Siren,
    Beep,
    Whoop,
    Flatline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    AltitudeLow,
    SinkRate,
}

/// Condition checked by an alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertRule {
    /// Fires while `0 < altitude < threshold` (meters).
    AltitudeLow { threshold: f64 },
    /// Fires once vario has stayed below `threshold` (negative m/s) for
    /// longer than `duration` seconds.
    SinkRate {
        threshold: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
}

impl AlertRule {
    pub fn kind(&self) -> AlertKind {
        match self {
            AlertRule::AltitudeLow { .. } => AlertKind::AltitudeLow,
            AlertRule::SinkRate { .. } => AlertKind::SinkRate,
        }
    }

    pub fn threshold(&self) -> f64 {
        match *self {
            AlertRule::AltitudeLow { threshold } | AlertRule::SinkRate { threshold, .. } => threshold,
        }
    }
}

/// One user-configurable alert. The list is owned by the settings store;
/// the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub id: String,
    pub enabled: bool,
    #[serde(flatten)]
    pub rule: AlertRule,
    #[serde(default)]
    pub sound: AlertSound,
}

impl AlertConfig {
    pub fn kind(&self) -> AlertKind {
        self.rule.kind()
    }

    /// Apply a partial update. `duration` is ignored for altitude alerts.
    pub fn apply(&mut self, patch: &AlertPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(sound) = patch.sound {
            self.sound = sound;
        }
        match &mut self.rule {
            AlertRule::AltitudeLow { threshold } => {
                if let Some(t) = patch.threshold {
                    *threshold = t;
                }
            }
            AlertRule::SinkRate { threshold, duration } => {
                if let Some(t) = patch.threshold {
                    *threshold = t;
                }
                if let Some(d) = patch.duration {
                    *duration = Some(d);
                }
            }
        }
    }
}

/// Partial alert update sent by a client settings panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<AlertSound>,
}

/// The single alert surfaced for a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAlert {
    pub alert_id: String,
    pub kind: AlertKind,
    pub message: String,
    pub sound: AlertSound,
}

// ── Audio Cues ────────────────────────────────────────────────────────────────

/// Vario tone the audio layer should be playing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tone", rename_all = "snake_case")]
pub enum VarioTone {
    Silent,
    /// Repeating climb beeps; pitch and cadence rise with the climb rate.
    Climb {
        frequency_hz: f64,
        interval_ms: f64,
        beep_ms: f64,
    },
    /// Continuous low sink tone.
    Sink,
}

/// What the audio layer should do for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum AudioCue {
    /// Interrupt the vario tone and play an alert signature.
    Alert { sound: AlertSound },
    Vario { tone: VarioTone },
}

/// Everything the UI/audio layer needs for one processed sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentFrame {
    pub data: FlightData,
    /// Visual alert message; refreshed every tick.
    pub alert: Option<ActiveAlert>,
    /// Audible cue; `None` when muted or while an alert is throttled.
    pub cue: Option<AudioCue>,
}

// ── Logbook ───────────────────────────────────────────────────────────────────

/// Summary of a completed flight longer than the minimum logged duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightLog {
    pub id: String,
    /// Session start, milliseconds
    pub date: u64,
    pub duration_seconds: f64,
    pub max_altitude: i32,
    pub max_climb: f64,
    pub max_sink: f64,
    /// Trail-point approximation, not a geodesic distance
    pub distance_km: f64,
}
