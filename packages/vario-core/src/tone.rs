//! tone.rs — vario audio cue selection
//!
//! Higher climb = higher pitch and faster cadence. Only the cue parameters are
//! decided here; the client owns synthesis.

use vario_types::VarioTone;

/// Climb beeps start above this vario (m/s).
pub const CLIMB_TONE_THRESHOLD: f64 = 0.2;
/// Sink tone starts below this vario (m/s).
pub const SINK_TONE_THRESHOLD: f64 = -2.0;

const BASE_FREQUENCY_HZ: f64 = 400.0;
const MAX_FREQUENCY_HZ: f64 = 1200.0;
const BASE_INTERVAL_MS: f64 = 600.0;
const MIN_INTERVAL_MS: f64 = 120.0;
/// Per m/s of climb, for both pitch (Hz) and cadence (ms).
const STEP_PER_MPS: f64 = 100.0;
const BEEP_DUTY: f64 = 0.6;

pub fn vario_tone(vario: f64) -> VarioTone {
    if vario > CLIMB_TONE_THRESHOLD {
        let frequency_hz = (BASE_FREQUENCY_HZ + vario * STEP_PER_MPS).min(MAX_FREQUENCY_HZ);
        let interval_ms = (BASE_INTERVAL_MS - vario * STEP_PER_MPS).max(MIN_INTERVAL_MS);
        VarioTone::Climb { frequency_hz, interval_ms, beep_ms: interval_ms * BEEP_DUTY }
    } else if vario < SINK_TONE_THRESHOLD {
        VarioTone::Sink
    } else {
        VarioTone::Silent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_band_is_silent() {
        for v in [0.2, 0.0, -1.0, -2.0] {
            assert_eq!(vario_tone(v), VarioTone::Silent, "vario {v}");
        }
    }

    #[test]
    fn climb_pitch_and_cadence_scale_with_vario() {
        assert_eq!(
            vario_tone(2.0),
            VarioTone::Climb { frequency_hz: 600.0, interval_ms: 400.0, beep_ms: 240.0 }
        );
    }

    #[test]
    fn strong_climb_is_clamped() {
        match vario_tone(10.0) {
            VarioTone::Climb { frequency_hz, interval_ms, .. } => {
                assert_eq!(frequency_hz, 1200.0);
                assert_eq!(interval_ms, 120.0);
            }
            other => panic!("expected climb tone, got {other:?}"),
        }
    }

    #[test]
    fn sink_below_threshold() {
        assert_eq!(vario_tone(-2.1), VarioTone::Sink);
    }
}
