//! instrument.rs — one flight's worth of pipeline state
//!
//! `FlightInstrument` wires the computer, the alert evaluator and the session
//! together and decides which audio cue (if any) goes with each frame. A fresh
//! computer/evaluator/session triple is built on every `start`, so nothing
//! leaks from one flight into the next.

use tracing::{info, warn};
use vario_types::{AlertConfig, AudioCue, FlightLog, InstrumentFrame, PositionSample};

use crate::alerts::AlertEvaluator;
use crate::computer::FlightComputer;
use crate::config::VarioConfig;
use crate::error::Result;
use crate::session::FlightSession;
use crate::tone::vario_tone;

struct ActiveFlight {
    computer: FlightComputer,
    evaluator: AlertEvaluator,
    session: FlightSession,
    /// Start time, then the timestamp of the latest sample
    last_ms: u64,
}

pub struct FlightInstrument {
    config: VarioConfig,
    active: Option<ActiveFlight>,
    muted: bool,
}

impl FlightInstrument {
    pub fn new(config: VarioConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, active: None, muted: false })
    }

    /// Begin a flight. Returns false (and changes nothing) if one is
    /// already running.
    pub fn start(&mut self, now_ms: u64) -> Result<bool> {
        if self.active.is_some() {
            warn!("start ignored: flight already in progress");
            return Ok(false);
        }

        self.active = Some(ActiveFlight {
            computer: FlightComputer::new(&self.config)?,
            evaluator: AlertEvaluator::new(self.config.alert_repeat_ms),
            session: FlightSession::with_min_duration(now_ms, self.config.min_logged_flight_s),
            last_ms: now_ms,
        });
        info!("🚀 Flight started at {now_ms}");
        Ok(true)
    }

    /// Run one sample through the pipeline. `None` while no flight is active.
    pub fn process(&mut self, sample: &PositionSample, alerts: &[AlertConfig]) -> Option<InstrumentFrame> {
        let flight = self.active.as_mut()?;

        let data = flight.computer.process(sample);
        let decision = flight.evaluator.tick(alerts, &data, sample.timestamp);
        flight.session.update(&data);
        flight.last_ms = sample.timestamp;

        let cue = if self.muted {
            None
        } else if decision.active.is_some() {
            decision.audible.map(|sound| AudioCue::Alert { sound })
        } else {
            Some(AudioCue::Vario { tone: vario_tone(data.vario) })
        };

        Some(InstrumentFrame { data, alert: decision.active, cue })
    }

    /// Process with the alert list from the loaded configuration.
    pub fn process_default(&mut self, sample: &PositionSample) -> Option<InstrumentFrame> {
        let alerts = std::mem::take(&mut self.config.alerts);
        let frame = self.process(sample, &alerts);
        self.config.alerts = alerts;
        frame
    }

    /// Returns false when no flight is active.
    pub fn reset_takeoff(&mut self) -> bool {
        match self.active.as_mut() {
            Some(flight) => {
                flight.computer.reset_takeoff();
                true
            }
            None => false,
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// End the flight. The log entry is only produced for flights long
    /// enough to keep.
    pub fn stop(&mut self, now_ms: u64) -> Option<FlightLog> {
        let flight = self.active.take()?;
        info!("🛬 Flight stopped at {now_ms}");
        flight.session.finish(now_ms)
    }

    /// Latest time seen on the flight's own clock: the last sample's
    /// timestamp, or the start time before any sample. Stopping on this
    /// keeps the duration on the clock the flight started with.
    pub fn last_timestamp(&self) -> Option<u64> {
        self.active.as_ref().map(|f| f.last_ms)
    }

    pub fn is_flying(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<&FlightSession> {
        self.active.as_ref().map(|f| &f.session)
    }

    pub fn config(&self) -> &VarioConfig {
        &self.config
    }
}
