use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use vario_core::VarioConfig;
use vario_types::{AlertConfig, AlertPatch, FlightLog, InstrumentFrame, PositionSample};

use crate::persistence::SettingsStore;

pub type SharedState = Arc<AppState>;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

// ─── Client → Server ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Timestamps are optional; the server clock is used when absent.
    StartFlight {
        #[serde(default)]
        timestamp: Option<u64>,
    },
    StopFlight {
        #[serde(default)]
        timestamp: Option<u64>,
    },
    Sample(PositionSample),
    ResetTakeoff,
    SetMuted { muted: bool },
    UpdateAlert { id: String, patch: AlertPatch },
    GetLogbook,
}

// ─── Server → Client ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Output for this connection's own flight
    Frame { frame: InstrumentFrame },
    /// Output for a device flying through the UDP hub
    Telemetry { device_id: String, frame: InstrumentFrame },
    Alerts { alerts: Vec<AlertConfig> },
    Logbook { logs: Vec<FlightLog> },
    FlightLogged { log: FlightLog },
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }
}

// ─── Shared Application State ─────────────────────────────────────────────────

pub struct AppState {
    pub config: VarioConfig,
    pub alerts: RwLock<Vec<AlertConfig>>,
    pub logbook: RwLock<Vec<FlightLog>>,
    pub store: SettingsStore,
    pub events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    /// Restore alert settings and the logbook from the store. The config's
    /// alert list is the fallback for a fresh data directory.
    pub async fn load(config: VarioConfig, store: SettingsStore) -> Self {
        let alerts = store.load_alerts(&config.alerts).await;
        let logbook = store.load_logbook().await;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            alerts: RwLock::new(alerts),
            logbook: RwLock::new(logbook),
            store,
            events,
        }
    }

    /// Send to every connected client. Nobody listening is not an error.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    /// Apply a partial update to one alert, persist and broadcast the new
    /// list. `None` if no alert has that id.
    pub async fn update_alert(&self, id: &str, patch: &AlertPatch) -> Option<Vec<AlertConfig>> {
        // The write guard is held through the save so disk order matches
        // memory order.
        let mut alerts = self.alerts.write().await;
        let alert = alerts.iter_mut().find(|a| a.id == id)?;
        alert.apply(patch);
        info!("🔧 Alert '{id}' updated");

        if let Err(e) = self.store.save_alerts(&alerts).await {
            warn!("Failed to persist alert settings: {e:#}");
        }
        let snapshot = alerts.clone();
        self.broadcast(ServerEvent::Alerts { alerts: snapshot.clone() });
        Some(snapshot)
    }

    /// Append a finished flight to the logbook, persist and announce it.
    pub async fn record_flight(&self, log: FlightLog) {
        {
            let mut logbook = self.logbook.write().await;
            logbook.push(log.clone());
            if let Err(e) = self.store.save_logbook(&logbook).await {
                warn!("Failed to persist logbook: {e:#}");
            }
        }
        self.broadcast(ServerEvent::FlightLogged { log });
    }
}
