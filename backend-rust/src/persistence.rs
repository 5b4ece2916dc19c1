use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use vario_types::{AlertConfig, FlightLog};

const ALERTS_FILE: &str = "alerts.json";
const LOGBOOK_FILE: &str = "flight_logs.json";

/// JSON files for alert settings and the logbook, kept in one data directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load alert settings. Returns `defaults` if the file is missing or
    /// corrupt. Entries saved before sounds existed come back as sirens.
    pub async fn load_alerts(&self, defaults: &[AlertConfig]) -> Vec<AlertConfig> {
        match self.read_json::<Vec<AlertConfig>>(ALERTS_FILE).await {
            Some(alerts) => {
                info!("Loaded {} alert settings from disk", alerts.len());
                alerts
            }
            None => defaults.to_vec(),
        }
    }

    pub async fn save_alerts(&self, alerts: &[AlertConfig]) -> Result<()> {
        self.write_json(ALERTS_FILE, alerts).await
    }

    /// Load the logbook, oldest flight first. Empty if missing or corrupt.
    pub async fn load_logbook(&self) -> Vec<FlightLog> {
        let logs = self.read_json::<Vec<FlightLog>>(LOGBOOK_FILE).await.unwrap_or_default();
        info!("Logbook: {} flights", logs.len());
        logs
    }

    pub async fn save_logbook(&self, logs: &[FlightLog]) -> Result<()> {
        self.write_json(LOGBOOK_FILE, logs).await
    }

    async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        if !path.exists() {
            info!("No {name} found, using defaults");
            return None;
        }

        match fs::read_to_string(&path).await {
            Ok(data) => match serde_json::from_str::<T>(&data) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Failed to parse {}: {e}, using defaults", path.display());
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {e}, using defaults", path.display());
                None
            }
        }
    }

    /// Write to `<name>.tmp` then rename over the target, so a reader never
    /// sees a half-written file. Callers serialize writes to the same name.
    async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating data dir {}", self.dir.display()))?;
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}
