use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use vario_core::FlightInstrument;

use crate::state::{now_ms, AppState, ClientCommand, ServerEvent, SharedState};

// ─── WebSocket Upgrade ────────────────────────────────────────────────────────

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connection = one instrument. Shared events (alert settings, logged
/// flights, hub telemetry) are relayed alongside the connection's own frames.
async fn handle_socket(mut socket: WebSocket, state: SharedState) {
    let mut instrument = match FlightInstrument::new(state.config.clone()) {
        Ok(i) => i,
        Err(e) => {
            error!("Cannot create instrument: {e}");
            let _ = send(&mut socket, &ServerEvent::error(e.to_string())).await;
            return;
        }
    };
    let mut events = state.events.subscribe();

    info!("🔌 Client connected");

    // Current settings and logbook on connect
    let alerts = state.alerts.read().await.clone();
    let logs = state.logbook.read().await.clone();
    for event in [ServerEvent::Alerts { alerts }, ServerEvent::Logbook { logs }] {
        if send(&mut socket, &event).await.is_err() {
            return;
        }
    }

    'conn: loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Ok(event) => {
                    if send(&mut socket, &event).await.is_err() { break 'conn; }
                }
                Err(RecvError::Lagged(n)) => warn!("Client lagging, skipped {n} events"),
                Err(RecvError::Closed) => break 'conn,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(raw))) => {
                    for reply in dispatch(&state, &mut instrument, &raw).await {
                        if send(&mut socket, &reply).await.is_err() { break 'conn; }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break 'conn,
                Some(Err(e)) => {
                    debug!("WebSocket error: {e}");
                    break 'conn;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    end_dropped_flight(&state, &mut instrument).await;
    info!("🔌 Client disconnected");
}

/// A dropped connection ends its flight like an explicit stop, on the
/// flight's own clock. The client may have started it with its own
/// timestamps, so the server clock is not comparable.
async fn end_dropped_flight(state: &AppState, instrument: &mut FlightInstrument) {
    let Some(last_ms) = instrument.last_timestamp() else { return };
    if let Some(log) = instrument.stop(last_ms) {
        state.record_flight(log).await;
    }
}

async fn send(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json)).await,
        Err(e) => {
            warn!("Failed to serialize event: {e}");
            Ok(())
        }
    }
}

// ─── Command Dispatch ─────────────────────────────────────────────────────────

/// Handle one client message. Returns the replies for this connection only;
/// events for everyone go out on the broadcast channel.
pub async fn dispatch(state: &AppState, instrument: &mut FlightInstrument, raw: &str) -> Vec<ServerEvent> {
    let cmd: ClientCommand = match serde_json::from_str(raw) {
        Ok(c) => c,
        Err(e) => {
            debug!("Malformed client message: {e}");
            return vec![ServerEvent::error(format!("malformed command: {e}"))];
        }
    };

    match cmd {
        ClientCommand::StartFlight { timestamp } => match instrument.start(timestamp.unwrap_or_else(now_ms)) {
            Ok(true) => vec![],
            Ok(false) => vec![ServerEvent::error("flight already in progress")],
            Err(e) => vec![ServerEvent::error(e.to_string())],
        },

        ClientCommand::StopFlight { timestamp } => {
            if !instrument.is_flying() {
                return vec![ServerEvent::error("no flight in progress")];
            }
            // Logged flights reach this client through the broadcast
            if let Some(log) = instrument.stop(timestamp.unwrap_or_else(now_ms)) {
                state.record_flight(log).await;
            }
            vec![]
        }

        ClientCommand::Sample(sample) => {
            let alerts = state.alerts.read().await;
            match instrument.process(&sample, &alerts) {
                Some(frame) => vec![ServerEvent::Frame { frame }],
                None => vec![],
            }
        }

        ClientCommand::ResetTakeoff => {
            if instrument.reset_takeoff() {
                vec![]
            } else {
                vec![ServerEvent::error("no flight in progress")]
            }
        }

        ClientCommand::SetMuted { muted } => {
            instrument.set_muted(muted);
            vec![]
        }

        ClientCommand::UpdateAlert { id, patch } => match state.update_alert(&id, &patch).await {
            Some(_) => vec![],
            None => vec![ServerEvent::error(format!("unknown alert '{id}'"))],
        },

        ClientCommand::GetLogbook => {
            let logs = state.logbook.read().await.clone();
            vec![ServerEvent::Logbook { logs }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SettingsStore;
    use vario_core::VarioConfig;
    use vario_types::{AlertSound, AudioCue};

    async fn setup(dir: &tempfile::TempDir) -> (AppState, FlightInstrument) {
        let state = AppState::load(VarioConfig::default(), SettingsStore::new(dir.path())).await;
        let instrument = FlightInstrument::new(VarioConfig::default()).unwrap();
        (state, instrument)
    }

    fn sample(t: u64, alt: f64) -> String {
        format!(r#"{{"cmd":"sample","altitude":{alt},"accuracy":5,"timestamp":{t}}}"#)
    }

    #[tokio::test]
    async fn samples_are_ignored_until_started() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mut inst) = setup(&dir).await;

        assert!(dispatch(&state, &mut inst, &sample(0, 1200.0)).await.is_empty());

        assert!(dispatch(&state, &mut inst, r#"{"cmd":"start_flight","timestamp":0}"#).await.is_empty());
        let replies = dispatch(&state, &mut inst, &sample(0, 1200.0)).await;
        assert!(matches!(&replies[..], [ServerEvent::Frame { frame }] if frame.data.altitude == 1200));
    }

    #[tokio::test]
    async fn double_start_and_idle_stop_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mut inst) = setup(&dir).await;

        let replies = dispatch(&state, &mut inst, r#"{"cmd":"stop_flight"}"#).await;
        assert!(matches!(&replies[..], [ServerEvent::Error { .. }]));

        dispatch(&state, &mut inst, r#"{"cmd":"start_flight"}"#).await;
        let replies = dispatch(&state, &mut inst, r#"{"cmd":"start_flight"}"#).await;
        assert!(matches!(&replies[..], [ServerEvent::Error { message }] if message.contains("already")));
    }

    #[tokio::test]
    async fn enabled_alert_sounds_then_mutes() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mut inst) = setup(&dir).await;

        let update = r#"{"cmd":"update_alert","id":"low_alt","patch":{"enabled":true}}"#;
        assert!(dispatch(&state, &mut inst, update).await.is_empty());
        dispatch(&state, &mut inst, r#"{"cmd":"start_flight","timestamp":0}"#).await;

        let replies = dispatch(&state, &mut inst, &sample(0, 500.0)).await;
        let ServerEvent::Frame { frame } = &replies[0] else { panic!("expected frame") };
        assert_eq!(frame.alert.as_ref().map(|a| a.message.as_str()), Some("LOW ALTITUDE (< 1000m)"));
        assert_eq!(frame.cue, Some(AudioCue::Alert { sound: AlertSound::Beep }));

        dispatch(&state, &mut inst, r#"{"cmd":"set_muted","muted":true}"#).await;
        let replies = dispatch(&state, &mut inst, &sample(5_000, 500.0)).await;
        let ServerEvent::Frame { frame } = &replies[0] else { panic!("expected frame") };
        assert!(frame.alert.is_some());
        assert_eq!(frame.cue, None);
    }

    #[tokio::test]
    async fn stop_records_qualifying_flight() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mut inst) = setup(&dir).await;
        let mut rx = state.events.subscribe();

        dispatch(&state, &mut inst, r#"{"cmd":"start_flight","timestamp":1000}"#).await;
        dispatch(&state, &mut inst, &sample(1_000, 1500.0)).await;
        dispatch(&state, &mut inst, r#"{"cmd":"stop_flight","timestamp":121000}"#).await;

        assert!(matches!(rx.recv().await.unwrap(), ServerEvent::FlightLogged { log } if log.duration_seconds == 120.0));

        let replies = dispatch(&state, &mut inst, r#"{"cmd":"get_logbook"}"#).await;
        assert!(matches!(&replies[..], [ServerEvent::Logbook { logs }] if logs.len() == 1 && logs[0].date == 1000));
    }

    #[tokio::test]
    async fn dropped_connection_logs_on_client_clock() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mut inst) = setup(&dir).await;

        dispatch(&state, &mut inst, r#"{"cmd":"start_flight","timestamp":0}"#).await;
        dispatch(&state, &mut inst, &sample(0, 1500.0)).await;
        dispatch(&state, &mut inst, &sample(90_000, 1400.0)).await;
        end_dropped_flight(&state, &mut inst).await;

        assert!(!inst.is_flying());
        let logbook = state.logbook.read().await;
        assert_eq!(logbook.len(), 1);
        assert_eq!(logbook[0].date, 0);
        assert_eq!(logbook[0].duration_seconds, 90.0);
    }

    #[tokio::test]
    async fn dropped_connection_without_samples_logs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mut inst) = setup(&dir).await;

        dispatch(&state, &mut inst, r#"{"cmd":"start_flight","timestamp":0}"#).await;
        end_dropped_flight(&state, &mut inst).await;
        assert!(!inst.is_flying());
        assert!(state.logbook.read().await.is_empty());

        // idle connection: nothing to end
        end_dropped_flight(&state, &mut inst).await;
        assert!(state.logbook.read().await.is_empty());
    }

    #[tokio::test]
    async fn bad_input_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mut inst) = setup(&dir).await;

        let replies = dispatch(&state, &mut inst, "not json").await;
        assert!(matches!(&replies[..], [ServerEvent::Error { .. }]));

        let replies = dispatch(&state, &mut inst, r#"{"cmd":"update_alert","id":"ghost","patch":{}}"#).await;
        assert!(matches!(&replies[..], [ServerEvent::Error { message }] if message.contains("ghost")));

        let replies = dispatch(&state, &mut inst, r#"{"cmd":"reset_takeoff"}"#).await;
        assert!(matches!(&replies[..], [ServerEvent::Error { .. }]));
    }
}
