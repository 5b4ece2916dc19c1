//! # sample_hub
//!
//! UDP sample hub: receives `HubMessage` datagrams from devices (or the
//! simulator), runs each device's samples through its own `FlightInstrument`
//! and broadcasts the frames to every WebSocket client as `telemetry`.
//!
//! ## Lifecycle per device
//!   1. First accepted sample starts a flight at that sample's timestamp
//!   2. Every sample → frame → `ServerEvent::Telemetry`
//!   3. `end_flight` stops the instrument at the last sample timestamp and
//!      logs the flight if it qualifies
//!   4. A device silent for longer than the idle timeout is ended the same
//!      way by the periodic sweep
//!
//! UDP errors and malformed datagrams are logged and dropped; the hub task
//! never exits on bad input.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};
use vario_core::FlightInstrument;
use vario_types::{HubMessage, SampleEnvelope};

use crate::state::{ServerEvent, SharedState};

// ── Configuration ─────────────────────────────────────────────────────────────

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

pub struct HubConfig {
    /// UDP port to listen on (default 5556)
    pub udp_port: u16,
    /// Silence after which a device's flight is ended (default 120 s)
    pub idle_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            udp_port: std::env::var("VARIO_UDP_PORT")
                .ok().and_then(|v| v.parse().ok()).unwrap_or(5556),
            idle_timeout: Duration::from_secs(
                std::env::var("VARIO_DEVICE_TIMEOUT_S")
                    .ok().and_then(|v| v.parse().ok()).unwrap_or(120),
            ),
        }
    }
}

// ── Sequence Number Tracker (replay protection) ───────────────────────────────

/// Largest forward jump still treated as progress; anything beyond is a
/// wrapped backward jump.
const MAX_SEQ_JUMP: u32 = 1000;

#[derive(Default)]
struct SeqTracker {
    last_seq: HashMap<String, u32>,
}

impl SeqTracker {
    fn accept(&mut self, device_id: &str, seq_num: u32) -> bool {
        match self.last_seq.get_mut(device_id) {
            None => {
                self.last_seq.insert(device_id.to_string(), seq_num);
                true
            }
            Some(last) => {
                let diff = seq_num.wrapping_sub(*last);
                if diff == 0 || diff > MAX_SEQ_JUMP {
                    warn!("Hub: rejected sample from {device_id}: seq {seq_num} (last: {last})");
                    return false;
                }
                *last = seq_num;
                true
            }
        }
    }

    fn forget(&mut self, device_id: &str) {
        self.last_seq.remove(device_id);
    }
}

// ── Hub ───────────────────────────────────────────────────────────────────────

struct DeviceFlight {
    instrument: FlightInstrument,
    /// Local receive time of the last accepted sample
    last_seen: Instant,
}

pub struct SampleHub {
    state: SharedState,
    seq: SeqTracker,
    devices: HashMap<String, DeviceFlight>,
    idle_timeout: Duration,
}

impl SampleHub {
    pub fn new(state: SharedState, idle_timeout: Duration) -> Self {
        Self { state, seq: SeqTracker::default(), devices: HashMap::new(), idle_timeout }
    }

    pub async fn handle_datagram(&mut self, data: &[u8], src: SocketAddr) {
        let msg: HubMessage = match serde_json::from_slice(data) {
            Ok(m) => m,
            Err(e) => {
                debug!("Hub: malformed datagram from {src}: {e}");
                return;
            }
        };

        match msg {
            HubMessage::Sample(env) => self.handle_sample(env).await,
            HubMessage::EndFlight { device_id } => self.end_flight(&device_id).await,
        }
    }

    async fn handle_sample(&mut self, env: SampleEnvelope) {
        if !self.seq.accept(&env.device_id, env.seq_num) {
            return;
        }

        let timestamp = env.sample.timestamp;
        if !self.devices.contains_key(&env.device_id) {
            let mut instrument = match FlightInstrument::new(self.state.config.clone()) {
                Ok(i) => i,
                Err(e) => {
                    warn!("Hub: cannot create instrument for {}: {e}", env.device_id);
                    return;
                }
            };
            if let Err(e) = instrument.start(timestamp) {
                warn!("Hub: cannot start flight for {}: {e}", env.device_id);
                return;
            }
            info!("📡 Device {} started flying", env.device_id);
            self.devices.insert(
                env.device_id.clone(),
                DeviceFlight { instrument, last_seen: Instant::now() },
            );
        }

        let Some(device) = self.devices.get_mut(&env.device_id) else { return };
        device.last_seen = Instant::now();

        let frame = {
            let alerts = self.state.alerts.read().await;
            device.instrument.process(&env.sample, &alerts)
        };

        if let Some(frame) = frame {
            debug!("Hub: {} → alt={}m vario={:+.1}", env.device_id, frame.data.altitude, frame.data.vario);
            self.state.broadcast(ServerEvent::Telemetry { device_id: env.device_id, frame });
        }
    }

    async fn end_flight(&mut self, device_id: &str) {
        self.seq.forget(device_id);
        let Some(mut device) = self.devices.remove(device_id) else {
            debug!("Hub: end_flight for idle device {device_id}");
            return;
        };

        let last_ms = device.instrument.last_timestamp().unwrap_or_default();
        match device.instrument.stop(last_ms) {
            Some(log) => self.state.record_flight(log).await,
            None => info!("Device {device_id} landed; flight too short to log"),
        }
        debug!("Hub: {} devices still flying", self.devices.len());
    }

    /// End every flight whose device has been silent longer than the idle
    /// timeout, then drop sequence state for devices with no flight.
    pub async fn sweep_idle(&mut self, now: Instant) {
        let idle: Vec<String> = self
            .devices
            .iter()
            .filter(|(_, d)| now.saturating_duration_since(d.last_seen) > self.idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for device_id in idle {
            warn!("📡 Device {device_id} went silent, ending its flight");
            self.end_flight(&device_id).await;
        }

        let devices = &self.devices;
        self.seq.last_seq.retain(|id, _| devices.contains_key(id));
    }
}

// ── Main UDP listener task ────────────────────────────────────────────────────

/// Run the hub until the process exits. A port that cannot be bound only
/// disables the hub; WebSocket clients keep working.
pub async fn start_sample_hub(config: HubConfig, state: SharedState) {
    let addr = format!("0.0.0.0:{}", config.udp_port);
    let socket = match UdpSocket::bind(&addr).await {
        Ok(s) => {
            info!("📡 Sample hub listening on UDP {addr}");
            s
        }
        Err(e) => {
            warn!("Sample hub: could not bind UDP {addr}: {e} (device feeds disabled)");
            return;
        }
    };

    let mut hub = SampleHub::new(state, config.idle_timeout);
    let mut buf = vec![0u8; 4096];
    let mut sweep = interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            res = socket.recv_from(&mut buf) => match res {
                Ok((len, src)) => hub.handle_datagram(&buf[..len], src).await,
                Err(e) => warn!("Sample hub: UDP recv error: {e}"),
            },
            now = sweep.tick() => hub.sweep_idle(now).await,
        }
    }
}
