//! main.rs — Glider flight simulator entry point
//!
//! Flies one simulated paraglider and streams its GPS fixes to the backend
//! hub over UDP, the same way a phone would:
//!   1. Physics: advance the glider by one epoch (× speed multiplier)
//!   2. Receiver: turn ground truth into a noisy fix, apply scenario faults
//!   3. Transmit: send the fix as a `HubMessage::Sample`
//!
//! With `--echo` the fixes also run through a local `FlightInstrument`, so the
//! pipeline output can be watched without a backend. The flight ends on
//! landing or after the configured duration, and an `EndFlight` is sent.

mod glider_sim;
mod gps_noise;
mod scenarios;
mod udp_tx;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tokio::time::interval;
use tracing::{debug, info, warn};
use vario_core::{FlightInstrument, VarioConfig};
use vario_types::{AudioCue, InstrumentFrame};

use glider_sim::{GliderConfig, GliderSim, LaunchConfig};
use gps_noise::{GpsConfig, GpsReceiver};
use scenarios::ScenarioType;
use udp_tx::UdpTransmitter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vario-sim", about = "AeroVario glider flight simulator")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// UDP hub address
    #[arg(long, default_value = "127.0.0.1:5556")]
    hub_addr: String,
    /// Simulation speed multiplier (1.0 = real-time)
    #[arg(long, default_value = "1.0")]
    speed: f64,
    /// Fault scenario to inject
    #[arg(long, value_enum, default_value = "thermals")]
    scenario: ScenarioType,
    /// Flight duration override (seconds)
    #[arg(long)]
    duration_s: Option<f64>,
    /// RNG seed for a reproducible flight
    #[arg(long)]
    seed: Option<u64>,
    /// Run fixes through a local instrument and log its output
    #[arg(long)]
    echo: bool,
}

// ── Config structs ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FullConfig {
    flight: LaunchConfig,
    simulation: SimulationConfig,
    glider: GliderConfig,
    gps: GpsConfig,
}

#[derive(Debug, Deserialize)]
struct SimulationConfig {
    update_rate_hz: f64,
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vario_simulator=info,vario_core=info".into()),
        )
        .init();

    let args = Args::parse();

    let config_str = std::fs::read_to_string(&args.config).unwrap_or_else(|_| {
        debug!("{} not readable, using built-in config", args.config);
        include_str!("../config.toml").to_string()
    });
    let mut cfg: FullConfig = toml::from_str(&config_str).context("invalid simulator config")?;
    if let Some(duration) = args.duration_s {
        cfg.flight.duration_s = duration;
    }
    let epoch_ms = epoch_ms(cfg.simulation.update_rate_hz)?;

    let scenario = scenarios::preset(args.scenario);
    let speed = args.speed.clamp(0.1, 20.0);

    info!(
        "🪂 Vario simulator starting — {} from {:.0}m, {:.0}s, scenario {:?}, {speed}×",
        cfg.flight.device_id, cfg.flight.launch_altitude_m, cfg.flight.duration_s, args.scenario
    );

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut glider = GliderSim::new(&cfg.flight, &cfg.glider, &scenario);
    let gps = GpsReceiver::new(cfg.gps.clone()).context("invalid GPS noise config")?;
    let mut tx = UdpTransmitter::new(&args.hub_addr, &cfg.flight.device_id)
        .context("failed to bind UDP socket")?;

    let t0_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();

    let mut echo = if args.echo {
        let mut instrument = FlightInstrument::new(VarioConfig::default())?;
        instrument.start(t0_ms)?;
        Some(instrument)
    } else {
        None
    };

    let dt = epoch_ms as f64 / 1000.0 * speed;
    let mut ticker = interval(Duration::from_millis(epoch_ms));
    let mut fix_counter: u32 = 0;

    info!("⏱ Sim loop running at {} Hz ({epoch_ms}ms epoch)", cfg.simulation.update_rate_hz);

    while glider.state.elapsed_s < cfg.flight.duration_s && !glider.is_landed() {
        ticker.tick().await;
        glider.tick(dt, &mut rng);

        let timestamp = t0_ms + (glider.state.elapsed_s * 1000.0).round() as u64;
        let fix = gps.observe(&glider.state, timestamp, &scenario, &mut rng);

        fix_counter += 1;
        if scenario.is_dropped(fix_counter) {
            debug!("fix {fix_counter} dropped");
            continue;
        }

        tx.send_sample(fix);

        if let Some(frame) = echo.as_mut().and_then(|i| i.process_default(&fix)) {
            log_frame(&frame);
        }

        if fix_counter % 20 == 0 {
            info!(
                "📡 t={:.0}s | alt={:.0}m | vz={:+.1} | {:?} | sent={}",
                glider.state.elapsed_s, glider.state.altitude_m, glider.state.vertical_mps, glider.phase, tx.sent()
            );
        }
    }

    if glider.is_landed() {
        info!("🛬 Landed after {:.0}s", glider.state.elapsed_s);
    }
    tx.send_end_flight();

    if let Some(mut instrument) = echo {
        let end_ms = t0_ms + (glider.state.elapsed_s * 1000.0).round() as u64;
        match instrument.stop(end_ms) {
            Some(log) => info!("📒 Echo logbook entry: {}", serde_json::to_string(&log)?),
            None => warn!("Echo flight too short to log"),
        }
    }

    Ok(())
}

/// Whole-millisecond epoch for an update rate. Rates above 1 kHz would
/// round to a zero epoch and stall simulated time.
fn epoch_ms(update_rate_hz: f64) -> Result<u64> {
    if !update_rate_hz.is_finite() || update_rate_hz <= 0.0 || update_rate_hz > 1000.0 {
        anyhow::bail!("update_rate_hz must be in (0, 1000], got {update_rate_hz}");
    }
    Ok((1000.0 / update_rate_hz) as u64)
}

fn log_frame(frame: &InstrumentFrame) {
    let d = &frame.data;
    match (&frame.alert, &frame.cue) {
        (Some(alert), Some(AudioCue::Alert { sound })) => {
            info!("🔔 {} ({sound:?}) | alt={}m vario={:+.1}", alert.message, d.altitude, d.vario)
        }
        _ => debug!(
            "alt={}m rel={}m vario={:+.1} speed={}km/h glide={:.1}",
            d.altitude, d.relative_altitude, d.vario, d.speed, d.glide_ratio
        ),
    }
}
