//! g-broker CLI: device listing, config inspection, and scripted event replay.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use g_broker_core::clock::ManualClock;
use g_broker_core::config::{load_config, SessionConfig};
use g_broker_core::gkey::{CanonicalEvent, DeviceKind, GkeyCode};
use g_broker_core::sdk::{LcdType, Rgb};
use g_broker_core::session::DeviceSession;
use g_broker_core::sim::SimulatedSdk;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "g-broker",
    version,
    about = "Logitech G-key event broker and LCD frame pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected keyboards with G-keys and an LCD.
    ListDevices,
    /// Print the effective session configuration as JSON.
    ShowConfig {
        /// JSON config file (defaults apply to missing fields).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replay raw G-key events through a session on the simulated SDK.
    Simulate {
        /// JSON config file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON array of {index, down, mode, mouse, at_ms}; built-in script if omitted.
        #[arg(long)]
        script: Option<PathBuf>,
    },
}

/// One scripted driver callback.
#[derive(Debug, Deserialize)]
struct ScriptEvent {
    index: u8,
    down: bool,
    #[serde(default = "default_mode")]
    mode: u8,
    #[serde(default)]
    mouse: bool,
    at_ms: u64,
}

fn default_mode() -> u8 {
    1
}

fn builtin_script() -> Vec<ScriptEvent> {
    let ev = |index, down, mode, at_ms| ScriptEvent {
        index,
        down,
        mode,
        mouse: false,
        at_ms,
    };
    vec![
        ev(6, true, 1, 0),
        ev(6, true, 1, 20),
        ev(6, false, 1, 80),
        ev(6, true, 1, 90),
        ev(3, true, 2, 200),
        ev(3, false, 2, 260),
        ev(1, true, 3, 400),
        ev(1, false, 3, 450),
    ]
}

fn read_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(p) => load_config(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(SessionConfig::default()),
    }
}

fn read_script(path: Option<&Path>) -> Result<Vec<ScriptEvent>> {
    let Some(p) = path else {
        return Ok(builtin_script());
    };
    let raw = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing script {}", p.display()))
}

fn describe(evt: &CanonicalEvent) -> String {
    let origin = match evt.device {
        DeviceKind::Key => "key",
        DeviceKind::Mouse => "mouse",
    };
    let state = if evt.pressed { "down" } else { "up" };
    format!(
        "[{:>6} ms] {origin} {:>3} {state:<4} {} {}",
        evt.timestamp_ms, evt.index, evt.mode, evt.label
    )
}

fn simulate(config: SessionConfig, script: Vec<ScriptEvent>) -> Result<()> {
    let sdk = Arc::new(SimulatedSdk::new());
    if config.lcd_type != LcdType::None {
        sdk.set_connected(&[config.lcd_type]);
    }
    let clock = Arc::new(ManualClock::new());
    let mut session = DeviceSession::open_with_clock(
        config,
        Arc::clone(&sdk) as _,
        Arc::clone(&sdk) as _,
        Arc::clone(&clock) as _,
    )?;
    let mut events = session.event_stream();
    let has_lcd = session.lcd_type() != LcdType::None;
    if session.lcd_type() == LcdType::Color {
        session.frame()?.set_title("g-broker", Rgb(0, 200, 255))?;
    }

    for step in &script {
        clock.set(step.at_ms);
        let code = GkeyCode::pack(step.index, step.down, step.mode, step.mouse);
        debug!(code = format_args!("0x{:08X}", code.0), "Firing scripted event");
        sdk.fire(code, None);

        while let Some(evt) = events.try_next() {
            println!("{}", describe(&evt));
            if has_lcd {
                let frame = session.frame()?;
                frame.set_line(0, format!("Mode {}", evt.mode))?;
                frame.set_line(
                    1,
                    format!("{} {}", evt.label, if evt.pressed { "down" } else { "up" }),
                )?;
            }
        }

        if has_lcd {
            let outcome = session.tick()?;
            println!("           tick: {outcome:?}");
        }
    }

    println!();
    println!("SDK calls:");
    for call in sdk.take_calls() {
        println!("  {call:?}");
    }
    session.close();
    println!();
    println!("Stats: {}", serde_json::to_string_pretty(&session.stats())?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListDevices => {
            let devices = g_broker_core::device::discover_devices()?;
            if devices.is_empty() {
                println!("No Logitech G-key/LCD keyboards found.");
                println!("Ensure your keyboard is connected and drivers are set up.");
            } else {
                for dev in &devices {
                    println!(
                        "{} (VID: 0x{:04X}, PID: 0x{:04X}, LCD: {}, G-keys: {}, path: {})",
                        dev.model.name(),
                        dev.vid,
                        dev.pid,
                        dev.model.lcd_type(),
                        dev.model.gkey_count(),
                        dev.path
                    );
                }
            }
        }
        Commands::ShowConfig { config } => {
            let config = read_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Simulate { config, script } => {
            let config = read_config(config.as_deref())?;
            let script = read_script(script.as_deref())?;
            simulate(config, script)?;
        }
    }

    Ok(())
}
