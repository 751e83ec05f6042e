//! # PDC Demo Runner
//!
//! Polls the whole controller family against the simulation drivers.
//! One scheduler loop calls every controller's `tick()` once per
//! period; the sims are scripted with a carrier, a mounted medium, and
//! some receive traffic so state transitions show up in the logs.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use pdc_common::config::{ControllersConfig, load_config};
use pdc_common::fs::OpenMode;
use pdc_controllers::controller::Controller;
use pdc_controllers::{
    DisplayController, LinkController, ReceiverController, SensorController, VolumeController,
};
use pdc_hal::registry::DriverRegistry;
use pdc_hal::sim::{SimBus, SimFilesystem};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// PDC Demo Runner — tick-polled peripheral controllers
#[derive(Parser, Debug)]
#[command(name = "pdc_controllers")]
#[command(version)]
#[command(about = "Polls the device controller state machines against simulation drivers")]
struct Args {
    /// Path to the controller configuration TOML.
    #[arg(default_value = "config/controllers.toml")]
    config: PathBuf,

    /// Number of polling ticks to run.
    #[arg(long, default_value_t = 200)]
    ticks: u32,

    /// Polling period in milliseconds.
    #[arg(long, default_value_t = 10)]
    tick_period_ms: u64,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("PDC demo runner v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("PDC demo runner done");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config(&args.config) {
        Ok(config) => {
            info!("Config OK: {}", args.config.display());
            config
        }
        Err(e) => {
            warn!(
                "No usable config at '{}' ({e}). Continuing with defaults.",
                args.config.display()
            );
            ControllersConfig::default()
        }
    };

    // The display takes its driver through the registry, the way real
    // transaction drivers would be wired; the other sims are built
    // directly because the demo scripts their behavior.
    let mut registry = DriverRegistry::new();
    registry.register("sim", || Box::new(SimBus::new()));
    info!("Drivers available: {:?}", registry.list());

    let mut link_bus = SimBus::new();
    link_bus.set_carrier(true);

    let mut sensor_bus = SimBus::new();
    sensor_bus.set_self_test_pass(true);
    sensor_bus.push_rx(&[0x10, 0x00, 0xF0, 0xFF, 0x02, 0x00]);

    let mut receiver_bus = SimBus::new();
    receiver_bus.push_rx(b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9*47\r\n");

    let mut volume = VolumeController::new(SimFilesystem::new(), config.volume.clone());
    let mut display = DisplayController::new(registry.create("sim")?, config.display.clone());
    display.set_line(0, "PDC demo")?;
    display.set_write();

    let mut controllers: Vec<Box<dyn Controller>> = vec![
        Box::new(LinkController::new(link_bus, config.link.clone())),
        Box::new(display),
        Box::new(SensorController::new(sensor_bus, config.sensor.clone())),
        Box::new(ReceiverController::new(receiver_bus, config.receiver.clone())),
    ];

    let period = Duration::from_millis(args.tick_period_ms);
    for tick in 0..args.ticks {
        volume.tick();
        for controller in controllers.iter_mut() {
            controller.tick();
        }

        // Exercise the volume once the mount has settled.
        if tick == 5 {
            volume.open("demo.txt", OpenMode::WRITE | OpenMode::CREATE)?;
            volume.write(b"tick 5\n")?;
            volume.close()?;
        }

        if tick % 50 == 0 {
            log_states(tick, &volume, &controllers);
        }
        std::thread::sleep(period);
    }

    log_states(args.ticks, &volume, &controllers);
    if volume.faulted() {
        warn!("volume finished faulted (bits {:#x})", volume.fault_bits());
    }
    for controller in &controllers {
        if controller.faulted() {
            warn!(
                "{} finished faulted (bits {:#x})",
                controller.name(),
                controller.fault_bits()
            );
        }
    }
    Ok(())
}

fn log_states(
    tick: u32,
    volume: &VolumeController<SimFilesystem>,
    controllers: &[Box<dyn Controller>],
) {
    info!(tick, "volume={}", volume.state_label());
    for controller in controllers {
        info!(tick, "{}={}", controller.name(), controller.state_label());
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
