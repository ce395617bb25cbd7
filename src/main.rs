use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use touchjoy::bridge::Bridge;
use touchjoy::config::{default_config_path, ConfigWatcher, DriveConfig};
use touchjoy::drive::Gear;
use touchjoy::output::{FanoutPad, FramePublisher, OutputFrame, TracePad, UinputPad, VirtualPad};
use touchjoy::snapshot::SnapshotWriter;
use touchjoy::touch::{EvdevSource, ReplaySource, TouchSource};

/// Turns a multitouch touchpad into a virtual racing controller
#[derive(Parser, Debug)]
#[command(name = "touchjoy", version, about)]
struct Args {
    /// Touchpad event device to grab, e.g. /dev/input/event5
    #[arg(
        long,
        conflicts_with = "replay",
        required_unless_present_any = ["replay", "init_config"]
    )]
    device: Option<PathBuf>,

    /// Replay a recorded touch trace instead of reading a device
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Drive config file (TOML, or JSON by extension), reloaded while running
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the left-finger snapshot JSON to this file
    #[arg(long)]
    state: Option<PathBuf>,

    /// Also write output frames as CSV to this file. Replays write them to
    /// stdout when this is not given.
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Write a default config file and exit unless an input is given
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    let args = Args::parse();
    debug!("Arguments: {:?}", args);

    if args.init_config {
        let path = args
            .config
            .clone()
            .or_else(default_config_path)
            .ok_or_else(|| eyre!("No --config given and no platform config directory"))?;
        DriveConfig::write_default(&path)
            .map_err(|e| eyre!("Failed to write default config: {}", e))?;
        if args.device.is_none() && args.replay.is_none() {
            return Ok(());
        }
    }

    let live = args.device.is_some();
    let source: Box<dyn TouchSource> = match (&args.device, &args.replay) {
        (Some(device), _) => Box::new(
            EvdevSource::open(device).map_err(|e| eyre!("Failed to open device: {}", e))?,
        ),
        (None, Some(trace)) => Box::new(
            ReplaySource::open(trace).map_err(|e| eyre!("Failed to open trace: {}", e))?,
        ),
        (None, None) => return Err(eyre!("No --device or --replay given")),
    };

    // An implicit default config is only watched if it already exists
    let config_path = match args.config {
        Some(path) => Some(path),
        None => default_config_path().filter(|path| path.exists()),
    };
    let config = ConfigWatcher::open(config_path);

    let mut pads: Vec<Box<dyn VirtualPad>> = Vec::new();
    if live {
        let joystick =
            UinputPad::create().map_err(|e| eyre!("Failed to create joystick: {}", e))?;
        pads.push(Box::new(joystick));
    }
    match &args.frames {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| eyre!("Failed to create {}: {}", path.display(), e))?;
            info!("Writing frames to {}", path.display());
            pads.push(Box::new(TracePad::new(BufWriter::new(file))));
        }
        None if !live => pads.push(Box::new(TracePad::new(io::stdout()))),
        None => {}
    }
    let publisher = FramePublisher::new();
    let gear_log = tokio::spawn(log_gear_changes(publisher.subscribe()));
    pads.push(Box::new(publisher));
    let pad = FanoutPad::new(pads);
    debug!("Publishing frames to {} outputs", pad.len());

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) if live => {
                info!("Ctrl-C received, stopping bridge at the next touch event");
                signal_token.cancel();
            }
            Ok(()) => {
                info!("Ctrl-C received, stopping bridge");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let bridge = Bridge::create(
        source,
        Box::new(pad),
        config,
        args.state.map(SnapshotWriter::new),
    );

    // The loop blocks on the source, keep it off the async workers
    let loop_token = cancel.clone();
    let summary = tokio::task::spawn_blocking(move || bridge.initialize().run(&loop_token))
        .await
        .map_err(|e| eyre!("Bridge task failed: {}", e))?
        .map_err(|e| eyre!("Bridge stopped with error: {}", e))?;

    if let Err(e) = gear_log.await {
        warn!("Gear logger ended abnormally: {}", e);
    }
    info!(
        "Bridge finished: {} frames from {} samples, final gear {}",
        summary.frames, summary.samples, summary.final_gear
    );
    Ok(())
}

async fn log_gear_changes(mut frames: watch::Receiver<OutputFrame>) {
    let mut gear = Gear::Neutral;
    while frames.changed().await.is_ok() {
        let frame = *frames.borrow_and_update();
        if frame.gear != gear {
            info!("Gear {} -> {} at {} ms", gear, frame.gear, frame.time.as_millis());
            gear = frame.gear;
        }
    }
    debug!("Frame publisher closed");
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| Level::from_str(value.trim()).ok())
        .unwrap_or(Level::INFO);

    // stdout carries the frame trace
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(io::stderr)
        .pretty()
        .init();
}
