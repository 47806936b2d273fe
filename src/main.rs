use target_overlay::config::OverlayConfig;
use target_overlay::console_display::ConsoleDisplay;
use target_overlay::coordinator::Coordinator;
use target_overlay::error::ReplayError;
use target_overlay::jsonl_reader::DetectionReader;
use target_overlay::simulator::Simulator;
use target_overlay::surface::{HeadlessSurface, Surface};
use target_overlay::types::*;
#[cfg(feature = "gui")]
use target_overlay::window::MinifbSurface;

use clap::Parser;
use crossbeam_channel::{bounded, Receiver};
use log::{error, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Parser)]
#[command(name = "target-overlay")]
#[command(about = "Interactive video-tracking overlay with manual telemetry geolocation")]
struct Cli {
    /// JSON config file (missing keys take defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay a JSONL detection log instead of running the simulator
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Replay as fast as the overlay consumes instead of at the log's frame rate
    #[arg(long)]
    unpaced: bool,

    /// Simulator frame rate
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Simulator frame width
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Simulator frame height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Frame queue capacity
    #[arg(long, default_value_t = 8)]
    queue_capacity: usize,

    /// Start with auto-freeze enabled
    #[arg(long)]
    auto_freeze: bool,

    /// Directory for recording sessions
    #[arg(long, default_value = "./recordings")]
    record_dir: PathBuf,

    /// Start recording immediately
    #[arg(long)]
    record: bool,

    /// Disable the native window
    #[arg(long)]
    no_gui: bool,

    /// Console dashboard instead of a window (implies --no-gui)
    #[arg(long)]
    console: bool,

    /// Console display refresh rate (Hz)
    #[arg(long, default_value_t = 10)]
    display_hz: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match OverlayConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        },
        None => OverlayConfig::default(),
    };
    if cli.auto_freeze {
        config.auto_freeze = true;
    }
    if let Err(e) = config.validate() {
        error!("{}", e);
        process::exit(1);
    }

    let gui_enabled = cfg!(feature = "gui") && !cli.no_gui && !cli.console;

    info!("═══════════════════════════════════════════════");
    info!("  TARGET OVERLAY v{}", env!("CARGO_PKG_VERSION"));
    match &cli.replay {
        Some(path) => info!("  Source: replay {:?}", path),
        None => info!("  Source: SIMULATOR {}x{} @ {:.0} fps", cli.width, cli.height, cli.fps),
    }
    if gui_enabled {
        info!("  UI: native window");
    } else if cli.console {
        info!("  UI: Console TUI");
    } else {
        info!("  UI: headless");
    }
    info!("  Auto-freeze: {}", if config.auto_freeze { "ON" } else { "OFF" });
    info!("═══════════════════════════════════════════════");

    let clock = SessionClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let (tx, rx) = bounded::<Delivery>(cli.queue_capacity.max(1));

    // ─── Producer ───────────────────────────────────────────────────
    let producer = match &cli.replay {
        Some(path) => {
            let reader = match File::open(path)
                .map_err(ReplayError::from)
                .and_then(|f| DetectionReader::open(BufReader::new(f)))
            {
                Ok(r) => r,
                Err(e) => {
                    error!("Cannot open replay {:?}: {}", path, e);
                    process::exit(1);
                }
            };
            let flag = shutdown.clone();
            let paced = !cli.unpaced;
            thread::Builder::new().name("replay".into()).spawn(move || {
                reader.replay(&tx, &flag, paced);
            })
        }
        None => {
            let mut sim = Simulator::new(tx, shutdown.clone(), cli.width, cli.height, cli.fps);
            thread::Builder::new().name("simulator".into()).spawn(move || sim.run())
        }
    };
    let producer = match producer {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start producer thread: {}", e);
            process::exit(1);
        }
    };

    // ─── Coordinator on the main thread (the window is not Send) ────
    let ok = if cli.console {
        run_coordinator(&cli, &config, rx, &shutdown, clock, ConsoleDisplay::new(cli.display_hz))
    } else if gui_enabled {
        #[cfg(feature = "gui")]
        {
            run_coordinator(&cli, &config, rx, &shutdown, clock, MinifbSurface::new())
        }
        #[cfg(not(feature = "gui"))]
        {
            run_coordinator(&cli, &config, rx, &shutdown, clock, HeadlessSurface::new())
        }
    } else {
        info!("Running headless. Press Ctrl+C to stop.");
        run_coordinator(&cli, &config, rx, &shutdown, clock, HeadlessSurface::new())
    };

    shutdown.store(true, Ordering::Relaxed);
    if producer.join().is_err() {
        warn!("Producer thread panicked");
    }
    if !ok {
        process::exit(1);
    }
}

fn run_coordinator<S: Surface>(
    cli: &Cli,
    config: &OverlayConfig,
    rx: Receiver<Delivery>,
    shutdown: &Arc<AtomicBool>,
    clock: SessionClock,
    surface: S,
) -> bool {
    let coordinator = Coordinator::new(rx, shutdown.clone(), config, surface, clock)
        .with_record_dir(cli.record_dir.clone())
        .with_recording(cli.record);
    match coordinator.run() {
        Ok(stats) => {
            info!(
                "Session ended after {} iterations ({} recorded frames)",
                stats.iterations, stats.recorded
            );
            true
        }
        Err(e) => {
            error!("Operator surface failed: {}", e);
            false
        }
    }
}
