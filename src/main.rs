//! cue-sync presenter
//!
//! Drives a main and a cue player from the console and mirrors them to a
//! pop-out display window.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use cue_sync::config::Config;
use cue_sync::display::{LocalDisplayHost, SIMULATED_VIDEO_SECS};
use cue_sync::engine::{create_engine_channels, log_statuses, ControlEngine, EngineCommand};
use cue_sync::input::create_input_backend;
use cue_sync::logging::{get_log_dir, init_logging};
use cue_sync::relay::{Relay, WindowRegistry};
use cue_sync::surface::{PlayerState, SimulatedSurface};

/// How long the simulated display player takes to load
const DISPLAY_LOAD_DELAY: Duration = Duration::from_millis(750);

fn main() -> Result<()> {
    let _log_guard = init_logging()?;

    info!("cue-sync presenter starting...");

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = Config::load()?;
    info!("Configuration loaded from {:?}", config.config_path());

    let settings = config.engine_settings();
    let runtime = Arc::new(tokio::runtime::Runtime::new()?);

    // Create engine channels
    let (cmd_tx, cmd_rx, status_tx, status_rx) = create_engine_channels();

    let registry = Arc::new(WindowRegistry::new());
    let relay = Relay::new(registry);
    let host = LocalDisplayHost::new(config.display_config(), DISPLAY_LOAD_DELAY);

    let video_id = config.player.video_id.clone();
    let start_secs = config.player.start_offset_secs.max(0.0);

    // Spawn the control engine on the tokio runtime
    let engine_runtime = runtime.clone();
    let engine_handle = std::thread::spawn(move || {
        engine_runtime.block_on(async move {
            tokio::spawn(log_statuses(status_rx));

            let mut engine = ControlEngine::new(settings, relay, Box::new(host), cmd_rx, status_tx);

            let main_player = Arc::new(SimulatedSurface::new(
                video_id.as_str(),
                SIMULATED_VIDEO_SECS,
            ));
            let cue_player = Arc::new(SimulatedSurface::new(
                video_id.as_str(),
                SIMULATED_VIDEO_SECS,
            ));
            main_player.force(start_secs, PlayerState::Playing);

            if let Err(e) = engine.attach_main(main_player) {
                error!("Main player unavailable: {}", e);
            }
            if let Err(e) = engine.attach_cue(cue_player) {
                warn!("Cue player unavailable, running without it: {}", e);
            }

            if let Err(e) = engine.run().await {
                error!("Control engine error: {}", e);
            }
        });
    });

    // Set up Ctrl+C handler that sends shutdown command
    let ctrl_c_tx = cmd_tx.clone();
    let ctrl_c_runtime = runtime.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let tx = ctrl_c_tx.clone();
        ctrl_c_runtime.spawn(async move {
            let _ = tx.send(EngineCommand::Shutdown).await;
        });
    })?;

    // Console input blocks on stdin; its thread is never joined
    let input_tx = cmd_tx.clone();
    std::thread::spawn(move || {
        let mut input = create_input_backend(settings);
        if let Err(e) = input.run(input_tx.clone()) {
            error!("Input error: {}", e);
        }
        // Input ended without `q`
        let _ = input_tx.blocking_send(EngineCommand::Shutdown);
    });
    drop(cmd_tx);

    // Wait for engine thread to finish
    let _ = engine_handle.join();

    info!("Shutdown complete");
    Ok(())
}

fn print_help() {
    println!("cue-sync presenter - main, cue and display players in lock-step");
    println!();
    println!("USAGE:");
    println!("    cue-sync [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help    Print this help message");
    println!();
    println!("KEYS (one per line on stdin):");
    println!("    space         Toggle the overlay (fade out and pause, or resume)");
    println!("    left, right   Seek back or forward");
    println!("    k             Play or pause");
    println!("    p             Open or close the display window");
    println!("    load ID [S]   Load video ID, optionally at S seconds");
    println!("    q             Quit");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG           Set log level (e.g., debug, info, warn)");
    println!("    CUE_SYNC_LOG_PATH  Override the log directory");
    if let Ok(dir) = get_log_dir() {
        println!();
        println!("Logs are written to {:?}", dir);
    }
}
