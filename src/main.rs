use key_capture::calibration::{uniform_boundaries, CalibrationMap};
use key_capture::config::DetectorConfig;
use key_capture::console_display;
use key_capture::coordinator;
use key_capture::data_logger;
use key_capture::frame_reader::{FrameFileWriter, FrameReplay};
use key_capture::motor::{MotorChannel, MotorCommand};
use key_capture::osc_sender;
use key_capture::simulator;
use key_capture::types::*;

use clap::Parser;
use crossbeam_channel::{bounded, Sender};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process;
use std::thread;

#[derive(Parser)]
#[command(name = "key-capture")]
#[command(about = "Optical piano key capture: camera-row key detection to note events")]
struct Cli {
    /// Calibration: 89 space-separated pixel x-coordinates (key edges, one
    /// extra for the width of the 88th key)
    #[arg(long)]
    calibration: Option<String>,

    /// Read the calibration numbers from a text file instead
    #[arg(long, conflicts_with = "calibration")]
    calibration_file: Option<PathBuf>,

    /// Sensing row (frame y coordinate)
    #[arg(long, default_value_t = 240)]
    row: i32,

    /// Detector config (JSON); missing keys use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay a recorded frame file instead of running the simulator
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Replay frames as fast as possible instead of at recorded pace
    #[arg(long, requires = "replay")]
    unpaced: bool,

    /// Threshold the sensing row of replayed frames (raw camera dumps)
    #[arg(long, requires = "replay")]
    raw: bool,

    /// Simulator demo sequence: "basic" (default), "scale", or "drift"
    #[arg(long, default_value = "basic")]
    demo: String,

    /// Record simulator frames to a replay file
    #[arg(long, conflicts_with = "replay")]
    record: Option<PathBuf>,

    /// Enable OSC note output
    #[arg(long)]
    osc: bool,

    /// OSC target address for notes
    #[arg(long, default_value = "127.0.0.1:9000")]
    osc_target: String,

    /// Send one command to the sensor motor at startup
    #[arg(long, value_enum)]
    motor: Option<MotorCommand>,

    /// Motor controller address
    #[arg(long, default_value = "127.0.0.1:3000")]
    motor_target: String,

    /// Enable console display (terminal overlay)
    #[arg(long)]
    console: bool,

    /// Console display refresh rate (Hz)
    #[arg(long, default_value_t = 20)]
    display_hz: u32,

    /// Log note events to a session directory
    #[arg(long)]
    log_notes: bool,

    /// Output directory for logged sessions
    #[arg(long, default_value = "./sessions")]
    output_dir: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DetectorConfig::load(path).unwrap_or_else(|e| {
            error!("Config {:?}: {}", path, e);
            process::exit(1);
        }),
        None => DetectorConfig::default(),
    };

    let calibration_text = match (&cli.calibration, &cli.calibration_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            error!("Calibration file {:?}: {}", path, e);
            process::exit(1);
        }),
        (None, None) => {
            // Fits the default 640px frame, clear of the servo strip.
            let b = uniform_boundaries(56, 6);
            warn!("No calibration given, using evenly spaced keys from x={} to x={}", b[0], b[KEY_COUNT]);
            b.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
        }
    };

    // Fail before anything starts: no keys, no overlay, an explicit reason.
    let calibration = match CalibrationMap::parse(&calibration_text) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            error!("Please enter 89 numbers (one extra for the width of the 88th key).");
            process::exit(2);
        }
    };

    info!("═══════════════════════════════════════════════");
    info!("  KEY CAPTURE v{}", env!("CARGO_PKG_VERSION"));
    info!("  Sensing row: y={}  keys x={}..{}", cli.row, calibration.left(), calibration.right());
    match &cli.replay {
        Some(path) => info!("  Input: replay {:?}", path),
        None => info!("  Input: simulator ({})", cli.demo),
    }
    if cli.osc { info!("  Notes: OSC → {}", cli.osc_target); }
    if cli.console { info!("  UI: Console overlay"); }
    info!("═══════════════════════════════════════════════");

    if let Some(command) = cli.motor {
        match MotorChannel::connect(cli.motor_target.clone()).and_then(|m| m.send(command)) {
            Ok(()) => info!("Motor: sent {:?}", command),
            Err(e) => error!("Motor: failed to send {:?}: {}", command, e),
        }
    }

    // Channel: inputs → coordinator
    let (input_tx, input_rx) = coordinator::input_channel();

    // Channels: coordinator → consumers
    let mut frame_txs: Vec<Sender<KeyFrame>> = Vec::new();
    let mut note_txs: Vec<Sender<NoteEvent>> = Vec::new();

    let mut handles = Vec::new();

    // ─── Console display ────────────────────────────────────────────
    if cli.console {
        let (tx, rx) = bounded::<KeyFrame>(256);
        frame_txs.push(tx);
        let hz = cli.display_hz;
        let interval = config.frame_interval_ms;
        handles.push(spawn("display", move || {
            console_display::ConsoleDisplay::new(rx, hz, interval).run();
        }));
    }

    // ─── OSC note output ────────────────────────────────────────────
    if cli.osc {
        let (tx, rx) = bounded::<NoteEvent>(1024);
        note_txs.push(tx);
        let target = cli.osc_target.clone();
        handles.push(spawn("osc", move || {
            osc_sender::OscSender::new(rx, target).run();
        }));
    }

    // ─── Note logger ────────────────────────────────────────────────
    if cli.log_notes {
        let (tx, rx) = bounded::<NoteEvent>(4096);
        match data_logger::DataLogger::new(rx, &cli.output_dir, config.clone(), calibration_text.clone()) {
            Ok(logger) => {
                note_txs.push(tx);
                handles.push(spawn("logger", move || logger.run()));
            }
            Err(e) => error!("Note logging disabled, cannot create session in {:?}: {}", cli.output_dir, e),
        }
    }

    // ─── Coordinator ────────────────────────────────────────────────
    let coord_config = config.clone();
    handles.push(spawn("coordinator", move || {
        coordinator::Coordinator::new(input_rx, frame_txs, note_txs, coord_config).run();
    }));

    // The operator's calibration goes in ahead of the first frame.
    let _ = input_tx.send(InputEvent::Calibrate {
        boundaries: calibration_text,
        row: cli.row,
    });

    // ─── Input source ───────────────────────────────────────────────
    let clock = SessionClock::new();
    match cli.replay.clone() {
        Some(path) => {
            let mut replay = FrameReplay::new(path, input_tx.clone());
            if cli.unpaced {
                replay = replay.unpaced();
            }
            if cli.raw {
                replay = replay.with_threshold(cli.row, config.segment_height, config.clamp);
            }
            handles.push(spawn("replay", move || {
                replay.run();
            }));
        }
        None => {
            info!("Starting simulator...");
            let boundaries: Vec<i32> = calibration
                .spans()
                .iter()
                .map(|s| s.x)
                .chain(std::iter::once(calibration.right()))
                .collect();
            let mut sim = simulator::Simulator::new(clock, input_tx.clone(), config.clone(), boundaries, cli.row);
            if let Some(path) = &cli.record {
                match FrameFileWriter::create(path, config.frame_width, config.frame_height) {
                    Ok(writer) => {
                        info!("Recording frames to {:?}", path);
                        sim = sim.with_recorder(writer);
                    }
                    Err(e) => error!("Cannot record to {:?}: {}", path, e),
                }
            }
            let demo = cli.demo.clone();
            handles.push(spawn("simulator", move || sim.run(&demo)));
        }
    }

    // Only the input thread holds a sender now; the pipeline drains and
    // exits when it finishes.
    drop(input_tx);

    for h in handles {
        let _ = h.join();
    }
    info!("Done.");
}

fn spawn<F>(name: &str, f: F) -> thread::JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .unwrap_or_else(|e| {
            error!("Failed to spawn {} thread: {}", name, e);
            process::exit(1);
        })
}
