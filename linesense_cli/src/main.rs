use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use linesense_core::{EstimatorCfg, LineSensor};
use tracing_subscriber::EnvFilter;

/// Stream calibrated line positions from a reflectance sensor bar.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config; defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Calibration passes to run before streaming (ten reads each)
    #[arg(long, default_value_t = 4)]
    calibration_passes: u32,

    /// Number of estimates to stream; 0 streams until ctrl-c
    #[arg(long, default_value_t = 0)]
    steps: u64,

    /// Milliseconds between estimates
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Track a light line on a dark background
    #[arg(long)]
    white_line: bool,

    /// Emit JSON lines instead of plain text
    #[arg(long)]
    json: bool,
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn init_tracing(logging: &linesense_config::Logging) {
    let level = logging.level.as_deref().unwrap_or("info");
    if let Some(path) = &logging.file {
        match std::fs::File::options().create(true).append(true).open(path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter(level))
                    .json()
                    .with_writer(Arc::new(file))
                    .init();
                return;
            }
            Err(e) => eprintln!("cannot open log file {path}: {e}; logging to stderr"),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<linesense_config::Config> {
    let Some(path) = path else {
        return Ok(linesense_config::Config::default());
    };
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = linesense_config::load_toml(&content).wrap_err("parsing config")?;
    cfg.validate()?;
    Ok(cfg)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let cfg = load_config(args.config.as_ref())?;
    init_tracing(&cfg.logging);

    let sensor_count = cfg.array.sensor_count;
    let white_line = args.white_line || cfg.array.white_line;

    // Choose hardware or simulation
    #[cfg(feature = "hardware")]
    let source: Box<dyn linesense_traits::SensorSource> = {
        let spi = cfg
            .spi
            .as_ref()
            .ok_or_else(|| eyre::eyre!("hardware builds need an [spi] config section"))?;
        Box::new(linesense_hardware::HardwareLineSource::new(
            spi.bus,
            spi.chip_select_pin,
            spi.clock_hz,
            sensor_count,
        )?)
    };
    #[cfg(not(feature = "hardware"))]
    let source: Box<dyn linesense_traits::SensorSource> =
        Box::new(linesense_hardware::SimulatedLineSource::new(sensor_count));

    let mut sensor = LineSensor::builder()
        .with_source(source)
        .with_sensor_count(sensor_count)
        .with_estimator(EstimatorCfg::from(cfg.thresholds))
        .build()?;

    tracing::info!(passes = args.calibration_passes, "calibrating");
    for _ in 0..args.calibration_passes {
        sensor.calibrate()?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .wrap_err("installing ctrl-c handler")?;

    let mut emitted: u64 = 0;
    while running.load(Ordering::SeqCst) && (args.steps == 0 || emitted < args.steps) {
        let reading = sensor.read_line(white_line)?;
        if args.json {
            println!(
                "{}",
                serde_json::json!({
                    "position": reading.position,
                    "on_line": reading.on_line,
                    "values": reading.values,
                })
            );
        } else {
            println!(
                "position={:>5} on_line={} values={:?}",
                reading.position, reading.on_line, reading.values
            );
        }
        emitted += 1;
        let more = args.steps == 0 || emitted < args.steps;
        if more {
            std::thread::sleep(std::time::Duration::from_millis(args.interval_ms));
        }
    }
    Ok(())
}
