use clap::Parser;
use env_logger::Env;
use log::{LevelFilter, info};
use std::fs;
use std::path::PathBuf;

use tekscope::{
    Channel, ScopeClient, ScopeConfig, TriggerMode, TriggerSource, Waveform,
    load_config_or_default,
};

/// Single-shot waveform capture from a Tektronix DPO2000/MSO2000 scope
#[derive(Parser, Debug)]
#[command(name = "scope-capture")]
#[command(about = "Capture a waveform over the SCPI socket interface", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override instrument host
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Override instrument port
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Override capture channel (1-4)
    #[arg(long, value_name = "N")]
    channel: Option<u8>,

    /// Write the captured waveform as JSON to this path instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = load_config_or_default(args.config.as_deref());
    if let Some(host) = args.host {
        config.connection.host = host;
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }
    if let Some(channel) = args.channel {
        config.capture.channel = channel;
    }

    let log_level = args
        .log_level
        .unwrap_or_else(|| config.logging.log_level.clone());
    initialize_logging(&log_level);

    let channel = config.capture.channel()?;
    let mut scope = connect(&config)?;
    configure(&mut scope, channel)?;
    let waveform = capture(&mut scope, &config, channel)?;
    emit(&waveform, args.output.as_deref())?;

    Ok(())
}

fn connect(config: &ScopeConfig) -> Result<ScopeClient, Box<dyn std::error::Error>> {
    info!(
        "Connecting to {}:{}",
        config.connection.host, config.connection.port
    );
    let scope = ScopeClient::builder()
        .address(&config.connection.host)
        .port(config.connection.port)
        .config(config.connection.timeouts())
        .transfer_encoding(config.capture.transfer_encoding()?)
        .build()?;
    info!("Connected to {} {}", scope.make(), scope.model());
    Ok(scope)
}

/// Baseline front-panel setup: 4 us/div sweep, 1 V/div on the capture
/// channel, normal edge trigger at half a division.
fn configure(scope: &mut ScopeClient, channel: Channel) -> Result<(), tekscope::ScopeError> {
    scope.set_horizontal_scale(4e-6)?;
    scope.set_horizontal_delay(0.0)?;

    scope.set_channel_display(channel, true)?;
    scope.set_probe_gain(channel, 1.0)?;
    scope.set_channel_scale(channel, 1.0)?;
    scope.set_channel_position(channel, 0.0)?;

    scope.use_edge_trigger()?;
    scope.set_trigger_source(TriggerSource::Channel(channel))?;
    scope.set_trigger_mode(TriggerMode::Normal)?;
    scope.set_trigger_level(0.5)?;
    Ok(())
}

fn capture(
    scope: &mut ScopeClient,
    config: &ScopeConfig,
    channel: Channel,
) -> Result<Waveform, tekscope::ScopeError> {
    let waveform = if config.capture.average_count > 1 {
        info!(
            "Capturing {} averaged acquisitions from {}",
            config.capture.average_count,
            channel.mnemonic()
        );
        scope.fetch_waveform_averaged(channel, config.capture.average_count)?
    } else {
        info!("Capturing one acquisition from {}", channel.mnemonic());
        scope.fetch_waveform(channel)?
    };
    info!(
        "Captured {} points ({})",
        waveform.len(),
        waveform.waveform_id
    );
    Ok(waveform)
}

fn emit(waveform: &Waveform, output: Option<&std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(waveform)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            info!("Waveform written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn initialize_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            eprintln!("Warning: Invalid log level '{log_level}', using 'info'");
            LevelFilter::Info
        }
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();
}
