use sei_probe::{
    client::CometRpcConnector, config::ProberConfig, metrics::ProbeMetrics, models::Endpoint, prober::ConnectivityProber,
    report::Report,
};

use clap::Parser;
use log::{error, info};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "sei-probe")]
#[command(version, about = "Sei Network Probe - Checks RPC connectivity and query latency")]
struct Args {
    /// Path to configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// RPC endpoint to try, in priority order (repeatable, overrides config file)
    #[arg(long = "endpoint", short = 'e')]
    endpoints: Vec<String>,

    /// Print the result as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Write Prometheus metrics to this file (overrides config file)
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Generate default configuration file
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
    let args = Args::parse();

    // Handle config generation
    if args.generate_config {
        let path = PathBuf::from("sei-probe.toml");
        return match ProberConfig::create_default_config_file(&path) {
            Ok(_) => {
                info!("Generated default configuration at {:?}", path);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to generate config: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Load configuration
    let mut config = match &args.config {
        Some(path) => match ProberConfig::from_file(path) {
            Ok(cfg) => {
                info!("Loaded configuration from {:?}", path);
                cfg
            }
            Err(e) => {
                error!("Failed to load config: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ProberConfig::default(),
    };

    // Override with CLI args if provided
    if !args.endpoints.is_empty() {
        config.network.endpoints = args.endpoints.into_iter().map(Endpoint::from).collect();
    }
    if let Some(path) = args.metrics_out {
        config.metrics.enabled = true;
        config.metrics.output_path = Some(path);
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    let metrics = if config.metrics.enabled {
        match ProbeMetrics::new() {
            Ok(m) => Some(Arc::new(m)),
            Err(e) => {
                error!("Failed to initialize metrics: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let connector = match CometRpcConnector::new(&config.probing) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create RPC client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let prober = match metrics.clone() {
        Some(m) => ConnectivityProber::with_metrics(connector, m),
        None => ConnectivityProber::new(connector),
    };

    info!("Connecting to {} ({} endpoints)", config.network.name, config.network.endpoints.len());
    let result = prober.probe(&config.network.endpoints).await;

    let report = Report::new(&config.network.name, config.probing.targets());
    let mut stdout = io::stdout().lock();
    let written = if args.json { report.write_json(&mut stdout, &result) } else { report.write_text(&mut stdout, &result) };
    if let Err(e) = written.and_then(|_| stdout.flush()) {
        error!("Failed to write report: {}", e);
    }

    if let (Some(m), Some(path)) = (metrics, config.metrics.output_path.as_deref()) {
        if let Err(e) = m.write_to_file(path) {
            error!("Failed to write metrics: {}", e);
        }
    }

    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
