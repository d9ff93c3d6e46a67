//! CLI entry point for the PurpleAir AQI gateway.
//!
//! Provides subcommands for fetching raw sensor data, deriving single- and
//! multi-pollutant AQI readings, and re-polling the combined AQI on a fixed
//! interval.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use purpleair_aqi::aggregate::{AqiAggregator, Pollutant};
use purpleair_aqi::config::Config;
use purpleair_aqi::fetch::{BasicClient, auth::ApiKey};
use purpleair_aqi::fields::sanitize_fields;
use purpleair_aqi::output::{AqiSample, append_record, print_json};
use purpleair_aqi::sensor::{SensorDataService, SensorReader};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "purpleair_aqi")]
#[command(about = "Fetches PurpleAir sensor readings and derives AQI values", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the raw sensor payload, optionally restricted to fields
    SensorData {
        /// Comma-separated field names (whitelisted; empty means all)
        #[arg(short, long)]
        fields: Option<String>,
    },
    /// AQI derived from PM1.0 (approximated with the PM2.5 scale)
    Pm1 {
        /// Calibration variant: "atm" (outdoor) or "cf_1" (indoor)
        #[arg(long, default_value = "atm")]
        variant: String,

        /// Channel suffix: "" (average), "_a", or "_b"
        #[arg(long, default_value = "")]
        channel: String,
    },
    /// AQI derived from PM2.5
    Pm25 {
        /// Calibration variant: "atm" (outdoor) or "cf_1" (indoor)
        #[arg(long, default_value = "atm")]
        variant: String,

        /// Channel suffix: "" (average), "_a", or "_b"
        #[arg(long, default_value = "")]
        channel: String,
    },
    /// AQI derived from PM10
    Pm10 {
        /// Calibration variant: "atm" (outdoor) or "cf_1" (indoor)
        #[arg(long, default_value = "atm")]
        variant: String,

        /// Channel suffix: "" (average), "_a", or "_b"
        #[arg(long, default_value = "")]
        channel: String,
    },
    /// Combined AQI across PM1.0, PM2.5, and PM10
    Combined {
        /// Calibration variant: "atm" (outdoor) or "cf_1" (indoor)
        #[arg(long, default_value = "atm")]
        variant: String,

        /// Channel suffix: "" (average), "_a", or "_b"
        #[arg(long, default_value = "")]
        channel: String,
    },
    /// Re-poll the combined AQI at a fixed interval
    Stream {
        /// Calibration variant: "atm" (outdoor) or "cf_1" (indoor)
        #[arg(long, default_value = "atm")]
        variant: String,

        /// Channel suffix: "" (average), "_a", or "_b"
        #[arg(long, default_value = "")]
        channel: String,

        /// Seconds between polls (defaults to STREAM_INTERVAL)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Number of samples to collect (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_samples: usize,

        /// Optional CSV file to append samples to
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/purpleair_aqi.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("purpleair_aqi.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let client = ApiKey::x_api_key(
        BasicClient::with_timeout(config.timeout)?,
        config.api_key.clone(),
    );
    let service = SensorDataService::new(client, config.sensor_url(), config.cache_ttl);
    let aggregator = AqiAggregator::new(service);

    match cli.command {
        Commands::SensorData { fields } => {
            let fields = sanitize_fields(fields.as_deref());
            let snapshot = aggregator.reader().read(fields.as_deref()).await;
            print_json(&snapshot.to_json())?;
        }
        Commands::Pm1 { variant, channel } => {
            run_single(&aggregator, Pollutant::Pm1, &variant, &channel).await?;
        }
        Commands::Pm25 { variant, channel } => {
            run_single(&aggregator, Pollutant::Pm25, &variant, &channel).await?;
        }
        Commands::Pm10 { variant, channel } => {
            run_single(&aggregator, Pollutant::Pm10, &variant, &channel).await?;
        }
        Commands::Combined { variant, channel } => {
            match aggregator.combined(&variant, &channel).await {
                Ok(reading) => print_json(&reading)?,
                Err(e) => {
                    warn!(error = %e, "Combined AQI unavailable");
                    print_json(&e.to_json())?;
                }
            }
        }
        Commands::Stream {
            variant,
            channel,
            interval,
            num_samples,
            output,
        } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or(config.stream_interval);
            stream_combined(
                &aggregator,
                &variant,
                &channel,
                interval,
                num_samples,
                output.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}

/// Derives AQI for one pollutant and prints the reading or the structured
/// error body.
async fn run_single<R: SensorReader>(
    aggregator: &AqiAggregator<R>,
    pollutant: Pollutant,
    variant: &str,
    channel: &str,
) -> Result<()> {
    match aggregator.single_pollutant(pollutant, variant, channel).await {
        Ok(reading) => print_json(&reading)?,
        Err(e) => {
            warn!(error = %e, "Single-pollutant AQI unavailable");
            print_json(&e.to_json())?;
        }
    }
    Ok(())
}

/// Re-polls the combined AQI on a fixed cadence, printing one JSON line per
/// sample and optionally appending each to a CSV file. Successive polls
/// share the sensor cache, so the upstream sees at most one call per TTL
/// window regardless of the polling rate.
#[tracing::instrument(skip(aggregator, output))]
async fn stream_combined<R: SensorReader>(
    aggregator: &AqiAggregator<R>,
    variant: &str,
    channel: &str,
    interval: Duration,
    num_samples: usize,
    output: Option<&str>,
) -> Result<()> {
    if num_samples == 0 {
        info!(
            interval_secs = interval.as_secs(),
            "Sampling infinitely. Press Ctrl+C to stop."
        );
    } else {
        info!(
            num_samples,
            interval_secs = interval.as_secs(),
            "Starting sample collection"
        );
    }

    let mut sample_count = 0;
    loop {
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }
        sample_count += 1;

        match aggregator.combined(variant, channel).await {
            Ok(reading) => {
                println!("{}", serde_json::to_string(&reading)?);
                if let Some(path) = output {
                    let sample = AqiSample::from_reading(&reading);
                    if let Err(e) = append_record(path, &sample) {
                        error!(error = %e, "Failed to write sample");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Sample unavailable");
                println!("{}", e.to_json());
            }
        }

        // If not the last sample, wait before next iteration
        if num_samples == 0 || sample_count < num_samples {
            tokio::time::sleep(interval).await;
        }
    }

    info!(sample_count, "Finished sample collection");
    Ok(())
}
