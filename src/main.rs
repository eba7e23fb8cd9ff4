//! tcpstats - Live TCP congestion telemetry for a connection

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tcpstats::config::Config;
use tcpstats::output::{output_interval, output_json_line, output_plain, save_json};
use tcpstats::platform::Platform;
use tcpstats::stats::TcpStats;
use tcpstats::tcp::{self, DEFAULT_BUFFER_SIZE};
use tcpstats::tcp_info::TcpStatsProbe;

const DEFAULT_PORT: u16 = 5201;

/// Initialize logging with optional file output
fn init_logging(log_file: Option<&str>, log_level: Option<&str>) -> anyhow::Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = log_level.unwrap_or("info");
    let env_filter =
        EnvFilter::from_default_env().add_directive(format!("tcpstats={}", level).parse()?);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    if let Some(file_path) = log_file {
        // Expand tilde to home directory
        let expanded_path = if let Some(rest) = file_path.strip_prefix("~/") {
            dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(file_path))
        } else {
            PathBuf::from(file_path)
        };

        if let Some(parent) = expanded_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_appender = tracing_appender::rolling::daily(
            expanded_path
                .parent()
                .unwrap_or_else(|| std::path::Path::new(".")),
            expanded_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("tcpstats.log")),
        );
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

        // Keep guard alive for the duration of the program
        std::mem::forget(_guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "tcpstats")]
#[command(author, version, about = "Live TCP congestion telemetry for a connection")]
struct Cli {
    /// Target host
    #[arg(value_name = "HOST")]
    host: String,

    /// Target port
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TCPSTATS_PORT")]
    port: u16,

    /// Seconds between readings
    #[arg(short = 'i', long)]
    interval: Option<f64>,

    /// Number of readings (0 = until interrupted)
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// JSON output (one object per reading)
    #[arg(long)]
    json: bool,

    /// Keep the connection busy with bulk data while sampling
    #[arg(long)]
    send: bool,

    /// Save the final snapshot as JSON
    #[arg(short = 'o', long)]
    save: Option<PathBuf>,

    /// Diagnostics facility (native, tcp-info, apple, bsd, unsupported)
    #[arg(long, value_parser = parse_platform)]
    platform: Option<Platform>,

    /// Log file path (e.g., "~/.config/tcpstats/tcpstats.log")
    #[arg(long, env = "TCPSTATS_LOG_FILE")]
    log_file: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "TCPSTATS_LOG_LEVEL")]
    log_level: Option<String>,
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    s.parse::<Platform>()
}

/// Validate a reading interval in seconds.
///
/// Rejects values that are not finite and positive, and values too small to
/// survive conversion to a non-zero `Duration`.
fn parse_interval(secs: f64) -> Result<Duration> {
    let interval = match Duration::try_from_secs_f64(secs) {
        Ok(interval) => interval,
        Err(e) => anyhow::bail!("Invalid interval {}: {}", secs, e),
    };
    if interval.is_zero() {
        anyhow::bail!("Interval must be positive, got {}", secs);
    }
    Ok(interval)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config file (falls back to defaults if not found)
    let file_config = Config::load().unwrap_or_default();

    let log_file = cli
        .log_file
        .as_ref()
        .or(file_config.logging.log_file.as_ref());
    let log_level = cli
        .log_level
        .as_ref()
        .or(file_config.logging.log_level.as_ref());
    init_logging(log_file.map(|s| s.as_str()), log_level.map(|s| s.as_str()))?;

    let platform = cli.platform.unwrap_or_else(|| file_config.platform());
    let interval_secs = cli
        .interval
        .or(file_config.probe.interval_secs)
        .unwrap_or(1.0);
    let interval = parse_interval(interval_secs)?;
    let count = cli.count.or(file_config.probe.count).unwrap_or(0);
    let json = cli.json || file_config.output.json.unwrap_or(false);

    let probe = TcpStatsProbe::new(platform);
    info!("Using {} diagnostics", platform);
    if !platform.is_supported() {
        warn!("No TCP diagnostics on this platform, readings will show N/A");
    }

    let (stream, connect_time_ms) = tcp::connect(&cli.host, cli.port).await?;
    let handle = tcp::socket_handle(&stream);

    // Both halves stay alive for the whole run so the socket remains open
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (_read_half, write_half) = stream.into_split();
    let (sender, _idle_write_half) = if cli.send {
        let sender = tokio::spawn(tcp::send_data_half(
            write_half,
            DEFAULT_BUFFER_SIZE,
            cancel_rx,
        ));
        (Some(sender), None)
    } else {
        (None, Some(write_half))
    };

    let start = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    let mut taken = 0u64;
    let mut last = TcpStats::unavailable();
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        let stats = tcp::sample(&probe, handle, Some(connect_time_ms));
        let elapsed = start.elapsed();
        if json {
            println!("{}", output_json_line(elapsed.as_millis() as u64, &stats));
        } else {
            println!("{}", output_interval(elapsed.as_secs_f64(), &stats));
        }

        probe.copy(&mut last, &stats);

        taken += 1;
        if count > 0 && taken >= count {
            break;
        }
    }

    let _ = cancel_tx.send(true);
    if let Some(sender) = sender {
        match sender.await {
            Ok(Ok(bytes)) => info!("Sent {} bytes", bytes),
            Ok(Err(e)) => warn!("Sender stopped: {}", e),
            Err(e) => warn!("Sender task failed: {}", e),
        }
    }

    if taken > 0 {
        if !json {
            println!();
            print!("{}", output_plain(&last));
        }
        if let Some(path) = &cli.save {
            save_json(&last, path)?;
            info!("Saved final snapshot to {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval(1.0).unwrap(), Duration::from_secs(1));
        assert_eq!(parse_interval(0.25).unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_interval_rejects_non_positive() {
        assert!(parse_interval(0.0).is_err());
        assert!(parse_interval(-1.0).is_err());
        assert!(parse_interval(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_interval_rejects_unrepresentable() {
        assert!(parse_interval(f64::INFINITY).is_err());
        assert!(parse_interval("inf".parse().unwrap()).is_err());
        // Rounds to a zero Duration
        assert!(parse_interval(1e-12).is_err());
    }
}
