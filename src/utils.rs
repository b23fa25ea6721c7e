use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::constants::{VERBOSITY_SILENT, VERBOSITY_VERBOSE};

pub fn log_level(verbosity: &str) -> Level {
    match verbosity {
        VERBOSITY_SILENT => Level::ERROR,
        VERBOSITY_VERBOSE => Level::DEBUG,
        _ => Level::INFO,
    }
}

/// Logs go to stderr so `skudex lookup` can keep stdout for JSON results.
pub fn setup_logging(verbosity: &str) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("skudex={}", log_level(verbosity)).parse()?);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Stage timings are kept in milliseconds; short stages print as `ms`.
pub fn format_millis(millis: u64) -> String {
    let seconds = millis as f64 / 1000.0;
    if millis < 1000 {
        format!("{}ms", millis)
    } else if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}

/// Records per second, treating a zero-length run as one millisecond.
pub fn records_per_second(records: usize, millis: u64) -> f64 {
    records as f64 * 1000.0 / millis.max(1) as f64
}
