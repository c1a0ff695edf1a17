//! Logger configuration.

use std::fs;
use std::fs::OpenOptions;
use std::path::Path;
use tracing_subscriber::{EnvFilter, Layer, Registry};
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;

use crate::config::LogConfig;

/// Sets the logger global features for the application.
/// * `level` - Log level (DEBUG, INFO, WARN, ERROR) or `EnvFilter` directives
///   such as `info,tower_http=debug`. Invalid values fall back to INFO.
/// * `to_stdout` - Whether to log to stdout.
/// * `to_file` - Whether to log to `dir/file`.
/// # Usage
/// At the start of the application, call this function once, after the
/// configuration has been read.
/// ```ignore
/// use quote_relay::{config::RelayConfig, logger::set_logger};
/// let config = RelayConfig::from_env()?;
/// set_logger(&config.log)?;
/// ```
/// # Errors
/// 1) Returns an error if the log directory cannot be created or the log file cannot be opened.
/// 2) Returns an error if the global subscriber cannot be set.
pub fn set_logger(cfg: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {

    // Validate the directives once; each layer gets its own filter.
    let fallback = EnvFilter::try_new(&cfg.level).is_err();
    let lf = || {
        if fallback { EnvFilter::new("info") } else { EnvFilter::new(&cfg.level) }
    };

    // If stdout logging is enabled, set up the stdout logging layer.
    let lys = if cfg.to_stdout {
        let lys = tracing_subscriber::fmt::layer().compact().with_ansi(true).with_filter(lf());
        Some(lys)
    } else { None };

    // Set up the log file path.
    let p = Path::new(&cfg.dir).join(&cfg.file);

    // If file logging is enabled, create the directory and the file layer.
    let lyf = if cfg.to_file {
        fs::create_dir_all(&cfg.dir)?;
        let f = OpenOptions::new().append(true).create(true).open(&p)?;
        let lyf = tracing_subscriber::fmt::layer().compact().with_ansi(false).with_writer(f).with_filter(lf());
        Some(lyf)
    } else { None };

    const BANNER: &str = r#"
|------------------------------------|
|   quote-relay                      |
|   form submissions -> company mail |
|------------------------------------|
    "#;
    let s = Registry::default().with(lys).with(lyf);
    tracing::subscriber::set_global_default(s)?;
    info!("{}", BANNER);
    if fallback {
        warn!("Invalid LOG_LEVEL {:?}, using INFO", cfg.level);
    } else {
        info!("Logger initialized, log level set to: {}", cfg.level);
    }
    if cfg.to_stdout { debug!("Logging to stdout.") }
    if cfg.to_file { debug!("Logging to file: {}", p.display()) }
    Ok(())
}
