//! This module provides observability and diagnostics for the pipeline engine.
//!
//! The engine logs through the `log` facade only. Nothing is printed unless the
//! host application installs a logger, or calls `enable_verbose_logging` to
//! install the bundled `env_logger` backend.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Once;

/// Logs a structured key-value metric record at debug level.
///
/// # Example
/// ```
/// use volpipe::log_metric;
/// let stage = "zstd";
/// log_metric!("event"="stage_encode", "stage"=&stage, "bytes_out"=&128);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if $crate::__log::log_enabled!($crate::__log::Level::Debug) {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            $crate::__log::debug!("VOLPIPE_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend at debug level, once per process.
///
/// When `log_file` is given, records are appended to that file instead of
/// stderr. If the file cannot be opened, logging falls back to stderr.
/// Later calls are no-ops, as are calls made after the host installed its own
/// logger.
pub fn enable_verbose_logging(log_file: Option<String>) {
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(log::LevelFilter::Debug)
            .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));

        if let Some(path) = log_file {
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => {
                    eprintln!("volpipe: cannot open log file '{}': {}", path, e);
                }
            }
        }

        if builder.try_init().is_ok() {
            log::info!("Verbose logging enabled");
        }
    });
}
