use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LoggingConfig, ENV_LOG_LEVEL};

pub const LOG_FILE_NAME: &str = "rpcterm.log";

/// Keeps the non-blocking appender alive for the life of the process
static APPENDER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the tracing system.
///
/// Logs go to `<log_dir>/rpcterm.log` (the system temp dir when no
/// `log_dir` is configured). The filter comes from `RPC_LOG_LEVEL`, then
/// `RUST_LOG`, then the configured level, so both plain levels ("debug")
/// and directives ("rpc_runtime=trace,rpc_transport=debug") work.
///
/// Returns the log file path so it can be displayed to the user. Calling
/// this twice leaves the first subscriber in place.
pub fn init_tracing(config: &LoggingConfig) -> PathBuf {
    let log_dir = config
        .log_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    let log_file = log_dir.join(LOG_FILE_NAME);

    let (non_blocking, guard) = match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(&log_dir)
    {
        Ok(file_appender) => tracing_appender::non_blocking(file_appender),
        Err(e) => {
            eprintln!("Cannot log to {}: {}; logging to stderr", log_file.display(), e);
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    let env_filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_ansi(false) // Disable ANSI color codes in files
        .with_writer(non_blocking)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .is_ok();

    if installed {
        let _ = APPENDER_GUARD.set(guard);
    }

    log_file
}
