use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

pub const LOG_FILE_PREFIX: &str = "intake.log";

/// Installs the global subscriber: stderr for humans, a daily file under
/// `log_dir` for later. `RUST_LOG` takes precedence over `default_level`.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(default_level: &str, log_dir: &Path) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|err| Error::Config(format!("invalid log level `{default_level}`: {err}")))?;

    std::fs::create_dir_all(log_dir)?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|err| Error::Config(format!("logger already installed: {err}")))?;

    Ok(guard)
}
