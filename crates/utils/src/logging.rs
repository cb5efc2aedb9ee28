//! provides logging helpers

use std::env;
use std::path::Path;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Environment variable holding an optional log file (or directory) path.
pub const LOG_PATH_ENV_VAR: &str = "TF_PACK_LOG_PATH";

const DEFAULT_LOG_PREFIX: &str = "tf-pack.log";

/// Splits a log path into the rotation directory and the file name prefix.
///
/// A path pointing at an existing directory keeps the default prefix.
pub fn rotation_target(log_path: &Path) -> (PathBuf, String) {
    if log_path.is_dir() {
        return (log_path.to_path_buf(), DEFAULT_LOG_PREFIX.to_string());
    }
    let parent = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = log_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_LOG_PREFIX);
    (parent.to_path_buf(), prefix.to_string())
}

/// initiate the global tracing subscriber
///
/// Events always go to stderr. When [`LOG_PATH_ENV_VAR`] is set they are also
/// written to a daily rotated file; keep the returned guard alive until exit
/// so buffered lines are flushed.
pub fn init() -> Option<WorkerGuard> {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let stderr_layer = layer().with_writer(std::io::stderr).with_target(true);

    let mut appender_error = None;
    let (file_layer, guard) = match env::var(LOG_PATH_ENV_VAR).ok().map(PathBuf::from) {
        Some(log_path) => {
            let (rotation_dir, prefix) = rotation_target(&log_path);
            match RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .max_log_files(3)
                .build(&rotation_dir)
            {
                Ok(appender) => {
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    let file_layer = layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true);
                    (Some(file_layer), Some(guard))
                }
                Err(err) => {
                    appender_error = Some(format!(
                        "failed to create rolling file appender at {}: {err}",
                        rotation_dir.display()
                    ));
                    (None, None)
                }
            }
        }
        None => (None, None),
    };

    registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(message) = appender_error {
        tracing::warn!("{message}; logging to stderr only");
    }
    guard
}
