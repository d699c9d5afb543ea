//! Global `tracing` subscriber setup.

use gao_shared::errors::{GaoError, GaoResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Subscriber configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Filter used when `RUST_LOG` is unset, e.g. `"info"` or `"gao=debug"`.
    pub default_directive: String,
    /// Write to daily-rolling files in this directory instead of stderr.
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
            log_dir: None,
            file_prefix: "gao.log".to_string(),
            ansi: false,
        }
    }
}

/// Install the global fmt subscriber.
///
/// Returns the appender guard when logging to files; keep it alive for as long
/// as logs should be flushed. If a global subscriber is already installed this
/// is a no-op and returns `None`.
pub fn init_logging(options: &LoggingOptions) -> GaoResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.default_directive))
        .map_err(|e| {
            GaoError::Config(format!(
                "invalid log directive {:?}: {}",
                options.default_directive, e
            ))
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                GaoError::Config(format!(
                    "failed to create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(dir, &options.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let installed = builder
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .is_ok();
            Ok(installed.then_some(guard))
        }
        None => {
            if builder
                .with_ansi(options.ansi)
                .with_writer(std::io::stderr)
                .try_init()
                .is_err()
            {
                tracing::debug!("Global subscriber already installed");
            }
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directive_is_config_error() {
        // Only meaningful when RUST_LOG does not override the directive.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let options = LoggingOptions {
            default_directive: "gao=notalevel".to_string(),
            ..Default::default()
        };
        assert!(matches!(init_logging(&options), Err(GaoError::Config(_))));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: LoggingOptions = serde_json::from_str(r#"{"ansi": true}"#).unwrap();
        assert!(options.ansi);
        assert_eq!(options.default_directive, "info");
        assert!(options.log_dir.is_none());
    }
}
