//! Structured logging setup.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global `tracing` subscriber once per process.
///
/// `RUST_LOG` wins over `TERMDET_LOG`; an unparsable `TERMDET_LOG` falls back
/// to `info` with a warning on stderr.
pub fn init(config: &Config) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => match config.log_level.parse::<EnvFilter>() {
                Ok(filter) => filter,
                Err(e) => {
                    eprintln!(
                        "WARN: TERMDET_LOG='{}' is not a valid tracing filter ({}); \
                         falling back to 'info'",
                        config.log_level, e
                    );
                    EnvFilter::new("info")
                }
            },
        };

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true);

        let installed = if config.log_json {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        };

        // 既に subscriber がある（テストハーネス等）場合はそれを使う
        if installed.is_err() {
            tracing::debug!("global tracing subscriber already set; keeping it");
        }
    });
}
