//! Observability setup for the assistant.
//!
//! Installs a `tracing-subscriber` formatter that writes to stderr so the
//! REPL's stdout stays clean. `RUST_LOG` always wins over the configured
//! default level.

#![warn(missing_docs, clippy::pedantic)]

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Subscriber options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub default_directive: String,
    /// Include module targets in each line.
    pub with_target: bool,
    /// Emit ANSI colours.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_owned(),
            with_target: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Default config with `debug` level when `debug` is set, `warn` otherwise.
    ///
    /// The REPL keeps routine `info` lines out of the way unless asked.
    #[must_use]
    pub fn for_cli(debug: bool) -> Self {
        Self {
            default_directive: if debug { "debug" } else { "warn" }.to_owned(),
            with_target: debug,
            ..Self::default()
        }
    }
}

/// Installs the global subscriber.
///
/// Returns `false` if a subscriber was already installed; calling this more
/// than once is harmless.
pub fn init_tracing(config: &TelemetryConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_directive));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        debug!(directive = %config.default_directive, "tracing initialised");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        let config = TelemetryConfig::default();
        let first = init_tracing(&config);
        assert!(!init_tracing(&config) || !first);
    }

    #[test]
    fn cli_config_follows_debug_flag() {
        assert_eq!(TelemetryConfig::for_cli(true).default_directive, "debug");
        assert_eq!(TelemetryConfig::for_cli(false).default_directive, "warn");
        assert!(TelemetryConfig::for_cli(true).with_target);
    }
}
