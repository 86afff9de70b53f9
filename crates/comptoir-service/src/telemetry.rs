//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Installs the global fmt subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages (repository statements)
/// - `RUST_LOG=comptoir=trace` - Trace for comptoir crates only
/// - Default: `config.log_filter` (`info`)
///
/// Returns false when a subscriber was already installed, so tests and
/// binaries can both call it.
pub fn init_tracing(config: &AppConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let config = AppConfig::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
