//! Logging setup for hosts that do not install their own subscriber

use crate::constants::ENV_LOG;

/// Install a compact `tracing` subscriber.
///
/// The filter comes from `FILTER_ENGINE_LOG`, then `RUST_LOG`, then
/// `default_filter`. Does nothing if a global subscriber is already set.
pub fn init_logging(default_filter: &str) {
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_filter.to_string());

    let installed = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .compact()
        .with_env_filter(filter)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging("info,filter_engine=debug");
        init_logging("warn");
    }
}
