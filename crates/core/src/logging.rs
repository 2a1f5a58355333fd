use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            with_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            ..Self::default()
        }
    }
}

/// Install a console subscriber for host applications.
///
/// Returns `false` when a global subscriber was already installed, which
/// makes repeated calls (e.g. from several tests) harmless.
pub fn init_logging(config: LoggingConfig) -> bool {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer().with_target(config.with_target))
        .try_init()
        .is_ok()
}
