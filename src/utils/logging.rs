use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the application.
///
/// `default_level` picks the maximum level; a `RUST_LOG` directive in the
/// environment takes precedence over it.
pub fn init(default_level: &str) {
    let lvl = match default_level.trim().to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(lvl).into())
        .from_env_lossy();

    // try_init so tests and repeated calls don't panic on an installed subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
