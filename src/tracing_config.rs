use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with file and console logging
///
/// Two layers share one registry:
/// 1. Console (stdout): `RUST_LOG` if set, INFO and above otherwise
/// 2. File (`$LOG_DIR/catalog_api.log.<date>`, `LOG_DIR` defaults to
///    `./logs`): DEBUG and above, with sqlx statement logs held at INFO
///
/// Call once at startup. A second call panics in `init()`.
///
/// # Returns
/// The WorkerGuard of the file writer. Bind it in `main()`
/// (`let _guard = init_tracing();`) and keep it for the program lifetime.
/// Dropping it flushes whatever the background thread still buffers.
pub fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // One file per day: catalog_api.log.2024-01-01, catalog_api.log.2024-01-02, ...
    // Older files stay on disk. The directory is created on first write.
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    let file_appender = rolling::daily(log_dir, "catalog_api.log");

    // Writes go through a background thread; `guard` owns that thread
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // File layer: plain text, DEBUG+
    // sqlx logs every statement at DEBUG, so it is capped at INFO here
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug,sqlx=info"));

    // Console layer: RUST_LOG overrides the INFO default
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(false)
        .with_filter(console_filter);

    // Every event reaches both layers; each layer's filter decides what it writes
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Tracing initialized (console=INFO+, file=DEBUG+)");

    guard
}
