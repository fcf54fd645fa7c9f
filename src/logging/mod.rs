pub mod config;
mod filters;
mod formatter;
pub mod handle;

pub use config::{ConsoleConfig, FileConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Инициализация глобального subscriber'а по конфигурации.
///
/// Повторный вызов в одном процессе возвращает ошибку.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingHandle, Box<dyn std::error::Error>> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console.enabled {
        layers.push(formatter::console_layer(&config));
    }

    let file_guard = if config.file.enabled {
        let (file_layer, guard) = formatter::file_layer(&config.file)?;
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        console_format = ?config.console.format,
        file_enabled = config.file.enabled,
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
