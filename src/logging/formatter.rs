use std::{
    fs,
    io::{self, Stdout},
};

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling::daily};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use crate::logging::config::{FileConfig, LogFormat, LoggingConfig};

/// Консольный layer в формате из конфигурации.
///
/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата.
pub fn console_layer<S>(config: &LoggingConfig) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let console = &config.console;
    let writer: fn() -> Stdout = io::stdout;

    match console.format {
        LogFormat::Json => fmt::layer()
            .event_format(fmt::format().json().with_current_span(true))
            .with_writer(writer)
            .with_ansi(false)
            .with_target(console.with_target)
            .with_thread_ids(console.with_thread_ids)
            .with_line_number(console.with_line_numbers)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .event_format(fmt::format().pretty())
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer)
            .with_ansi(console.with_ansi)
            .with_target(console.with_target)
            .with_thread_ids(console.with_thread_ids)
            .with_line_number(console.with_line_numbers)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .event_format(fmt::format().compact())
            .with_writer(writer)
            .with_ansi(console.with_ansi)
            .with_target(console.with_target)
            .with_thread_ids(console.with_thread_ids)
            .with_line_number(console.with_line_numbers)
            .boxed(),
    }
}

/// Файловый layer с ежедневной ротацией; guard должен жить, пока нужен
/// вывод в файл.
pub fn file_layer<S>(
    file: &FileConfig
) -> io::Result<(Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fs::create_dir_all(&file.dir)?;
    let (writer, guard) = non_blocking(daily(&file.dir, &file.prefix));
    let layer = fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .boxed();
    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    /// Тест проверяет, что layer строится и работает во всех форматах.
    #[test]
    fn test_console_layer_all_formats() {
        for format in [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json] {
            let mut cfg = LoggingConfig::default();
            cfg.console.format = format;
            cfg.console.with_ansi = false;
            let subscriber = Registry::default().with(console_layer::<Registry>(&cfg));
            tracing::subscriber::with_default(subscriber, || {
                info!(?format, "console layer smoke test");
            });
        }
    }

    /// Тест проверяет, что файловый layer создаёт каталог логов.
    #[test]
    fn test_file_layer_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let file = FileConfig {
            enabled: true,
            dir: tmp.path().join("nested"),
            prefix: "test.log".to_string(),
        };
        let (layer, guard) = file_layer::<Registry>(&file).unwrap();
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            info!("file layer smoke test");
        });
        drop(guard);
        assert!(file.dir.is_dir());
    }
}
