use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Формат вывода логов.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Настройки консольного вывода.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Файловый вывод с ежедневной ротацией.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub prefix: String,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень для crate `carebus` (`trace`..`error`).
    pub level: String,
    /// Дополнительные директивы `EnvFilter`, например `"tokio=warn"`.
    pub directives: Vec<String>,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("logs"),
            prefix: "carebus.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl LoggingConfig {
    /// Директива для `EnvFilter`: уровень crate плюс дополнительные.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = vec![format!("carebus={}", self.level)];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }

    pub fn validate(&self) -> Result<(), String> {
        if !LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(format!("unknown log level '{}'", self.level));
        }
        if self.file.enabled && self.file.prefix.is_empty() {
            return Err("log file prefix must not be empty".to_string());
        }
        Ok(())
    }
}
