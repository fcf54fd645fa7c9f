use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use carebus_error::{bail, ensure, CarebusResult, GenericError, ResultExt, StatusCode};

use crate::logging::LoggingConfig;

/// Префикс переменных окружения: `CAREBUS__BUS__PING_WINDOW_MS=500`.
pub const ENV_PREFIX: &str = "CAREBUS";
/// Необязательный файл конфигурации в рабочем каталоге (`carebus.toml`).
pub const DEFAULT_CONFIG_FILE: &str = "carebus";

/// Идентичность узла, из которой строится `PublisherInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeIdentity {
    pub app_name: String,
    pub user_id: Option<String>,
    pub user_name: String,
    /// Без значения идентификатор сессии генерируется при старте.
    pub session_id: Option<String>,
    pub node_id: Option<String>,
}

/// Параметры распределённой шины.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Окно сбора ответов на ping по умолчанию.
    pub ping_window_ms: u64,
    /// Сколько помнить идентификаторы доставленных публикаций.
    pub dedup_window_ms: u64,
    /// Ёмкость канала брокера в памяти.
    pub inbound_buffer: usize,
    /// Публиковать `CONNECT`/`DISCONNECT` при старте и остановке.
    pub announce_connection: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasSettings {
    /// Properties-файлы с записями `TYPE^local=alias`.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node: NodeIdentity,
    pub bus: BusSettings,
    pub alias: AliasSettings,
    pub logging: LoggingConfig,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            app_name: "carebus".to_string(),
            user_id: None,
            user_name: String::new(),
            session_id: None,
            node_id: None,
        }
    }
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            ping_window_ms: 2_000,
            dedup_window_ms: 60_000,
            inbound_buffer: 1_024,
            announce_connection: true,
        }
    }
}

impl BusSettings {
    pub fn ping_window(&self) -> Duration {
        Duration::from_millis(self.ping_window_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, затем `carebus.toml`
    /// (если есть), затем переменные окружения `CAREBUS__*`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE), false)
    }

    pub fn load_from(
        path: &Path,
        required: bool,
    ) -> Result<Self, ConfigError> {
        let cfg = Self::builder()?
            .add_source(File::from(path).required(required))
            .add_source(env_source())
            .build()?;
        cfg.try_deserialize()
    }

    /// Разбирает TOML-текст поверх значений по умолчанию (без окружения).
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg = Self::builder()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn validate(&self) -> CarebusResult<()> {
        ensure!(
            self.bus.ping_window_ms > 0,
            StatusCode::InvalidConfig,
            "bus.ping_window_ms must be > 0"
        );
        ensure!(
            self.bus.inbound_buffer > 0,
            StatusCode::InvalidConfig,
            "bus.inbound_buffer must be > 0"
        );
        ensure!(
            !self.node.app_name.trim().is_empty(),
            StatusCode::InvalidConfig,
            "node.app_name must not be empty"
        );
        if let Err(reason) = self.logging.validate() {
            bail!(StatusCode::InvalidConfig, "logging: {}", reason);
        }
        Ok(())
    }

    /// Загрузка из `path` с проверкой; ошибки несут контекст этапа.
    pub fn load_checked(
        path: &Path,
        required: bool,
    ) -> CarebusResult<Self> {
        let settings = Self::load_from(path, required)
            .map_err(|err| GenericError::new(StatusCode::InvalidConfig, err.to_string()))
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let bus = BusSettings::default();
        Config::builder()
            .set_default("node.app_name", NodeIdentity::default().app_name)?
            .set_default("bus.ping_window_ms", bus.ping_window_ms)?
            .set_default("bus.dedup_window_ms", bus.dedup_window_ms)?
            .set_default("bus.inbound_buffer", bus.inbound_buffer as u64)?
            .set_default("bus.announce_connection", bus.announce_connection)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("alias.files")
        .with_list_parse_key("logging.directives")
        .try_parsing(true)
}
