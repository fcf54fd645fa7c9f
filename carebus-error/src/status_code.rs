use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных (имена событий, алиасы)
/// - 4xxx: Ограничения (лимиты подписчиков, отставание)
/// - 5xxx: Сериализация
/// - 6xxx: Транспорт / IO
/// - 8xxx: Протокольные ошибки
///
/// # Реализация:
/// - `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`
///   (полезно для передачи кода по сети).
/// - опционально: `strum` для `AsRefStr`/`EnumIter` (feature = "strum").
/// - опционально: `serde_repr` для сериализации в виде числового значения
///   (feature = "serde_repr").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,
    NotImplemented = 1005,
    InvalidConfig = 1006,

    // === 2xxx: Ошибки данных ===
    NotFound = 2000,
    AlreadyExists = 2001,
    InvalidEventName = 2002,
    InvalidPattern = 2003,
    MalformedAliasKey = 2004,
    InvalidData = 2005,

    // === 4xxx: Ограничения ===
    RateLimited = 4000,
    SubscriberLimitExceeded = 4001,

    // === 5xxx: Сериализация ===
    SerializationFailed = 5000,
    DeserializationFailed = 5001,
    LockError = 5002,

    // === 6xxx: Транспорт/IO ===
    Io = 6000,
    ConnectionClosed = 6001,
    Timeout = 6002,
    ConnectionFailed = 6003,
    NotConnected = 6004,
    PublishFailed = 6005,
    SubscribeFailed = 6006,
    UnexpectedEof = 6007,

    // === 8xxx: Протокол ===
    ProtocolError = 8000,
    InvalidUtf8 = 8001,
    EncodingError = 8002,
    DecodingError = 8003,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Возвращает `true`, если операцию с этим кодом имеет смысл повторить.
    ///
    /// Сам диспетчер повторов не делает: решение о повторе принимает
    /// вызывающая сторона.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::RateLimited
                | Self::ConnectionFailed
                | Self::NotConnected
                | Self::PublishFailed
                | Self::SubscribeFailed
        )
    }

    /// Является ли код ошибкой вызывающей стороны (проблема в аргументах или
    /// данных).
    ///
    /// Клиентские ошибки лежат в диапазоне `2xxx..4xxx`. `InvalidArgs` (1004)
    /// семантически тоже клиентская и учитывается явно.
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (2000..=4999).contains(&c) {
            return true;
        }
        matches!(self, Self::InvalidArgs)
    }

    /// Является ли код внутренней или инфраструктурной ошибкой.
    ///
    /// Диапазоны `1xxx` и `5xxx..7xxx`.
    pub fn is_server_error(&self) -> bool {
        let c = self.code();
        matches!(c, 1000..=1999 | 5000..=7999)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        // Если включён feature "strum", используем human-readable имя (AsRefStr).
        // Иначе Debug-имя.
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
