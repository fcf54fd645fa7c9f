use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки реестра алиасов.
///
/// Неизвестный тип алиаса ошибкой не является: тип создаётся при первом
/// обращении.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasError {
    /// Ключ без разделителя `^` между типом и локальным шаблоном.
    MalformedKey { key: String },
    /// Шаблон не удалось скомпилировать.
    InvalidPattern { pattern: String, reason: String },
}

impl std::fmt::Display for AliasError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::MalformedKey { key } => write!(f, "Illegal alias key value: {key}"),
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "Invalid alias pattern '{pattern}': {reason}")
            }
        }
    }
}

impl std::error::Error for AliasError {}

impl ErrorExt for AliasError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedKey { .. } => StatusCode::MalformedAliasKey,
            Self::InvalidPattern { .. } => StatusCode::InvalidPattern,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "alias".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::InvalidPattern { pattern, .. } = self {
            tags.push(("pattern", pattern.clone()));
        }
        tags
    }
}
