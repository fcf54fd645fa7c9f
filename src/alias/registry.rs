use std::{fs, path::Path, sync::Arc};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use carebus_error::{AliasError, CarebusResult, ResultExt};

use super::AliasType;
use crate::config::AliasSettings;

/// Разделитель типа и локального шаблона в префиксном ключе `TYPE^local`.
pub const PREFIX_DELIM: char = '^';

/// Итог загрузки файлов алиасов.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AliasLoadStats {
    pub files: usize,
    pub entries: usize,
    pub skipped: usize,
}

impl AliasLoadStats {
    fn merge(
        &mut self,
        other: AliasLoadStats,
    ) {
        self.files += other.files;
        self.entries += other.entries;
        self.skipped += other.skipped;
    }
}

/// Реестр типов алиасов.
///
/// Имена типов нечувствительны к регистру. Неизвестный тип создаётся при
/// первом обращении, поэтому `resolve` по нему просто возвращает `None`.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    types: DashMap<String, Arc<AliasType>>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Реестр, заполненный из файлов `alias.files`.
    pub fn from_settings(settings: &AliasSettings) -> Self {
        let registry = Self::new();
        registry.load_files(settings.files.as_slice());
        registry
    }

    /// Возвращает тип алиаса, создавая его при необходимости.
    pub fn get_type(
        &self,
        name: &str,
    ) -> Arc<AliasType> {
        let key = name.to_uppercase();
        if let Some(existing) = self.types.get(&key) {
            return existing.clone();
        }
        self.types
            .entry(key)
            .or_insert_with(|| Arc::new(AliasType::new(name)))
            .clone()
    }

    pub fn register(
        &self,
        alias_type: &str,
        local: &str,
        alias: Option<&str>,
    ) -> Result<(), AliasError> {
        self.get_type(alias_type).register(local, alias)
    }

    /// Регистрация по ключу вида `TYPE^local`.
    pub fn register_prefixed(
        &self,
        key: &str,
        alias: Option<&str>,
    ) -> Result<(), AliasError> {
        let (alias_type, local) = split_prefixed(key)?;
        self.register(alias_type, local, alias)
    }

    pub fn resolve(
        &self,
        alias_type: &str,
        key: &str,
    ) -> Option<String> {
        self.get_type(alias_type).resolve(key)
    }

    /// Имена всех известных типов (в верхнем регистре), отсортированные.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        self.types.clear();
    }

    /// Загружает записи `TYPE^local=alias` из текста в формате properties.
    ///
    /// Поддерживаются комментарии `#`/`!` и разделители `=`/`:`. Ошибочные
    /// строки пропускаются с предупреждением.
    pub fn load_properties(
        &self,
        text: &str,
    ) -> AliasLoadStats {
        let mut stats = AliasLoadStats::default();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let Some(sep) = line.find(['=', ':']) else {
                warn!(line = lineno + 1, entry = line, "Alias entry has no separator, skipped");
                stats.skipped += 1;
                continue;
            };

            let key = line[..sep].trim();
            let value = line[sep + 1..].trim();
            match self.register_prefixed(key, Some(value)) {
                Ok(()) => stats.entries += 1,
                Err(err) => {
                    warn!(line = lineno + 1, error = %err, "Skipped alias entry");
                    stats.skipped += 1;
                }
            }
        }

        stats
    }

    /// Загружает один файл алиасов.
    pub fn load_file(
        &self,
        path: &Path,
    ) -> CarebusResult<AliasLoadStats> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read alias file {}", path.display()))?;
        let mut stats = self.load_properties(&text);
        stats.files = 1;
        debug!(
            file = %path.display(),
            entries = stats.entries,
            skipped = stats.skipped,
            "Loaded alias file"
        );
        Ok(stats)
    }

    /// Загружает файлы алиасов; нечитаемые файлы логируются и пропускаются.
    pub fn load_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> AliasLoadStats {
        let mut total = AliasLoadStats::default();

        for path in paths {
            match self.load_file(path.as_ref()) {
                Ok(stats) => total.merge(stats),
                Err(err) => warn!(status = %err.status_code(), error = %err, "Alias file not loaded"),
            }
        }

        if total.files > 0 {
            info!(
                files = total.files,
                entries = total.entries,
                "Alias files loaded"
            );
        }

        total
    }
}

fn split_prefixed(key: &str) -> Result<(&str, &str), AliasError> {
    let malformed = || AliasError::MalformedKey {
        key: key.to_string(),
    };
    let (alias_type, local) = key.split_once(PREFIX_DELIM).ok_or_else(malformed)?;
    if alias_type.is_empty() || local.is_empty() {
        return Err(malformed());
    }
    Ok((alias_type, local))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use carebus_error::StatusCode;

    use super::*;

    /// Тест проверяет, что имена типов нечувствительны к регистру.
    #[test]
    fn test_type_names_case_insensitive() {
        let reg = AliasRegistry::new();
        reg.register("authority", "x", Some("y")).unwrap();
        assert_eq!(reg.resolve("AUTHORITY", "x").as_deref(), Some("y"));
        assert_eq!(reg.resolve("Authority", "x").as_deref(), Some("y"));
        assert_eq!(reg.type_names(), vec!["AUTHORITY".to_string()]);
    }

    /// Тест проверяет, что неизвестный тип создаётся автоматически.
    #[test]
    fn test_unknown_type_autovivified() {
        let reg = AliasRegistry::new();
        assert_eq!(reg.resolve("NOPE", "anything"), None);
        assert!(reg.type_names().contains(&"NOPE".to_string()));
        assert!(Arc::ptr_eq(&reg.get_type("nope"), &reg.get_type("NOPE")));
    }

    #[test]
    fn test_register_prefixed() {
        let reg = AliasRegistry::new();
        reg.register_prefixed("AUTHORITY^authx*", Some("auth.aliasx*"))
            .unwrap();
        assert_eq!(
            reg.resolve("AUTHORITY", "authx.test").as_deref(),
            Some("auth.aliasx.test")
        );
    }

    /// Тест проверяет отклонение ключей без `^` или с пустой частью.
    #[test]
    fn test_register_prefixed_malformed() {
        let reg = AliasRegistry::new();
        for key in ["NO_DELIMITER", "^local", "TYPE^"] {
            let err = reg.register_prefixed(key, Some("x")).unwrap_err();
            assert_eq!(
                err,
                AliasError::MalformedKey {
                    key: key.to_string()
                }
            );
        }
    }

    /// Тест проверяет разбор properties-текста: комментарии, оба
    /// разделителя и пропуск ошибочных строк.
    #[test]
    fn test_load_properties() {
        let reg = AliasRegistry::new();
        let stats = reg.load_properties(
            "# comment\n\
             ! other comment\n\
             \n\
             AUTHORITY^auth.local = auth.alias\n\
             PROPERTY^p.*: q.*\n\
             BROKEN_LINE\n\
             MISSINGDELIM=value\n",
        );
        assert_eq!(
            stats,
            AliasLoadStats {
                files: 0,
                entries: 2,
                skipped: 2
            }
        );
        assert_eq!(
            reg.resolve("AUTHORITY", "auth.local").as_deref(),
            Some("auth.alias")
        );
        assert_eq!(reg.resolve("PROPERTY", "p.1").as_deref(), Some("q.1"));
    }

    /// Тест проверяет загрузку файлов и пропуск отсутствующих.
    #[test]
    fn test_load_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.properties");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "AUTHORITY^a.*=b.*").unwrap();
        drop(f);

        let reg = AliasRegistry::new();
        let stats = reg.load_files(&[path, dir.path().join("missing.properties")]);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(reg.resolve("AUTHORITY", "a.z").as_deref(), Some("b.z"));
    }

    /// Тест проверяет, что ошибка чтения несёт код статуса и контекст с
    /// именем файла.
    #[test]
    fn test_load_file_missing_reports_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.properties");

        let err = AliasRegistry::new().load_file(&path).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NotFound);
        assert_eq!(err.contexts().len(), 1);
        assert!(err.contexts()[0].message.contains("absent.properties"));
        assert!(err.to_string().starts_with("Failed to read alias file"));
    }

    #[test]
    fn test_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.properties");
        fs::write(&path, "PROPERTY^p.?=q.?\n").unwrap();

        let settings = AliasSettings {
            files: vec![path.to_string_lossy().into_owned()],
        };
        let reg = AliasRegistry::from_settings(&settings);
        assert_eq!(reg.resolve("PROPERTY", "p.1").as_deref(), Some("q.1"));
    }

    #[test]
    fn test_clear() {
        let reg = AliasRegistry::new();
        reg.register("T", "a", Some("b")).unwrap();
        reg.clear();
        assert!(reg.type_names().is_empty());
        assert_eq!(reg.resolve("T", "a"), None);
    }
}
