use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use carebus_error::AliasError;

use super::pattern::{self, WildcardPattern};

/// Одна запись шаблона: локальный шаблон и шаблон алиаса.
#[derive(Debug, Clone)]
struct WildcardEntry {
    local: WildcardPattern,
    alias: String,
}

#[derive(Debug, Default)]
struct AliasTable {
    /// Точные локальные имена → алиас. Проверяются первыми.
    exact: HashMap<String, String>,
    /// Шаблоны с wildcard'ами в порядке регистрации.
    wildcard: Vec<WildcardEntry>,
}

/// Именованная группа алиасов (например, `AUTHORITY`).
///
/// Чтения (`resolve`) преобладают над записями, поэтому таблица лежит под
/// `RwLock`; компиляция шаблона выполняется до взятия блокировки записи.
#[derive(Debug)]
pub struct AliasType {
    name: String,
    table: RwLock<AliasTable>,
}

impl AliasType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_uppercase(),
            table: RwLock::new(AliasTable::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Регистрирует, заменяет или удаляет алиас локального шаблона.
    ///
    /// `None` или пустая строка удаляют запись. Замена существующего шаблона
    /// сохраняет его позицию в порядке регистрации.
    pub fn register(
        &self,
        local: &str,
        alias: Option<&str>,
    ) -> Result<(), AliasError> {
        let alias = alias.filter(|a| !a.is_empty());

        let Some(alias) = alias else {
            self.remove(local);
            return Ok(());
        };

        if !pattern::has_wildcards(local) {
            let mut table = self.table.write();
            let previous = table.exact.insert(local.to_string(), alias.to_string());
            drop(table);
            self.log_replacement(local, previous.as_deref(), alias);
            return Ok(());
        }

        let compiled = WildcardPattern::compile(local)?;
        let mut table = self.table.write();
        let previous = match table
            .wildcard
            .iter_mut()
            .find(|e| e.local.as_str() == local)
        {
            Some(entry) => Some(std::mem::replace(&mut entry.alias, alias.to_string())),
            None => {
                table.wildcard.push(WildcardEntry {
                    local: compiled,
                    alias: alias.to_string(),
                });
                None
            }
        };
        drop(table);
        self.log_replacement(local, previous.as_deref(), alias);
        Ok(())
    }

    /// Удаляет запись; `true`, если она существовала.
    pub fn remove(
        &self,
        local: &str,
    ) -> bool {
        let mut table = self.table.write();
        if table.exact.remove(local).is_some() {
            return true;
        }
        let before = table.wildcard.len();
        table.wildcard.retain(|e| e.local.as_str() != local);
        before != table.wildcard.len()
    }

    /// Возвращает алиас для ключа или `None`.
    ///
    /// Точные записи имеют приоритет, затем шаблоны в порядке регистрации:
    /// первый совпавший выигрывает.
    pub fn resolve(
        &self,
        key: &str,
    ) -> Option<String> {
        let table = self.table.read();
        if let Some(alias) = table.exact.get(key) {
            return Some(alias.clone());
        }
        table.wildcard.iter().find_map(|entry| {
            entry
                .local
                .captures(key)
                .map(|caps| pattern::substitute(&entry.alias, &caps))
        })
    }

    /// Снимок всех записей: сначала точные (в произвольном порядке), затем
    /// шаблоны в порядке регистрации.
    pub fn entries(&self) -> Vec<(String, String)> {
        let table = self.table.read();
        table
            .exact
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(
                table
                    .wildcard
                    .iter()
                    .map(|e| (e.local.as_str().to_string(), e.alias.clone())),
            )
            .collect()
    }

    pub fn len(&self) -> usize {
        let table = self.table.read();
        table.exact.len() + table.wildcard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut table = self.table.write();
        table.exact.clear();
        table.wildcard.clear();
    }

    fn log_replacement(
        &self,
        local: &str,
        previous: Option<&str>,
        alias: &str,
    ) {
        match previous {
            Some(old) if old != alias => info!(
                alias_type = %self.name,
                local,
                old_alias = old,
                new_alias = alias,
                "Replaced alias"
            ),
            Some(_) => {}
            None => debug!(alias_type = %self.name, local, alias, "Registered alias"),
        }
    }
}
