use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::NodeIdentity;

/// Адресная информация узла-отправителя.
///
/// Неизменяема после построения; используется для адресации ответов и для
/// исключения узлов по списку получателей.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherInfo {
    pub app_name: String,
    pub producer_id: String,
    pub consumer_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: String,
    pub endpoint_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl PublisherInfo {
    /// Собирает информацию об узле из конфигурации и идентификатора
    /// подключения транспорта.
    ///
    /// Один транспорт и публикует, и принимает, поэтому producer и consumer
    /// совпадают с `endpoint_id`. Без заданного `session_id` генерируется
    /// новый.
    pub fn from_identity(
        identity: &NodeIdentity,
        endpoint_id: &str,
    ) -> Self {
        Self {
            app_name: identity.app_name.replace(',', " "),
            producer_id: endpoint_id.to_string(),
            consumer_id: endpoint_id.to_string(),
            session_id: identity
                .session_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: identity.user_id.clone(),
            user_name: identity.user_name.clone(),
            endpoint_id: endpoint_id.to_string(),
            node_id: identity.node_id.clone(),
        }
    }
}

impl fmt::Display for PublisherInfo {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}@{}", self.app_name, self.endpoint_id)?;
        if let Some(user) = &self.user_id {
            write!(f, " (user {user})")?;
        }
        Ok(())
    }
}
