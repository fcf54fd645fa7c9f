use std::fmt;

use serde::{Deserialize, Serialize};

use super::PublisherInfo;

/// Роль, по которой адресуется получатель.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientType {
    Consumer,
    Producer,
    User,
    Application,
    Session,
}

impl RecipientType {
    /// Идентификатор узла для этой роли.
    pub fn id_of(
        self,
        info: &PublisherInfo,
    ) -> Option<&str> {
        match self {
            Self::Consumer => Some(info.consumer_id.as_str()),
            Self::Producer => Some(info.producer_id.as_str()),
            Self::User => info.user_id.as_deref(),
            Self::Application => Some(info.app_name.as_str()),
            Self::Session => Some(info.session_id.as_str()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Consumer => "CONSUMER",
            Self::Producer => "PRODUCER",
            Self::User => "USER",
            Self::Application => "APPLICATION",
            Self::Session => "SESSION",
        }
    }
}

impl fmt::Display for RecipientType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "type")]
    pub recipient_type: RecipientType,
    pub id: String,
}

impl Recipient {
    pub fn new(
        recipient_type: RecipientType,
        id: impl Into<String>,
    ) -> Self {
        Self {
            recipient_type,
            id: id.into(),
        }
    }

    pub fn consumer(id: impl Into<String>) -> Self {
        Self::new(RecipientType::Consumer, id)
    }

    pub fn producer(id: impl Into<String>) -> Self {
        Self::new(RecipientType::Producer, id)
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(RecipientType::User, id)
    }

    pub fn application(id: impl Into<String>) -> Self {
        Self::new(RecipientType::Application, id)
    }

    pub fn session(id: impl Into<String>) -> Self {
        Self::new(RecipientType::Session, id)
    }
}

/// `true`, если сообщение не адресовано узлу `local`.
///
/// Пустой список означает рассылку всем. Иначе для каждой роли, которая
/// встречается в списке, идентификатор узла в этой роли должен быть среди
/// перечисленных.
pub fn is_excluded(
    recipients: &[Recipient],
    local: &PublisherInfo,
) -> bool {
    let mut checked: Vec<RecipientType> = Vec::new();
    for r in recipients {
        if checked.contains(&r.recipient_type) {
            continue;
        }
        checked.push(r.recipient_type);

        let own = r.recipient_type.id_of(local);
        let listed = recipients
            .iter()
            .filter(|o| o.recipient_type == r.recipient_type)
            .any(|o| Some(o.id.as_str()) == own);
        if !listed {
            return true;
        }
    }
    false
}
