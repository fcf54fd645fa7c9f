//! Обнаружение узлов кластера.
//!
//! Запрашивающий узел публикует `PING.REQUEST` с именем события для ответов
//! и фильтрами. Каждый узел, удовлетворяющий всем фильтрам, отвечает своим
//! `PublisherInfo` на это событие, адресуя ответ запрашивающему. Ответы
//! собираются до конца окна ожидания.

use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{timeout_at, Instant},
};
use uuid::Uuid;

use crate::{
    event::EventManager,
    messaging::{PublisherInfo, Recipient},
};

pub const PING_REQUEST_EVENT: &str = "PING.REQUEST";
pub const PING_RESPONSE_PREFIX: &str = "PING.RESPONSE";

/// Уникальное имя события для ответов на один запрос.
pub fn response_event_name() -> String {
    format!("{PING_RESPONSE_PREFIX}.{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PingFilterType {
    /// Имя приложения отвечающего узла (без учёта регистра).
    AppName,
    /// Отвечающий узел должен иметь локальную подписку ровно на это событие.
    SentinelEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PingFilter {
    #[serde(rename = "type")]
    pub filter_type: PingFilterType,
    pub value: String,
}

impl PingFilter {
    pub fn app_name(value: impl Into<String>) -> Self {
        Self {
            filter_type: PingFilterType::AppName,
            value: value.into(),
        }
    }

    pub fn sentinel_event(value: impl Into<String>) -> Self {
        Self {
            filter_type: PingFilterType::SentinelEvent,
            value: value.into(),
        }
    }

    pub fn matches(
        &self,
        local: &PublisherInfo,
        events: &EventManager,
    ) -> bool {
        match self.filter_type {
            PingFilterType::AppName => local.app_name.eq_ignore_ascii_case(&self.value),
            PingFilterType::SentinelEvent => events.has_subscribers(&self.value, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingRequest {
    pub response_event: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<PingFilter>,
    pub requestor: Recipient,
}

impl PingRequest {
    pub fn new(
        response_event: impl Into<String>,
        filters: Vec<PingFilter>,
        requestor: Recipient,
    ) -> Self {
        Self {
            response_event: response_event.into(),
            filters,
            requestor,
        }
    }

    /// Все фильтры должны выполняться; пустой список подходит любому узлу.
    pub fn matches(
        &self,
        local: &PublisherInfo,
        events: &EventManager,
    ) -> bool {
        self.filters.iter().all(|f| f.matches(local, events))
    }
}

/// Параметры одного запроса.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingOptions {
    /// Сколько ждать ответов.
    pub window: Duration,
    /// Завершить сбор досрочно, получив столько различных ответов.
    pub max_replies: Option<usize>,
}

impl PingOptions {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            max_replies: None,
        }
    }

    pub fn with_max_replies(
        mut self,
        max: usize,
    ) -> Self {
        self.max_replies = Some(max);
        self
    }
}

/// Собирает различные ответы в порядке поступления до конца окна,
/// досрочного лимита или закрытия канала.
pub(crate) async fn collect_replies(
    rx: &mut UnboundedReceiver<PublisherInfo>,
    options: PingOptions,
) -> Vec<PublisherInfo> {
    let deadline = Instant::now() + options.window;
    let mut seen = HashSet::new();
    let mut replies = Vec::new();

    if options.max_replies == Some(0) {
        return replies;
    }

    while let Ok(Some(info)) = timeout_at(deadline, rx.recv()).await {
        if seen.insert(info.clone()) {
            replies.push(info);
            if options.max_replies.is_some_and(|max| replies.len() >= max) {
                break;
            }
        }
    }

    replies
}
