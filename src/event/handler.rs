use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::messaging::PublisherInfo;

/// Событие, доставляемое подписчикам.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Полное имя события (не имя уровня, на котором оформлена подписка).
    pub name: String,
    pub payload: Value,
    /// Отправитель для событий, пришедших из кластера; `None` для локальных.
    pub publisher: Option<PublisherInfo>,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            name: name.into(),
            payload,
            publisher: None,
        }
    }

    pub fn with_publisher(
        mut self,
        publisher: PublisherInfo,
    ) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn is_remote(&self) -> bool {
        self.publisher.is_some()
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Подписчик локальной шины.
///
/// Подписчик определяется адресом `Arc`: для отписки нужно хранить
/// тот же `HandlerRef`, что был передан в `subscribe`.
pub trait EventHandler: Send + Sync {
    fn on_event(
        &self,
        event: &Event,
    );
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(
        &self,
        event: &Event,
    ) {
        self(event)
    }
}

pub type HandlerRef = Arc<dyn EventHandler>;

/// Оборачивает замыкание в `HandlerRef`.
pub fn handler<F>(f: F) -> HandlerRef
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn same_handler(
    a: &HandlerRef,
    b: &HandlerRef,
) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

pub(crate) fn handler_addr(h: &HandlerRef) -> *const () {
    Arc::as_ptr(h) as *const ()
}
