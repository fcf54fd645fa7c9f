use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{error, trace};

use carebus_error::EventError;

use super::{
    handler::{Event, HandlerRef},
    name,
    subscriptions::SubscriptionTree,
};

pub type EventResult<T> = Result<T, EventError>;

/// Локальная иерархическая шина событий.
///
/// Подписка на `A` получает `A`, `A.B`, `A.B.C` и т.д. Доставка синхронная,
/// в потоке вызывающего. Список подписчиков снимается под блокировкой
/// чтения, сами обработчики вызываются уже без неё, поэтому обработчик
/// может свободно подписываться и отписываться.
pub struct EventManager {
    tree: Arc<RwLock<SubscriptionTree>>,
    /// Общее количество вызовов `fire`
    pub fire_count: AtomicUsize,
    /// Количество обработчиков, завершившихся паникой
    pub handler_error_count: AtomicUsize,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventManager {
    pub fn new() -> Self {
        Self {
            tree: Arc::new(RwLock::new(SubscriptionTree::default())),
            fire_count: AtomicUsize::new(0),
            handler_error_count: AtomicUsize::new(0),
        }
    }

    /// Подписывает обработчик на событие и всех его потомков.
    ///
    /// Возвращает число подписчиков ровно на `event`. Повторная подписка
    /// того же обработчика ничего не меняет.
    pub fn subscribe(
        &self,
        event: &str,
        handler: HandlerRef,
    ) -> EventResult<usize> {
        name::validate(event)?;
        let count = self.tree.write().add(event, handler);
        trace!(event, subscribers = count, "Local subscription added");
        Ok(count)
    }

    /// Снимает подписку; возвращает оставшееся число подписчиков.
    pub fn unsubscribe(
        &self,
        event: &str,
        handler: &HandlerRef,
    ) -> EventResult<usize> {
        name::validate(event)?;
        let count = self.tree.write().remove(event, handler);
        trace!(event, subscribers = count, "Local subscription removed");
        Ok(count)
    }

    /// Подписка, снимаемая при drop возвращённого guard'а.
    pub fn subscribe_scoped(
        &self,
        event: &str,
        handler: HandlerRef,
    ) -> EventResult<LocalSubscription> {
        self.subscribe(event, handler.clone())?;
        Ok(LocalSubscription {
            tree: Arc::clone(&self.tree),
            event: event.to_string(),
            handler,
        })
    }

    pub fn fire_local_event(
        &self,
        event: &str,
        payload: Value,
    ) -> EventResult<usize> {
        name::validate(event)?;
        Ok(self.fire(&Event::new(event, payload)))
    }

    /// Доставляет событие подписчикам имени и всех его предков.
    ///
    /// Каждый обработчик вызывается не более одного раза. Паника обработчика
    /// логируется и не мешает доставке остальным. Возвращает число
    /// вызванных обработчиков.
    pub fn fire(
        &self,
        event: &Event,
    ) -> usize {
        self.fire_count.fetch_add(1, Ordering::Relaxed);

        let handlers = self.tree.read().collect(&event.name);

        for handler in &handlers {
            let result = catch_unwind(AssertUnwindSafe(|| handler.on_event(event)));
            if let Err(panic) = result {
                self.handler_error_count.fetch_add(1, Ordering::Relaxed);
                error!(
                    event = %event.name,
                    panic = %panic_message(panic.as_ref()),
                    "Error during local event callback"
                );
            }
        }

        trace!(event = %event.name, delivered = handlers.len(), "Local event fired");
        handlers.len()
    }

    pub fn has_subscribers(
        &self,
        event: &str,
        exact: bool,
    ) -> bool {
        self.tree.read().has_subscribers(event, exact)
    }

    pub fn subscriber_count(
        &self,
        event: &str,
    ) -> usize {
        self.tree.read().count(event)
    }

    /// Все события, на которые оформлена хотя бы одна подписка.
    pub fn event_names(&self) -> Vec<String> {
        self.tree.read().event_names()
    }

    pub fn clear(&self) {
        self.tree.write().clear();
    }
}

/// RAII-подписка: при drop снимает себя с шины.
pub struct LocalSubscription {
    tree: Arc<RwLock<SubscriptionTree>>,
    event: String,
    handler: HandlerRef,
}

impl LocalSubscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }
}

impl Drop for LocalSubscription {
    fn drop(&mut self) {
        self.tree.write().remove(&self.event, &self.handler);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
