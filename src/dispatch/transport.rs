use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use carebus_error::TransportError;

pub type TransportResult<T> = Result<T, TransportError>;

/// Получатель входящих сообщений канала: `(channel, payload)`.
///
/// Вызывается из задачи транспорта; должен быстро возвращать управление.
pub type EnvelopeHandler = Arc<dyn Fn(&str, Bytes) + Send + Sync>;

/// Подключение к конкретному брокеру сообщений.
///
/// Транспорт не знает о событиях и конвертах: он переносит байты по
/// именованным каналам. Повторов нет, ошибки возвращаются вызывающему.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> TransportResult<()>;

    async fn disconnect(&self) -> TransportResult<()>;

    async fn publish(
        &self,
        channel: &str,
        payload: Bytes,
    ) -> TransportResult<()>;

    /// Подписка на канал. Повторная подписка заменяет обработчик.
    async fn subscribe(
        &self,
        channel: &str,
        handler: EnvelopeHandler,
    ) -> TransportResult<()>;

    async fn unsubscribe(
        &self,
        channel: &str,
    ) -> TransportResult<()>;

    /// Уникальный идентификатор этого подключения.
    fn endpoint_id(&self) -> &str;

    fn is_connected(&self) -> bool;
}
