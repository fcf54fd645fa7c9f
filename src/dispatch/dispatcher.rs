use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tokio::{
    sync::{mpsc, Mutex as AsyncMutex},
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use carebus_error::CodecError;

use super::{
    delivered::DeliveredTracker,
    ping::{self, PingFilter, PingOptions, PingRequest, PING_REQUEST_EVENT},
    transport::{EnvelopeHandler, Transport},
};
use crate::{
    config::{BusSettings, NodeIdentity},
    error::{DispatchError, DispatchResult, ErrorExt},
    event::{handler, name, Event, EventManager, HandlerRef, LocalSubscription},
    messaging::{
        is_excluded, Envelope, EnvelopeCodec, Message, PublisherInfo, Recipient, META_PUBLISHED,
        META_PUBLISH_ID,
    },
};

/// Публикуется при старте диспетчера с `PublisherInfo` узла.
pub const CONNECT_EVENT: &str = "CONNECT";
/// Публикуется при остановке диспетчера.
pub const DISCONNECT_EVENT: &str = "DISCONNECT";

struct Inbound {
    channel: String,
    payload: Bytes,
}

struct DispatcherInner {
    events: Arc<EventManager>,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn EnvelopeCodec>,
    publisher: PublisherInfo,
    settings: BusSettings,
    delivered: DeliveredTracker,
    /// Канал → событие → число держателей удалённой подписки.
    remote: AsyncMutex<HashMap<String, HashMap<String, usize>>>,
    inbound_tx: parking_lot::Mutex<Option<mpsc::UnboundedSender<Inbound>>>,
    pump: parking_lot::Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

/// Распространение событий по кластеру через брокер.
///
/// Локальные подписки живут в [`EventManager`]; диспетчер дополнительно
/// подписывает узел на канал брокера, соответствующий корневому сегменту
/// события, и переиздаёт входящие сообщения в локальную шину с
/// `PublisherInfo` отправителя.
#[derive(Clone)]
pub struct GlobalEventDispatcher {
    inner: Arc<DispatcherInner>,
}

impl GlobalEventDispatcher {
    pub fn new(
        events: Arc<EventManager>,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn EnvelopeCodec>,
        identity: &NodeIdentity,
        settings: BusSettings,
    ) -> Self {
        let publisher = PublisherInfo::from_identity(identity, transport.endpoint_id());
        Self {
            inner: Arc::new(DispatcherInner {
                events,
                transport,
                codec,
                publisher,
                delivered: DeliveredTracker::new(settings.dedup_window()),
                settings,
                remote: AsyncMutex::new(HashMap::new()),
                inbound_tx: parking_lot::Mutex::new(None),
                pump: parking_lot::Mutex::new(None),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn publisher_info(&self) -> &PublisherInfo {
        &self.inner.publisher
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.inner.events
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Подключает транспорт и начинает приём.
    ///
    /// Для событий, на которые уже есть локальные подписки, оформляются
    /// подписки на каналы брокера.
    pub async fn start(&self) -> DispatchResult<()> {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::AlreadyStarted);
        }

        if let Err(err) = inner.transport.connect().await {
            inner.started.store(false, Ordering::Release);
            return Err(err.into());
        }

        if let Err(err) = inner.open_channels().await {
            warn!(publisher = %inner.publisher, error = %err, "Dispatcher start failed, rolling back");
            inner.release_channels().await;
            if let Err(disconnect) = inner.transport.disconnect().await {
                warn!(error = %disconnect, "Failed to disconnect transport after failed start");
            }
            inner.started.store(false, Ordering::Release);
            return Err(err);
        }

        if inner.settings.announce_connection {
            inner.announce(CONNECT_EVENT).await;
        }

        info!(
            publisher = %inner.publisher,
            endpoint = inner.transport.endpoint_id(),
            "Global event dispatcher started"
        );
        Ok(())
    }

    /// Останавливает приём и отключает транспорт.
    pub async fn shutdown(&self) -> DispatchResult<()> {
        let inner = &self.inner;
        if !inner.started.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        if inner.settings.announce_connection {
            inner.announce(DISCONNECT_EVENT).await;
        }

        inner.release_channels().await;
        inner.transport.disconnect().await?;

        info!(publisher = %inner.publisher, "Global event dispatcher stopped");
        Ok(())
    }

    /// Подписка на событие с распространением по кластеру.
    ///
    /// Удалённая подписка оформляется при появлении первого локального
    /// подписчика; если она не удалась, локальная подписка откатывается.
    /// Возвращает число локальных подписчиков на `event`.
    pub async fn subscribe(
        &self,
        event: &str,
        handler: HandlerRef,
    ) -> DispatchResult<usize> {
        let events = &self.inner.events;
        let before = events.subscriber_count(event);
        let count = events.subscribe(event, handler.clone())?;

        if before == 0 && count == 1 && self.is_started() {
            if let Err(err) = self.inner.subscribe_remote(event).await {
                events.unsubscribe(event, &handler)?;
                return Err(err);
            }
        }
        Ok(count)
    }

    /// Снимает подписку; удалённая подписка снимается вместе с последним
    /// локальным подписчиком.
    pub async fn unsubscribe(
        &self,
        event: &str,
        handler: &HandlerRef,
    ) -> DispatchResult<usize> {
        let before = self.inner.events.subscriber_count(event);
        let remaining = self.inner.events.unsubscribe(event, handler)?;
        if before > 0 && remaining == 0 && self.is_started() {
            self.inner.unsubscribe_remote(event).await?;
        }
        Ok(remaining)
    }

    pub async fn subscribe_remote(
        &self,
        event: &str,
    ) -> DispatchResult<()> {
        self.inner.subscribe_remote(event).await
    }

    pub async fn unsubscribe_remote(
        &self,
        event: &str,
    ) -> DispatchResult<()> {
        self.inner.unsubscribe_remote(event).await
    }

    /// Публикует сообщение в канал события. Пустой список получателей
    /// означает рассылку всем узлам.
    pub async fn publish(
        &self,
        event: &str,
        message: Message,
        recipients: &[Recipient],
    ) -> DispatchResult<()> {
        self.inner.publish(event, message, recipients).await
    }

    pub async fn fire_remote_event(
        &self,
        event: &str,
        payload: Value,
        recipients: &[Recipient],
    ) -> DispatchResult<()> {
        self.inner.fire_remote_event(event, payload, recipients).await
    }

    /// Опрашивает узлы кластера; возвращает ответивших в порядке
    /// поступления ответов.
    pub async fn ping(
        &self,
        filters: Vec<PingFilter>,
        recipients: &[Recipient],
        options: PingOptions,
    ) -> DispatchResult<Vec<PublisherInfo>> {
        let response_event = ping::response_event_name();
        self.ping_with_event(&response_event, filters, recipients, options)
            .await
    }

    /// `ping` с заданным именем события для ответов.
    pub async fn ping_with_event(
        &self,
        response_event: &str,
        filters: Vec<PingFilter>,
        recipients: &[Recipient],
        options: PingOptions,
    ) -> DispatchResult<Vec<PublisherInfo>> {
        name::validate(response_event)?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let collector = handler(move |event: &Event| match event.payload_as::<PublisherInfo>() {
            Ok(info) => {
                let _ = tx.send(info);
            }
            Err(err) => warn!(event = %event.name, error = %err, "Malformed ping response"),
        });

        let scope = PingScope::open(&self.inner, response_event, collector).await?;

        let request = PingRequest::new(
            response_event,
            filters,
            Recipient::consumer(self.inner.publisher.consumer_id.clone()),
        );
        let sent = match serde_json::to_value(&request) {
            Ok(payload) => {
                self.inner
                    .fire_remote_event(PING_REQUEST_EVENT, payload, recipients)
                    .await
            }
            Err(err) => Err(CodecError::Encode {
                what: "PingRequest".to_string(),
                reason: err.to_string(),
            }
            .into()),
        };

        let result = match sent {
            Ok(()) => Ok(ping::collect_replies(&mut rx, options).await),
            Err(err) => Err(err),
        };
        scope.close().await;

        if let Ok(replies) = &result {
            debug!(response_event, replies = replies.len(), "Ping completed");
        }
        result
    }

    /// `ping` с окном ожидания из настроек.
    pub async fn ping_default(
        &self,
        filters: Vec<PingFilter>,
        recipients: &[Recipient],
    ) -> DispatchResult<Vec<PublisherInfo>> {
        let options = PingOptions::new(self.inner.settings.ping_window());
        self.ping(filters, recipients, options).await
    }

    /// Каналы брокера, на которые сейчас подписан узел.
    pub async fn remote_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.inner.remote.lock().await.keys().cloned().collect();
        channels.sort();
        channels
    }
}

impl DispatcherInner {
    /// Запускает приём и оформляет подписки, нужные узлу с самого старта.
    async fn open_channels(self: &Arc<Self>) -> DispatchResult<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inbound_tx.lock() = Some(tx);
        let pump = tokio::spawn(run_pump(Arc::downgrade(self), rx));
        if let Some(previous) = self.pump.lock().replace(pump) {
            previous.abort();
        }

        self.subscribe_remote(PING_REQUEST_EVENT).await?;
        for event in self.events.event_names() {
            self.subscribe_remote(&event).await?;
        }
        Ok(())
    }

    /// Останавливает приём и забывает удалённые подписки. Транспорт
    /// отключается вызывающим.
    async fn release_channels(&self) {
        self.inbound_tx.lock().take();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.remote.lock().await.clear();
    }

    fn inbound_handler(&self) -> DispatchResult<EnvelopeHandler> {
        let tx = self
            .inbound_tx
            .lock()
            .clone()
            .ok_or(DispatchError::NotStarted)?;
        Ok(Arc::new(move |channel: &str, payload: Bytes| {
            let _ = tx.send(Inbound {
                channel: channel.to_string(),
                payload,
            });
        }))
    }

    async fn subscribe_remote(
        &self,
        event: &str,
    ) -> DispatchResult<()> {
        name::validate(event)?;
        let handler = self.inbound_handler()?;
        let channel = name::channel_name(event);

        let mut remote = self.remote.lock().await;
        if !remote.contains_key(&channel) {
            self.transport.subscribe(&channel, handler).await?;
            debug!(channel = %channel, event, "Subscribed to remote channel");
        }
        *remote
            .entry(channel)
            .or_default()
            .entry(event.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn unsubscribe_remote(
        &self,
        event: &str,
    ) -> DispatchResult<()> {
        // канал запросов ping нужен узлу всё время работы
        if event == PING_REQUEST_EVENT {
            return Ok(());
        }
        let channel = name::channel_name(event);

        let mut remote = self.remote.lock().await;
        let Some(events) = remote.get_mut(&channel) else {
            return Ok(());
        };
        let Some(holders) = events.get_mut(event) else {
            return Ok(());
        };
        *holders -= 1;
        if *holders > 0 {
            return Ok(());
        }
        events.remove(event);
        if !events.is_empty() {
            return Ok(());
        }
        remote.remove(&channel);
        self.transport.unsubscribe(&channel).await?;
        debug!(channel = %channel, event, "Unsubscribed from remote channel");
        Ok(())
    }

    async fn publish(
        &self,
        event: &str,
        mut message: Message,
        recipients: &[Recipient],
    ) -> DispatchResult<()> {
        name::validate(event)?;
        message.set_metadata(META_PUBLISH_ID, Value::String(Uuid::new_v4().to_string()));
        message.set_metadata(META_PUBLISHED, Value::from(Utc::now().timestamp_millis()));

        let envelope = Envelope::new(event, message, self.publisher.clone(), recipients.to_vec());
        let payload = self.codec.encode(&envelope)?;
        let channel = name::channel_name(event);
        self.transport.publish(&channel, payload).await?;

        trace!(event, channel = %channel, recipients = recipients.len(), "Remote event published");
        Ok(())
    }

    async fn fire_remote_event(
        &self,
        event: &str,
        payload: Value,
        recipients: &[Recipient],
    ) -> DispatchResult<()> {
        self.publish(event, Message::new(event, payload), recipients)
            .await
    }

    async fn announce(
        &self,
        event: &str,
    ) {
        let payload = match serde_json::to_value(&self.publisher) {
            Ok(v) => v,
            Err(err) => {
                warn!(event, error = %err, "Failed to encode publisher info");
                return;
            }
        };
        if let Err(err) = self.fire_remote_event(event, payload, &[]).await {
            warn!(
                event,
                status = %err.status_code(),
                error = %err,
                "Failed to announce connection state"
            );
        }
    }

    async fn handle_inbound(
        &self,
        inbound: Inbound,
    ) {
        let envelope = match self.codec.decode(&inbound.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(channel = %inbound.channel, error = %err, "Dropped undecodable message");
                return;
            }
        };

        if !self.delivered.check_and_record(envelope.message.publish_id()) {
            debug!(event = %envelope.event, "Dropped duplicate delivery");
            return;
        }

        if is_excluded(&envelope.recipients, &self.publisher) {
            trace!(event = %envelope.event, "Message not addressed to this node");
            return;
        }

        if let Err(err) = name::validate(&envelope.event) {
            warn!(channel = %inbound.channel, error = %err, "Dropped message with invalid event name");
            return;
        }

        if envelope.event == PING_REQUEST_EVENT {
            self.answer_ping(&envelope).await;
        }

        let event = Event {
            name: envelope.event,
            payload: envelope.message.payload,
            publisher: Some(envelope.publisher),
        };
        self.events.fire(&event);
    }

    async fn answer_ping(
        &self,
        envelope: &Envelope,
    ) {
        if envelope.publisher == self.publisher {
            trace!("Ignored own ping request");
            return;
        }

        let request: PingRequest = match envelope.message.payload_as() {
            Ok(request) => request,
            Err(err) => {
                warn!(publisher = %envelope.publisher, error = %err, "Malformed ping request");
                return;
            }
        };

        if !request.matches(&self.publisher, &self.events) {
            trace!(response_event = %request.response_event, "Ping filters not satisfied");
            return;
        }

        let payload = match serde_json::to_value(&self.publisher) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "Failed to encode ping response");
                return;
            }
        };
        let recipients = [request.requestor.clone()];
        if let Err(err) = self
            .fire_remote_event(&request.response_event, payload, &recipients)
            .await
        {
            warn!(
                response_event = %request.response_event,
                retryable = err.status_code().is_retryable(),
                error = %err,
                "Failed to answer ping"
            );
        }
    }
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}

async fn run_pump(
    inner: Weak<DispatcherInner>,
    mut rx: mpsc::UnboundedReceiver<Inbound>,
) {
    while let Some(inbound) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_inbound(inbound).await;
    }
}

/// Подписка на ответы одного ping-запроса.
///
/// Удалённая подписка берётся и отдаётся по тем же переходам 0→1 и 1→0
/// числа локальных подписчиков, что и в `GlobalEventDispatcher::subscribe`.
/// Если future запроса был отменён, удалённая часть снимается фоновой
/// задачей из `Drop`.
struct PingScope {
    inner: Arc<DispatcherInner>,
    event: String,
    local: Option<LocalSubscription>,
}

impl PingScope {
    async fn open(
        inner: &Arc<DispatcherInner>,
        event: &str,
        handler: HandlerRef,
    ) -> DispatchResult<Self> {
        let before = inner.events.subscriber_count(event);
        let local = inner.events.subscribe_scoped(event, handler)?;
        if before == 0 {
            // при ошибке `local` снимается здесь же
            inner.subscribe_remote(event).await?;
        }
        Ok(Self {
            inner: Arc::clone(inner),
            event: event.to_string(),
            local: Some(local),
        })
    }

    /// Снимает локальную подписку; `true`, если подписчиков не осталось.
    fn release_local(&mut self) -> bool {
        match self.local.take() {
            Some(local) => {
                drop(local);
                self.inner.events.subscriber_count(&self.event) == 0
            }
            None => false,
        }
    }

    async fn close(mut self) {
        if self.release_local() {
            if let Err(err) = self.inner.unsubscribe_remote(&self.event).await {
                warn!(
                    event = %self.event,
                    retryable = err.status_code().is_retryable(),
                    error = %err,
                    "Failed to release ping subscription"
                );
            }
        }
    }
}

impl Drop for PingScope {
    fn drop(&mut self) {
        if !self.release_local() {
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let inner = Arc::clone(&self.inner);
            let event = std::mem::take(&mut self.event);
            runtime.spawn(async move {
                let _ = inner.unsubscribe_remote(&event).await;
            });
        }
    }
}
