use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};
use uuid::Uuid;

use carebus_error::TransportError;

use super::transport::{EnvelopeHandler, Transport, TransportResult};
use crate::config::BusSettings;

type ChannelKey = Arc<str>;

/// Брокер в памяти процесса.
///
/// Несколько `MemoryTransport`, подключённых к одному брокеру, ведут себя
/// как узлы кластера: каждый получает всё, что опубликовано в каналы, на
/// которые он подписан, включая собственные публикации.
pub struct MemoryBroker {
    /// Каналы → `Sender`
    channels: DashMap<ChannelKey, broadcast::Sender<Bytes>>,
    /// Ёмкость буфера каждого `broadcast::channel`
    capacity: usize,
    /// Общее количество вызовов `publish`
    pub publish_count: AtomicUsize,
    /// Количество неудачных `send` (нет подписчиков)
    pub send_error_count: AtomicUsize,
}

impl MemoryBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
            publish_count: AtomicUsize::new(0),
            send_error_count: AtomicUsize::new(0),
        }
    }

    /// Ёмкость каналов берётся из `bus.inbound_buffer`.
    pub fn from_settings(settings: &BusSettings) -> Self {
        Self::new(settings.inbound_buffer)
    }

    pub fn subscribe(
        &self,
        channel: &str,
    ) -> broadcast::Receiver<Bytes> {
        let key: ChannelKey = Arc::from(channel);
        self.channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Публикует в канал; возвращает число получателей.
    ///
    /// Канал без подписчиков удаляется.
    pub fn publish(
        &self,
        channel: &str,
        payload: Bytes,
    ) -> usize {
        self.publish_count.fetch_add(1, Ordering::Relaxed);

        let Some(entry) = self.channels.get(channel) else {
            return 0;
        };
        let tx = entry.value().clone();
        drop(entry);

        match tx.send(payload) {
            Ok(receivers) => receivers,
            Err(_) => {
                self.send_error_count.fetch_add(1, Ordering::Relaxed);
                self.channels
                    .remove_if(channel, |_, tx| tx.receiver_count() == 0);
                0
            }
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn receiver_count(
        &self,
        channel: &str,
    ) -> usize {
        self.channels
            .get(channel)
            .map_or(0, |tx| tx.receiver_count())
    }
}

/// Транспорт поверх [`MemoryBroker`].
///
/// На каждую подписку запускается задача, перекладывающая сообщения из
/// `broadcast::Receiver` в обработчик.
pub struct MemoryTransport {
    broker: Arc<MemoryBroker>,
    endpoint_id: String,
    connected: AtomicBool,
    subscriptions: DashMap<String, JoinHandle<()>>,
}

impl MemoryTransport {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self::with_endpoint_id(broker, Uuid::new_v4().to_string())
    }

    pub fn with_endpoint_id(
        broker: Arc<MemoryBroker>,
        endpoint_id: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            endpoint_id: endpoint_id.into(),
            connected: AtomicBool::new(false),
            subscriptions: DashMap::new(),
        }
    }

    pub fn subscribed_channels(&self) -> Vec<String> {
        let mut out: Vec<String> = self.subscriptions.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    fn ensure_connected(&self) -> TransportResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::NotConnected {
                endpoint: self.endpoint_id.clone(),
            })
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> TransportResult<()> {
        self.connected.store(true, Ordering::Release);
        debug!(endpoint = %self.endpoint_id, "Memory transport connected");
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.connected.store(false, Ordering::Release);
        self.subscriptions.retain(|_, task| {
            task.abort();
            false
        });
        debug!(endpoint = %self.endpoint_id, "Memory transport disconnected");
        Ok(())
    }

    async fn publish(
        &self,
        channel: &str,
        payload: Bytes,
    ) -> TransportResult<()> {
        self.ensure_connected()?;
        let receivers = self.broker.publish(channel, payload);
        debug!(endpoint = %self.endpoint_id, channel, receivers, "Published");
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
        handler: EnvelopeHandler,
    ) -> TransportResult<()> {
        self.ensure_connected()?;

        let mut rx = self.broker.subscribe(channel);
        let name = channel.to_string();
        let endpoint = self.endpoint_id.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => handler(name.as_str(), payload),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(endpoint = %endpoint, channel = %name, skipped, "Subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = self.subscriptions.insert(channel.to_string(), task) {
            previous.abort();
        }
        Ok(())
    }

    async fn unsubscribe(
        &self,
        channel: &str,
    ) -> TransportResult<()> {
        if let Some((_, task)) = self.subscriptions.remove(channel) {
            task.abort();
        }
        Ok(())
    }

    fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        for entry in self.subscriptions.iter() {
            entry.value().abort();
        }
    }
}
