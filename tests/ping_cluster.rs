use std::{sync::Arc, time::Duration};

use serde_json::json;
use tokio::sync::mpsc;

use carebus::{
    handler, BusSettings, Event, EventManager, GlobalEventDispatcher, JsonCodec, MemoryBroker,
    MemoryTransport, NodeIdentity, PingFilter, PingOptions, Recipient,
};

const WINDOW: Duration = Duration::from_millis(300);

async fn node(
    broker: &Arc<MemoryBroker>,
    endpoint: &str,
    app_name: &str,
) -> GlobalEventDispatcher {
    let transport = Arc::new(MemoryTransport::with_endpoint_id(broker.clone(), endpoint));
    let identity = NodeIdentity {
        app_name: app_name.to_string(),
        user_name: format!("user-{endpoint}"),
        ..Default::default()
    };
    let dispatcher = GlobalEventDispatcher::new(
        Arc::new(EventManager::new()),
        transport,
        Arc::new(JsonCodec),
        &identity,
        BusSettings {
            announce_connection: false,
            ..Default::default()
        },
    );
    dispatcher.start().await.unwrap();
    dispatcher
}

fn endpoints(replies: &[carebus::PublisherInfo]) -> Vec<String> {
    let mut ids: Vec<String> = replies.iter().map(|r| r.endpoint_id.clone()).collect();
    ids.sort();
    ids
}

/// Тест проверяет, что на ping без фильтров отвечают все узлы, кроме
/// запрашивающего.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ping_without_filters_reaches_all_peers() {
    let broker = Arc::new(MemoryBroker::new(64));
    let a = node(&broker, "a", "Desktop").await;
    let _b = node(&broker, "b", "Desktop").await;
    let _c = node(&broker, "c", "Monitor").await;

    let replies = a
        .ping(vec![], &[], PingOptions::new(WINDOW))
        .await
        .unwrap();
    assert_eq!(endpoints(&replies), vec!["b", "c"]);
}

/// Тест проверяет, что фильтры APP_NAME и SENTINEL_EVENT применяются
/// совместно.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ping_filters_are_conjunctive() {
    let broker = Arc::new(MemoryBroker::new(64));
    let a = node(&broker, "a", "Desktop").await;
    let b = node(&broker, "b", "Desktop").await;
    let c = node(&broker, "c", "Monitor").await;
    let _d = node(&broker, "d", "Desktop").await;

    b.subscribe("CHAT.SESSION.7", handler(|_: &Event| {}))
        .await
        .unwrap();
    c.subscribe("CHAT.SESSION.7", handler(|_: &Event| {}))
        .await
        .unwrap();

    let by_app = a
        .ping(vec![PingFilter::app_name("desktop")], &[], PingOptions::new(WINDOW))
        .await
        .unwrap();
    assert_eq!(endpoints(&by_app), vec!["b", "d"]);

    let both = a
        .ping(
            vec![
                PingFilter::app_name("Desktop"),
                PingFilter::sentinel_event("CHAT.SESSION.7"),
            ],
            &[],
            PingOptions::new(WINDOW),
        )
        .await
        .unwrap();
    assert_eq!(endpoints(&both), vec!["b"]);
    assert_eq!(both[0].app_name, "Desktop");
    assert_eq!(both[0].user_name, "user-b");
}

/// Тест проверяет, что при отсутствии подходящих узлов результат пуст и
/// возвращается по истечении окна.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ping_without_match_returns_empty() {
    let broker = Arc::new(MemoryBroker::new(64));
    let a = node(&broker, "a", "Desktop").await;
    let _b = node(&broker, "b", "Desktop").await;

    let started = tokio::time::Instant::now();
    let replies = a
        .ping(vec![PingFilter::app_name("Nobody")], &[], PingOptions::new(WINDOW))
        .await
        .unwrap();
    assert!(replies.is_empty());
    assert!(started.elapsed() >= WINDOW);
}

/// Тест проверяет, что адресованный ping получают только перечисленные узлы.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ping_respects_recipients() {
    let broker = Arc::new(MemoryBroker::new(64));
    let a = node(&broker, "a", "Desktop").await;
    let _b = node(&broker, "b", "Desktop").await;
    let _c = node(&broker, "c", "Desktop").await;

    let replies = a
        .ping(vec![], &[Recipient::consumer("c")], PingOptions::new(WINDOW))
        .await
        .unwrap();
    assert_eq!(endpoints(&replies), vec!["c"]);
}

/// Тест проверяет, что подписка на событие ответов снимается после ping.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ping_releases_response_subscription() {
    let broker = Arc::new(MemoryBroker::new(64));
    let a = node(&broker, "a", "Desktop").await;
    let _b = node(&broker, "b", "Desktop").await;

    let response_event = "PING.RESPONSE.fixed";
    let replies = a
        .ping_with_event(response_event, vec![], &[], PingOptions::new(WINDOW))
        .await
        .unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(a.events().subscriber_count(response_event), 0);
    assert!(!a.events().has_subscribers(response_event, true));
    // канал запросов остаётся подписанным
    assert_eq!(a.remote_channels().await, vec!["cwf-event-PING"]);
}

/// Тест проверяет доставку события между узлами с учётом адресатов.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_event_addressed_by_session() {
    let broker = Arc::new(MemoryBroker::new(64));
    let a = node(&broker, "a", "Desktop").await;
    let b = node(&broker, "b", "Desktop").await;
    let c = node(&broker, "c", "Desktop").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    for n in [&b, &c] {
        let tx = tx.clone();
        let endpoint = n.publisher_info().endpoint_id.clone();
        n.subscribe(
            "ALERT",
            handler(move |e: &Event| {
                let _ = tx.send((endpoint.clone(), e.clone()));
            }),
        )
        .await
        .unwrap();
    }

    let b_session = Recipient::session(b.publisher_info().session_id.clone());
    a.fire_remote_event("ALERT.CRITICAL", json!({"bed": 12}), &[b_session])
        .await
        .unwrap();

    let (endpoint, event) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out")
        .expect("closed");
    assert_eq!(endpoint, "b");
    assert_eq!(event.name, "ALERT.CRITICAL");
    assert_eq!(event.publisher.as_ref(), Some(a.publisher_info()));

    let extra = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
    assert!(extra.is_err());
}

/// Тест проверяет, что ping с событием ответов, на которое у узла уже есть
/// живая подписка, не лишает её удалённых событий.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ping_on_subscribed_event_keeps_subscription() {
    let broker = Arc::new(MemoryBroker::new(64));
    let a = node(&broker, "a", "Desktop").await;
    let b = node(&broker, "b", "Desktop").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    a.subscribe(
        "CHAT.REPLY",
        handler(move |e: &Event| {
            let _ = tx.send(e.payload.clone());
        }),
    )
    .await
    .unwrap();

    let replies = a
        .ping_with_event("CHAT.REPLY", vec![], &[], PingOptions::new(WINDOW))
        .await
        .unwrap();
    assert_eq!(endpoints(&replies), vec!["b"]);
    assert_eq!(
        a.remote_channels().await,
        vec!["cwf-event-CHAT", "cwf-event-PING"]
    );

    b.fire_remote_event("CHAT.REPLY", json!({"text": "after"}), &[])
        .await
        .unwrap();

    // ответы на ping тоже пришли этому подписчику; ищем событие после ping
    let delivered = tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(payload) = rx.recv().await {
            if payload == json!({"text": "after"}) {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(delivered, Ok(true));
}

/// Тест проверяет, что отменённый ping снимает и локальную, и удалённую
/// подписку на событие ответов.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_ping_releases_subscription() {
    let broker = Arc::new(MemoryBroker::new(64));
    let a = node(&broker, "a", "Desktop").await;

    let pending = a.ping_with_event(
        "DISC.RESP",
        vec![],
        &[],
        PingOptions::new(Duration::from_secs(10)),
    );
    assert!(tokio::time::timeout(Duration::from_millis(50), pending)
        .await
        .is_err());
    assert_eq!(a.events().subscriber_count("DISC.RESP"), 0);

    // удалённая часть снимается фоновой задачей
    let released = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if a.remote_channels().await == vec!["cwf-event-PING"] {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "{:?}", a.remote_channels().await);
}

/// Тест проверяет, что отписка живого подписчика во время ping на то же
/// событие не оставляет удалённый канал после завершения ping.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsubscribe_during_ping_releases_channel() {
    let broker = Arc::new(MemoryBroker::new(64));
    let a = node(&broker, "a", "Desktop").await;
    let _b = node(&broker, "b", "Desktop").await;

    let live = handler(|_: &Event| {});
    a.subscribe("CHAT.REPLY", live.clone()).await.unwrap();

    let ping = a.ping_with_event("CHAT.REPLY", vec![], &[], PingOptions::new(WINDOW));
    let leave = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        // обработчик ping ещё подписан
        assert_eq!(a.unsubscribe("CHAT.REPLY", &live).await.unwrap(), 1);
    };
    let (replies, ()) = tokio::join!(ping, leave);
    assert_eq!(endpoints(&replies.unwrap()), vec!["b"]);

    assert_eq!(a.events().subscriber_count("CHAT.REPLY"), 0);
    assert_eq!(a.remote_channels().await, vec!["cwf-event-PING"]);
}
