use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use serde_json::{json, Value};

use carebus::{handler, Event, EventManager, HandlerRef};

fn recorder() -> (HandlerRef, Arc<Mutex<Vec<Event>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (
        handler(move |e: &Event| sink.lock().unwrap().push(e.clone())),
        seen,
    )
}

/// Тест проверяет, что подписчик на `STATUS` получает каждое событие
/// потомков ровно один раз.
#[test]
fn test_status_hierarchy_delivery() {
    let bus = EventManager::new();
    let (h, seen) = recorder();
    bus.subscribe("STATUS", h).unwrap();

    bus.fire_local_event("STATUS.TEST1", json!("one")).unwrap();
    bus.fire_local_event("STATUS.TEST2", json!("two")).unwrap();

    let seen = seen.lock().unwrap();
    let names: Vec<&str> = seen.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["STATUS.TEST1", "STATUS.TEST2"]);
    assert_eq!(seen[1].payload, json!("two"));
    assert!(seen.iter().all(|e| !e.is_remote()));
}

/// Тест проверяет, что обработчик, подписанный на несколько уровней
/// иерархии, вызывается один раз за событие.
#[test]
fn test_handler_on_multiple_levels_called_once() {
    let bus = EventManager::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let h = handler(move |_: &Event| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    bus.subscribe("A", h.clone()).unwrap();
    bus.subscribe("A.B", h.clone()).unwrap();
    bus.subscribe("A.B.C", h).unwrap();

    assert_eq!(bus.fire_local_event("A.B.C", Value::Null).unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Тест проверяет, что паника в одном обработчике не мешает доставке
/// остальным подписчикам того же события.
#[test]
fn test_panicking_callback_does_not_block_others() {
    let bus = EventManager::new();
    let (before, seen_before) = recorder();
    let (after, seen_after) = recorder();

    bus.subscribe("ALERT", before).unwrap();
    bus.subscribe("ALERT", handler(|_: &Event| panic!("handler failure")))
        .unwrap();
    bus.subscribe("ALERT", after).unwrap();

    bus.fire_local_event("ALERT.CRITICAL", json!({"code": 7}))
        .unwrap();

    assert_eq!(seen_before.lock().unwrap().len(), 1);
    assert_eq!(seen_after.lock().unwrap().len(), 1);
    assert_eq!(bus.handler_error_count.load(Ordering::Relaxed), 1);
}

/// Тест проверяет, что подписка, оформленная во время доставки, не получает
/// текущее событие.
#[test]
fn test_subscription_during_fire_not_delivered_current_event() {
    let bus = Arc::new(EventManager::new());
    let (late, seen_late) = recorder();

    let subscriber = {
        let bus = Arc::clone(&bus);
        handler(move |_: &Event| {
            bus.subscribe("LATE", late.clone()).unwrap();
        })
    };
    bus.subscribe("LATE", subscriber).unwrap();

    bus.fire_local_event("LATE", Value::Null).unwrap();
    assert!(seen_late.lock().unwrap().is_empty());

    bus.fire_local_event("LATE", Value::Null).unwrap();
    assert_eq!(seen_late.lock().unwrap().len(), 1);
}

/// Тест проверяет доставку из нескольких потоков одновременно.
#[test]
fn test_concurrent_fire_and_subscribe() {
    let bus = Arc::new(EventManager::new());
    let total = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&total);
    bus.subscribe(
        "LOAD",
        handler(move |_: &Event| {
            counter.fetch_add(1, Ordering::Relaxed);
        }),
    )
    .unwrap();

    let threads: Vec<_> = (0..4)
        .map(|i| {
            let bus = Arc::clone(&bus);
            std::thread::spawn(move || {
                for j in 0..250 {
                    bus.fire_local_event(&format!("LOAD.T{i}"), json!(j))
                        .unwrap();
                    if j % 50 == 0 {
                        let (h, _) = recorder();
                        bus.subscribe(&format!("OTHER.T{i}"), h).unwrap();
                    }
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(total.load(Ordering::Relaxed), 1000);
}
