use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::TimerManager;

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> crate::Callback) {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let fired2 = fired.clone();
    let make = move |tag: &str| -> crate::Callback {
        let fired = fired2.clone();
        let tag = tag.to_string();
        Box::new(move || fired.lock().unwrap().push(tag))
    };
    (fired, make)
}

#[tokio::test(start_paused = true)]
async fn fires_callback_at_expiry() {
    let tm = TimerManager::new(2);
    tm.start();
    let (fired, make) = recorder();

    tm.schedule("t1", Instant::now() + Duration::from_millis(50), make("t1"))
        .unwrap();
    assert!(fired.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(fired.lock().unwrap().clone(), vec!["t1".to_string()]);
    tm.stop().await;
}

#[tokio::test(start_paused = true)]
async fn rescheduling_an_id_replaces_the_pending_event() {
    let tm = TimerManager::new(2);
    tm.start();
    let (fired, make) = recorder();

    tm.schedule("t", Instant::now() + Duration::from_millis(200), make("first"))
        .unwrap();
    tm.schedule("t", Instant::now() + Duration::from_millis(100), make("second"))
        .unwrap();
    assert_eq!(tm.stats().scheduled_tasks, 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(fired.lock().unwrap().clone(), vec!["second".to_string()]);
    tm.stop().await;
}

#[tokio::test(start_paused = true)]
async fn dispatch_order_is_nondecreasing_in_expiry() {
    let tm = TimerManager::new(1);
    tm.start();
    let (fired, make) = recorder();

    // Scheduled out of order on purpose.
    let base = Instant::now();
    tm.schedule("c", base + Duration::from_millis(300), make("c"))
        .unwrap();
    tm.schedule("a", base + Duration::from_millis(100), make("a"))
        .unwrap();
    tm.schedule("d", base + Duration::from_millis(400), make("d"))
        .unwrap();
    tm.schedule("b", base + Duration::from_millis(200), make("b"))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        fired.lock().unwrap().clone(),
        vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()]
    );
    tm.stop().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_removes_a_pending_event() {
    let tm = TimerManager::new(2);
    tm.start();
    let (fired, make) = recorder();

    tm.schedule("gone", Instant::now() + Duration::from_millis(100), make("gone"))
        .unwrap();
    assert!(tm.cancel("gone"));
    assert!(!tm.cancel("gone"));
    assert!(!tm.cancel("never-scheduled"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(fired.lock().unwrap().is_empty());
    tm.stop().await;
}

#[tokio::test(start_paused = true)]
async fn heap_size_tracks_live_events() {
    let tm = TimerManager::new(2);
    tm.start();
    let (_fired, make) = recorder();

    let base = Instant::now();
    for (i, tag) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        tm.schedule(
            *tag,
            base + Duration::from_millis(100 * (i as u64 + 1)),
            make(tag),
        )
        .unwrap();
    }
    assert_eq!(tm.stats().scheduled_tasks, 5);

    tm.cancel("b");
    tm.cancel("d");
    assert_eq!(tm.stats().scheduled_tasks, 3);

    // Let "a" expire; "c" and "e" remain pending.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(tm.stats().scheduled_tasks, 2);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(tm.stats().scheduled_tasks, 0);
    tm.stop().await;
}

#[tokio::test(start_paused = true)]
async fn schedule_fails_after_stop() {
    let tm = TimerManager::new(2);
    tm.start();
    tm.stop().await;

    let (_fired, make) = recorder();
    let err = tm
        .schedule("late", Instant::now() + Duration::from_millis(10), make("late"))
        .unwrap_err();
    assert!(matches!(err, crate::TimerError::Stopped));
}

#[tokio::test(start_paused = true)]
async fn panicking_callback_does_not_take_down_the_loop() {
    let tm = TimerManager::new(2);
    tm.start();
    let (fired, make) = recorder();

    tm.schedule(
        "boom",
        Instant::now() + Duration::from_millis(50),
        Box::new(|| panic!("callback exploded")),
    )
    .unwrap();
    tm.schedule("after", Instant::now() + Duration::from_millis(150), make("after"))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fired.lock().unwrap().clone(), vec!["after".to_string()]);
    tm.stop().await;
}

#[tokio::test(start_paused = true)]
async fn callbacks_may_reschedule_themselves() {
    let tm = TimerManager::new(2);
    tm.start();
    let (fired, make) = recorder();

    let tm2 = tm.clone();
    let chained = make("second");
    tm.schedule(
        "chain",
        Instant::now() + Duration::from_millis(50),
        Box::new(move || {
            let _ = tm2.schedule("chain", Instant::now() + Duration::from_millis(50), chained);
        }),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fired.lock().unwrap().clone(), vec!["second".to_string()]);
    tm.stop().await;
}
