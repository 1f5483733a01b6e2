use std::sync::Arc;
use std::time::Duration;

use crate::{Registry, RegistryError, Session};

fn session(id: &str, zipcode: &str) -> Arc<Session> {
    Arc::new(Session::new(
        id.to_string(),
        zipcode.to_string(),
        "Testville".to_string(),
    ))
}

#[test]
fn register_and_get() {
    let registry = Registry::new(10);
    registry.register(session("c1", "90210")).unwrap();

    let found = registry.get("c1").expect("session should be present");
    assert_eq!(found.zipcode, "90210");
    assert_eq!(found.city, "Testville");
    assert_eq!(registry.count(), 1);
}

#[test]
fn unregister_removes_both_indexes() {
    let registry = Registry::new(10);
    registry.register(session("c1", "90210")).unwrap();
    registry.register(session("c2", "90210")).unwrap();

    registry.unregister("c1").unwrap();

    assert!(registry.get("c1").is_none());
    assert_eq!(registry.get_by_zipcode("90210"), vec!["c2".to_string()]);

    registry.unregister("c2").unwrap();
    assert!(registry.get_by_zipcode("90210").is_empty());
    assert_eq!(registry.stats().unique_zipcodes, 0);
}

#[test]
fn unregister_unknown_id_fails() {
    let registry = Registry::new(10);
    assert!(matches!(
        registry.unregister("ghost"),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn register_rejects_duplicate_ids() {
    let registry = Registry::new(10);
    registry.register(session("c1", "90210")).unwrap();
    assert!(matches!(
        registry.register(session("c1", "10001")),
        Err(RegistryError::DuplicateId(_))
    ));
    assert_eq!(registry.count(), 1);
}

#[test]
fn register_enforces_capacity() {
    let registry = Registry::new(2);
    registry.register(session("c1", "90210")).unwrap();
    registry.register(session("c2", "10001")).unwrap();
    assert!(matches!(
        registry.register(session("c3", "60601")),
        Err(RegistryError::CapacityExceeded)
    ));
    assert_eq!(registry.count(), 2);

    // Freeing a slot lets a new session in.
    registry.unregister("c1").unwrap();
    registry.register(session("c3", "60601")).unwrap();
    assert_eq!(registry.count(), 2);
}

#[test]
fn get_by_zipcode_returns_a_snapshot() {
    let registry = Registry::new(10);
    registry.register(session("c1", "90210")).unwrap();
    registry.register(session("c2", "90210")).unwrap();

    let snapshot = registry.get_by_zipcode("90210");
    registry.unregister("c1").unwrap();

    // The earlier snapshot is unaffected by the mutation.
    assert_eq!(snapshot.len(), 2);
    assert_eq!(registry.get_by_zipcode("90210").len(), 1);
}

#[test]
fn update_activity_refreshes_last_heard() {
    let registry = Registry::new(10);
    let s = session("c1", "90210");
    registry.register(s.clone()).unwrap();

    let before = s.last_heard();
    std::thread::sleep(Duration::from_millis(5));
    registry.update_activity("c1").unwrap();
    assert!(s.last_heard() > before);

    assert!(matches!(
        registry.update_activity("ghost"),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn find_inactive_reports_stale_sessions() {
    let registry = Registry::new(10);
    let stale = session("stale", "90210");
    let fresh = session("fresh", "10001");
    registry.register(stale.clone()).unwrap();
    registry.register(fresh.clone()).unwrap();

    std::thread::sleep(Duration::from_millis(20));
    fresh.touch();

    let inactive = registry.find_inactive(Duration::from_millis(10));
    assert_eq!(inactive, vec!["stale".to_string()]);
}

#[test]
fn stats_summarize_the_registry() {
    let registry = Registry::new(100);
    registry.register(session("c1", "90210")).unwrap();
    registry.register(session("c2", "90210")).unwrap();
    registry.register(session("c3", "10001")).unwrap();

    let stats = registry.stats();
    assert_eq!(stats.total_connections, 3);
    assert_eq!(stats.unique_zipcodes, 2);
    assert_eq!(stats.max_connections, 100);
}

#[tokio::test]
async fn close_cancels_the_session_token() {
    let s = session("c1", "90210");
    let waiter = s.clone();
    let handle = tokio::spawn(async move { waiter.closed().await });
    s.close();
    handle.await.unwrap();
}
