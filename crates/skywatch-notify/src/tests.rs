use chrono::{TimeZone, Utc};
use skywatch_common::types::MetricName;
use skywatch_protocol::{AlarmEvent, AlarmEventKind};

use crate::email::{body, subject, EmailNotifier};

fn triggered() -> AlarmEvent {
    AlarmEvent {
        kind: AlarmEventKind::Triggered,
        zipcode: "90210".to_string(),
        city: "Beverly Hills".to_string(),
        metric: MetricName::Temperature,
        value: Some(32.5),
        threshold: 30.0,
        operator: ">".to_string(),
        duration_minutes: 10,
        start_time: Utc.with_ymd_and_hms(2025, 10, 26, 13, 0, 0).unwrap(),
        alarm_id: Some(7),
    }
}

fn cleared() -> AlarmEvent {
    AlarmEvent {
        kind: AlarmEventKind::Cleared,
        value: None,
        ..triggered()
    }
}

#[test]
fn triggered_subject_names_the_location() {
    assert_eq!(
        subject(&triggered()),
        "Weather alarm TRIGGERED - Beverly Hills, 90210"
    );
}

#[test]
fn cleared_subject_names_the_location() {
    assert_eq!(
        subject(&cleared()),
        "Weather alarm CLEARED - Beverly Hills, 90210"
    );
}

#[test]
fn triggered_body_carries_the_breach_details() {
    let body = body(&triggered());
    assert!(body.contains("Location: Beverly Hills, 90210"));
    assert!(body.contains("Metric: temperature"));
    assert!(body.contains("Current Value: 32.5"));
    assert!(body.contains("Threshold: > 30"));
    assert!(body.contains("Duration: 10 minutes"));
    assert!(body.contains("Alarm ID: 7"));
}

#[test]
fn cleared_body_reports_recovery() {
    let body = body(&cleared());
    assert!(body.contains("has been cleared"));
    assert!(body.contains("Alarm ID: 7"));
}

#[test]
fn missing_alarm_id_renders_a_placeholder() {
    let mut event = cleared();
    event.alarm_id = None;
    assert!(body(&event).contains("Alarm ID: -"));
}

#[tokio::test]
async fn unconfigured_smtp_logs_instead_of_sending() {
    let notifier = EmailNotifier::new(
        "smtp.example.com",
        587,
        None,
        None,
        "alerts@example.com",
        "ops@example.com",
    )
    .unwrap();
    // Must succeed without any SMTP server listening.
    notifier.send_alarm_event(&triggered()).await.unwrap();
}
