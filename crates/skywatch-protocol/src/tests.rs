use chrono::{TimeZone, Utc};
use skywatch_common::types::{MetricName, WindDirection};

use crate::*;

fn sample_data() -> MetricData {
    MetricData {
        timestamp: "2025-10-26T13:30:00Z".to_string(),
        temperature: Some(25.3),
        humidity: Some(62.5),
        precipitation: Some(0.0),
        wind_speed: Some(15.2),
        wind_direction: Some(WindDirection::NW),
        pollution_index: Some(45.0),
        pollen_index: Some(3.2),
    }
}

#[test]
fn identify_round_trips() {
    let frame = ClientFrame::Identify(IdentifyFrame {
        zipcode: "90210".to_string(),
        city: "Beverly Hills".to_string(),
    });
    let line = frame.encode().unwrap();
    assert_eq!(line.last(), Some(&b'\n'));
    assert_eq!(parse_frame(&line).unwrap(), frame);
}

#[test]
fn metrics_round_trips() {
    let frame = ClientFrame::Metrics(MetricsFrame {
        data: sample_data(),
    });
    let line = frame.encode().unwrap();
    assert_eq!(parse_frame(&line).unwrap(), frame);
}

#[test]
fn keepalive_round_trips() {
    let line = ClientFrame::Keepalive.encode().unwrap();
    assert_eq!(parse_frame(&line).unwrap(), ClientFrame::Keepalive);
}

#[test]
fn unknown_type_is_a_typed_error() {
    let err = parse_frame(br#"{"type":"telemetry"}"#).unwrap_err();
    assert!(matches!(err, ProtocolError::UnknownType(t) if t == "telemetry"));
}

#[test]
fn garbage_is_invalid_json() {
    let err = parse_frame(b"not json at all").unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidJson(_)));
}

#[test]
fn identify_requires_zipcode_and_city() {
    let err = parse_frame(br#"{"type":"identify","city":"Springfield"}"#).unwrap_err();
    assert!(matches!(err, ProtocolError::MissingIdentityField("zipcode")));

    let err = parse_frame(br#"{"type":"identify","zipcode":"62704","city":""}"#).unwrap_err();
    assert!(matches!(err, ProtocolError::MissingIdentityField("city")));
}

#[test]
fn metrics_requires_rfc3339_timestamp() {
    let err = parse_frame(br#"{"type":"metrics","data":{}}"#).unwrap_err();
    assert!(matches!(err, ProtocolError::MissingTimestamp));

    let err = parse_frame(br#"{"type":"metrics","data":{"timestamp":"yesterday"}}"#).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidTimestamp { .. }));
}

#[test]
fn metrics_tolerates_absent_sensors_and_unknown_fields() {
    let line = br#"{"type":"metrics","data":{"timestamp":"2025-10-26T13:30:00Z","temperature":12.5,"firmware":"v2"},"trace":"abc"}"#;
    let frame = parse_frame(line).unwrap();
    let ClientFrame::Metrics(m) = frame else {
        panic!("expected metrics frame");
    };
    assert_eq!(m.data.temperature, Some(12.5));
    assert_eq!(m.data.humidity, None);
    assert_eq!(m.data.wind_direction, None);
}

#[test]
fn metrics_rejects_unknown_wind_direction() {
    let line =
        br#"{"type":"metrics","data":{"timestamp":"2025-10-26T13:30:00Z","wind_direction":"UP"}}"#;
    assert!(matches!(
        parse_frame(line).unwrap_err(),
        ProtocolError::InvalidJson(_)
    ));
}

#[test]
fn timestamp_parses_to_utc() {
    let data = sample_data();
    let ts = data.parse_timestamp().unwrap();
    assert_eq!(ts, Utc.with_ymd_and_hms(2025, 10, 26, 13, 30, 0).unwrap());
}

#[test]
fn metric_value_lookup_covers_all_channels() {
    let data = sample_data();
    assert_eq!(data.metric_value(MetricName::Temperature), Some(25.3));
    assert_eq!(data.metric_value(MetricName::Humidity), Some(62.5));
    assert_eq!(data.metric_value(MetricName::Precipitation), Some(0.0));
    assert_eq!(data.metric_value(MetricName::WindSpeed), Some(15.2));
    assert_eq!(data.metric_value(MetricName::PollutionIndex), Some(45.0));
    assert_eq!(data.metric_value(MetricName::PollenIndex), Some(3.2));
}

#[test]
fn ack_encodes_expected_wire_shape() {
    let line = encode_line(&Ack::new(AckStatus::Identified)).unwrap();
    let text = String::from_utf8(line).unwrap();
    assert_eq!(text, "{\"type\":\"ack\",\"status\":\"identified\"}\n");
}

#[test]
fn envelope_round_trips() {
    let envelope = MetricEnvelope {
        connection_id: "c-1".to_string(),
        zipcode: "90210".to_string(),
        city: "Beverly Hills".to_string(),
        received_at: Utc.with_ymd_and_hms(2025, 10, 26, 13, 30, 2).unwrap(),
        data: sample_data(),
    };
    let bytes = envelope.encode().unwrap();
    assert_eq!(MetricEnvelope::decode(&bytes).unwrap(), envelope);
}

#[test]
fn alarm_event_key_joins_location_and_metric() {
    let event = AlarmEvent {
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
    };
    assert_eq!(event.partition_key(), "90210-temperature");

    let bytes = event.encode().unwrap();
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains("\"type\":\"ALARM_TRIGGERED\""));
    assert_eq!(AlarmEvent::decode(&bytes).unwrap(), event);
}
