use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rdkafka::message::OwnedMessage;
use rdkafka::Timestamp;
use skywatch_protocol::{MetricData, MetricEnvelope};
use skywatch_storage::{LocationRow, NewRawMetric, SampleStore, StorageError};

use crate::batch_writer::flush_batch;
use crate::consumer::Committer;
use crate::producer::{partition_for_key, Compression, ProducerConfig, RequiredAcks};
use crate::QueueError;

#[test]
fn compression_parses_all_codecs() {
    for (name, codec) in [
        ("none", Compression::None),
        ("snappy", Compression::Snappy),
        ("lz4", Compression::Lz4),
        ("gzip", Compression::Gzip),
        ("zstd", Compression::Zstd),
    ] {
        assert_eq!(name.parse::<Compression>(), Ok(codec));
        assert_eq!(codec.as_str(), name);
    }
    assert!("brotli".parse::<Compression>().is_err());
}

#[test]
fn acks_map_to_broker_levels() {
    assert_eq!("none".parse::<RequiredAcks>(), Ok(RequiredAcks::None));
    assert_eq!("leader".parse::<RequiredAcks>(), Ok(RequiredAcks::Leader));
    assert_eq!("all".parse::<RequiredAcks>(), Ok(RequiredAcks::All));
    assert_eq!(RequiredAcks::None.as_config_value(), "0");
    assert_eq!(RequiredAcks::Leader.as_config_value(), "1");
    assert_eq!(RequiredAcks::All.as_config_value(), "all");
}

#[test]
fn producer_config_maps_to_client_properties() {
    let mut config = ProducerConfig::new("broker-1:9092", "weather.metrics.raw");
    config.batch_size = 250;
    config.batch_timeout = Duration::from_millis(50);
    config.compression = Compression::Zstd;
    config.required_acks = RequiredAcks::All;
    config.max_attempts = 7;

    let client = config.client_config();
    assert_eq!(client.get("bootstrap.servers"), Some("broker-1:9092"));
    assert_eq!(client.get("batch.num.messages"), Some("250"));
    assert_eq!(client.get("linger.ms"), Some("50"));
    assert_eq!(client.get("compression.codec"), Some("zstd"));
    assert_eq!(client.get("acks"), Some("all"));
    assert_eq!(client.get("message.send.max.retries"), Some("7"));
}

#[test]
fn equal_keys_land_on_the_same_partition() {
    let a = partition_for_key("90210", 10);
    let b = partition_for_key("90210", 10);
    assert_eq!(a, b);
    assert!(a < 10);

    // Distinct stations spread over the partition space.
    let partitions: std::collections::HashSet<u32> = (0..100)
        .map(|i| partition_for_key(&format!("zip-{i}"), 10))
        .collect();
    assert!(partitions.len() > 1);
}

// --- flush_batch -----------------------------------------------------------

#[derive(Default)]
struct MockStore {
    locations: Mutex<Vec<(String, String)>>,
    inserted: Mutex<Vec<NewRawMetric>>,
    fail_zipcode: Option<String>,
}

#[async_trait]
impl SampleStore for MockStore {
    async fn get_location(&self, zipcode: &str) -> Result<Option<LocationRow>, StorageError> {
        let known = self
            .locations
            .lock()
            .unwrap()
            .iter()
            .any(|(zip, _)| zip == zipcode);
        Ok(known.then(|| LocationRow {
            zipcode: zipcode.to_string(),
            city_name: "cached".to_string(),
            lat: None,
            lon: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }))
    }

    async fn upsert_location(&self, zipcode: &str, city: &str) -> Result<(), StorageError> {
        self.locations
            .lock()
            .unwrap()
            .push((zipcode.to_string(), city.to_string()));
        Ok(())
    }

    async fn insert_raw_metric(&self, row: &NewRawMetric) -> Result<bool, StorageError> {
        if self.fail_zipcode.as_deref() == Some(row.zipcode.as_str()) {
            return Err(StorageError::NotFound {
                entity: "database",
                id: "down".to_string(),
            });
        }
        let mut inserted = self.inserted.lock().unwrap();
        let duplicate = inserted.iter().any(|r| {
            r.zipcode == row.zipcode
                && r.timestamp == row.timestamp
                && r.connection_id == row.connection_id
        });
        if duplicate {
            return Ok(false);
        }
        inserted.push(row.clone());
        Ok(true)
    }
}

#[derive(Default)]
struct MockCommitter {
    offsets: Mutex<Vec<i64>>,
}

impl Committer for MockCommitter {
    fn commit(&self, msg: &OwnedMessage) -> Result<(), QueueError> {
        use rdkafka::message::Message;
        self.offsets.lock().unwrap().push(msg.offset());
        Ok(())
    }
}

fn envelope(zipcode: &str, minute: u32) -> MetricEnvelope {
    MetricEnvelope {
        connection_id: "conn-1".to_string(),
        zipcode: zipcode.to_string(),
        city: "Testville".to_string(),
        received_at: Utc.with_ymd_and_hms(2025, 10, 26, 13, minute, 2).unwrap(),
        data: MetricData {
            timestamp: format!("2025-10-26T13:{minute:02}:00Z"),
            temperature: Some(21.0),
            ..Default::default()
        },
    }
}

fn record(offset: i64, envelope: &MetricEnvelope) -> OwnedMessage {
    OwnedMessage::new(
        Some(envelope.encode().unwrap()),
        Some(envelope.zipcode.clone().into_bytes()),
        "weather.metrics.raw".to_string(),
        Timestamp::NotAvailable,
        0,
        offset,
        None,
    )
}

#[tokio::test]
async fn flush_commits_only_after_successful_insert() {
    let store = MockStore::default();
    let committer = MockCommitter::default();

    let batch = vec![
        record(10, &envelope("90210", 0)),
        record(11, &envelope("90210", 5)),
    ];
    flush_batch(&store, &committer, batch).await;

    assert_eq!(store.inserted.lock().unwrap().len(), 2);
    assert_eq!(committer.offsets.lock().unwrap().clone(), vec![10, 11]);
}

#[tokio::test]
async fn failed_insert_leaves_offset_uncommitted() {
    let store = MockStore {
        fail_zipcode: Some("10001".to_string()),
        ..Default::default()
    };
    let committer = MockCommitter::default();

    let batch = vec![
        record(20, &envelope("90210", 0)),
        record(21, &envelope("10001", 0)),
        record(22, &envelope("90210", 5)),
    ];
    flush_batch(&store, &committer, batch).await;

    // Offset 21 is skipped; the record will be redelivered.
    assert_eq!(committer.offsets.lock().unwrap().clone(), vec![20, 22]);
}

#[tokio::test]
async fn undecodable_record_is_not_committed() {
    let store = MockStore::default();
    let committer = MockCommitter::default();

    let poison = OwnedMessage::new(
        Some(b"{not json".to_vec()),
        None,
        "weather.metrics.raw".to_string(),
        Timestamp::NotAvailable,
        0,
        30,
        None,
    );
    flush_batch(&store, &committer, vec![poison]).await;

    assert!(store.inserted.lock().unwrap().is_empty());
    assert!(committer.offsets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn redelivered_record_is_idempotent_and_committed() {
    let store = MockStore::default();
    let committer = MockCommitter::default();

    let sample = envelope("90210", 0);
    flush_batch(&store, &committer, vec![record(40, &sample)]).await;
    flush_batch(&store, &committer, vec![record(40, &sample)]).await;

    // One logical row, but both deliveries commit.
    assert_eq!(store.inserted.lock().unwrap().len(), 1);
    assert_eq!(committer.offsets.lock().unwrap().clone(), vec![40, 40]);
}

#[tokio::test]
async fn location_is_created_once_on_first_sight() {
    let store = MockStore::default();
    let committer = MockCommitter::default();

    let batch = vec![
        record(50, &envelope("90210", 0)),
        record(51, &envelope("90210", 5)),
        record(52, &envelope("10001", 0)),
    ];
    flush_batch(&store, &committer, batch).await;

    let locations = store.locations.lock().unwrap().clone();
    assert_eq!(locations.len(), 2);
    assert!(locations.contains(&("90210".to_string(), "Testville".to_string())));
    assert!(locations.contains(&("10001".to_string(), "Testville".to_string())));
}
