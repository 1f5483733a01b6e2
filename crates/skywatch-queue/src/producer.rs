use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::error::QueueError;
use crate::Publisher;

/// On-the-wire compression for record batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    #[default]
    Snappy,
    Lz4,
    Gzip,
    Zstd,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            "snappy" => Ok(Compression::Snappy),
            "lz4" => Ok(Compression::Lz4),
            "gzip" => Ok(Compression::Gzip),
            "zstd" => Ok(Compression::Zstd),
            _ => Err(format!("unknown compression codec: {s}")),
        }
    }
}

/// Broker durability level a synchronous publish waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequiredAcks {
    None,
    #[default]
    Leader,
    All,
}

impl RequiredAcks {
    /// The librdkafka `acks` property value.
    pub fn as_config_value(&self) -> &'static str {
        match self {
            RequiredAcks::None => "0",
            RequiredAcks::Leader => "1",
            RequiredAcks::All => "all",
        }
    }
}

impl std::str::FromStr for RequiredAcks {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RequiredAcks::None),
            "leader" => Ok(RequiredAcks::Leader),
            "all" => Ok(RequiredAcks::All),
            _ => Err(format!("unknown acks level: {s}")),
        }
    }
}

/// Producer tuning. The defaults batch up to 100 records or 100 ms
/// (whichever comes first), compress with snappy and publish asynchronously
/// with leader acks.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub brokers: String,
    pub topic: String,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub batch_bytes: usize,
    pub compression: Compression,
    pub async_publish: bool,
    pub max_attempts: u32,
    pub required_acks: RequiredAcks,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl ProducerConfig {
    pub fn new(brokers: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            topic: topic.into(),
            batch_size: 100,
            batch_timeout: Duration::from_millis(100),
            batch_bytes: 1024 * 1024,
            compression: Compression::Snappy,
            async_publish: true,
            max_attempts: 3,
            required_acks: RequiredAcks::Leader,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
        }
    }

    pub(crate) fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("batch.num.messages", self.batch_size.to_string())
            .set("linger.ms", self.batch_timeout.as_millis().to_string())
            .set("batch.size", self.batch_bytes.to_string())
            .set("compression.codec", self.compression.as_str())
            .set("acks", self.required_acks.as_config_value())
            .set("message.send.max.retries", self.max_attempts.to_string())
            .set("socket.timeout.ms", self.read_timeout.as_millis().to_string())
            .set(
                "request.timeout.ms",
                self.write_timeout.as_millis().to_string(),
            );
        config
    }
}

/// Keyed producer for one topic. Records with equal keys hash to the same
/// partition and stay totally ordered there.
pub struct Producer {
    inner: FutureProducer,
    config: ProducerConfig,
}

impl Producer {
    pub fn new(config: ProducerConfig) -> Result<Self, QueueError> {
        let inner = config.client_config().create()?;
        Ok(Self { inner, config })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }
}

/// The partition a key hashes to under the broker's CRC32 key balancer.
/// Diagnostic aid; the broker applies the same mapping.
pub fn partition_for_key(key: &str, partitions: u32) -> u32 {
    crc32(key.as_bytes()) % partitions.max(1)
}

fn crc32(data: &[u8]) -> u32 {
    let mut hash: u32 = 0xFFFF_FFFF;
    for byte in data {
        hash ^= *byte as u32;
        for _ in 0..8 {
            if hash & 1 != 0 {
                hash = (hash >> 1) ^ 0xEDB8_8320;
            } else {
                hash >>= 1;
            }
        }
    }
    !hash
}

#[async_trait]
impl Publisher for Producer {
    /// Publish one record. In async mode only enqueue failures surface here;
    /// delivery failures are logged from a watcher task. In sync mode the
    /// call waits for the configured broker durability level.
    async fn publish(&self, key: &str, value: Vec<u8>) -> Result<(), QueueError> {
        let record = FutureRecord::to(&self.config.topic).key(key).payload(&value);

        if self.config.async_publish {
            let delivery = self
                .inner
                .send_result(record)
                .map_err(|(err, _record)| QueueError::Kafka(err))?;
            let topic = self.config.topic.clone();
            tokio::spawn(async move {
                match delivery.await {
                    Ok(Err((err, _))) => {
                        tracing::error!(topic = %topic, error = %err, "async delivery failed");
                    }
                    Err(_cancelled) => {
                        tracing::warn!(topic = %topic, "producer dropped before delivery");
                    }
                    Ok(Ok(_)) => {}
                }
            });
            Ok(())
        } else {
            self.inner
                .send(record, Timeout::After(self.config.write_timeout))
                .await
                .map_err(|(err, _message)| QueueError::Kafka(err))?;
            Ok(())
        }
    }
}
