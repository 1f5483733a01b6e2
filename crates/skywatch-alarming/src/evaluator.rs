use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use skywatch_common::types::MetricName;
use skywatch_protocol::{AlarmEvent, AlarmEventKind, MetricEnvelope};
use skywatch_queue::Publisher;
use skywatch_storage::{AlarmStore, NewAlarmLog, ThresholdRow};
use tokio::sync::Mutex;

use crate::error::AlarmError;
use crate::state::{AlarmPhase, AlarmState, StateStore};

/// Threshold comparison operator, as stored in `alarm_thresholds.operator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            CompareOp::GreaterThan => value > threshold,
            CompareOp::LessThan => value < threshold,
            CompareOp::GreaterEqual => value >= threshold,
            CompareOp::LessEqual => value <= threshold,
        }
    }
}

impl std::str::FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(CompareOp::GreaterThan),
            "<" => Ok(CompareOp::LessThan),
            ">=" => Ok(CompareOp::GreaterEqual),
            "<=" => Ok(CompareOp::LessEqual),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareOp::GreaterThan => f.write_str(">"),
            CompareOp::LessThan => f.write_str("<"),
            CompareOp::GreaterEqual => f.write_str(">="),
            CompareOp::LessEqual => f.write_str("<="),
        }
    }
}

/// What one sample does to the state machine of one (location, metric) pair.
#[derive(Debug, PartialEq)]
pub(crate) enum Action {
    /// No state and no breach, or an active alarm still breaching with
    /// nothing to refresh beyond bookkeeping.
    Ignore,
    /// First breaching sample: open a PENDING window.
    BeginPending(AlarmState),
    /// Still breaching inside the duration window.
    UpdatePending(AlarmState),
    /// Breach has lasted the configured duration: fire the alarm.
    Trigger(AlarmState),
    /// Breach ended before the duration elapsed; transient, no effects.
    DropPending,
    /// Active alarm still breaching: refresh the bookkeeping stamp.
    RefreshActive(AlarmState),
    /// Active alarm stopped breaching: close it.
    Clear(AlarmState),
}

/// Pure transition table of the three-phase machine. `state` is `None` for
/// CLEAR. Duration is compared against wall time elapsed since the first
/// breaching sample.
pub(crate) fn decide(
    state: Option<AlarmState>,
    breached: bool,
    value: f64,
    now: DateTime<Utc>,
    duration: chrono::Duration,
) -> Action {
    match (state, breached) {
        (None, false) => Action::Ignore,
        (None, true) => Action::BeginPending(AlarmState {
            phase: AlarmPhase::Pending,
            breach_start: now,
            last_checked: now,
            last_value: value,
            alarm_id: None,
        }),
        (Some(state), true) => match state.phase {
            AlarmPhase::Pending => {
                if now - state.breach_start >= duration {
                    Action::Trigger(AlarmState {
                        last_checked: now,
                        last_value: value,
                        ..state
                    })
                } else {
                    Action::UpdatePending(AlarmState {
                        last_checked: now,
                        last_value: value,
                        ..state
                    })
                }
            }
            AlarmPhase::Active => Action::RefreshActive(AlarmState {
                last_checked: now,
                ..state
            }),
        },
        (Some(state), false) => match state.phase {
            AlarmPhase::Pending => Action::DropPending,
            AlarmPhase::Active => Action::Clear(state),
        },
    }
}

struct CachedThresholds {
    loaded_at: Instant,
    thresholds: Arc<Vec<ThresholdRow>>,
}

/// Evaluates raw samples against the thresholds configured for their
/// location and drives alarm transitions.
///
/// Thresholds are cached per location with an individual freshness stamp;
/// a miss for one zipcode never refreshes or staleness-checks another.
pub struct Evaluator {
    store: Arc<dyn AlarmStore>,
    states: Arc<dyn StateStore>,
    events: Arc<dyn Publisher>,
    cache: Mutex<HashMap<String, CachedThresholds>>,
    cache_ttl: Duration,
}

impl Evaluator {
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

    pub fn new(
        store: Arc<dyn AlarmStore>,
        states: Arc<dyn StateStore>,
        events: Arc<dyn Publisher>,
    ) -> Self {
        Self::with_cache_ttl(store, states, events, Self::DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(
        store: Arc<dyn AlarmStore>,
        states: Arc<dyn StateStore>,
        events: Arc<dyn Publisher>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            states,
            events,
            cache: Mutex::new(HashMap::new()),
            cache_ttl,
        }
    }

    /// Evaluate every active threshold for the sample's location. Storage
    /// failures propagate so the caller does not commit the sample's offset.
    pub async fn evaluate(&self, envelope: &MetricEnvelope) -> Result<(), AlarmError> {
        let thresholds = self.thresholds_for(&envelope.zipcode).await?;

        for threshold in thresholds.iter() {
            let Some(value) = envelope.data.metric_value(threshold.metric_name) else {
                continue;
            };
            self.evaluate_threshold(envelope, threshold, value).await?;
        }
        Ok(())
    }

    async fn evaluate_threshold(
        &self,
        envelope: &MetricEnvelope,
        threshold: &ThresholdRow,
        value: f64,
    ) -> Result<(), AlarmError> {
        let metric = threshold.metric_name;
        let zipcode = envelope.zipcode.as_str();

        let op: CompareOp = match threshold.operator.parse() {
            Ok(op) => op,
            Err(_) => {
                tracing::warn!(
                    zipcode,
                    metric = %metric,
                    operator = %threshold.operator,
                    "threshold has an unknown operator, skipping"
                );
                return Ok(());
            }
        };
        let breached = op.check(value, threshold.threshold_value);

        // A dead state store degrades to CLEAR: better to re-run the duration
        // window than to stall the partition.
        let state = match self.states.get(zipcode, metric).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(zipcode, metric = %metric, error = %e, "state store read failed, assuming CLEAR");
                None
            }
        };

        let now = Utc::now();
        let duration = chrono::Duration::minutes(i64::from(threshold.duration_minutes));

        match decide(state, breached, value, now, duration) {
            Action::Ignore => {}
            Action::BeginPending(next) | Action::UpdatePending(next) => {
                self.store_state(zipcode, metric, &next).await;
            }
            Action::Trigger(mut next) => {
                let alarm_id = self.trigger_alarm(envelope, threshold, value, &next).await?;
                next.phase = AlarmPhase::Active;
                next.alarm_id = Some(alarm_id);
                self.store_state(zipcode, metric, &next).await;
                self.publish_event(self.triggered_event(envelope, threshold, value, &next, alarm_id))
                    .await;
            }
            Action::DropPending => {
                self.drop_state(zipcode, metric).await;
            }
            Action::RefreshActive(next) => {
                self.store_state(zipcode, metric, &next).await;
            }
            Action::Clear(state) => {
                if let Some(alarm_id) = state.alarm_id {
                    self.store.mark_alarm_cleared(alarm_id, now).await?;
                } else {
                    tracing::warn!(zipcode, metric = %metric, "clearing alarm with no audit row id");
                }
                self.drop_state(zipcode, metric).await;
                self.publish_event(self.cleared_event(envelope, threshold, &state))
                    .await;
            }
        }
        Ok(())
    }

    async fn trigger_alarm(
        &self,
        envelope: &MetricEnvelope,
        threshold: &ThresholdRow,
        value: f64,
        state: &AlarmState,
    ) -> Result<i64, AlarmError> {
        tracing::warn!(
            zipcode = %envelope.zipcode,
            city = %envelope.city,
            metric = %threshold.metric_name,
            value,
            threshold = threshold.threshold_value,
            "alarm triggered"
        );
        let row = NewAlarmLog {
            zipcode: envelope.zipcode.clone(),
            metric_name: threshold.metric_name,
            breach_value: value,
            threshold_config: serde_json::to_string(threshold)?,
            start_time: state.breach_start,
        };
        Ok(self.store.insert_alarm_log(&row).await?)
    }

    fn triggered_event(
        &self,
        envelope: &MetricEnvelope,
        threshold: &ThresholdRow,
        value: f64,
        state: &AlarmState,
        alarm_id: i64,
    ) -> AlarmEvent {
        AlarmEvent {
            kind: AlarmEventKind::Triggered,
            zipcode: envelope.zipcode.clone(),
            city: envelope.city.clone(),
            metric: threshold.metric_name,
            value: Some(value),
            threshold: threshold.threshold_value,
            operator: threshold.operator.clone(),
            duration_minutes: threshold.duration_minutes,
            start_time: state.breach_start,
            alarm_id: Some(alarm_id),
        }
    }

    fn cleared_event(
        &self,
        envelope: &MetricEnvelope,
        threshold: &ThresholdRow,
        state: &AlarmState,
    ) -> AlarmEvent {
        tracing::info!(
            zipcode = %envelope.zipcode,
            city = %envelope.city,
            metric = %threshold.metric_name,
            "alarm cleared"
        );
        AlarmEvent {
            kind: AlarmEventKind::Cleared,
            zipcode: envelope.zipcode.clone(),
            city: envelope.city.clone(),
            metric: threshold.metric_name,
            value: None,
            threshold: threshold.threshold_value,
            operator: threshold.operator.clone(),
            duration_minutes: threshold.duration_minutes,
            start_time: state.breach_start,
            alarm_id: state.alarm_id,
        }
    }

    /// State-store writes are best-effort: a lost write costs one duration
    /// window, never a stalled partition.
    async fn store_state(&self, zipcode: &str, metric: MetricName, state: &AlarmState) {
        if let Err(e) = self.states.set(zipcode, metric, state).await {
            tracing::warn!(zipcode, metric = %metric, error = %e, "state store write failed");
        }
    }

    async fn drop_state(&self, zipcode: &str, metric: MetricName) {
        if let Err(e) = self.states.delete(zipcode, metric).await {
            tracing::warn!(zipcode, metric = %metric, error = %e, "state store delete failed");
        }
    }

    /// Alarm events follow the at-most-once contract of the ingress edge:
    /// a failed publish is logged, not retried through redelivery.
    async fn publish_event(&self, event: AlarmEvent) {
        let key = event.partition_key();
        match event.encode() {
            Ok(bytes) => {
                if let Err(e) = self.events.publish(&key, bytes).await {
                    tracing::error!(key = %key, error = %e, "failed to publish alarm event");
                }
            }
            Err(e) => tracing::error!(key = %key, error = %e, "failed to encode alarm event"),
        }
    }

    async fn thresholds_for(&self, zipcode: &str) -> Result<Arc<Vec<ThresholdRow>>, AlarmError> {
        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.get(zipcode) {
            if entry.loaded_at.elapsed() < self.cache_ttl {
                return Ok(entry.thresholds.clone());
            }
        }

        let thresholds = Arc::new(self.store.active_thresholds(zipcode).await?);
        cache.insert(
            zipcode.to_string(),
            CachedThresholds {
                loaded_at: Instant::now(),
                thresholds: thresholds.clone(),
            },
        );
        Ok(thresholds)
    }
}
