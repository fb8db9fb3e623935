use crate::policy::AlertPolicy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use trendwatch_common::types::{is_signal, Observation, Timeframe};
use trendwatch_storage::{NotificationStateStore, NotificationStore};
use utoipa::ToSchema;

/// Outcome of evaluating one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Empty keyword or non-positive volume.
    NoSignal,
    /// No record in the bucket and volume below the threshold.
    BelowThreshold,
    /// No record in the bucket and volume at or above the threshold.
    FirstCrossing,
    /// Volume grew past the escalation ratio over `previous`.
    Escalation { previous: u64 },
    /// A record exists but the volume has not grown enough.
    InsufficientGrowth { last_notified: u64 },
}

impl Decision {
    pub fn should_notify(&self) -> bool {
        matches!(self, Decision::FirstCrossing | Decision::Escalation { .. })
    }
}

/// Decision engine owning the notification store.
///
/// The store is the only record of what was already notified. It is
/// loaded once at construction and written through the backend after every
/// accepted decision and every retention reset.
pub struct AlertEngine {
    policy: AlertPolicy,
    backend: Box<dyn NotificationStateStore>,
    store: NotificationStore,
    last_persist_error: Option<String>,
}

impl AlertEngine {
    pub fn new(policy: AlertPolicy, backend: Box<dyn NotificationStateStore>) -> Self {
        let loaded = backend.load(Utc::now());
        tracing::info!(
            backend = %backend.describe(),
            threshold = policy.threshold,
            escalation_bps = policy.escalation_bps,
            retention_days = policy.retention.map(|r| r.num_days()),
            entries = loaded.store.len(),
            "Alert engine initialized"
        );
        let mut engine = Self {
            policy,
            backend,
            store: loaded.store,
            last_persist_error: None,
        };
        // Pin the defaulted reset stamp so restarts do not keep pushing the
        // retention window forward.
        if loaded.reset_defaulted {
            tracing::info!(
                last_reset_at = %engine.store.last_reset_at,
                "Notification state had no reset timestamp, stamping it"
            );
            engine.persist();
        }
        engine
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    pub fn snapshot(&self) -> NotificationStore {
        self.store.clone()
    }

    pub fn backend_description(&self) -> String {
        self.backend.describe()
    }

    /// Message of the most recent failed save, cleared by the next success.
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    /// Decide whether `(keyword, volume, timeframe)` should be notified now,
    /// recording it when it should.
    pub fn should_notify(&mut self, keyword: &str, volume: i64, timeframe: Timeframe) -> bool {
        let observation = Observation::new(keyword, volume, timeframe, Utc::now());
        self.evaluate(&observation).should_notify()
    }

    /// Apply the retention reset if due, then the decision rules. The store
    /// is mutated and persisted only for `FirstCrossing` and `Escalation`.
    pub fn evaluate(&mut self, observation: &Observation) -> Decision {
        self.reset_if_due(observation.observed_at);

        let decision = decide(
            &self.policy,
            &self.store,
            &observation.keyword,
            observation.volume,
            observation.timeframe,
        );

        match decision {
            Decision::FirstCrossing | Decision::Escalation { .. } => {
                // decide() only accepts positive volumes
                let volume = observation.volume.unsigned_abs();
                self.store
                    .record(observation.timeframe, &observation.keyword, volume);
                self.persist();
                tracing::info!(
                    keyword = %observation.keyword,
                    timeframe = %observation.timeframe,
                    volume,
                    ?decision,
                    "Notification accepted"
                );
            }
            _ => {
                tracing::debug!(
                    keyword = %observation.keyword,
                    timeframe = %observation.timeframe,
                    volume = observation.volume,
                    ?decision,
                    "Notification suppressed"
                );
            }
        }

        decision
    }

    /// Read-only variant of [`evaluate`](Self::evaluate) for inspection.
    /// If the retention window has elapsed at `now`, the store is treated
    /// as already cleared.
    pub fn preview(
        &self,
        keyword: &str,
        volume: i64,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Decision {
        let keyword = keyword.trim();
        if self.policy.reset_due(self.store.last_reset_at, now) {
            let cleared = NotificationStore::empty(now);
            return decide(&self.policy, &cleared, keyword, volume, timeframe);
        }
        decide(&self.policy, &self.store, keyword, volume, timeframe)
    }

    /// Clear both buckets unconditionally.
    pub fn force_reset(&mut self, now: DateTime<Utc>) {
        let dropped = self.store.len();
        self.store.clear(now);
        self.persist();
        tracing::info!(dropped, "Notification state reset");
    }

    fn reset_if_due(&mut self, now: DateTime<Utc>) {
        if self.policy.reset_due(self.store.last_reset_at, now) {
            tracing::info!(
                last_reset_at = %self.store.last_reset_at,
                "Retention window elapsed"
            );
            self.force_reset(now);
        }
    }

    fn persist(&mut self) {
        match self.backend.save(&self.store) {
            Ok(()) => self.last_persist_error = None,
            Err(e) => {
                tracing::error!(
                    backend = %self.backend.describe(),
                    error = %e,
                    "Failed to persist notification state"
                );
                self.last_persist_error = Some(e.to_string());
            }
        }
    }
}

fn decide(
    policy: &AlertPolicy,
    store: &NotificationStore,
    keyword: &str,
    volume: i64,
    timeframe: Timeframe,
) -> Decision {
    if !is_signal(keyword, volume) {
        return Decision::NoSignal;
    }
    let volume = volume.unsigned_abs();

    match store.last_notified(timeframe, keyword) {
        None if policy.crosses_threshold(volume) => Decision::FirstCrossing,
        None => Decision::BelowThreshold,
        Some(previous) if policy.is_escalation(previous, volume) => {
            Decision::Escalation { previous }
        }
        Some(last_notified) => Decision::InsufficientGrowth { last_notified },
    }
}
