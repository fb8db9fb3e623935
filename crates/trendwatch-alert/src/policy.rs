use chrono::{DateTime, Duration, Utc};

/// Basis points in 100%.
const BPS_SCALE: u128 = 10_000;

pub const DEFAULT_THRESHOLD: u64 = 1_000_000;
pub const DEFAULT_ESCALATION_RATIO: f64 = 0.10;
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Numeric knobs of the decision engine.
///
/// The escalation ratio is held in basis points so the comparison at
/// decision time is exact integer arithmetic:
/// `volume * 10_000 > last_notified * (10_000 + escalation_bps)`.
///
/// # Examples
///
/// ```
/// use trendwatch_alert::AlertPolicy;
///
/// let policy = AlertPolicy::new(1_000_000, 0.10, Some(7));
/// assert!(!policy.is_escalation(100_000, 110_000));
/// assert!(policy.is_escalation(100_000, 110_001));
/// assert!(policy.crosses_threshold(1_000_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertPolicy {
    pub threshold: u64,
    pub escalation_bps: u32,
    /// `None` disables the periodic reset.
    pub retention: Option<Duration>,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_THRESHOLD,
            DEFAULT_ESCALATION_RATIO,
            Some(DEFAULT_RETENTION_DAYS),
        )
    }
}

impl AlertPolicy {
    /// `escalation_ratio` is rounded to the nearest basis point; negative
    /// ratios clamp to zero. A retention of `Some(0)` disables resets.
    pub fn new(threshold: u64, escalation_ratio: f64, retention_days: Option<u32>) -> Self {
        let bps = (escalation_ratio.max(0.0) * BPS_SCALE as f64).round();
        Self {
            threshold,
            escalation_bps: bps.min(u32::MAX as f64) as u32,
            retention: retention_days
                .filter(|days| *days > 0)
                .map(|days| Duration::days(i64::from(days))),
        }
    }

    pub fn escalation_ratio(&self) -> f64 {
        f64::from(self.escalation_bps) / BPS_SCALE as f64
    }

    /// Inclusive threshold check.
    pub fn crosses_threshold(&self, volume: u64) -> bool {
        volume >= self.threshold
    }

    /// Strictly greater than `last_notified * (1 + ratio)`.
    pub fn is_escalation(&self, last_notified: u64, volume: u64) -> bool {
        u128::from(volume) * BPS_SCALE
            > u128::from(last_notified) * (BPS_SCALE + u128::from(self.escalation_bps))
    }

    /// Whether the retention window starting at `last_reset_at` has elapsed.
    pub fn reset_due(&self, last_reset_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.retention
            .is_some_and(|retention| now - last_reset_at >= retention)
    }
}
