use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The rolling window a volume estimate covers. Each timeframe owns an
/// independent notification bucket.
///
/// # Examples
///
/// ```
/// use trendwatch_common::types::Timeframe;
///
/// let tf: Timeframe = "24h".parse().unwrap();
/// assert_eq!(tf, Timeframe::Long);
/// assert_eq!(tf.to_string(), "24h");
/// assert_eq!("SHORT".parse::<Timeframe>().unwrap(), Timeframe::Short);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Timeframe {
    #[serde(rename = "4h")]
    Short,
    #[serde(rename = "24h")]
    Long,
}

impl Timeframe {
    pub const ALL: [Timeframe; 2] = [Timeframe::Short, Timeframe::Long];

    /// Human-readable phrase used in alert messages.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Short => "past 4 hours",
            Timeframe::Long => "past 24 hours",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeframe::Short => write!(f, "4h"),
            Timeframe::Long => write!(f, "24h"),
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "4h" | "short" => Ok(Timeframe::Short),
            "24h" | "long" => Ok(Timeframe::Long),
            _ => Err(format!("unknown timeframe: {s}")),
        }
    }
}

/// One reading from a trend source. Not persisted; only its effect on the
/// notification store is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub keyword: String,
    /// Signed so that degenerate negative readings survive until the engine
    /// rejects them.
    pub volume: i64,
    pub timeframe: Timeframe,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        keyword: impl AsRef<str>,
        volume: i64,
        timeframe: Timeframe,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            keyword: keyword.as_ref().trim().to_string(),
            volume,
            timeframe,
            observed_at,
        }
    }

    pub fn is_signal(&self) -> bool {
        is_signal(&self.keyword, self.volume)
    }
}

/// A zero or negative volume, or an empty keyword, carries no signal.
/// `keyword` is expected to be trimmed already.
pub fn is_signal(keyword: &str, volume: i64) -> bool {
    !keyword.is_empty() && volume > 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Volume reached the threshold with no prior record in the bucket.
    FirstCrossing,
    /// Volume grew past the escalation ratio over the last alerted volume.
    Escalation,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::FirstCrossing => write!(f, "first_crossing"),
            AlertKind::Escalation => write!(f, "escalation"),
        }
    }
}

/// Outbound payload for an accepted decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TrendAlert {
    pub keyword: String,
    pub volume: u64,
    pub timeframe: Timeframe,
    pub region: String,
    pub kind: AlertKind,
    /// Last alerted volume, set for escalations.
    pub previous_volume: Option<u64>,
    pub triggered_at: DateTime<Utc>,
}

/// Format a volume with thousands separators.
///
/// # Examples
///
/// ```
/// use trendwatch_common::types::format_volume;
///
/// assert_eq!(format_volume(0), "0");
/// assert_eq!(format_volume(999), "999");
/// assert_eq!(format_volume(1_200_000), "1,200,000");
/// ```
pub fn format_volume(volume: u64) -> String {
    let digits = volume.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
