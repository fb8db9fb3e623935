use crate::error::{Result, SourceError};
use crate::TrendSource;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use trendwatch_common::types::Timeframe;

/// Multipliers turning a peak relative-interest score (0..=100) into an
/// estimated absolute search volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeScale {
    pub short: i64,
    pub long: i64,
}

impl Default for VolumeScale {
    fn default() -> Self {
        Self {
            short: 25_000,
            long: 100_000,
        }
    }
}

impl VolumeScale {
    pub fn for_timeframe(&self, timeframe: Timeframe) -> i64 {
        match timeframe {
            Timeframe::Short => self.short,
            Timeframe::Long => self.long,
        }
    }
}

#[derive(Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Deserialize)]
struct InterestResponse {
    #[serde(default)]
    points: Vec<i64>,
}

/// Query window name understood by the trends endpoint.
fn window_param(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::Short => "now 4-H",
        Timeframe::Long => "now 1-d",
    }
}

/// Trend source backed by a JSON trends endpoint.
///
/// - `GET {base_url}/trending?geo=US` answers `{"keywords": [...]}`
/// - `GET {base_url}/interest?keyword=K&timeframe=now 4-H&geo=US` answers
///   `{"points": [..]}`, the relative interest over the window
pub struct HttpTrendSource {
    client: reqwest::Client,
    base_url: String,
    scale: VolumeScale,
}

impl HttpTrendSource {
    pub fn new(base_url: &str, timeout: Duration, scale: VolumeScale) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("trendwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            scale,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let endpoint = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&endpoint).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Decode {
            endpoint,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl TrendSource for HttpTrendSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn trending_keywords(&self, region: &str) -> Result<Vec<String>> {
        let resp: TrendingResponse = self.get_json("/trending", &[("geo", region)]).await?;
        let keywords: Vec<String> = resp
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return Err(SourceError::Empty(format!("no trending keywords for {region}")));
        }
        tracing::debug!(count = keywords.len(), region, "Fetched trending keywords");
        Ok(keywords)
    }

    async fn volume(&self, keyword: &str, timeframe: Timeframe, region: &str) -> Result<i64> {
        let resp: InterestResponse = self
            .get_json(
                "/interest",
                &[
                    ("keyword", keyword),
                    ("timeframe", window_param(timeframe)),
                    ("geo", region),
                ],
            )
            .await?;

        let Some(peak) = resp.points.iter().copied().max() else {
            tracing::debug!(keyword, %timeframe, "No interest data");
            return Ok(0);
        };
        Ok(peak.saturating_mul(self.scale.for_timeframe(timeframe)))
    }
}
