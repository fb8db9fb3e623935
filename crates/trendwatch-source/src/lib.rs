//! Trend sources supply trending keywords and their estimated search
//! volume for a timeframe.
//!
//! Exactly one [`TrendSource`] is active per deployment.
//! [`http::HttpTrendSource`] talks to a JSON trends endpoint;
//! [`fixed::StaticTrendSource`] returns configured data and exists for
//! tests and demos only.

pub mod error;
pub mod fixed;
pub mod http;

pub use error::SourceError;
pub use fixed::StaticTrendSource;
pub use http::{HttpTrendSource, VolumeScale};

use async_trait::async_trait;
use trendwatch_common::types::Timeframe;

/// Provider of trending keywords and volume estimates.
///
/// Implementations may be slow or unreliable; callers wrap every call in a
/// timeout and treat errors as a skipped observation.
#[async_trait]
pub trait TrendSource: Send + Sync {
    /// Returns the source name (e.g., `"http"`, `"static"`), used for
    /// logging and the status API.
    fn name(&self) -> &str;

    /// Currently trending keywords for `region`, most popular first.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream call fails or yields no keywords.
    async fn trending_keywords(&self, region: &str) -> error::Result<Vec<String>>;

    /// Estimated search volume of `keyword` over `timeframe`. Zero means
    /// the source had no data for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream call fails.
    async fn volume(&self, keyword: &str, timeframe: Timeframe, region: &str)
        -> error::Result<i64>;
}
