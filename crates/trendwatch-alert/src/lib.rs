//! Alert decision engine for trending keywords.
//!
//! [`engine::AlertEngine`] decides, per `(timeframe, keyword)` bucket,
//! whether an observed volume warrants a notification: the first time it
//! reaches the threshold, and again each time it grows past the escalation
//! ratio over the last alerted volume. The engine owns the
//! [`trendwatch_storage::NotificationStore`] and persists it after every
//! accepted decision. Both buckets are cleared once per retention window.

pub mod engine;
pub mod policy;

#[cfg(test)]
mod tests;

pub use engine::{AlertEngine, Decision};
pub use policy::AlertPolicy;
