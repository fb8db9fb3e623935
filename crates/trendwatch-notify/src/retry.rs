use crate::error::NotifyError;
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::SendResponse;
use serde_json::Value;
use std::time::Duration;

/// Bounded retry with exponential backoff: the delay before attempt `n + 1`
/// is `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Shared knobs handed to channel plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub retry: RetryPolicy,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl DeliveryOptions {
    pub fn build_client(&self) -> crate::error::Result<reqwest::Client> {
        Ok(reqwest::Client::builder().timeout(self.timeout).build()?)
    }
}

/// POST `payload` to `url` until `accept` approves a 2xx response body or
/// the attempts run out. `url` is never logged since it may embed a
/// credential.
pub(crate) async fn post_json_with_retry<F>(
    client: &reqwest::Client,
    url: &str,
    payload: &Value,
    policy: &RetryPolicy,
    channel: &str,
    accept: F,
) -> Result<SendResponse, NotifyError>
where
    F: Fn(&str) -> Result<(), String>,
{
    let attempts = policy.attempts.max(1);
    let mut last_err = String::new();
    let mut last_status = None;

    for attempt in 0..attempts {
        match client.post(url).json(payload).send().await {
            Ok(resp) => {
                let status = resp.status();
                last_status = Some(status.as_u16());
                let body = match resp.text().await {
                    Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
                    Err(e) => format!("[Failed to read response body: {}]", e.without_url()),
                };

                if status.is_success() {
                    match accept(&body) {
                        Ok(()) => {
                            return Ok(SendResponse {
                                http_status: last_status,
                                response_body: Some(body),
                                retry_count: attempt,
                            });
                        }
                        Err(reason) => last_err = reason,
                    }
                } else {
                    last_err = format!("HTTP {status}: {body}");
                }
                tracing::warn!(
                    channel,
                    attempt = attempt + 1,
                    status = status.as_u16(),
                    error = %last_err,
                    "Delivery rejected, retrying"
                );
            }
            Err(e) => {
                last_err = e.without_url().to_string();
                tracing::warn!(
                    channel,
                    attempt = attempt + 1,
                    error = %last_err,
                    "Delivery request failed, retrying"
                );
            }
        }

        if attempt + 1 < attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }

    Err(NotifyError::DeliveryFailed {
        channel: channel.to_string(),
        attempts,
        reason: match last_status {
            Some(status) if !last_err.starts_with("HTTP") => format!("{last_err} (HTTP {status})"),
            _ => last_err,
        },
    })
}
