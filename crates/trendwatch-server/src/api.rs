use crate::logging::TraceId;
use crate::state::{AppState, ChannelSummary, PollStatus};
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{timeout, Duration};
use trendwatch_alert::Decision;
use trendwatch_common::types::Timeframe;
use trendwatch_storage::NotificationStore;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Error envelope.
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// Non-zero error code.
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
}

/// Envelope wrapping every JSON response.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 0 on success.
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "source_unavailable" => 1201,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Service banner with the effective (redacted) settings.
#[derive(Serialize, ToSchema)]
struct HomeResponse {
    message: String,
    status: String,
    region: String,
    interval_minutes: u64,
    threshold: u64,
    escalation_ratio: f64,
    /// 0 when retention resets are disabled.
    retention_days: u32,
    source: String,
    channels: Vec<ChannelSummary>,
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses((status = 200, description = "Service banner", body = HomeResponse))
)]
async fn home(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let config = &state.config;
    success_response(
        StatusCode::OK,
        &trace_id,
        HomeResponse {
            message: "Trend keyword alert service is running".to_string(),
            status: "active".to_string(),
            region: config.region.clone(),
            interval_minutes: config.poll.interval_minutes,
            threshold: config.alert.threshold,
            escalation_ratio: config.alert.escalation_ratio,
            retention_days: config.alert.retention_days,
            source: state.source.name().to_string(),
            channels: state.channels.as_ref().clone(),
        },
    )
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: i64,
    timestamp: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses((status = 200, description = "Liveness", body = HealthResponse))
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let now = Utc::now();
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: (now - state.start_time).num_seconds(),
            timestamp: now,
        },
    )
}

#[derive(Serialize, ToSchema)]
struct StatusResponse {
    poll: PollStatus,
    store_backend: String,
    /// Set while the latest save of the notification store has failed.
    last_persist_error: Option<String>,
    tracked_keywords: usize,
    last_reset_at: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/v1/status",
    tag = "Status",
    responses((status = 200, description = "Poller and store status", body = StatusResponse))
)]
async fn status(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let poll = state.poll_status();
    let (store_backend, last_persist_error, snapshot) = {
        let engine = state
            .engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (
            engine.backend_description(),
            engine.last_persist_error().map(str::to_string),
            engine.snapshot(),
        )
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        StatusResponse {
            poll,
            store_backend,
            last_persist_error,
            tracked_keywords: snapshot.len(),
            last_reset_at: snapshot.last_reset_at,
        },
    )
}

#[utoipa::path(
    get,
    path = "/v1/notifications",
    tag = "Status",
    responses((status = 200, description = "Last alerted volume per keyword and timeframe", body = NotificationStore))
)]
async fn notifications(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let snapshot = state
        .engine
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .snapshot();
    success_response(StatusCode::OK, &trace_id, snapshot)
}

#[derive(Deserialize, IntoParams)]
struct CheckParams {
    /// Keyword to check; defaults to the top trending keyword.
    keyword: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct BucketCheck {
    timeframe: Timeframe,
    volume: i64,
    last_notified: Option<u64>,
    would_notify: bool,
    decision: Decision,
}

#[derive(Serialize, ToSchema)]
struct CheckResponse {
    keyword: String,
    region: String,
    source: String,
    buckets: Vec<BucketCheck>,
}

/// Fetch live volumes and report what the engine would decide, without
/// recording anything.
#[utoipa::path(
    get,
    path = "/v1/check",
    tag = "Status",
    params(CheckParams),
    responses(
        (status = 200, description = "Dry-run decisions per timeframe", body = CheckResponse),
        (status = 502, description = "Trend source failed", body = ApiError)
    )
)]
async fn check(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> impl IntoResponse {
    let region = state.config.region.clone();
    let request_timeout = Duration::from_secs(state.config.poll.request_timeout_secs);

    let keyword = match params.keyword.map(|k| k.trim().to_string()) {
        Some(keyword) if !keyword.is_empty() => keyword,
        Some(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "bad_request",
                "keyword must not be empty",
            )
        }
        None => match timeout(request_timeout, state.source.trending_keywords(&region)).await {
            Ok(Ok(keywords)) => match keywords.into_iter().next() {
                Some(keyword) => keyword,
                None => {
                    return error_response(
                        StatusCode::BAD_GATEWAY,
                        &trace_id,
                        "source_unavailable",
                        "trend source returned no keywords",
                    )
                }
            },
            Ok(Err(e)) => {
                return error_response(
                    StatusCode::BAD_GATEWAY,
                    &trace_id,
                    "source_unavailable",
                    &format!("trend source failed: {e}"),
                )
            }
            Err(_) => {
                return error_response(
                    StatusCode::BAD_GATEWAY,
                    &trace_id,
                    "source_unavailable",
                    "trend source timed out",
                )
            }
        },
    };

    let mut volumes = Vec::with_capacity(Timeframe::ALL.len());
    for timeframe in Timeframe::ALL {
        match timeout(
            request_timeout,
            state.source.volume(&keyword, timeframe, &region),
        )
        .await
        {
            Ok(Ok(volume)) => volumes.push((timeframe, volume)),
            Ok(Err(e)) => {
                return error_response(
                    StatusCode::BAD_GATEWAY,
                    &trace_id,
                    "source_unavailable",
                    &format!("trend source failed: {e}"),
                )
            }
            Err(_) => {
                return error_response(
                    StatusCode::BAD_GATEWAY,
                    &trace_id,
                    "source_unavailable",
                    "trend source timed out",
                )
            }
        }
    }

    let now = Utc::now();
    let buckets = {
        let engine = state
            .engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = engine.snapshot();
        // A due reset clears the buckets before the next decision.
        let reset_due = engine.policy().reset_due(snapshot.last_reset_at, now);
        volumes
            .into_iter()
            .map(|(timeframe, volume)| {
                let decision = engine.preview(&keyword, volume, timeframe, now);
                let last_notified = if reset_due {
                    None
                } else {
                    snapshot.last_notified(timeframe, &keyword)
                };
                BucketCheck {
                    timeframe,
                    volume,
                    last_notified,
                    would_notify: decision.should_notify(),
                    decision,
                }
            })
            .collect()
    };

    success_response(
        StatusCode::OK,
        &trace_id,
        CheckResponse {
            keyword,
            region,
            source: state.source.name().to_string(),
            buckets,
        },
    )
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(home))
        .routes(routes!(health))
        .routes(routes!(status))
        .routes(routes!(notifications))
        .routes(routes!(check))
}
