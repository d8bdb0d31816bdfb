use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::api::health::{PipelineStats, StatsSnapshot};
use crate::api::latency::{LatencyStats, LatencySummary};
use crate::error::{AppError, WebhookError};
use crate::pipeline::EventPipeline;
use crate::state::{AlertSwitch, Registry};
use crate::types::WatchedAddress;
use crate::webhook::parse_webhook_body;

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<EventPipeline>,
    pub registry: Arc<Registry>,
    pub alerts: Arc<AlertSwitch>,
    pub stats: Arc<PipelineStats>,
    pub latency: Arc<LatencyStats>,
    /// Pinged by `/health`.
    pub db: SqlitePool,
    /// Shared secret expected in the Authorization header. None disables the check.
    pub auth_token: Option<String>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/webhook", post(post_webhook))
        .route("/health", get(get_health))
        .route("/stats", get(get_stats))
        .route("/whales", get(get_whales))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub count: usize,
    pub rejected: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub alerts_enabled: bool,
    pub watched: usize,
    pub active: usize,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub counters: StatsSnapshot,
    pub latency: LatencySummary,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Accept one notification or an array of them. Responds as soon as the body
/// is parsed; each notification runs through the pipeline on its own task so
/// a slow delivery never holds up the provider.
async fn post_webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookError> {
    authorize(&headers, state.auth_token.as_deref())?;

    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::Malformed(format!("invalid JSON: {e}")))?;
    let batch = parse_webhook_body(&value)?;

    state.stats.record_webhook(batch.rejected);
    let count = batch.notifications.len();
    debug!(count, rejected = batch.rejected, "[WEBHOOK] batch accepted");

    for notification in batch.notifications {
        let pipeline = Arc::clone(&state.pipeline);
        tokio::spawn(async move {
            pipeline.process(&notification).await;
        });
    }

    Ok(Json(WebhookAck {
        status: "received",
        count,
        rejected: batch.rejected,
    }))
}

/// Accepts the bare token or `Bearer <token>`.
fn authorize(headers: &HeaderMap, expected: Option<&str>) -> Result<(), WebhookError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));
    match provided {
        Some(token) if token == expected => Ok(()),
        _ => Err(WebhookError::Unauthorized),
    }
}

/// Fails with 503 when the database stops answering, since registry changes
/// and the dedup journal both depend on it.
async fn get_health(State(state): State<ApiState>) -> Result<Json<HealthResponse>, AppError> {
    if let Err(e) = sqlx::query("SELECT 1").execute(&state.db).await {
        warn!("[HEALTH] database unreachable: {e}");
        return Err(e.into());
    }

    let list = state.registry.list();
    Ok(Json(HealthResponse {
        status: "ok",
        alerts_enabled: state.alerts.is_enabled(),
        watched: list.len(),
        active: list.active_count(),
    }))
}

async fn get_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        counters: state.stats.snapshot(),
        latency: state.latency.summary(),
    })
}

async fn get_whales(State(state): State<ApiState>) -> Json<Vec<WatchedAddress>> {
    Json(state.registry.list().into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{buy_for, test_pipeline, RecordingNotifier, GAKE};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn app(auth_token: Option<&str>) -> (Router, Arc<RecordingNotifier>, Arc<Registry>) {
        let (app, notifier, registry, _pool) = app_with_pool(auth_token).await;
        (app, notifier, registry)
    }

    async fn app_with_pool(
        auth_token: Option<&str>,
    ) -> (Router, Arc<RecordingNotifier>, Arc<Registry>, SqlitePool) {
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = test_pipeline(notifier.clone(), 20).await;
        let state = ApiState {
            stats: ctx.pipeline.stats(),
            latency: ctx.pipeline.latency(),
            pipeline: Arc::new(ctx.pipeline),
            registry: Arc::clone(&ctx.registry),
            alerts: ctx.alerts,
            db: ctx.pool.clone(),
            auth_token: auth_token.map(str::to_string),
        };
        (router(state), notifier, ctx.registry, ctx.pool)
    }

    fn webhook(body: &str) -> Request<Body> {
        Request::post("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_for_sent(notifier: &RecordingNotifier, n: usize) {
        for _ in 0..100 {
            if notifier.sent().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn webhook_acknowledges_and_delivers() {
        let (app, notifier, registry) = app(None).await;
        registry.add("Gake", GAKE).await.unwrap();
        let payload = serde_json::to_string(&serde_json::json!([raw_buy("tx123")])).unwrap();

        let resp = app.oneshot(webhook(&payload)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "received");
        assert_eq!(body["count"], 1);

        wait_for_sent(&notifier, 1).await;
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn repeated_webhook_delivers_once() {
        let (app, notifier, registry) = app(None).await;
        registry.add("Gake", GAKE).await.unwrap();
        let payload = serde_json::to_string(&raw_buy("tx123")).unwrap();

        let first = app.clone().oneshot(webhook(&payload)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        wait_for_sent(&notifier, 1).await;

        let second = app.oneshot(webhook(&payload)).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn malformed_bodies_are_client_errors() {
        let (app, _notifier, _registry) = app(None).await;

        let not_json = app.clone().oneshot(webhook("{oops")).await.unwrap();
        assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);

        let scalar = app.clone().oneshot(webhook("42")).await.unwrap();
        assert_eq!(scalar.status(), StatusCode::BAD_REQUEST);

        let empty = app.oneshot(webhook("[]")).await.unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(empty).await["error"].is_string());
    }

    #[tokio::test]
    async fn auth_token_is_enforced() {
        let (app, _notifier, _registry) = app(Some("s3cret")).await;
        let payload = r#"{"signature":"tx1"}"#;

        let missing = app.clone().oneshot(webhook(payload)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let mut bearer = webhook(payload);
        bearer
            .headers_mut()
            .insert(AUTHORIZATION, "Bearer s3cret".parse().unwrap());
        assert_eq!(app.clone().oneshot(bearer).await.unwrap().status(), StatusCode::OK);

        let mut bare = webhook(payload);
        bare.headers_mut().insert(AUTHORIZATION, "s3cret".parse().unwrap());
        assert_eq!(app.oneshot(bare).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn read_endpoints_report_state() {
        let (app, _notifier, registry) = app(None).await;
        registry.add("Gake", GAKE).await.unwrap();

        let health = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let health = body_json(health).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["watched"], 1);
        assert_eq!(health["alerts_enabled"], true);

        let whales = app
            .clone()
            .oneshot(Request::get("/whales").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let whales = body_json(whales).await;
        assert_eq!(whales[0]["label"], "Gake");
        assert_eq!(whales[0]["status"], "active");

        let stats = app
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let stats = body_json(stats).await;
        assert_eq!(stats["counters"]["delivered"], 0);
        assert_eq!(stats["latency"]["samples"], 0);
    }

    #[tokio::test]
    async fn health_reports_unavailable_database() {
        let (app, _notifier, _registry, pool) = app_with_pool(None).await;
        pool.close().await;

        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_json(resp)
            .await["error"]
            .as_str()
            .unwrap()
            .starts_with("Database error"));
    }

    /// The fixture notification as provider JSON.
    fn raw_buy(signature: &str) -> serde_json::Value {
        let n = buy_for(signature, GAKE);
        let change = &n.account_data[0].token_balance_changes[0];
        serde_json::json!({
            "signature": n.signature,
            "timestamp": n.timestamp,
            "type": "SWAP",
            "source": n.source,
            "accountData": [{
                "account": GAKE,
                "nativeBalanceChange": n.account_data[0].native_balance_change,
                "tokenBalanceChanges": [{
                    "userAccount": GAKE,
                    "mint": change.mint,
                    "rawTokenAmount": {
                        "tokenAmount": change.raw_token_amount.token_amount,
                        "decimals": change.raw_token_amount.decimals,
                    },
                }],
            }],
        })
    }
}
