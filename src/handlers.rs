use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::services::{ComparisonService, ForecastService, RiskService};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    pub risk: RiskService,
    pub comparison: ComparisonService,
    pub forecasts: ForecastService,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Routes under `/api/v1`. Rate limiting and body limits are layered on by
/// the binary.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/vendors/:id/risk", get(vendor_risk))
        .route("/api/v1/vendors/risk/batch", post(vendor_risk_batch))
        .route("/api/v1/items/:id/comparison", get(item_comparison))
        .route("/api/v1/forecasts", get(forecast_report))
        .route("/api/v1/forecasts/stock-out", get(stock_out_forecast))
        .route("/api/v1/forecasts/demand", get(demand_forecast))
        .route("/api/v1/forecasts/pricing", get(pricing_forecast))
        .route("/api/v1/forecasts/vendor-risk", get(vendor_risk_forecast))
        .route("/api/v1/forecasts/summary", get(forecast_summary))
}

/// Health check plus API routes, without transport middleware.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "vendor-risk-api",
            "version": env!("CARGO_PKG_VERSION"),
            "ai_provider": format!("{:?}", state.config.provider_kind).to_lowercase()
        })),
    )
}

/// GET /api/v1/vendors/:id/risk
///
/// Risk assessment for one vendor. With `?ai=true` the configured provider
/// may refine the local result; provider failures fall back silently.
pub async fn vendor_risk(
    State(state): State<Arc<AppState>>,
    Path(vendor_id): Path<String>,
    Query(params): Query<AiQueryParams>,
) -> Result<Json<RiskAssessment>, AppError> {
    tracing::info!("GET /vendors/{}/risk (ai={})", vendor_id, params.ai);
    let assessment = state.risk.assess_vendor(&vendor_id, params.ai).await?;
    Ok(Json(assessment))
}

/// POST /api/v1/vendors/risk/batch
///
/// Assesses the listed vendors, or every vendor when `vendor_ids` is omitted.
pub async fn vendor_risk_batch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BatchAssessmentRequest>,
) -> Result<Json<BatchAssessmentResponse>, AppError> {
    if let Some(ids) = &payload.vendor_ids {
        if ids.iter().any(|id| id.trim().is_empty()) {
            return Err(AppError::BadRequest(
                "vendor_ids must not contain empty ids".to_string(),
            ));
        }
    }

    let response = state
        .risk
        .assess_batch(payload.vendor_ids, payload.ai, state.config.batch_concurrency)
        .await?;
    Ok(Json(response))
}

/// GET /api/v1/items/:id/comparison
pub async fn item_comparison(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Query(params): Query<AiQueryParams>,
) -> Result<Json<VendorComparisonResult>, AppError> {
    tracing::info!("GET /items/{}/comparison (ai={})", item_id, params.ai);
    let result = state.comparison.compare_item(&item_id, params.ai).await?;
    Ok(Json(result))
}

/// GET /api/v1/forecasts
pub async fn forecast_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ForecastReport>, AppError> {
    Ok(Json(state.forecasts.report(today()).await?))
}

pub async fn stock_out_forecast(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StockOutForecast>>, AppError> {
    Ok(Json(state.forecasts.stock_out(today()).await?))
}

pub async fn demand_forecast(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DemandForecast>>, AppError> {
    Ok(Json(state.forecasts.demand(today()).await?))
}

pub async fn pricing_forecast(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PricingForecast>>, AppError> {
    Ok(Json(state.forecasts.pricing(today()).await?))
}

pub async fn vendor_risk_forecast(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<VendorRiskForecast>>, AppError> {
    Ok(Json(state.forecasts.vendor_risk(today()).await?))
}

pub async fn forecast_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ForecastSummary>, AppError> {
    Ok(Json(state.forecasts.report(today()).await?.summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_validator::build_response_cache;
    use crate::circuit_breaker::create_provider_circuit_breaker;
    use crate::config::ProviderKind;
    use crate::provider_client::{Provider, ProviderGateway};
    use crate::storage::{InMemoryStore, Store};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        let store = Store::Memory(
            InMemoryStore::from_json(
                r#"{"vendors": [{"id": "v-1", "name": "Acme"}],
                    "items": [{"id": "i-1", "name": "Bolts"}]}"#,
            )
            .unwrap(),
        );
        let gateway = ProviderGateway::new(
            Provider::Disabled,
            create_provider_circuit_breaker(),
            build_response_cache(Duration::from_secs(60)),
            Duration::from_secs(1),
        );
        Arc::new(AppState {
            config: Config {
                database_url: None,
                snapshot_path: None,
                port: 0,
                provider_kind: ProviderKind::None,
                provider: None,
                batch_concurrency: 2,
                response_cache_ttl_secs: 60,
            },
            risk: RiskService::new(store.clone(), gateway.clone()),
            comparison: ComparisonService::new(store.clone(), gateway),
            forecasts: ForecastService::new(store),
        })
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["ai_provider"], "none");
    }

    #[tokio::test]
    async fn test_vendor_risk_route() {
        let (status, body) = get_json("/api/v1/vendors/v-1/risk?ai=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vendor_id"], "v-1");
        assert_eq!(body["source"], "local");
    }

    #[tokio::test]
    async fn test_unknown_vendor_is_404() {
        let (status, _) = get_json("/api/v1/vendors/nope/risk").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_item_without_vendors() {
        let (status, body) = get_json("/api/v1/items/i-1/comparison").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["best_overall"].is_null());
        assert_eq!(body["vendors"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_forecast_summary_route() {
        let (status, body) = get_json("/api/v1/forecasts/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vendors_analyzed"], 1);
    }

    #[tokio::test]
    async fn test_batch_rejects_blank_ids() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/vendors/risk/batch")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"vendor_ids": ["v-1", " "]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
