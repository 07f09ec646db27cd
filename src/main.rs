use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vendor_risk_api::cache_validator::build_response_cache;
use vendor_risk_api::circuit_breaker::create_provider_circuit_breaker;
use vendor_risk_api::config::Config;
use vendor_risk_api::db::open_store;
use vendor_risk_api::handlers::{self, AppState};
use vendor_risk_api::provider_client::{HttpRiskProvider, Provider, ProviderGateway};
use vendor_risk_api::services::{ComparisonService, ForecastService, RiskService};

/// Main entry point for the application.
///
/// Initializes logging, configuration, the procurement store, the provider
/// gateway (cache, circuit breaker, deadline) and the HTTP routes, then
/// starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vendor_risk_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let store = open_store(&config).await?;

    // Raw provider responses keyed by prompt hash
    let response_cache = build_response_cache(config.response_cache_ttl());
    tracing::info!(
        "Provider response cache initialized ({}s TTL)",
        config.response_cache_ttl_secs
    );

    let (provider, deadline) = match &config.provider {
        Some(settings) => {
            let client = HttpRiskProvider::new(
                settings.base_url.clone(),
                settings.api_key.clone(),
                settings.model.clone(),
                settings.timeout(),
            )
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            tracing::info!("✓ Risk provider client initialized: {}", settings.base_url);
            (Provider::Http(client), settings.timeout())
        }
        None => {
            tracing::info!("External risk provider disabled; local analytics only");
            (Provider::Disabled, Duration::from_secs(20))
        }
    };
    let gateway = ProviderGateway::new(
        provider,
        create_provider_circuit_breaker(),
        response_cache,
        deadline,
    );

    let app_state = Arc::new(AppState {
        config: config.clone(),
        risk: RiskService::new(store.clone(), gateway.clone()),
        comparison: ComparisonService::new(store.clone(), gateway),
        forecasts: ForecastService::new(store),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = handlers::api_routes().layer(
        ServiceBuilder::new()
            // Request size limit: 1MB max payload
            .layer(RequestBodyLimitLayer::new(1024 * 1024))
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
