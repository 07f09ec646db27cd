/// End-to-end scenarios over an in-memory procurement snapshot
use chrono::NaiveDate;
use std::time::Duration;
use vendor_risk_api::cache_validator::build_response_cache;
use vendor_risk_api::circuit_breaker::create_provider_circuit_breaker;
use vendor_risk_api::models::{
    AlertLevel, AssessmentSource, DemandTrend, ForecastStatus, RiskLevel,
};
use vendor_risk_api::provider_client::{Provider, ProviderGateway};
use vendor_risk_api::services::{ComparisonService, ForecastService, RiskService};
use vendor_risk_api::storage::{InMemoryStore, Store};

/// Paper is bought 10/month for three months, then 15/month.
fn snapshot() -> String {
    let mut purchases = Vec::new();
    for (month, qty) in [(1, 10), (2, 10), (3, 10), (4, 15), (5, 15), (6, 15)] {
        purchases.push(serde_json::json!({
            "id": format!("po-paper-{}", month),
            "vendor_id": "healthy",
            "order_date": format!("2026-{:02}-05", month),
            "status": "delivered",
            "line_items": [{"item_id": "paper", "description": "A4 paper", "quantity": qty, "unit_price": 4.0}]
        }));
    }
    purchases.push(serde_json::json!({
        "id": "po-bolts-1",
        "vendor_id": "solo",
        "order_date": "2026-05-20",
        "status": "delivered",
        "line_items": [{"item_id": "bolts", "description": "M8 bolts", "quantity": 900, "unit_price": 0.2}]
    }));

    serde_json::json!({
        "vendors": [
            {"id": "healthy", "name": "Northwind Supplies",
             "financial": {"credit_limit": 50000, "outstanding_balance": 0},
             "performance": {"on_time_delivery_rate": 100, "quality_score": 100},
             "compliance_status": "compliant", "certification_count": 3},
            {"id": "failing", "name": "Shaky Parts Ltd",
             "financial": {"credit_limit": 50000, "outstanding_balance": 50000},
             "performance": {"on_time_delivery_rate": 35, "quality_score": 30},
             "compliance_status": "non_compliant", "certification_count": 0},
            {"id": "solo", "name": "Only Bolts Inc"}
        ],
        "purchases": purchases,
        "items": [
            {"id": "paper", "name": "A4 paper", "current_stock": 100},
            {"id": "bolts", "name": "M8 bolts", "current_stock": 20},
            {"id": "ghost", "name": "Discontinued widget"}
        ],
        "vendor_items": [
            {"vendor_id": "healthy", "item_id": "paper", "unit_price": 4.0, "is_preferred": true},
            {"vendor_id": "solo", "item_id": "bolts", "unit_price": 0.2}
        ]
    })
    .to_string()
}

fn store() -> Store {
    Store::Memory(InMemoryStore::from_json(&snapshot()).unwrap())
}

fn gateway() -> ProviderGateway<Provider> {
    ProviderGateway::new(
        Provider::Disabled,
        create_provider_circuit_breaker(),
        build_response_cache(Duration::from_secs(60)),
        Duration::from_secs(1),
    )
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 28).unwrap()
}

#[tokio::test]
async fn healthy_vendor_scores_low() {
    let service = RiskService::new(store(), gateway());
    let assessment = service.assess_vendor("healthy", false).await.unwrap();

    assert!(assessment.overall_score <= 20.0, "score {}", assessment.overall_score);
    assert_eq!(assessment.risk_level, RiskLevel::Low);
    assert_eq!(assessment.source, AssessmentSource::Local);
    assert_eq!(assessment.confidence, 1.0);
    assert_eq!(assessment.trend.len(), 6);
}

#[tokio::test]
async fn failing_vendor_scores_critical() {
    let service = RiskService::new(store(), gateway());
    let assessment = service.assess_vendor("failing", true).await.unwrap();

    assert!(assessment.overall_score >= 61.0, "score {}", assessment.overall_score);
    assert_eq!(assessment.risk_level, RiskLevel::Critical);
    let peers = assessment.peer_comparison.unwrap();
    assert_eq!(peers.peer_count, 2);
    assert_eq!(peers.percentile, 0.0);
}

#[tokio::test]
async fn batch_over_all_vendors() {
    let service = RiskService::new(store(), gateway());
    let response = service.assess_batch(None, false, 2).await.unwrap();

    let ids: Vec<&str> = response
        .assessments
        .iter()
        .map(|a| a.vendor_id.as_str())
        .collect();
    assert_eq!(ids, vec!["healthy", "failing", "solo"]);
    assert!(response.failures.is_empty());
}

#[tokio::test]
async fn single_vendor_item_flags_single_source() {
    let service = ComparisonService::new(store(), gateway());
    let result = service.compare_item("bolts", false).await.unwrap();

    assert_eq!(result.vendors.len(), 1);
    assert!(result.vendors[0].is_recommended);
    assert_eq!(result.vendors[0].rank, 1);
    assert!(result.single_source);
    assert!(result.procurement_strategy.contains("Single-source"));
    assert_eq!(result.best_overall.as_deref(), Some("solo"));
}

#[tokio::test]
async fn item_without_vendors_has_no_winners() {
    let service = ComparisonService::new(store(), gateway());
    let result = service.compare_item("ghost", false).await.unwrap();

    assert!(result.vendors.is_empty());
    assert!(result.best_overall.is_none());
    assert!(result.best_value.is_none());
    assert!(result.best_quality.is_none());
    assert!(result.best_reliability.is_none());
    assert!(result.procurement_strategy.contains("No qualified vendor"));
}

#[tokio::test]
async fn demand_rising_after_step_up() {
    let service = ForecastService::new(store());
    let demand = service.demand(as_of()).await.unwrap();
    let paper = demand.iter().find(|d| d.item_id == "paper").unwrap();

    assert_eq!(paper.trend, DemandTrend::Rising);
    assert!((paper.growth_rate - 50.0).abs() < 1e-9);
    assert!(paper.predicted_next_month_demand > paper.current_monthly_demand);
}

#[tokio::test]
async fn forecast_report_handles_missing_data() {
    let service = ForecastService::new(store());
    let report = service.report(as_of()).await.unwrap();

    let ghost = report.stock_out.iter().find(|s| s.item_id == "ghost").unwrap();
    assert_eq!(ghost.status, ForecastStatus::InsufficientData);
    assert!(ghost.days_until_stock_out.is_none());

    let bolts = report.stock_out.iter().find(|s| s.item_id == "bolts").unwrap();
    // 900 units over 180 days = 5/day, 20 in stock
    assert_eq!(bolts.days_until_stock_out, Some(4));
    assert_eq!(bolts.risk_level, RiskLevel::Critical);
    assert_eq!(bolts.reorder_point, 84);
    assert_eq!(bolts.suggested_order_quantity, 150);

    let failing = report
        .vendor_risk
        .iter()
        .find(|v| v.vendor_id == "failing")
        .unwrap();
    assert_eq!(failing.alert_level, AlertLevel::Warning);

    assert_eq!(report.summary.critical_stock_outs, 1);
    assert_eq!(report.summary.rising_demand_items, 1);
    assert!(report.summary.alerts.iter().any(|a| a.contains("M8 bolts")));
}
