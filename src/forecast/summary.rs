use crate::models::{
    AlertLevel, DemandForecast, DemandTrend, ForecastSummary, PriceTrend, PricingForecast,
    RiskLevel, StockOutForecast, VendorRiskForecast,
};

/// Rolls the four forecast collections into portfolio counts and alert lines.
pub fn summarize(
    stock_out: &[StockOutForecast],
    demand: &[DemandForecast],
    pricing: &[PricingForecast],
    vendor_risk: &[VendorRiskForecast],
) -> ForecastSummary {
    let critical_stock_outs = stock_out
        .iter()
        .filter(|f| f.risk_level == RiskLevel::Critical)
        .count();
    let high_stock_outs = stock_out
        .iter()
        .filter(|f| f.risk_level == RiskLevel::High)
        .count();

    let mut alerts = Vec::new();
    for f in stock_out.iter().filter(|f| f.risk_level == RiskLevel::Critical) {
        if let Some(days) = f.days_until_stock_out {
            alerts.push(format!(
                "{} runs out in {} days; reorder {} units",
                f.item_name, days, f.suggested_order_quantity
            ));
        }
    }
    for f in vendor_risk.iter().filter(|f| f.alert_level == AlertLevel::Critical) {
        alerts.push(format!(
            "Vendor {} is at critical risk (score {:.0}, predicted {:.0})",
            f.vendor_name, f.current_risk_score, f.predicted_risk_score
        ));
    }

    ForecastSummary {
        items_analyzed: stock_out.len().max(demand.len()).max(pricing.len()),
        vendors_analyzed: vendor_risk.len(),
        critical_stock_outs,
        high_stock_outs,
        rising_demand_items: demand
            .iter()
            .filter(|f| f.trend == DemandTrend::Rising)
            .count(),
        increasing_price_items: pricing
            .iter()
            .filter(|f| f.trend == PriceTrend::Increasing)
            .count(),
        at_risk_vendors: vendor_risk
            .iter()
            .filter(|f| matches!(f.alert_level, AlertLevel::Warning | AlertLevel::Critical))
            .count(),
        total_savings_opportunity: pricing.iter().map(|f| f.savings_opportunity).sum(),
        alerts,
    }
}
