use crate::models::{ForecastStatus, Item, PurchaseRecord, RiskLevel, StockOutForecast};
use chrono::{Duration, NaiveDate};

/// Days of history used to estimate daily usage.
pub const OBSERVATION_WINDOW_DAYS: i64 = 180;
/// Lead-time cover used for the reorder point.
pub const REORDER_COVER_DAYS: f64 = 14.0;
pub const SAFETY_FACTOR: f64 = 1.2;
/// Days of usage covered by the suggested order.
pub const ORDER_COVER_DAYS: f64 = 30.0;

fn risk_for_days(days: Option<u32>) -> RiskLevel {
    match days {
        Some(d) if d <= 7 => RiskLevel::Critical,
        Some(d) if d <= 14 => RiskLevel::High,
        Some(d) if d <= 30 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Average daily quantity purchased over the observation window ending at `as_of`.
pub fn avg_daily_usage(item_id: &str, purchases: &[PurchaseRecord], as_of: NaiveDate) -> f64 {
    let start = as_of - Duration::days(OBSERVATION_WINDOW_DAYS);
    let total: f64 = purchases
        .iter()
        .filter(|p| !p.is_cancelled() && p.order_date > start && p.order_date <= as_of)
        .flat_map(|p| p.lines_for_item(item_id))
        .map(|line| line.quantity.max(0.0))
        .sum();
    total / OBSERVATION_WINDOW_DAYS as f64
}

/// Projects when the item runs out at the current usage rate.
///
/// Zero usage means the stock never runs out. An item without a recorded
/// stock level is reported as insufficient data rather than guessed.
pub fn forecast_stock_out(
    item: &Item,
    purchases: &[PurchaseRecord],
    as_of: NaiveDate,
) -> StockOutForecast {
    let usage = avg_daily_usage(&item.id, purchases, as_of);

    let (status, days) = match item.current_stock {
        None => (ForecastStatus::InsufficientData, None),
        Some(_) if usage <= 0.0 => (ForecastStatus::Ok, None),
        Some(stock) => {
            let days = (stock.max(0.0) / usage).floor();
            (ForecastStatus::Ok, Some(days.min(u32::MAX as f64) as u32))
        }
    };

    if status == ForecastStatus::InsufficientData {
        tracing::debug!("Item {} has no recorded stock level", item.id);
    }

    StockOutForecast {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        status,
        current_stock: item.current_stock,
        avg_daily_usage: usage,
        days_until_stock_out: days,
        predicted_stock_out_date: days.map(|d| as_of + Duration::days(d as i64)),
        risk_level: risk_for_days(days),
        reorder_point: (usage * REORDER_COVER_DAYS * SAFETY_FACTOR).ceil() as u32,
        suggested_order_quantity: (usage * ORDER_COVER_DAYS).ceil() as u32,
    }
}
