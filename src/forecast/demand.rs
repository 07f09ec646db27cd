use super::bucketing::{bucket_by_month, classify_change, percent_change, Direction, Windows, WINDOW_MONTHS};
use crate::models::{DemandForecast, DemandTrend, Item, PurchaseRecord};
use chrono::NaiveDate;

/// Growth (percent) beyond which demand is rising or falling.
pub const DEMAND_TREND_THRESHOLD_PCT: f64 = 10.0;

/// Compares average monthly quantity over the recent three months with the
/// three months before and projects next month's demand.
pub fn forecast_demand(item: &Item, purchases: &[PurchaseRecord], as_of: NaiveDate) -> DemandForecast {
    let buckets = bucket_by_month(
        purchases
            .iter()
            .filter(|p| !p.is_cancelled() && p.order_date <= as_of)
            .flat_map(|p| p.lines_for_item(&item.id).map(move |l| (p.order_date, l.quantity.max(0.0)))),
    );

    let windows = Windows::ending(as_of);
    let per_month = WINDOW_MONTHS as f64;
    let current: f64 = windows.recent_entries(&buckets).into_iter().sum::<f64>() / per_month;
    let previous: f64 = windows.prior_entries(&buckets).into_iter().sum::<f64>() / per_month;

    let growth_rate = percent_change(current, previous);
    let predicted = (current * (1.0 + growth_rate / 100.0)).max(0.0);

    let trend = match classify_change(current, previous, DEMAND_TREND_THRESHOLD_PCT) {
        // A first appearance with no prior demand has no measurable growth.
        Direction::Up if previous > 0.0 => DemandTrend::Rising,
        Direction::Down => DemandTrend::Falling,
        _ => DemandTrend::Stable,
    };

    let observed_months = buckets.len();
    let confidence = (0.5 + 0.05 * observed_months as f64).min(0.95);

    DemandForecast {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        current_monthly_demand: current,
        previous_monthly_demand: previous,
        growth_rate,
        predicted_next_month_demand: predicted,
        trend,
        confidence,
        observed_months,
    }
}
