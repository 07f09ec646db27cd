use super::bucketing::{bucket_by_month, percent_change, Windows};
use crate::models::{Item, PriceTrend, PricingForecast, PurchaseRecord, VendorItem, Volatility};
use chrono::NaiveDate;

/// Price change (percent) beyond which a trend is reported.
pub const PRICE_TREND_THRESHOLD_PCT: f64 = 5.0;
/// Lot size used to express a per-unit saving as an amount.
pub const SAVINGS_LOT_SIZE: f64 = 100.0;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Coefficient of variation (population standard deviation / mean), in percent.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let avg = mean(values);
    if values.len() < 2 || avg <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / avg * 100.0
}

fn volatility_band(cv_percent: f64) -> Volatility {
    if cv_percent > 20.0 {
        Volatility::High
    } else if cv_percent > 10.0 {
        Volatility::Medium
    } else {
        Volatility::Low
    }
}

/// Compares the average unit price of the latest month observed in the
/// recent window with the month observed before it (within the prior
/// window), and finds the cheapest current vendor offer. Without purchases
/// in the recent window there is no current price and no trend.
pub fn forecast_pricing(
    item: &Item,
    purchases: &[PurchaseRecord],
    vendor_items: &[VendorItem],
    as_of: NaiveDate,
) -> PricingForecast {
    let observations: Vec<(NaiveDate, f64)> = purchases
        .iter()
        .filter(|p| !p.is_cancelled() && p.order_date <= as_of)
        .flat_map(|p| p.lines_for_item(&item.id).map(move |l| (p.order_date, l.unit_price)))
        .filter(|(_, price)| *price > 0.0)
        .collect();

    let all_prices: Vec<f64> = observations.iter().map(|(_, price)| *price).collect();
    let windows = Windows::ending(as_of);
    let monthly_avgs: Vec<(bool, f64)> = bucket_by_month(observations)
        .range(windows.prior.0..=windows.recent.1)
        .map(|(month, prices)| (*month >= windows.recent.0, mean(prices)))
        .collect();

    let (current, previous) = match monthly_avgs.as_slice() {
        [.., (_, prev), (true, last)] => (*last, *prev),
        [(true, last)] => (*last, *last),
        _ => (0.0, 0.0),
    };

    let change = percent_change(current, previous);
    let trend = if change > PRICE_TREND_THRESHOLD_PCT {
        PriceTrend::Increasing
    } else if change < -PRICE_TREND_THRESHOLD_PCT {
        PriceTrend::Decreasing
    } else {
        PriceTrend::Stable
    };

    let cv = coefficient_of_variation(&all_prices);

    let best = vendor_items
        .iter()
        .filter(|vi| vi.item_id == item.id && vi.unit_price > 0.0)
        .min_by(|a, b| {
            a.unit_price
                .total_cmp(&b.unit_price)
                .then_with(|| a.vendor_id.cmp(&b.vendor_id))
        });

    let savings = match best {
        Some(vi) if current > vi.unit_price => (current - vi.unit_price) * SAVINGS_LOT_SIZE,
        _ => 0.0,
    };

    PricingForecast {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        current_avg_price: current,
        previous_avg_price: previous,
        price_change_percent: change,
        predicted_next_price: (current * (1.0 + change / 100.0)).max(0.0),
        trend,
        volatility_percent: cv,
        volatility: volatility_band(cv),
        best_vendor: best.map(|vi| vi.vendor_id.clone()),
        best_vendor_price: best.map(|vi| vi.unit_price),
        savings_opportunity: savings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, PurchaseStatus};

    fn item() -> Item {
        Item {
            id: "i-1".to_string(),
            name: "Resin".to_string(),
            category: None,
            current_stock: None,
            unit: None,
        }
    }

    fn order(month: u32, price: f64) -> PurchaseRecord {
        PurchaseRecord {
            id: format!("po-{}-{}", month, price),
            vendor_id: "v-1".to_string(),
            order_date: NaiveDate::from_ymd_opt(2024, month, 3).unwrap(),
            status: PurchaseStatus::Delivered,
            line_items: vec![LineItem {
                item_id: Some("i-1".to_string()),
                description: "Resin".to_string(),
                quantity: 10.0,
                unit_price: price,
            }],
            payment_status: None,
            payment_delay_days: None,
            expected_delivery_date: None,
            actual_delivery_date: None,
            on_time: None,
            quality_rating: None,
            defect_count: None,
            return_count: None,
            received_quantity: None,
            accepted_quantity: None,
        }
    }

    fn offer(vendor: &str, price: f64) -> VendorItem {
        VendorItem {
            vendor_id: vendor.to_string(),
            item_id: "i-1".to_string(),
            unit_price: price,
            lead_time_days: None,
            is_preferred: false,
            min_order_quantity: None,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn test_increasing_price_and_savings() {
        let purchases = vec![order(4, 10.0), order(5, 11.0)];
        let offers = vec![offer("v-2", 9.5), offer("v-3", 10.5)];
        let forecast = forecast_pricing(&item(), &purchases, &offers, as_of());
        assert_eq!(forecast.current_avg_price, 11.0);
        assert_eq!(forecast.previous_avg_price, 10.0);
        assert!((forecast.price_change_percent - 10.0).abs() < 1e-9);
        assert_eq!(forecast.trend, PriceTrend::Increasing);
        assert_eq!(forecast.best_vendor.as_deref(), Some("v-2"));
        assert!((forecast.savings_opportunity - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_change_is_stable() {
        let purchases = vec![order(4, 100.0), order(5, 104.0)];
        let forecast = forecast_pricing(&item(), &purchases, &[], as_of());
        assert_eq!(forecast.trend, PriceTrend::Stable);
        assert_eq!(forecast.best_vendor, None);
        assert_eq!(forecast.savings_opportunity, 0.0);
    }

    #[test]
    fn test_volatility_bands() {
        assert_eq!(coefficient_of_variation(&[10.0, 10.0, 10.0]), 0.0);
        let purchases = vec![order(4, 5.0), order(5, 15.0), order(6, 10.0)];
        let forecast = forecast_pricing(&item(), &purchases, &[], as_of());
        assert_eq!(forecast.volatility, Volatility::High);
        assert_eq!(forecast.trend, PriceTrend::Decreasing);
    }

    #[test]
    fn test_price_outside_recent_window_is_not_current() {
        let purchases = vec![order(1, 10.0), order(2, 14.0)];
        let offers = vec![offer("v-2", 9.0)];
        let forecast = forecast_pricing(&item(), &purchases, &offers, as_of());
        assert_eq!(forecast.current_avg_price, 0.0);
        assert_eq!(forecast.price_change_percent, 0.0);
        assert_eq!(forecast.trend, PriceTrend::Stable);
        assert_eq!(forecast.savings_opportunity, 0.0);
        assert_eq!(forecast.volatility, Volatility::Medium);
    }

    #[test]
    fn test_prior_window_month_is_previous_price() {
        let purchases = vec![order(3, 10.0), order(4, 12.0)];
        let forecast = forecast_pricing(&item(), &purchases, &[], as_of());
        assert_eq!(forecast.current_avg_price, 12.0);
        assert_eq!(forecast.previous_avg_price, 10.0);
        assert_eq!(forecast.trend, PriceTrend::Increasing);
    }

    #[test]
    fn test_no_history() {
        let forecast = forecast_pricing(&item(), &[], &[offer("v-2", 3.0)], as_of());
        assert_eq!(forecast.current_avg_price, 0.0);
        assert_eq!(forecast.price_change_percent, 0.0);
        assert_eq!(forecast.savings_opportunity, 0.0);
        assert_eq!(forecast.best_vendor_price, Some(3.0));
    }
}
