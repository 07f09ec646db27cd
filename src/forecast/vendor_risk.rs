use super::bucketing::{bucket_by_month, classify_change, Direction, Windows, SIGNIFICANT_CHANGE_PCT};
use crate::metrics::VendorMetrics;
use crate::models::{
    AlertLevel, PaymentHealth, PerformanceTrend, PurchaseRecord, RiskLevel, VendorRiskForecast,
};
use chrono::NaiveDate;

pub const WORSENING_RISK_DELTA: f64 = 10.0;
pub const IMPROVING_RISK_DELTA: f64 = -5.0;

fn on_time_rate(records: &[&&PurchaseRecord]) -> Option<f64> {
    let outcomes: Vec<bool> = records.iter().filter_map(|p| p.delivered_on_time()).collect();
    if outcomes.is_empty() {
        return None;
    }
    Some(outcomes.iter().filter(|o| **o).count() as f64 / outcomes.len() as f64 * 100.0)
}

fn avg_rating(records: &[&&PurchaseRecord]) -> Option<f64> {
    let ratings: Vec<f64> = records.iter().filter_map(|p| p.quality_rating).collect();
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
}

/// A higher value in the recent window means improvement.
fn performance_trend(recent: Option<f64>, prior: Option<f64>) -> PerformanceTrend {
    match (recent, prior) {
        (Some(recent), Some(prior)) => match classify_change(recent, prior, SIGNIFICANT_CHANGE_PCT) {
            Direction::Up => PerformanceTrend::Improving,
            Direction::Down => PerformanceTrend::Worsening,
            Direction::Flat => PerformanceTrend::Stable,
        },
        _ => PerformanceTrend::Stable,
    }
}

/// Payment health from overdue share and average delay.
pub fn payment_health(metrics: &VendorMetrics) -> PaymentHealth {
    if metrics.overdue_payment_ratio > 0.3 || metrics.avg_payment_delay_days > 30.0 {
        PaymentHealth::Critical
    } else if metrics.overdue_payment_ratio > 0.1 || metrics.avg_payment_delay_days > 15.0 {
        PaymentHealth::Warning
    } else {
        PaymentHealth::Healthy
    }
}

fn alert_level(
    current: f64,
    payment: PaymentHealth,
    overall: PerformanceTrend,
    delivery: PerformanceTrend,
) -> AlertLevel {
    if current >= 70.0 || payment == PaymentHealth::Critical {
        AlertLevel::Critical
    } else if current >= 50.0
        || payment == PaymentHealth::Warning
        || overall == PerformanceTrend::Worsening
    {
        AlertLevel::Warning
    } else if current >= 30.0 || delivery == PerformanceTrend::Worsening {
        AlertLevel::Watch
    } else {
        AlertLevel::None
    }
}

/// Projects a vendor's risk score from its delivery and quality trajectory.
pub fn forecast_vendor_risk(
    metrics: &VendorMetrics,
    current_risk_score: f64,
    purchases: &[PurchaseRecord],
    as_of: NaiveDate,
) -> VendorRiskForecast {
    let buckets = bucket_by_month(
        purchases
            .iter()
            .filter(|p| p.vendor_id == metrics.vendor_id && !p.is_cancelled() && p.order_date <= as_of)
            .map(|p| (p.order_date, p)),
    );
    let windows = Windows::ending(as_of);
    let recent = windows.recent_entries(&buckets);
    let prior = windows.prior_entries(&buckets);

    let delivery_trend = performance_trend(on_time_rate(&recent), on_time_rate(&prior));
    let quality_trend = performance_trend(avg_rating(&recent), avg_rating(&prior));

    let (overall_trend, delta) = match (delivery_trend, quality_trend) {
        (PerformanceTrend::Worsening, PerformanceTrend::Worsening) => {
            (PerformanceTrend::Worsening, WORSENING_RISK_DELTA)
        }
        (PerformanceTrend::Improving, PerformanceTrend::Improving) => {
            (PerformanceTrend::Improving, IMPROVING_RISK_DELTA)
        }
        _ => (PerformanceTrend::Stable, 0.0),
    };

    let current = current_risk_score.clamp(0.0, 100.0);
    let predicted = (current + delta).clamp(0.0, 100.0);
    let payment = payment_health(metrics);

    VendorRiskForecast {
        vendor_id: metrics.vendor_id.clone(),
        vendor_name: metrics.vendor_name.clone(),
        current_risk_score: current,
        predicted_risk_score: predicted,
        predicted_risk_level: RiskLevel::from_score(predicted),
        delivery_trend,
        quality_trend,
        overall_trend,
        payment_health: payment,
        alert_level: alert_level(current, payment, overall_trend, delivery_trend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::normalize;
    use crate::models::{
        FinancialMetrics, PerformanceMetrics, PurchaseStatus, VendorProfile, VendorStatus,
    };

    fn vendor() -> VendorProfile {
        VendorProfile {
            id: "v-1".to_string(),
            name: "Acme".to_string(),
            category: None,
            status: VendorStatus::Active,
            financial: FinancialMetrics::default(),
            performance: PerformanceMetrics::default(),
            compliance_status: None,
            certification_count: None,
        }
    }

    fn delivery(month: u32, on_time: bool, rating: f64) -> PurchaseRecord {
        PurchaseRecord {
            id: format!("po-{}-{}", month, on_time),
            vendor_id: "v-1".to_string(),
            order_date: NaiveDate::from_ymd_opt(2024, month, 5).unwrap(),
            status: PurchaseStatus::Delivered,
            line_items: vec![],
            payment_status: None,
            payment_delay_days: None,
            expected_delivery_date: None,
            actual_delivery_date: None,
            on_time: Some(on_time),
            quality_rating: Some(rating),
            defect_count: None,
            return_count: None,
            received_quantity: None,
            accepted_quantity: None,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn test_worsening_vendor_gains_risk() {
        let purchases = vec![
            delivery(1, true, 5.0),
            delivery(2, true, 5.0),
            delivery(5, false, 2.0),
            delivery(6, true, 2.0),
        ];
        let metrics = normalize(&vendor(), &purchases).unwrap();
        let forecast = forecast_vendor_risk(&metrics, 35.0, &purchases, as_of());
        assert_eq!(forecast.delivery_trend, PerformanceTrend::Worsening);
        assert_eq!(forecast.quality_trend, PerformanceTrend::Worsening);
        assert_eq!(forecast.overall_trend, PerformanceTrend::Worsening);
        assert_eq!(forecast.predicted_risk_score, 45.0);
        assert_eq!(forecast.predicted_risk_level, RiskLevel::High);
        assert_eq!(forecast.alert_level, AlertLevel::Warning);
    }

    #[test]
    fn test_improving_vendor_loses_risk() {
        let purchases = vec![
            delivery(2, false, 2.0),
            delivery(3, true, 2.0),
            delivery(4, true, 5.0),
            delivery(5, true, 5.0),
        ];
        let metrics = normalize(&vendor(), &purchases).unwrap();
        let forecast = forecast_vendor_risk(&metrics, 25.0, &purchases, as_of());
        assert_eq!(forecast.overall_trend, PerformanceTrend::Improving);
        assert_eq!(forecast.predicted_risk_score, 20.0);
        assert_eq!(forecast.alert_level, AlertLevel::None);
    }

    #[test]
    fn test_mixed_trend_is_unchanged() {
        let purchases = vec![delivery(1, true, 2.0), delivery(5, false, 5.0)];
        let metrics = normalize(&vendor(), &purchases).unwrap();
        let forecast = forecast_vendor_risk(&metrics, 40.0, &purchases, as_of());
        assert_eq!(forecast.overall_trend, PerformanceTrend::Stable);
        assert_eq!(forecast.predicted_risk_score, 40.0);
        // delivery worsening alone is a watch signal
        assert_eq!(forecast.alert_level, AlertLevel::Watch);
    }

    #[test]
    fn test_alert_levels() {
        let metrics = normalize(&vendor(), &[]).unwrap();
        assert_eq!(forecast_vendor_risk(&metrics, 72.0, &[], as_of()).alert_level, AlertLevel::Critical);
        assert_eq!(forecast_vendor_risk(&metrics, 55.0, &[], as_of()).alert_level, AlertLevel::Warning);
        assert_eq!(forecast_vendor_risk(&metrics, 30.0, &[], as_of()).alert_level, AlertLevel::Watch);
        assert_eq!(forecast_vendor_risk(&metrics, 10.0, &[], as_of()).alert_level, AlertLevel::None);
    }

    #[test]
    fn test_payment_health_escalates_alert() {
        let mut metrics = normalize(&vendor(), &[]).unwrap();
        metrics.overdue_payment_ratio = 0.5;
        assert_eq!(payment_health(&metrics), PaymentHealth::Critical);
        assert_eq!(forecast_vendor_risk(&metrics, 5.0, &[], as_of()).alert_level, AlertLevel::Critical);
        metrics.overdue_payment_ratio = 0.0;
        metrics.avg_payment_delay_days = 20.0;
        assert_eq!(payment_health(&metrics), PaymentHealth::Warning);
    }
}
