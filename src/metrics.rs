//! Metrics normalization.
//!
//! Flattens a vendor profile and its purchase history into the numeric
//! inputs used by risk scoring, ranking and forecasting. Precedence for each
//! field: value on the profile, then value derived from purchase history,
//! then the documented default. Rates and scores are clamped to [0, 100].

use crate::errors::AppError;
use crate::models::{ComplianceStatus, PaymentStatus, PurchaseRecord, VendorProfile};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ON_TIME_DELIVERY_RATE: f64 = 100.0;
pub const DEFAULT_QUALITY_SCORE: f64 = 100.0;
pub const DEFAULT_DEFECT_RATE: f64 = 0.0;
pub const DEFAULT_RESPONSE_TIME_HOURS: f64 = 12.0;
pub const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;
pub const DEFAULT_LEAD_TIME_DAYS: f64 = 14.0;
pub const DEFAULT_QUALITY_RATING: f64 = 4.0;
pub const DEFAULT_CERTIFICATION_COUNT: u32 = 0;
pub const DEFAULT_COMPLIANCE_STATUS: ComplianceStatus = ComplianceStatus::PendingReview;

/// Flat metrics for one vendor. Every field is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorMetrics {
    pub vendor_id: String,
    pub vendor_name: String,
    pub on_time_delivery_rate: f64,
    pub quality_score: f64,
    pub defect_rate: f64,
    pub avg_response_time_hours: f64,
    pub credit_limit: f64,
    pub outstanding_balance: f64,
    /// outstanding / limit, 0 when no limit is recorded.
    pub credit_utilization: f64,
    pub payment_terms_days: u32,
    pub total_spend: f64,
    pub compliance_status: ComplianceStatus,
    pub certification_count: u32,
    pub lead_time_days: f64,
    /// Average 1-5 rating across rated purchases.
    pub avg_quality_rating: f64,
    pub purchase_count: usize,
    pub delivered_count: usize,
    pub on_time_count: usize,
    pub return_rate: f64,
    /// accepted / received quantity, 0-1.
    pub acceptance_rate: f64,
    /// Share of purchases with overdue payment, 0-1.
    pub overdue_payment_ratio: f64,
    pub avg_payment_delay_days: f64,
}

fn clamp_pct(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Normalizes a vendor and its purchases into [`VendorMetrics`].
///
/// Purchases belonging to other vendors are ignored. Fails only when the
/// vendor id is missing.
pub fn normalize(
    vendor: &VendorProfile,
    purchases: &[PurchaseRecord],
) -> Result<VendorMetrics, AppError> {
    if vendor.id.trim().is_empty() {
        return Err(AppError::InvalidData(format!(
            "vendor '{}' has no id",
            vendor.name
        )));
    }

    let history: Vec<&PurchaseRecord> = purchases
        .iter()
        .filter(|p| p.vendor_id == vendor.id && !p.is_cancelled())
        .collect();

    let outcomes: Vec<bool> = history.iter().filter_map(|p| p.delivered_on_time()).collect();
    let delivered_count = outcomes.len();
    let on_time_count = outcomes.iter().filter(|on_time| **on_time).count();

    let ratings: Vec<f64> = history
        .iter()
        .filter_map(|p| p.quality_rating)
        .map(|r| r.clamp(1.0, 5.0))
        .collect();
    let lead_times: Vec<f64> = history
        .iter()
        .filter_map(|p| p.lead_time_days())
        .map(|d| d as f64)
        .collect();

    let total_quantity: f64 = history.iter().map(|p| p.total_quantity()).sum();
    let defects: u32 = history.iter().filter_map(|p| p.defect_count).sum();
    let returns: u32 = history.iter().filter_map(|p| p.return_count).sum();
    let received: f64 = history.iter().filter_map(|p| p.received_quantity).sum();
    let accepted: f64 = history.iter().filter_map(|p| p.accepted_quantity).sum();

    let payments: Vec<&&PurchaseRecord> =
        history.iter().filter(|p| p.payment_status.is_some()).collect();
    let overdue = payments
        .iter()
        .filter(|p| p.payment_status == Some(PaymentStatus::Overdue))
        .count();
    let delays: Vec<f64> = history
        .iter()
        .filter_map(|p| p.payment_delay_days)
        .map(|d| d.max(0) as f64)
        .collect();

    let derived_on_time = (delivered_count > 0)
        .then(|| on_time_count as f64 / delivered_count as f64 * 100.0);
    let derived_quality = mean(&ratings).map(|r| r / 5.0 * 100.0);
    let derived_defect_rate =
        (total_quantity > 0.0).then(|| defects as f64 / total_quantity * 100.0);
    let derived_spend = (!history.is_empty())
        .then(|| history.iter().map(|p| p.total_amount()).sum::<f64>());

    let perf = &vendor.performance;
    let fin = &vendor.financial;

    let credit_limit = fin.credit_limit.unwrap_or(0.0).max(0.0);
    let outstanding_balance = fin.outstanding_balance.unwrap_or(0.0).max(0.0);
    let credit_utilization = if credit_limit > 0.0 {
        outstanding_balance / credit_limit
    } else {
        0.0
    };

    let metrics = VendorMetrics {
        vendor_id: vendor.id.clone(),
        vendor_name: vendor.name.clone(),
        on_time_delivery_rate: clamp_pct(
            perf.on_time_delivery_rate
                .or(derived_on_time)
                .unwrap_or(DEFAULT_ON_TIME_DELIVERY_RATE),
        ),
        quality_score: clamp_pct(
            perf.quality_score
                .or(derived_quality)
                .unwrap_or(DEFAULT_QUALITY_SCORE),
        ),
        defect_rate: clamp_pct(
            perf.defect_rate
                .or(derived_defect_rate)
                .unwrap_or(DEFAULT_DEFECT_RATE),
        ),
        avg_response_time_hours: perf
            .avg_response_time_hours
            .unwrap_or(DEFAULT_RESPONSE_TIME_HOURS)
            .max(0.0),
        credit_limit,
        outstanding_balance,
        credit_utilization,
        payment_terms_days: fin.payment_terms_days.unwrap_or(DEFAULT_PAYMENT_TERMS_DAYS),
        total_spend: fin.total_spend.or(derived_spend).unwrap_or(0.0).max(0.0),
        compliance_status: vendor.compliance_status.unwrap_or(DEFAULT_COMPLIANCE_STATUS),
        certification_count: vendor
            .certification_count
            .unwrap_or(DEFAULT_CERTIFICATION_COUNT),
        lead_time_days: mean(&lead_times).unwrap_or(DEFAULT_LEAD_TIME_DAYS),
        avg_quality_rating: mean(&ratings).unwrap_or(DEFAULT_QUALITY_RATING),
        purchase_count: history.len(),
        delivered_count,
        on_time_count,
        return_rate: if total_quantity > 0.0 {
            clamp_pct(returns as f64 / total_quantity * 100.0)
        } else {
            0.0
        },
        acceptance_rate: if received > 0.0 {
            (accepted / received).clamp(0.0, 1.0)
        } else {
            1.0
        },
        overdue_payment_ratio: if payments.is_empty() {
            0.0
        } else {
            overdue as f64 / payments.len() as f64
        },
        avg_payment_delay_days: mean(&delays).unwrap_or(0.0),
    };

    tracing::debug!(
        "Normalized metrics for vendor {}: {} purchases, on-time {:.1}%, quality {:.1}",
        metrics.vendor_id,
        metrics.purchase_count,
        metrics.on_time_delivery_rate,
        metrics.quality_score
    );

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FinancialMetrics, LineItem, PerformanceMetrics, PurchaseStatus, VendorStatus,
    };
    use chrono::NaiveDate;

    fn bare_vendor() -> VendorProfile {
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

    fn purchase(id: &str, on_time: bool, rating: f64) -> PurchaseRecord {
        PurchaseRecord {
            id: id.to_string(),
            vendor_id: "v-1".to_string(),
            order_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status: PurchaseStatus::Delivered,
            line_items: vec![LineItem {
                item_id: Some("i-1".to_string()),
                description: "Bolts".to_string(),
                quantity: 10.0,
                unit_price: 5.0,
            }],
            payment_status: Some(PaymentStatus::Paid),
            payment_delay_days: Some(0),
            expected_delivery_date: None,
            actual_delivery_date: NaiveDate::from_ymd_opt(2024, 3, 8),
            on_time: Some(on_time),
            quality_rating: Some(rating),
            defect_count: Some(1),
            return_count: Some(0),
            received_quantity: Some(10.0),
            accepted_quantity: Some(9.0),
        }
    }

    #[test]
    fn test_defaults_applied_when_everything_missing() {
        let metrics = normalize(&bare_vendor(), &[]).unwrap();
        assert_eq!(metrics.on_time_delivery_rate, 100.0);
        assert_eq!(metrics.quality_score, 100.0);
        assert_eq!(metrics.avg_response_time_hours, 12.0);
        assert_eq!(metrics.lead_time_days, 14.0);
        assert_eq!(metrics.avg_quality_rating, 4.0);
        assert_eq!(metrics.payment_terms_days, 30);
        assert_eq!(metrics.credit_utilization, 0.0);
        assert_eq!(metrics.compliance_status, ComplianceStatus::PendingReview);
        assert_eq!(metrics.acceptance_rate, 1.0);
        assert_eq!(metrics.purchase_count, 0);
    }

    #[test]
    fn test_history_fills_missing_profile_fields() {
        let purchases = vec![
            purchase("po-1", true, 5.0),
            purchase("po-2", false, 3.0),
        ];
        let metrics = normalize(&bare_vendor(), &purchases).unwrap();
        assert_eq!(metrics.on_time_delivery_rate, 50.0);
        assert_eq!(metrics.quality_score, 80.0);
        assert_eq!(metrics.lead_time_days, 7.0);
        assert_eq!(metrics.total_spend, 100.0);
        assert_eq!(metrics.defect_rate, 10.0);
        assert!((metrics.acceptance_rate - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_profile_values_win_over_history() {
        let mut vendor = bare_vendor();
        vendor.performance.on_time_delivery_rate = Some(92.0);
        let metrics = normalize(&vendor, &[purchase("po-1", false, 2.0)]).unwrap();
        assert_eq!(metrics.on_time_delivery_rate, 92.0);
    }

    #[test]
    fn test_fully_populated_profile_passes_through() {
        let vendor = VendorProfile {
            financial: FinancialMetrics {
                credit_limit: Some(20_000.0),
                outstanding_balance: Some(5_000.0),
                payment_terms_days: Some(45),
                total_spend: Some(120_000.0),
            },
            performance: PerformanceMetrics {
                on_time_delivery_rate: Some(87.5),
                quality_score: Some(91.0),
                defect_rate: Some(2.5),
                avg_response_time_hours: Some(6.0),
            },
            compliance_status: Some(ComplianceStatus::Compliant),
            certification_count: Some(4),
            ..bare_vendor()
        };
        let metrics = normalize(&vendor, &[]).unwrap();
        assert_eq!(metrics.on_time_delivery_rate, 87.5);
        assert_eq!(metrics.quality_score, 91.0);
        assert_eq!(metrics.defect_rate, 2.5);
        assert_eq!(metrics.avg_response_time_hours, 6.0);
        assert_eq!(metrics.credit_limit, 20_000.0);
        assert_eq!(metrics.outstanding_balance, 5_000.0);
        assert_eq!(metrics.credit_utilization, 0.25);
        assert_eq!(metrics.payment_terms_days, 45);
        assert_eq!(metrics.total_spend, 120_000.0);
        assert_eq!(metrics.compliance_status, ComplianceStatus::Compliant);
        assert_eq!(metrics.certification_count, 4);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let mut vendor = bare_vendor();
        vendor.performance.quality_score = Some(140.0);
        vendor.performance.on_time_delivery_rate = Some(-5.0);
        let metrics = normalize(&vendor, &[]).unwrap();
        assert_eq!(metrics.quality_score, 100.0);
        assert_eq!(metrics.on_time_delivery_rate, 0.0);
    }

    #[test]
    fn test_missing_vendor_id_is_data_error() {
        let mut vendor = bare_vendor();
        vendor.id = "  ".to_string();
        let err = normalize(&vendor, &[]).unwrap_err();
        assert!(matches!(err, AppError::InvalidData(_)));
    }

    #[test]
    fn test_other_vendor_and_cancelled_purchases_ignored() {
        let mut foreign = purchase("po-x", false, 1.0);
        foreign.vendor_id = "v-2".to_string();
        let mut cancelled = purchase("po-c", false, 1.0);
        cancelled.status = PurchaseStatus::Cancelled;
        let metrics = normalize(&bare_vendor(), &[foreign, cancelled]).unwrap();
        assert_eq!(metrics.purchase_count, 0);
        assert_eq!(metrics.on_time_delivery_rate, 100.0);
    }
}
