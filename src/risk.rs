//! Weighted multi-factor vendor risk scoring.
//!
//! Each factor carries a 0-100 score and its category weight. The overall
//! score is the weighted mean of all factor scores, rounded to an integer,
//! and the level is always `RiskLevel::from_score` of that score.

use crate::forecast::bucketing::{bucket_by_month, MonthKey};
use crate::metrics::VendorMetrics;
use crate::models::{
    AssessmentSource, ComplianceStatus, PeerComparison, PurchaseRecord, RiskAssessment,
    RiskCategory, RiskFactor, RiskLevel, Severity, TrendPoint,
};
use chrono::{DateTime, Utc};

const PAYMENT_TERMS_CEILING_DAYS: f64 = 90.0;
const RESPONSE_TIME_CEILING_HOURS: f64 = 72.0;

/// Weighted mean of factor scores by category weight, rounded and clamped.
pub fn overall_score(factors: &[RiskFactor]) -> f64 {
    let (weighted, total_weight) = factors.iter().fold((0.0, 0.0), |(sum, weights), f| {
        let w = f.category.weight();
        (sum + f.score.clamp(0.0, 100.0) * w, weights + w)
    });
    if total_weight <= 0.0 {
        return 0.0;
    }
    (weighted / total_weight).round().clamp(0.0, 100.0)
}

fn factor(
    category: RiskCategory,
    name: &str,
    score: f64,
    severity: Severity,
    description: String,
    recommendation: &str,
) -> RiskFactor {
    let weight = category.weight();
    RiskFactor {
        category,
        name: name.to_string(),
        score: score.clamp(0.0, 100.0),
        weight,
        severity,
        description,
        recommendation: recommendation.to_string(),
    }
}

/// Builds the fixed factor set for a vendor.
pub fn analyze_factors(m: &VendorMetrics) -> Vec<RiskFactor> {
    let mut factors = Vec::with_capacity(8);

    // Financial
    let utilization = m.credit_utilization;
    let utilization_severity = if utilization > 0.8 {
        Severity::High
    } else if utilization > 0.5 {
        Severity::Medium
    } else {
        Severity::Low
    };
    factors.push(factor(
        RiskCategory::Financial,
        "credit_utilization",
        (utilization * 100.0).min(100.0),
        utilization_severity,
        format!(
            "Outstanding balance is {:.0}% of the credit limit",
            utilization * 100.0
        ),
        "Reduce outstanding balance or renegotiate the credit limit",
    ));

    // Shorter terms score higher.
    let terms = (m.payment_terms_days as f64).min(PAYMENT_TERMS_CEILING_DAYS);
    let terms_score = (PAYMENT_TERMS_CEILING_DAYS - terms) / PAYMENT_TERMS_CEILING_DAYS * 100.0;
    factors.push(factor(
        RiskCategory::Financial,
        "payment_terms",
        terms_score,
        Severity::from_score(terms_score),
        format!("Payment terms of {} days", m.payment_terms_days),
        "Negotiate longer payment terms",
    ));

    // Operational
    let delivery_score = 100.0 - m.on_time_delivery_rate;
    factors.push(factor(
        RiskCategory::Operational,
        "delivery",
        delivery_score,
        Severity::from_score(delivery_score),
        format!("On-time delivery rate of {:.1}%", m.on_time_delivery_rate),
        "Agree delivery SLAs with penalties and track them monthly",
    ));

    let quality_score = 100.0 - m.quality_score;
    factors.push(factor(
        RiskCategory::Operational,
        "quality",
        quality_score,
        Severity::from_score(quality_score),
        format!("Quality score of {:.1}/100", m.quality_score),
        "Introduce incoming inspection and a corrective action plan",
    ));

    let responsiveness_score =
        (m.avg_response_time_hours / RESPONSE_TIME_CEILING_HOURS * 100.0).min(100.0);
    factors.push(factor(
        RiskCategory::Operational,
        "responsiveness",
        responsiveness_score,
        Severity::from_score(responsiveness_score),
        format!("Average response time of {:.0} hours", m.avg_response_time_hours),
        "Establish a dedicated account contact with response-time targets",
    ));

    // Compliance
    let status_score = match m.compliance_status {
        ComplianceStatus::NonCompliant => 100.0,
        ComplianceStatus::PendingReview => 50.0,
        ComplianceStatus::Compliant => 10.0,
    };
    factors.push(factor(
        RiskCategory::Compliance,
        "compliance_status",
        status_score,
        Severity::from_score(status_score),
        format!("Compliance status: {:?}", m.compliance_status),
        "Complete the compliance review before placing new orders",
    ));

    let cert_score = if m.certification_count == 0 {
        60.0
    } else {
        (60.0 - 10.0 * m.certification_count as f64).max(10.0)
    };
    factors.push(factor(
        RiskCategory::Compliance,
        "certifications",
        cert_score,
        Severity::from_score(cert_score),
        format!("{} active certifications", m.certification_count),
        "Request ISO 9001 or equivalent certification evidence",
    ));

    // Supply chain
    let concentration_score = if m.total_spend > 100_000.0 {
        70.0
    } else if m.total_spend > 50_000.0 {
        40.0
    } else {
        20.0
    };
    factors.push(factor(
        RiskCategory::SupplyChain,
        "concentration",
        concentration_score,
        Severity::from_score(concentration_score),
        format!("Total spend of {:.2} with this vendor", m.total_spend),
        "Qualify an alternative supplier to reduce dependency",
    ));

    factors
}

/// Score at or above which a factor generates an insight, per category.
fn insight_threshold(category: &RiskCategory) -> f64 {
    match category {
        RiskCategory::Financial => 50.0,
        RiskCategory::Operational => 20.0,
        RiskCategory::Compliance => 50.0,
        RiskCategory::SupplyChain => 40.0,
        _ => 50.0,
    }
}

/// Templated insights and recommendations for factors above their thresholds.
pub fn insights_and_recommendations(factors: &[RiskFactor]) -> (Vec<String>, Vec<String>) {
    let flagged: Vec<&RiskFactor> = factors
        .iter()
        .filter(|f| f.score >= insight_threshold(&f.category))
        .collect();

    if flagged.is_empty() {
        return (
            vec!["All risk factors are within acceptable thresholds".to_string()],
            vec!["Continue standard quarterly monitoring".to_string()],
        );
    }

    let insights = flagged
        .iter()
        .map(|f| {
            format!(
                "{} risk ({}): {} (score {:.0})",
                f.category.name(),
                f.name,
                f.description,
                f.score
            )
        })
        .collect();

    let mut recommendations: Vec<String> = Vec::new();
    for f in &flagged {
        if !recommendations.contains(&f.recommendation) {
            recommendations.push(f.recommendation.clone());
        }
    }

    (insights, recommendations)
}

/// Monthly risk proxy from delivery and rating outcomes.
pub fn historical_trend(vendor_id: &str, purchases: &[PurchaseRecord]) -> Vec<TrendPoint> {
    let buckets = bucket_by_month(
        purchases
            .iter()
            .filter(|p| p.vendor_id == vendor_id && !p.is_cancelled())
            .map(|p| (p.order_date, p)),
    );

    buckets
        .into_iter()
        .map(|(month, records): (MonthKey, Vec<&PurchaseRecord>)| {
            let outcomes: Vec<bool> = records.iter().filter_map(|p| p.delivered_on_time()).collect();
            let on_time_pct = if outcomes.is_empty() {
                100.0
            } else {
                outcomes.iter().filter(|o| **o).count() as f64 / outcomes.len() as f64 * 100.0
            };
            let ratings: Vec<f64> = records.iter().filter_map(|p| p.quality_rating).collect();
            let rating = if ratings.is_empty() {
                crate::metrics::DEFAULT_QUALITY_RATING
            } else {
                ratings.iter().sum::<f64>() / ratings.len() as f64
            };
            let score = (0.5 * (100.0 - on_time_pct) + 0.5 * (100.0 - rating * 20.0))
                .round()
                .clamp(0.0, 100.0);
            TrendPoint {
                period: month.to_string(),
                score,
                orders: records.len(),
            }
        })
        .collect()
}

/// Percentile standing among peers: share of peers with a strictly higher score.
pub fn peer_comparison(score: f64, peer_scores: &[f64]) -> Option<PeerComparison> {
    if peer_scores.is_empty() {
        return None;
    }
    let riskier = peer_scores.iter().filter(|s| **s > score).count();
    Some(PeerComparison {
        percentile: (riskier as f64 / peer_scores.len() as f64 * 100.0).round(),
        peer_count: peer_scores.len(),
        peer_average: (peer_scores.iter().sum::<f64>() / peer_scores.len() as f64 * 10.0).round()
            / 10.0,
    })
}

/// Deterministic local assessment of a vendor.
pub fn assess(
    metrics: &VendorMetrics,
    purchases: &[PurchaseRecord],
    assessed_at: DateTime<Utc>,
) -> RiskAssessment {
    let factors = analyze_factors(metrics);
    let score = overall_score(&factors);
    let (insights, recommendations) = insights_and_recommendations(&factors);

    tracing::debug!(
        "Local risk for vendor {}: score {} across {} factors",
        metrics.vendor_id,
        score,
        factors.len()
    );

    RiskAssessment {
        vendor_id: metrics.vendor_id.clone(),
        vendor_name: metrics.vendor_name.clone(),
        assessed_at,
        overall_score: score,
        risk_level: RiskLevel::from_score(score),
        factors,
        insights,
        recommendations,
        trend: historical_trend(&metrics.vendor_id, purchases),
        peer_comparison: None,
        source: AssessmentSource::Local,
        confidence: 1.0,
    }
}
