//! Prompt rendering for the external risk provider.

use crate::metrics::VendorMetrics;
use crate::models::{RiskAssessment, VendorComparisonResult};
use serde_json::json;

pub const SYSTEM_PROMPT: &str = "You are a procurement risk analyst. \
Answer with a single JSON object and no other text.";

const RISK_RESPONSE_SHAPE: &str = r#"{
  "overallScore": <integer 0-100, 100 = maximum risk>,
  "confidence": <number 0-1>,
  "factors": [{"category": "financial|operational|compliance|supply_chain|reputational|market|geopolitical",
               "name": <string>, "score": <0-100>, "severity": "low|medium|high|critical",
               "description": <string>, "recommendation": <string>}],
  "insights": [<string>],
  "recommendations": [<string>]
}"#;

const COMPARISON_RESPONSE_SHAPE: &str = r#"{
  "vendors": [{"vendorId": <string>, "overallScore": <0-100, higher is better>,
               "pros": [<string>], "cons": [<string>]}]
}"#;

/// Renders the vendor risk prompt from normalized metrics and the local baseline.
pub fn risk_prompt(metrics: &VendorMetrics, local: &RiskAssessment) -> String {
    let profile = json!({
        "vendorId": metrics.vendor_id,
        "vendorName": metrics.vendor_name,
        "onTimeDeliveryRate": metrics.on_time_delivery_rate,
        "qualityScore": metrics.quality_score,
        "defectRate": metrics.defect_rate,
        "avgResponseTimeHours": metrics.avg_response_time_hours,
        "creditUtilization": metrics.credit_utilization,
        "paymentTermsDays": metrics.payment_terms_days,
        "totalSpend": metrics.total_spend,
        "complianceStatus": metrics.compliance_status,
        "certificationCount": metrics.certification_count,
        "avgLeadTimeDays": metrics.lead_time_days,
        "purchaseCount": metrics.purchase_count,
        "returnRate": metrics.return_rate,
        "overduePaymentRatio": metrics.overdue_payment_ratio,
    });
    let baseline: Vec<_> = local
        .factors
        .iter()
        .map(|f| json!({"category": f.category.name(), "name": f.name, "score": f.score}))
        .collect();

    format!(
        "Assess the supply risk of this vendor.\n\nVendor metrics:\n{}\n\n\
         Baseline factor scores:\n{}\n\nBaseline overall score: {}\n\n\
         Respond with JSON of this shape:\n{}",
        serde_json::to_string_pretty(&profile).unwrap_or_default(),
        serde_json::to_string_pretty(&baseline).unwrap_or_default(),
        local.overall_score,
        RISK_RESPONSE_SHAPE
    )
}

/// Renders the vendor comparison prompt for one item.
pub fn comparison_prompt(local: &VendorComparisonResult) -> String {
    let vendors: Vec<_> = local
        .vendors
        .iter()
        .map(|v| {
            json!({
                "vendorId": v.vendor_id,
                "vendorName": v.vendor_name,
                "avgPrice": v.avg_price,
                "priceVariance": v.price_variance,
                "leadTimeDays": v.lead_time_days,
                "purchaseCount": v.purchase_count,
                "riskScore": v.risk_score,
                "isPreferred": v.is_preferred,
                "baselineScore": v.overall_score,
            })
        })
        .collect();

    format!(
        "Compare the vendors supplying item {} ({}). Average price: {:.2}.\n\n\
         Vendors:\n{}\n\nRespond with JSON of this shape:\n{}",
        local.item_name,
        local.item_id,
        local.average_price,
        serde_json::to_string_pretty(&vendors).unwrap_or_default(),
        COMPARISON_RESPONSE_SHAPE
    )
}
