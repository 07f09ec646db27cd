//! Validation of external provider output against the local baseline.
//!
//! Provider text is untrusted. It goes through two stages:
//! 1. extraction: strip code fences, take the outermost `{...}` span, parse
//!    it as JSON. Any failure discards the response.
//! 2. reconciliation: normalize field types and ranges, then keep the
//!    external score only when it is within [`MAX_SCORE_DEVIATION`] points
//!    of the locally expected score. The level is always re-derived from the
//!    retained score.

use crate::models::{
    AssessmentSource, RiskAssessment, RiskCategory, RiskFactor, RiskLevel, Severity,
    VendorComparisonResult,
};
use crate::ranking;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Largest accepted distance between an external and the expected score.
pub const MAX_SCORE_DEVIATION: f64 = 30.0;
/// Confidence assumed when the provider does not report one.
pub const DEFAULT_EXTERNAL_CONFIDENCE: f64 = 0.7;

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").ok())
        .as_ref()
}

/// Extracts the JSON object embedded in free-form provider text.
pub fn extract_json(raw: &str) -> Option<Value> {
    let body = fence_regex()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }

    match serde_json::from_str::<Value>(&body[start..=end]) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Provider JSON failed to parse: {}", e);
            None
        }
    }
}

fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| value.get(*k)).filter(|v| !v.is_null())
}

/// Numeric field accepting numbers or numeric strings such as "42" or "42%".
fn number(value: &Value, keys: &[&str]) -> Option<f64> {
    match field(value, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

fn text(value: &Value, keys: &[&str]) -> Option<String> {
    match field(value, keys)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// List of strings; object entries contribute their text/description field.
fn text_list(value: &Value, keys: &[&str]) -> Vec<String> {
    match field(value, keys) {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Object(_) => text(entry, &["text", "description", "title", "message"]),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Confidence as 0-1; percentages are scaled down.
pub fn normalize_confidence(raw: Option<f64>) -> f64 {
    match raw {
        Some(c) if c > 1.0 => (c / 100.0).clamp(0.0, 1.0),
        Some(c) => c.clamp(0.0, 1.0),
        None => DEFAULT_EXTERNAL_CONFIDENCE,
    }
}

/// Keeps `external` (clamped to 0-100) when within the allowed deviation of
/// `expected`; otherwise returns `expected`.
pub fn reconcile_score(external: f64, expected: f64) -> f64 {
    if !external.is_finite() {
        return expected;
    }
    let external = external.clamp(0.0, 100.0);
    if (external - expected).abs() > MAX_SCORE_DEVIATION {
        expected
    } else {
        external
    }
}

fn parse_factors(payload: &Value, local: &[RiskFactor]) -> Vec<RiskFactor> {
    let Some(Value::Array(entries)) = field(payload, &["factors", "riskFactors", "risk_factors"]) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| entry.is_object())
        .map(|entry| {
            let category = text(entry, &["category", "type"])
                .map(|c| RiskCategory::parse(&c))
                .unwrap_or_else(|| RiskCategory::Other("unspecified".to_string()));
            let name = text(entry, &["name", "factor", "aspect"])
                .unwrap_or_else(|| category.name().to_string());
            let local_match = local.iter().find(|f| f.name == name);
            let score = number(entry, &["score", "riskScore", "risk_score"])
                .or_else(|| local_match.map(|f| f.score))
                .unwrap_or(0.0)
                .clamp(0.0, 100.0);
            let severity = text(entry, &["severity", "level"])
                .and_then(|s| Severity::parse(&s))
                .unwrap_or_else(|| Severity::from_score(score));
            RiskFactor {
                weight: category.weight(),
                category,
                name,
                score,
                severity,
                description: text(entry, &["description", "detail"]).unwrap_or_default(),
                recommendation: text(entry, &["recommendation", "mitigation"])
                    .unwrap_or_default(),
            }
        })
        .collect()
}

/// Reconciles a provider risk response with the local assessment.
///
/// Unparseable responses return the local assessment unchanged.
pub fn validate_risk_response(raw: &str, expected: &RiskAssessment) -> RiskAssessment {
    let Some(payload) = extract_json(raw) else {
        tracing::warn!(
            "Discarding unparseable provider response for vendor {}",
            expected.vendor_id
        );
        return expected.clone();
    };

    let local_score = expected.overall_score;
    let external_score = number(
        &payload,
        &["overallScore", "overall_score", "riskScore", "risk_score", "score"],
    );

    // Deviation is measured on the raw score; only a retained score is rounded.
    let (score, source) = match external_score {
        Some(ext) => {
            if !ext.is_finite() || (ext.clamp(0.0, 100.0) - local_score).abs() > MAX_SCORE_DEVIATION {
                tracing::warn!(
                    "Provider score {} for vendor {} deviates from expected {} by more than {}; using expected",
                    ext,
                    expected.vendor_id,
                    local_score,
                    MAX_SCORE_DEVIATION
                );
                (local_score, AssessmentSource::Corrected)
            } else {
                (reconcile_score(ext, local_score).round(), AssessmentSource::External)
            }
        }
        None => {
            tracing::warn!(
                "Provider response for vendor {} has no overall score; using expected",
                expected.vendor_id
            );
            (local_score, AssessmentSource::Corrected)
        }
    };

    let level = RiskLevel::from_score(score);
    if level.tier_distance(expected.risk_level) > 1 {
        tracing::warn!(
            "Vendor {}: retained score {} ({}) is {} tiers from local {} ({})",
            expected.vendor_id,
            score,
            level.as_str(),
            level.tier_distance(expected.risk_level),
            local_score,
            expected.risk_level.as_str()
        );
    }

    let factors = parse_factors(&payload, &expected.factors);
    let insights = text_list(&payload, &["insights", "keyInsights", "key_insights"]);
    let recommendations = text_list(&payload, &["recommendations", "actions"]);

    RiskAssessment {
        vendor_id: expected.vendor_id.clone(),
        vendor_name: expected.vendor_name.clone(),
        assessed_at: expected.assessed_at,
        overall_score: score,
        risk_level: level,
        factors: if factors.is_empty() {
            expected.factors.clone()
        } else {
            factors
        },
        insights: if insights.is_empty() {
            expected.insights.clone()
        } else {
            insights
        },
        recommendations: if recommendations.is_empty() {
            expected.recommendations.clone()
        } else {
            recommendations
        },
        trend: expected.trend.clone(),
        peer_comparison: expected.peer_comparison.clone(),
        source,
        confidence: normalize_confidence(number(&payload, &["confidence", "confidenceScore"])),
    }
}

/// Reconciles a provider comparison with the local ranking. Scores are
/// accepted per vendor within the allowed deviation; ranks, winners and
/// strategy are always recomputed locally.
pub fn validate_comparison_response(
    raw: &str,
    expected: &VendorComparisonResult,
) -> VendorComparisonResult {
    let Some(payload) = extract_json(raw) else {
        tracing::warn!(
            "Discarding unparseable provider comparison for item {}",
            expected.item_id
        );
        return expected.clone();
    };

    let entries: Vec<&Value> = match field(&payload, &["vendors", "rankings", "vendorScores", "vendor_scores"]) {
        Some(Value::Array(entries)) => entries.iter().filter(|e| e.is_object()).collect(),
        _ => Vec::new(),
    };

    let mut result = expected.clone();
    let mut corrected = entries.is_empty();

    for card in result.vendors.iter_mut() {
        let Some(entry) = entries.iter().find(|e| {
            text(e, &["vendorId", "vendor_id", "id"]).as_deref() == Some(card.vendor_id.as_str())
        }) else {
            continue;
        };

        if let Some(ext) = number(entry, &["overallScore", "overall_score", "score"]) {
            let retained = reconcile_score(ext, card.overall_score);
            if (ext.clamp(0.0, 100.0) - card.overall_score).abs() > MAX_SCORE_DEVIATION {
                tracing::warn!(
                    "Provider score {} for vendor {} on item {} rejected (expected {})",
                    ext,
                    card.vendor_id,
                    expected.item_id,
                    card.overall_score
                );
                corrected = true;
            }
            card.overall_score = (retained * 100.0).round() / 100.0;
        }

        let pros = text_list(entry, &["pros", "strengths"]);
        if !pros.is_empty() {
            card.pros = pros;
        }
        let cons = text_list(entry, &["cons", "weaknesses", "concerns"]);
        if !cons.is_empty() {
            card.cons = cons;
        }
    }

    ranking::finalize(&mut result);
    result.source = if corrected {
        AssessmentSource::Corrected
    } else {
        AssessmentSource::External
    };
    result
}
