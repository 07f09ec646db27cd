//! Multi-criteria ranking of the vendors supplying one item.

use crate::models::{
    AssessmentSource, Item, SubScores, VendorComparisonResult, VendorOffer, VendorScorecard,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

const WEIGHT_PRICE: f64 = 0.25;
const WEIGHT_QUALITY: f64 = 0.30;
const WEIGHT_DELIVERY: f64 = 0.25;
const WEIGHT_RELIABILITY: f64 = 0.10;
const WEIGHT_RISK: f64 = 0.10;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 50 at the market average; each percent below average adds two points.
pub fn price_score(price: f64, avg_market_price: f64) -> f64 {
    if avg_market_price <= 0.0 {
        return 50.0;
    }
    let pct_below = (avg_market_price - price) / avg_market_price * 100.0;
    (50.0 + 2.0 * pct_below).clamp(0.0, 100.0)
}

/// Provided reliability, or one derived from history, quality, delivery,
/// lead time and rating.
pub fn reliability_score(offer: &VendorOffer) -> f64 {
    if let Some(provided) = offer.reliability_score {
        return provided.clamp(0.0, 100.0);
    }
    let lead_time_score = (100.0 - offer.lead_time_days * 3.0).max(0.0);
    (offer.purchase_count as f64 * 5.0
        + offer.quality_score * 0.3
        + offer.on_time_delivery_rate * 0.3
        + lead_time_score * 0.2
        + offer.rating * 4.0)
        .min(100.0)
}

pub fn overall_score(sub: &SubScores) -> f64 {
    round2(
        WEIGHT_PRICE * sub.price
            + WEIGHT_QUALITY * sub.quality
            + WEIGHT_DELIVERY * sub.delivery
            + WEIGHT_RELIABILITY * sub.reliability
            + WEIGHT_RISK * sub.risk,
    )
}

fn pros_and_cons(offer: &VendorOffer, sub: &SubScores, cost_delta_percent: f64) -> (Vec<String>, Vec<String>) {
    let mut pros = Vec::new();
    let mut cons = Vec::new();

    if sub.price >= 60.0 {
        pros.push(format!(
            "Competitive pricing ({:.1}% below average)",
            -cost_delta_percent
        ));
    } else if sub.price < 40.0 {
        cons.push(format!(
            "Above-average pricing ({:.1}% above average)",
            cost_delta_percent
        ));
    }

    if sub.quality >= 90.0 {
        pros.push(format!("High quality score ({:.0})", sub.quality));
    } else if sub.quality < 80.0 {
        cons.push(format!("Quality score below target ({:.0})", sub.quality));
    }

    if sub.delivery >= 95.0 {
        pros.push(format!("Excellent on-time delivery ({:.0}%)", sub.delivery));
    } else if sub.delivery < 85.0 {
        cons.push(format!("Unreliable delivery ({:.0}% on time)", sub.delivery));
    }

    if offer.purchase_count >= 10 {
        pros.push(format!(
            "Established relationship ({} orders)",
            offer.purchase_count
        ));
    } else if offer.purchase_count < 3 {
        cons.push(format!(
            "Limited purchase history ({} orders)",
            offer.purchase_count
        ));
    }

    if offer.risk_score <= 20.0 {
        pros.push(format!("Low vendor risk ({:.0})", offer.risk_score));
    } else if offer.risk_score >= 50.0 {
        cons.push(format!("Elevated vendor risk ({:.0})", offer.risk_score));
    }

    if pros.is_empty() {
        pros.push("Acceptable overall performance".to_string());
    }
    if cons.is_empty() {
        cons.push("No significant concerns".to_string());
    }
    (pros, cons)
}

/// Scores one offer against the market average. Rank is assigned later.
pub fn score_offer(offer: &VendorOffer, avg_market_price: f64) -> VendorScorecard {
    let sub = SubScores {
        price: price_score(offer.avg_price, avg_market_price),
        quality: offer.quality_score.clamp(0.0, 100.0),
        delivery: offer.on_time_delivery_rate.clamp(0.0, 100.0),
        reliability: reliability_score(offer),
        risk: 100.0 - offer.risk_score.clamp(0.0, 100.0),
    };
    let cost_delta = offer.avg_price - avg_market_price;
    let cost_delta_percent = if avg_market_price > 0.0 {
        cost_delta / avg_market_price * 100.0
    } else {
        0.0
    };
    let (pros, cons) = pros_and_cons(offer, &sub, cost_delta_percent);

    VendorScorecard {
        vendor_id: offer.vendor_id.clone(),
        vendor_name: offer.vendor_name.clone(),
        overall_score: overall_score(&sub),
        rank: 0,
        is_recommended: false,
        is_preferred: offer.is_preferred,
        risk_score: offer.risk_score,
        sub_scores: sub,
        avg_price: offer.avg_price,
        purchase_count: offer.purchase_count,
        price_variance: offer.price_variance,
        lead_time_days: offer.lead_time_days,
        cost_delta: round2(cost_delta),
        cost_delta_percent: round2(cost_delta_percent),
        pros,
        cons,
    }
}

/// Ranking order: higher overall score, then preferred vendor, then lower
/// risk score, then vendor id.
pub fn rank_order(a: &VendorScorecard, b: &VendorScorecard) -> Ordering {
    b.overall_score
        .total_cmp(&a.overall_score)
        .then_with(|| b.is_preferred.cmp(&a.is_preferred))
        .then_with(|| a.risk_score.total_cmp(&b.risk_score))
        .then_with(|| a.vendor_id.cmp(&b.vendor_id))
}

/// Sorts scorecards and assigns ranks 1..N; rank 1 is the only recommendation.
pub fn assign_ranks(cards: &mut [VendorScorecard]) {
    cards.sort_by(rank_order);
    for (index, card) in cards.iter_mut().enumerate() {
        card.rank = index + 1;
        card.is_recommended = index == 0;
    }
}

fn best_by<F>(cards: &[VendorScorecard], key: F) -> Option<String>
where
    F: Fn(&VendorScorecard) -> f64,
{
    // `cards` is in rank order, so ties resolve to the better-ranked vendor.
    cards
        .iter()
        .fold(None::<&VendorScorecard>, |best, card| match best {
            Some(b) if key(b) >= key(card) => Some(b),
            _ => Some(card),
        })
        .map(|card| card.vendor_id.clone())
}

fn average_price(offers: &[VendorOffer]) -> f64 {
    let priced: Vec<f64> = offers.iter().map(|o| o.avg_price).filter(|p| *p > 0.0).collect();
    if priced.is_empty() {
        0.0
    } else {
        priced.iter().sum::<f64>() / priced.len() as f64
    }
}

/// Recomputes ranks, category winners and strategy text from the scorecards.
/// Used after any change to the scorecards' overall scores.
pub fn finalize(result: &mut VendorComparisonResult) {
    assign_ranks(&mut result.vendors);
    let item_name = result.item_name.clone();

    match result.vendors.len() {
        0 => {
            result.best_overall = None;
            result.best_value = None;
            result.best_quality = None;
            result.best_reliability = None;
            result.single_source = false;
            result.procurement_strategy = format!(
                "No qualified vendor supplies {}; identify and qualify at least two suppliers",
                item_name
            );
        }
        1 => {
            let only = &result.vendors[0];
            result.best_overall = Some(only.vendor_id.clone());
            result.best_value = None;
            result.best_quality = None;
            result.best_reliability = None;
            result.single_source = true;
            result.procurement_strategy = format!(
                "Single-source dependency: {} is the only vendor for {}; qualify an alternative supplier to reduce supply risk",
                only.vendor_name, item_name
            );
        }
        _ => {
            let cards = &result.vendors;
            result.best_overall = Some(cards[0].vendor_id.clone());
            result.best_value = best_by(cards, |c| c.sub_scores.price);
            result.best_quality = best_by(cards, |c| c.sub_scores.quality);
            result.best_reliability =
                best_by(cards, |c| c.sub_scores.delivery + c.sub_scores.reliability);
            result.single_source = false;

            let mut strategy = format!(
                "Award {} to {} (score {:.1})",
                item_name, cards[0].vendor_name, cards[0].overall_score
            );
            if let Some(value_id) = &result.best_value {
                if value_id != &cards[0].vendor_id {
                    if let Some(value) = cards.iter().find(|c| &c.vendor_id == value_id) {
                        strategy.push_str(&format!(
                            "; {} offers the best price at {:.2}",
                            value.vendor_name, value.avg_price
                        ));
                    }
                }
            }
            strategy.push_str(&format!(
                "; keep {} as secondary source",
                cards[1].vendor_name
            ));
            result.procurement_strategy = strategy;
        }
    }
}

/// Ranks the vendors supplying `item`.
pub fn compare_vendors(
    item: &Item,
    offers: &[VendorOffer],
    generated_at: DateTime<Utc>,
) -> VendorComparisonResult {
    let avg = average_price(offers);
    let vendors: Vec<VendorScorecard> = offers.iter().map(|o| score_offer(o, avg)).collect();

    let mut result = VendorComparisonResult {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        vendors,
        average_price: round2(avg),
        best_overall: None,
        best_value: None,
        best_quality: None,
        best_reliability: None,
        single_source: false,
        procurement_strategy: String::new(),
        source: AssessmentSource::Local,
        generated_at,
    };
    finalize(&mut result);

    tracing::debug!(
        "Ranked {} vendors for item {}: best {:?}",
        result.vendors.len(),
        item.id,
        result.best_overall
    );
    result
}
