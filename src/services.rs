//! Orchestration of store reads, local analytics and the optional provider.
//!
//! Every service works on a snapshot read from the store at call time. The
//! local computation always runs first; the provider can only refine it.

use crate::ai_validator;
use crate::errors::{AppError, ResultExt};
use crate::forecast::{
    forecast_demand, forecast_pricing, forecast_stock_out, forecast_vendor_risk, summarize,
};
use crate::metrics::{self, VendorMetrics};
use crate::models::{
    BatchAssessmentResponse, BatchFailure, DemandForecast, ForecastReport, Item, PricingForecast,
    PurchaseRecord, RiskAssessment, StockOutForecast, VendorComparisonResult, VendorItem,
    VendorOffer, VendorProfile, VendorRiskForecast,
};
use crate::prompts;
use crate::provider_client::{Provider, ProviderGateway, RiskProvider};
use crate::ranking;
use crate::risk;
use crate::storage::{ProcurementStore, Store};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Local risk score of every vendor that normalizes cleanly.
fn local_scores(vendors: &[VendorProfile], purchases: &[PurchaseRecord]) -> HashMap<String, f64> {
    vendors
        .iter()
        .filter_map(|vendor| match metrics::normalize(vendor, purchases) {
            Ok(m) => Some((m.vendor_id.clone(), risk::overall_score(&risk::analyze_factors(&m)))),
            Err(e) => {
                tracing::warn!("Skipping vendor '{}' in peer scores: {}", vendor.name, e);
                None
            }
        })
        .collect()
}

fn peers_excluding(scores: &HashMap<String, f64>, vendor_id: &str) -> Vec<f64> {
    scores
        .iter()
        .filter(|(id, _)| id.as_str() != vendor_id)
        .map(|(_, score)| *score)
        .collect()
}

// ============ Vendor risk ============

#[derive(Clone)]
pub struct RiskService<S = Store, P = Provider> {
    store: S,
    gateway: ProviderGateway<P>,
}

impl<S, P> RiskService<S, P>
where
    S: ProcurementStore + Clone + 'static,
    P: RiskProvider + Clone + 'static,
{
    pub fn new(store: S, gateway: ProviderGateway<P>) -> Self {
        Self { store, gateway }
    }

    /// Peer scores are optional context; a failed read leaves them empty.
    async fn peer_scores(&self) -> HashMap<String, f64> {
        let vendors = match self.store.list_vendors().await {
            Ok(vendors) => vendors,
            Err(e) => {
                tracing::warn!("Peer comparison unavailable, vendors not readable: {}", e);
                return HashMap::new();
            }
        };
        let purchases = match self.store.list_purchases().await {
            Ok(purchases) => purchases,
            Err(e) => {
                tracing::warn!("Peer comparison unavailable, purchases not readable: {}", e);
                return HashMap::new();
            }
        };
        local_scores(&vendors, &purchases)
    }

    /// Metrics and deterministic assessment for one vendor.
    pub async fn local_assessment(
        &self,
        vendor_id: &str,
    ) -> Result<(VendorMetrics, RiskAssessment), AppError> {
        let vendor = self
            .store
            .get_vendor(vendor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vendor {} not found", vendor_id)))?;
        let purchases = self
            .store
            .purchases_for_vendor(vendor_id)
            .await
            .with_context(|| format!("Loading history for vendor {}", vendor_id))?;

        let metrics = metrics::normalize(&vendor, &purchases)?;
        let assessment = risk::assess(&metrics, &purchases, Utc::now());
        Ok((metrics, assessment))
    }

    async fn assess_with_peers(
        &self,
        vendor_id: &str,
        use_ai: bool,
        peers: &HashMap<String, f64>,
    ) -> Result<RiskAssessment, AppError> {
        let (metrics, mut local) = self.local_assessment(vendor_id).await?;
        local.peer_comparison =
            risk::peer_comparison(local.overall_score, &peers_excluding(peers, vendor_id));

        if !use_ai || !self.gateway.is_enabled() {
            return Ok(local);
        }

        let prompt = prompts::risk_prompt(&metrics, &local);
        match self.gateway.complete(&prompt).await {
            Ok(raw) => Ok(ai_validator::validate_risk_response(&raw, &local)),
            Err(e) => {
                tracing::warn!(
                    "Provider unavailable for vendor {}, returning local assessment: {}",
                    vendor_id,
                    e
                );
                Ok(local)
            }
        }
    }

    /// Full assessment of one vendor, including peer standing.
    pub async fn assess_vendor(
        &self,
        vendor_id: &str,
        use_ai: bool,
    ) -> Result<RiskAssessment, AppError> {
        let peers = self.peer_scores().await;
        self.assess_with_peers(vendor_id, use_ai, &peers).await
    }

    /// Assesses many vendors with at most `concurrency` in flight. A failing
    /// vendor is reported and never aborts the batch.
    pub async fn assess_batch(
        &self,
        vendor_ids: Option<Vec<String>>,
        use_ai: bool,
        concurrency: usize,
    ) -> Result<BatchAssessmentResponse, AppError> {
        let batch_id = Uuid::new_v4();
        let ids = match vendor_ids {
            Some(ids) => ids,
            None => self
                .store
                .list_vendors()
                .await?
                .into_iter()
                .map(|v| v.id)
                .collect(),
        };
        tracing::info!(
            "Batch {}: assessing {} vendors (ai={}, concurrency={})",
            batch_id,
            ids.len(),
            use_ai,
            concurrency
        );

        let peers = Arc::new(self.peer_scores().await);
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, vendor_id) in ids.iter().cloned().enumerate() {
            let service = self.clone();
            let peers = peers.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => service.assess_with_peers(&vendor_id, use_ai, &peers).await,
                    Err(_) => Err(AppError::InternalError("Batch semaphore closed".to_string())),
                };
                (index, vendor_id, outcome)
            });
        }

        let mut results = Vec::with_capacity(ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => tracing::error!("Batch {}: assessment task panicked: {}", batch_id, e),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);

        let mut response = BatchAssessmentResponse {
            assessments: Vec::new(),
            failures: Vec::new(),
        };
        for (_, vendor_id, outcome) in results {
            match outcome {
                Ok(assessment) => response.assessments.push(assessment),
                Err(e) => {
                    tracing::warn!("Batch {}: vendor {} failed: {}", batch_id, vendor_id, e);
                    response.failures.push(BatchFailure {
                        vendor_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Batch {} finished: {} assessed, {} failed",
            batch_id,
            response.assessments.len(),
            response.failures.len()
        );
        Ok(response)
    }
}

// ============ Item comparison ============

/// Builds the ranking input for one vendor of an item from its catalog
/// entry, normalized metrics and purchase history.
pub fn build_offer(
    item_id: &str,
    vendor_item: &VendorItem,
    metrics: &VendorMetrics,
    risk_score: f64,
    purchases: &[PurchaseRecord],
) -> VendorOffer {
    let relevant: Vec<&PurchaseRecord> = purchases
        .iter()
        .filter(|p| p.vendor_id == vendor_item.vendor_id && !p.is_cancelled())
        .filter(|p| p.lines_for_item(item_id).next().is_some())
        .collect();
    let prices: Vec<f64> = relevant
        .iter()
        .flat_map(|p| p.lines_for_item(item_id).map(|l| l.unit_price))
        .filter(|price| *price > 0.0)
        .collect();

    let avg_price = if prices.is_empty() {
        vendor_item.unit_price
    } else {
        prices.iter().sum::<f64>() / prices.len() as f64
    };

    VendorOffer {
        vendor_id: vendor_item.vendor_id.clone(),
        vendor_name: metrics.vendor_name.clone(),
        avg_price,
        quality_score: metrics.quality_score,
        on_time_delivery_rate: metrics.on_time_delivery_rate,
        purchase_count: relevant.len(),
        price_variance: crate::forecast::pricing::coefficient_of_variation(&prices),
        reliability_score: None,
        risk_score,
        lead_time_days: vendor_item
            .lead_time_days
            .map(f64::from)
            .unwrap_or(metrics.lead_time_days),
        is_preferred: vendor_item.is_preferred,
        rating: metrics.avg_quality_rating,
    }
}

#[derive(Clone)]
pub struct ComparisonService<S = Store, P = Provider> {
    store: S,
    gateway: ProviderGateway<P>,
}

impl<S, P> ComparisonService<S, P>
where
    S: ProcurementStore,
    P: RiskProvider,
{
    pub fn new(store: S, gateway: ProviderGateway<P>) -> Self {
        Self { store, gateway }
    }

    pub async fn compare_item(
        &self,
        item_id: &str,
        use_ai: bool,
    ) -> Result<VendorComparisonResult, AppError> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))?;
        let vendor_items = self.store.vendor_items_for_item(item_id).await?;

        let mut offers = Vec::with_capacity(vendor_items.len());
        for vendor_item in &vendor_items {
            let Some(vendor) = self.store.get_vendor(&vendor_item.vendor_id).await? else {
                tracing::warn!(
                    "Item {} lists unknown vendor {}",
                    item_id,
                    vendor_item.vendor_id
                );
                continue;
            };
            let purchases = self.store.purchases_for_vendor(&vendor.id).await?;
            let metrics = match metrics::normalize(&vendor, &purchases) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("Skipping vendor '{}' for item {}: {}", vendor.name, item_id, e);
                    continue;
                }
            };
            let risk_score = risk::overall_score(&risk::analyze_factors(&metrics));
            offers.push(build_offer(item_id, vendor_item, &metrics, risk_score, &purchases));
        }

        let local = ranking::compare_vendors(&item, &offers, Utc::now());
        tracing::info!(
            "Compared {} vendors for item {}: best overall {:?}",
            local.vendors.len(),
            item_id,
            local.best_overall
        );

        if !use_ai || !self.gateway.is_enabled() || local.vendors.is_empty() {
            return Ok(local);
        }

        match self.gateway.complete(&prompts::comparison_prompt(&local)).await {
            Ok(raw) => Ok(ai_validator::validate_comparison_response(&raw, &local)),
            Err(e) => {
                tracing::warn!(
                    "Provider unavailable for item {}, returning local comparison: {}",
                    item_id,
                    e
                );
                Ok(local)
            }
        }
    }
}

// ============ Forecasts ============

/// Store snapshot shared by the forecast generators.
struct ForecastInputs {
    items: Vec<Item>,
    vendors: Vec<VendorProfile>,
    purchases: Vec<PurchaseRecord>,
    vendor_items: Vec<VendorItem>,
}

#[derive(Clone)]
pub struct ForecastService<S = Store> {
    store: S,
}

impl<S: ProcurementStore> ForecastService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn inputs(&self) -> Result<ForecastInputs, AppError> {
        Ok(ForecastInputs {
            items: self.store.list_items().await?,
            vendors: self.store.list_vendors().await?,
            purchases: self.store.list_purchases().await?,
            vendor_items: self.store.list_vendor_items().await?,
        })
    }

    fn stock_out_of(inputs: &ForecastInputs, as_of: NaiveDate) -> Vec<StockOutForecast> {
        inputs
            .items
            .iter()
            .map(|item| forecast_stock_out(item, &inputs.purchases, as_of))
            .collect()
    }

    fn demand_of(inputs: &ForecastInputs, as_of: NaiveDate) -> Vec<DemandForecast> {
        inputs
            .items
            .iter()
            .map(|item| forecast_demand(item, &inputs.purchases, as_of))
            .collect()
    }

    fn pricing_of(inputs: &ForecastInputs, as_of: NaiveDate) -> Vec<PricingForecast> {
        inputs
            .items
            .iter()
            .map(|item| {
                let offers: Vec<VendorItem> = inputs
                    .vendor_items
                    .iter()
                    .filter(|vi| vi.item_id == item.id)
                    .cloned()
                    .collect();
                forecast_pricing(item, &inputs.purchases, &offers, as_of)
            })
            .collect()
    }

    fn vendor_risk_of(inputs: &ForecastInputs, as_of: NaiveDate) -> Vec<VendorRiskForecast> {
        inputs
            .vendors
            .iter()
            .filter_map(|vendor| match metrics::normalize(vendor, &inputs.purchases) {
                Ok(m) => {
                    let current = risk::overall_score(&risk::analyze_factors(&m));
                    Some(forecast_vendor_risk(&m, current, &inputs.purchases, as_of))
                }
                Err(e) => {
                    tracing::warn!("Skipping vendor '{}' in risk forecast: {}", vendor.name, e);
                    None
                }
            })
            .collect()
    }

    pub async fn stock_out(&self, as_of: NaiveDate) -> Result<Vec<StockOutForecast>, AppError> {
        Ok(Self::stock_out_of(&self.inputs().await?, as_of))
    }

    pub async fn demand(&self, as_of: NaiveDate) -> Result<Vec<DemandForecast>, AppError> {
        Ok(Self::demand_of(&self.inputs().await?, as_of))
    }

    pub async fn pricing(&self, as_of: NaiveDate) -> Result<Vec<PricingForecast>, AppError> {
        Ok(Self::pricing_of(&self.inputs().await?, as_of))
    }

    pub async fn vendor_risk(&self, as_of: NaiveDate) -> Result<Vec<VendorRiskForecast>, AppError> {
        Ok(Self::vendor_risk_of(&self.inputs().await?, as_of))
    }

    /// All four forecasts and their summary from one store snapshot.
    pub async fn report(&self, as_of: NaiveDate) -> Result<ForecastReport, AppError> {
        let inputs = self.inputs().await?;
        let stock_out = Self::stock_out_of(&inputs, as_of);
        let demand = Self::demand_of(&inputs, as_of);
        let pricing = Self::pricing_of(&inputs, as_of);
        let vendor_risk = Self::vendor_risk_of(&inputs, as_of);
        let summary = summarize(&stock_out, &demand, &pricing, &vendor_risk);

        tracing::info!(
            "Forecast report as of {}: {} items, {} vendors, {} alerts",
            as_of,
            summary.items_analyzed,
            summary.vendors_analyzed,
            summary.alerts.len()
        );

        Ok(ForecastReport {
            generated_at: Utc::now(),
            as_of,
            stock_out,
            demand,
            pricing,
            vendor_risk,
            summary,
        })
    }
}
