use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============ Procurement Records ============

/// Lifecycle status of a vendor relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Onboarding,
}

/// Compliance standing reported for a vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    PendingReview,
}

impl ComplianceStatus {
    /// Parses the loose spellings found in stored records ("non-compliant",
    /// "Pending Review", ...). Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match normalized.as_str() {
            "compliant" => Some(Self::Compliant),
            "noncompliant" => Some(Self::NonCompliant),
            "pendingreview" | "pending" | "underreview" => Some(Self::PendingReview),
            _ => None,
        }
    }
}

/// Financial metrics tracked for a vendor. Every field is optional in storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub credit_limit: Option<f64>,
    pub outstanding_balance: Option<f64>,
    pub payment_terms_days: Option<u32>,
    pub total_spend: Option<f64>,
}

/// Performance metrics tracked for a vendor. Rates and scores are 0-100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub on_time_delivery_rate: Option<f64>,
    pub quality_score: Option<f64>,
    pub defect_rate: Option<f64>,
    pub avg_response_time_hours: Option<f64>,
}

/// A supplier as stored by the procurement system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorProfile {
    /// Vendor identifier. Must be non-empty.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: VendorStatus,
    #[serde(default)]
    pub financial: FinancialMetrics,
    #[serde(default)]
    pub performance: PerformanceMetrics,
    #[serde(default)]
    pub compliance_status: Option<ComplianceStatus>,
    #[serde(default)]
    pub certification_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Approved,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
}

/// One line of a purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub item_id: Option<String>,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl LineItem {
    pub fn total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// A purchase order placed with a vendor. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: String,
    pub vendor_id: String,
    pub order_date: NaiveDate,
    pub status: PurchaseStatus,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    /// Days past due at payment time.
    #[serde(default)]
    pub payment_delay_days: Option<i64>,
    #[serde(default)]
    pub expected_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub actual_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub on_time: Option<bool>,
    /// 1-5 rating given on receipt.
    #[serde(default)]
    pub quality_rating: Option<f64>,
    #[serde(default)]
    pub defect_count: Option<u32>,
    #[serde(default)]
    pub return_count: Option<u32>,
    #[serde(default)]
    pub received_quantity: Option<f64>,
    #[serde(default)]
    pub accepted_quantity: Option<f64>,
}

impl PurchaseRecord {
    pub fn total_amount(&self) -> f64 {
        self.line_items.iter().map(LineItem::total).sum()
    }

    pub fn total_quantity(&self) -> f64 {
        self.line_items.iter().map(|l| l.quantity).sum()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == PurchaseStatus::Cancelled
    }

    /// Delivery outcome: the explicit flag when recorded, otherwise computed
    /// from expected vs actual delivery dates. `None` if not yet delivered.
    pub fn delivered_on_time(&self) -> Option<bool> {
        if let Some(flag) = self.on_time {
            return Some(flag);
        }
        match (self.expected_delivery_date, self.actual_delivery_date) {
            (Some(expected), Some(actual)) => Some(actual <= expected),
            _ => None,
        }
    }

    /// Observed lead time in days between order placement and delivery.
    pub fn lead_time_days(&self) -> Option<i64> {
        self.actual_delivery_date
            .map(|delivered| (delivered - self.order_date).num_days())
            .filter(|days| *days >= 0)
    }

    /// Lines of this order that refer to the given catalog item.
    pub fn lines_for_item<'a>(&'a self, item_id: &'a str) -> impl Iterator<Item = &'a LineItem> {
        self.line_items
            .iter()
            .filter(move |line| line.item_id.as_deref() == Some(item_id))
    }
}

/// A catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub current_stock: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Mapping of an item to a vendor that supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorItem {
    pub vendor_id: String,
    pub item_id: String,
    pub unit_price: f64,
    #[serde(default)]
    pub lead_time_days: Option<u32>,
    #[serde(default)]
    pub is_preferred: bool,
    #[serde(default)]
    pub min_order_quantity: Option<f64>,
}

// ============ Risk Assessment ============

/// Discrete risk bucket derived from a 0-100 risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// The single banding used everywhere a level is emitted:
    /// [0,20] low, [21,40] medium, [41,60] high, [61,100] critical.
    /// The score is rounded to the nearest integer before banding.
    pub fn from_score(score: f64) -> Self {
        let rounded = score.round();
        if rounded <= 20.0 {
            RiskLevel::Low
        } else if rounded <= 40.0 {
            RiskLevel::Medium
        } else if rounded <= 60.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Number of tiers between two levels.
    pub fn tier_distance(&self, other: RiskLevel) -> u8 {
        (*self as i8 - other as i8).unsigned_abs()
    }
}

/// Risk category a factor belongs to. Unknown names from external sources
/// are kept as `Other` and weighted with the default weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RiskCategory {
    Financial,
    Operational,
    Compliance,
    SupplyChain,
    Reputational,
    Market,
    Geopolitical,
    Other(String),
}

impl RiskCategory {
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match key.as_str() {
            "financial" => Self::Financial,
            "operational" => Self::Operational,
            "compliance" => Self::Compliance,
            "supplychain" => Self::SupplyChain,
            "reputational" => Self::Reputational,
            "market" => Self::Market,
            "geopolitical" => Self::Geopolitical,
            _ => Self::Other(raw.trim().to_lowercase()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Financial => "financial",
            Self::Operational => "operational",
            Self::Compliance => "compliance",
            Self::SupplyChain => "supply_chain",
            Self::Reputational => "reputational",
            Self::Market => "market",
            Self::Geopolitical => "geopolitical",
            Self::Other(name) => name,
        }
    }

    /// Fixed aggregation weight of the category.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Financial | Self::Operational => 0.25,
            Self::Compliance => 0.20,
            Self::SupplyChain => 0.15,
            Self::Reputational | Self::Market | Self::Geopolitical => 0.05,
            Self::Other(_) => 0.05,
        }
    }
}

impl Serialize for RiskCategory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for RiskCategory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(RiskCategory::parse(&raw))
    }
}

/// Severity of a single factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Severity::Critical
        } else if score >= 60.0 {
            Severity::High
        } else if score >= 35.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" | "moderate" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" | "severe" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// One categorized, weighted contribution to a vendor's overall risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub category: RiskCategory,
    /// Sub-aspect within the category, e.g. "credit_utilization".
    pub name: String,
    /// 0-100 severity score.
    pub score: f64,
    pub weight: f64,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
}

/// Where the surfaced assessment score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    /// Deterministic local computation only.
    Local,
    /// External provider result accepted after validation.
    External,
    /// External provider result whose score was replaced by the local one.
    Corrected,
}

/// Monthly risk proxy derived from purchase history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Calendar month, "YYYY-MM".
    pub period: String,
    pub score: f64,
    pub orders: usize,
}

/// Standing of a vendor among its peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerComparison {
    /// Share of peers (0-100) carrying a strictly higher risk score.
    pub percentile: f64,
    pub peer_count: usize,
    pub peer_average: f64,
}

/// Complete risk assessment for a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub vendor_id: String,
    pub vendor_name: String,
    pub assessed_at: DateTime<Utc>,
    /// 0 = no risk, 100 = maximum risk. Always an integer value.
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub trend: Vec<TrendPoint>,
    pub peer_comparison: Option<PeerComparison>,
    pub source: AssessmentSource,
    /// 0-1 confidence in the surfaced result.
    pub confidence: f64,
}

impl RiskAssessment {
    /// True when the level is the banding of the score.
    pub fn is_consistent(&self) -> bool {
        (0.0..=100.0).contains(&self.overall_score)
            && self.risk_level == RiskLevel::from_score(self.overall_score)
    }
}

// ============ Vendor Comparison ============

/// Per-vendor inputs to the item ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorOffer {
    pub vendor_id: String,
    pub vendor_name: String,
    pub avg_price: f64,
    pub quality_score: f64,
    pub on_time_delivery_rate: f64,
    pub purchase_count: usize,
    pub price_variance: f64,
    /// Provided reliability; derived when absent.
    pub reliability_score: Option<f64>,
    pub risk_score: f64,
    pub lead_time_days: f64,
    pub is_preferred: bool,
    /// Average 1-5 quality rating.
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub price: f64,
    pub quality: f64,
    pub delivery: f64,
    pub reliability: f64,
    /// 100 minus the vendor's risk score; higher is better.
    pub risk: f64,
}

/// Scorecard for one vendor of a compared item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorScorecard {
    pub vendor_id: String,
    pub vendor_name: String,
    pub overall_score: f64,
    /// 1 = best.
    pub rank: usize,
    pub is_recommended: bool,
    pub is_preferred: bool,
    pub risk_score: f64,
    pub sub_scores: SubScores,
    pub avg_price: f64,
    pub purchase_count: usize,
    pub price_variance: f64,
    pub lead_time_days: f64,
    /// Price minus the average price across compared vendors.
    pub cost_delta: f64,
    pub cost_delta_percent: f64,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

/// Ranking of the vendors supplying one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorComparisonResult {
    pub item_id: String,
    pub item_name: String,
    pub vendors: Vec<VendorScorecard>,
    pub average_price: f64,
    pub best_overall: Option<String>,
    pub best_value: Option<String>,
    pub best_quality: Option<String>,
    pub best_reliability: Option<String>,
    pub single_source: bool,
    pub procurement_strategy: String,
    pub source: AssessmentSource,
    pub generated_at: DateTime<Utc>,
}

// ============ Forecasts ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Ok,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockOutForecast {
    pub item_id: String,
    pub item_name: String,
    pub status: ForecastStatus,
    pub current_stock: Option<f64>,
    pub avg_daily_usage: f64,
    /// `None` when usage is zero (never runs out) or stock is unknown.
    pub days_until_stock_out: Option<u32>,
    pub predicted_stock_out_date: Option<NaiveDate>,
    pub risk_level: RiskLevel,
    pub reorder_point: u32,
    pub suggested_order_quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandTrend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    pub item_id: String,
    pub item_name: String,
    /// Average monthly quantity over the most recent three months.
    pub current_monthly_demand: f64,
    /// Average monthly quantity over the three months before that.
    pub previous_monthly_demand: f64,
    pub growth_rate: f64,
    pub predicted_next_month_demand: f64,
    pub trend: DemandTrend,
    pub confidence: f64,
    pub observed_months: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingForecast {
    pub item_id: String,
    pub item_name: String,
    pub current_avg_price: f64,
    pub previous_avg_price: f64,
    pub price_change_percent: f64,
    pub predicted_next_price: f64,
    pub trend: PriceTrend,
    /// Coefficient of variation of historical unit prices, in percent.
    pub volatility_percent: f64,
    pub volatility: Volatility,
    pub best_vendor: Option<String>,
    pub best_vendor_price: Option<f64>,
    pub savings_opportunity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTrend {
    Improving,
    Worsening,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentHealth {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    None,
    Watch,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRiskForecast {
    pub vendor_id: String,
    pub vendor_name: String,
    pub current_risk_score: f64,
    pub predicted_risk_score: f64,
    pub predicted_risk_level: RiskLevel,
    pub delivery_trend: PerformanceTrend,
    pub quality_trend: PerformanceTrend,
    pub overall_trend: PerformanceTrend,
    pub payment_health: PaymentHealth,
    pub alert_level: AlertLevel,
}

/// Portfolio-level roll-up of the four forecast collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub items_analyzed: usize,
    pub vendors_analyzed: usize,
    pub critical_stock_outs: usize,
    pub high_stock_outs: usize,
    pub rising_demand_items: usize,
    pub increasing_price_items: usize,
    pub at_risk_vendors: usize,
    pub total_savings_opportunity: f64,
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub generated_at: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub stock_out: Vec<StockOutForecast>,
    pub demand: Vec<DemandForecast>,
    pub pricing: Vec<PricingForecast>,
    pub vendor_risk: Vec<VendorRiskForecast>,
    pub summary: ForecastSummary,
}

// ============ API Payloads ============

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiQueryParams {
    #[serde(default)]
    pub ai: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchAssessmentRequest {
    /// Vendors to assess; all vendors when omitted.
    #[serde(default)]
    pub vendor_ids: Option<Vec<String>>,
    #[serde(default)]
    pub ai: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub vendor_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAssessmentResponse {
    pub assessments: Vec<RiskAssessment>,
    pub failures: Vec<BatchFailure>,
}
