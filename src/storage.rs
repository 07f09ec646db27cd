//! Read-only access to procurement records.
//!
//! The analytics never write. Two backends exist: Postgres through sqlx and
//! an in-memory snapshot loaded from a JSON file. [`Store`] dispatches
//! between them so handlers hold a single concrete type.

use crate::errors::{AppError, ResultExt};
use crate::models::{
    ComplianceStatus, FinancialMetrics, Item, LineItem, PaymentStatus, PerformanceMetrics,
    PurchaseRecord, PurchaseStatus, VendorItem, VendorProfile, VendorStatus,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

pub trait ProcurementStore: Send + Sync {
    fn get_vendor(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<VendorProfile>, AppError>> + Send;

    fn list_vendors(&self) -> impl Future<Output = Result<Vec<VendorProfile>, AppError>> + Send;

    fn purchases_for_vendor(
        &self,
        vendor_id: &str,
    ) -> impl Future<Output = Result<Vec<PurchaseRecord>, AppError>> + Send;

    fn list_purchases(&self) -> impl Future<Output = Result<Vec<PurchaseRecord>, AppError>> + Send;

    fn get_item(&self, id: &str) -> impl Future<Output = Result<Option<Item>, AppError>> + Send;

    fn list_items(&self) -> impl Future<Output = Result<Vec<Item>, AppError>> + Send;

    fn vendor_items_for_item(
        &self,
        item_id: &str,
    ) -> impl Future<Output = Result<Vec<VendorItem>, AppError>> + Send;

    fn list_vendor_items(&self) -> impl Future<Output = Result<Vec<VendorItem>, AppError>> + Send;
}

// ============ In-memory snapshot ============

/// Full dump of the procurement tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub vendors: Vec<VendorProfile>,
    #[serde(default)]
    pub purchases: Vec<PurchaseRecord>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub vendor_items: Vec<VendorItem>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    snapshot: Arc<Snapshot>,
}

impl InMemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let snapshot: Snapshot = serde_json::from_str(raw)
            .map_err(AppError::from)
            .context("Invalid snapshot JSON")?;
        Ok(Self::new(snapshot))
    }

    /// Loads a snapshot file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::InternalError(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;
        let store = Self::from_json(&raw)?;
        tracing::info!(
            "Loaded snapshot {}: {} vendors, {} purchases, {} items",
            path.display(),
            store.snapshot.vendors.len(),
            store.snapshot.purchases.len(),
            store.snapshot.items.len()
        );
        Ok(store)
    }
}

impl ProcurementStore for InMemoryStore {
    async fn get_vendor(&self, id: &str) -> Result<Option<VendorProfile>, AppError> {
        Ok(self.snapshot.vendors.iter().find(|v| v.id == id).cloned())
    }

    async fn list_vendors(&self) -> Result<Vec<VendorProfile>, AppError> {
        Ok(self.snapshot.vendors.clone())
    }

    async fn purchases_for_vendor(&self, vendor_id: &str) -> Result<Vec<PurchaseRecord>, AppError> {
        Ok(self
            .snapshot
            .purchases
            .iter()
            .filter(|p| p.vendor_id == vendor_id)
            .cloned()
            .collect())
    }

    async fn list_purchases(&self) -> Result<Vec<PurchaseRecord>, AppError> {
        Ok(self.snapshot.purchases.clone())
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>, AppError> {
        Ok(self.snapshot.items.iter().find(|i| i.id == id).cloned())
    }

    async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        Ok(self.snapshot.items.clone())
    }

    async fn vendor_items_for_item(&self, item_id: &str) -> Result<Vec<VendorItem>, AppError> {
        Ok(self
            .snapshot
            .vendor_items
            .iter()
            .filter(|vi| vi.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn list_vendor_items(&self) -> Result<Vec<VendorItem>, AppError> {
        Ok(self.snapshot.vendor_items.clone())
    }
}

// ============ Postgres ============

/// Parses a snake_case text column into one of the model enums.
fn parse_text<T: DeserializeOwned>(raw: Option<&str>) -> Option<T> {
    let value = raw?.trim().to_lowercase().replace([' ', '-'], "_");
    serde_json::from_value(serde_json::Value::String(value)).ok()
}

fn non_negative(v: Option<i32>) -> Option<u32> {
    v.and_then(|n| u32::try_from(n).ok())
}

#[derive(Debug, sqlx::FromRow)]
struct VendorRow {
    id: String,
    name: String,
    category: Option<String>,
    status: Option<String>,
    credit_limit: Option<f64>,
    outstanding_balance: Option<f64>,
    payment_terms_days: Option<i32>,
    total_spend: Option<f64>,
    on_time_delivery_rate: Option<f64>,
    quality_score: Option<f64>,
    defect_rate: Option<f64>,
    avg_response_time_hours: Option<f64>,
    compliance_status: Option<String>,
    certification_count: Option<i32>,
}

impl From<VendorRow> for VendorProfile {
    fn from(row: VendorRow) -> Self {
        VendorProfile {
            id: row.id,
            name: row.name,
            category: row.category,
            status: parse_text::<VendorStatus>(row.status.as_deref()).unwrap_or_default(),
            financial: FinancialMetrics {
                credit_limit: row.credit_limit,
                outstanding_balance: row.outstanding_balance,
                payment_terms_days: non_negative(row.payment_terms_days),
                total_spend: row.total_spend,
            },
            performance: PerformanceMetrics {
                on_time_delivery_rate: row.on_time_delivery_rate,
                quality_score: row.quality_score,
                defect_rate: row.defect_rate,
                avg_response_time_hours: row.avg_response_time_hours,
            },
            compliance_status: row
                .compliance_status
                .as_deref()
                .and_then(ComplianceStatus::parse),
            certification_count: non_negative(row.certification_count),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: String,
    vendor_id: String,
    order_date: NaiveDate,
    status: String,
    line_items: Json<Vec<LineItem>>,
    payment_status: Option<String>,
    payment_delay_days: Option<i32>,
    expected_delivery_date: Option<NaiveDate>,
    actual_delivery_date: Option<NaiveDate>,
    on_time: Option<bool>,
    quality_rating: Option<f64>,
    defect_count: Option<i32>,
    return_count: Option<i32>,
    received_quantity: Option<f64>,
    accepted_quantity: Option<f64>,
}

impl TryFrom<PurchaseRow> for PurchaseRecord {
    type Error = AppError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        let status = parse_text::<PurchaseStatus>(Some(&row.status)).ok_or_else(|| {
            AppError::InvalidData(format!(
                "purchase {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(PurchaseRecord {
            id: row.id,
            vendor_id: row.vendor_id,
            order_date: row.order_date,
            status,
            line_items: row.line_items.0,
            payment_status: parse_text::<PaymentStatus>(row.payment_status.as_deref()),
            payment_delay_days: row.payment_delay_days.map(i64::from),
            expected_delivery_date: row.expected_delivery_date,
            actual_delivery_date: row.actual_delivery_date,
            on_time: row.on_time,
            quality_rating: row.quality_rating,
            defect_count: non_negative(row.defect_count),
            return_count: non_negative(row.return_count),
            received_quantity: row.received_quantity,
            accepted_quantity: row.accepted_quantity,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    name: String,
    category: Option<String>,
    current_stock: Option<f64>,
    unit: Option<String>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            name: row.name,
            category: row.category,
            current_stock: row.current_stock,
            unit: row.unit,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VendorItemRow {
    vendor_id: String,
    item_id: String,
    unit_price: f64,
    lead_time_days: Option<i32>,
    is_preferred: Option<bool>,
    min_order_quantity: Option<f64>,
}

impl From<VendorItemRow> for VendorItem {
    fn from(row: VendorItemRow) -> Self {
        VendorItem {
            vendor_id: row.vendor_id,
            item_id: row.item_id,
            unit_price: row.unit_price,
            lead_time_days: non_negative(row.lead_time_days),
            is_preferred: row.is_preferred.unwrap_or(false),
            min_order_quantity: row.min_order_quantity,
        }
    }
}

const VENDOR_COLUMNS: &str = "id, name, category, status, credit_limit, outstanding_balance, \
     payment_terms_days, total_spend, on_time_delivery_rate, quality_score, defect_rate, \
     avg_response_time_hours, compliance_status, certification_count";

const PURCHASE_COLUMNS: &str = "id, vendor_id, order_date, status, line_items, payment_status, \
     payment_delay_days, expected_delivery_date, actual_delivery_date, on_time, quality_rating, \
     defect_count, return_count, received_quantity, accepted_quantity";

const ITEM_COLUMNS: &str = "id, name, category, current_stock, unit";

const VENDOR_ITEM_COLUMNS: &str =
    "vendor_id, item_id, unit_price, lead_time_days, is_preferred, min_order_quantity";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Converts purchase rows. Malformed rows are skipped with a warning.
fn convert_purchases(rows: Vec<PurchaseRow>) -> Vec<PurchaseRecord> {
    rows.into_iter()
        .filter_map(|row| match PurchaseRecord::try_from(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping purchase row: {}", e);
                None
            }
        })
        .collect()
}

impl ProcurementStore for PgStore {
    async fn get_vendor(&self, id: &str) -> Result<Option<VendorProfile>, AppError> {
        let row = sqlx::query_as::<_, VendorRow>(&format!(
            "SELECT {} FROM vendors WHERE id = $1",
            VENDOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load vendor {}", id))?;
        Ok(row.map(VendorProfile::from))
    }

    async fn list_vendors(&self) -> Result<Vec<VendorProfile>, AppError> {
        let rows = sqlx::query_as::<_, VendorRow>(&format!(
            "SELECT {} FROM vendors ORDER BY id",
            VENDOR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list vendors")?;
        Ok(rows.into_iter().map(VendorProfile::from).collect())
    }

    async fn purchases_for_vendor(&self, vendor_id: &str) -> Result<Vec<PurchaseRecord>, AppError> {
        let rows = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases WHERE vendor_id = $1 ORDER BY order_date",
            PURCHASE_COLUMNS
        ))
        .bind(vendor_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load purchases for vendor {}", vendor_id))?;
        Ok(convert_purchases(rows))
    }

    async fn list_purchases(&self) -> Result<Vec<PurchaseRecord>, AppError> {
        let rows = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases ORDER BY order_date",
            PURCHASE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list purchases")?;
        Ok(convert_purchases(rows))
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>, AppError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load item {}", id))?;
        Ok(row.map(Item::from))
    }

    async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items ORDER BY id",
            ITEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list items")?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn vendor_items_for_item(&self, item_id: &str) -> Result<Vec<VendorItem>, AppError> {
        let rows = sqlx::query_as::<_, VendorItemRow>(&format!(
            "SELECT {} FROM vendor_items WHERE item_id = $1 ORDER BY vendor_id",
            VENDOR_ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load vendor items for {}", item_id))?;
        Ok(rows.into_iter().map(VendorItem::from).collect())
    }

    async fn list_vendor_items(&self) -> Result<Vec<VendorItem>, AppError> {
        let rows = sqlx::query_as::<_, VendorItemRow>(&format!(
            "SELECT {} FROM vendor_items ORDER BY item_id, vendor_id",
            VENDOR_ITEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list vendor items")?;
        Ok(rows.into_iter().map(VendorItem::from).collect())
    }
}

// ============ Dispatch ============

#[derive(Debug, Clone)]
pub enum Store {
    Postgres(PgStore),
    Memory(InMemoryStore),
}

impl ProcurementStore for Store {
    async fn get_vendor(&self, id: &str) -> Result<Option<VendorProfile>, AppError> {
        match self {
            Store::Postgres(s) => s.get_vendor(id).await,
            Store::Memory(s) => s.get_vendor(id).await,
        }
    }

    async fn list_vendors(&self) -> Result<Vec<VendorProfile>, AppError> {
        match self {
            Store::Postgres(s) => s.list_vendors().await,
            Store::Memory(s) => s.list_vendors().await,
        }
    }

    async fn purchases_for_vendor(&self, vendor_id: &str) -> Result<Vec<PurchaseRecord>, AppError> {
        match self {
            Store::Postgres(s) => s.purchases_for_vendor(vendor_id).await,
            Store::Memory(s) => s.purchases_for_vendor(vendor_id).await,
        }
    }

    async fn list_purchases(&self) -> Result<Vec<PurchaseRecord>, AppError> {
        match self {
            Store::Postgres(s) => s.list_purchases().await,
            Store::Memory(s) => s.list_purchases().await,
        }
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>, AppError> {
        match self {
            Store::Postgres(s) => s.get_item(id).await,
            Store::Memory(s) => s.get_item(id).await,
        }
    }

    async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        match self {
            Store::Postgres(s) => s.list_items().await,
            Store::Memory(s) => s.list_items().await,
        }
    }

    async fn vendor_items_for_item(&self, item_id: &str) -> Result<Vec<VendorItem>, AppError> {
        match self {
            Store::Postgres(s) => s.vendor_items_for_item(item_id).await,
            Store::Memory(s) => s.vendor_items_for_item(item_id).await,
        }
    }

    async fn list_vendor_items(&self) -> Result<Vec<VendorItem>, AppError> {
        match self {
            Store::Postgres(s) => s.list_vendor_items().await,
            Store::Memory(s) => s.list_vendor_items().await,
        }
    }
}
