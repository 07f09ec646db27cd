use std::env;

use vendor_risk_api::db::Database;
use vendor_risk_api::storage::{PgStore, ProcurementStore};

/// Integration smoke test for the Postgres store.
/// Marked ignored so it never runs against a real database by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn postgres_store_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let store = PgStore::new(db.pool.clone());

    let vendors = store
        .list_vendors()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let purchases = store
        .list_purchases()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let items = store
        .list_items()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    if let Some(vendor) = vendors.first() {
        let found = store
            .get_vendor(&vendor.id)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        assert_eq!(found.map(|v| v.id), Some(vendor.id.clone()));

        let history = store
            .purchases_for_vendor(&vendor.id)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        assert!(history.iter().all(|p| p.vendor_id == vendor.id));
        assert!(history.len() <= purchases.len());
    }

    if let Some(item) = items.first() {
        let offers = store
            .vendor_items_for_item(&item.id)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        assert!(offers.iter().all(|vi| vi.item_id == item.id));
    }

    assert!(store
        .get_vendor("definitely-not-a-vendor")
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .is_none());
    Ok(())
}
