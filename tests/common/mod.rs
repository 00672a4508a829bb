//! Shared test harness: in-memory SQLite with the full migration set and the
//! engine services wired the way `main` wires them.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use sea_orm_migration::MigratorTrait;
use tokio::sync::mpsc;
use uuid::Uuid;

use medistock_api::cache::ViewCache;
use medistock_api::config::{AppConfig, SupplierConfig};
use medistock_api::entities::{batch, product, supplier_contact};
use medistock_api::events::{process_events, EventSender};
use medistock_api::migrator::Migrator;
use medistock_api::notifications::ContactNotifier;
use medistock_api::AppServices;

pub struct TestCtx {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    pub cache: ViewCache,
    pub events: EventSender,
    pub tenant: Uuid,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: true,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        db_acquire_timeout_secs: 5,
        draft_ttl_hours: 24,
        view_cache_ttl_secs: 30,
        order_number_retries: 5,
        supplier: SupplierConfig::default(),
    }
}

pub async fn setup() -> TestCtx {
    // A single connection keeps every query on the same in-memory database
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    opts.max_connections(1).sqlx_logging(false);
    let db = Arc::new(Database::connect(opts).await.expect("sqlite connects"));

    Migrator::up(db.as_ref(), None).await.expect("migrations run");

    let (event_tx, event_rx) = mpsc::channel(64);
    tokio::spawn(process_events(event_rx));
    let events = EventSender::new(event_tx);

    let cache = ViewCache::new(Duration::from_secs(30));
    let config = test_config();
    let services = AppServices::build(
        db.clone(),
        &config,
        events.clone(),
        cache.clone(),
        Arc::new(ContactNotifier),
    );

    TestCtx {
        db,
        services,
        cache,
        events,
        tenant: Uuid::new_v4(),
    }
}

pub async fn seed_supplier(
    ctx: &TestCtx,
    name: &str,
    platform_linked: bool,
) -> supplier_contact::Model {
    supplier_contact::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(ctx.tenant),
        name: Set(name.to_string()),
        manager_name: Set(Some("Manager Park".to_string())),
        phone: Set(Some("02-555-0101".to_string())),
        email: Set(Some("orders@supplier.test".to_string())),
        remote_manager_id: Set(platform_linked.then(Uuid::new_v4)),
        remote_tenant_id: Set(platform_linked.then(Uuid::new_v4)),
        // Closed port so fire-and-forget webhooks fail fast in tests
        base_url: Set(platform_linked.then(|| "http://127.0.0.1:9".to_string())),
        ..Default::default()
    }
    .insert(ctx.db.as_ref())
    .await
    .expect("supplier inserts")
}

pub async fn seed_product(
    ctx: &TestCtx,
    name: &str,
    unit_price: Decimal,
    supplier_id: Option<Uuid>,
) -> product::Model {
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(ctx.tenant),
        name: Set(name.to_string()),
        brand: Set(None),
        unit: Set(Some("ea".to_string())),
        stock: Set(0),
        unit_price: Set(unit_price),
        supplier_id: Set(supplier_id),
        ..Default::default()
    }
    .insert(ctx.db.as_ref())
    .await
    .expect("product inserts")
}

pub async fn seed_batch(
    ctx: &TestCtx,
    product_id: Uuid,
    quantity: i32,
    expiry: Option<NaiveDate>,
) -> batch::Model {
    let inserted = batch::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(ctx.tenant),
        product_id: Set(product_id),
        lot_number: Set(format!("LOT-{}", &Uuid::new_v4().to_string()[..8])),
        quantity: Set(quantity),
        expiry_date: Set(expiry),
        storage_location: Set(Some("A-1".to_string())),
        unit_cost: Set(Decimal::new(100, 2)),
        ..Default::default()
    }
    .insert(ctx.db.as_ref())
    .await
    .expect("batch inserts");

    // Keep the cached aggregate in line with the seeded batch
    let product_model = product::Entity::find_by_id(product_id)
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let mut active: product::ActiveModel = product_model.clone().into();
    active.stock = Set(product_model.stock + quantity);
    active.update(ctx.db.as_ref()).await.unwrap();

    inserted
}

pub async fn product_stock(ctx: &TestCtx, product_id: Uuid) -> i32 {
    product::Entity::find_by_id(product_id)
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .expect("product exists")
        .stock
}

pub async fn batch_quantity(ctx: &TestCtx, batch_id: Uuid) -> i32 {
    batch::Entity::find_by_id(batch_id)
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .expect("batch exists")
        .quantity
}

pub fn far_expiry() -> Option<NaiveDate> {
    Utc::now()
        .date_naive()
        .checked_add_days(chrono::Days::new(365))
}
