use std::{sync::Arc, time::Duration};

use cpg_common::{PaymentMethod, Rupiah};
use gateway_tools::data_objects::MethodOptions;
use payment_engine::{
    cache::MemoryCache,
    events::{EventPublisher, MemoryBus},
    flow_objects::{CreatePaymentRequest, FlowDependencies, FlowOptions},
    test_utils::{
        fakes::{ScriptedGateway, StaticDirectory},
        prepare_env::memory_database,
    },
    traits::PaymentGateway,
    PaymentFlowApi,
    SqliteDatabase,
};

pub mod stub_gateway;

pub const USER: &str = "alice";
pub const PRODUCT: &str = "prod-1";

pub struct Harness {
    pub api: PaymentFlowApi<SqliteDatabase>,
    pub gateway: Arc<ScriptedGateway>,
    pub directory: Arc<StaticDirectory>,
    pub bus: Arc<MemoryBus>,
}

pub async fn setup() -> Harness {
    setup_with_publisher(|bus| EventPublisher::new(bus)).await
}

pub async fn setup_with_publisher<F>(publisher: F) -> Harness
where F: FnOnce(Arc<MemoryBus>) -> EventPublisher {
    let gateway = Arc::new(ScriptedGateway::default());
    let bus = Arc::new(MemoryBus::default());
    let (api, directory) = build(gateway.clone(), publisher(bus.clone())).await;
    Harness { api, gateway, directory, bus }
}

/// Runs the engine against `gateway` instead of the scripted fake.
pub async fn setup_with_gateway(gateway: Arc<dyn PaymentGateway>) -> (PaymentFlowApi<SqliteDatabase>, Arc<MemoryBus>) {
    let bus = Arc::new(MemoryBus::default());
    let (api, _) = build(gateway, EventPublisher::new(bus.clone())).await;
    (api, bus)
}

async fn build(
    gateway: Arc<dyn PaymentGateway>,
    publisher: EventPublisher,
) -> (PaymentFlowApi<SqliteDatabase>, Arc<StaticDirectory>) {
    let store = memory_database().await;
    let directory = Arc::new(
        StaticDirectory::default()
            .with_payer(USER)
            .with_payer("bob")
            .with_item(PRODUCT, 100_000, 5, true)
            .with_item("prod-sold-out", 100_000, 0, true)
            .with_item("prod-retired", 100_000, 5, false),
    );
    let deps = FlowDependencies {
        store,
        gateway,
        directory: directory.clone(),
        cache: Arc::new(MemoryCache::new()),
        publisher,
        options: FlowOptions { derived_field_attempts: 2, derived_field_delay: Duration::from_millis(10) },
    };
    (PaymentFlowApi::new(deps), directory)
}

pub fn bank_transfer(order_id: Option<&str>) -> CreatePaymentRequest {
    CreatePaymentRequest {
        product_id: PRODUCT.to_string(),
        amount: Rupiah::from(100_000),
        admin_fee: Rupiah::from(2_500),
        payment_method: PaymentMethod::BankTransfer,
        options: MethodOptions { bank: Some("bni".to_string()), ..Default::default() },
        order_id: order_id.map(String::from),
        notes: None,
    }
}
