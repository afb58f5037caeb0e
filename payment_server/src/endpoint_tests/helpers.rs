use std::{sync::Arc, time::Duration};

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use payment_engine::{
    cache::MemoryCache,
    events::{EventPublisher, MemoryBus},
    flow_objects::{FlowDependencies, FlowOptions},
    test_utils::{
        fakes::{ScriptedGateway, StaticDirectory},
        prepare_env::memory_database,
    },
    worker_pool::{read_pool, PoolConfig},
    PaymentFlowApi,
    PaymentStore,
    SqliteDatabase,
};
use serde_json::Value;

use crate::{
    data_objects::GatewayClientConfig,
    routes::{health, payment_routes, PooledReads},
    server::{json_config, query_config},
};

// Requester ids are UUIDs. DO NOT re-use these anywhere.
pub const ALICE: &str = "6f9619ff-8b86-d011-b42d-00c04fc964ff";
pub const BOB: &str = "0e8f4b7c-3a55-4d3a-9c3e-6b1b8f2a9d10";
pub const PRODUCT: &str = "prod-1";

/// The state a test app is built from. Cloned into every `App` that a test creates.
pub struct TestContext<B> {
    pub api: PaymentFlowApi<B>,
    pub gateway: Arc<ScriptedGateway>,
    pub bus: Arc<MemoryBus>,
    pub reads: Option<PooledReads>,
}

pub fn fake_directory() -> Arc<StaticDirectory> {
    Arc::new(StaticDirectory::default().with_payer(ALICE).with_payer(BOB).with_item(PRODUCT, 100_000, 5, true))
}

pub fn flow_dependencies<B>(store: B, gateway: Arc<ScriptedGateway>, bus: Arc<MemoryBus>) -> FlowDependencies<B> {
    FlowDependencies {
        store,
        gateway,
        directory: fake_directory(),
        cache: Arc::new(MemoryCache::new()),
        publisher: EventPublisher::new(bus),
        options: FlowOptions { derived_field_attempts: 2, derived_field_delay: Duration::from_millis(10) },
    }
}

/// A context backed by an in-memory database, the scripted gateway and a small read pool.
pub async fn sqlite_context() -> TestContext<SqliteDatabase> {
    let _ = env_logger::try_init();
    let gateway = Arc::new(ScriptedGateway::default());
    let bus = Arc::new(MemoryBus::default());
    let api = PaymentFlowApi::new(flow_dependencies(memory_database().await, gateway.clone(), bus.clone()));
    let pool = Arc::new(read_pool(api.clone(), PoolConfig { workers: 2, queue_multiplier: 2 }));
    let reads = PooledReads { pool, timeout: Duration::from_secs(5) };
    TestContext { api, gateway, bus, reads: Some(reads) }
}

pub async fn send<B>(ctx: &TestContext<B>, req: TestRequest) -> (StatusCode, Value)
where B: PaymentStore + 'static {
    let mut app = App::new()
        .app_data(json_config())
        .app_data(query_config())
        .app_data(web::Data::new(ctx.api.clone()))
        .app_data(web::Data::new(GatewayClientConfig {
            client_key: "SB-Mid-client-test".into(),
            environment: "sandbox".into(),
        }));
    if let Some(reads) = &ctx.reads {
        app = app.app_data(web::Data::new(reads.clone()));
    }
    let service = test::init_service(app.service(health).service(payment_routes::<B>())).await;
    debug!("Making request");
    let (_, res) = test::call_service(&service, req.to_request()).await.into_parts();
    let status = res.status();
    let bytes = res.into_body().try_into_bytes().unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
