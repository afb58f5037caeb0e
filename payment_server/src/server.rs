use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, error::InternalError, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_tools::{DirectoryApi, GatewayApi};
use log::*;
use payment_engine::{
    cache::MemoryCache,
    events::{EventBus, EventPublisher, MemoryBus},
    flow_objects::{FlowDependencies, FlowOptions},
    saga::{ValidationConsumer, ValidationCoordinator},
    worker_pool::read_pool,
    PaymentFlowApi,
    PaymentStore,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    data_objects::GatewayClientConfig,
    errors::ServerError,
    routes::{health, payment_routes, PooledReads},
    workers::{start_expiry_worker, start_validation_sweeper},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Database ready at {}", db.url());
    let client_config = GatewayClientConfig {
        client_key: config.gateway.client_key.clone(),
        environment: config.gateway.environment.to_string(),
    };
    let gateway = GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let directory =
        DirectoryApi::new(config.directory.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let bus: Arc<dyn EventBus> = Arc::new(MemoryBus::default());
    let publisher = EventPublisher::new(Arc::clone(&bus));
    let coordinator = Arc::new(ValidationCoordinator::new(publisher.clone(), config.validation_timeout));
    let mut handles = ValidationConsumer::start(Arc::clone(&bus), Arc::clone(&coordinator))
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let api = PaymentFlowApi::new(FlowDependencies {
        store: db,
        gateway: Arc::new(gateway),
        directory: Arc::new(directory),
        cache: Arc::new(MemoryCache::new()),
        publisher,
        options: FlowOptions::default(),
    });
    let pool = Arc::new(read_pool(api.clone(), config.read_pool));
    let reads = PooledReads { pool: Arc::clone(&pool), timeout: config.read_timeout };
    handles.push(start_validation_sweeper(coordinator, config.validation_sweep_interval));
    handles.push(start_expiry_worker(api.clone(), config.expiry_sweep_interval, config.stale_payment_age));

    info!("🚀️ Starting server on {}:{}", config.host, config.port);
    let srv = create_server_instance(&config, api, reads, client_config)?;
    let result = srv.await;
    info!("🚀️ Server stopped. Shutting down the read pool and background workers");
    pool.shutdown().await;
    handles.iter().for_each(|h| h.abort());
    result.map_err(ServerError::from)
}

pub fn create_server_instance(
    config: &ServerConfig,
    api: PaymentFlowApi<SqliteDatabase>,
    reads: PooledReads,
    client_config: GatewayClientConfig,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(web::Data::new(api.clone()))
            .app_data(web::Data::new(reads.clone()))
            .app_data(web::Data::new(client_config.clone()))
            .service(health)
            .service(payment_routes::<SqliteDatabase>())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Malformed bodies are answered with the same JSON error shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("💻️ Could not deserialize request body. {err}");
        let response = actix_web::ResponseError::error_response(&ServerError::InvalidRequestBody(err.to_string()));
        InternalError::from_response(err, response).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        debug!("💻️ Could not deserialize query string. {err}");
        let response = actix_web::ResponseError::error_response(&ServerError::InvalidRequestBody(err.to_string()));
        InternalError::from_response(err, response).into()
    })
}
