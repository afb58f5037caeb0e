//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any I/O (database, gateway or directory calls) is expressed as
//! futures, so that worker threads can serve other requests while they wait.
//!
//! The three lookup routes (`/payments/{id}`, `/payments/order/{order_id}` and `/payments/user`) do not call the
//! engine directly. They hand their query to the bounded read pool, which answers `503 POOL_FULL` straight away when
//! its queue is full.
use std::{sync::Arc, time::Duration};

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use gateway_tools::data_objects::GatewayNotification;
use log::*;
use payment_engine::{
    db_types::Payment,
    flow_objects::CreatePaymentRequest,
    worker_pool::{ReadQuery, ReadResult, ReadWorkerPool, RequestContext},
    PaymentFlowApi,
    PaymentStore,
};
use serde_json::json;

use crate::{
    data_objects::{
        GatewayClientConfig,
        JsonResponse,
        PageParams,
        PaymentListResponse,
        PaymentResponse,
        StatusCheckResponse,
    },
    errors::ServerError,
    helpers::requester_id,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// The read pool and the deadline given to each lookup.
#[derive(Clone)]
pub struct PooledReads {
    pub pool: Arc<ReadWorkerPool>,
    pub timeout: Duration,
}

/// Every payment route, under `/api/v1`. Literal paths are registered ahead of `/payments/{id}`.
pub fn payment_routes<B: PaymentStore + 'static>() -> actix_web::Scope {
    web::scope("/api/v1")
        .service(gateway_config)
        .service(CreatePaymentRoute::<B>::new())
        .service(my_payments)
        .service(payment_by_order)
        .service(PaymentStatsRoute::<B>::new())
        .service(GatewayCallbackRoute::<B>::new())
        .service(CheckPaymentRoute::<B>::new())
        .service(payment_by_id)
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().json(json!({"success": true, "status": "ok"}))
}

// ----------------------------------------------   Config  ----------------------------------------------------
#[get("/payments/config")]
pub async fn gateway_config(config: web::Data<GatewayClientConfig>) -> impl Responder {
    trace!("💻️ Received gateway config request");
    JsonResponse::ok(config.get_ref().clone())
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment => Post "/payments" impl PaymentStore);
/// Creates a payment for the requester. The requester is identified by the `X-User-ID` header.
///
/// Supplying `order_id` in the body makes the call idempotent: repeating it returns the payment that was created the
/// first time, and the gateway is only charged once.
pub async fn create_payment<B: PaymentStore>(
    req: HttpRequest,
    body: web::Json<CreatePaymentRequest>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = requester_id(&req)?;
    let request = body.into_inner();
    debug!("💻️ POST create payment for {user_id}: product {}, {}", request.product_id, request.payment_method);
    let payment = api.create_payment(&user_id, request).await?;
    info!("💻️ Payment {} created for order {}", payment.id, payment.order_id);
    Ok(JsonResponse::created(PaymentResponse::from(payment)))
}

route!(payment_stats => Get "/payments/stats" impl PaymentStore);
pub async fn payment_stats<B: PaymentStore>(api: web::Data<PaymentFlowApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET payment stats");
    let stats = api.payment_stats().await?;
    Ok(JsonResponse::ok(stats))
}

route!(check_payment => Post "/payments/{id}/check" impl PaymentStore);
/// Asks the gateway for the payment's current status and applies it.
pub async fn check_payment<B: PaymentStore>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST status check for payment {id}");
    let outcome = api.check_payment_status(&id).await?;
    Ok(JsonResponse::ok(StatusCheckResponse::from(outcome)))
}

route!(gateway_callback => Post "/payments/gateway/callback" impl PaymentStore);
/// The gateway's webhook. Notifications with a bad signature are refused with a 403. A valid notification is
/// reconciled against the gateway's own status record before anything is stored.
pub async fn gateway_callback<B: PaymentStore>(
    body: web::Json<GatewayNotification>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let notification = body.into_inner();
    info!("💻️ Gateway notification for order {}: {}", notification.order_id, notification.transaction_status);
    let outcome = api.handle_notification(notification).await?;
    if outcome.changed {
        info!("💻️ Payment {} moved from {} to {}", outcome.payment.id, outcome.previous, outcome.payment.status);
    }
    Ok(HttpResponse::Ok().json(json!({"success": true})))
}

//----------------------------------------------   Pooled reads  ----------------------------------------------------
#[get("/payments/{id}")]
pub async fn payment_by_id(
    path: web::Path<String>,
    reads: web::Data<PooledReads>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    trace!("💻️ GET payment {id}");
    let payment = pooled_read(&reads, ReadQuery::PaymentById(id)).await?;
    Ok(JsonResponse::ok(PaymentResponse::from(single_payment(payment)?)))
}

#[get("/payments/order/{order_id}")]
pub async fn payment_by_order(
    path: web::Path<String>,
    reads: web::Data<PooledReads>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET payment for order {order_id}");
    let payment = pooled_read(&reads, ReadQuery::PaymentByOrder(order_id)).await?;
    Ok(JsonResponse::ok(PaymentResponse::from(single_payment(payment)?)))
}

#[get("/payments/user")]
pub async fn my_payments(
    req: HttpRequest,
    query: web::Query<PageParams>,
    reads: web::Data<PooledReads>,
) -> Result<HttpResponse, ServerError> {
    let user_id = requester_id(&req)?;
    let (page, limit) = query.normalize();
    debug!("💻️ GET payments for {user_id}, page {page} of {limit}");
    let result = pooled_read(&reads, ReadQuery::UserPayments { user_id, page, limit }).await?;
    match result {
        ReadResult::Page(page) => Ok(JsonResponse::ok(PaymentListResponse::from(page))),
        ReadResult::Payment(_) => Err(ServerError::BackendError("The read pool answered with a single payment".into())),
    }
}

fn single_payment(result: ReadResult) -> Result<Payment, ServerError> {
    match result {
        ReadResult::Payment(p) => Ok(p),
        ReadResult::Page(_) => Err(ServerError::BackendError("The read pool answered with a page".into())),
    }
}

/// Cancels the request's context if the handler is dropped, which is what actix does when the client goes away.
struct CancelOnDrop(RequestContext);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

async fn pooled_read(reads: &PooledReads, query: ReadQuery) -> Result<ReadResult, ServerError> {
    let guard = CancelOnDrop(RequestContext::with_timeout(reads.timeout));
    let kind = query.kind();
    let result = reads.pool.execute(guard.0.clone(), kind, query).await.map_err(|e| {
        debug!("💻️ Pooled {kind} request failed. {e}");
        ServerError::from(e)
    })?;
    Ok(result?)
}
