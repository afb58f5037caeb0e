use std::sync::Arc;

use actix_web::{http::StatusCode, test::TestRequest};
use cpg_common::{PaymentMethod, Rupiah};
use gateway_tools::data_objects::MethodOptions;
use payment_engine::{
    db_types::Payment,
    events::{MemoryBus, PAYMENT_CREATED, PAYMENT_SUCCESS, STOCK_REDUCED},
    flow_objects::CreatePaymentRequest,
    test_utils::fakes::ScriptedGateway,
    PaymentFlowApi,
    PaymentStoreError,
    SqliteDatabase,
};
use serde_json::{json, Value};

use super::{
    helpers::{flow_dependencies, send, sqlite_context, TestContext, ALICE, BOB, PRODUCT},
    mocks::MockStore,
};
use crate::helpers::USER_ID_HEADER;

fn bank_transfer(order_id: &str) -> CreatePaymentRequest {
    CreatePaymentRequest {
        product_id: PRODUCT.to_string(),
        amount: Rupiah::from(100_000),
        admin_fee: Rupiah::from(2_500),
        payment_method: PaymentMethod::BankTransfer,
        options: MethodOptions { bank: Some("bni".to_string()), ..Default::default() },
        order_id: Some(order_id.to_string()),
        notes: None,
    }
}

async fn create_for(ctx: &TestContext<SqliteDatabase>, user: &str, order_id: &str) -> Payment {
    ctx.api.create_payment(user, bank_transfer(order_id)).await.expect("Payment should have been created")
}

#[actix_web::test]
async fn health_and_config() {
    let ctx = sqlite_context().await;
    let (status, body) = send(&ctx, TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&ctx, TestRequest::get().uri("/api/v1/payments/config")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"client_key": "SB-Mid-client-test", "environment": "sandbox"}));
}

#[actix_web::test]
async fn create_payment_requires_a_requester() {
    let ctx = sqlite_context().await;
    let body = json!({"product_id": PRODUCT, "amount": 100000, "payment_method": "gopay"});
    let (status, body) = send(&ctx, TestRequest::post().uri("/api/v1/payments").set_json(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHENTICATED");
    assert_eq!(ctx.gateway.charge_calls(), 0);
}

#[actix_web::test]
async fn create_payment() {
    let ctx = sqlite_context().await;
    let body = json!({
        "product_id": PRODUCT,
        "amount": 100000,
        "admin_fee": 2500,
        "payment_method": "bank_transfer",
        "bank": "bni",
        "order_id": "ORDER-HTTP-1"
    });
    let req = TestRequest::post().uri("/api/v1/payments").insert_header((USER_ID_HEADER, ALICE)).set_json(body);
    let (status, body) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["order_id"], "ORDER-HTTP-1");
    assert_eq!(data["user_id"], ALICE);
    assert_eq!(data["status"], "PENDING");
    assert_eq!(data["total_amount"], 102_500);
    assert_eq!(data["bank_type"], "bni");
    assert!(data["va_number"].is_string());
    // Raw gateway payloads are never exposed
    assert!(data.get("gateway_response").is_none());
    assert_eq!(ctx.bus.published_on(PAYMENT_CREATED).len(), 1);
}

#[actix_web::test]
async fn create_payment_errors() {
    let ctx = sqlite_context().await;
    // Not a UUID
    let req = TestRequest::post()
        .uri("/api/v1/payments")
        .insert_header((USER_ID_HEADER, "alice"))
        .set_json(json!({"product_id": PRODUCT, "amount": 100000, "payment_method": "gopay"}));
    let (status, body) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    // Missing product id
    let req = TestRequest::post()
        .uri("/api/v1/payments")
        .insert_header((USER_ID_HEADER, ALICE))
        .set_json(json!({"amount": 100000, "payment_method": "gopay"}));
    let (status, body) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    // Unknown product
    let req = TestRequest::post()
        .uri("/api/v1/payments")
        .insert_header((USER_ID_HEADER, ALICE))
        .set_json(json!({"product_id": "nope", "amount": 100000, "payment_method": "gopay"}));
    let (status, body) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(ctx.gateway.charge_calls(), 0);
}

#[actix_web::test]
async fn gateway_callback_settles_payment() {
    let ctx = sqlite_context().await;
    let payment = create_for(&ctx, ALICE, "ORDER-CB-1").await;
    ctx.gateway.set_status(&payment.order_id, "settlement");
    let notification = ctx.gateway.notification(&payment.order_id, "settlement", payment.total_amount);

    let req = TestRequest::post().uri("/api/v1/payments/gateway/callback").set_json(&notification);
    let (status, body) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
    // A repeated notification is accepted but changes nothing
    let req = TestRequest::post().uri("/api/v1/payments/gateway/callback").set_json(&notification);
    let (status, _) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::OK);

    let stored = ctx.api.get_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status.to_string(), "SUCCESS");
    assert!(stored.paid_at.is_some());
    assert_eq!(ctx.bus.published_on(PAYMENT_SUCCESS).len(), 1);
    assert_eq!(ctx.bus.published_on(STOCK_REDUCED).len(), 1);
}

#[actix_web::test]
async fn gateway_callback_with_bad_signature() {
    let ctx = sqlite_context().await;
    let payment = create_for(&ctx, ALICE, "ORDER-CB-2").await;
    ctx.gateway.set_status(&payment.order_id, "settlement");
    let mut notification = ctx.gateway.notification(&payment.order_id, "settlement", payment.total_amount);
    notification.signature_key = "0".repeat(128);

    let req = TestRequest::post().uri("/api/v1/payments/gateway/callback").set_json(&notification);
    let (status, body) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INVALID_SIGNATURE");
    let stored = ctx.api.get_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status.to_string(), "PENDING");
    assert!(ctx.bus.published_on(PAYMENT_SUCCESS).is_empty());

    // Not a notification at all
    let req = TestRequest::post().uri("/api/v1/payments/gateway/callback").set_json(json!({"hello": "world"}));
    let (status, body) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[actix_web::test]
async fn manual_status_check() {
    let ctx = sqlite_context().await;
    let payment = create_for(&ctx, ALICE, "ORDER-CHECK-1").await;
    let uri = format!("/api/v1/payments/{}/check", payment.id);

    // The gateway still reports the payment as pending
    ctx.gateway.set_status(&payment.order_id, "pending");
    let (status, body) = send(&ctx, TestRequest::post().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], false);
    assert_eq!(body["data"]["payment"]["status"], "PENDING");

    ctx.gateway.set_status(&payment.order_id, "deny");
    let (status, body) = send(&ctx, TestRequest::post().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], true);
    assert_eq!(body["data"]["previous_status"], "PENDING");
    assert_eq!(body["data"]["payment"]["status"], "FAILED");

    let (status, body) = send(&ctx, TestRequest::post().uri("/api/v1/payments/missing/check")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[actix_web::test]
async fn pooled_lookups() {
    let ctx = sqlite_context().await;
    let first = create_for(&ctx, ALICE, "ORDER-READ-1").await;
    let _second = create_for(&ctx, ALICE, "ORDER-READ-2").await;
    let _other = create_for(&ctx, BOB, "ORDER-READ-3").await;

    let (status, body) = send(&ctx, TestRequest::get().uri(&format!("/api/v1/payments/{}", first.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_id"], "ORDER-READ-1");

    let (status, body) = send(&ctx, TestRequest::get().uri("/api/v1/payments/order/ORDER-READ-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], Value::String(first.id.clone()));

    let (status, body) = send(&ctx, TestRequest::get().uri("/api/v1/payments/order/ORDER-NOPE")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let req = TestRequest::get().uri("/api/v1/payments/user?page=1&limit=1").insert_header((USER_ID_HEADER, ALICE));
    let (status, body) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["payments"].as_array().map(Vec::len), Some(1));
    assert_eq!(data["pagination"]["total"], 2);
    assert_eq!(data["pagination"]["has_more"], true);

    // Out-of-range limits are clamped rather than refused
    let req = TestRequest::get().uri("/api/v1/payments/user?limit=1000").insert_header((USER_ID_HEADER, BOB));
    let (status, body) = send(&ctx, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["limit"], 100);
    assert_eq!(body["data"]["pagination"]["total"], 1);

    let (status, body) = send(&ctx, TestRequest::get().uri("/api/v1/payments/user")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[actix_web::test]
async fn lookups_after_pool_shutdown() {
    let ctx = sqlite_context().await;
    let payment = create_for(&ctx, ALICE, "ORDER-DOWN-1").await;
    if let Some(reads) = &ctx.reads {
        reads.pool.shutdown().await;
    }
    let (status, body) = send(&ctx, TestRequest::get().uri(&format!("/api/v1/payments/{}", payment.id))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "POOL_SHUTTING_DOWN");
}

#[actix_web::test]
async fn payment_stats() {
    let ctx = sqlite_context().await;
    let payment = create_for(&ctx, ALICE, "ORDER-STATS-1").await;
    let _ = create_for(&ctx, BOB, "ORDER-STATS-2").await;
    ctx.gateway.set_status(&payment.order_id, "settlement");
    ctx.api.check_payment_status(&payment.id).await.unwrap();

    let (status, body) = send(&ctx, TestRequest::get().uri("/api/v1/payments/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_count"], 2);
}

#[actix_web::test]
async fn store_failures_are_backend_errors() {
    let _ = env_logger::try_init();
    let store = failing_store();
    let gateway = Arc::new(ScriptedGateway::default());
    let bus = Arc::new(MemoryBus::default());
    let api = PaymentFlowApi::new(flow_dependencies(store, gateway.clone(), bus.clone()));
    let ctx = TestContext { api, gateway, bus, reads: None };

    let (status, body) = send(&ctx, TestRequest::get().uri("/api/v1/payments/stats")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "BACKEND_ERROR");
}

// Every clone carries the same expectations, since the app data holds its own copy of the store.
fn failing_store() -> MockStore {
    let mut store = MockStore::new();
    store.expect_clone().returning(failing_store);
    store.expect_payment_stats().returning(|| Err(PaymentStoreError::DatabaseError("disk I/O error".into())));
    store
}
