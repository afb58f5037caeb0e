use actix_web::HttpResponse;
use chrono::{DateTime, Utc};
use cpg_common::{PaymentMethod, Rupiah};
use payment_engine::{
    db_types::{Payment, PaymentPage, PaymentStatus},
    flow_objects::ReconcileOutcome,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn ok(data: T) -> HttpResponse {
        HttpResponse::Ok().json(Self { success: true, data })
    }

    pub fn created(data: T) -> HttpResponse {
        HttpResponse::Created().json(Self { success: true, data })
    }
}

/// A payment as clients see it. The raw gateway payloads stay on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub product_id: Option<String>,
    pub amount: Rupiah,
    pub admin_fee: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: PaymentMethod,
    pub payment_type: String,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub redirect_url: Option<String>,
    pub va_number: Option<String>,
    pub payment_code: Option<String>,
    pub bank_type: Option<String>,
    pub store_type: Option<String>,
    pub transaction_id: Option<String>,
    pub transaction_status: Option<String>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            order_id: p.order_id,
            user_id: p.user_id,
            product_id: p.product_id,
            amount: p.amount,
            admin_fee: p.admin_fee,
            total_amount: p.total_amount,
            payment_method: p.payment_method,
            payment_type: p.payment_type,
            status: p.status,
            notes: p.notes,
            redirect_url: p.redirect_url,
            va_number: p.va_number,
            payment_code: p.payment_code,
            bank_type: p.bank_type,
            store_type: p.store_type,
            transaction_id: p.transaction_id,
            transaction_status: p.transaction_status,
            expiry_time: p.expiry_time,
            paid_at: p.paid_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentResponse>,
    pub pagination: Pagination,
}

impl From<PaymentPage> for PaymentListResponse {
    fn from(page: PaymentPage) -> Self {
        let pagination = Pagination { page: page.page, limit: page.limit, total: page.total, has_more: page.has_more };
        Self { payments: page.payments.into_iter().map(PaymentResponse::from).collect(), pagination }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCheckResponse {
    pub payment: PaymentResponse,
    pub previous_status: PaymentStatus,
    pub changed: bool,
}

impl From<ReconcileOutcome> for StatusCheckResponse {
    fn from(outcome: ReconcileOutcome) -> Self {
        Self { payment: outcome.payment.into(), previous_status: outcome.previous, changed: outcome.changed }
    }
}

/// The public half of the gateway credentials, for client-side SDKs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayClientConfig {
    pub client_key: String,
    pub environment: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    /// `(page, limit)`, with a first page of 1 and at most [`MAX_PAGE_LIMIT`] items.
    pub fn normalize(&self) -> (u32, u32) {
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
        (page, limit)
    }
}
