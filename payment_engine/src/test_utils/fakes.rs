//! Scripted stand-ins for the gateway and the identity/catalog services.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
        PoisonError,
    },
};

use async_trait::async_trait;
use cpg_common::{PaymentMethod, Rupiah};
use gateway_tools::{
    data_objects::{ChargeRequest, ChargeResponse, GatewayNotification, VaNumber},
    helpers::{constant_time_eq, notification_signature},
    CatalogItem,
    CollaboratorError,
    GatewayError,
    Payer,
};

use crate::traits::{Directory, PaymentGateway};

pub const TEST_SERVER_KEY: &str = "SB-Mid-server-test";

#[derive(Default)]
struct GatewayState {
    charges: HashMap<String, ChargeResponse>,
    charge_calls: usize,
    statuses: HashMap<String, ChargeResponse>,
    charge_error: Option<GatewayError>,
    status_error: Option<GatewayError>,
    omit_references: bool,
}

/// A gateway that answers from a script. Charges are deduplicated on the order id, as the real gateway does with its
/// idempotency key.
pub struct ScriptedGateway {
    server_key: String,
    state: Mutex<GatewayState>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new(TEST_SERVER_KEY)
    }
}

impl ScriptedGateway {
    pub fn new(server_key: &str) -> Self {
        Self { server_key: server_key.to_string(), state: Mutex::default() }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// How many times `charge` was called.
    pub fn charge_calls(&self) -> usize {
        self.state().charge_calls
    }

    /// How many distinct orders were charged.
    pub fn unique_charges(&self) -> usize {
        self.state().charges.len()
    }

    pub fn fail_charges_with(&self, error: Option<GatewayError>) {
        self.state().charge_error = error;
    }

    pub fn fail_status_with(&self, error: Option<GatewayError>) {
        self.state().status_error = error;
    }

    /// Charge responses leave out VA numbers and payment codes.
    pub fn omit_references(&self, omit: bool) {
        self.state().omit_references = omit;
    }

    /// From now on, status queries for `order_id` report `transaction_status`.
    pub fn set_status(&self, order_id: &str, transaction_status: &str) {
        let mut state = self.state();
        let mut response = state.charges.get(order_id).cloned().unwrap_or_default();
        response.order_id = Some(order_id.to_string());
        response.status_code = Some("200".to_string());
        response.transaction_status = Some(transaction_status.to_string());
        if transaction_status == "settlement" {
            response.settlement_time = Some("2024-06-01 10:15:00".to_string());
        }
        state.statuses.insert(order_id.to_string(), response);
    }

    pub fn sign(&self, order_id: &str, status_code: &str, gross_amount: &str) -> String {
        notification_signature(order_id, status_code, gross_amount, &self.server_key)
    }

    /// A correctly signed webhook body.
    pub fn notification(&self, order_id: &str, transaction_status: &str, gross_amount: Rupiah) -> GatewayNotification {
        let gross = gross_amount.to_gateway_string();
        GatewayNotification {
            order_id: order_id.to_string(),
            status_code: "200".to_string(),
            signature_key: self.sign(order_id, "200", &gross),
            gross_amount: gross,
            transaction_status: transaction_status.to_string(),
            status_message: None,
            fraud_status: Some("accept".to_string()),
            payment_type: None,
            transaction_id: None,
            currency: Some("IDR".to_string()),
            settlement_time: None,
            paid_at: None,
            expiry_time: None,
        }
    }

    fn charge_response(request: &ChargeRequest, omit_references: bool) -> ChargeResponse {
        let order_id = request.order_id().to_string();
        let mut response = ChargeResponse {
            status_code: Some("201".to_string()),
            status_message: Some("Success, transaction is created".to_string()),
            transaction_id: Some(format!("trx-{order_id}")),
            order_id: Some(order_id.clone()),
            gross_amount: Some(request.transaction_details.gross_amount.to_gateway_string()),
            payment_type: Some(request.payment_type.clone()),
            transaction_status: Some("pending".to_string()),
            fraud_status: Some("accept".to_string()),
            expiry_time: Some("2099-01-01 00:00:00".to_string()),
            ..Default::default()
        };
        if omit_references {
            return response;
        }
        let reference = format!("988{:08}", order_id.len() * 7919 % 100_000_000);
        match request.payment_type.parse::<PaymentMethod>() {
            Ok(PaymentMethod::BankTransfer) => {
                let bank = request.bank_transfer.as_ref().map(|b| b.bank.clone()).unwrap_or_else(|| "bni".to_string());
                response.va_numbers = Some(vec![VaNumber { bank, va_number: reference }]);
            },
            Ok(PaymentMethod::Permata) => response.permata_va_number = Some(reference),
            Ok(PaymentMethod::Echannel) => {
                response.bill_key = Some(reference);
                response.biller_code = Some("70012".to_string());
            },
            Ok(PaymentMethod::Cstore) => {
                response.payment_code = Some(reference);
                response.store = request.cstore.as_ref().map(|c| c.store.clone());
            },
            _ => {},
        }
        response
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        let mut state = self.state();
        state.charge_calls += 1;
        if let Some(e) = &state.charge_error {
            return Err(e.clone());
        }
        let omit = state.omit_references;
        let response = state
            .charges
            .entry(request.order_id().to_string())
            .or_insert_with(|| Self::charge_response(request, omit))
            .clone();
        Ok(response)
    }

    async fn fetch_status(&self, order_id: &str) -> Result<ChargeResponse, GatewayError> {
        let state = self.state();
        if let Some(e) = &state.status_error {
            return Err(e.clone());
        }
        state
            .statuses
            .get(order_id)
            .or_else(|| state.charges.get(order_id))
            .cloned()
            .ok_or_else(|| GatewayError::Http { status: 404, message: format!("No transaction for {order_id}") })
    }

    fn verify_signature(&self, order_id: &str, status_code: &str, gross_amount: &str, signature: &str) -> bool {
        let expected = self.sign(order_id, status_code, gross_amount);
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    fn callback_url(&self) -> String {
        "http://localhost:8083/api/v1/payments/gateway/callback".to_string()
    }
}

/// Fixed payers and catalog items.
#[derive(Default)]
pub struct StaticDirectory {
    payers: Mutex<HashMap<String, Payer>>,
    items: Mutex<HashMap<String, CatalogItem>>,
    unavailable: AtomicBool,
}

impl StaticDirectory {
    pub fn with_payer(self, id: &str) -> Self {
        let payer = Payer { id: id.to_string(), username: format!("user-{id}"), email: format!("{id}@example.com") };
        self.payers.lock().unwrap_or_else(PoisonError::into_inner).insert(id.to_string(), payer);
        self
    }

    pub fn with_item(self, id: &str, price: i64, stock: i64, is_active: bool) -> Self {
        let item = CatalogItem {
            id: id.to_string(),
            name: format!("Item {id}"),
            description: None,
            price: Rupiah::from(price),
            stock,
            is_active,
        };
        self.items.lock().unwrap_or_else(PoisonError::into_inner).insert(id.to_string(), item);
        self
    }

    /// Every lookup fails as if the services were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self, service: &'static str) -> Result<(), CollaboratorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable { service, message: "connection refused".to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn fetch_payer(&self, user_id: &str) -> Result<Payer, CollaboratorError> {
        self.check_available("user service")?;
        self.payers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound { service: "user service", id: user_id.to_string() })
    }

    async fn fetch_item(&self, product_id: &str) -> Result<CatalogItem, CollaboratorError> {
        self.check_available("product service")?;
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound { service: "product service", id: product_id.to_string() })
    }
}
