use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use cpg_common::DerivedField;
use gateway_tools::{
    data_objects::{ChargeRequest, GatewayNotification, PurchaseDetails},
    CatalogItem,
    CollaboratorError,
    Payer,
};
use log::*;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    cache::{
        order_key,
        payment_key,
        user_payments_key,
        user_payments_pattern,
        PaymentCache,
        PAYMENT_TTL,
        USER_PAYMENTS_TTL,
    },
    db::traits::{PaymentStore, PaymentStoreError},
    db_types::{GatewayFields, NewPayment, Payment, PaymentPage, PaymentStats, PaymentStatus},
    events::{EventPublisher, StockReduced},
    flow_api::{
        errors::PaymentFlowError,
        flow_objects::{CreatePaymentRequest, FlowDependencies, FlowOptions, ReconcileOutcome},
    },
    status_mapper::map_status,
    traits::{Directory, PaymentGateway},
};

/// `PaymentFlowApi` is the primary API for creating payments and keeping them in step with the gateway.
///
/// Durable state only changes through the store. Everything downstream of a committed change (cache invalidation,
/// bus events, hooks) is best-effort: failures are logged and never undo or fail the change itself.
#[derive(Clone)]
pub struct PaymentFlowApi<B> {
    store: B,
    gateway: Arc<dyn PaymentGateway>,
    directory: Arc<dyn Directory>,
    cache: Arc<dyn PaymentCache>,
    publisher: EventPublisher,
    options: FlowOptions,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(deps: FlowDependencies<B>) -> Self {
        let FlowDependencies { store, gateway, directory, cache, publisher, options } = deps;
        Self { store, gateway, directory, cache, publisher, options }
    }

    pub fn store(&self) -> &B {
        &self.store
    }
}

impl<B> PaymentFlowApi<B>
where B: PaymentStore
{
    /// Creates a payment for `user_id` and charges it at the gateway.
    ///
    /// The payment row is only written after the gateway has acknowledged the charge, so a stored payment always
    /// refers to a real transaction.
    pub async fn create_payment(
        &self,
        user_id: &str,
        request: CreatePaymentRequest,
    ) -> Result<Payment, PaymentFlowError> {
        validate_request(user_id, &request)?;
        if let Some(order_id) = &request.order_id {
            if let Some(existing) = self.store.fetch_payment_by_order_id(order_id).await? {
                return replay(existing, user_id);
            }
        }
        let order_id = request.order_id.clone().unwrap_or_else(generate_order_id);
        let payer = self.fetch_payer(user_id).await?;
        let item = self.fetch_item(&request.product_id).await?;
        if !item.is_active {
            return Err(PaymentFlowError::ItemInactive(item.id));
        }
        if item.stock <= 0 {
            return Err(PaymentFlowError::OutOfStock(item.id));
        }
        let total = request.amount + request.admin_fee;
        debug!(
            "🔄️ Charging {user_id} {total} ({} + {} fee) by {} for order {order_id}",
            request.amount, request.admin_fee, request.payment_method
        );
        let callback_url = self.gateway.callback_url();
        let charge = ChargeRequest::for_purchase(&PurchaseDetails {
            order_id: &order_id,
            payer: &payer,
            item: &item,
            amount: request.amount,
            admin_fee: request.admin_fee,
            method: request.payment_method,
            options: &request.options,
            callback_url: &callback_url,
        });
        let response = self.gateway.charge(&charge).await.map_err(|e| {
            warn!("🔄️ Charge for order {order_id} failed. {e}");
            PaymentFlowError::from_charge_error(e)
        })?;
        info!("🔄️ Gateway accepted the charge for order {order_id}");

        let method = request.payment_method;
        let new_payment =
            NewPayment::new(order_id.clone(), user_id.to_string(), request.amount, request.admin_fee, method)
                .with_product_id(item.id.clone())
                .with_notes(request.notes.clone());
        let inserted = match self.store.insert_payment(new_payment).await {
            Ok(p) => p,
            Err(PaymentStoreError::DuplicateOrder(_)) => {
                // A concurrent request with the same order id got there first. The gateway deduplicated the charge.
                let existing = self.store.fetch_payment_by_order_id(&order_id).await?;
                return existing
                    .map_or_else(|| Err(PaymentFlowError::PaymentNotFound(order_id)), |p| replay(p, user_id));
            },
            Err(e) => {
                error!("🔄️ Order {order_id} was charged but could not be saved. {e}");
                return Err(e.into());
            },
        };
        let mut fields = GatewayFields::from_gateway_response(&response, method);
        if fields.bank_type.is_none() {
            fields.bank_type.clone_from(&request.options.bank);
        }
        if fields.store_type.is_none() {
            fields.store_type.clone_from(&request.options.store);
        }
        let computed = inserted.clone().with_fields(&fields);
        let merged = self.store.merge_gateway_fields(&inserted.id, fields).await?.unwrap_or(computed);
        let payment = self.await_derived_field(merged).await;

        self.cache_put(&payment_key(&payment.id), &payment, PAYMENT_TTL).await;
        self.cache_put(&order_key(&payment.order_id), &payment, PAYMENT_TTL).await;
        if let Err(e) = self.publisher.payment_created(&payment).await {
            warn!("🔄️ Could not publish payment.created for {}. {e}", payment.id);
        }
        self.cache_delete_pattern(&user_payments_pattern(&payment.user_id)).await;
        Ok(payment)
    }

    /// Handles a gateway webhook. The signature is checked before anything is read or written.
    pub async fn handle_notification(
        &self,
        notification: GatewayNotification,
    ) -> Result<ReconcileOutcome, PaymentFlowError> {
        let n = &notification;
        if !self.gateway.verify_signature(&n.order_id, &n.status_code, &n.gross_amount, &n.signature_key) {
            warn!("🔄️ Rejecting notification for order {} with an invalid signature", n.order_id);
            return Err(PaymentFlowError::InvalidSignature);
        }
        debug!("🔄️ Notification for order {} reports {}", n.order_id, n.transaction_status);
        self.reconcile_order(&n.order_id).await
    }

    /// Manual poll of the gateway for a payment.
    pub async fn check_payment_status(&self, payment_id: &str) -> Result<ReconcileOutcome, PaymentFlowError> {
        let payment = self
            .store
            .fetch_payment(payment_id)
            .await?
            .ok_or_else(|| PaymentFlowError::PaymentNotFound(payment_id.to_string()))?;
        self.reconcile_order(&payment.order_id).await
    }

    /// Brings the stored payment for `order_id` in line with the gateway's authoritative status.
    ///
    /// Safe to call any number of times, concurrently: only the caller whose conditional update moves the status sees
    /// `changed == true`, and only that caller publishes lifecycle events.
    pub async fn reconcile_order(&self, order_id: &str) -> Result<ReconcileOutcome, PaymentFlowError> {
        let payment = self
            .store
            .fetch_payment_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentFlowError::PaymentNotFound(order_id.to_string()))?;
        let response = self.gateway.fetch_status(order_id).await.map_err(|e| {
            warn!("🔄️ Could not fetch gateway status for order {order_id}. {e}");
            PaymentFlowError::from_status_error(e)
        })?;
        let gateway_status = response.transaction_status.clone().unwrap_or_default();
        let next = map_status(&gateway_status);
        trace!("🔄️ Gateway reports '{gateway_status}' ({next}) for order {order_id}. Stored: {}", payment.status);
        let fields = GatewayFields::from_gateway_response(&response, payment.payment_method);
        self.apply_status(payment, next, fields).await
    }

    /// Expires every pending payment whose gateway expiry time has passed. Returns the payments that were expired by
    /// this call.
    pub async fn expire_overdue_payments(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, PaymentFlowError> {
        let overdue = self.store.fetch_overdue_pending(now).await?;
        let mut expired = Vec::with_capacity(overdue.len());
        for payment in overdue {
            let id = payment.id.clone();
            let fields = GatewayFields { transaction_status: Some("expire".to_string()), ..Default::default() };
            match self.apply_status(payment, PaymentStatus::Expired, fields).await {
                Ok(outcome) if outcome.changed => expired.push(outcome.payment),
                Ok(_) => trace!("🔄️ Payment {id} changed before it could be expired"),
                Err(e) => error!("🔄️ Could not expire payment {id}. {e}"),
            }
        }
        Ok(expired)
    }

    /// Polls the gateway for every payment that has been pending since before `older_than`. This recovers payments
    /// whose webhook never arrived. Returns the outcomes that changed a status.
    pub async fn reconcile_stale_payments(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ReconcileOutcome>, PaymentFlowError> {
        let stale = self.store.fetch_stale_pending(older_than).await?;
        let mut changed = Vec::new();
        for payment in stale {
            match self.reconcile_order(&payment.order_id).await {
                Ok(outcome) if outcome.changed => changed.push(outcome),
                Ok(_) => trace!("🔄️ Stale payment {} is still {}", payment.id, payment.status),
                Err(e) => warn!("🔄️ Could not reconcile stale payment {}. {e}", payment.id),
            }
        }
        Ok(changed)
    }

    pub async fn get_payment(&self, id: &str) -> Result<Payment, PaymentFlowError> {
        let key = payment_key(id);
        if let Some(payment) = self.cache_get::<Payment>(&key).await {
            return Ok(payment);
        }
        let payment =
            self.store.fetch_payment(id).await?.ok_or_else(|| PaymentFlowError::PaymentNotFound(id.to_string()))?;
        self.cache_put(&key, &payment, PAYMENT_TTL).await;
        Ok(payment)
    }

    pub async fn get_payment_by_order_id(&self, order_id: &str) -> Result<Payment, PaymentFlowError> {
        let key = order_key(order_id);
        if let Some(payment) = self.cache_get::<Payment>(&key).await {
            return Ok(payment);
        }
        let payment = self
            .store
            .fetch_payment_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentFlowError::PaymentNotFound(order_id.to_string()))?;
        self.cache_put(&key, &payment, PAYMENT_TTL).await;
        Ok(payment)
    }

    pub async fn payments_for_user(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<PaymentPage, PaymentFlowError> {
        if page == 0 || limit == 0 {
            return Err(PaymentFlowError::InvalidRequest("page and limit must be positive".to_string()));
        }
        let key = user_payments_key(user_id, page, limit);
        if let Some(page) = self.cache_get::<PaymentPage>(&key).await {
            return Ok(page);
        }
        let result = self.store.fetch_payments_for_user(user_id, page, limit).await?;
        self.cache_put(&key, &result, USER_PAYMENTS_TTL).await;
        Ok(result)
    }

    pub async fn payment_stats(&self) -> Result<PaymentStats, PaymentFlowError> {
        let stats = self.store.payment_stats().await?;
        Ok(stats)
    }

    /// Applies a mapped gateway status to a stored payment.
    ///
    /// * Same status, or a report that would move a terminal payment: only the fields are merged.
    /// * Otherwise a conditional transition. Losing the race to another writer is reported as unchanged.
    async fn apply_status(
        &self,
        payment: Payment,
        next: PaymentStatus,
        mut fields: GatewayFields,
    ) -> Result<ReconcileOutcome, PaymentFlowError> {
        let previous = payment.status;
        if next == previous || !previous.can_transition_to(next) {
            if next != previous {
                warn!(
                    "🔄️ Gateway reports {next} for payment {} which is already {previous}. Keeping {previous}.",
                    payment.id
                );
            }
            let payment = self.merge_fields(payment, fields).await?;
            return Ok(ReconcileOutcome { payment, previous, changed: false });
        }
        if next == PaymentStatus::Success && fields.paid_at.is_none() && payment.paid_at.is_none() {
            // Best effort. The gateway did not say when it settled.
            fields.paid_at = Some(Utc::now());
        }
        match self.store.transition_status(&payment.id, previous, next, fields).await? {
            Some(updated) => {
                info!("🔄️ Payment {} for order {} is now {next} (was {previous})", updated.id, updated.order_id);
                self.invalidate(&updated).await;
                self.cascade(&updated, previous).await;
                Ok(ReconcileOutcome { payment: updated, previous, changed: true })
            },
            None => {
                debug!("🔄️ Payment {} was updated concurrently. Leaving it alone.", payment.id);
                let current = self
                    .store
                    .fetch_payment(&payment.id)
                    .await?
                    .ok_or_else(|| PaymentFlowError::PaymentNotFound(payment.id.clone()))?;
                Ok(ReconcileOutcome { payment: current, previous, changed: false })
            },
        }
    }

    async fn merge_fields(&self, payment: Payment, fields: GatewayFields) -> Result<Payment, PaymentFlowError> {
        if fields.is_empty() {
            return Ok(payment);
        }
        let merged = self.store.merge_gateway_fields(&payment.id, fields).await?;
        match merged {
            Some(merged) => {
                self.cache_delete(&payment_key(&merged.id)).await;
                self.cache_delete(&order_key(&merged.order_id)).await;
                Ok(merged)
            },
            None => Ok(payment),
        }
    }

    /// Publishes the lifecycle events for a status change. Fire and forget.
    async fn cascade(&self, payment: &Payment, previous: PaymentStatus) {
        if let Err(e) = self.publisher.status_updated(payment, previous).await {
            warn!("🔄️ Could not publish status update for payment {}. {e}", payment.id);
        }
        match payment.status {
            PaymentStatus::Success => {
                if let Err(e) = self.publisher.payment_success(payment).await {
                    warn!("🔄️ Could not publish payment.success for {}. {e}", payment.id);
                }
                if let Some(product_id) = &payment.product_id {
                    let event = StockReduced {
                        product_id: product_id.clone(),
                        quantity: 1,
                        order_id: payment.order_id.clone(),
                        user_id: payment.user_id.clone(),
                    };
                    if let Err(e) = self.publisher.stock_reduced(event).await {
                        warn!("🔄️ Could not publish stock reduction for order {}. {e}", payment.order_id);
                    }
                }
            },
            status if status.is_failure() => {
                let reason = format!("Payment {}", status.as_str().to_lowercase());
                if let Err(e) = self.publisher.payment_failed(payment, reason).await {
                    warn!("🔄️ Could not publish payment.failed for {}. {e}", payment.id);
                }
            },
            _ => {},
        }
    }

    /// Polls the store until the payer-facing reference for the payment's method shows up. Gives up after the
    /// configured attempts and answers with what is already known.
    async fn await_derived_field(&self, computed: Payment) -> Payment {
        if computed.payment_method.derived_field() == DerivedField::None || computed.has_derived_field() {
            return computed;
        }
        let attempts = self.options.derived_field_attempts;
        for attempt in 1..=attempts {
            match self.store.fetch_payment(&computed.id).await {
                Ok(Some(p)) if p.has_derived_field() => return p,
                Ok(_) => {
                    let field = computed.payment_method.derived_field();
                    trace!("🔄️ Payment {} has no {field:?} yet ({attempt}/{attempts})", computed.id);
                },
                Err(e) => warn!("🔄️ Could not re-read payment {}. {e}", computed.id),
            }
            if attempt < attempts {
                tokio::time::sleep(self.options.derived_field_delay).await;
            }
        }
        warn!(
            "🔄️ Payment {} still has no {:?} after {attempts} attempts. Responding without it.",
            computed.id,
            computed.payment_method.derived_field()
        );
        computed
    }

    async fn invalidate(&self, payment: &Payment) {
        self.cache_delete(&payment_key(&payment.id)).await;
        self.cache_delete(&order_key(&payment.order_id)).await;
        self.cache_delete_pattern(&user_payments_pattern(&payment.user_id)).await;
    }

    async fn fetch_payer(&self, user_id: &str) -> Result<Payer, PaymentFlowError> {
        self.directory.fetch_payer(user_id).await.map_err(|e| match e {
            CollaboratorError::NotFound { .. } => PaymentFlowError::PayerNotFound(user_id.to_string()),
            e => {
                warn!("🔄️ Could not fetch user {user_id}. {e}");
                PaymentFlowError::CollaboratorUnavailable(e.to_string())
            },
        })
    }

    async fn fetch_item(&self, product_id: &str) -> Result<CatalogItem, PaymentFlowError> {
        self.directory.fetch_item(product_id).await.map_err(|e| match e {
            CollaboratorError::NotFound { .. } => PaymentFlowError::ItemNotFound(product_id.to_string()),
            e => {
                warn!("🔄️ Could not fetch product {product_id}. {e}");
                PaymentFlowError::CollaboratorUnavailable(e.to_string())
            },
        })
    }

    async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("🗃️ Ignoring unreadable cache entry {key}. {e}");
                    None
                },
            },
            Ok(None) => None,
            Err(e) => {
                warn!("🗃️ Cache read for {key} failed. {e}");
                None
            },
        }
    }

    async fn cache_put<T: Serialize>(&self, key: &str, value: &T, ttl: std::time::Duration) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("🗃️ Could not serialize {key} for the cache. {e}");
                return;
            },
        };
        if let Err(e) = self.cache.set(key, value, ttl).await {
            warn!("🗃️ Cache write for {key} failed. {e}");
        }
    }

    async fn cache_delete(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!("🗃️ Could not evict {key} from the cache. {e}");
        }
    }

    async fn cache_delete_pattern(&self, pattern: &str) {
        if let Err(e) = self.cache.delete_pattern(pattern).await {
            warn!("🗃️ Could not evict {pattern} from the cache. {e}");
        }
    }
}

fn validate_request(user_id: &str, request: &CreatePaymentRequest) -> Result<(), PaymentFlowError> {
    if user_id.trim().is_empty() {
        return Err(PaymentFlowError::InvalidRequest("A user id is required".to_string()));
    }
    if request.product_id.trim().is_empty() {
        return Err(PaymentFlowError::InvalidRequest("A product id is required".to_string()));
    }
    if !request.amount.is_positive() {
        return Err(PaymentFlowError::InvalidRequest(format!("Amount must be positive, not {}", request.amount)));
    }
    if request.admin_fee.is_negative() {
        return Err(PaymentFlowError::InvalidRequest(format!("Admin fee cannot be negative ({})", request.admin_fee)));
    }
    if let Some(order_id) = &request.order_id {
        if order_id.is_empty() || order_id.len() > 50 || order_id.chars().any(char::is_whitespace) {
            return Err(PaymentFlowError::InvalidRequest(format!("'{order_id}' is not a valid order id")));
        }
    }
    Ok(())
}

/// An order id that already has a payment. It is only returned to the user it belongs to.
fn replay(existing: Payment, user_id: &str) -> Result<Payment, PaymentFlowError> {
    if existing.user_id != user_id {
        return Err(PaymentFlowError::InvalidRequest(format!("Order {} is already in use", existing.order_id)));
    }
    debug!("🔄️ Order {} already has payment {}. Not charging again.", existing.order_id, existing.id);
    Ok(existing)
}

fn generate_order_id() -> String {
    format!("Order_{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}
