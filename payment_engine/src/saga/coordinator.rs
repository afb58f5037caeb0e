use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use chrono::Utc;
use cpg_common::Rupiah;
use log::*;

use crate::events::{
    CheckoutInit,
    EventPublisher,
    OrderCompleted,
    OrderFailed,
    ProductValidationReply,
    UserValidationReply,
    PRODUCT_OK,
    USER_OK,
};

/// Correlations older than this are evicted by [`ValidationCoordinator::sweep_expired`].
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideReply {
    pub status: String,
    pub message: String,
}

/// One checkout waiting on its two validation replies.
#[derive(Debug, Clone)]
pub struct PendingValidation {
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub amount: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: String,
    pub created_at: Instant,
    pub product: Option<SideReply>,
    pub user: Option<SideReply>,
    pub product_stock: i64,
}

impl PendingValidation {
    pub fn new(init: CheckoutInit) -> Self {
        Self {
            payment_id: init.payment_id,
            order_id: init.order_id,
            user_id: init.user_id,
            product_id: init.product_id,
            quantity: init.quantity,
            amount: init.amount,
            total_amount: init.total_amount,
            payment_method: init.payment_method,
            created_at: Instant::now(),
            product: None,
            user: None,
            product_stock: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.product.is_some() && self.user.is_some()
    }

    /// Only meaningful once [`Self::is_complete`] holds.
    pub fn verdict(&self) -> Verdict {
        let product_status = self.product.as_ref().map(|r| r.status.as_str()).unwrap_or_default();
        let user_status = self.user.as_ref().map(|r| r.status.as_str()).unwrap_or_default();
        if product_status == PRODUCT_OK && user_status == USER_OK {
            Verdict::Approved
        } else {
            Verdict::Rejected {
                reason: format!("Validation failed - Product: {product_status}, User: {user_status}"),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected { reason: String },
}

/// What happened to a single validation reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Stored; still waiting on the other side.
    Recorded,
    /// This reply completed the correlation, and the verdict was dispatched.
    Completed(Verdict),
    /// No correlation exists for the payment id (already completed, swept, or never begun). Discarded.
    Unknown,
}

enum Side {
    Product,
    User,
}

impl Side {
    fn name(&self) -> &'static str {
        match self {
            Side::Product => "product",
            Side::User => "user",
        }
    }
}

pub struct ValidationCoordinator {
    pending: Mutex<HashMap<String, PendingValidation>>,
    publisher: EventPublisher,
    timeout: Duration,
}

impl ValidationCoordinator {
    pub fn new(publisher: EventPublisher, timeout: Duration) -> Self {
        Self { pending: Mutex::new(HashMap::new()), publisher, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_pending(&self, payment_id: &str) -> bool {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).contains_key(payment_id)
    }

    /// Registers a checkout so that its validation replies can be correlated. Beginning the same payment id twice
    /// replaces the earlier record, along with any reply it had already collected.
    pub fn begin_validation(&self, init: CheckoutInit) {
        if init.payment_id.is_empty() {
            warn!("🤝️ Ignoring checkout for order {} without a payment id", init.order_id);
            return;
        }
        let payment_id = init.payment_id.clone();
        let record = PendingValidation::new(init);
        let previous = self.pending.lock().unwrap_or_else(PoisonError::into_inner).insert(payment_id.clone(), record);
        if previous.is_some() {
            warn!("🤝️ Validation for payment {payment_id} was already in progress. It has been restarted.");
        } else {
            debug!("🤝️ Awaiting validation replies for payment {payment_id}");
        }
    }

    pub async fn on_product_reply(&self, reply: ProductValidationReply) -> ReplyOutcome {
        let side = SideReply { status: reply.status, message: reply.message };
        let stock = reply.stock;
        self.on_reply(&reply.payment_id, Side::Product, side, Some(stock)).await
    }

    pub async fn on_user_reply(&self, reply: UserValidationReply) -> ReplyOutcome {
        let side = SideReply { status: reply.status, message: reply.message };
        self.on_reply(&reply.payment_id, Side::User, side, None).await
    }

    async fn on_reply(&self, payment_id: &str, side: Side, reply: SideReply, stock: Option<i64>) -> ReplyOutcome {
        if payment_id.is_empty() {
            warn!("🤝️ Discarding {} validation reply without a payment id", side.name());
            return ReplyOutcome::Unknown;
        }
        // Record, check and remove under one lock so that two concurrent replies cannot both see "incomplete"
        let completed = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(record) = pending.get_mut(payment_id) else {
                info!("🤝️ No validation in progress for payment {payment_id}. Discarding {} reply.", side.name());
                return ReplyOutcome::Unknown;
            };
            let slot = match side {
                Side::Product => &mut record.product,
                Side::User => &mut record.user,
            };
            if slot.is_some() {
                debug!("🤝️ Duplicate {} reply for payment {payment_id}. Keeping the latest.", side.name());
            }
            *slot = Some(reply);
            if let Some(stock) = stock {
                record.product_stock = stock;
            }
            if record.is_complete() {
                pending.remove(payment_id)
            } else {
                None
            }
        };
        match completed {
            Some(record) => ReplyOutcome::Completed(self.dispatch(record).await),
            None => {
                trace!("🤝️ Recorded {} reply for payment {payment_id}", side.name());
                ReplyOutcome::Recorded
            },
        }
    }

    async fn dispatch(&self, record: PendingValidation) -> Verdict {
        let verdict = record.verdict();
        let result = match &verdict {
            Verdict::Approved => {
                info!("🤝️ Payment {} passed validation", record.payment_id);
                let event = OrderCompleted {
                    payment_id: record.payment_id.clone(),
                    order_id: record.order_id,
                    user_id: record.user_id,
                    product_id: record.product_id,
                    quantity: record.quantity,
                    amount: record.amount,
                    total_amount: record.total_amount,
                    payment_method: record.payment_method,
                    completed_at: Utc::now(),
                };
                self.publisher.order_completed(event).await
            },
            Verdict::Rejected { reason } => {
                info!("🤝️ Payment {} failed validation. {reason}", record.payment_id);
                let event = OrderFailed {
                    payment_id: record.payment_id.clone(),
                    order_id: record.order_id,
                    user_id: record.user_id,
                    product_id: record.product_id,
                    quantity: record.quantity,
                    amount: record.amount,
                    total_amount: record.total_amount,
                    payment_method: record.payment_method,
                    failure_reason: reason.clone(),
                };
                self.publisher.order_failed(event).await
            },
        };
        if let Err(e) = result {
            error!("🤝️ Could not publish validation result for payment {}: {e}", record.payment_id);
        }
        verdict
    }

    /// Evicts every correlation that is older than the timeout at `now`, and returns their payment ids. Evictions
    /// are not reported anywhere else.
    pub fn sweep_expired(&self, now: Instant) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.created_at) > self.timeout)
            .map(|(id, _)| id.clone())
            .collect::<Vec<String>>();
        for id in &expired {
            pending.remove(id);
        }
        if !expired.is_empty() {
            info!("🤝️ Swept {} abandoned validation(s): {}", expired.len(), expired.join(", "));
        }
        expired
    }
}
