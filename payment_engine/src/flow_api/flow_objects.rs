use std::{sync::Arc, time::Duration};

use cpg_common::{PaymentMethod, Rupiah};
use gateway_tools::data_objects::MethodOptions;
use serde::{Deserialize, Serialize};

use crate::{
    cache::PaymentCache,
    db_types::{Payment, PaymentStatus},
    events::EventPublisher,
    traits::{Directory, PaymentGateway},
};

/// A payer's request to pay for a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub product_id: String,
    pub amount: Rupiah,
    #[serde(default)]
    pub admin_fee: Rupiah,
    pub payment_method: PaymentMethod,
    #[serde(flatten)]
    pub options: MethodOptions,
    /// Supplying an order id makes creation idempotent: a second request with the same id returns the first payment.
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub payment: Payment,
    pub previous: PaymentStatus,
    /// True only for the caller whose update moved the status.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// How many times to look for a payment's VA number or payment code before answering without it.
    pub derived_field_attempts: u32,
    pub derived_field_delay: Duration,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self { derived_field_attempts: 5, derived_field_delay: Duration::from_secs(1) }
    }
}

/// Everything [`crate::PaymentFlowApi`] needs, passed in explicitly.
#[derive(Clone)]
pub struct FlowDependencies<B> {
    pub store: B,
    pub gateway: Arc<dyn PaymentGateway>,
    pub directory: Arc<dyn Directory>,
    pub cache: Arc<dyn PaymentCache>,
    pub publisher: EventPublisher,
    pub options: FlowOptions,
}
