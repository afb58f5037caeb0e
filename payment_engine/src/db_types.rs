use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use cpg_common::{DerivedField, PaymentMethod, Rupiah};
use gateway_tools::data_objects::ChargeResponse;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
/// The canonical payment lifecycle.
///
/// | From    | To                                   |
/// |---------|--------------------------------------|
/// | Pending | Success, Failed, Cancelled, Expired  |
/// | any terminal state | (none)                    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// Created at the gateway, waiting for the payer.
    Pending,
    /// Settled or captured by the gateway.
    Success,
    /// Denied by the gateway.
    Failed,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(self, Self::Pending) && next.is_terminal()
    }

    /// Statuses that cascade into a `payment.failed` event.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment status: {0}")]
pub struct ConversionError(String);

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            "EXPIRED" => Ok(Self::Expired),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Payment {
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
    pub transaction_id: Option<String>,
    pub transaction_status: Option<String>,
    pub fraud_status: Option<String>,
    pub payment_code: Option<String>,
    pub va_number: Option<String>,
    pub bank_type: Option<String>,
    pub store_type: Option<String>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_response: Option<String>,
    pub gateway_actions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewPayment      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub product_id: Option<String>,
    pub amount: Rupiah,
    pub admin_fee: Rupiah,
    pub total_amount: Rupiah,
    pub payment_method: PaymentMethod,
    pub payment_type: String,
    pub notes: Option<String>,
}

impl NewPayment {
    /// A fresh payment with a random id. `total_amount` is always `amount + admin_fee`.
    pub fn new(order_id: String, user_id: String, amount: Rupiah, admin_fee: Rupiah, method: PaymentMethod) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order_id,
            user_id,
            product_id: None,
            amount,
            admin_fee,
            total_amount: amount + admin_fee,
            payment_method: method,
            payment_type: method.as_str().to_string(),
            notes: None,
        }
    }

    pub fn with_product_id(mut self, product_id: String) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_payment_type(mut self, payment_type: String) -> Self {
        self.payment_type = payment_type;
        self
    }
}

//--------------------------------------     GatewayFields     ---------------------------------------------------------
/// Gateway-derived values to merge into a payment row. A `None` never overwrites a stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayFields {
    pub transaction_id: Option<String>,
    pub transaction_status: Option<String>,
    pub fraud_status: Option<String>,
    pub payment_type: Option<String>,
    pub payment_code: Option<String>,
    pub va_number: Option<String>,
    pub bank_type: Option<String>,
    pub store_type: Option<String>,
    pub redirect_url: Option<String>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_response: Option<String>,
    pub gateway_actions: Option<String>,
}

impl GatewayFields {
    /// Extracts everything worth keeping from a charge or status response.
    ///
    /// Where the payer-facing reference lives depends on the method: bank transfers list it under `va_numbers`, Permata
    /// has its own field, Mandiri bill payments (`echannel`) split it into a bill key and a biller code, and
    /// over-the-counter payments use the payment code for both.
    pub fn from_gateway_response(response: &ChargeResponse, method: PaymentMethod) -> Self {
        let mut fields = Self {
            transaction_id: response.transaction_id.clone(),
            transaction_status: response.transaction_status.clone(),
            fraud_status: response.fraud_status.clone(),
            payment_type: response.payment_type.clone(),
            payment_code: response.payment_code.clone(),
            store_type: response.store.clone(),
            redirect_url: response.redirect_url().map(String::from),
            expiry_time: response.expiry(),
            paid_at: response.paid_at(),
            gateway_response: serde_json::to_string(response).ok(),
            gateway_actions: response.actions.as_ref().and_then(|a| serde_json::to_string(a).ok()),
            ..Default::default()
        };
        if let Some(va) = response.primary_va() {
            fields.va_number = Some(va.va_number.clone());
            fields.bank_type = Some(va.bank.clone());
        }
        if let Some(permata) = &response.permata_va_number {
            fields.va_number = Some(permata.clone());
            fields.bank_type = Some("permata".to_string());
        }
        if method == PaymentMethod::Echannel {
            if let Some(bill_key) = &response.bill_key {
                fields.va_number = Some(bill_key.clone());
                fields.bank_type = Some("mandiri".to_string());
            }
            if let Some(biller_code) = &response.biller_code {
                fields.payment_code = Some(biller_code.clone());
            }
        }
        if method == PaymentMethod::Cstore && fields.va_number.is_none() {
            fields.va_number = fields.payment_code.clone();
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Whether the value a payer needs for `method` is present.
    pub fn has_derived_field(&self, method: PaymentMethod) -> bool {
        has_derived_field(method, self.va_number.as_deref(), self.payment_code.as_deref())
    }
}

impl Payment {
    /// The same merge the store performs, applied in memory.
    pub fn with_fields(mut self, fields: &GatewayFields) -> Self {
        fn merge<T: Clone>(current: &mut Option<T>, update: &Option<T>) {
            if update.is_some() {
                current.clone_from(update);
            }
        }
        merge(&mut self.transaction_id, &fields.transaction_id);
        merge(&mut self.transaction_status, &fields.transaction_status);
        merge(&mut self.fraud_status, &fields.fraud_status);
        merge(&mut self.payment_code, &fields.payment_code);
        merge(&mut self.va_number, &fields.va_number);
        merge(&mut self.bank_type, &fields.bank_type);
        merge(&mut self.store_type, &fields.store_type);
        merge(&mut self.redirect_url, &fields.redirect_url);
        merge(&mut self.expiry_time, &fields.expiry_time);
        merge(&mut self.paid_at, &fields.paid_at);
        merge(&mut self.gateway_response, &fields.gateway_response);
        merge(&mut self.gateway_actions, &fields.gateway_actions);
        if let Some(payment_type) = &fields.payment_type {
            self.payment_type.clone_from(payment_type);
        }
        self
    }

    pub fn has_derived_field(&self) -> bool {
        has_derived_field(self.payment_method, self.va_number.as_deref(), self.payment_code.as_deref())
    }
}

fn has_derived_field(method: PaymentMethod, va_number: Option<&str>, payment_code: Option<&str>) -> bool {
    let present = |v: Option<&str>| v.map(|s| !s.is_empty()).unwrap_or(false);
    match method.derived_field() {
        DerivedField::VaNumber => present(va_number),
        DerivedField::PaymentCode => present(payment_code),
        DerivedField::None => true,
    }
}

//--------------------------------------      PaymentPage      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPage {
    pub payments: Vec<Payment>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl PaymentPage {
    pub fn new(payments: Vec<Payment>, total: i64, page: u32, limit: u32) -> Self {
        let has_more = i64::from(page) * i64::from(limit) < total;
        Self { payments, total, page, limit, has_more }
    }
}

//--------------------------------------      PaymentStats     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: PaymentStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusAmount {
    pub status: PaymentStatus,
    pub amount: Rupiah,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentStats {
    pub status_counts: Vec<StatusCount>,
    pub amount_by_status: Vec<StatusAmount>,
    pub total_count: i64,
}
