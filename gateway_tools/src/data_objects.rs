//! Wire types for the payment gateway's charge, status and notification payloads.
use chrono::{DateTime, Utc};
use cpg_common::{PaymentMethod, Rupiah};
use serde::{Deserialize, Serialize};

use crate::{
    directory::{CatalogItem, Payer},
    helpers::parse_gateway_time,
};

const DEFAULT_BANK: &str = "bni";
const DEFAULT_STORE: &str = "alfamart";
const MAX_ITEM_NAME_LEN: usize = 50;

//--------------------------------------    Charge request    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: Rupiah,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemDetail {
    pub id: String,
    pub price: Rupiah,
    pub quantity: u32,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankTransferDetails {
    pub bank: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditCardDetails {
    pub secure: bool,
    pub authentication: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GopayDetails {
    pub enable_callback: bool,
    pub callback_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QrisDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquirer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopeepayDetails {
    pub callback_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EchannelDetails {
    pub bill_info1: String,
    pub bill_info2: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CstoreDetails {
    pub store: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alfamart_free_text_1: Option<String>,
}

/// Payer-supplied options that only apply to some payment methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MethodOptions {
    /// Bank code for bank transfers (`bni`, `bri`, `bca`, ...).
    #[serde(default)]
    pub bank: Option<String>,
    /// Store code for over-the-counter payments (`alfamart` or `indomaret`).
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeRequest {
    pub payment_type: String,
    pub transaction_details: TransactionDetails,
    pub customer_details: CustomerDetails,
    pub item_details: Vec<ItemDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_transfer: Option<BankTransferDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card: Option<CreditCardDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gopay: Option<GopayDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qris: Option<QrisDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopeepay: Option<ShopeepayDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echannel: Option<EchannelDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cstore: Option<CstoreDetails>,
}

/// Everything needed to charge a payer for one catalog item.
#[derive(Debug, Clone)]
pub struct PurchaseDetails<'a> {
    pub order_id: &'a str,
    pub payer: &'a Payer,
    pub item: &'a CatalogItem,
    pub amount: Rupiah,
    pub admin_fee: Rupiah,
    pub method: PaymentMethod,
    pub options: &'a MethodOptions,
    pub callback_url: &'a str,
}

impl ChargeRequest {
    /// Builds the method-specific charge body. The gross amount is always `amount + admin_fee`, and the item lines sum
    /// to the gross amount as the gateway requires.
    pub fn for_purchase(details: &PurchaseDetails<'_>) -> Self {
        let gross_amount = details.amount + details.admin_fee;
        let mut item_details = vec![ItemDetail {
            id: details.item.id.clone(),
            price: details.amount,
            quantity: 1,
            name: truncate(&details.item.name, MAX_ITEM_NAME_LEN),
            category: "product".to_string(),
        }];
        if details.admin_fee.is_positive() {
            item_details.push(ItemDetail {
                id: "admin_fee".to_string(),
                price: details.admin_fee,
                quantity: 1,
                name: "Admin Fee".to_string(),
                category: "fee".to_string(),
            });
        }
        let mut request = Self {
            payment_type: details.method.as_str().to_string(),
            transaction_details: TransactionDetails { order_id: details.order_id.to_string(), gross_amount },
            customer_details: CustomerDetails {
                first_name: details.payer.username.clone(),
                email: details.payer.email.clone(),
            },
            item_details,
            bank_transfer: None,
            credit_card: None,
            gopay: None,
            qris: None,
            shopeepay: None,
            echannel: None,
            cstore: None,
        };
        let callback_url = details.callback_url.to_string();
        match details.method {
            PaymentMethod::BankTransfer => {
                let bank = details.options.bank.clone().unwrap_or_else(|| DEFAULT_BANK.to_string());
                request.bank_transfer = Some(BankTransferDetails { bank });
            },
            PaymentMethod::CreditCard => {
                request.credit_card = Some(CreditCardDetails { secure: true, authentication: true });
            },
            PaymentMethod::Gopay => {
                request.gopay = Some(GopayDetails { enable_callback: true, callback_url });
            },
            PaymentMethod::Qris => request.qris = Some(QrisDetails::default()),
            PaymentMethod::Shopeepay => request.shopeepay = Some(ShopeepayDetails { callback_url }),
            PaymentMethod::Echannel => {
                request.echannel = Some(EchannelDetails {
                    bill_info1: "Payment:".to_string(),
                    bill_info2: "Online purchase".to_string(),
                });
            },
            PaymentMethod::Permata => {},
            PaymentMethod::Cstore => {
                let store = details.options.store.clone().unwrap_or_else(|| DEFAULT_STORE.to_string());
                let message = details.options.message.clone().unwrap_or_else(|| format!("Order {}", details.order_id));
                let alfamart_free_text_1 = (store == "alfamart").then(|| truncate(&details.item.name, 40));
                request.cstore = Some(CstoreDetails { store, message, alfamart_free_text_1 });
            },
        }
        request
    }

    pub fn order_id(&self) -> &str {
        &self.transaction_details.order_id
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

//--------------------------------------    Charge response   ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayAction {
    pub name: String,
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaNumber {
    pub bank: String,
    pub va_number: String,
}

/// Returned by both the charge and status endpoints. Every field is optional because the gateway omits whatever does
/// not apply to the payment type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChargeResponse {
    pub status_code: Option<String>,
    pub status_message: Option<String>,
    pub transaction_id: Option<String>,
    pub order_id: Option<String>,
    pub gross_amount: Option<String>,
    pub payment_type: Option<String>,
    pub transaction_time: Option<String>,
    pub transaction_status: Option<String>,
    pub fraud_status: Option<String>,
    pub actions: Option<Vec<GatewayAction>>,
    pub va_numbers: Option<Vec<VaNumber>>,
    pub payment_code: Option<String>,
    pub permata_va_number: Option<String>,
    pub bill_key: Option<String>,
    pub biller_code: Option<String>,
    pub store: Option<String>,
    pub expiry_time: Option<String>,
    pub settlement_time: Option<String>,
    pub paid_at: Option<String>,
}

impl ChargeResponse {
    /// The embedded status code when it signals an error. The gateway reports some failures with an HTTP 200.
    pub fn error_status_code(&self) -> Option<&str> {
        self.status_code.as_deref().filter(|code| code.parse::<u16>().map(|c| c >= 400).unwrap_or(false))
    }

    pub fn primary_va(&self) -> Option<&VaNumber> {
        self.va_numbers.as_ref().and_then(|v| v.first())
    }

    /// QR payments expose a `generate-qr-code` action and wallets a `deeplink-redirect`. Anything else falls back to
    /// the status page.
    pub fn redirect_url(&self) -> Option<&str> {
        let actions = self.actions.as_deref()?;
        ["generate-qr-code", "deeplink-redirect", "get-status"]
            .iter()
            .find_map(|name| actions.iter().find(|a| a.name == *name))
            .map(|a| a.url.as_str())
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry_time.as_deref().and_then(parse_gateway_time)
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at.as_deref().or(self.settlement_time.as_deref()).and_then(parse_gateway_time)
    }
}

//--------------------------------------     Notification     ---------------------------------------------------------
/// The body the gateway posts to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayNotification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub settlement_time: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub expiry_time: Option<String>,
}
