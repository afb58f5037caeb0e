//! Maps gateway transaction states onto [`PaymentStatus`].
use crate::db_types::PaymentStatus;

const STATUS_TABLE: [(&str, PaymentStatus); 6] = [
    ("pending", PaymentStatus::Pending),
    ("settlement", PaymentStatus::Success),
    ("capture", PaymentStatus::Success),
    ("deny", PaymentStatus::Failed),
    ("cancel", PaymentStatus::Cancelled),
    ("expire", PaymentStatus::Expired),
];

/// Total: any string the table does not know maps to `Pending`, so an unfamiliar intermediate state is never mistaken
/// for a terminal one.
pub fn map_status(gateway_status: &str) -> PaymentStatus {
    let status = gateway_status.trim();
    STATUS_TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(status))
        .map(|(_, s)| *s)
        .unwrap_or(PaymentStatus::Pending)
}
