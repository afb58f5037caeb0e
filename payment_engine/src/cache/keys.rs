use std::time::Duration;

pub const PAYMENT_TTL: Duration = Duration::from_secs(60 * 60);
pub const USER_PAYMENTS_TTL: Duration = Duration::from_secs(30 * 60);

pub fn payment_key(id: &str) -> String {
    format!("payment:{id}")
}

pub fn order_key(order_id: &str) -> String {
    format!("payment_order:{order_id}")
}

pub fn user_payments_key(user_id: &str, page: u32, limit: u32) -> String {
    format!("user_payments:{user_id}:{page}:{limit}")
}

/// Matches every cached page of a user's payment list.
pub fn user_payments_pattern(user_id: &str) -> String {
    format!("user_payments:{user_id}:*")
}
