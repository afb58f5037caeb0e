use chrono::{DateTime, NaiveDateTime, Utc};
use sha2::{Digest, Sha512};

/// The gateway reports times in several layouts depending on the endpoint. Naive times are treated as UTC.
pub fn parse_gateway_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|t| t.and_utc())
}

/// `hex(sha512(order_id ‖ status_code ‖ gross_amount ‖ server_key))`
pub fn notification_signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Compares two byte strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn basic_auth_header(server_key: &str) -> String {
    format!("Basic {}", base64::encode(format!("{server_key}:")))
}

#[cfg(test)]
mod test {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn parses_all_gateway_time_layouts() {
        let t = parse_gateway_time("2024-06-01T10:20:30+07:00").unwrap();
        assert_eq!(t.hour(), 3);
        let t = parse_gateway_time("2024-06-01 10:20:30").unwrap();
        assert_eq!((t.day(), t.hour(), t.minute(), t.second()), (1, 10, 20, 30));
        let t = parse_gateway_time("2024-06-01T10:20:30").unwrap();
        assert_eq!(t.hour(), 10);
        assert!(parse_gateway_time("").is_none());
        assert!(parse_gateway_time("yesterday").is_none());
    }

    #[test]
    fn signature_is_lower_hex_sha512() {
        let sig = notification_signature("Order_1", "200", "102500.00", "secret");
        assert_eq!(sig.len(), 128);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(sig, notification_signature("Order_1", "200", "102500.00", "other"));
        assert_ne!(sig, notification_signature("Order_2", "200", "102500.00", "secret"));
    }

    #[test]
    fn empty_input_hash() {
        // sha512("")
        assert!(notification_signature("", "", "", "").starts_with("cf83e1357eefb8bdf1542850d66d8007"));
    }

    #[test]
    fn constant_time_comparison() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn basic_auth() {
        assert_eq!(basic_auth_header("key"), "Basic a2V5Og==");
    }
}
