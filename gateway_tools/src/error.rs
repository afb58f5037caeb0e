use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize gateway client: {0}")]
    Initialization(String),
    #[error("Gateway request failed before a response was received: {0}")]
    Transport(String),
    #[error("Gateway unreachable after {attempts} attempts. {message}")]
    Unreachable { attempts: u32, message: String },
    #[error("Gateway returned HTTP {status}. {message}")]
    Http { status: u16, message: String },
    #[error("Gateway rejected the request with status {status_code}. {message}")]
    Rejected { status_code: String, message: String },
    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

const OUTAGE_PATTERN: &str = r"(?i)(unable to create va_number|system is recovering|service unavailable)";

fn outage_signatures() -> Option<&'static Regex> {
    static SIGNATURES: OnceLock<Option<Regex>> = OnceLock::new();
    SIGNATURES.get_or_init(|| Regex::new(OUTAGE_PATTERN).ok()).as_ref()
}

fn looks_like_outage(message: &str) -> bool {
    outage_signatures().is_some_and(|re| re.is_match(message))
}

impl GatewayError {
    /// Only transport failures, 5xx and rate limiting are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Recognisable provider-side outages. Callers offer the payer a different payment method for these rather than a
    /// hard failure.
    pub fn is_transient_outage(&self) -> bool {
        match self {
            Self::Http { status, message } => *status >= 500 || looks_like_outage(message),
            Self::Rejected { status_code, message } => {
                matches!(status_code.as_str(), "500" | "502" | "503" | "505") || looks_like_outage(message)
            },
            _ => false,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("{service} has no record of {id}")]
    NotFound { service: &'static str, id: String },
    #[error("{service} is unavailable. {message}")]
    Unavailable { service: &'static str, message: String },
    #[error("{service} returned an unreadable response. {message}")]
    InvalidResponse { service: &'static str, message: String },
    #[error("Could not initialize collaborator client: {0}")]
    Initialization(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(GatewayError::Transport("connection refused".into()).is_retryable());
        assert!(GatewayError::Http { status: 503, message: String::new() }.is_retryable());
        assert!(GatewayError::Http { status: 429, message: String::new() }.is_retryable());
        assert!(!GatewayError::Http { status: 400, message: String::new() }.is_retryable());
        assert!(!GatewayError::Http { status: 401, message: String::new() }.is_retryable());
        let rejected = GatewayError::Rejected { status_code: "500".into(), message: "oops".into() };
        assert!(!rejected.is_retryable());
        assert!(!GatewayError::Unreachable { attempts: 3, message: String::new() }.is_retryable());
    }

    #[test]
    fn outage_pattern_compiles() {
        assert!(outage_signatures().is_some());
        assert!(looks_like_outage("Service Unavailable"));
        assert!(!looks_like_outage("Transaction doesn't exist."));
    }

    #[test]
    fn outage_classification() {
        let e = GatewayError::Rejected { status_code: "505".into(), message: "x".into() };
        assert!(e.is_transient_outage());
        let e = GatewayError::Rejected {
            status_code: "400".into(),
            message: "Unable to create va_number for this transaction".into(),
        };
        assert!(e.is_transient_outage());
        let e = GatewayError::Http { status: 400, message: "The System is Recovering".into() };
        assert!(e.is_transient_outage());
        let e = GatewayError::Rejected { status_code: "406".into(), message: "duplicate order id".into() };
        assert!(!e.is_transient_outage());
        let e = GatewayError::Unreachable { attempts: 3, message: "timeout".into() };
        assert!(!e.is_transient_outage());
        assert!(e.is_unreachable());
    }
}
