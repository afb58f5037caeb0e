use actix_web::HttpRequest;
use log::{debug, trace};
use uuid::Uuid;

use crate::errors::ServerError;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// Reads the requester's id from the `X-User-ID` header. The header is set by the upstream gateway after it has
/// authenticated the caller, so the only check made here is that it holds a UUID.
pub fn requester_id(req: &HttpRequest) -> Result<String, ServerError> {
    trace!("Checking {USER_ID_HEADER} header");
    let value = req
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(|| ServerError::Unauthenticated(format!("The {USER_ID_HEADER} header is missing")))?;
    let value = value.to_str().map_err(|e| {
        debug!("💻️ Could not read {USER_ID_HEADER} header. {e}");
        ServerError::Unauthenticated(format!("The {USER_ID_HEADER} header is not valid text"))
    })?;
    let id = Uuid::parse_str(value.trim()).map_err(|e| {
        debug!("💻️ {USER_ID_HEADER} header is not a UUID. {e}");
        ServerError::Unauthenticated(format!("The {USER_ID_HEADER} header must be a UUID"))
    })?;
    Ok(id.to_string())
}
