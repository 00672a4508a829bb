use axum::http::HeaderMap;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Tenant identity arrives pre-resolved; identity/tenant resolution is an
/// upstream concern.
pub const TENANT_HEADER: &str = "X-Tenant-Id";
pub const SESSION_HEADER: &str = "X-Session-Id";

pub fn tenant_id(headers: &HeaderMap) -> Result<Uuid, ServiceError> {
    let raw = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("Missing {} header", TENANT_HEADER))
        })?;

    Uuid::parse_str(raw).map_err(|_| {
        ServiceError::ValidationError(format!("{} is not a valid UUID", TENANT_HEADER))
    })
}

pub fn session_id(headers: &HeaderMap) -> Result<String, ServiceError> {
    let raw = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("Missing {} header", SESSION_HEADER))
        })?;

    if raw.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be empty",
            SESSION_HEADER
        )));
    }

    Ok(raw.to_string())
}

/// Inbound webhook auth: a constant shared API key, compared verbatim.
pub fn verify_api_key(headers: &HeaderMap, expected: &str) -> Result<(), ServiceError> {
    let provided = headers
        .get(crate::webhooks::supplier::API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("Missing API key".to_string()))?;

    if provided != expected {
        return Err(ServiceError::Unauthorized("Invalid API key".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn tenant_header_is_required_and_must_be_uuid() {
        let empty = HeaderMap::new();
        assert!(matches!(
            tenant_id(&empty),
            Err(ServiceError::ValidationError(_))
        ));

        let mut bad = HeaderMap::new();
        bad.insert(TENANT_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            tenant_id(&bad),
            Err(ServiceError::ValidationError(_))
        ));

        let mut good = HeaderMap::new();
        let id = Uuid::new_v4();
        good.insert(TENANT_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(tenant_id(&good).unwrap(), id);
    }

    #[test]
    fn api_key_must_match_exactly() {
        let mut headers = HeaderMap::new();
        headers.insert(
            crate::webhooks::supplier::API_KEY_HEADER,
            HeaderValue::from_static("secret-key"),
        );

        assert!(verify_api_key(&headers, "secret-key").is_ok());
        assert!(matches!(
            verify_api_key(&headers, "other-key"),
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            verify_api_key(&HeaderMap::new(), "secret-key"),
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
