//! Bearer-token resolution for web handlers.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use motherconf::AuthConfig;
use motherproto::StoreError;

/// Resolve the request's owner from its Authorization header.
///
/// With no tokens configured the daemon is single-tenant and every
/// request maps to the default owner, token or not. Once any token is
/// configured, a valid `Bearer` token is required.
pub fn resolve_owner(auth: &AuthConfig, headers: &HeaderMap) -> Result<String, StoreError> {
    if auth.single_tenant() {
        return Ok(AuthConfig::DEFAULT_OWNER.to_string());
    }

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StoreError::Unauthorized)?;

    auth.owner_for(token)
        .map(str::to_string)
        .ok_or(StoreError::Unauthorized)
}
