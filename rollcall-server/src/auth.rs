//! Upload authentication middleware
//!
//! Runs before the body limit and the body extractor, so a request without
//! the header is refused with 401 no matter how large its body is.

use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ApiError;
use crate::validation::has_auth_key;

/// Reject requests without a non-empty `auth-key` header.
pub async fn require_auth_key(request: Request, next: Next) -> Result<Response, ApiError> {
    if !has_auth_key(request.headers()) {
        return Err(ApiError::AuthRequired);
    }
    Ok(next.run(request).await)
}
