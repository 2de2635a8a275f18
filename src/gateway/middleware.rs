use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::state::AppState;
use super::types::{ApiError, error_codes};
use crate::store::TxBackend;

const AUTHORIZATION_TYPE_BEARER: &str = "bearer";

/// Verify `Authorization: Bearer <token>` and inject the token [`Payload`]
///
/// [`Payload`]: crate::token::Payload
pub async fn bearer_auth<B: TxBackend>(
    State(state): State<Arc<AppState<B>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                axum::http::StatusCode::UNAUTHORIZED,
                error_codes::MISSING_AUTH,
                "authorization header is not provided",
            )
        })?;

    let token = parse_bearer(auth_header)
        .ok_or_else(|| ApiError::unauthorized("invalid authorization header format"))?;

    let payload = state.tokens.verify(token)?;
    request.extensions_mut().insert(payload);
    Ok(next.run(request).await)
}

/// Token from a `<type> <credentials>` header, scheme matched case-insensitively
fn parse_bearer(header: &str) -> Option<&str> {
    let mut fields = header.split_whitespace();
    let (scheme, token) = (fields.next()?, fields.next()?);
    if fields.next().is_some() || !scheme.eq_ignore_ascii_case(AUTHORIZATION_TYPE_BEARER) {
        return None;
    }
    Some(token)
}
