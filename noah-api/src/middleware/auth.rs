use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use noah_core::identity::Claims;

use crate::error::AppError;
use crate::state::AppState;

/// Decodes the bearer token and injects [`Claims`] into request extensions.
/// Role gates happen per-handler; every protected route at least requires a
/// valid token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}

/// Staff-only operations: managers, accountants, receptionists.
pub fn require_staff(claims: &Claims) -> Result<(), AppError> {
    if claims.is_staff() {
        Ok(())
    } else {
        Err(AppError::AuthorizationError(
            "This operation requires a staff role".to_string(),
        ))
    }
}

/// The calling user's id; tokens without a UUID subject are rejected.
pub fn caller_id(claims: &Claims) -> Result<Uuid, AppError> {
    claims
        .user_id()
        .ok_or_else(|| AppError::AuthenticationError("Malformed subject claim".to_string()))
}
