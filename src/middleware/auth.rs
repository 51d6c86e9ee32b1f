//! Middleware de autenticación del administrador
//!
//! Las rutas del operador exigen un Bearer JWT con rol admin. Sin
//! `ADMIN_PASSWORD` configurada el guard queda desactivado (desarrollo).

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    state::AppState,
    utils::{errors::AppError, jwt::extract_token_from_header},
};

/// Guard de rutas de operador
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.config.admin_auth_enabled() {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Token de administrador requerido".to_string()))?;

    let token = extract_token_from_header(auth_header)?;
    state.admin_tokens.verify(token)?;

    Ok(next.run(request).await)
}

/// ¿La request trae un token de administrador válido?
pub fn is_admin_request(state: &AppState, headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| extract_token_from_header(value).ok())
        .map(|token| state.admin_tokens.verify(token).is_ok())
        .unwrap_or(false)
}
