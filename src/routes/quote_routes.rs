use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::controllers::quote_controller::QuoteController;
use crate::dto::quote_dto::{
    ApproveRequest, ApproveResponse, NextReferenceResponse, OkResponse, QuoteInput, QuoteSummary,
    RegenerateResponse, RegenerateSummary, SaveQuoteResponse,
};
use crate::middleware::auth::{is_admin_request, require_admin};
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Rutas de operador (con guard) y rutas públicas del cliente
pub fn create_quote_router(state: AppState) -> Router<AppState> {
    let operator = Router::new()
        .route("/", get(list_quotes).post(create_quote))
        .route("/next-reference", get(next_reference))
        .route("/next_ref", get(next_reference))
        .route("/regenerate-all", post(regenerate_all))
        .route("/:file", put(update_quote).delete(delete_quote))
        .route("/:file/regenerate", post(regenerate_quote))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    let public = Router::new()
        .route("/:file", get(get_quote))
        .route("/:file/approve", post(approve_quote));

    operator.merge(public)
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn controller(state: &AppState) -> QuoteController {
    QuoteController::new(state.engine.clone())
}

async fn list_quotes(State(state): State<AppState>) -> Result<Json<Vec<QuoteSummary>>, AppError> {
    Ok(Json(controller(&state).list().await?))
}

async fn next_reference(State(state): State<AppState>) -> Json<NextReferenceResponse> {
    Json(controller(&state).next_reference().await)
}

async fn create_quote(
    State(state): State<AppState>,
    Json(input): Json<QuoteInput>,
) -> Result<Json<SaveQuoteResponse>, AppError> {
    Ok(Json(controller(&state).create(input).await?))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let is_admin = is_admin_request(&state, &headers);
    let body = controller(&state)
        .get(&file, is_admin, query.token.as_deref())
        .await?;
    Ok(Json(body))
}

async fn update_quote(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Json(input): Json<QuoteInput>,
) -> Result<Json<SaveQuoteResponse>, AppError> {
    Ok(Json(controller(&state).update(&file, input).await?))
}

async fn delete_quote(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    Ok(Json(controller(&state).delete(&file).await?))
}

async fn approve_quote(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<ApproveResponse>, AppError> {
    Ok(Json(controller(&state).approve(&file, request).await?))
}

async fn regenerate_quote(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Json<RegenerateResponse>, AppError> {
    Ok(Json(controller(&state).regenerate(&file).await?))
}

async fn regenerate_all(State(state): State<AppState>) -> Result<Json<RegenerateSummary>, AppError> {
    Ok(Json(controller(&state).regenerate_all().await?))
}
