//! Cotizador - backend de cotizaciones
//!
//! Documentos JSON por cotización, PDF con marca de agua y QR, correo al
//! cliente y al operador, aprobación con código de seguridad y eventos SSE.

pub mod config;
pub mod controllers;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use middleware::cors::cors_from_origins;
use state::AppState;

/// Router completo de la aplicación
pub fn build_app(state: AppState) -> Router {
    let cors = cors_from_origins(&state.config.cors_origins);
    let outputs = ServeDir::new(&state.config.output_dir);

    Router::new()
        .route("/", get(health))
        .nest(
            "/api/quotes",
            routes::quote_routes::create_quote_router(state.clone()),
        )
        .nest("/api/events", routes::event_routes::create_event_router())
        .nest("/api/admin", routes::auth_routes::create_auth_router())
        .nest_service("/outputs", outputs)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "message": "Cotizador API funcionando",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
