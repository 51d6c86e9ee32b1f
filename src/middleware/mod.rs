//! Middleware del sistema
//!
//! Autenticación del administrador y CORS.

pub mod auth;
pub mod cors;

pub use auth::*;
pub use cors::*;
