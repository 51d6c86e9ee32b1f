//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! JWT, formato numérico y locks por referencia.

pub mod errors;
pub mod jwt;
pub mod keyed_lock;
pub mod number;
pub mod validation;
