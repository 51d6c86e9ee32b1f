//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de entorno: servidor, almacenamiento,
//! tokens, tasas de cambio y SMTP.

pub mod environment;

pub use environment::*;
