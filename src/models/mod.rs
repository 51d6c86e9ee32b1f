//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos persistidos como documentos JSON.

pub mod company;
pub mod quote;

pub use company::CompanyProfile;
pub use quote::{Currency, LineItem, Quote, QuoteState};
