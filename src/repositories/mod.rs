//! Repositorios
//!
//! Acceso a documentos persistidos en el directorio de salida.

pub mod company_repository;
pub mod quote_repository;

pub use company_repository::{CompanyDirectory, JsonCompanyDirectory};
pub use quote_repository::{QuoteRepository, StoreError, StoredDocument};
