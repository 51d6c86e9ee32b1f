//! DTOs de la API HTTP

pub mod auth_dto;
pub mod quote_dto;
