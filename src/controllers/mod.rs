//! Controladores: adaptan DTOs de la API al motor de cotizaciones

pub mod auth_controller;
pub mod quote_controller;
