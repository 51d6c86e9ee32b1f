pub mod auth_routes;
pub mod event_routes;
pub mod quote_routes;
