//! Services module
//!
//! Este módulo contiene la lógica de negocio y servicios de la aplicación.
//! El motor de cotizaciones orquesta conversión de moneda, renderizado,
//! difusión de eventos y notificaciones.

pub mod currency_service;
pub mod email_service;
pub mod event_hub;
pub mod pdf_service;
pub mod quote_service;

pub use currency_service::{CurrencyGateway, MindicadorClient, RateSource};
pub use email_service::{EmailNotifier, MailPolicy, MailTransport, Notifier, QuoteNotice, SmtpMailer};
pub use event_hub::{EventHub, EventKind, LifecycleEvent, Subscription};
pub use pdf_service::{ArtifactRenderer, PdfArtifactRenderer};
pub use quote_service::{ApproveOutcome, QuoteEngine};
