//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::company_repository::JsonCompanyDirectory;
use crate::repositories::quote_repository::QuoteRepository;
use crate::services::currency_service::{CurrencyGateway, MindicadorClient};
use crate::services::email_service::{EmailNotifier, MailPolicy, SmtpMailer};
use crate::services::event_hub::EventHub;
use crate::services::pdf_service::PdfArtifactRenderer;
use crate::services::quote_service::QuoteEngine;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::jwt::{AdminTokenService, CapabilityTokenService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub engine: Arc<QuoteEngine>,
    pub events: EventHub,
    pub admin_tokens: AdminTokenService,
}

impl AppState {
    /// Estado sobre un motor ya construido (los tests inyectan sus fakes)
    pub fn new(config: EnvironmentConfig, engine: QuoteEngine) -> Self {
        Self {
            admin_tokens: AdminTokenService::from_config(&config),
            events: engine.events().clone(),
            engine: Arc::new(engine),
            config: Arc::new(config),
        }
    }

    /// Estado de producción: archivos en disco, mindicador.cl, printpdf y SMTP
    pub fn from_config(config: EnvironmentConfig) -> AppResult<Self> {
        let repo = QuoteRepository::new(&config.output_dir, &config.reference_prefix)?;
        let companies = JsonCompanyDirectory::new(config.output_dir.join("empresas.json"));

        let rates = MindicadorClient::new(&config.rates_base_url, config.rates_timeout)
            .map_err(|e| AppError::Internal(format!("Cliente de tasas: {}", e)))?;
        let renderer = PdfArtifactRenderer::new(repo.clone(), config.frontend_url.clone());
        let mailer = SmtpMailer::from_config(&config.smtp)
            .map_err(|e| AppError::Internal(format!("Transporte SMTP: {}", e)))?;
        let notifier = EmailNotifier::new(MailPolicy::from_config(&config), Arc::new(mailer));

        let engine = QuoteEngine::new(
            repo,
            Arc::new(companies),
            CurrencyGateway::new(Arc::new(rates)),
            Arc::new(renderer),
            Arc::new(notifier),
            EventHub::default(),
            CapabilityTokenService::from_config(&config),
        );

        Ok(Self::new(config, engine))
    }
}
