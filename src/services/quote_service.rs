//! Motor del ciclo de vida de cotizaciones
//!
//! Máquina de estados (pendiente, aprobada, rechazada, en revisión), emisión
//! y verificación de tokens, reglas de mutación y orquestación de efectos.
//!
//! Todo cambio persistido sigue el mismo orden:
//! persistir → renderizar → difundir evento → notificar (en segundo plano).
//! Persistir es el punto de no retorno: un fallo de render posterior se
//! informa como `RenderFailure` pero el cambio queda guardado.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::dto::quote_dto::{ApproveRequest, QuoteInput, QuoteSummary, RegenerateSummary, SaveQuoteResponse};
use crate::models::company::CompanyProfile;
use crate::models::quote::Quote;
use crate::repositories::company_repository::CompanyDirectory;
use crate::repositories::quote_repository::QuoteRepository;
use crate::services::currency_service::CurrencyGateway;
use crate::services::email_service::{Notifier, QuoteNotice};
use crate::services::event_hub::{EventHub, EventKind, LifecycleEvent};
use crate::services::pdf_service::ArtifactRenderer;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::jwt::CapabilityTokenService;
use crate::utils::keyed_lock::KeyedLocks;
use crate::utils::validation::decimal_from_json;

const MAX_REFERENCE_ATTEMPTS: usize = 5;

/// Resultado de la operación de aprobación
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveOutcome {
    Rejected,
    NeedsReview,
    Approved,
}

/// Destino de una notificación posterior al cambio
#[derive(Debug, Clone)]
enum Delivery {
    Client(QuoteNotice),
    Operator(QuoteNotice),
}

pub struct QuoteEngine {
    repo: QuoteRepository,
    companies: Arc<dyn CompanyDirectory>,
    currency: CurrencyGateway,
    renderer: Arc<dyn ArtifactRenderer>,
    notifier: Arc<dyn Notifier>,
    events: EventHub,
    tokens: CapabilityTokenService,
    locks: KeyedLocks,
}

impl QuoteEngine {
    pub fn new(
        repo: QuoteRepository,
        companies: Arc<dyn CompanyDirectory>,
        currency: CurrencyGateway,
        renderer: Arc<dyn ArtifactRenderer>,
        notifier: Arc<dyn Notifier>,
        events: EventHub,
        tokens: CapabilityTokenService,
    ) -> Self {
        Self {
            repo,
            companies,
            currency,
            renderer,
            notifier,
            events,
            tokens,
            locks: KeyedLocks::new(),
        }
    }

    pub fn repository(&self) -> &QuoteRepository {
        &self.repo
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Resúmenes ordenados por `savedAt` descendente; los ilegibles se omiten
    pub async fn list(&self) -> AppResult<Vec<QuoteSummary>> {
        let mut summaries = Vec::new();
        for document in self.repo.list().await? {
            match self.repo.read(&document.file).await {
                Ok(quote) => summaries.push(QuoteSummary::from_quote(&document.file, &quote)),
                Err(e) => log::warn!("⚠️ Documento omitido en el listado ({}): {}", document.file, e),
            }
        }

        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }

    pub async fn get(&self, file: &str) -> AppResult<Quote> {
        Ok(self.repo.read(file).await?)
    }

    pub async fn next_reference(&self) -> String {
        self.repo.next_reference().await
    }

    /// ¿El token entregado es el token de capacidad de esta cotización?
    pub fn verify_capability(&self, quote: &Quote, token: &str) -> bool {
        token == quote.capability_token && self.tokens.verify(token, &quote.reference).is_ok()
    }

    pub async fn create(&self, input: QuoteInput) -> AppResult<SaveQuoteResponse> {
        input.validate()?;

        // Reservar una referencia libre bajo su propio lock
        let mut reserved = None;
        for _ in 0..MAX_REFERENCE_ATTEMPTS {
            let candidate = self.repo.next_reference().await;
            let guard = self.locks.acquire(&candidate).await;
            if !self.repo.exists(&candidate).await {
                reserved = Some((candidate, guard));
                break;
            }
        }
        let (reference, _guard) = reserved
            .ok_or_else(|| AppError::Internal("No se pudo reservar una referencia".to_string()))?;

        let token = self.tokens.mint(&reference, input.client.trim())?;
        let mut quote = input.into_quote(reference, token.clone(), Utc::now());
        self.currency.stamp_conversion(&mut quote).await;

        let file = quote.file_name();
        self.repo.write(&file, &quote).await?;
        log::info!("📝 Cotización {} creada para {}", quote.reference, quote.client);

        self.after_persist(&quote, EventKind::Created, vec![Delivery::Client(QuoteNotice::Created)])
            .await?;

        Ok(SaveQuoteResponse { ok: true, file, token })
    }

    /// Reemplazo completo: conserva referencia, token y `createdAt`;
    /// el ciclo de vida vuelve a pendiente
    pub async fn update(&self, file: &str, input: QuoteInput) -> AppResult<SaveQuoteResponse> {
        let file = self.repo.normalize_file(file)?;
        let _guard = self.locks.acquire(QuoteRepository::reference_of(&file)).await;

        let existing = self.repo.read(&file).await?;
        input.validate()?;

        let now = Utc::now();
        let mut quote = input.into_quote(existing.reference.clone(), existing.capability_token.clone(), now);
        quote.created_at = existing.created_at.or(Some(now));
        quote.reset_lifecycle();
        self.currency.stamp_conversion(&mut quote).await;

        self.repo.write(&file, &quote).await?;
        log::info!("✏️ Cotización {} actualizada", quote.reference);

        self.after_persist(&quote, EventKind::Updated, vec![Delivery::Client(QuoteNotice::Updated)])
            .await?;

        Ok(SaveQuoteResponse {
            ok: true,
            file,
            token: quote.capability_token,
        })
    }

    /// Borra el documento, el PDF y el QR
    pub async fn delete(&self, file: &str) -> AppResult<()> {
        let file = self.repo.normalize_file(file)?;
        let _guard = self.locks.acquire(QuoteRepository::reference_of(&file)).await;

        let quote = self.repo.read(&file).await?;
        self.repo.delete(&file).await?;
        log::info!("🗑️ Cotización {} eliminada", quote.reference);
        self.events.broadcast(LifecycleEvent::deleted(&quote.reference));

        // El documento ya no existe: un artefacto huérfano solo se registra
        if let Err(e) = self.repo.remove_artifacts(&quote.reference).await {
            log::error!("❌ No se pudieron borrar los artefactos de {}: {}", quote.reference, e);
        }
        Ok(())
    }

    /// Transición iniciada por el cliente con su código de seguridad
    pub async fn approve(&self, file: &str, request: ApproveRequest) -> AppResult<ApproveOutcome> {
        let file = self.repo.normalize_file(file)?;
        let _guard = self.locks.acquire(QuoteRepository::reference_of(&file)).await;

        let mut quote = self.repo.read(&file).await?;
        if quote.capability_token.is_empty() || request.short_code.trim() != quote.short_code() {
            log::warn!("🔒 Código inválido para {}", quote.reference);
            return Err(AppError::InvalidCode);
        }

        let approver = request
            .approver_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Web")
            .to_string();
        let now = Utc::now();

        if request.reject {
            let reason = request.reason.unwrap_or_default().trim().to_string();
            quote.mark_rejected(approver, reason.clone(), now);
            self.repo.write(&file, &quote).await?;
            log::info!("❌ Cotización {} rechazada", quote.reference);

            self.after_persist(
                &quote,
                EventKind::Rejected,
                vec![
                    Delivery::Operator(QuoteNotice::Rejected { reason: reason.clone() }),
                    Delivery::Client(QuoteNotice::Rejected { reason }),
                ],
            )
            .await?;
            return Ok(ApproveOutcome::Rejected);
        }

        if quote.rejected {
            quote.mark_needs_review(approver, now);
            self.repo.write(&file, &quote).await?;
            log::info!("🔎 Cotización {} rechazada pasa a revisión", quote.reference);

            self.after_persist(
                &quote,
                EventKind::NeedsReview,
                vec![Delivery::Operator(QuoteNotice::NeedsReview)],
            )
            .await?;
            return Ok(ApproveOutcome::NeedsReview);
        }

        if quote.is_prepayment_required {
            let submitted = request.prepayment_amount.as_ref().and_then(decimal_from_json);
            match (submitted, quote.prepayment_amount) {
                (Some(submitted), Some(expected)) if submitted == expected => {}
                _ => {
                    log::warn!("💰 Anticipo inválido para {}", quote.reference);
                    return Err(AppError::InvalidPrepayment);
                }
            }
        }

        quote.mark_approved(approver, now);
        self.repo.write(&file, &quote).await?;
        log::info!("✅ Cotización {} aprobada por {}", quote.reference, quote.approved_by.as_deref().unwrap_or("Web"));

        self.after_persist(
            &quote,
            EventKind::Approved,
            vec![
                Delivery::Client(QuoteNotice::Approved),
                Delivery::Operator(QuoteNotice::Approved),
            ],
        )
        .await?;
        Ok(ApproveOutcome::Approved)
    }

    /// Volver a generar PDF y QR desde el estado guardado
    pub async fn regenerate(&self, file: &str) -> AppResult<()> {
        let file = self.repo.normalize_file(file)?;
        let _guard = self.locks.acquire(QuoteRepository::reference_of(&file)).await;

        let quote = self.repo.read(&file).await?;
        self.render(&quote).await?;
        log::info!("🔁 Artefactos de {} regenerados", quote.reference);
        Ok(())
    }

    pub async fn regenerate_all(&self) -> AppResult<RegenerateSummary> {
        let documents = self.repo.list().await?;
        let mut summary = RegenerateSummary {
            total: documents.len(),
            ..Default::default()
        };

        for document in documents {
            match self.regenerate(&document.file).await {
                Ok(()) => summary.regenerated += 1,
                Err(e) => {
                    log::error!("❌ No se pudo regenerar {}: {}", document.file, e);
                    summary.failed += 1;
                    summary.errors.push(document.file);
                }
            }
        }

        log::info!(
            "🔁 Regeneración masiva: {}/{} correctas",
            summary.regenerated,
            summary.total
        );
        Ok(summary)
    }

    async fn company_for(&self, quote: &Quote) -> Option<CompanyProfile> {
        match quote.company_id.as_deref() {
            Some(id) if !id.trim().is_empty() => self.companies.get(id).await,
            _ => None,
        }
    }

    async fn render(&self, quote: &Quote) -> AppResult<PathBuf> {
        let company = self.company_for(quote).await;
        self.renderer
            .render(quote, company.as_ref())
            .await
            .map(|artifacts| artifacts.pdf_path)
            .map_err(|source| AppError::RenderFailure {
                reference: quote.reference.clone(),
                source,
            })
    }

    /// Render, evento y notificaciones de un cambio ya persistido.
    /// Sin PDF no se notifica; el evento sale igual.
    async fn after_persist(&self, quote: &Quote, kind: EventKind, deliveries: Vec<Delivery>) -> AppResult<()> {
        let rendered = self.render(quote).await;
        self.events.broadcast(LifecycleEvent::for_quote(kind, quote));

        let pdf_path = rendered?;
        self.spawn_notifications(quote.clone(), pdf_path, deliveries);
        Ok(())
    }

    fn spawn_notifications(&self, quote: Quote, pdf_path: PathBuf, deliveries: Vec<Delivery>) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            for delivery in deliveries {
                let result = match delivery {
                    Delivery::Client(notice) => notifier.notify_client(&quote, &pdf_path, notice).await,
                    Delivery::Operator(notice) => notifier.notify_operator(&quote, &pdf_path, notice).await,
                };
                if let Err(e) = result {
                    log::error!("📧 Error de notificación para {}: {}", quote.reference, e);
                }
            }
        });
    }
}
