use std::sync::Arc;

use serde_json::Value;

use crate::dto::quote_dto::{
    ApproveRequest, ApproveResponse, NextReferenceResponse, OkResponse, QuoteInput, QuoteSummary,
    RegenerateResponse, RegenerateSummary, SaveQuoteResponse,
};
use crate::services::quote_service::{ApproveOutcome, QuoteEngine};
use crate::utils::errors::AppError;

pub struct QuoteController {
    engine: Arc<QuoteEngine>,
}

impl QuoteController {
    pub fn new(engine: Arc<QuoteEngine>) -> Self {
        Self { engine }
    }

    pub async fn list(&self) -> Result<Vec<QuoteSummary>, AppError> {
        self.engine.list().await
    }

    pub async fn next_reference(&self) -> NextReferenceResponse {
        NextReferenceResponse {
            next: self.engine.next_reference().await,
        }
    }

    /// Documento completo. El token de capacidad solo se devuelve a un
    /// administrador o a quien ya lo presenta en `?token=`.
    pub async fn get(
        &self,
        file: &str,
        is_admin: bool,
        presented_token: Option<&str>,
    ) -> Result<Value, AppError> {
        let quote = self.engine.get(file).await?;

        let may_see_token = is_admin
            || presented_token
                .map(|token| self.engine.verify_capability(&quote, token))
                .unwrap_or(false);

        let mut body = serde_json::to_value(&quote)
            .map_err(|e| AppError::Internal(format!("Error serializando cotización: {}", e)))?;
        if !may_see_token {
            if let Some(object) = body.as_object_mut() {
                object.remove("capabilityToken");
            }
        }
        Ok(body)
    }

    pub async fn create(&self, input: QuoteInput) -> Result<SaveQuoteResponse, AppError> {
        self.engine.create(input).await
    }

    pub async fn update(&self, file: &str, input: QuoteInput) -> Result<SaveQuoteResponse, AppError> {
        self.engine.update(file, input).await
    }

    pub async fn delete(&self, file: &str) -> Result<OkResponse, AppError> {
        self.engine.delete(file).await?;
        Ok(OkResponse { ok: true })
    }

    pub async fn approve(&self, file: &str, request: ApproveRequest) -> Result<ApproveResponse, AppError> {
        let outcome = self.engine.approve(file, request).await?;

        let mut response = ApproveResponse {
            ok: true,
            rejected: None,
            needs_review: None,
            regenerated: None,
        };
        match outcome {
            ApproveOutcome::Rejected => response.rejected = Some(true),
            ApproveOutcome::NeedsReview => response.needs_review = Some(true),
            ApproveOutcome::Approved => response.regenerated = Some(true),
        }
        Ok(response)
    }

    pub async fn regenerate(&self, file: &str) -> Result<RegenerateResponse, AppError> {
        self.engine.regenerate(file).await?;
        Ok(RegenerateResponse {
            ok: true,
            regenerated: true,
        })
    }

    pub async fn regenerate_all(&self) -> Result<RegenerateSummary, AppError> {
        self.engine.regenerate_all().await
    }
}
