use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::quote::{Currency, LineItem, Quote};
use crate::utils::validation::{validate_non_negative, validate_not_empty, validate_percent};

// Línea de detalle tal como llega del formulario
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "desc", default)]
    pub description: String,
    #[serde(alias = "qty", default)]
    #[validate(custom = "validate_non_negative")]
    pub quantity: Decimal,
    #[serde(alias = "price", default)]
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Decimal,
    #[serde(alias = "discount", default)]
    #[validate(custom = "validate_percent")]
    pub discount_percent: Decimal,
}

impl LineItemInput {
    /// Las líneas sin id reciben uno nuevo
    pub fn into_line_item(self) -> LineItem {
        LineItem {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount_percent: self.discount_percent,
        }
    }
}

// Cuerpo de creación y de actualización completa
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_prepayment", skip_on_field_errors = false))]
pub struct QuoteInput {
    #[validate(custom = "validate_not_empty")]
    pub client: String,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub client_address: Option<String>,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default)]
    pub client_tax_id: Option<String>,
    #[serde(default)]
    pub client_contact: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(alias = "items", default)]
    #[validate]
    pub line_items: Vec<LineItemInput>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub net: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub tax: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub total: Decimal,
    #[serde(alias = "isRequiredPrepayment", default)]
    pub is_prepayment_required: bool,
    #[serde(alias = "prepaymentValue", default)]
    #[validate(custom = "validate_non_negative")]
    pub prepayment_amount: Option<Decimal>,
}

/// Con anticipo requerido el monto es obligatorio
fn validate_prepayment(input: &QuoteInput) -> Result<(), ValidationError> {
    if input.is_prepayment_required && input.prepayment_amount.is_none() {
        return Err(ValidationError::new("prepayment_amount_required"));
    }
    Ok(())
}

impl QuoteInput {
    /// Documento nuevo en estado pendiente; la conversión se estampa después
    pub fn into_quote(self, reference: String, capability_token: String, now: DateTime<Utc>) -> Quote {
        Quote {
            reference,
            capability_token,
            client: self.client.trim().to_string(),
            client_email: self.client_email,
            client_address: self.client_address,
            client_phone: self.client_phone,
            client_tax_id: self.client_tax_id,
            client_contact: self.client_contact,
            company_id: self.company_id,
            line_items: self
                .line_items
                .into_iter()
                .map(LineItemInput::into_line_item)
                .collect(),
            currency: self.currency,
            net: self.net,
            tax: self.tax,
            total: self.total,
            total_in_converted_currency: None,
            conversion_rate: None,
            prepayment_in_converted_currency: None,
            prepayment_amount: if self.is_prepayment_required {
                self.prepayment_amount
            } else {
                None
            },
            is_prepayment_required: self.is_prepayment_required,
            approved_by: None,
            approved_at: None,
            rejected: false,
            rejected_reason: None,
            rejected_by: None,
            rejected_at: None,
            needs_review: false,
            review_requested_by: None,
            created_at: Some(now),
            saved_at: Some(now),
        }
    }
}

// Request de aprobación / rechazo del cliente
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    #[serde(alias = "code6", default)]
    pub short_code: String,
    #[serde(default)]
    pub approver_name: Option<String>,
    // Número o string: se compara numéricamente
    #[serde(alias = "prepayment", default)]
    pub prepayment_amount: Option<serde_json::Value>,
    #[serde(default)]
    pub reject: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApproveResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_review: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regenerated: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveQuoteResponse {
    pub ok: bool,
    pub file: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub ok: bool,
    pub regenerated: bool,
}

#[derive(Debug, Serialize)]
pub struct NextReferenceResponse {
    pub next: String,
}

// Resultado de regenerar todos los PDFs
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct RegenerateSummary {
    pub total: usize,
    pub regenerated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

// Fila del listado de cotizaciones
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummary {
    pub file: String,
    pub reference: String,
    pub client: String,
    pub total: Decimal,
    pub currency: Currency,
    pub client_email: Option<String>,
    pub company_id: Option<String>,
    pub is_prepayment_required: bool,
    pub prepayment_amount: Option<Decimal>,
    pub state: &'static str,
    pub is_approved: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected: bool,
    pub rejected_reason: Option<String>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub needs_review: bool,
    pub saved_at: Option<DateTime<Utc>>,
    pub line_items: Vec<LineItem>,
}

impl QuoteSummary {
    pub fn from_quote(file: &str, quote: &Quote) -> Self {
        Self {
            file: file.to_string(),
            reference: quote.reference.clone(),
            client: quote.client.clone(),
            total: quote.total,
            currency: quote.currency,
            client_email: quote.client_email.clone(),
            company_id: quote.company_id.clone(),
            is_prepayment_required: quote.is_prepayment_required,
            prepayment_amount: quote.prepayment_amount,
            state: quote.state().as_str(),
            is_approved: quote.approved_at.is_some(),
            approved_by: quote.approved_by.clone(),
            approved_at: quote.approved_at,
            rejected: quote.rejected,
            rejected_reason: quote.rejected_reason.clone(),
            rejected_by: quote.rejected_by.clone(),
            rejected_at: quote.rejected_at,
            needs_review: quote.needs_review,
            saved_at: quote.saved_at,
            line_items: quote.line_items.clone(),
        }
    }
}
