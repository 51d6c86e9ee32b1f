//! Modelo de Quote
//!
//! Documento persistido de una cotización. Los nombres en JSON son camelCase;
//! los alias aceptan documentos guardados por versiones anteriores
//! (`quoteNumber`, `token`, `items`, `totalInCLP`, ...).

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::utils::jwt::short_code;

/// Moneda de la cotización
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "CLP")]
    Clp,
    #[serde(rename = "UF")]
    Uf,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Clp => "CLP",
            Currency::Uf => "UF",
            Currency::Usd => "USD",
        }
    }

    /// Indicador diario usado para convertir a CLP
    pub fn indicator(&self) -> Option<&'static str> {
        match self {
            Currency::Clp => None,
            Currency::Uf => Some("uf"),
            Currency::Usd => Some("dolar"),
        }
    }
}

/// Estado visible de la cotización
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuoteState {
    Pending,
    Approved,
    Rejected,
    NeedsReview,
}

impl QuoteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteState::Pending => "pending",
            QuoteState::Approved => "approved",
            QuoteState::Rejected => "rejected",
            QuoteState::NeedsReview => "needsReview",
        }
    }
}

/// Línea de detalle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "desc", default)]
    pub description: String,
    #[serde(alias = "qty", default)]
    pub quantity: Decimal,
    #[serde(alias = "price", default)]
    pub unit_price: Decimal,
    #[serde(alias = "discount", default)]
    pub discount_percent: Decimal,
}

impl LineItem {
    /// `quantity * unitPrice * (1 - discountPercent/100)` redondeado a 2 decimales.
    /// `None` si el producto desborda `Decimal`.
    pub fn subtotal(&self) -> Option<Decimal> {
        let factor = Decimal::ONE.checked_sub(self.discount_percent.checked_div(Decimal::ONE_HUNDRED)?)?;
        let amount = self.quantity.checked_mul(self.unit_price)?.checked_mul(factor)?;
        Some(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}

/// Cotización persistida - un documento JSON por referencia
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(alias = "quoteNumber")]
    pub reference: String,
    #[serde(alias = "token", default)]
    pub capability_token: String,

    #[serde(default)]
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_tax_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,

    #[serde(alias = "items", default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub net: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub total: Decimal,
    #[serde(alias = "totalInCLP", default, skip_serializing_if = "Option::is_none")]
    pub total_in_converted_currency: Option<Decimal>,
    #[serde(alias = "currencyRate", default, skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepayment_in_converted_currency: Option<Decimal>,

    #[serde(alias = "isRequiredPrepayment", default)]
    pub is_prepayment_required: bool,
    #[serde(alias = "prepaymentValue", default, skip_serializing_if = "Option::is_none")]
    pub prepayment_amount: Option<Decimal>,

    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected: bool,
    #[serde(default)]
    pub rejected_reason: Option<String>,
    #[serde(default)]
    pub rejected_by: Option<String>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub needs_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_requested_by: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(alias = "saved_at", default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Nombre del documento en el store
    pub fn file_name(&self) -> String {
        format!("{}.json", self.reference)
    }

    /// Código de 6 caracteres que autoriza acciones del cliente
    pub fn short_code(&self) -> String {
        short_code(&self.capability_token)
    }

    /// Precedencia: rechazada > aceptada > revisión > pendiente
    pub fn state(&self) -> QuoteState {
        if self.rejected {
            QuoteState::Rejected
        } else if self.approved_at.is_some() {
            QuoteState::Approved
        } else if self.needs_review {
            QuoteState::NeedsReview
        } else {
            QuoteState::Pending
        }
    }

    /// Toda edición descarta aprobación y rechazo previos
    pub fn reset_lifecycle(&mut self) {
        self.approved_by = None;
        self.approved_at = None;
        self.rejected = false;
        self.rejected_reason = None;
        self.rejected_by = None;
        self.rejected_at = None;
        self.needs_review = false;
        self.review_requested_by = None;
    }

    pub fn mark_rejected(&mut self, by: String, reason: String, at: DateTime<Utc>) {
        self.rejected = true;
        self.rejected_by = Some(by);
        self.rejected_reason = Some(reason);
        self.rejected_at = Some(at);
        self.needs_review = false;
        self.approved_by = None;
        self.approved_at = None;
        self.saved_at = Some(at);
    }

    /// Una cotización rechazada pasa a revisión en vez de aprobarse.
    /// Se conserva el historial del rechazo.
    pub fn mark_needs_review(&mut self, by: String, at: DateTime<Utc>) {
        self.rejected = false;
        self.needs_review = true;
        self.review_requested_by = Some(by);
        self.saved_at = Some(at);
    }

    pub fn mark_approved(&mut self, by: String, at: DateTime<Utc>) {
        self.approved_by = Some(by);
        self.approved_at = Some(at);
        self.needs_review = false;
        self.saved_at = Some(at);
    }

    pub fn clear_conversion(&mut self) {
        self.total_in_converted_currency = None;
        self.conversion_rate = None;
        self.prepayment_in_converted_currency = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn sample_quote() -> Quote {
        serde_json::from_value(json!({
            "reference": "COT-2025-123456",
            "capabilityToken": "header.payload.signatureABC123",
            "client": "ACME",
            "lineItems": [{ "id": "1", "description": "Item", "quantity": 2, "unitPrice": 500, "discountPercent": 0 }],
            "currency": "CLP",
            "net": 1000,
            "tax": 190,
            "total": 1190
        }))
        .unwrap()
    }

    #[test]
    fn test_state_precedence() {
        let mut quote = sample_quote();
        assert_eq!(quote.state(), QuoteState::Pending);

        quote.needs_review = true;
        assert_eq!(quote.state(), QuoteState::NeedsReview);

        quote.approved_at = Some(Utc::now());
        assert_eq!(quote.state(), QuoteState::Approved);

        quote.rejected = true;
        assert_eq!(quote.state(), QuoteState::Rejected);
    }

    #[test]
    fn test_transitions_keep_single_state() {
        let mut quote = sample_quote();
        let now = Utc::now();

        quote.mark_approved("Cliente".to_string(), now);
        quote.mark_rejected("Cliente".to_string(), "Muy caro".to_string(), now);
        assert_eq!(quote.state(), QuoteState::Rejected);
        assert!(quote.approved_at.is_none());

        quote.mark_needs_review("Ana".to_string(), now);
        assert_eq!(quote.state(), QuoteState::NeedsReview);
        assert_eq!(quote.rejected_reason.as_deref(), Some("Muy caro"));
        assert_eq!(quote.review_requested_by.as_deref(), Some("Ana"));

        quote.mark_approved("Cliente".to_string(), now);
        assert_eq!(quote.state(), QuoteState::Approved);
        assert!(!quote.needs_review);

        quote.reset_lifecycle();
        assert_eq!(quote.state(), QuoteState::Pending);
        assert!(quote.rejected_reason.is_none());
        assert!(quote.review_requested_by.is_none());
    }

    #[test]
    fn test_short_code_matches_token_suffix() {
        let quote = sample_quote();
        assert_eq!(quote.short_code(), "ABC123");
        assert_eq!(quote.file_name(), "COT-2025-123456.json");
    }

    #[test]
    fn test_line_item_subtotal() {
        let item = LineItem {
            id: "1".to_string(),
            description: "Servicio".to_string(),
            quantity: dec!(3),
            unit_price: dec!(333.33),
            discount_percent: dec!(10),
        };
        assert_eq!(item.subtotal(), Some(dec!(899.99)));

        let huge = LineItem {
            quantity: dec!(100000000000000000000),
            unit_price: dec!(100000000000000000000),
            ..item
        };
        assert_eq!(huge.subtotal(), None);
    }

    #[test]
    fn test_legacy_document_is_accepted() {
        let quote: Quote = serde_json::from_value(json!({
            "quoteNumber": "COT-2024-000001",
            "token": "aaa.bbb.cccXYZ789",
            "client": "Legacy SpA",
            "items": [{ "id": "1", "desc": "Asesoría", "qty": 1, "price": 100, "discount": 5 }],
            "currency": "UF",
            "net": 95, "tax": 18.05, "total": 113.05,
            "totalInCLP": 4200000.5,
            "currencyRate": 37152.1,
            "isRequiredPrepayment": true,
            "prepaymentValue": 50,
            "approvedAt": null,
            "rejected": false,
            "rejectedReason": "",
            "saved_at": "2024-09-20T12:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(quote.reference, "COT-2024-000001");
        assert_eq!(quote.short_code(), "XYZ789");
        assert_eq!(quote.line_items[0].description, "Asesoría");
        assert_eq!(quote.line_items[0].discount_percent, dec!(5));
        assert_eq!(quote.currency, Currency::Uf);
        assert_eq!(quote.total_in_converted_currency, Some(dec!(4200000.5)));
        assert_eq!(quote.prepayment_amount, Some(dec!(50)));
        assert!(quote.is_prepayment_required);
        assert!(quote.saved_at.is_some());
        assert_eq!(quote.state(), QuoteState::Pending);
    }

    #[test]
    fn test_serializes_camel_case_numbers() {
        let value = serde_json::to_value(sample_quote()).unwrap();
        assert_eq!(value["reference"], "COT-2025-123456");
        assert_eq!(value["capabilityToken"], "header.payload.signatureABC123");
        assert!(value["total"].is_number());
        assert_eq!(value["lineItems"][0]["unitPrice"].as_f64(), Some(500.0));
        assert!(value.get("totalInConvertedCurrency").is_none());
        assert_eq!(value["rejected"], false);
    }
}
