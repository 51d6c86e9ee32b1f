//! Conversión de moneda a CLP
//!
//! Las tasas diarias (UF, dólar) vienen de mindicador.cl. La conversión es
//! best-effort: si la tasa falla la cotización se guarda sin campos de
//! conversión. Cada operación usa su propio `RateMemo`; nada se cachea
//! entre operaciones.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use thiserror::Error;

use crate::models::quote::{Currency, Quote};

#[derive(Debug, Error)]
pub enum RateError {
    #[error("HTTP error fetching rate: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate source answered with status {0}")]
    Status(u16),

    #[error("no rate available for {0}")]
    MissingRate(&'static str),

    #[error("{0} has no conversion to CLP")]
    NotConvertible(&'static str),

    #[error("amount {amount} at rate {rate} overflows")]
    Overflow { amount: Decimal, rate: Decimal },
}

/// Resultado de convertir un monto a CLP
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub converted_amount: Decimal,
    pub rate: Decimal,
}

/// Fuente de tasas CLP por unidad de moneda
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rate(&self, currency: Currency) -> Result<Decimal, RateError>;
}

#[derive(Debug, Deserialize)]
struct IndicatorResponse {
    #[serde(default)]
    serie: Vec<IndicatorPoint>,
}

#[derive(Debug, Deserialize)]
struct IndicatorPoint {
    valor: Decimal,
}

/// Cliente HTTP de mindicador.cl (`/api/uf`, `/api/dolar`)
pub struct MindicadorClient {
    base_url: String,
    client: reqwest::Client,
}

impl MindicadorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Cotizador/1.0")
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl RateSource for MindicadorClient {
    async fn fetch_rate(&self, currency: Currency) -> Result<Decimal, RateError> {
        let indicator = currency
            .indicator()
            .ok_or(RateError::NotConvertible(currency.code()))?;
        let url = format!("{}/{}", self.base_url, indicator);

        log::info!("💱 Consultando tasa {} en {}", currency.code(), url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            log::error!("❌ Tasa {} respondió {}", currency.code(), status);
            return Err(RateError::Status(status.as_u16()));
        }

        let body: IndicatorResponse = response.json().await?;
        match body.serie.first() {
            Some(point) if point.valor > Decimal::ZERO => Ok(point.valor),
            _ => Err(RateError::MissingRate(currency.code())),
        }
    }
}

/// Pasarela de conversión sobre una `RateSource`
#[derive(Clone)]
pub struct CurrencyGateway {
    source: Arc<dyn RateSource>,
}

impl CurrencyGateway {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self { source }
    }

    /// Memo de tasas para una sola operación
    pub fn session(&self) -> RateMemo<'_> {
        RateMemo {
            gateway: self,
            rates: HashMap::new(),
        }
    }

    /// Estampar total (y anticipo) convertidos en la cotización.
    /// CLP limpia los campos; un error de tasa también, y solo se registra.
    pub async fn stamp_conversion(&self, quote: &mut Quote) {
        quote.clear_conversion();
        if quote.currency == Currency::Clp {
            return;
        }

        let mut memo = self.session();
        match memo.convert(quote.total, quote.currency).await {
            Ok(conversion) => {
                quote.total_in_converted_currency = Some(conversion.converted_amount);
                quote.conversion_rate = Some(conversion.rate);
            }
            Err(e) => {
                log::error!(
                    "❌ No se pudo convertir {} de {}: {}",
                    quote.currency.code(),
                    quote.reference,
                    e
                );
                return;
            }
        }

        if let (true, Some(prepayment)) = (quote.is_prepayment_required, quote.prepayment_amount) {
            if let Ok(conversion) = memo.convert(prepayment, quote.currency).await {
                quote.prepayment_in_converted_currency = Some(conversion.converted_amount);
            }
        }
    }
}

/// Tasas ya consultadas durante una operación
pub struct RateMemo<'a> {
    gateway: &'a CurrencyGateway,
    rates: HashMap<Currency, Decimal>,
}

impl RateMemo<'_> {
    pub async fn convert(&mut self, amount: Decimal, currency: Currency) -> Result<Conversion, RateError> {
        let rate = match self.rates.get(&currency) {
            Some(rate) => *rate,
            None => {
                let rate = self.gateway.source.fetch_rate(currency).await?;
                self.rates.insert(currency, rate);
                rate
            }
        };

        let converted = amount
            .checked_mul(rate)
            .ok_or(RateError::Overflow { amount, rate })?;

        Ok(Conversion {
            converted_amount: converted.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            rate,
        })
    }
}
