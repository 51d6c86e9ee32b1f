#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;

use cotizador::build_app;
use cotizador::config::environment::EnvironmentConfig;
use cotizador::models::company::CompanyProfile;
use cotizador::models::quote::{Currency, Quote};
use cotizador::repositories::company_repository::JsonCompanyDirectory;
use cotizador::repositories::quote_repository::QuoteRepository;
use cotizador::services::currency_service::{CurrencyGateway, RateError, RateSource};
use cotizador::services::email_service::{Notifier, NotifyError, QuoteNotice};
use cotizador::services::event_hub::EventHub;
use cotizador::services::pdf_service::{ArtifactRenderer, RenderError, RenderedArtifacts, Watermark};
use cotizador::services::quote_service::QuoteEngine;
use cotizador::state::AppState;
use cotizador::utils::jwt::CapabilityTokenService;

pub struct FixedRates;

#[async_trait]
impl RateSource for FixedRates {
    async fn fetch_rate(&self, currency: Currency) -> Result<Decimal, RateError> {
        match currency {
            Currency::Usd => Ok(dec!(950)),
            _ => Ok(dec!(39000)),
        }
    }
}

/// Escribe un PDF falso en la ruta real y recuerda la marca de agua
pub struct FakeRenderer {
    repo: QuoteRepository,
    pub watermarks: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactRenderer for FakeRenderer {
    async fn render(
        &self,
        quote: &Quote,
        _company: Option<&CompanyProfile>,
    ) -> Result<RenderedArtifacts, RenderError> {
        let artifacts = RenderedArtifacts {
            pdf_path: self.repo.pdf_path(&quote.reference),
            qr_path: self.repo.qr_path(&quote.reference),
        };
        let mark = Watermark::for_quote(quote).text;
        tokio::fs::write(&artifacts.pdf_path, format!("%PDF-fake {}", mark)).await?;
        tokio::fs::write(&artifacts.qr_path, b"png").await?;
        self.watermarks.lock().await.push(mark.to_string());
        Ok(artifacts)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, QuoteNotice)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_client(&self, quote: &Quote, _pdf: &Path, notice: QuoteNotice) -> Result<(), NotifyError> {
        self.sent.lock().await.push((quote.reference.clone(), notice));
        Ok(())
    }

    async fn notify_operator(&self, quote: &Quote, _pdf: &Path, notice: QuoteNotice) -> Result<(), NotifyError> {
        self.sent.lock().await.push((quote.reference.clone(), notice));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub renderer: Arc<FakeRenderer>,
    pub notifier: Arc<RecordingNotifier>,
    pub dir: tempfile::TempDir,
}

pub struct TestResponse {
    status: StatusCode,
    body: Value,
}

impl TestResponse {
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn json(&self) -> Value {
        self.body.clone()
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_admin(None).await
}

pub async fn create_test_app_with_admin(admin_password: Option<&str>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EnvironmentConfig::from_env().with_output_dir(dir.path());
    config.admin_password = admin_password.map(str::to_string);
    config.admin_jwt_secret = "test-admin-secret".to_string();
    config.reference_prefix = "COT".to_string();
    config.cors_origins = Vec::new();

    let repo = QuoteRepository::new(dir.path(), "COT").unwrap();
    let renderer = Arc::new(FakeRenderer {
        repo: repo.clone(),
        watermarks: Mutex::new(Vec::new()),
    });
    let notifier = Arc::new(RecordingNotifier::default());

    let engine = QuoteEngine::new(
        repo,
        Arc::new(JsonCompanyDirectory::new(dir.path().join("empresas.json"))),
        CurrencyGateway::new(Arc::new(FixedRates)),
        renderer.clone(),
        notifier.clone(),
        EventHub::default(),
        CapabilityTokenService::new("test-quote-secret"),
    );

    let state = AppState::new(config, engine);
    TestApp {
        router: build_app(state.clone()),
        state,
        renderer,
        notifier,
        dir,
    }
}

impl TestApp {
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>, bearer: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(body), None).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None, None).await
    }

    /// Estado HTTP de un archivo servido en /outputs
    pub async fn artifact_status(&self, uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap().status()
    }
}

pub fn quote_body(total: i64) -> Value {
    serde_json::json!({
        "client": "Constructora Los Andes",
        "clientEmail": "compras@losandes.cl",
        "companyId": "1",
        "lineItems": [
            { "id": "1", "description": "Arriendo de andamios", "quantity": 1, "unitPrice": total, "discountPercent": 0 }
        ],
        "currency": "CLP",
        "net": total,
        "tax": 0,
        "total": total
    })
}

pub fn short_code(token: &str) -> String {
    token[token.len() - 6..].to_string()
}
