//! Renderizado de artefactos
//!
//! Genera el PDF de la cotización (cabecera de empresa, cliente, detalle,
//! totales, términos, marca de agua de estado y código QR) y la imagen PNG
//! del QR con la URL de aceptación. El trabajo pesado corre en el pool
//! bloqueante de tokio.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Pt, Rect, Rgb, TextMatrix,
};
use qrcode::QrCode;
use serde_json::json;
use thiserror::Error;

use crate::models::company::CompanyProfile;
use crate::models::quote::{Currency, Quote, QuoteState};
use crate::repositories::quote_repository::QuoteRepository;
use crate::utils::number::format_amount;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const QR_SIZE: f32 = 30.0;
const CONTENT_TOP: f32 = PAGE_HEIGHT - MARGIN - 5.0;
// Bajo esta línea solo va el QR
const CONTENT_BOTTOM: f32 = MARGIN + QR_SIZE + 5.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("QR error: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render task failed: {0}")]
    Join(String),
}

/// Rutas de los artefactos generados
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedArtifacts {
    pub pdf_path: PathBuf,
    pub qr_path: PathBuf,
}

#[async_trait]
pub trait ArtifactRenderer: Send + Sync {
    async fn render(
        &self,
        quote: &Quote,
        company: Option<&CompanyProfile>,
    ) -> Result<RenderedArtifacts, RenderError>;
}

/// Marca de agua según el estado visible
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Watermark {
    pub text: &'static str,
    pub color: (f32, f32, f32),
}

impl Watermark {
    pub fn for_quote(quote: &Quote) -> Self {
        match quote.state() {
            QuoteState::Rejected => Self { text: "REJECTED", color: (0.85, 0.1, 0.1) },
            QuoteState::Approved => Self { text: "ACCEPTED", color: (0.1, 0.6, 0.2) },
            QuoteState::NeedsReview => Self { text: "REVIEW", color: (0.1, 0.3, 0.85) },
            QuoteState::Pending => Self { text: "APPROVE", color: (0.95, 0.55, 0.0) },
        }
    }
}

/// URL del frontend donde el cliente acepta o rechaza
pub fn accept_url(frontend_url: &str, quote: &Quote) -> String {
    format!(
        "{}/accept?file={}&token={}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(&quote.file_name()),
        urlencoding::encode(&quote.capability_token)
    )
}

/// Contenido del QR: JSON con cliente, total, referencia, moneda y URL
pub fn qr_payload(quote: &Quote, frontend_url: &str) -> String {
    json!({
        "client": quote.client,
        "total": quote.total,
        "reference": quote.reference,
        "currency": quote.currency.code(),
        "acceptUrl": accept_url(frontend_url, quote),
    })
    .to_string()
}

/// Texto de términos, con el anticipo requerido al final
pub fn terms_text(quote: &Quote, company: Option<&CompanyProfile>) -> String {
    let mut text = company
        .and_then(|c| c.terms.clone())
        .unwrap_or_default();

    if let (true, Some(prepayment)) = (quote.is_prepayment_required, quote.prepayment_amount) {
        let mut line = format!(
            "Se requiere pagar un anticipo de: {}",
            format_amount(prepayment, quote.currency)
        );
        if quote.currency != Currency::Clp {
            if let Some(clp) = quote.prepayment_in_converted_currency {
                line.push_str(&format!(" ({})", format_amount(clp, Currency::Clp)));
            }
        }
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&line);
    }
    text
}

/// Corte de líneas por palabras para la fuente Helvetica
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

/// Renderer de producción: printpdf + qrcode
#[derive(Clone)]
pub struct PdfArtifactRenderer {
    repo: QuoteRepository,
    frontend_url: String,
}

impl PdfArtifactRenderer {
    pub fn new(repo: QuoteRepository, frontend_url: impl Into<String>) -> Self {
        Self {
            repo,
            frontend_url: frontend_url.into(),
        }
    }
}

#[async_trait]
impl ArtifactRenderer for PdfArtifactRenderer {
    async fn render(
        &self,
        quote: &Quote,
        company: Option<&CompanyProfile>,
    ) -> Result<RenderedArtifacts, RenderError> {
        let artifacts = RenderedArtifacts {
            pdf_path: self.repo.pdf_path(&quote.reference),
            qr_path: self.repo.qr_path(&quote.reference),
        };

        let quote = quote.clone();
        let company = company.cloned();
        let frontend_url = self.frontend_url.clone();
        let target = artifacts.clone();

        tokio::task::spawn_blocking(move || {
            render_blocking(&quote, company.as_ref(), &frontend_url, &target)
        })
        .await
        .map_err(|e| RenderError::Join(e.to_string()))??;

        log::info!("📄 PDF generado: {}", artifacts.pdf_path.display());
        Ok(artifacts)
    }
}

fn render_blocking(
    quote: &Quote,
    company: Option<&CompanyProfile>,
    frontend_url: &str,
    target: &RenderedArtifacts,
) -> Result<(), RenderError> {
    let payload = qr_payload(quote, frontend_url);
    let code = QrCode::new(payload.as_bytes())?;

    code.render::<image::Luma<u8>>()
        .min_dimensions(200, 200)
        .build()
        .save(&target.qr_path)?;

    let bytes = build_pdf(quote, company, &code)?;
    if let Some(parent) = target.pdf_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target.pdf_path, bytes)?;
    Ok(())
}

/// Escritor con cursor vertical; abre páginas nuevas al llegar al pie
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    regular: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
    mark: Watermark,
    pages: usize,
    y: f32,
}

impl PageWriter<'_> {
    fn text(&self, text: &str, size: f32, x: f32, y: f32, bold: bool) {
        let font = if bold { self.bold } else { self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    fn line(&mut self, text: &str, size: f32, bold: bool) {
        let step = size * 0.45 + 1.5;
        self.ensure(step);
        self.text(text, size, MARGIN, self.y, bold);
        self.y -= step;
    }

    fn paragraph(&mut self, text: &str, size: f32, max_chars: usize) {
        for line in wrap_text(text, max_chars) {
            self.line(&line, size, false);
        }
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn fill(&self, (r, g, b): (f32, f32, f32)) {
        self.layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }

    /// Abre otra página si no caben `height` mm sobre la zona del QR.
    /// Devuelve `true` cuando hubo salto.
    fn ensure(&mut self, height: f32) -> bool {
        if self.y - height >= CONTENT_BOTTOM {
            return false;
        }
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Capa {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = CONTENT_TOP;
        self.draw_watermark();
        true
    }

    /// Marca de agua primero, queda bajo el contenido
    fn draw_watermark(&self) {
        // Tono claro en lugar de opacidad
        let (r, g, b) = self.mark.color;
        self.fill((r + (1.0 - r) * 0.7, g + (1.0 - g) * 0.7, b + (1.0 - b) * 0.7));

        self.layer.begin_text_section();
        self.layer.set_font(self.bold, 60.0);
        self.layer
            .set_text_matrix(TextMatrix::TranslateRotate(Pt(110.0), Pt(300.0), 25.0));
        self.layer.write_text(self.mark.text, self.bold);
        self.layer.end_text_section();

        self.fill((0.0, 0.0, 0.0));
    }
}

const TABLE_COLUMNS: [f32; 5] = [MARGIN, 110.0, 128.0, 146.0, 172.0];

fn table_header(w: &mut PageWriter<'_>) {
    let labels = ["Descripción", "Cant.", "Desc.%", "V.Unit.", "Subtotal"];
    for (label, x) in labels.iter().zip(TABLE_COLUMNS) {
        w.text(label, 9.0, x, w.y, true);
    }
    w.gap(6.0);
}

fn build_pdf(quote: &Quote, company: Option<&CompanyProfile>, code: &QrCode) -> Result<Vec<u8>, RenderError> {
    let title = format!("Cotización {}", quote.reference);
    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Capa 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    let mut w = PageWriter {
        doc: &doc,
        layer: doc.get_page(page).get_layer(layer),
        regular: &regular,
        bold: &bold,
        mark: Watermark::for_quote(quote),
        pages: 1,
        y: CONTENT_TOP,
    };
    w.draw_watermark();

    // Cabecera de empresa a la izquierda, cliente a la derecha
    let top = w.y;
    let name = company.map(|c| c.display_name()).unwrap_or("Empresa");
    w.line(name, 16.0, true);
    if let Some(company) = company {
        for line in company.contact_lines() {
            w.line(line, 9.0, false);
        }
    }
    let company_bottom = w.y;

    let client_x = 120.0;
    let mut client_y = top;
    w.text("Datos del Cliente", 11.0, client_x, client_y, true);
    client_y -= 6.5;
    let client_lines = [
        Some(quote.client.as_str()),
        quote.client_email.as_deref(),
        quote.client_address.as_deref(),
        quote.client_phone.as_deref(),
        quote.client_tax_id.as_deref(),
    ];
    for line in client_lines.into_iter().flatten().filter(|l| !l.trim().is_empty()) {
        w.text(line, 9.0, client_x, client_y, false);
        client_y -= 5.0;
    }

    w.y = company_bottom.min(client_y) - 6.0;
    w.line(&format!("COTIZACIÓN {}", quote.reference), 14.0, true);
    let date = quote.saved_at.unwrap_or_else(Utc::now).format("%d-%m-%Y");
    w.line(&format!("Fecha: {}", date), 9.0, false);
    w.gap(6.0);

    // Detalle
    w.ensure(20.0);
    w.line("DETALLE", 11.0, true);
    table_header(&mut w);

    for item in &quote.line_items {
        let subtotal = item.subtotal().ok_or_else(|| {
            RenderError::Pdf(format!("subtotal overflow in line item '{}'", item.id))
        })?;
        let description = wrap_text(&item.description, 55);
        if w.ensure(description.len() as f32 * 5.55 + 1.5) {
            table_header(&mut w);
        }

        let row_y = w.y;
        w.text(&item.quantity.normalize().to_string(), 9.0, TABLE_COLUMNS[1], row_y, false);
        w.text(&format!("{}%", item.discount_percent.normalize()), 9.0, TABLE_COLUMNS[2], row_y, false);
        w.text(&format_amount(item.unit_price, quote.currency), 9.0, TABLE_COLUMNS[3], row_y, false);
        w.text(&format_amount(subtotal, quote.currency), 9.0, TABLE_COLUMNS[4], row_y, false);
        for line in description {
            w.line(&line, 9.0, false);
        }
        w.gap(1.5);
    }
    w.gap(4.0);

    // Totales
    w.ensure(30.0);
    let label_x = 130.0;
    let value_x = 160.0;
    let totals = [
        ("Neto:", format_amount(quote.net, quote.currency)),
        ("IVA (19%):", format_amount(quote.tax, quote.currency)),
    ];
    for (label, value) in totals {
        w.text(label, 10.0, label_x, w.y, false);
        w.text(&value, 10.0, value_x, w.y, false);
        w.gap(5.5);
    }
    w.text("TOTAL:", 12.0, label_x, w.y, true);
    w.text(&format_amount(quote.total, quote.currency), 12.0, value_x, w.y, true);
    w.gap(6.0);

    if let (true, Some(converted)) = (
        quote.currency != Currency::Clp,
        quote.total_in_converted_currency,
    ) {
        w.text(
            &format!("(Conversión a CLP: {})", format_amount(converted, Currency::Clp)),
            8.0,
            label_x,
            w.y,
            false,
        );
        w.gap(5.0);
    }
    w.gap(6.0);

    // Pago y términos
    if let Some(details) = company.and_then(|c| c.payment_details.as_deref()) {
        w.ensure(12.0);
        w.line("DETALLES DE PAGO:", 10.0, true);
        w.paragraph(details, 9.0, 90);
        w.gap(4.0);
    }
    let terms = terms_text(quote, company);
    if !terms.is_empty() {
        w.ensure(12.0);
        w.line("TÉRMINOS Y CONDICIONES:", 10.0, true);
        w.paragraph(&terms, 9.0, 90);
    }

    draw_qr(&w, code);
    drop(w);

    doc.save_to_bytes().map_err(|e| RenderError::Pdf(e.to_string()))
}

fn draw_qr(w: &PageWriter<'_>, code: &QrCode) {
    let width = code.width();
    if width == 0 {
        return;
    }
    let module = QR_SIZE / width as f32;
    let left = (PAGE_WIDTH - QR_SIZE) / 2.0;
    let bottom = MARGIN;

    w.fill((0.0, 0.0, 0.0));
    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != qrcode::Color::Dark {
            continue;
        }
        let (col, row) = ((i % width) as f32, (i / width) as f32);
        let x = left + col * module;
        let y = bottom + QR_SIZE - (row + 1.0) * module;
        w.layer
            .add_rect(Rect::new(Mm(x), Mm(y), Mm(x + module), Mm(y + module)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quote::LineItem;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::Value;

    fn quote() -> Quote {
        serde_json::from_value(json!({
            "reference": "COT-2025-000123",
            "capabilityToken": "aaa.bbb.ccc-XY_12",
            "client": "Comercial Andes",
            "clientEmail": "compras@andes.cl",
            "lineItems": [
                { "id": "1", "description": "Instalación de equipos en faena minera", "quantity": 2, "unitPrice": 150000, "discountPercent": 10 }
            ],
            "currency": "CLP",
            "net": 270000, "tax": 51300, "total": 321300
        }))
        .unwrap()
    }

    #[test]
    fn test_watermark_precedence() {
        let mut q = quote();
        assert_eq!(Watermark::for_quote(&q).text, "APPROVE");

        q.needs_review = true;
        assert_eq!(Watermark::for_quote(&q).text, "REVIEW");

        q.approved_at = Some(Utc::now());
        assert_eq!(Watermark::for_quote(&q).text, "ACCEPTED");

        q.rejected = true;
        assert_eq!(Watermark::for_quote(&q).text, "REJECTED");
    }

    #[test]
    fn test_accept_url_and_qr_payload() {
        let q = quote();
        assert_eq!(
            accept_url("http://localhost:5173/", &q),
            "http://localhost:5173/accept?file=COT-2025-000123.json&token=aaa.bbb.ccc-XY_12"
        );

        let payload: Value = serde_json::from_str(&qr_payload(&q, "https://app.example.cl")).unwrap();
        assert_eq!(payload["client"], "Comercial Andes");
        assert_eq!(payload["reference"], "COT-2025-000123");
        assert_eq!(payload["currency"], "CLP");
        assert_eq!(payload["total"].as_f64(), Some(321300.0));
        assert!(payload["acceptUrl"]
            .as_str()
            .unwrap()
            .ends_with("token=aaa.bbb.ccc-XY_12"));
    }

    #[test]
    fn test_terms_include_prepayment() {
        let mut q = quote();
        let company = CompanyProfile {
            id: "1".to_string(),
            terms: Some("Validez 15 días".to_string()),
            ..Default::default()
        };
        assert_eq!(terms_text(&q, Some(&company)), "Validez 15 días");

        q.is_prepayment_required = true;
        q.prepayment_amount = Some(dec!(100000));
        assert_eq!(
            terms_text(&q, Some(&company)),
            "Validez 15 días\n\nSe requiere pagar un anticipo de: 100.000 CLP"
        );
        assert_eq!(terms_text(&q, None), "Se requiere pagar un anticipo de: 100.000 CLP");
    }

    #[test]
    fn test_wrap_text() {
        let lines = wrap_text("uno dos tres cuatro", 8);
        assert_eq!(lines, vec!["uno dos", "tres", "cuatro"]);
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_render_writes_pdf_and_qr() {
        let dir = tempfile::tempdir().unwrap();
        let repo = QuoteRepository::new(dir.path(), "COT").unwrap();
        let renderer = PdfArtifactRenderer::new(repo, "http://localhost:5173");

        let company = CompanyProfile {
            id: "1".to_string(),
            name: "Servicios Aysafi".to_string(),
            payment_details: Some("Cuenta corriente 123".to_string()),
            ..Default::default()
        };
        let artifacts = renderer.render(&quote(), Some(&company)).await.unwrap();

        let pdf = std::fs::read(&artifacts.pdf_path).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(artifacts.qr_path.ends_with("COT-2025-000123_qr.png"));
        assert!(artifacts.qr_path.exists());
    }

    fn page_count(pdf: &[u8]) -> usize {
        let raw = String::from_utf8_lossy(pdf);
        let pattern = regex::Regex::new(r"/Type\s*/Pages\s*/Count\s+(\d+)").unwrap();
        pattern.captures(&raw).unwrap()[1].parse().unwrap()
    }

    #[tokio::test]
    async fn test_long_item_list_continues_on_new_pages() {
        let dir = tempfile::tempdir().unwrap();
        let repo = QuoteRepository::new(dir.path(), "COT").unwrap();
        let renderer = PdfArtifactRenderer::new(repo, "http://localhost:5173");

        let short = renderer.render(&quote(), None).await.unwrap();
        assert_eq!(page_count(&std::fs::read(&short.pdf_path).unwrap()), 1);

        let mut long = quote();
        long.reference = "COT-2025-000124".to_string();
        let item = long.line_items[0].clone();
        long.line_items = (0..80)
            .map(|i| LineItem {
                id: i.to_string(),
                ..item.clone()
            })
            .collect();

        let artifacts = renderer.render(&long, None).await.unwrap();
        let pdf = std::fs::read(&artifacts.pdf_path).unwrap();
        assert!(page_count(&pdf) >= 3);
    }

    #[tokio::test]
    async fn test_overflowing_subtotal_fails_render() {
        let dir = tempfile::tempdir().unwrap();
        let repo = QuoteRepository::new(dir.path(), "COT").unwrap();
        let renderer = PdfArtifactRenderer::new(repo, "http://localhost:5173");

        let mut q = quote();
        q.line_items[0].quantity = dec!(100000000000000000000);
        q.line_items[0].unit_price = dec!(100000000000000000000);

        let result = renderer.render(&q, None).await;
        assert!(matches!(result, Err(RenderError::Pdf(_))));
    }
}
