//! Notificaciones por correo
//!
//! Correos transaccionales al cliente y al operador. El envío es
//! fire-and-forget: el motor lanza la notificación en una tarea aparte y los
//! errores solo se registran.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::environment::{EnvironmentConfig, SmtpConfig};
use crate::models::quote::Quote;
use crate::services::pdf_service::accept_url;
use crate::utils::validation::is_valid_email;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address '{0}'")]
    Address(String),

    #[error("could not build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Transport(String),
}

/// Motivo de la notificación
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteNotice {
    Created,
    Updated,
    Approved,
    Rejected { reason: String },
    NeedsReview,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailAddress {
    pub name: Option<String>,
    pub address: String,
}

/// Adjunto ya leído del disco
#[derive(Debug, Clone, PartialEq)]
pub struct MailAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Correo listo para entregar al transporte
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub from: MailAddress,
    pub reply_to: String,
    pub to: String,
    pub bcc: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachment: Option<MailAttachment>,
}

/// Interpretar `SMTP_FROM`: `Nombre <correo>`, correo simple o texto libre
/// con un token que contiene `@`. Sin dirección usable se usa el usuario SMTP.
pub fn parse_from_address(smtp_from: Option<&str>, smtp_user: Option<&str>) -> MailAddress {
    let fallback = smtp_user.unwrap_or("dev@example.com").to_string();
    let raw = smtp_from.map(str::trim).unwrap_or_default();

    if raw.is_empty() {
        return MailAddress { name: None, address: fallback };
    }

    if let (Some(open), true) = (raw.rfind('<'), raw.ends_with('>')) {
        let name = raw[..open].trim().trim_matches('"').trim();
        return MailAddress {
            name: (!name.is_empty()).then(|| name.to_string()),
            address: raw[open + 1..raw.len() - 1].trim().to_string(),
        };
    }

    if is_valid_email(raw) {
        return MailAddress { name: None, address: raw.to_string() };
    }

    if let Some(token) = raw.split_whitespace().rev().find(|t| t.contains('@')) {
        let name = raw.replacen(token, "", 1).trim().to_string();
        return MailAddress {
            name: (!name.is_empty()).then_some(name),
            address: token.trim_matches(|c| c == '"' || c == '<' || c == '>').to_string(),
        };
    }

    MailAddress { name: Some(raw.to_string()), address: fallback }
}

/// Destinatario del cliente: email → contacto → fallback configurado
pub fn resolve_client_recipient(quote: &Quote, fallback: Option<&str>) -> Option<String> {
    [
        quote.client_email.as_deref(),
        quote.client_contact.as_deref(),
        fallback,
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|candidate| is_valid_email(candidate))
    .map(str::to_string)
}

/// Entrega de correos ya compuestos
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, mail: OutgoingMail) -> Result<(), NotifyError>;
}

/// Transporte SMTP asíncrono con lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let mut builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder.port(config.port).timeout(Some(config.timeout));
        if let Some(user) = &config.user {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                config.pass.clone().unwrap_or_default(),
            ));
        }

        log::info!(
            "📧 SMTP configurado: {}:{} (secure: {})",
            config.host,
            config.port,
            config.secure
        );
        Ok(Self { transport: builder.build() })
    }
}

fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, NotifyError> {
    let address: Address = address
        .parse()
        .map_err(|_| NotifyError::Address(address.to_string()))?;
    Ok(Mailbox::new(name.map(str::to_string), address))
}

/// Convertir un `OutgoingMail` en mensaje MIME
pub fn build_message(mail: &OutgoingMail) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(mailbox(mail.from.name.as_deref(), &mail.from.address)?)
        .reply_to(mailbox(None, &mail.reply_to)?)
        .to(mailbox(None, &mail.to)?)
        .subject(mail.subject.clone());

    if let Some(bcc) = &mail.bcc {
        builder = builder.bcc(mailbox(None, bcc)?);
    }

    let body = MultiPart::alternative_plain_html(mail.text.clone(), mail.html.clone());
    let message = match &mail.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse("application/pdf")
                .map_err(|e| NotifyError::Build(e.to_string()))?;
            builder.multipart(
                MultiPart::mixed()
                    .multipart(body)
                    .singlepart(
                        Attachment::new(attachment.filename.clone())
                            .body(attachment.bytes.clone(), content_type),
                    ),
            )
        }
        None => builder.multipart(body),
    };

    message.map_err(|e| NotifyError::Build(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, mail: OutgoingMail) -> Result<(), NotifyError> {
        let message = build_message(&mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Notificaciones del ciclo de vida de una cotización
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_client(&self, quote: &Quote, pdf_path: &Path, notice: QuoteNotice) -> Result<(), NotifyError>;
    async fn notify_operator(&self, quote: &Quote, pdf_path: &Path, notice: QuoteNotice) -> Result<(), NotifyError>;
}

/// Política de remitente y destinatarios
#[derive(Debug, Clone)]
pub struct MailPolicy {
    pub from: MailAddress,
    pub notify_to: Option<String>,
    pub fallback_to: Option<String>,
    pub frontend_url: String,
}

impl MailPolicy {
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            from: parse_from_address(config.smtp.from.as_deref(), config.smtp.user.as_deref()),
            notify_to: config.smtp.notify_to.clone(),
            fallback_to: config.smtp.fallback_to.clone(),
            frontend_url: config.frontend_url.clone(),
        }
    }

    /// Operador: notify-to configurado, si no el propio remitente
    pub fn operator_recipient(&self) -> String {
        self.notify_to
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.from.address.clone())
    }

    fn bcc_for(&self, to: &str) -> Option<String> {
        self.notify_to
            .as_deref()
            .map(str::trim)
            .filter(|addr| is_valid_email(addr) && !addr.eq_ignore_ascii_case(to))
            .map(str::to_string)
    }

    /// Correo al cliente, `None` si no hay destinatario válido
    pub fn compose_client(
        &self,
        quote: &Quote,
        notice: &QuoteNotice,
        attachment: Option<MailAttachment>,
    ) -> Option<OutgoingMail> {
        let to = resolve_client_recipient(quote, self.fallback_to.as_deref())?;
        let (subject, lead) = client_wording(quote, notice);
        Some(self.compose(quote, to.clone(), self.bcc_for(&to), subject, lead, attachment))
    }

    pub fn compose_operator(
        &self,
        quote: &Quote,
        notice: &QuoteNotice,
        attachment: Option<MailAttachment>,
    ) -> OutgoingMail {
        let (subject, lead) = operator_wording(quote, notice);
        self.compose(quote, self.operator_recipient(), None, subject, lead, attachment)
    }

    fn compose(
        &self,
        quote: &Quote,
        to: String,
        bcc: Option<String>,
        subject: String,
        lead: String,
        attachment: Option<MailAttachment>,
    ) -> OutgoingMail {
        let code = quote.short_code();
        let url = accept_url(&self.frontend_url, quote);

        let text = format!(
            "{}\n\nCódigo de aceptación: {}\n\nPuede aceptar o rechazar en: {}",
            lead, code, url
        );
        let html = format!(
            "<p>{}</p><p>Código de aceptación: <strong>{}</strong></p>\
             <p>Puede aceptar o rechazar en: <a href=\"{}\">{}</a></p>",
            escape_html(&lead).replace('\n', "<br>"),
            escape_html(&code),
            escape_html(&url),
            escape_html(&url)
        );

        OutgoingMail {
            from: self.from.clone(),
            reply_to: self.from.address.clone(),
            to,
            bcc,
            subject,
            text,
            html,
            attachment,
        }
    }
}

fn client_wording(quote: &Quote, notice: &QuoteNotice) -> (String, String) {
    let reference = &quote.reference;
    match notice {
        QuoteNotice::Created => (
            format!("Cotización {}", reference),
            format!("Adjuntamos la cotización {} para {}.", reference, quote.client),
        ),
        QuoteNotice::Updated => (
            format!("Cotización {} actualizada", reference),
            format!(
                "La cotización {} fue actualizada. Adjuntamos la nueva versión; la anterior queda sin efecto.",
                reference
            ),
        ),
        QuoteNotice::Approved => (
            format!("Cotización {} aceptada", reference),
            format!("Registramos la aceptación de la cotización {}. Gracias.", reference),
        ),
        QuoteNotice::Rejected { reason } => (
            format!("Cotización {} rechazada", reference),
            format!(
                "Registramos el rechazo de la cotización {}.\nMotivo: {}",
                reference,
                reason_or_default(reason)
            ),
        ),
        QuoteNotice::NeedsReview => (
            format!("Cotización {} en revisión", reference),
            format!(
                "La cotización {} había sido rechazada y quedó en revisión. Le contactaremos.",
                reference
            ),
        ),
    }
}

fn operator_wording(quote: &Quote, notice: &QuoteNotice) -> (String, String) {
    let reference = &quote.reference;
    match notice {
        QuoteNotice::Rejected { reason } => (
            format!("Cotización {} RECHAZADA", reference),
            format!(
                "La cotización {} para {} fue rechazada por {} el {}.\nMotivo: {}",
                reference,
                quote.client,
                quote.rejected_by.as_deref().unwrap_or("Web"),
                quote
                    .rejected_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default(),
                reason_or_default(reason)
            ),
        ),
        QuoteNotice::NeedsReview => (
            format!("Cotización {} REQUIERE REVISIÓN", reference),
            format!(
                "{} intentó aprobar la cotización {} de {}, que estaba rechazada. Revise antes de continuar.",
                quote.review_requested_by.as_deref().unwrap_or("El cliente"),
                reference,
                quote.client
            ),
        ),
        QuoteNotice::Approved => (
            format!("Cotización {} ACEPTADA", reference),
            format!(
                "La cotización {} para {} fue aceptada por {}.",
                reference,
                quote.client,
                quote.approved_by.as_deref().unwrap_or("Web")
            ),
        ),
        QuoteNotice::Created | QuoteNotice::Updated => client_wording(quote, notice),
    }
}

fn reason_or_default(reason: &str) -> &str {
    if reason.trim().is_empty() {
        "(sin motivo)"
    } else {
        reason
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Notificador por correo sobre un `MailTransport`
pub struct EmailNotifier {
    policy: MailPolicy,
    transport: Arc<dyn MailTransport>,
}

impl EmailNotifier {
    pub fn new(policy: MailPolicy, transport: Arc<dyn MailTransport>) -> Self {
        Self { policy, transport }
    }

    async fn load_attachment(pdf_path: &Path) -> Option<MailAttachment> {
        match tokio::fs::read(pdf_path).await {
            Ok(bytes) => Some(MailAttachment {
                filename: pdf_path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| "cotizacion.pdf".to_string()),
                bytes,
            }),
            Err(e) => {
                log::warn!("⚠️ PDF no disponible para adjuntar ({}): {}", pdf_path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify_client(&self, quote: &Quote, pdf_path: &Path, notice: QuoteNotice) -> Result<(), NotifyError> {
        if resolve_client_recipient(quote, self.policy.fallback_to.as_deref()).is_none() {
            log::warn!("📭 {} sin destinatario válido, no se envía correo al cliente", quote.reference);
            return Ok(());
        }

        let attachment = Self::load_attachment(pdf_path).await;
        let Some(mail) = self.policy.compose_client(quote, &notice, attachment) else {
            return Ok(());
        };

        log::info!("📧 Enviando correo de {} a {}", quote.reference, mail.to);
        self.transport.deliver(mail).await
    }

    async fn notify_operator(&self, quote: &Quote, pdf_path: &Path, notice: QuoteNotice) -> Result<(), NotifyError> {
        let attachment = Self::load_attachment(pdf_path).await;
        let mail = self.policy.compose_operator(quote, &notice, attachment);

        log::info!("📧 Notificando al operador ({}) sobre {}", mail.to, quote.reference);
        self.transport.deliver(mail).await
    }
}
