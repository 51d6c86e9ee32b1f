//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ADMIN_JWT_SECRET: &str = "dev-admin-secret-change-me";
const DEFAULT_QUOTE_TOKEN_SECRET: &str = "dev-quote-secret-change-me";

/// Configuración SMTP para notificaciones
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: Option<String>,
    pub notify_to: Option<String>,
    pub fallback_to: Option<String>,
    pub timeout: Duration,
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub output_dir: PathBuf,
    pub frontend_url: String,
    pub reference_prefix: String,
    pub admin_password: Option<String>,
    pub admin_jwt_secret: String,
    pub admin_jwt_expiration: u64,
    pub quote_token_secret: String,
    pub rates_base_url: String,
    pub rates_timeout: Duration,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub smtp: SmtpConfig,
}

impl EnvironmentConfig {
    /// Leer la configuración desde variables de entorno, con valores por defecto
    pub fn from_env() -> Self {
        // OUTPUT_DIR tiene prioridad sobre el nombre legacy OUTPUTS_DIR
        let output_dir = non_empty("OUTPUT_DIR")
            .or_else(|| non_empty("OUTPUTS_DIR"))
            .unwrap_or_else(|| "outputs".to_string());

        let smtp_port = parse_or("SMTP_PORT", 1025u16);
        let smtp_secure = non_empty("SMTP_SECURE")
            .map(|v| is_truthy(&v))
            .unwrap_or(smtp_port == 465);

        Self {
            environment: non_empty("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port: parse_or("PORT", 3000u16),
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            output_dir: PathBuf::from(output_dir),
            frontend_url: non_empty("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".to_string()),
            reference_prefix: non_empty("QUOTE_PREFIX").unwrap_or_else(|| "COT".to_string()),
            admin_password: non_empty("ADMIN_PASSWORD"),
            admin_jwt_secret: non_empty("ADMIN_JWT_SECRET")
                .or_else(|| non_empty("JWT_SECRET"))
                .unwrap_or_else(|| DEFAULT_ADMIN_JWT_SECRET.to_string()),
            admin_jwt_expiration: parse_or("ADMIN_JWT_EXPIRATION", 8 * 3600u64),
            quote_token_secret: non_empty("QUOTE_TOKEN_SECRET")
                .unwrap_or_else(|| DEFAULT_QUOTE_TOKEN_SECRET.to_string()),
            rates_base_url: non_empty("RATES_BASE_URL")
                .unwrap_or_else(|| "https://mindicador.cl/api".to_string()),
            rates_timeout: Duration::from_secs(parse_or("RATES_TIMEOUT_SECS", 10u64)),
            cors_origins: non_empty("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            log_level: non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            smtp: SmtpConfig {
                host: non_empty("SMTP_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: smtp_port,
                secure: smtp_secure,
                user: non_empty("SMTP_USER"),
                pass: non_empty("SMTP_PASS"),
                from: non_empty("SMTP_FROM"),
                notify_to: non_empty("SMTP_NOTIFY_TO"),
                fallback_to: non_empty("SMTP_FALLBACK_TO"),
                timeout: Duration::from_secs(parse_or("SMTP_TIMEOUT_SECS", 20u64)),
            },
        }
    }

    /// Misma configuración apuntando a otro directorio de salida
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Secretos que siguen con su valor de desarrollo
    pub fn default_secrets(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.admin_jwt_secret == DEFAULT_ADMIN_JWT_SECRET {
            names.push("ADMIN_JWT_SECRET");
        }
        if self.quote_token_secret == DEFAULT_QUOTE_TOKEN_SECRET {
            names.push("QUOTE_TOKEN_SECRET");
        }
        names
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// El guard de administrador solo se activa con una clave configurada
    pub fn admin_auth_enabled(&self) -> bool {
        self.admin_password.is_some()
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match non_empty(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("⚠️ {}='{}' no es válido, usando {}", key, raw, default);
            default
        }),
        None => default,
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}
