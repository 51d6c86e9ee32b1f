//! Utilidades JWT
//!
//! Dos tipos de token con secretos y claims distintos:
//! - token de sesión del administrador (expira)
//! - token de capacidad por cotización (no expira, nunca se rota)

use std::collections::HashSet;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{config::environment::EnvironmentConfig, utils::errors::AppError};

/// Largo del código de seguridad que ve el cliente
pub const SHORT_CODE_LEN: usize = 6;

/// Claims del token de administrador
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

/// Claims del token de capacidad de una cotización
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityClaims {
    pub reference: String,
    pub client: String,
    pub iat: usize,
}

/// Emisión y verificación de tokens de administrador
#[derive(Clone)]
pub struct AdminTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration: u64,
}

impl AdminTokenService {
    pub fn new(secret: &str, expiration: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration,
        }
    }

    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self::new(&config.admin_jwt_secret, config.admin_jwt_expiration)
    }

    /// Generar token de sesión con rol admin
    pub fn issue(&self) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        let expires_at = now + chrono::Duration::seconds(self.expiration as i64);

        let claims = AdminClaims {
            role: "admin".to_string(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Jwt(format!("Error generando token: {}", e)))
    }

    /// Verificar y decodificar token de administrador
    pub fn verify(&self, token: &str) -> Result<AdminClaims, AppError> {
        let claims = decode::<AdminClaims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AppError::Jwt(format!("Token inválido: {}", e)))?
            .claims;

        if claims.role != "admin" {
            return Err(AppError::Unauthorized("Se requieren permisos de administrador".to_string()));
        }
        Ok(claims)
    }
}

/// Emisión y verificación de tokens de capacidad por cotización
#[derive(Clone)]
pub struct CapabilityTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl CapabilityTokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self::new(&config.quote_token_secret)
    }

    /// Acuñar el token de una cotización nueva
    pub fn mint(&self, reference: &str, client: &str) -> Result<String, AppError> {
        let claims = CapabilityClaims {
            reference: reference.to_string(),
            client: client.to_string(),
            iat: chrono::Utc::now().timestamp() as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Jwt(format!("Error generando token de cotización: {}", e)))
    }

    /// Verificar firma y que el token pertenezca a la referencia indicada
    pub fn verify(&self, token: &str, reference: &str) -> Result<CapabilityClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;

        let claims = decode::<CapabilityClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Jwt(format!("Token inválido: {}", e)))?
            .claims;

        if claims.reference != reference {
            return Err(AppError::Unauthorized("Token no corresponde a la cotización".to_string()));
        }
        Ok(claims)
    }
}

/// Código corto de seguridad: los últimos 6 caracteres del token
pub fn short_code(token: &str) -> String {
    let len = token.chars().count();
    token.chars().skip(len.saturating_sub(SHORT_CODE_LEN)).collect()
}

/// Extraer token del header Authorization
pub fn extract_token_from_header(auth_header: &str) -> Result<&str, AppError> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Jwt("Header Authorization debe comenzar con 'Bearer '".to_string()))?;

    if token.is_empty() {
        return Err(AppError::Jwt("Token no puede estar vacío".to_string()));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_token_roundtrip() {
        let service = AdminTokenService::new("admin-secret", 3600);
        let token = service.issue().unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_admin_and_capability_secrets_are_not_interchangeable() {
        let admin = AdminTokenService::new("admin-secret", 3600);
        let capability = CapabilityTokenService::new("quote-secret");

        let quote_token = capability.mint("COT-2025-123456", "ACME").unwrap();
        assert!(admin.verify(&quote_token).is_err());

        let admin_token = admin.issue().unwrap();
        assert!(capability.verify(&admin_token, "COT-2025-123456").is_err());
    }

    #[test]
    fn test_capability_token_is_bound_to_reference() {
        let service = CapabilityTokenService::new("quote-secret");
        let token = service.mint("COT-2025-123456", "ACME").unwrap();

        let claims = service.verify(&token, "COT-2025-123456").unwrap();
        assert_eq!(claims.client, "ACME");
        assert!(service.verify(&token, "COT-2025-654321").is_err());
    }

    #[test]
    fn test_short_code_is_token_suffix() {
        let service = CapabilityTokenService::new("quote-secret");
        let token = service.mint("COT-2025-123456", "ACME").unwrap();
        let code = short_code(&token);
        assert_eq!(code.len(), SHORT_CODE_LEN);
        assert!(token.ends_with(&code));
        assert_eq!(short_code("abc"), "abc");
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert!(extract_token_from_header("Basic xyz").is_err());
        assert!(extract_token_from_header("Bearer ").is_err());
    }
}
